use super::config::{
    ElectrostaticsConfig, Screening, SimulationConfig, StructureSource,
};
use super::error::EngineError;
use super::rng::{self, McRng};
use super::state::RunState;
use crate::core::forcefield::electrostatics::Electrostatics;
use crate::core::forcefield::ewald::ReciprocalSpace;
use crate::core::forcefield::hamiltonian::{EnergyError, Hamiltonian};
use crate::core::forcefield::term::EnergyTerm;
use crate::core::io::aam::AamFile;
use crate::core::io::traits::CoordinateFile;
use crate::core::models::atom::AtomType;
use crate::core::models::ids::{AtomTypeId, MoleculeKindId};
use crate::core::models::molecule::{Bond, MoleculeKind};
use crate::core::models::process::ProtonationProcess;
use crate::core::models::space::Space;
use crate::core::models::topology::Topology;
use crate::core::utils::units;
use nalgebra::Point3;
use tracing::{debug, info, warn};

/// Largest net charge, in e, still treated as a neutral cell.
const NEUTRALITY_TOLERANCE: f64 = 1e-6;

/// The physical system: what is simulated and how its energy is computed.
#[derive(Debug, Clone)]
pub struct System {
    pub topology: Topology,
    pub space: Space,
    pub hamiltonian: Hamiltonian,
    /// Reciprocal-space state, present only under Ewald summation.
    pub reciprocal: Option<ReciprocalSpace>,
    pub processes: Vec<ProtonationProcess>,
    /// Temperature in K.
    pub temperature: f64,
}

impl System {
    pub fn new(
        topology: Topology,
        space: Space,
        hamiltonian: Hamiltonian,
        processes: Vec<ProtonationProcess>,
        temperature: f64,
    ) -> Self {
        let reciprocal = match (hamiltonian.electrostatics().scheme(), space.geometry.lengths()) {
            (Electrostatics::Ewald(params), Some(lengths)) => Some(ReciprocalSpace::new(
                *params,
                hamiltonian.electrostatics().bjerrum_length(),
                lengths,
                &space.particles,
            )),
            _ => None,
        };
        Self {
            topology,
            space,
            hamiltonian,
            reciprocal,
            processes,
            temperature,
        }
    }

    /// Short-range energy of `subset`; see [`Hamiltonian::energy_of`].
    pub fn energy_of(&self, subset: &[usize]) -> Result<EnergyTerm, EnergyError> {
        self.hamiltonian.energy_of(&self.space, &self.topology, subset)
    }

    /// Full energy recomputed from scratch, reciprocal space included.
    pub fn total_energy(&self) -> Result<EnergyTerm, EnergyError> {
        let mut energy = self.hamiltonian.system_energy(&self.space, &self.topology)?;
        energy.reciprocal = self.reciprocal_energy();
        Ok(energy)
    }

    pub fn reciprocal_energy(&self) -> f64 {
        self.reciprocal.as_ref().map_or(0.0, |r| r.energy())
    }

    /// Recomputes all Ewald structure factors from the current positions.
    pub fn rebuild_reciprocal(&mut self) {
        if let Some(reciprocal) = &mut self.reciprocal {
            reciprocal.rebuild(&self.space.particles);
        }
    }

    /// Net charge of the cell when it matters: Ewald summation of a non-neutral periodic
    /// cell carries an implicit neutralizing background.
    pub fn charge_imbalance(&self) -> Option<f64> {
        let net = self.space.net_charge();
        (self.reciprocal.is_some() && net.abs() > NEUTRALITY_TOLERANCE).then_some(net)
    }

    /// Smallest container extent the interaction cutoffs allow.
    pub fn min_container_length(&self) -> f64 {
        self.hamiltonian.max_cutoff().map_or(0.0, |rc| 2.0 * rc)
    }

    /// Bjerrum length in vacuum at the simulation temperature.
    pub fn vacuum_bjerrum_length(&self) -> f64 {
        units::bjerrum_length(1.0, self.temperature)
    }
}

/// Result of comparing the running energy against a full recomputation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftCheck {
    pub running: f64,
    pub recomputed: f64,
    pub relative_drift: f64,
    pub exceeded: bool,
}

/// Explicit owner of all mutable simulation state: the system, the random stream and the
/// run bookkeeping.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub system: System,
    pub rng: McRng,
    pub state: RunState,
    drift_tolerance: f64,
}

impl SimulationContext {
    /// Wraps an assembled system and computes its initial energy.
    ///
    /// # Errors
    ///
    /// Fails if the initial energy cannot be evaluated or is infinite, which means the
    /// starting configuration is invalid.
    pub fn new(system: System, rng: McRng, drift_tolerance: f64) -> Result<Self, EngineError> {
        let energy = system.total_energy()?.total();
        if !energy.is_finite() {
            return Err(EngineError::NonFiniteEnergy(energy));
        }
        Ok(Self {
            system,
            rng,
            state: RunState::new(energy),
            drift_tolerance,
        })
    }

    /// Builds the topology, inserts the initial molecules and evaluates the starting energy.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, EngineError> {
        let temperature = config.system.temperature;
        let topology = build_topology(config)?;
        let epsr = config.energy.epsr;
        let lb = units::bjerrum_length(epsr, temperature);
        let electrostatics = resolve_electrostatics(&config.energy.electrostatics, lb);
        let hamiltonian = Hamiltonian::new(
            &topology,
            electrostatics,
            lb,
            epsr,
            config.energy.lj_cutoff,
        );
        let processes = resolve_processes(config, &topology)?;

        let mut rng = rng::seeded(config.system.seed);
        let mut space = Space::new(config.system.geometry.clone());
        space.populate(&topology, &mut rng)?;
        info!(
            particles = space.len(),
            groups = space.groups.len(),
            geometry = space.geometry.name(),
            volume = space.geometry.volume(),
            bjerrum_length = lb,
            electrostatics = electrostatics.name(),
            "System assembled."
        );

        let system = System::new(topology, space, hamiltonian, processes, temperature);
        if let Some(reciprocal) = &system.reciprocal {
            debug!(kvectors = reciprocal.kvector_count(), "Ewald reciprocal space ready.");
        }
        if let Some(net_charge) = system.charge_imbalance() {
            warn!(
                net_charge,
                "Ewald summation of a non-neutral cell; energies include a uniform neutralizing background."
            );
        }
        Self::new(system, rng, config.system.drift_tolerance)
    }

    pub fn drift_tolerance(&self) -> f64 {
        self.drift_tolerance
    }

    /// Rebuilds reciprocal space, recomputes the energy from scratch and resets the running
    /// energy to it. Drift above the tolerance is logged and counted.
    pub fn check_drift(&mut self) -> Result<DriftCheck, EnergyError> {
        self.system.rebuild_reciprocal();
        self.state.accepted_since_rebuild = 0;
        let recomputed = self.system.total_energy()?.total();
        let running = self.state.energy;
        let relative_drift = (running - recomputed).abs() / recomputed.abs().max(1.0);
        let exceeded = !(relative_drift <= self.drift_tolerance);
        if exceeded {
            self.state.drift_warnings += 1;
            warn!(
                running,
                recomputed,
                relative_drift,
                tolerance = self.drift_tolerance,
                "Running energy drifted from full recomputation."
            );
        }
        if relative_drift.is_finite() {
            self.state.max_relative_drift = self.state.max_relative_drift.max(relative_drift);
        }
        self.state.energy = recomputed;
        Ok(DriftCheck {
            running,
            recomputed,
            relative_drift,
            exceeded,
        })
    }
}

fn build_topology(config: &SimulationConfig) -> Result<Topology, EngineError> {
    let temperature = config.system.temperature;
    let atoms: Vec<AtomType> = config
        .atoms
        .iter()
        .enumerate()
        .map(|(i, a)| AtomType {
            id: AtomTypeId(i),
            name: a.name.clone(),
            charge: a.charge,
            sigma: a.sigma,
            epsilon: units::kjmol_to_kt(a.epsilon, temperature),
            dp: a.dp,
            dprot: a.dprot,
            dipole: a.dipole.map(|mu| mu * units::DEBYE_TO_EA),
            polarizability: a.polarizability,
            molar_mass: a.molar_mass,
        })
        .collect();
    let atom_id = |name: &str| -> Result<AtomTypeId, EngineError> {
        atoms
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.id)
            .ok_or_else(|| super::config::ConfigError::UnknownAtom(name.to_string()).into())
    };

    let mut molecules = Vec::with_capacity(config.molecules.len());
    for (i, m) in config.molecules.iter().enumerate() {
        let (names, structure): (Vec<String>, Option<Vec<Point3<f64>>>) = match &m.structure {
            None => (m.atoms.clone(), None),
            Some(StructureSource::Inline(records)) => (
                records.iter().map(|(name, _)| name.clone()).collect(),
                Some(records.iter().map(|(_, p)| *p).collect()),
            ),
            Some(StructureSource::File(path)) => {
                let records = AamFile::read_from_path(path).map_err(|source| {
                    EngineError::Structure {
                        path: path.clone(),
                        source,
                    }
                })?;
                debug!(
                    molecule = m.name.as_str(),
                    path = %path.display(),
                    atoms = records.len(),
                    "Read molecule structure."
                );
                (
                    records.iter().map(|r| r.name.clone()).collect(),
                    Some(records.iter().map(|r| r.position).collect()),
                )
            }
        };
        let ids = names
            .iter()
            .map(|name| atom_id(name))
            .collect::<Result<Vec<_>, _>>()?;
        for bond in &m.bonds {
            if bond.first >= ids.len() || bond.second >= ids.len() {
                return Err(super::config::ConfigError::InvalidValue {
                    key: format!("moleculelist.{}.bonds", m.name),
                    reason: format!("bond {}-{} exceeds the {} atoms of the structure", bond.first, bond.second, ids.len()),
                }
                .into());
            }
        }
        let mut kind = MoleculeKind::new(MoleculeKindId(i), &m.name, ids);
        kind.atomic = m.atomic;
        kind.rotatable = m.rotatable;
        kind.n_init = m.n_init;
        kind.bonds = m
            .bonds
            .iter()
            .map(|b| Bond {
                first: b.first,
                second: b.second,
                k: b.k,
                req: b.req,
            })
            .collect();
        kind.insertion_direction = m.insertion_direction;
        kind.insertion_offset = m.insertion_offset;
        kind.structure = structure;
        molecules.push(kind);
    }
    Ok(Topology::new(atoms, molecules))
}

fn resolve_electrostatics(config: &ElectrostaticsConfig, lb: f64) -> Electrostatics {
    match config {
        ElectrostaticsConfig::None => Electrostatics::None,
        ElectrostaticsConfig::Plain { cutoff, eps_rf } => Electrostatics::Plain {
            cutoff: *cutoff,
            eps_rf: *eps_rf,
        },
        ElectrostaticsConfig::Wolf { alpha, cutoff } => Electrostatics::Wolf {
            alpha: *alpha,
            cutoff: *cutoff,
        },
        ElectrostaticsConfig::Ewald(params) => Electrostatics::Ewald(*params),
        ElectrostaticsConfig::Yukawa { screening, cutoff } => {
            let debye_length = match screening {
                Screening::DebyeLength(l) => *l,
                Screening::IonicStrength(i) => units::debye_length_from_ionic_strength(*i, lb),
            };
            Electrostatics::Yukawa {
                debye_length,
                cutoff: *cutoff,
            }
        }
    }
}

fn resolve_processes(
    config: &SimulationConfig,
    topology: &Topology,
) -> Result<Vec<ProtonationProcess>, EngineError> {
    config
        .processes
        .iter()
        .map(|p| {
            let find = |name: &str| {
                topology
                    .find_atom(name)
                    .map(|a| a.id)
                    .ok_or_else(|| super::config::ConfigError::UnknownAtom(name.to_string()))
            };
            Ok(ProtonationProcess {
                name: p.name.clone(),
                bound: find(&p.bound)?,
                free: find(&p.free)?,
                pkd: p.pkd,
                px: p.px,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::electrostatics::EwaldParameters;
    use crate::core::geometry::Geometry;
    use crate::engine::config::{
        AtomConfig, EnergyConfig, MoleculeConfig, ProcessConfig, SimulationConfigBuilder,
    };
    use std::io::Write;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn salt_config(n: usize) -> SimulationConfig {
        let mut na = AtomConfig::new("Na");
        na.charge = 1.0;
        na.sigma = 3.0;
        na.epsilon = 0.1;
        let mut cl = AtomConfig::new("Cl");
        cl.charge = -1.0;
        cl.sigma = 4.0;
        cl.epsilon = 0.2;
        let mut salt = MoleculeConfig::new("salt");
        salt.atoms = vec!["Na".into(), "Cl".into()];
        salt.atomic = true;
        salt.n_init = n;
        SimulationConfigBuilder::new()
            .atom(na)
            .atom(cl)
            .molecule(salt)
            .energy(EnergyConfig {
                epsr: 80.0,
                electrostatics: ElectrostaticsConfig::Wolf {
                    alpha: 0.2,
                    cutoff: 10.0,
                },
                lj_cutoff: Some(10.0),
            })
            .temperature(298.15)
            .geometry(Geometry::cube(40.0).unwrap())
            .mc_loop(1, 10)
            .build()
            .unwrap()
    }

    #[test]
    fn from_config_populates_and_converts_units() {
        let ctx = SimulationContext::from_config(&salt_config(20)).unwrap();
        assert_eq!(ctx.system.space.len(), 40);
        let na = ctx.system.topology.find_atom("Na").unwrap();
        assert!(f64_approx_equal(na.epsilon, units::kjmol_to_kt(0.1, 298.15)));
        assert!(ctx.state.energy.is_finite());
        assert!(f64_approx_equal(ctx.system.min_container_length(), 20.0));
    }

    #[test]
    fn same_seed_builds_same_system() {
        let a = SimulationContext::from_config(&salt_config(5)).unwrap();
        let b = SimulationContext::from_config(&salt_config(5)).unwrap();
        assert_eq!(a.system.space, b.system.space);
        assert_eq!(a.state.energy, b.state.energy);
    }

    #[test]
    fn drift_check_resets_running_energy() {
        let mut ctx = SimulationContext::from_config(&salt_config(5)).unwrap();
        let exact = ctx.state.energy;
        ctx.state.energy = exact + 1.0;
        let check = ctx.check_drift().unwrap();
        assert!(check.exceeded);
        assert_eq!(ctx.state.drift_warnings, 1);
        assert!(f64_approx_equal(ctx.state.energy, exact));

        let check = ctx.check_drift().unwrap();
        assert!(!check.exceeded);
        assert_eq!(ctx.state.drift_warnings, 1);
    }

    #[test]
    fn structure_file_defines_molecule_atoms() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "2\nNa 1 0.0 0.0 0.0 1.0 1.0 1.5\nCl 2 3.0 0.0 0.0 -1.0 1.0 2.0\n"
        )
        .unwrap();
        let mut config = salt_config(0);
        let mut dimer = MoleculeConfig::new("dimer");
        dimer.structure = Some(StructureSource::File(file.path().to_path_buf()));
        dimer.n_init = 2;
        config.molecules.push(dimer);
        let ctx = SimulationContext::from_config(&config).unwrap();
        let kind = ctx.system.topology.find_molecule("dimer").unwrap();
        assert_eq!(kind.len(), 2);
        assert_eq!(ctx.system.space.groups.len(), 3);
        let g = &ctx.system.space.groups[2];
        let a = ctx.system.space.particles[g.begin].position;
        let b = ctx.system.space.particles[g.begin + 1].position;
        assert!((ctx.system.space.geometry.distance(&a, &b) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn processes_resolve_to_atom_ids() {
        let mut config = salt_config(1);
        config.processes.push(ProcessConfig {
            name: "bind".into(),
            bound: "Na".into(),
            free: "Cl".into(),
            pkd: 4.0,
            px: 4.0,
        });
        let ctx = SimulationContext::from_config(&config).unwrap();
        assert_eq!(ctx.system.processes[0].bound, AtomTypeId(0));
        assert_eq!(ctx.system.processes[0].free, AtomTypeId(1));
    }

    fn ewald_energy() -> EnergyConfig {
        EnergyConfig {
            epsr: 80.0,
            electrostatics: ElectrostaticsConfig::Ewald(EwaldParameters {
                alpha: 0.2,
                cutoff: 10.0,
                cutoff_k: 4.0,
                eps_surf: None,
                spherical_sum: true,
                update_frequency: 100,
            }),
            lj_cutoff: Some(10.0),
        }
    }

    #[test]
    fn charge_imbalance_is_reported_only_for_charged_ewald_cells() {
        let mut config = salt_config(4);
        let ctx = SimulationContext::from_config(&config).unwrap();
        assert_eq!(ctx.system.charge_imbalance(), None);

        config.energy = ewald_energy();
        let mut ctx = SimulationContext::from_config(&config).unwrap();
        assert_eq!(ctx.system.charge_imbalance(), None);

        let na = ctx.system.topology.find_atom("Na").unwrap().clone();
        ctx.system.space.particles[1].convert_to(&na);
        let imbalance = ctx.system.charge_imbalance().unwrap();
        assert!(f64_approx_equal(imbalance, 2.0));
    }

    #[test]
    fn ionic_strength_sets_debye_length() {
        let lb = 7.0;
        let scheme = resolve_electrostatics(
            &ElectrostaticsConfig::Yukawa {
                screening: Screening::IonicStrength(0.1),
                cutoff: None,
            },
            lb,
        );
        match scheme {
            Electrostatics::Yukawa { debye_length, .. } => {
                assert!(f64_approx_equal(
                    debye_length,
                    units::debye_length_from_ionic_strength(0.1, lb)
                ));
            }
            other => panic!("unexpected scheme {:?}", other),
        }
    }
}
