use crate::core::forcefield::electrostatics::EwaldParameters;
use crate::core::geometry::Geometry;
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Unknown atom type '{0}'")]
    UnknownAtom(String),
    #[error("Unknown molecule '{0}'")]
    UnknownMolecule(String),
    #[error("Unknown titration process '{0}'")]
    UnknownProcess(String),
    #[error("Unknown {section} tag '{tag}'")]
    UnknownTag { section: &'static str, tag: String },
    #[error("Duplicate {section} entry '{name}'")]
    Duplicate { section: &'static str, name: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Parameters of one atom species, in configuration units.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomConfig {
    pub name: String,
    pub charge: f64,
    /// Lennard-Jones diameter in Å.
    pub sigma: f64,
    /// Lennard-Jones well depth in kJ/mol.
    pub epsilon: f64,
    pub dp: f64,
    /// Default rotation amplitude in radians.
    pub dprot: f64,
    /// Dipole moment in Debye.
    pub dipole: Option<Vector3<f64>>,
    pub polarizability: Option<f64>,
    pub molar_mass: f64,
}

impl AtomConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            charge: 0.0,
            sigma: 0.0,
            epsilon: 0.0,
            dp: 0.0,
            dprot: 0.0,
            dipole: None,
            polarizability: None,
            molar_mass: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BondConfig {
    pub first: usize,
    pub second: usize,
    pub k: f64,
    pub req: f64,
}

/// Where a molecule's reference conformation comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureSource {
    /// `(atom name, position)` pairs given directly in the configuration.
    Inline(Vec<(String, Point3<f64>)>),
    /// A coordinate file whose records define both atoms and positions.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeConfig {
    pub name: String,
    /// Atom names; may be empty when `structure` supplies them.
    pub atoms: Vec<String>,
    pub n_init: usize,
    pub atomic: bool,
    pub rotatable: bool,
    pub bonds: Vec<BondConfig>,
    pub structure: Option<StructureSource>,
    pub insertion_direction: Vector3<f64>,
    pub insertion_offset: Vector3<f64>,
}

impl MoleculeConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            atoms: Vec::new(),
            n_init: 0,
            atomic: false,
            rotatable: true,
            bonds: Vec::new(),
            structure: None,
            insertion_direction: Vector3::repeat(1.0),
            insertion_offset: Vector3::zeros(),
        }
    }
}

/// Screening of the Yukawa potential, either given directly or derived from the salt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screening {
    DebyeLength(f64),
    /// Ionic strength in mol/L.
    IonicStrength(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElectrostaticsConfig {
    None,
    Plain {
        cutoff: Option<f64>,
        eps_rf: Option<f64>,
    },
    Wolf {
        alpha: f64,
        cutoff: f64,
    },
    Ewald(EwaldParameters),
    Yukawa {
        screening: Screening,
        cutoff: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyConfig {
    pub epsr: f64,
    pub electrostatics: ElectrostaticsConfig,
    pub lj_cutoff: Option<f64>,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            epsr: 1.0,
            electrostatics: ElectrostaticsConfig::Plain {
                cutoff: None,
                eps_rf: None,
            },
            lj_cutoff: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub name: String,
    pub bound: String,
    pub free: String,
    pub pkd: f64,
    pub px: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainMoveConfig {
    pub molecule: String,
    /// Maximum rotation angle in radians.
    pub dp: f64,
    pub min_len: usize,
    pub max_len: usize,
    pub per_molecule: bool,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveConfig {
    AtomTranslate {
        molecule: String,
        dp: Option<f64>,
        direction: Vector3<f64>,
        per_atom: bool,
        weight: f64,
    },
    AtomRotate {
        molecule: String,
        dprot: Option<f64>,
        per_atom: bool,
        weight: f64,
    },
    MoleculeTransRot {
        molecule: String,
        dp: f64,
        dprot: f64,
        direction: Vector3<f64>,
        per_molecule: bool,
        weight: f64,
    },
    Crankshaft(ChainMoveConfig),
    Pivot(ChainMoveConfig),
    Cluster {
        molecule: String,
        dp: f64,
        dprot: f64,
        direction: Vector3<f64>,
        threshold: f64,
        cluster_molecules: Vec<String>,
        weight: f64,
    },
    Isobaric {
        dp: f64,
        /// Pressure in mM.
        pressure: f64,
        weight: f64,
    },
    Titration {
        /// Restricts the move to these processes; empty means all.
        processes: Vec<String>,
        weight: f64,
    },
}

impl MoveConfig {
    pub fn weight(&self) -> f64 {
        match self {
            Self::AtomTranslate { weight, .. }
            | Self::AtomRotate { weight, .. }
            | Self::MoleculeTransRot { weight, .. }
            | Self::Cluster { weight, .. }
            | Self::Isobaric { weight, .. }
            | Self::Titration { weight, .. } => *weight,
            Self::Crankshaft(c) | Self::Pivot(c) => c.weight,
        }
    }

    pub fn molecule(&self) -> Option<&str> {
        match self {
            Self::AtomTranslate { molecule, .. }
            | Self::AtomRotate { molecule, .. }
            | Self::MoleculeTransRot { molecule, .. }
            | Self::Cluster { molecule, .. } => Some(molecule),
            Self::Crankshaft(c) | Self::Pivot(c) => Some(&c.molecule),
            Self::Isobaric { .. } | Self::Titration { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RdfPairConfig {
    pub first: String,
    pub second: String,
    pub dr: f64,
    /// 1, 2 or 3; selects line, ring or shell normalisation.
    pub dim: u8,
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisConfig {
    AtomRdf {
        interval: u64,
        pairs: Vec<RdfPairConfig>,
    },
    MolRdf {
        interval: u64,
        pairs: Vec<RdfPairConfig>,
    },
    Kirkwood {
        interval: u64,
        dr: f64,
        file: PathBuf,
    },
    Multipole {
        interval: u64,
        file: Option<PathBuf>,
    },
    Virial {
        interval: u64,
        file: Option<PathBuf>,
    },
    VirtualVolume {
        interval: u64,
        dv: f64,
        file: Option<PathBuf>,
    },
    PolymerShape {
        interval: u64,
        molecules: Vec<String>,
        file: Option<PathBuf>,
    },
    Trajectory {
        interval: u64,
        file: PathBuf,
    },
    EnergyLog {
        interval: u64,
        file: PathBuf,
    },
    StateFile {
        /// Micro-step period for intermediate saves; the final state is always written.
        interval: Option<u64>,
        file: PathBuf,
    },
    CoordinateFile {
        file: PathBuf,
    },
}

impl AnalysisConfig {
    pub fn interval(&self) -> Option<u64> {
        match self {
            Self::AtomRdf { interval, .. }
            | Self::MolRdf { interval, .. }
            | Self::Kirkwood { interval, .. }
            | Self::Multipole { interval, .. }
            | Self::Virial { interval, .. }
            | Self::VirtualVolume { interval, .. }
            | Self::PolymerShape { interval, .. }
            | Self::Trajectory { interval, .. }
            | Self::EnergyLog { interval, .. } => Some(*interval),
            Self::StateFile { interval, .. } => *interval,
            Self::CoordinateFile { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    Fixed(u64),
    /// Drawn from operating-system entropy; runs are not reproducible.
    Hardware,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitTestConfig {
    pub file: PathBuf,
    /// When set, a mismatch against the fixture fails the run.
    pub stable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    /// Temperature in K.
    pub temperature: f64,
    pub geometry: Geometry,
    pub macro_steps: u64,
    pub micro_steps: u64,
    pub seed: Seed,
    pub drift_tolerance: f64,
    pub drift_interval: Option<u64>,
    pub unittest: Option<UnitTestConfig>,
    /// State file loaded at startup when present.
    pub state_file: Option<PathBuf>,
}

pub const DEFAULT_DRIFT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_SEED: u64 = 42;

/// A validated simulation description: every name resolves, every number is in range.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub atoms: Vec<AtomConfig>,
    pub molecules: Vec<MoleculeConfig>,
    pub energy: EnergyConfig,
    pub processes: Vec<ProcessConfig>,
    pub moves: Vec<MoveConfig>,
    pub analysis: Vec<AnalysisConfig>,
    pub system: SystemConfig,
}

impl SimulationConfig {
    pub fn find_atom(&self, name: &str) -> Option<&AtomConfig> {
        self.atoms.iter().find(|a| a.name == name)
    }

    pub fn find_molecule(&self, name: &str) -> Option<&MoleculeConfig> {
        self.molecules.iter().find(|m| m.name == name)
    }

    /// The state file to resume from: the one named on the system section, otherwise the
    /// one written by a `statefile` sampler.
    pub fn resume_file(&self) -> Option<&PathBuf> {
        self.system.state_file.as_ref().or_else(|| {
            self.analysis.iter().find_map(|a| match a {
                AnalysisConfig::StateFile { file, .. } => Some(file),
                _ => None,
            })
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for atom in &self.atoms {
            if !names.insert(atom.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    section: "atomlist",
                    name: atom.name.clone(),
                });
            }
            if atom.sigma < 0.0 || atom.epsilon < 0.0 || atom.dp < 0.0 || atom.dprot < 0.0 {
                return Err(ConfigError::invalid(
                    format!("atomlist.{}", atom.name),
                    "sigma, eps, dp and dprot must be non-negative",
                ));
            }
            if atom.molar_mass <= 0.0 {
                return Err(ConfigError::invalid(
                    format!("atomlist.{}.mw", atom.name),
                    "molar mass must be positive",
                ));
            }
        }

        let mut names = HashSet::new();
        for molecule in &self.molecules {
            if !names.insert(molecule.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    section: "moleculelist",
                    name: molecule.name.clone(),
                });
            }
            self.validate_molecule(molecule)?;
        }

        self.validate_energy()?;

        let mut names = HashSet::new();
        for process in &self.processes {
            if !names.insert(process.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    section: "processes",
                    name: process.name.clone(),
                });
            }
            for species in [&process.bound, &process.free] {
                if self.find_atom(species).is_none() {
                    return Err(ConfigError::UnknownAtom(species.clone()));
                }
            }
            if process.bound == process.free {
                return Err(ConfigError::invalid(
                    format!("processes.{}", process.name),
                    "bound and free species must differ",
                ));
            }
        }

        for mv in &self.moves {
            self.validate_move(mv)?;
        }
        for analysis in &self.analysis {
            self.validate_analysis(analysis)?;
        }
        self.validate_system()
    }

    fn validate_molecule(&self, molecule: &MoleculeConfig) -> Result<(), ConfigError> {
        let key = format!("moleculelist.{}", molecule.name);
        for atom in &molecule.atoms {
            if self.find_atom(atom).is_none() {
                return Err(ConfigError::UnknownAtom(atom.clone()));
            }
        }
        let atom_count = match &molecule.structure {
            Some(StructureSource::Inline(records)) => {
                for (atom, _) in records {
                    if self.find_atom(atom).is_none() {
                        return Err(ConfigError::UnknownAtom(atom.clone()));
                    }
                }
                if !molecule.atoms.is_empty() && molecule.atoms.len() != records.len() {
                    return Err(ConfigError::invalid(
                        format!("{key}.structure"),
                        "structure and atom list differ in length",
                    ));
                }
                Some(records.len())
            }
            Some(StructureSource::File(_)) => None,
            None => {
                if molecule.atoms.is_empty() {
                    return Err(ConfigError::invalid(
                        format!("{key}.atoms"),
                        "a molecule needs an atom list or a structure",
                    ));
                }
                Some(molecule.atoms.len())
            }
        };
        for bond in &molecule.bonds {
            if bond.first == bond.second {
                return Err(ConfigError::invalid(
                    format!("{key}.bonds"),
                    "a bond cannot join an atom to itself",
                ));
            }
            if let Some(n) = atom_count {
                if bond.first >= n || bond.second >= n {
                    return Err(ConfigError::invalid(
                        format!("{key}.bonds"),
                        format!("bond {}-{} exceeds the {} atoms of the molecule", bond.first, bond.second, n),
                    ));
                }
            }
            if bond.k < 0.0 || bond.req < 0.0 {
                return Err(ConfigError::invalid(
                    format!("{key}.bonds"),
                    "spring constant and equilibrium length must be non-negative",
                ));
            }
        }
        if molecule.atomic && !molecule.bonds.is_empty() {
            return Err(ConfigError::invalid(
                format!("{key}.bonds"),
                "atomic molecules cannot carry bonds",
            ));
        }
        Ok(())
    }

    fn validate_energy(&self) -> Result<(), ConfigError> {
        let energy = &self.energy;
        if !(energy.epsr > 0.0) {
            return Err(ConfigError::invalid("energy.nonbonded.epsr", "must be positive"));
        }
        if let Some(rc) = energy.lj_cutoff {
            if !(rc > 0.0) {
                return Err(ConfigError::invalid("energy.nonbonded.cutoff_lj", "must be positive"));
            }
        }
        let positive = |key: &str, value: f64| -> Result<(), ConfigError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::invalid(key, format!("must be positive, got {value}")))
            }
        };
        match &energy.electrostatics {
            ElectrostaticsConfig::None => {}
            ElectrostaticsConfig::Plain { cutoff, eps_rf } => {
                if let Some(rc) = cutoff {
                    positive("energy.nonbonded.cutoff", *rc)?;
                }
                if eps_rf.is_some() && cutoff.is_none() {
                    return Err(ConfigError::invalid(
                        "energy.nonbonded.eps_rf",
                        "a reaction field requires a cutoff",
                    ));
                }
            }
            ElectrostaticsConfig::Wolf { alpha, cutoff } => {
                positive("energy.nonbonded.cutoff", *cutoff)?;
                if *alpha < 0.0 {
                    return Err(ConfigError::invalid("energy.nonbonded.alpha", "must be non-negative"));
                }
            }
            ElectrostaticsConfig::Ewald(params) => {
                positive("energy.nonbonded.ewald.alpha", params.alpha)?;
                positive("energy.nonbonded.ewald.cutoff", params.cutoff)?;
                if params.cutoff_k < 0.0 {
                    return Err(ConfigError::invalid(
                        "energy.nonbonded.ewald.cutoffK",
                        "must be non-negative",
                    ));
                }
                if params.update_frequency == 0 {
                    return Err(ConfigError::invalid(
                        "energy.nonbonded.ewald.update_frequency",
                        "must be at least 1",
                    ));
                }
                if !matches!(self.system.geometry, Geometry::Cuboid { .. }) {
                    return Err(ConfigError::invalid(
                        "energy.nonbonded.ewald",
                        "Ewald summation requires a cuboid container",
                    ));
                }
            }
            ElectrostaticsConfig::Yukawa { screening, cutoff } => {
                match screening {
                    Screening::DebyeLength(l) => positive("energy.nonbonded.debyelength", *l)?,
                    Screening::IonicStrength(i) => positive("energy.nonbonded.ionicstrength", *i)?,
                }
                if let Some(rc) = cutoff {
                    positive("energy.nonbonded.cutoff", *rc)?;
                }
            }
        }
        Ok(())
    }

    fn validate_move(&self, mv: &MoveConfig) -> Result<(), ConfigError> {
        if !(mv.weight() >= 0.0 && mv.weight().is_finite()) {
            return Err(ConfigError::invalid("moves.prob", "weights must be non-negative"));
        }
        if let Some(name) = mv.molecule() {
            let molecule = self
                .find_molecule(name)
                .ok_or_else(|| ConfigError::UnknownMolecule(name.to_string()))?;
            let needs_chain = matches!(
                mv,
                MoveConfig::MoleculeTransRot { .. }
                    | MoveConfig::Crankshaft(_)
                    | MoveConfig::Pivot(_)
                    | MoveConfig::Cluster { .. }
            );
            if needs_chain && molecule.atomic {
                return Err(ConfigError::invalid(
                    format!("moves.{}", name),
                    "molecular moves cannot target atomic molecules",
                ));
            }
        }
        match mv {
            MoveConfig::Crankshaft(c) | MoveConfig::Pivot(c) => {
                if c.min_len == 0 || c.min_len > c.max_len {
                    return Err(ConfigError::invalid(
                        format!("moves.{}.minlen", c.molecule),
                        format!("need 1 <= minlen <= maxlen, got {}..{}", c.min_len, c.max_len),
                    ));
                }
            }
            MoveConfig::Cluster {
                threshold,
                cluster_molecules,
                ..
            } => {
                if !(*threshold > 0.0) {
                    return Err(ConfigError::invalid("moves.moltransrotcluster.threshold", "must be positive"));
                }
                for name in cluster_molecules {
                    if self.find_molecule(name).is_none() {
                        return Err(ConfigError::UnknownMolecule(name.clone()));
                    }
                }
            }
            MoveConfig::Isobaric { dp, pressure, .. } => {
                if *dp < 0.0 || *pressure < 0.0 {
                    return Err(ConfigError::invalid(
                        "moves.isobaric",
                        "dp and pressure must be non-negative",
                    ));
                }
            }
            MoveConfig::Titration { processes, .. } => {
                for name in processes {
                    if !self.processes.iter().any(|p| &p.name == name) {
                        return Err(ConfigError::UnknownProcess(name.clone()));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_analysis(&self, analysis: &AnalysisConfig) -> Result<(), ConfigError> {
        if analysis.interval() == Some(0) {
            return Err(ConfigError::invalid("analysis.nstep", "must be at least 1"));
        }
        match analysis {
            AnalysisConfig::AtomRdf { pairs, .. } => {
                for pair in pairs {
                    Self::validate_rdf_pair(pair)?;
                    for name in [&pair.first, &pair.second] {
                        if self.find_atom(name).is_none() {
                            return Err(ConfigError::UnknownAtom(name.clone()));
                        }
                    }
                }
            }
            AnalysisConfig::MolRdf { pairs, .. } => {
                for pair in pairs {
                    Self::validate_rdf_pair(pair)?;
                    for name in [&pair.first, &pair.second] {
                        if self.find_molecule(name).is_none() {
                            return Err(ConfigError::UnknownMolecule(name.clone()));
                        }
                    }
                }
            }
            AnalysisConfig::Kirkwood { dr, .. } => {
                if !(*dr > 0.0) {
                    return Err(ConfigError::invalid("analysis.kirkwoodfactor.dr", "must be positive"));
                }
            }
            AnalysisConfig::VirtualVolume { dv, .. } => {
                if *dv == 0.0 || !dv.is_finite() {
                    return Err(ConfigError::invalid("analysis.virtualvolume.dV", "must be non-zero"));
                }
            }
            AnalysisConfig::PolymerShape { molecules, .. } => {
                for name in molecules {
                    if self.find_molecule(name).is_none() {
                        return Err(ConfigError::UnknownMolecule(name.clone()));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_rdf_pair(pair: &RdfPairConfig) -> Result<(), ConfigError> {
        if !(pair.dr > 0.0) {
            return Err(ConfigError::invalid("analysis.rdf.dr", "must be positive"));
        }
        if !(1..=3).contains(&pair.dim) {
            return Err(ConfigError::invalid(
                "analysis.rdf.dim",
                format!("must be 1, 2 or 3, got {}", pair.dim),
            ));
        }
        Ok(())
    }

    fn validate_system(&self) -> Result<(), ConfigError> {
        let system = &self.system;
        if !(system.temperature > 0.0 && system.temperature.is_finite()) {
            return Err(ConfigError::invalid("system.temperature", "must be positive"));
        }
        if !(system.drift_tolerance > 0.0) {
            return Err(ConfigError::invalid("system.drift_tolerance", "must be positive"));
        }
        if system.drift_interval == Some(0) {
            return Err(ConfigError::invalid("system.drift_interval", "must be at least 1"));
        }
        let cutoffs = [
            self.energy.lj_cutoff,
            match &self.energy.electrostatics {
                ElectrostaticsConfig::None => None,
                ElectrostaticsConfig::Plain { cutoff, .. }
                | ElectrostaticsConfig::Yukawa { cutoff, .. } => *cutoff,
                ElectrostaticsConfig::Wolf { cutoff, .. } => Some(*cutoff),
                ElectrostaticsConfig::Ewald(p) => Some(p.cutoff),
            },
        ];
        if let Some(rc) = cutoffs.into_iter().flatten().reduce(f64::max) {
            if matches!(system.geometry, Geometry::Cuboid { .. } | Geometry::Slab { .. })
                && system.geometry.min_length() < 2.0 * rc
            {
                return Err(ConfigError::invalid(
                    "system.geometry",
                    format!(
                        "smallest periodic side {:.3} Å is below twice the cutoff {:.3} Å",
                        system.geometry.min_length(),
                        rc
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Assembles a [`SimulationConfig`] and validates it in [`build`](Self::build).
#[derive(Default)]
pub struct SimulationConfigBuilder {
    atoms: Vec<AtomConfig>,
    molecules: Vec<MoleculeConfig>,
    energy: Option<EnergyConfig>,
    processes: Vec<ProcessConfig>,
    moves: Vec<MoveConfig>,
    analysis: Vec<AnalysisConfig>,
    temperature: Option<f64>,
    geometry: Option<Geometry>,
    macro_steps: Option<u64>,
    micro_steps: Option<u64>,
    seed: Option<Seed>,
    drift_tolerance: Option<f64>,
    drift_interval: Option<u64>,
    unittest: Option<UnitTestConfig>,
    state_file: Option<PathBuf>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn atom(mut self, atom: AtomConfig) -> Self {
        self.atoms.push(atom);
        self
    }
    pub fn molecule(mut self, molecule: MoleculeConfig) -> Self {
        self.molecules.push(molecule);
        self
    }
    pub fn energy(mut self, energy: EnergyConfig) -> Self {
        self.energy = Some(energy);
        self
    }
    pub fn process(mut self, process: ProcessConfig) -> Self {
        self.processes.push(process);
        self
    }
    pub fn add_move(mut self, mv: MoveConfig) -> Self {
        self.moves.push(mv);
        self
    }
    pub fn analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis.push(analysis);
        self
    }
    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }
    pub fn mc_loop(mut self, macro_steps: u64, micro_steps: u64) -> Self {
        self.macro_steps = Some(macro_steps);
        self.micro_steps = Some(micro_steps);
        self
    }
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn drift_tolerance(mut self, tolerance: f64) -> Self {
        self.drift_tolerance = Some(tolerance);
        self
    }
    pub fn drift_interval(mut self, interval: Option<u64>) -> Self {
        self.drift_interval = interval;
        self
    }
    pub fn unittest(mut self, unittest: Option<UnitTestConfig>) -> Self {
        self.unittest = unittest;
        self
    }
    pub fn state_file(mut self, path: Option<PathBuf>) -> Self {
        self.state_file = path;
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            atoms: self.atoms,
            molecules: self.molecules,
            energy: self.energy.unwrap_or_default(),
            processes: self.processes,
            moves: self.moves,
            analysis: self.analysis,
            system: SystemConfig {
                temperature: self
                    .temperature
                    .ok_or(ConfigError::MissingParameter("system.temperature"))?,
                geometry: self
                    .geometry
                    .ok_or(ConfigError::MissingParameter("system.geometry"))?,
                macro_steps: self
                    .macro_steps
                    .ok_or(ConfigError::MissingParameter("system.mcloop.macro"))?,
                micro_steps: self
                    .micro_steps
                    .ok_or(ConfigError::MissingParameter("system.mcloop.micro"))?,
                seed: self.seed.unwrap_or(Seed::Fixed(DEFAULT_SEED)),
                drift_tolerance: self.drift_tolerance.unwrap_or(DEFAULT_DRIFT_TOLERANCE),
                drift_interval: self.drift_interval,
                unittest: self.unittest,
                state_file: self.state_file,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salt_builder() -> SimulationConfigBuilder {
        let mut na = AtomConfig::new("Na");
        na.charge = 1.0;
        na.sigma = 3.33;
        let mut cl = AtomConfig::new("Cl");
        cl.charge = -1.0;
        cl.sigma = 4.4;
        let mut salt = MoleculeConfig::new("salt");
        salt.atoms = vec!["Na".into(), "Cl".into()];
        salt.atomic = true;
        salt.n_init = 10;
        SimulationConfigBuilder::new()
            .atom(na)
            .atom(cl)
            .molecule(salt)
            .temperature(298.15)
            .geometry(Geometry::cube(50.0).unwrap())
            .mc_loop(2, 100)
    }

    #[test]
    fn build_fills_defaults() {
        let config = salt_builder().build().unwrap();
        assert_eq!(config.system.seed, Seed::Fixed(DEFAULT_SEED));
        assert_eq!(config.system.drift_tolerance, DEFAULT_DRIFT_TOLERANCE);
        assert_eq!(config.energy, EnergyConfig::default());
        assert!(config.resume_file().is_none());
    }

    #[test]
    fn build_fails_without_temperature() {
        let result = SimulationConfigBuilder::new()
            .geometry(Geometry::cube(10.0).unwrap())
            .mc_loop(1, 1)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("system.temperature")));
    }

    #[test]
    fn build_fails_without_mcloop() {
        let result = SimulationConfigBuilder::new()
            .temperature(300.0)
            .geometry(Geometry::cube(10.0).unwrap())
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("system.mcloop.macro")));
    }

    #[test]
    fn unknown_atom_in_molecule_is_rejected() {
        let mut bad = MoleculeConfig::new("bad");
        bad.atoms = vec!["K".into()];
        let result = salt_builder().molecule(bad).build();
        assert_eq!(result, Err(ConfigError::UnknownAtom("K".into())));
    }

    #[test]
    fn duplicate_atom_is_rejected() {
        let result = salt_builder().atom(AtomConfig::new("Na")).build();
        assert!(matches!(result, Err(ConfigError::Duplicate { section: "atomlist", .. })));
    }

    #[test]
    fn move_targeting_unknown_molecule_is_rejected() {
        let result = salt_builder()
            .add_move(MoveConfig::AtomTranslate {
                molecule: "water".into(),
                dp: None,
                direction: Vector3::repeat(1.0),
                per_atom: true,
                weight: 1.0,
            })
            .build();
        assert_eq!(result, Err(ConfigError::UnknownMolecule("water".into())));
    }

    #[test]
    fn molecular_move_on_atomic_kind_is_rejected() {
        let result = salt_builder()
            .add_move(MoveConfig::MoleculeTransRot {
                molecule: "salt".into(),
                dp: 1.0,
                dprot: 0.5,
                direction: Vector3::repeat(1.0),
                per_molecule: true,
                weight: 1.0,
            })
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn chain_length_bounds_are_checked() {
        let mut polymer = MoleculeConfig::new("polymer");
        polymer.atoms = vec!["Na".into(); 5];
        let result = salt_builder()
            .molecule(polymer)
            .add_move(MoveConfig::Pivot(ChainMoveConfig {
                molecule: "polymer".into(),
                dp: 1.0,
                min_len: 4,
                max_len: 2,
                per_molecule: true,
                weight: 1.0,
            }))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn titration_with_unknown_process_is_rejected() {
        let result = salt_builder()
            .add_move(MoveConfig::Titration {
                processes: vec!["acid".into()],
                weight: 1.0,
            })
            .build();
        assert_eq!(result, Err(ConfigError::UnknownProcess("acid".into())));
    }

    #[test]
    fn process_species_must_exist() {
        let result = salt_builder()
            .process(ProcessConfig {
                name: "acid".into(),
                bound: "HA".into(),
                free: "Cl".into(),
                pkd: 4.0,
                px: 7.0,
            })
            .build();
        assert_eq!(result, Err(ConfigError::UnknownAtom("HA".into())));
    }

    #[test]
    fn cutoff_longer_than_half_box_is_rejected() {
        let result = salt_builder()
            .energy(EnergyConfig {
                epsr: 80.0,
                electrostatics: ElectrostaticsConfig::Wolf {
                    alpha: 0.2,
                    cutoff: 30.0,
                },
                lj_cutoff: None,
            })
            .build();
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "system.geometry"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn ewald_requires_cuboid() {
        let result = salt_builder()
            .geometry(Geometry::sphere(40.0).unwrap())
            .energy(EnergyConfig {
                epsr: 80.0,
                electrostatics: ElectrostaticsConfig::Ewald(EwaldParameters {
                    alpha: 0.2,
                    cutoff: 10.0,
                    cutoff_k: 5.0,
                    eps_surf: None,
                    spherical_sum: true,
                    update_frequency: 1000,
                }),
                lj_cutoff: None,
            })
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn rdf_dimension_out_of_range_is_rejected() {
        let result = salt_builder()
            .analysis(AnalysisConfig::AtomRdf {
                interval: 10,
                pairs: vec![RdfPairConfig {
                    first: "Na".into(),
                    second: "Cl".into(),
                    dr: 0.1,
                    dim: 4,
                    file: "rdf.dat".into(),
                }],
            })
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn resume_file_prefers_system_setting() {
        let config = salt_builder()
            .analysis(AnalysisConfig::StateFile {
                interval: None,
                file: "state".into(),
            })
            .state_file(Some("restart.json".into()))
            .build()
            .unwrap();
        assert_eq!(config.resume_file(), Some(&PathBuf::from("restart.json")));
    }
}
