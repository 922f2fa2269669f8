use super::electrostatics::{ElectrostaticKernel, Electrostatics};
use super::params::PairMatrix;
use super::potentials;
use super::term::EnergyTerm;
use crate::core::models::space::Space;
use crate::core::models::topology::Topology;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Separations below this are treated as coincident particles.
const MIN_SEPARATION: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnergyError {
    #[error("Particles {i} and {j} overlap at separation {distance:e} Å")]
    Overflow { i: usize, j: usize, distance: f64 },
    #[error("Energy evaluation around particle {0} produced NaN")]
    NotANumber(usize),
}

/// Short-range part of the potential energy function: Lennard-Jones (or hard spheres),
/// real-space electrostatics, per-particle self terms, harmonic bonds and container walls.
///
/// Ewald reciprocal space is global and lives in
/// [`ReciprocalSpace`](super::ewald::ReciprocalSpace).
#[derive(Debug, Clone, PartialEq)]
pub struct Hamiltonian {
    pairs: PairMatrix,
    electrostatics: ElectrostaticKernel,
    lj_cutoff2: f64,
}

impl Hamiltonian {
    pub fn new(
        topology: &Topology,
        electrostatics: Electrostatics,
        bjerrum_length: f64,
        epsr: f64,
        lj_cutoff: Option<f64>,
    ) -> Self {
        let lj_cutoff = lj_cutoff.unwrap_or(f64::INFINITY);
        Self {
            pairs: PairMatrix::lorentz_berthelot(topology.atoms()),
            electrostatics: ElectrostaticKernel::new(electrostatics, bjerrum_length, epsr),
            lj_cutoff2: lj_cutoff * lj_cutoff,
        }
    }

    pub fn electrostatics(&self) -> &ElectrostaticKernel {
        &self.electrostatics
    }

    /// The longest finite interaction cutoff, which bounds the smallest allowed container.
    pub fn max_cutoff(&self) -> Option<f64> {
        let lj = self.lj_cutoff2.sqrt();
        let el = self.electrostatics.scheme().cutoff();
        match (lj.is_finite().then_some(lj), el) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Nonbonded energy between particles `i` and `j`.
    #[inline]
    pub fn pair_energy(&self, space: &Space, i: usize, j: usize) -> Result<EnergyTerm, EnergyError> {
        let a = &space.particles[i];
        let b = &space.particles[j];
        let r_vec = space.geometry.vdist(&a.position, &b.position);
        let r2 = r_vec.norm_squared();
        if r2 < MIN_SEPARATION * MIN_SEPARATION {
            return Err(EnergyError::Overflow {
                i,
                j,
                distance: r2.sqrt(),
            });
        }
        let coefficients = self.pairs.get(a.atom_id, b.atom_id);
        let vdw = if coefficients.is_hard_sphere() {
            potentials::hard_sphere(r2, coefficients.sigma2)
        } else if coefficients.eps4 != 0.0 && r2 < self.lj_cutoff2 {
            potentials::lennard_jones(r2, coefficients.sigma2, coefficients.eps4)
        } else {
            0.0
        };
        let mut electrostatic = self.electrostatics.pair(r2, a.charge * b.charge);
        if a.is_dipolar() && b.is_dipolar() {
            electrostatic += self
                .electrostatics
                .dipole_pair(&r_vec, r2, &a.dipole, &b.dipole);
        }
        Ok(EnergyTerm {
            vdw,
            electrostatic,
            ..EnergyTerm::default()
        })
    }

    /// `-Σ r·du/dr` contribution of the pair `(i, j)`, excluding hard-sphere contacts
    /// and dipolar terms.
    pub fn pair_virial(&self, space: &Space, i: usize, j: usize) -> f64 {
        let a = &space.particles[i];
        let b = &space.particles[j];
        let r2 = space.geometry.sqdist(&a.position, &b.position);
        if r2 < MIN_SEPARATION * MIN_SEPARATION {
            return 0.0;
        }
        let coefficients = self.pairs.get(a.atom_id, b.atom_id);
        let vdw = if coefficients.eps4 != 0.0 && r2 < self.lj_cutoff2 {
            potentials::lennard_jones_virial(r2, coefficients.sigma2, coefficients.eps4)
        } else {
            0.0
        };
        vdw + self.electrostatics.pair_virial(r2, a.charge * b.charge)
    }

    /// Energy of particle `i` with every particle outside `subset_mask` plus every
    /// particle inside the mask with a larger index, so that summing over a subset counts
    /// each pair exactly once.
    fn particle_energy(&self, space: &Space, i: usize, subset_mask: &[bool]) -> Result<EnergyTerm, EnergyError> {
        let mut energy = EnergyTerm::default();
        for j in 0..space.len() {
            if j == i || (subset_mask[j] && j < i) {
                continue;
            }
            energy += self.pair_energy(space, i, j)?;
        }
        let particle = &space.particles[i];
        energy.electrostatic += self.electrostatics.self_energy(particle.charge);
        if space.geometry.collision(&particle.position) {
            energy.external = f64::INFINITY;
        }
        if energy.is_nan() {
            return Err(EnergyError::NotANumber(i));
        }
        Ok(energy)
    }

    /// Energy of all bonds with at least one end inside `subset_mask`.
    fn bonded_energy(&self, space: &Space, topology: &Topology, subset: &[usize], subset_mask: &[bool]) -> f64 {
        let mut groups: Vec<usize> = subset.iter().map(|&i| space.particles[i].group).collect();
        groups.sort_unstable();
        groups.dedup();
        let mut energy = 0.0;
        for group_index in groups {
            let group = &space.groups[group_index];
            if group.atomic {
                continue;
            }
            for bond in &topology.molecule(group.kind).bonds {
                let (a, b) = (group.begin + bond.first, group.begin + bond.second);
                if subset_mask[a] || subset_mask[b] {
                    let r = space
                        .geometry
                        .distance(&space.particles[a].position, &space.particles[b].position);
                    energy += potentials::harmonic_bond(r, bond.k, bond.req);
                }
            }
        }
        energy
    }

    /// Energy contribution of an arbitrary particle subset: its interactions with the rest
    /// of the system, its internal pairs, bonds touching it and its self and wall terms.
    ///
    /// # Errors
    ///
    /// Returns [`EnergyError`] if two particles coincide or the result is NaN; the
    /// configuration must then be rejected.
    pub fn energy_of(&self, space: &Space, topology: &Topology, subset: &[usize]) -> Result<EnergyTerm, EnergyError> {
        let mut subset_mask = vec![false; space.len()];
        for &i in subset {
            subset_mask[i] = true;
        }

        #[cfg(feature = "parallel")]
        let nonbonded = subset
            .par_iter()
            .map(|&i| self.particle_energy(space, i, &subset_mask))
            .try_reduce(EnergyTerm::default, |acc, term| Ok(acc + term))?;

        #[cfg(not(feature = "parallel"))]
        let nonbonded = subset
            .iter()
            .try_fold(EnergyTerm::default(), |acc, &i| {
                self.particle_energy(space, i, &subset_mask)
                    .map(|term| acc + term)
            })?;

        let bonded = self.bonded_energy(space, topology, subset, &subset_mask);
        Ok(EnergyTerm {
            bonded,
            ..nonbonded
        })
    }

    /// Short-range energy of the whole system.
    pub fn system_energy(&self, space: &Space, topology: &Topology) -> Result<EnergyTerm, EnergyError> {
        let all: Vec<usize> = (0..space.len()).collect();
        self.energy_of(space, topology, &all)
    }

    /// Total virial `Σ_{i<j} -r·du/dr` over all pairs.
    pub fn system_virial(&self, space: &Space) -> f64 {
        let n = space.len();
        let row = |i: usize| -> f64 { (i + 1..n).map(|j| self.pair_virial(space, i, j)).sum() };
        #[cfg(feature = "parallel")]
        let total = (0..n).into_par_iter().map(row).sum();
        #[cfg(not(feature = "parallel"))]
        let total = (0..n).map(row).sum();
        total
    }
}
