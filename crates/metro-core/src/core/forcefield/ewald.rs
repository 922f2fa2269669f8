use super::electrostatics::EwaldParameters;
use crate::core::models::particle::Particle;
use nalgebra::{Complex, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reciprocal-space state of an Ewald summation.
///
/// Holds the k-vector set for the current box, the per-vector prefactors and the charge
/// structure factors `Q(k) = Σ q_j exp(i k·r_j)`, plus the total charge dipole used by the
/// surface term. Structure factors are updated incrementally by [`propose`](Self::propose)
/// and replaced on [`commit`](Self::commit).
#[derive(Debug, Clone, PartialEq)]
pub struct ReciprocalSpace {
    params: EwaldParameters,
    lb: f64,
    volume: f64,
    kvectors: Vec<Vector3<f64>>,
    prefactors: Vec<f64>,
    structure_factors: Vec<Complex<f64>>,
    charge_dipole: Vector3<f64>,
}

/// Tentative reciprocal-space state for a trial configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReciprocalUpdate {
    structure_factors: Vec<Complex<f64>>,
    charge_dipole: Vector3<f64>,
    pub energy: f64,
}

impl ReciprocalSpace {
    pub fn new(params: EwaldParameters, lb: f64, lengths: Vector3<f64>, particles: &[Particle]) -> Self {
        let (kvectors, prefactors) = generate_kvectors(&params, &lengths);
        let mut reciprocal = Self {
            params,
            lb,
            volume: lengths.x * lengths.y * lengths.z,
            kvectors,
            prefactors,
            structure_factors: Vec::new(),
            charge_dipole: Vector3::zeros(),
        };
        reciprocal.rebuild(particles);
        reciprocal
    }

    /// Same summation for a resized box, rebuilt from scratch.
    pub fn resized(&self, lengths: Vector3<f64>, particles: &[Particle]) -> Self {
        Self::new(self.params, self.lb, lengths, particles)
    }

    pub fn kvector_count(&self) -> usize {
        self.kvectors.len()
    }

    pub fn params(&self) -> &EwaldParameters {
        &self.params
    }

    /// Recomputes all structure factors from the particle positions.
    pub fn rebuild(&mut self, particles: &[Particle]) {
        let charged: Vec<&Particle> = particles.iter().filter(|p| p.charge != 0.0).collect();
        let compute = |k: &Vector3<f64>| -> Complex<f64> {
            charged
                .iter()
                .map(|p| Complex::from_polar(p.charge, k.dot(&p.position.coords)))
                .sum()
        };
        #[cfg(feature = "parallel")]
        let structure_factors = self.kvectors.par_iter().map(compute).collect();
        #[cfg(not(feature = "parallel"))]
        let structure_factors = self.kvectors.iter().map(compute).collect();
        self.structure_factors = structure_factors;
        self.charge_dipole = charged.iter().map(|p| p.position.coords * p.charge).sum();
    }

    /// Fourier-space energy plus surface term, in kT.
    pub fn energy(&self) -> f64 {
        self.energy_of(&self.structure_factors, &self.charge_dipole)
    }

    fn energy_of(&self, structure_factors: &[Complex<f64>], charge_dipole: &Vector3<f64>) -> f64 {
        let sum: f64 = self
            .prefactors
            .iter()
            .zip(structure_factors)
            .map(|(a, q)| a * q.norm_sqr())
            .sum();
        self.lb * 2.0 * PI / self.volume * sum + self.surface_energy(charge_dipole)
    }

    fn surface_energy(&self, charge_dipole: &Vector3<f64>) -> f64 {
        match self.params.eps_surf {
            Some(eps_surf) if eps_surf > 0.0 => {
                self.lb * 2.0 * PI / ((2.0 * eps_surf + 1.0) * self.volume)
                    * charge_dipole.norm_squared()
            }
            _ => 0.0,
        }
    }

    /// Structure factors and energy after replacing each `old` particle with its `new` state.
    pub fn propose<'a, I>(&self, changes: I) -> ReciprocalUpdate
    where
        I: IntoIterator<Item = (&'a Particle, &'a Particle)>,
    {
        let changes: Vec<(&Particle, &Particle)> = changes
            .into_iter()
            .filter(|(old, new)| old.charge != 0.0 || new.charge != 0.0)
            .collect();
        let mut structure_factors = self.structure_factors.clone();
        let mut charge_dipole = self.charge_dipole;
        for (old, new) in &changes {
            charge_dipole += new.position.coords * new.charge - old.position.coords * old.charge;
        }
        let apply = |(k, q): (&Vector3<f64>, &mut Complex<f64>)| {
            for (old, new) in &changes {
                *q += Complex::from_polar(new.charge, k.dot(&new.position.coords))
                    - Complex::from_polar(old.charge, k.dot(&old.position.coords));
            }
        };
        #[cfg(feature = "parallel")]
        self.kvectors
            .par_iter()
            .zip(structure_factors.par_iter_mut())
            .for_each(apply);
        #[cfg(not(feature = "parallel"))]
        self.kvectors
            .iter()
            .zip(structure_factors.iter_mut())
            .for_each(apply);
        let energy = self.energy_of(&structure_factors, &charge_dipole);
        ReciprocalUpdate {
            structure_factors,
            charge_dipole,
            energy,
        }
    }

    pub fn commit(&mut self, update: ReciprocalUpdate) {
        self.structure_factors = update.structure_factors;
        self.charge_dipole = update.charge_dipole;
    }

    /// The incrementally maintained sums, for exact restoration on resume.
    pub fn snapshot(&self) -> ReciprocalSnapshot {
        ReciprocalSnapshot {
            structure_factors: self.structure_factors.iter().map(|q| (q.re, q.im)).collect(),
            charge_dipole: self.charge_dipole,
        }
    }

    /// Replaces the sums with a snapshot taken for the same k-vector set.
    ///
    /// Returns `false`, leaving `self` untouched, if the k-vector counts differ.
    pub fn restore(&mut self, snapshot: &ReciprocalSnapshot) -> bool {
        if snapshot.structure_factors.len() != self.kvectors.len() {
            return false;
        }
        self.structure_factors = snapshot
            .structure_factors
            .iter()
            .map(|&(re, im)| Complex::new(re, im))
            .collect();
        self.charge_dipole = snapshot.charge_dipole;
        true
    }
}

/// Serializable copy of the structure factors and charge dipole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReciprocalSnapshot {
    pub structure_factors: Vec<(f64, f64)>,
    pub charge_dipole: Vector3<f64>,
}

/// Enumerates the half-space of k-vectors with `nx >= 0` inside the cutoff, returning each
/// vector with its prefactor `w exp(-k²/4α²)/k²` (`w = 2` for `nx > 0` to account for `-k`).
fn generate_kvectors(params: &EwaldParameters, lengths: &Vector3<f64>) -> (Vec<Vector3<f64>>, Vec<f64>) {
    let kc = params.cutoff_k;
    let n_max = if params.spherical_sum {
        kc.ceil() as i64
    } else {
        kc.floor() as i64
    };
    let kc2 = kc * kc;
    let two_pi = 2.0 * PI;
    let mut kvectors = Vec::new();
    let mut prefactors = Vec::new();
    for nx in 0..=n_max {
        for ny in -n_max..=n_max {
            for nz in -n_max..=n_max {
                if nx == 0 && ny == 0 && nz == 0 {
                    continue;
                }
                let n2 = (nx * nx + ny * ny + nz * nz) as f64;
                if params.spherical_sum && n2 > kc2 {
                    continue;
                }
                let k = Vector3::new(
                    two_pi * nx as f64 / lengths.x,
                    two_pi * ny as f64 / lengths.y,
                    two_pi * nz as f64 / lengths.z,
                );
                let k2 = k.norm_squared();
                let weight = if nx > 0 { 2.0 } else { 1.0 };
                kvectors.push(k);
                prefactors.push(weight * (-k2 / (4.0 * params.alpha * params.alpha)).exp() / k2);
            }
        }
    }
    (kvectors, prefactors)
}
