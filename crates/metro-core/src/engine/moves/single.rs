use super::{MonteCarloMove, Proposal, Trial, choose};
use crate::core::models::ids::MoleculeKindId;
use crate::core::utils::geometry::{random_half, random_rotation};
use crate::engine::context::System;
use crate::engine::rng::McRng;
use nalgebra::Vector3;

/// Displaces one particle of the target kind by up to `±dp` along each unmasked axis.
#[derive(Debug, Clone)]
pub struct AtomTranslate {
    name: String,
    molecule: MoleculeKindId,
    /// Overrides the per-type `dp` when set.
    dp: Option<f64>,
    direction: Vector3<f64>,
    per_atom: bool,
    weight: f64,
}

impl AtomTranslate {
    pub fn new(
        molecule_name: &str,
        molecule: MoleculeKindId,
        dp: Option<f64>,
        direction: Vector3<f64>,
        per_atom: bool,
        weight: f64,
    ) -> Self {
        Self {
            name: format!("atomtranslate[{molecule_name}]"),
            molecule,
            dp,
            direction,
            per_atom,
            weight,
        }
    }
}

impl MonteCarloMove for AtomTranslate {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn repeats(&self, system: &System) -> usize {
        if self.per_atom {
            system.space.particles_of_kind(self.molecule).len()
        } else {
            1
        }
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let candidates = system.space.particles_of_kind(self.molecule);
        let Some(&index) = choose(&candidates, rng) else {
            return Proposal::Skipped;
        };
        let mut particle = system.space.particles[index].clone();
        let dp = self
            .dp
            .unwrap_or_else(|| system.topology.atom(particle.atom_id).dp);
        if dp <= 0.0 {
            return Proposal::Skipped;
        }
        let displacement = Vector3::new(
            random_half(rng, dp),
            random_half(rng, dp),
            random_half(rng, dp),
        )
        .component_mul(&self.direction);
        particle.position += displacement;
        system.space.geometry.boundary(&mut particle.position);
        Proposal::Trial(Trial {
            displacement2: displacement.norm_squared(),
            ..Trial::new(vec![(index, particle)])
        })
    }
}

/// Turns the dipole of one dipolar particle of the target kind by up to `dprot` radians.
#[derive(Debug, Clone)]
pub struct AtomRotate {
    name: String,
    molecule: MoleculeKindId,
    dprot: Option<f64>,
    per_atom: bool,
    weight: f64,
}

impl AtomRotate {
    pub fn new(
        molecule_name: &str,
        molecule: MoleculeKindId,
        dprot: Option<f64>,
        per_atom: bool,
        weight: f64,
    ) -> Self {
        Self {
            name: format!("atomrotate[{molecule_name}]"),
            molecule,
            dprot,
            per_atom,
            weight,
        }
    }
}

impl MonteCarloMove for AtomRotate {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn repeats(&self, system: &System) -> usize {
        if self.per_atom {
            system.space.particles_of_kind(self.molecule).len()
        } else {
            1
        }
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let candidates: Vec<usize> = system
            .space
            .particles_of_kind(self.molecule)
            .into_iter()
            .filter(|&i| system.space.particles[i].is_dipolar())
            .collect();
        let Some(&index) = choose(&candidates, rng) else {
            return Proposal::Skipped;
        };
        let mut particle = system.space.particles[index].clone();
        let dprot = self
            .dprot
            .unwrap_or_else(|| system.topology.atom(particle.atom_id).dprot);
        if dprot <= 0.0 {
            return Proposal::Skipped;
        }
        let rotation = random_rotation(rng, dprot);
        let old = particle.dipole;
        particle.dipole = rotation * old;
        Proposal::Trial(Trial {
            displacement2: (particle.dipole - old).norm_squared(),
            ..Trial::new(vec![(index, particle)])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    #[test]
    fn translate_moves_one_particle_within_dp() {
        let system = test_support::system();
        let mut mv = AtomTranslate::new("ions", MoleculeKindId(0), None, Vector3::repeat(1.0), true, 1.0);
        let mut rng = test_support::rng();
        assert_eq!(mv.repeats(&system), 4);
        for _ in 0..100 {
            let Proposal::Trial(trial) = mv.propose(&system, &mut rng) else {
                panic!("expected a trial");
            };
            assert_eq!(trial.changes.len(), 1);
            let (i, new) = &trial.changes[0];
            assert!(*i < 4);
            let d = system.space.geometry.vdist(&new.position, &system.space.particles[*i].position);
            assert!(d.amax() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn direction_mask_freezes_axes() {
        let system = test_support::system();
        let mut mv = AtomTranslate::new(
            "ions",
            MoleculeKindId(0),
            Some(2.0),
            Vector3::new(0.0, 0.0, 1.0),
            false,
            1.0,
        );
        let mut rng = test_support::rng();
        let Proposal::Trial(trial) = mv.propose(&system, &mut rng) else {
            panic!("expected a trial");
        };
        let (i, new) = &trial.changes[0];
        let old = &system.space.particles[*i].position;
        assert_eq!(new.position.x, old.x);
        assert_eq!(new.position.y, old.y);
    }

    #[test]
    fn zero_displacement_skips() {
        let system = test_support::system();
        let mut mv = AtomTranslate::new("ions", MoleculeKindId(0), Some(0.0), Vector3::repeat(1.0), false, 1.0);
        assert_eq!(mv.propose(&system, &mut test_support::rng()), Proposal::Skipped);
    }

    #[test]
    fn rotate_preserves_dipole_length() {
        let system = test_support::system();
        let mut mv = AtomRotate::new("ions", MoleculeKindId(0), None, false, 1.0);
        let Proposal::Trial(trial) = mv.propose(&system, &mut test_support::rng()) else {
            panic!("expected a trial");
        };
        let (i, new) = &trial.changes[0];
        let old = &system.space.particles[*i];
        assert!((new.dipole.norm() - old.dipole.norm()).abs() < 1e-12);
        assert_eq!(new.position, old.position);
    }

    #[test]
    fn rotate_skips_kinds_without_dipoles() {
        let system = test_support::system();
        let mut mv = AtomRotate::new("chain", MoleculeKindId(1), Some(1.0), false, 1.0);
        assert_eq!(mv.propose(&system, &mut test_support::rng()), Proposal::Skipped);
    }
}
