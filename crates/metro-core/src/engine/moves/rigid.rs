use super::{MonteCarloMove, Proposal, Trial, choose};
use crate::core::models::ids::MoleculeKindId;
use crate::core::models::particle::Particle;
use crate::core::utils::geometry::{random_half, random_rotation};
use crate::engine::context::System;
use crate::engine::rng::McRng;
use nalgebra::{Point3, Rotation3, Vector3};

/// Rotates the particles `indices` about `center`, shifts them by `translation` and wraps
/// them back into the container. Dipoles turn with the body.
pub(super) fn rigid_transform(
    system: &System,
    indices: impl IntoIterator<Item = usize>,
    center: &Point3<f64>,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Vec<(usize, Particle)> {
    let geometry = &system.space.geometry;
    indices
        .into_iter()
        .map(|i| {
            let mut particle = system.space.particles[i].clone();
            let relative = geometry.vdist(&particle.position, center);
            particle.position = center + rotation * relative + translation;
            geometry.boundary(&mut particle.position);
            particle.dipole = rotation * particle.dipole;
            (i, particle)
        })
        .collect()
}

pub(super) fn random_translation(rng: &mut McRng, dp: f64, direction: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(
        random_half(rng, dp),
        random_half(rng, dp),
        random_half(rng, dp),
    )
    .component_mul(direction)
}

/// Rigid-body translation and rotation of one molecule about its mass center.
#[derive(Debug, Clone)]
pub struct MoleculeTransRot {
    name: String,
    molecule: MoleculeKindId,
    dp: f64,
    dprot: f64,
    direction: Vector3<f64>,
    per_molecule: bool,
    weight: f64,
}

impl MoleculeTransRot {
    pub fn new(
        molecule_name: &str,
        molecule: MoleculeKindId,
        dp: f64,
        dprot: f64,
        direction: Vector3<f64>,
        per_molecule: bool,
        weight: f64,
    ) -> Self {
        Self {
            name: format!("moltransrot[{molecule_name}]"),
            molecule,
            dp,
            dprot,
            direction,
            per_molecule,
            weight,
        }
    }
}

impl MonteCarloMove for MoleculeTransRot {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn repeats(&self, system: &System) -> usize {
        if self.per_molecule {
            system.space.groups_of_kind(self.molecule).count()
        } else {
            1
        }
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let groups: Vec<usize> = system.space.groups_of_kind(self.molecule).collect();
        let Some(&group_index) = choose(&groups, rng) else {
            return Proposal::Skipped;
        };
        if self.dp <= 0.0 && self.dprot <= 0.0 {
            return Proposal::Skipped;
        }
        let group = system.space.groups[group_index];
        let center = system.space.mass_center(&system.topology, group_index);
        let translation = random_translation(rng, self.dp, &self.direction);
        let rotatable = system.topology.molecule(group.kind).rotatable;
        let rotation = if rotatable && self.dprot > 0.0 {
            random_rotation(rng, self.dprot)
        } else {
            Rotation3::identity()
        };
        let changes = rigid_transform(system, group.range(), &center, &rotation, &translation);
        Proposal::Trial(Trial {
            displacement2: translation.norm_squared(),
            ..Trial::new(changes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    #[test]
    fn internal_distances_are_preserved() {
        let system = test_support::system();
        let mut mv = MoleculeTransRot::new(
            "chain",
            MoleculeKindId(1),
            3.0,
            1.0,
            Vector3::repeat(1.0),
            true,
            1.0,
        );
        let mut rng = test_support::rng();
        assert_eq!(mv.repeats(&system), 2);
        let Proposal::Trial(trial) = mv.propose(&system, &mut rng) else {
            panic!("expected a trial");
        };
        assert_eq!(trial.changes.len(), 6);
        let geometry = &system.space.geometry;
        for w in trial.changes.windows(2) {
            let (a, pa) = &w[0];
            let (b, pb) = &w[1];
            let before = geometry.distance(&system.space.particles[*a].position, &system.space.particles[*b].position);
            let after = geometry.distance(&pa.position, &pb.position);
            assert!((before - after).abs() < 1e-9);
        }
    }

    #[test]
    fn mass_center_moves_by_translation() {
        let mut system = test_support::system();
        let mut mv = MoleculeTransRot::new(
            "chain",
            MoleculeKindId(1),
            2.0,
            0.0,
            Vector3::repeat(1.0),
            false,
            1.0,
        );
        let mut rng = test_support::rng();
        let Proposal::Trial(trial) = mv.propose(&system, &mut rng) else {
            panic!("expected a trial");
        };
        let group_index = system.space.particles[trial.changes[0].0].group;
        let before = system.space.mass_center(&system.topology, group_index);
        test_support::apply(&mut system, &trial);
        let after = system.space.mass_center(&system.topology, group_index);
        let shift = system.space.geometry.vdist(&after, &before);
        assert!((shift.norm_squared() - trial.displacement2).abs() < 1e-9);
    }
}
