use super::rigid::{random_translation, rigid_transform};
use super::{MonteCarloMove, Proposal, Trial, choose};
use crate::core::models::ids::MoleculeKindId;
use crate::core::utils::geometry::random_rotation;
use crate::engine::context::System;
use crate::engine::rng::McRng;
use nalgebra::{Point3, Rotation3, Vector3};

/// A member of a detected cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Group(usize),
    /// A free particle of an atomic group.
    Particle(usize),
}

/// Rigid-body move of a seed molecule together with every unit near it.
///
/// Membership is computed as a read-only pass before the move and again with the move
/// applied; a trial that changes the membership is rejected through a zero bias, which
/// keeps forward and reverse proposals equally likely.
#[derive(Debug, Clone)]
pub struct ClusterMove {
    name: String,
    molecule: MoleculeKindId,
    /// Kinds that may join a cluster; empty means every kind.
    members: Vec<MoleculeKindId>,
    dp: f64,
    dprot: f64,
    direction: Vector3<f64>,
    threshold: f64,
    weight: f64,
    seed: Option<usize>,
    detected: Vec<Unit>,
}

impl ClusterMove {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        molecule_name: &str,
        molecule: MoleculeKindId,
        members: Vec<MoleculeKindId>,
        dp: f64,
        dprot: f64,
        direction: Vector3<f64>,
        threshold: f64,
        weight: f64,
    ) -> Self {
        Self {
            name: format!("moltransrotcluster[{molecule_name}]"),
            molecule,
            members,
            dp,
            dprot,
            direction,
            threshold,
            weight,
            seed: None,
            detected: Vec::new(),
        }
    }

    fn detect(&self, system: &System, seed: usize, center: &Point3<f64>) -> Vec<Unit> {
        let space = &system.space;
        let threshold2 = self.threshold * self.threshold;
        let mut units = Vec::new();
        for (g, group) in space.groups.iter().enumerate() {
            if g == seed || group.is_empty() {
                continue;
            }
            if !self.members.is_empty() && !self.members.contains(&group.kind) {
                continue;
            }
            if group.atomic {
                units.extend(
                    group
                        .range()
                        .filter(|&i| space.geometry.sqdist(&space.particles[i].position, center) <= threshold2)
                        .map(Unit::Particle),
                );
            } else {
                let c = space.mass_center(&system.topology, g);
                if space.geometry.sqdist(&c, center) <= threshold2 {
                    units.push(Unit::Group(g));
                }
            }
        }
        units
    }

    fn particle_indices(system: &System, seed: usize, units: &[Unit]) -> Vec<usize> {
        let mut indices: Vec<usize> = system.space.groups[seed].range().collect();
        for unit in units {
            match *unit {
                Unit::Group(g) => indices.extend(system.space.groups[g].range()),
                Unit::Particle(i) => indices.push(i),
            }
        }
        indices
    }
}

impl MonteCarloMove for ClusterMove {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let groups: Vec<usize> = system.space.groups_of_kind(self.molecule).collect();
        let Some(&seed) = choose(&groups, rng) else {
            return Proposal::Skipped;
        };
        if self.dp <= 0.0 && self.dprot <= 0.0 {
            return Proposal::Skipped;
        }
        let center = system.space.mass_center(&system.topology, seed);
        let units = self.detect(system, seed, &center);
        let indices = Self::particle_indices(system, seed, &units);
        let translation = random_translation(rng, self.dp, &self.direction);
        let rotation = if self.dprot > 0.0 {
            random_rotation(rng, self.dprot)
        } else {
            Rotation3::identity()
        };
        let changes = rigid_transform(system, indices, &center, &rotation, &translation);
        self.seed = Some(seed);
        self.detected = units;
        Proposal::Trial(Trial {
            displacement2: translation.norm_squared(),
            ..Trial::new(changes)
        })
    }

    fn ln_bias(&self, system: &System, trial: &Trial) -> f64 {
        let Some(seed) = self.seed else {
            return trial.ln_bias;
        };
        let center = system.space.mass_center(&system.topology, seed);
        if self.detect(system, seed, &center) == self.detected {
            trial.ln_bias
        } else {
            f64::NEG_INFINITY
        }
    }
}
