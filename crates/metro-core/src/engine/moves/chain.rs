use super::rigid::rigid_transform;
use super::{MonteCarloMove, Proposal, Trial, choose};
use crate::core::models::ids::MoleculeKindId;
use crate::core::models::molecule::Group;
use crate::core::utils::geometry::{random_half, rotation_from_axis_angle};
use crate::engine::config::ChainMoveConfig;
use crate::engine::context::System;
use crate::engine::rng::McRng;
use nalgebra::Vector3;
use rand::Rng;
use std::ops::Range;

/// Shared state of the internal chain moves.
#[derive(Debug, Clone)]
struct ChainMove {
    name: String,
    molecule: MoleculeKindId,
    dp: f64,
    min_len: usize,
    max_len: usize,
    per_molecule: bool,
    weight: f64,
}

impl ChainMove {
    fn new(tag: &str, config: &ChainMoveConfig, molecule: MoleculeKindId) -> Self {
        Self {
            name: format!("{tag}[{}]", config.molecule),
            molecule,
            dp: config.dp,
            min_len: config.min_len,
            max_len: config.max_len,
            per_molecule: config.per_molecule,
            weight: config.weight,
        }
    }

    fn repeats(&self, system: &System) -> usize {
        if self.per_molecule {
            system.space.groups_of_kind(self.molecule).count()
        } else {
            1
        }
    }

    /// A random group of the target kind and a segment length allowed for it.
    fn pick(&self, system: &System, rng: &mut McRng) -> Option<(Group, usize)> {
        if self.dp <= 0.0 {
            return None;
        }
        let groups: Vec<usize> = system.space.groups_of_kind(self.molecule).collect();
        let group = system.space.groups[*choose(&groups, rng)?];
        let longest = group.len().checked_sub(2)?;
        let hi = self.max_len.min(longest);
        if self.min_len > hi {
            return None;
        }
        Some((group, rng.gen_range(self.min_len..=hi)))
    }

    /// Rotates `moved` by a random angle about the axis from atom `from` to atom `to`.
    fn rotate(
        &self,
        system: &System,
        rng: &mut McRng,
        from: usize,
        to: usize,
        moved: Range<usize>,
    ) -> Proposal {
        let geometry = &system.space.geometry;
        let origin = system.space.particles[from].position;
        let axis: Vector3<f64> = geometry.vdist(&system.space.particles[to].position, &origin);
        if axis.norm_squared() < f64::EPSILON {
            return Proposal::Skipped;
        }
        let angle = random_half(rng, self.dp);
        let rotation = rotation_from_axis_angle(&axis, angle);
        let changes = rigid_transform(system, moved, &origin, &rotation, &Vector3::zeros());
        Proposal::Trial(Trial {
            displacement2: angle * angle,
            ..Trial::new(changes)
        })
    }
}

/// Rotates the atoms strictly between two chain atoms about the axis joining them.
///
/// The number of interior atoms is drawn from `[min_len, max_len]`, clipped to the chain.
#[derive(Debug, Clone)]
pub struct Crankshaft(ChainMove);

impl Crankshaft {
    pub fn new(config: &ChainMoveConfig, molecule: MoleculeKindId) -> Self {
        Self(ChainMove::new("crankshaft", config, molecule))
    }
}

impl MonteCarloMove for Crankshaft {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn weight(&self) -> f64 {
        self.0.weight
    }

    fn repeats(&self, system: &System) -> usize {
        self.0.repeats(system)
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let Some((group, interior)) = self.0.pick(system, rng) else {
            return Proposal::Skipped;
        };
        let first = group.begin + rng.gen_range(0..group.len() - interior - 1);
        let last = first + interior + 1;
        self.0.rotate(system, rng, first, last, first + 1..last)
    }
}

/// Rotates a terminal segment about the bond that precedes it.
///
/// The segment length is drawn from `[min_len, max_len]` and either chain end is chosen
/// with equal probability.
#[derive(Debug, Clone)]
pub struct Pivot(ChainMove);

impl Pivot {
    pub fn new(config: &ChainMoveConfig, molecule: MoleculeKindId) -> Self {
        Self(ChainMove::new("pivot", config, molecule))
    }
}

impl MonteCarloMove for Pivot {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn weight(&self) -> f64 {
        self.0.weight
    }

    fn repeats(&self, system: &System) -> usize {
        self.0.repeats(system)
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let Some((group, tail)) = self.0.pick(system, rng) else {
            return Proposal::Skipped;
        };
        if rng.gen_bool(0.5) {
            let pivot = group.end - tail - 1;
            self.0.rotate(system, rng, pivot - 1, pivot, pivot + 1..group.end)
        } else {
            let pivot = group.begin + tail;
            self.0.rotate(system, rng, pivot + 1, pivot, group.begin..pivot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    fn config(min_len: usize, max_len: usize) -> ChainMoveConfig {
        ChainMoveConfig {
            molecule: "chain".into(),
            dp: 2.0,
            min_len,
            max_len,
            per_molecule: true,
            weight: 1.0,
        }
    }

    fn bond_lengths(system: &System, positions: &[nalgebra::Point3<f64>]) -> Vec<f64> {
        positions
            .windows(2)
            .map(|w| system.space.geometry.distance(&w[0], &w[1]))
            .collect()
    }

    fn chain_positions(system: &System, group_index: usize) -> Vec<nalgebra::Point3<f64>> {
        let g = system.space.groups[group_index];
        system.space.particles[g.range()].iter().map(|p| p.position).collect()
    }

    #[test]
    fn crankshaft_keeps_bond_lengths() {
        let mut system = test_support::system();
        let mut mv = Crankshaft::new(&config(1, 4), MoleculeKindId(1));
        let mut rng = test_support::rng();
        for _ in 0..50 {
            let Proposal::Trial(trial) = mv.propose(&system, &mut rng) else {
                panic!("expected a trial");
            };
            assert!((1..=4).contains(&trial.changes.len()));
            let group_index = system.space.particles[trial.changes[0].0].group;
            let before = bond_lengths(&system, &chain_positions(&system, group_index));
            test_support::apply(&mut system, &trial);
            let after = bond_lengths(&system, &chain_positions(&system, group_index));
            for (a, b) in before.iter().zip(&after) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn pivot_moves_a_terminal_segment() {
        let mut system = test_support::system();
        let mut mv = Pivot::new(&config(1, 100), MoleculeKindId(1));
        let mut rng = test_support::rng();
        for _ in 0..50 {
            let Proposal::Trial(trial) = mv.propose(&system, &mut rng) else {
                panic!("expected a trial");
            };
            let group = system.space.groups[system.space.particles[trial.changes[0].0].group];
            let indices = trial.indices();
            assert!(indices.len() <= 4);
            assert!(
                indices.first() == Some(&group.begin) || indices.last() == Some(&(group.end - 1))
            );
            let group_index = system.space.particles[indices[0]].group;
            let before = bond_lengths(&system, &chain_positions(&system, group_index));
            test_support::apply(&mut system, &trial);
            let after = bond_lengths(&system, &chain_positions(&system, group_index));
            for (a, b) in before.iter().zip(&after) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn segment_longer_than_chain_skips() {
        let system = test_support::system();
        let mut mv = Crankshaft::new(&config(5, 10), MoleculeKindId(1));
        assert_eq!(mv.propose(&system, &mut test_support::rng()), Proposal::Skipped);
    }
}
