//! # Moves Module
//!
//! Trial move generators for the Metropolis chain.
//!
//! Every move kind implements [`MonteCarloMove`]: it inspects the current [`System`],
//! draws random numbers from the shared stream and returns a [`Trial`] holding the new
//! state of every particle it touches (and, for volume moves, the new container) together
//! with the log of its proposal bias. The controller applies the trial, scores it and
//! either keeps it or rolls it back; moves never mutate the system themselves.
//!
//! The set of kinds is closed. [`MOVE_REGISTRY`] maps configuration tags onto [`MoveTag`]s
//! and [`Move::from_config`] is the single place where new kinds are wired in.

mod chain;
mod cluster;
mod isobaric;
mod rigid;
mod single;
mod titration;

pub use chain::{Crankshaft, Pivot};
pub use cluster::ClusterMove;
pub use isobaric::IsobaricMove;
pub use rigid::MoleculeTransRot;
pub use single::{AtomRotate, AtomTranslate};
pub use titration::TitrationMove;

use super::config::{ConfigError, MoveConfig};
use super::context::System;
use super::rng::McRng;
use crate::core::geometry::GeometryError;
use crate::core::models::ids::MoleculeKindId;
use crate::core::models::particle::Particle;
use phf::{Map, phf_map};
use rand::Rng;

/// A proposed perturbation, not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// New states of the affected particles, by index.
    pub changes: Vec<(usize, Particle)>,
    /// Replacement container for volume moves.
    pub geometry: Option<crate::core::geometry::Geometry>,
    /// Natural log of the proposal bias; `-inf` forces rejection.
    pub ln_bias: f64,
    /// Squared size of the step, recorded in the acceptance statistics.
    pub displacement2: f64,
}

impl Trial {
    pub fn new(changes: Vec<(usize, Particle)>) -> Self {
        Self {
            changes,
            geometry: None,
            ln_bias: 0.0,
            displacement2: 0.0,
        }
    }

    pub fn indices(&self) -> Vec<usize> {
        self.changes.iter().map(|(i, _)| *i).collect()
    }

    pub fn is_volume_change(&self) -> bool {
        self.geometry.is_some()
    }
}

/// Outcome of asking a move for a trial.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Trial(Trial),
    /// The proposal itself is invalid and counts as a rejected trial.
    Rejected(GeometryError),
    /// Nothing to move, e.g. no particle of the target kind carries a dipole.
    Skipped,
}

pub trait MonteCarloMove {
    /// Key under which acceptance statistics are recorded.
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
    /// Number of trials performed each time the move is selected.
    fn repeats(&self, _system: &System) -> usize {
        1
    }
    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal;
    /// Log proposal bias, evaluated with the trial already applied to `system`.
    fn ln_bias(&self, _system: &System, trial: &Trial) -> f64 {
        trial.ln_bias
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTag {
    AtomTranslate,
    AtomRotate,
    MoleculeTransRot,
    Crankshaft,
    Pivot,
    Cluster,
    Isobaric,
    Titration,
}

/// Configuration tags of all move kinds.
pub static MOVE_REGISTRY: Map<&'static str, MoveTag> = phf_map! {
    "atomtranslate" => MoveTag::AtomTranslate,
    "atomrotate" => MoveTag::AtomRotate,
    "moltransrot" => MoveTag::MoleculeTransRot,
    "crankshaft" => MoveTag::Crankshaft,
    "pivot" => MoveTag::Pivot,
    "moltransrotcluster" => MoveTag::Cluster,
    "isobaric" => MoveTag::Isobaric,
    "titrate" => MoveTag::Titration,
};

impl MoveTag {
    pub fn parse(tag: &str) -> Result<Self, ConfigError> {
        MOVE_REGISTRY
            .get(tag)
            .copied()
            .ok_or_else(|| ConfigError::UnknownTag {
                section: "moves",
                tag: tag.to_string(),
            })
    }

    /// Whether the move is configured per molecule kind rather than once globally.
    pub fn is_targeted(self) -> bool {
        !matches!(self, Self::Isobaric | Self::Titration)
    }
}

#[derive(Debug, Clone)]
pub enum Move {
    AtomTranslate(AtomTranslate),
    AtomRotate(AtomRotate),
    MoleculeTransRot(MoleculeTransRot),
    Crankshaft(Crankshaft),
    Pivot(Pivot),
    Cluster(ClusterMove),
    Isobaric(IsobaricMove),
    Titration(TitrationMove),
}

macro_rules! dispatch {
    ($self:ident, $m:ident => $body:expr) => {
        match $self {
            Move::AtomTranslate($m) => $body,
            Move::AtomRotate($m) => $body,
            Move::MoleculeTransRot($m) => $body,
            Move::Crankshaft($m) => $body,
            Move::Pivot($m) => $body,
            Move::Cluster($m) => $body,
            Move::Isobaric($m) => $body,
            Move::Titration($m) => $body,
        }
    };
}

impl MonteCarloMove for Move {
    fn name(&self) -> &str {
        dispatch!(self, m => m.name())
    }
    fn weight(&self) -> f64 {
        dispatch!(self, m => m.weight())
    }
    fn repeats(&self, system: &System) -> usize {
        dispatch!(self, m => m.repeats(system))
    }
    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        dispatch!(self, m => m.propose(system, rng))
    }
    fn ln_bias(&self, system: &System, trial: &Trial) -> f64 {
        dispatch!(self, m => m.ln_bias(system, trial))
    }
}

fn molecule_id(system: &System, name: &str) -> Result<MoleculeKindId, ConfigError> {
    system
        .topology
        .find_molecule(name)
        .map(|m| m.id)
        .ok_or_else(|| ConfigError::UnknownMolecule(name.to_string()))
}

impl Move {
    pub fn from_config(config: &MoveConfig, system: &System) -> Result<Self, ConfigError> {
        let mv = match config {
            MoveConfig::AtomTranslate {
                molecule,
                dp,
                direction,
                per_atom,
                weight,
            } => Self::AtomTranslate(AtomTranslate::new(
                molecule,
                molecule_id(system, molecule)?,
                *dp,
                *direction,
                *per_atom,
                *weight,
            )),
            MoveConfig::AtomRotate {
                molecule,
                dprot,
                per_atom,
                weight,
            } => Self::AtomRotate(AtomRotate::new(
                molecule,
                molecule_id(system, molecule)?,
                *dprot,
                *per_atom,
                *weight,
            )),
            MoveConfig::MoleculeTransRot {
                molecule,
                dp,
                dprot,
                direction,
                per_molecule,
                weight,
            } => Self::MoleculeTransRot(MoleculeTransRot::new(
                molecule,
                molecule_id(system, molecule)?,
                *dp,
                *dprot,
                *direction,
                *per_molecule,
                *weight,
            )),
            MoveConfig::Crankshaft(c) => {
                Self::Crankshaft(Crankshaft::new(c, molecule_id(system, &c.molecule)?))
            }
            MoveConfig::Pivot(c) => Self::Pivot(Pivot::new(c, molecule_id(system, &c.molecule)?)),
            MoveConfig::Cluster {
                molecule,
                dp,
                dprot,
                direction,
                threshold,
                cluster_molecules,
                weight,
            } => {
                let members = cluster_molecules
                    .iter()
                    .map(|name| molecule_id(system, name))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::Cluster(ClusterMove::new(
                    molecule,
                    molecule_id(system, molecule)?,
                    members,
                    *dp,
                    *dprot,
                    *direction,
                    *threshold,
                    *weight,
                ))
            }
            MoveConfig::Isobaric {
                dp,
                pressure,
                weight,
            } => Self::Isobaric(IsobaricMove::new(*dp, *pressure, *weight)),
            MoveConfig::Titration { processes, weight } => {
                let selected = if processes.is_empty() {
                    (0..system.processes.len()).collect()
                } else {
                    processes
                        .iter()
                        .map(|name| {
                            system
                                .processes
                                .iter()
                                .position(|p| &p.name == name)
                                .ok_or_else(|| ConfigError::UnknownProcess(name.clone()))
                        })
                        .collect::<Result<Vec<_>, _>>()?
                };
                Self::Titration(TitrationMove::new(selected, *weight))
            }
        };
        Ok(mv)
    }
}

/// The configured moves and their selection weights.
#[derive(Debug, Clone, Default)]
pub struct MoveSet {
    moves: Vec<Move>,
}

impl MoveSet {
    pub fn from_configs(configs: &[MoveConfig], system: &System) -> Result<Self, ConfigError> {
        let moves = configs
            .iter()
            .map(|c| Move::from_config(c, system))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { moves })
    }

    pub fn new(moves: Vec<Move>) -> Self {
        Self { moves }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Move> {
        self.moves.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }

    /// Picks a move with probability proportional to its weight. Returns `None` when no
    /// move has a positive weight.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let total: f64 = self.moves.iter().map(|m| m.weight().max(0.0)).sum();
        if !(total > 0.0) {
            return None;
        }
        let mut target = rng.r#gen::<f64>() * total;
        let mut last = None;
        for (i, m) in self.moves.iter().enumerate() {
            let w = m.weight().max(0.0);
            if w <= 0.0 {
                continue;
            }
            if target < w {
                return Some(i);
            }
            target -= w;
            last = Some(i);
        }
        last
    }
}

/// Draws one of `items` uniformly.
pub(crate) fn choose<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.gen_range(0..items.len()))
    }
}
