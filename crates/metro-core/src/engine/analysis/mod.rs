//! # Analysis Module
//!
//! Online observers of the Markov chain.
//!
//! A [`Sampler`] is a stateful accumulator triggered every `interval` micro steps. It reads
//! the current [`SimulationContext`] and never mutates it. On termination each sampler
//! flushes its aggregated result to disk.
//!
//! Samplers are independent of each other and of the chain: a sampler whose measurement
//! fails is disabled with a warning and the run continues. Failing to write an output file
//! is different; it stops the run, because silently losing data is worse than stopping.

mod histogram;
mod kirkwood;
mod multipole;
mod output;
mod polymer;
mod pressure;
mod rdf;

pub use histogram::Histogram;
pub use kirkwood::KirkwoodFactor;
pub use multipole::MultipoleAnalysis;
pub use output::{CoordinateSnapshot, EnergyLog, StateWriter, Trajectory};
pub use polymer::PolymerShape;
pub use pressure::{VirialPressure, VirtualVolume};
pub use rdf::{RadialDistribution, RdfMode};

use super::checkpoint::StateFileError;
use super::config::{AnalysisConfig, ConfigError};
use super::context::SimulationContext;
use super::error::EngineError;
use crate::core::forcefield::hamiltonian::EnergyError;
use crate::core::io::aam::AamError;
use phf::{Map, phf_map};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write table '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("Failed to write coordinates to '{path}': {source}")]
    Coordinates { path: PathBuf, source: AamError },
    #[error("Failed to write state file '{path}': {source}")]
    State {
        path: PathBuf,
        source: StateFileError,
    },
    #[error("Energy evaluation failed: {0}")]
    Energy(#[from] EnergyError),
    #[error("{0}")]
    Sampling(String),
}

impl AnalysisError {
    /// Output failures stop the run; measurement failures only disable the sampler.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Csv { .. } | Self::Coordinates { .. } | Self::State { .. }
        )
    }
}

/// Writes whitespace-separated rows without a header line.
pub(crate) fn write_table<R: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = R>,
) -> Result<(), AnalysisError> {
    let csv_error = |source| AnalysisError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub trait Sampler {
    fn name(&self) -> &str;
    /// Trigger period in micro steps; `None` for samplers that only act at the end.
    fn interval(&self) -> Option<u64>;
    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError>;
    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        Ok(())
    }
    /// Named scalar results, used for run summaries and regression fixtures.
    fn observables(&self) -> Vec<(String, f64)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerTag {
    AtomRdf,
    MolRdf,
    Kirkwood,
    Multipole,
    Virial,
    VirtualVolume,
    PolymerShape,
    Trajectory,
    EnergyLog,
    StateFile,
    CoordinateFile,
}

/// Configuration tags of all samplers.
pub static SAMPLER_REGISTRY: Map<&'static str, SamplerTag> = phf_map! {
    "atomrdf" => SamplerTag::AtomRdf,
    "molrdf" => SamplerTag::MolRdf,
    "kirkwoodfactor" => SamplerTag::Kirkwood,
    "multipoleanalysis" => SamplerTag::Multipole,
    "virial" => SamplerTag::Virial,
    "virtualvolume" => SamplerTag::VirtualVolume,
    "polymershape" => SamplerTag::PolymerShape,
    "trajectory" => SamplerTag::Trajectory,
    "energyfile" => SamplerTag::EnergyLog,
    "statefile" => SamplerTag::StateFile,
    "coordinatefile" => SamplerTag::CoordinateFile,
};

impl SamplerTag {
    pub fn parse(tag: &str) -> Result<Self, ConfigError> {
        SAMPLER_REGISTRY
            .get(tag)
            .copied()
            .ok_or_else(|| ConfigError::UnknownTag {
                section: "analysis",
                tag: tag.to_string(),
            })
    }
}

pub type BoxedSampler = Box<dyn Sampler + Send>;

/// Builds the samplers of one analysis entry. RDF entries expand to one sampler per pair.
pub fn build_samplers(config: &AnalysisConfig, ctx: &SimulationContext) -> Result<Vec<BoxedSampler>, ConfigError> {
    let system = &ctx.system;
    let samplers: Vec<BoxedSampler> = match config {
        AnalysisConfig::AtomRdf { interval, pairs } => pairs
            .iter()
            .map(|pair| {
                RadialDistribution::new(RdfMode::Atom, pair, *interval, system)
                    .map(|s| Box::new(s) as BoxedSampler)
            })
            .collect::<Result<_, _>>()?,
        AnalysisConfig::MolRdf { interval, pairs } => pairs
            .iter()
            .map(|pair| {
                RadialDistribution::new(RdfMode::Molecule, pair, *interval, system)
                    .map(|s| Box::new(s) as BoxedSampler)
            })
            .collect::<Result<_, _>>()?,
        AnalysisConfig::Kirkwood { interval, dr, file } => {
            vec![Box::new(KirkwoodFactor::new(*interval, *dr, file.clone()))]
        }
        AnalysisConfig::Multipole { interval, file } => {
            vec![Box::new(MultipoleAnalysis::new(*interval, file.clone()))]
        }
        AnalysisConfig::Virial { interval, file } => {
            vec![Box::new(VirialPressure::new(*interval, file.clone()))]
        }
        AnalysisConfig::VirtualVolume { interval, dv, file } => {
            vec![Box::new(VirtualVolume::new(*interval, *dv, file.clone()))]
        }
        AnalysisConfig::PolymerShape {
            interval,
            molecules,
            file,
        } => vec![Box::new(PolymerShape::new(*interval, molecules, file.clone(), system)?)],
        AnalysisConfig::Trajectory { interval, file } => {
            vec![Box::new(Trajectory::new(*interval, file.clone()))]
        }
        AnalysisConfig::EnergyLog { interval, file } => {
            vec![Box::new(EnergyLog::new(*interval, file.clone()))]
        }
        AnalysisConfig::StateFile { interval, file } => {
            vec![Box::new(StateWriter::new(*interval, file.clone()))]
        }
        AnalysisConfig::CoordinateFile { file } => {
            vec![Box::new(CoordinateSnapshot::new(file.clone()))]
        }
    };
    Ok(samplers)
}

struct Entry {
    sampler: BoxedSampler,
    enabled: bool,
}

/// All samplers of a run, with their enabled state.
#[derive(Default)]
pub struct SamplerSet {
    entries: Vec<Entry>,
}

impl SamplerSet {
    pub fn from_configs(configs: &[AnalysisConfig], ctx: &SimulationContext) -> Result<Self, ConfigError> {
        let mut set = Self::default();
        for config in configs {
            for sampler in build_samplers(config, ctx)? {
                set.push(sampler);
            }
        }
        Ok(set)
    }

    pub fn push(&mut self, sampler: BoxedSampler) {
        debug!(sampler = sampler.name(), interval = ?sampler.interval(), "Registered sampler.");
        self.entries.push(Entry {
            sampler,
            enabled: true,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn disabled_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.enabled).count()
    }

    /// Triggers every enabled sampler whose period divides `micro_step`.
    pub fn sample(&mut self, micro_step: u64, ctx: &SimulationContext) -> Result<(), EngineError> {
        for entry in &mut self.entries {
            if !entry.enabled {
                continue;
            }
            let due = entry
                .sampler
                .interval()
                .is_some_and(|n| n > 0 && micro_step % n == 0);
            if due {
                let result = entry.sampler.sample(ctx);
                Self::handle(entry, result)?;
            }
        }
        Ok(())
    }

    /// Flushes every enabled sampler.
    pub fn finalize(&mut self, ctx: &SimulationContext) -> Result<(), EngineError> {
        for entry in &mut self.entries {
            if entry.enabled {
                let result = entry.sampler.finalize(ctx);
                Self::handle(entry, result)?;
            }
        }
        Ok(())
    }

    pub fn observables(&self) -> Vec<(String, f64)> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .flat_map(|e| e.sampler.observables())
            .collect()
    }

    fn handle(entry: &mut Entry, result: Result<(), AnalysisError>) -> Result<(), EngineError> {
        match result {
            Ok(()) => Ok(()),
            Err(source) if source.is_fatal() => Err(EngineError::Analysis {
                sampler: entry.sampler.name().to_string(),
                source,
            }),
            Err(error) => {
                warn!(
                    sampler = entry.sampler.name(),
                    %error,
                    "Sampler failed and has been disabled."
                );
                entry.enabled = false;
                Ok(())
            }
        }
    }
}
