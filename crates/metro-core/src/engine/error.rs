use std::path::PathBuf;
use thiserror::Error;

use super::analysis::AnalysisError;
use super::checkpoint::StateFileError;
use super::config::ConfigError;
use crate::core::forcefield::hamiltonian::EnergyError;
use crate::core::geometry::GeometryError;
use crate::core::io::aam::AamError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Initial configuration has an invalid energy: {0}")]
    Energy(#[from] EnergyError),

    #[error("Initial energy is not finite ({0}); particles overlap or lie outside the container")]
    NonFiniteEnergy(f64),

    #[error("Failed to read structure file '{path}': {source}")]
    Structure { path: PathBuf, source: AamError },

    #[error("State file '{path}' could not be used: {source}")]
    StateFile {
        path: PathBuf,
        source: StateFileError,
    },

    #[error("Analysis '{sampler}' failed: {source}")]
    Analysis {
        sampler: String,
        source: AnalysisError,
    },

    #[error("Malformed regression fixture '{path}': {source}")]
    Fixture {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{mismatches} observable(s) deviate from the regression fixture '{path}'")]
    Regression { path: PathBuf, mismatches: usize },

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
