use super::error::EngineError;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Relative tolerance used when comparing observables against a fixture.
pub const DEFAULT_TOLERANCE: f64 = 1e-2;

/// Values below this magnitude are compared absolutely.
const ABSOLUTE_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub name: String,
    pub expected: f64,
    /// `None` if the run did not produce the observable.
    pub actual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegressionOutcome {
    /// No fixture existed; the current observables were written as the new reference.
    Created { observables: usize },
    Checked {
        compared: usize,
        mismatches: Vec<Mismatch>,
    },
}

impl RegressionOutcome {
    pub fn passed(&self) -> bool {
        match self {
            Self::Created { .. } => true,
            Self::Checked { mismatches, .. } => mismatches.is_empty(),
        }
    }

    pub fn mismatch_count(&self) -> usize {
        match self {
            Self::Created { .. } => 0,
            Self::Checked { mismatches, .. } => mismatches.len(),
        }
    }
}

fn agrees(expected: f64, actual: f64, tolerance: f64) -> bool {
    let scale = expected.abs().max(actual.abs()).max(ABSOLUTE_FLOOR);
    (expected - actual).abs() <= tolerance * scale
}

/// Compares `observables` against the JSON fixture at `path`, or writes the fixture if it
/// does not exist yet.
///
/// Only observables listed in the fixture are compared; new ones are ignored so a fixture
/// stays valid when analyses are added.
pub fn check(path: &Path, observables: &[(String, f64)], tolerance: f64) -> Result<RegressionOutcome, EngineError> {
    let io_error = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json_error = |source| EngineError::Fixture {
        path: path.to_path_buf(),
        source,
    };
    let current: BTreeMap<&str, f64> = observables
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k.as_str(), *v))
        .collect();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let json = serde_json::to_string_pretty(&current).map_err(json_error)?;
            fs::write(path, json).map_err(io_error)?;
            info!(path = %path.display(), observables = current.len(), "Regression fixture written.");
            return Ok(RegressionOutcome::Created {
                observables: current.len(),
            });
        }
        Err(e) => return Err(io_error(e)),
    };
    let reference: BTreeMap<String, f64> = serde_json::from_str(&content).map_err(json_error)?;

    let mismatches: Vec<Mismatch> = reference
        .iter()
        .filter_map(|(name, &expected)| {
            let actual = current.get(name.as_str()).copied();
            match actual {
                Some(value) if agrees(expected, value, tolerance) => None,
                _ => Some(Mismatch {
                    name: name.clone(),
                    expected,
                    actual,
                }),
            }
        })
        .collect();
    for m in &mismatches {
        warn!(observable = %m.name, expected = m.expected, actual = ?m.actual, "Regression mismatch.");
    }
    info!(
        path = %path.display(),
        compared = reference.len(),
        mismatches = mismatches.len(),
        "Regression fixture checked."
    );
    Ok(RegressionOutcome::Checked {
        compared: reference.len(),
        mismatches,
    })
}
