use super::context::SimulationContext;
use super::rng::McRng;
use super::state::RunState;
use crate::core::forcefield::ewald::ReciprocalSnapshot;
use crate::core::geometry::Geometry;
use crate::core::models::molecule::Group;
use crate::core::models::particle::Particle;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed state file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("State file does not match the configured system: {0}")]
    Mismatch(String),
}

/// Everything needed to continue a run bit-identically: the random stream, the
/// configuration, the running energy and counters, and the Ewald sums as they were
/// accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    version: u32,
    rng: McRng,
    geometry: Geometry,
    particles: Vec<Particle>,
    groups: Vec<Group>,
    state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reciprocal: Option<ReciprocalSnapshot>,
}

impl Checkpoint {
    pub fn capture(ctx: &SimulationContext) -> Self {
        let space = &ctx.system.space;
        Self {
            version: FORMAT_VERSION,
            rng: ctx.rng.clone(),
            geometry: space.geometry.clone(),
            particles: space.particles.clone(),
            groups: space.groups.clone(),
            state: ctx.state.clone(),
            reciprocal: ctx.system.reciprocal.as_ref().map(|r| r.snapshot()),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Overwrites the dynamic state of `ctx` with this checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StateFileError::Mismatch`] if the stored particles, molecules or
    /// k-vector set are not those of the configured system; `ctx` is then unchanged.
    pub fn restore(self, ctx: &mut SimulationContext) -> Result<(), StateFileError> {
        self.check_compatible(ctx)?;
        let system = &mut ctx.system;
        let reciprocal = match (&system.reciprocal, self.geometry.lengths()) {
            (Some(current), Some(lengths)) => {
                let mut resized = current.resized(lengths, &self.particles);
                if let Some(snapshot) = &self.reciprocal {
                    if !resized.restore(snapshot) {
                        return Err(StateFileError::Mismatch(
                            "reciprocal-space vector count differs".to_string(),
                        ));
                    }
                }
                Some(resized)
            }
            (Some(_), None) => {
                return Err(StateFileError::Mismatch(
                    "Ewald summation requires a cuboid container".to_string(),
                ));
            }
            (None, _) => None,
        };
        system.space.geometry = self.geometry;
        system.space.particles = self.particles;
        system.space.groups = self.groups;
        system.reciprocal = reciprocal;
        ctx.rng = self.rng;
        ctx.state = self.state;
        Ok(())
    }

    fn check_compatible(&self, ctx: &SimulationContext) -> Result<(), StateFileError> {
        if self.version != FORMAT_VERSION {
            return Err(StateFileError::Mismatch(format!(
                "format version {} (expected {FORMAT_VERSION})",
                self.version
            )));
        }
        let space = &ctx.system.space;
        if self.particles.len() != space.particles.len() {
            return Err(StateFileError::Mismatch(format!(
                "{} particles stored, {} configured",
                self.particles.len(),
                space.particles.len()
            )));
        }
        if self.groups != space.groups {
            return Err(StateFileError::Mismatch("molecule layout differs".to_string()));
        }
        let atom_count = ctx.system.topology.atoms().len();
        if let Some(p) = self.particles.iter().find(|p| p.atom_id.index() >= atom_count) {
            return Err(StateFileError::Mismatch(format!(
                "unknown atom type index {}",
                p.atom_id.index()
            )));
        }
        Ok(())
    }

    /// Writes the checkpoint as JSON, replacing `path` only once the file is complete.
    pub fn save(&self, path: &Path) -> Result<(), StateFileError> {
        let staging = path.with_extension("partial");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&staging, path)?;
        debug!(path = %path.display(), trials = self.state.trials, "State file written.");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StateFileError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::analysis::test_support::line_context;
    use rand::Rng;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_preserve_every_field() {
        let mut ctx = line_context();
        ctx.state.trials = 17;
        ctx.state.statistics_mut("atomtranslate[mix]").accepted = 5;
        let _: f64 = ctx.rng.r#gen();
        let checkpoint = Checkpoint::capture(&ctx);

        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        checkpoint.save(&path).unwrap();
        assert!(!path.with_extension("partial").exists());
        assert_eq!(Checkpoint::load(&path).unwrap(), checkpoint);
    }

    #[test]
    fn restore_continues_the_random_stream() {
        let mut ctx = line_context();
        let checkpoint = Checkpoint::capture(&ctx);
        let expected: Vec<u64> = (0..4).map(|_| ctx.rng.r#gen()).collect();

        let mut resumed = line_context();
        let _: u64 = resumed.rng.r#gen();
        resumed.system.space.particles[0].position.x = 5.0;
        checkpoint.restore(&mut resumed).unwrap();
        let drawn: Vec<u64> = (0..4).map(|_| resumed.rng.r#gen()).collect();
        assert_eq!(drawn, expected);
        assert_eq!(resumed.system.space.particles[0].position.x, 0.0);
    }

    #[test]
    fn restore_rejects_a_different_system() {
        let ctx = line_context();
        let mut checkpoint = Checkpoint::capture(&ctx);
        checkpoint.particles.pop();
        let mut target = line_context();
        let result = checkpoint.restore(&mut target);
        assert!(matches!(result, Err(StateFileError::Mismatch(_))));
    }

    #[test]
    fn load_reports_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Checkpoint::load(&path), Err(StateFileError::Json(_))));
    }
}
