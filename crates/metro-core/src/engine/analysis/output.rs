use super::{AnalysisError, Sampler};
use crate::core::io::aam::AamFile;
use crate::core::io::record::CoordinateRecord;
use crate::core::io::traits::CoordinateFile;
use crate::engine::checkpoint::Checkpoint;
use crate::engine::context::SimulationContext;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Appends one coordinate frame per trigger. The file is truncated on the first frame.
#[derive(Debug, Clone)]
pub struct Trajectory {
    interval: u64,
    file: PathBuf,
    frames: u64,
}

impl Trajectory {
    pub fn new(interval: u64, file: PathBuf) -> Self {
        Self {
            interval,
            file,
            frames: 0,
        }
    }
}

impl Sampler for Trajectory {
    fn name(&self) -> &str {
        "trajectory"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let io_error = |source| AnalysisError::Io {
            path: self.file.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.frames > 0)
            .truncate(self.frames == 0)
            .open(&self.file)
            .map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        let records = CoordinateRecord::from_space(&ctx.system.space, &ctx.system.topology);
        AamFile::write_to(&records, &mut writer).map_err(|source| AnalysisError::Coordinates {
            path: self.file.clone(),
            source,
        })?;
        writer.flush().map_err(io_error)?;
        self.frames += 1;
        Ok(())
    }

    fn observables(&self) -> Vec<(String, f64)> {
        vec![("trajectory.frames".to_string(), self.frames as f64)]
    }
}

#[derive(Debug, Serialize)]
struct EnergyRow {
    step: u64,
    energy: f64,
    volume: f64,
    acceptance: f64,
}

/// Periodic log of the running energy (kT), the volume and the overall acceptance ratio.
pub struct EnergyLog {
    interval: u64,
    file: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl EnergyLog {
    pub fn new(interval: u64, file: PathBuf) -> Self {
        Self {
            interval,
            file,
            writer: None,
        }
    }

    fn csv_error(&self, source: csv::Error) -> AnalysisError {
        AnalysisError::Csv {
            path: self.file.clone(),
            source,
        }
    }
}

impl Sampler for EnergyLog {
    fn name(&self) -> &str {
        "energyfile"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        if self.writer.is_none() {
            let writer = csv::WriterBuilder::new()
                .delimiter(b' ')
                .from_path(&self.file)
                .map_err(|e| self.csv_error(e))?;
            self.writer = Some(writer);
        }
        let row = EnergyRow {
            step: ctx.state.trials,
            energy: ctx.state.energy,
            volume: ctx.system.space.geometry.volume(),
            acceptance: ctx.state.overall_acceptance(),
        };
        let result = match self.writer.as_mut() {
            Some(writer) => writer
                .serialize(row)
                .and_then(|()| writer.flush().map_err(csv::Error::from)),
            None => Ok(()),
        };
        result.map_err(|e| self.csv_error(e))
    }

    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|source| AnalysisError::Io {
                path: self.file.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Writes a checkpoint every `interval` steps, if set, and always at the end of the run.
#[derive(Debug, Clone)]
pub struct StateWriter {
    interval: Option<u64>,
    file: PathBuf,
}

impl StateWriter {
    pub fn new(interval: Option<u64>, file: PathBuf) -> Self {
        Self { interval, file }
    }

    fn write(&self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        Checkpoint::capture(ctx)
            .save(&self.file)
            .map_err(|source| AnalysisError::State {
                path: self.file.clone(),
                source,
            })
    }
}

impl Sampler for StateWriter {
    fn name(&self) -> &str {
        "statefile"
    }

    fn interval(&self) -> Option<u64> {
        self.interval
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        self.write(ctx)
    }

    fn finalize(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        self.write(ctx)
    }
}

/// Writes the final configuration as a coordinate file.
#[derive(Debug, Clone)]
pub struct CoordinateSnapshot {
    file: PathBuf,
}

impl CoordinateSnapshot {
    pub fn new(file: PathBuf) -> Self {
        Self { file }
    }
}

impl Sampler for CoordinateSnapshot {
    fn name(&self) -> &str {
        "coordinatefile"
    }

    fn interval(&self) -> Option<u64> {
        None
    }

    fn sample(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn finalize(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let records = CoordinateRecord::from_space(&ctx.system.space, &ctx.system.topology);
        AamFile::write_to_path(&records, &self.file).map_err(|source| AnalysisError::Coordinates {
            path: self.file.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::line_context;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn trajectory_appends_frames_after_the_first() {
        let ctx = line_context();
        let dir = tempdir().unwrap();
        let file = dir.path().join("traj.aam");
        std::fs::write(&file, "stale content\n").unwrap();
        let mut trajectory = Trajectory::new(1, file.clone());
        trajectory.sample(&ctx).unwrap();
        trajectory.sample(&ctx).unwrap();
        let content = std::fs::read_to_string(&file).unwrap();
        assert!(!content.contains("stale"));
        // Two frames of a header line plus four particles.
        assert_eq!(content.lines().count(), 10);
    }

    #[test]
    fn energy_log_has_header_and_one_row_per_sample() {
        let mut ctx = line_context();
        let dir = tempdir().unwrap();
        let file = dir.path().join("energy.dat");
        let mut log = EnergyLog::new(10, file.clone());
        log.sample(&ctx).unwrap();
        ctx.state.trials = 10;
        ctx.state.energy = -1.5;
        log.sample(&ctx).unwrap();
        log.finalize(&ctx).unwrap();
        let content = std::fs::read_to_string(&file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "step energy volume acceptance");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("10 -1.5 8000"));
    }

    #[test]
    fn coordinate_snapshot_round_trips_through_the_reader() {
        let ctx = line_context();
        let dir = tempdir().unwrap();
        let file = dir.path().join("confout.aam");
        let mut snapshot = CoordinateSnapshot::new(file.clone());
        snapshot.finalize(&ctx).unwrap();
        let records = AamFile::read_from_path(&file).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].name, "B");
        assert_eq!(records[3].position.x, 6.0);
    }

    #[test]
    fn state_writer_saves_on_finalize() {
        let ctx = line_context();
        let dir = tempdir().unwrap();
        let file = dir.path().join("state.json");
        let mut writer = StateWriter::new(None, file.clone());
        assert_eq!(writer.interval(), None);
        writer.finalize(&ctx).unwrap();
        let loaded = Checkpoint::load(&file).unwrap();
        assert_eq!(loaded, Checkpoint::capture(&ctx));
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let ctx = line_context();
        let dir = tempdir().unwrap();
        let file = dir.path().join("missing").join("traj.aam");
        let mut trajectory = Trajectory::new(1, file);
        assert!(trajectory.sample(&ctx).unwrap_err().is_fatal());
    }
}
