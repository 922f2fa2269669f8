use super::{AnalysisError, Sampler, write_table};
use crate::core::utils::units::number_density_to_millimolar;
use crate::engine::context::{SimulationContext, System};
use std::path::PathBuf;

/// Ideal contribution `N/V` in Å⁻³, counting translational units.
fn ideal_pressure(system: &System) -> f64 {
    system.space.translational_units() as f64 / system.space.geometry.volume()
}

fn pressure_rows(name: &str, ideal: f64, excess: f64) -> Vec<(String, f64)> {
    vec![
        (format!("{name}.ideal_mM"), number_density_to_millimolar(ideal)),
        (format!("{name}.excess_mM"), number_density_to_millimolar(excess)),
        (format!("{name}.pressure_mM"), number_density_to_millimolar(ideal + excess)),
    ]
}

/// Pressure from the pair virial, `βP = N/V + <W>/(3V)` with `W = -Σ r·du/dr`.
///
/// Bonded, hard-sphere and reciprocal-space forces do not contribute.
#[derive(Debug, Clone)]
pub struct VirialPressure {
    interval: u64,
    file: Option<PathBuf>,
    ideal: f64,
    excess: f64,
    samples: u64,
}

impl VirialPressure {
    pub fn new(interval: u64, file: Option<PathBuf>) -> Self {
        Self {
            interval,
            file,
            ideal: 0.0,
            excess: 0.0,
            samples: 0,
        }
    }

    fn averages(&self) -> (f64, f64) {
        let n = self.samples.max(1) as f64;
        (self.ideal / n, self.excess / n)
    }
}

impl Sampler for VirialPressure {
    fn name(&self) -> &str {
        "virial"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let system = &ctx.system;
        let volume = system.space.geometry.volume();
        let virial = system.hamiltonian.system_virial(&system.space);
        if !virial.is_finite() {
            return Err(AnalysisError::Sampling(format!("non-finite virial {virial}")));
        }
        self.ideal += ideal_pressure(system);
        self.excess += virial / (3.0 * volume);
        self.samples += 1;
        Ok(())
    }

    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        match &self.file {
            Some(file) => write_table(file, self.observables()),
            None => Ok(()),
        }
    }

    fn observables(&self) -> Vec<(String, f64)> {
        let (ideal, excess) = self.averages();
        pressure_rows("virial", ideal, excess)
    }
}

/// Excess pressure from virtual volume perturbations,
/// `βP_ex = ln <exp(-ΔU)> / ΔV`, where `ΔU` is the energy change of scaling the
/// configuration to `V + ΔV` the way a volume move would.
#[derive(Debug, Clone)]
pub struct VirtualVolume {
    interval: u64,
    dv: f64,
    file: Option<PathBuf>,
    ideal: f64,
    boltzmann: f64,
    samples: u64,
}

impl VirtualVolume {
    pub fn new(interval: u64, dv: f64, file: Option<PathBuf>) -> Self {
        Self {
            interval,
            dv,
            file,
            ideal: 0.0,
            boltzmann: 0.0,
            samples: 0,
        }
    }

    /// Energy change of scaling `system` to `volume + dv`. Overlaps give `+∞`.
    fn perturbation(&self, system: &System) -> Result<f64, AnalysisError> {
        let space = &system.space;
        let old = system.total_energy()?.total();
        let geometry = space
            .geometry
            .scaled(space.geometry.volume() + self.dv, system.min_container_length())
            .map_err(|e| AnalysisError::Sampling(format!("cannot perturb volume: {e}")))?;
        let mut scaled = space.clone();
        scaled.scale_to(&system.topology, geometry);
        let short_range = match system.hamiltonian.system_energy(&scaled, &system.topology) {
            Ok(energy) => energy.total(),
            Err(_) => return Ok(f64::INFINITY),
        };
        let reciprocal = match (&system.reciprocal, scaled.geometry.lengths()) {
            (Some(r), Some(lengths)) => r.resized(lengths, &scaled.particles).energy(),
            _ => 0.0,
        };
        Ok(short_range + reciprocal - old)
    }

    fn excess(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        (self.boltzmann / self.samples as f64).ln() / self.dv
    }
}

impl Sampler for VirtualVolume {
    fn name(&self) -> &str {
        "virtualvolume"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        if self.dv == 0.0 {
            return Err(AnalysisError::Sampling("volume perturbation is zero".to_string()));
        }
        let delta = self.perturbation(&ctx.system)?;
        if delta.is_nan() {
            return Err(AnalysisError::Sampling("energy change is NaN".to_string()));
        }
        self.boltzmann += (-delta).exp();
        self.ideal += ideal_pressure(&ctx.system);
        self.samples += 1;
        Ok(())
    }

    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        match &self.file {
            Some(file) => write_table(file, self.observables()),
            None => Ok(()),
        }
    }

    fn observables(&self) -> Vec<(String, f64)> {
        let ideal = self.ideal / self.samples.max(1) as f64;
        pressure_rows("virtualvolume", ideal, self.excess())
    }
}
