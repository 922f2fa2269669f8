use super::{AnalysisError, Sampler, write_table};
use crate::engine::context::{SimulationContext, System};
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Moments {
    count: f64,
    charge: f64,
    charge2: f64,
    dipole: f64,
    dipole2: f64,
}

impl Moments {
    fn add(&mut self, charge: f64, dipole: &Vector3<f64>) {
        let mu2 = dipole.norm_squared();
        self.count += 1.0;
        self.charge += charge;
        self.charge2 += charge * charge;
        self.dipole += mu2.sqrt();
        self.dipole2 += mu2;
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.count > 0.0 { sum / self.count } else { 0.0 }
    }
}

/// Molecular charge and dipole moments per molecule kind, plus the fluctuation of the
/// total dipole moment `M` and the dielectric constant it implies under conducting
/// boundary conditions, `εr = 1 + 4π lB <M²> / (3 <V>)`.
///
/// Members of atomic groups are counted as single-particle molecules. Molecular dipoles are
/// taken about the mass center and include the point dipoles of the members.
#[derive(Debug, Clone)]
pub struct MultipoleAnalysis {
    interval: u64,
    file: Option<PathBuf>,
    kinds: BTreeMap<String, Moments>,
    total_dipole: Vector3<f64>,
    total_dipole2: f64,
    volume: f64,
    samples: u64,
}

impl MultipoleAnalysis {
    pub fn new(interval: u64, file: Option<PathBuf>) -> Self {
        Self {
            interval,
            file,
            kinds: BTreeMap::new(),
            total_dipole: Vector3::zeros(),
            total_dipole2: 0.0,
            volume: 0.0,
            samples: 0,
        }
    }

    /// `(kind name, charge, dipole)` of every molecule in the system.
    fn molecular_moments(system: &System) -> Vec<(&str, f64, Vector3<f64>)> {
        let space = &system.space;
        let mut moments = Vec::new();
        for (g, group) in space.groups.iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let name = system.topology.molecule(group.kind).name.as_str();
            if group.atomic {
                for p in &space.particles[group.range()] {
                    moments.push((name, p.charge, p.dipole));
                }
                continue;
            }
            let center = space.mass_center(&system.topology, g);
            let mut charge = 0.0;
            let mut dipole = Vector3::zeros();
            for p in &space.particles[group.range()] {
                charge += p.charge;
                dipole += space.geometry.vdist(&p.position, &center) * p.charge + p.dipole;
            }
            moments.push((name, charge, dipole));
        }
        moments
    }

    pub fn mean_total_dipole2(&self) -> f64 {
        if self.samples == 0 { 0.0 } else { self.total_dipole2 / self.samples as f64 }
    }

    pub fn dielectric_constant(&self, vacuum_bjerrum_length: f64) -> f64 {
        if self.samples == 0 {
            return 1.0;
        }
        let volume = self.volume / self.samples as f64;
        1.0 + 4.0 * PI * vacuum_bjerrum_length * self.mean_total_dipole2() / (3.0 * volume)
    }

    fn summary(&self, vacuum_bjerrum_length: f64) -> Vec<(String, f64)> {
        let mut rows = Vec::new();
        for (name, m) in &self.kinds {
            rows.push((format!("multipole[{name}].Z"), m.mean(m.charge)));
            rows.push((format!("multipole[{name}].Z2"), m.mean(m.charge2)));
            rows.push((format!("multipole[{name}].mu"), m.mean(m.dipole)));
            rows.push((format!("multipole[{name}].mu2"), m.mean(m.dipole2)));
        }
        rows.push(("multipole.M2".to_string(), self.mean_total_dipole2()));
        if vacuum_bjerrum_length > 0.0 {
            rows.push(("multipole.epsr".to_string(), self.dielectric_constant(vacuum_bjerrum_length)));
        }
        rows
    }
}

impl Sampler for MultipoleAnalysis {
    fn name(&self) -> &str {
        "multipoleanalysis"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let mut total = Vector3::zeros();
        for (name, charge, dipole) in Self::molecular_moments(&ctx.system) {
            self.kinds.entry(name.to_string()).or_default().add(charge, &dipole);
            total += dipole;
        }
        self.total_dipole += total;
        self.total_dipole2 += total.norm_squared();
        self.volume += ctx.system.space.geometry.volume();
        self.samples += 1;
        Ok(())
    }

    fn finalize(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        match &self.file {
            Some(file) => write_table(file, self.summary(ctx.system.vacuum_bjerrum_length())),
            None => Ok(()),
        }
    }

    fn observables(&self) -> Vec<(String, f64)> {
        // The dielectric constant needs the temperature and is reported on output only.
        self.summary(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::line_context;
    use super::*;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn atomic_members_contribute_their_own_moments() {
        let ctx = line_context();
        let mut analysis = MultipoleAnalysis::new(1, None);
        analysis.sample(&ctx).unwrap();
        let observables: BTreeMap<String, f64> = analysis.observables().into_iter().collect();
        // Two +1 particles with unit dipoles and two -1 particles without.
        assert!(f64_approx_equal(observables["multipole[mix].Z"], 0.0));
        assert!(f64_approx_equal(observables["multipole[mix].Z2"], 1.0));
        assert!(f64_approx_equal(observables["multipole[mix].mu"], 0.5));
        // Total dipole (0, 0, 2).
        assert!(f64_approx_equal(observables["multipole.M2"], 4.0));
    }

    #[test]
    fn dielectric_constant_follows_dipole_fluctuations() {
        let ctx = line_context();
        let mut analysis = MultipoleAnalysis::new(1, None);
        analysis.sample(&ctx).unwrap();
        let lb = 560.0;
        let expected = 1.0 + 4.0 * PI * lb * 4.0 / (3.0 * 8000.0);
        assert!(f64_approx_equal(analysis.dielectric_constant(lb), expected));
    }

    #[test]
    fn finalize_writes_named_rows() {
        let ctx = line_context();
        let dir = tempdir().unwrap();
        let file = dir.path().join("multipole.dat");
        let mut analysis = MultipoleAnalysis::new(1, Some(file.clone()));
        analysis.sample(&ctx).unwrap();
        analysis.finalize(&ctx).unwrap();
        let content = std::fs::read_to_string(file).unwrap();
        assert!(content.lines().any(|l| l.starts_with("multipole.epsr ")));
    }
}
