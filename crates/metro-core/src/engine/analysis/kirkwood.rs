use super::{AnalysisError, Histogram, Sampler, write_table};
use crate::engine::context::SimulationContext;
use itertools::Itertools;
use std::path::PathBuf;

/// Distance-resolved Kirkwood factor of the point dipoles,
/// `G(r) = 1 + <Σ_{j≠i, r_ij<r} μ̂_i·μ̂_j>` averaged over dipolar particles `i`.
#[derive(Debug, Clone)]
pub struct KirkwoodFactor {
    interval: u64,
    correlations: Histogram,
    /// Sum over samples of the number of dipolar particles.
    dipoles: f64,
    file: PathBuf,
}

impl KirkwoodFactor {
    pub fn new(interval: u64, dr: f64, file: PathBuf) -> Self {
        Self {
            interval,
            correlations: Histogram::new(dr),
            dipoles: 0.0,
            file,
        }
    }

    /// `(r, G(r))` at the upper edge of every bin.
    pub fn cumulative(&self) -> Vec<(f64, f64)> {
        if self.dipoles == 0.0 {
            return Vec::new();
        }
        let dr = self.correlations.width();
        self.correlations
            .iter()
            .scan(1.0, |g, (r, c)| {
                *g += c / self.dipoles;
                Some((r + dr, *g))
            })
            .collect()
    }
}

impl Sampler for KirkwoodFactor {
    fn name(&self) -> &str {
        "kirkwoodfactor"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let space = &ctx.system.space;
        let dipolar: Vec<usize> = (0..space.len()).filter(|&i| space.particles[i].is_dipolar()).collect();
        if dipolar.is_empty() {
            return Err(AnalysisError::Sampling("no dipolar particles in the system".to_string()));
        }
        for (&i, &j) in dipolar.iter().tuple_combinations() {
            let a = &space.particles[i];
            let b = &space.particles[j];
            let r = space.geometry.distance(&a.position, &b.position);
            // Each unordered pair contributes to both i and j.
            self.correlations.add(r, 2.0 * a.dipole.normalize().dot(&b.dipole.normalize()));
        }
        self.dipoles += dipolar.len() as f64;
        Ok(())
    }

    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        write_table(&self.file, self.cumulative())
    }

    fn observables(&self) -> Vec<(String, f64)> {
        self.cumulative()
            .last()
            .map(|&(_, g)| vec![("kirkwoodfactor.gk".to_string(), g)])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::line_context;
    use super::*;

    #[test]
    fn parallel_dipoles_accumulate_in_the_shell_of_their_separation() {
        let ctx = line_context();
        let mut kirkwood = KirkwoodFactor::new(1, 1.0, PathBuf::from("gk.dat"));
        kirkwood.sample(&ctx).unwrap();
        // The two "A" dipoles are parallel and 3 Å apart.
        let g = kirkwood.cumulative();
        assert_eq!(g.len(), 4);
        assert_eq!(g[2], (3.0, 1.0));
        assert_eq!(g[3], (4.0, 2.0));
        assert_eq!(kirkwood.observables(), vec![("kirkwoodfactor.gk".to_string(), 2.0)]);
    }

    #[test]
    fn system_without_dipoles_fails_sampling() {
        let mut ctx = line_context();
        for p in &mut ctx.system.space.particles {
            p.dipole = nalgebra::Vector3::zeros();
        }
        let mut kirkwood = KirkwoodFactor::new(1, 1.0, PathBuf::from("gk.dat"));
        let error = kirkwood.sample(&ctx).unwrap_err();
        assert!(!error.is_fatal());
    }
}
