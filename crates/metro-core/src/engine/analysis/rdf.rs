use super::{AnalysisError, Histogram, Sampler, write_table};
use crate::core::models::ids::{AtomTypeId, MoleculeKindId};
use crate::engine::config::{ConfigError, RdfPairConfig};
use crate::engine::context::{SimulationContext, System};
use itertools::{Itertools, iproduct};
use nalgebra::Point3;
use std::f64::consts::PI;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfMode {
    /// Between particles of two atom types.
    Atom,
    /// Between mass centers of two molecule kinds; atomic kinds contribute each particle.
    Molecule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Species {
    Atom(AtomTypeId),
    Molecule(MoleculeKindId),
}

/// Pair distribution function `g(r)` between two species.
///
/// Distances are histogrammed every `interval` steps. The histogram is normalized on output
/// by the ideal-gas pair count of each shell, averaged over the sampled configurations, so
/// `g(r)` stays correct under volume moves.
#[derive(Debug, Clone)]
pub struct RadialDistribution {
    name: String,
    interval: u64,
    first: Species,
    second: Species,
    dim: u8,
    histogram: Histogram,
    /// Sum over samples of `pairs / V_eff`.
    pair_density: f64,
    samples: u64,
    file: PathBuf,
}

impl RadialDistribution {
    pub fn new(mode: RdfMode, pair: &RdfPairConfig, interval: u64, system: &System) -> Result<Self, ConfigError> {
        let resolve = |name: &str| -> Result<Species, ConfigError> {
            match mode {
                RdfMode::Atom => system
                    .topology
                    .find_atom(name)
                    .map(|a| Species::Atom(a.id))
                    .ok_or_else(|| ConfigError::UnknownAtom(name.to_string())),
                RdfMode::Molecule => system
                    .topology
                    .find_molecule(name)
                    .map(|m| Species::Molecule(m.id))
                    .ok_or_else(|| ConfigError::UnknownMolecule(name.to_string())),
            }
        };
        if !(1..=3).contains(&pair.dim) {
            return Err(ConfigError::invalid(
                "analysis.pairs.dim",
                format!("must be 1, 2 or 3, got {}", pair.dim),
            ));
        }
        if pair.dr <= 0.0 {
            return Err(ConfigError::invalid("analysis.pairs.dr", "bin width must be positive"));
        }
        let tag = match mode {
            RdfMode::Atom => "atomrdf",
            RdfMode::Molecule => "molrdf",
        };
        Ok(Self {
            name: format!("{tag}[{}-{}]", pair.first, pair.second),
            interval,
            first: resolve(&pair.first)?,
            second: resolve(&pair.second)?,
            dim: pair.dim,
            histogram: Histogram::new(pair.dr),
            pair_density: 0.0,
            samples: 0,
            file: pair.file.clone(),
        })
    }

    fn positions(system: &System, species: Species) -> Vec<Point3<f64>> {
        let space = &system.space;
        match species {
            Species::Atom(id) => space.particles_of_type(id).map(|i| space.particles[i].position).collect(),
            Species::Molecule(kind) => space
                .groups_of_kind(kind)
                .flat_map(|g| {
                    let group = space.groups[g];
                    if group.atomic {
                        space.particles[group.range()].iter().map(|p| p.position).collect()
                    } else {
                        vec![space.mass_center(&system.topology, g)]
                    }
                })
                .collect(),
        }
    }

    /// Measure of the shell `[r, r + dr)` in the sampling dimension.
    fn shell(&self, r: f64) -> f64 {
        let dr = self.histogram.width();
        let outer = r + dr;
        match self.dim {
            1 => 2.0 * dr,
            2 => PI * (outer * outer - r * r),
            _ => 4.0 / 3.0 * PI * (outer.powi(3) - r.powi(3)),
        }
    }

    /// `(r, g(r))` at every bin center.
    pub fn distribution(&self) -> Vec<(f64, f64)> {
        if self.pair_density <= 0.0 {
            return Vec::new();
        }
        let dr = self.histogram.width();
        self.histogram
            .iter()
            .map(|(r, count)| (r + 0.5 * dr, count / (self.shell(r) * self.pair_density)))
            .collect()
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl Sampler for RadialDistribution {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let system = &ctx.system;
        let geometry = &system.space.geometry;
        let a = Self::positions(system, self.first);
        let same = self.first == self.second;
        let b = if same { Vec::new() } else { Self::positions(system, self.second) };
        let mut pairs = 0usize;
        if same {
            for (p, q) in a.iter().tuple_combinations() {
                self.histogram.add(geometry.distance(p, q), 1.0);
                pairs += 1;
            }
        } else {
            for (p, q) in iproduct!(&a, &b) {
                self.histogram.add(geometry.distance(p, q), 1.0);
                pairs += 1;
            }
        }
        let effective_volume = geometry.volume().powf(f64::from(self.dim) / 3.0);
        self.pair_density += pairs as f64 / effective_volume;
        self.samples += 1;
        Ok(())
    }

    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        write_table(&self.file, self.distribution())
    }

    fn observables(&self) -> Vec<(String, f64)> {
        let samples = self.samples.max(1) as f64;
        vec![(format!("{}.pairs", self.name), self.histogram.total() / samples)]
    }
}
