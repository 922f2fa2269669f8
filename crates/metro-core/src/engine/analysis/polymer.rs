use super::{AnalysisError, Sampler, write_table};
use crate::core::models::ids::MoleculeKindId;
use crate::engine::config::ConfigError;
use crate::engine::context::{SimulationContext, System};
use nalgebra::Vector3;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
struct ShapeAverages {
    name: String,
    samples: f64,
    gyration2: f64,
    end_to_end2: f64,
}

/// Mean squared radius of gyration and end-to-end distance of polymeric molecules.
///
/// Chains are made whole across periodic boundaries before measuring.
#[derive(Debug, Clone)]
pub struct PolymerShape {
    interval: u64,
    kinds: Vec<(MoleculeKindId, ShapeAverages)>,
    file: Option<PathBuf>,
}

impl PolymerShape {
    pub fn new(interval: u64, molecules: &[String], file: Option<PathBuf>, system: &System) -> Result<Self, ConfigError> {
        let kinds = molecules
            .iter()
            .map(|name| {
                let kind = system
                    .topology
                    .find_molecule(name)
                    .ok_or_else(|| ConfigError::UnknownMolecule(name.clone()))?;
                Ok((
                    kind.id,
                    ShapeAverages {
                        name: name.clone(),
                        ..ShapeAverages::default()
                    },
                ))
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self { interval, kinds, file })
    }

    /// `(Rg², Ree²)` of one group.
    fn measure(system: &System, group_index: usize) -> (f64, f64) {
        let positions = system.space.unwrapped_positions(group_index);
        let group = system.space.groups[group_index];
        let masses: Vec<f64> = system.space.particles[group.range()]
            .iter()
            .map(|p| system.topology.atom(p.atom_id).molar_mass)
            .collect();
        let total_mass: f64 = masses.iter().sum();
        if positions.is_empty() || total_mass <= 0.0 {
            return (0.0, 0.0);
        }
        let center: Vector3<f64> = positions
            .iter()
            .zip(&masses)
            .map(|(p, m)| p.coords * *m)
            .sum::<Vector3<f64>>()
            / total_mass;
        let gyration2 = positions
            .iter()
            .zip(&masses)
            .map(|(p, m)| m * (p.coords - center).norm_squared())
            .sum::<f64>()
            / total_mass;
        let end_to_end2 = (positions[positions.len() - 1] - positions[0]).norm_squared();
        (gyration2, end_to_end2)
    }

    fn rows(&self) -> Vec<(String, f64)> {
        self.kinds
            .iter()
            .filter(|(_, a)| a.samples > 0.0)
            .flat_map(|(_, a)| {
                [
                    (format!("polymershape[{}].Rg2", a.name), a.gyration2 / a.samples),
                    (format!("polymershape[{}].Ree2", a.name), a.end_to_end2 / a.samples),
                ]
            })
            .collect()
    }
}

impl Sampler for PolymerShape {
    fn name(&self) -> &str {
        "polymershape"
    }

    fn interval(&self) -> Option<u64> {
        Some(self.interval)
    }

    fn sample(&mut self, ctx: &SimulationContext) -> Result<(), AnalysisError> {
        let system = &ctx.system;
        for (kind, averages) in &mut self.kinds {
            for g in system.space.groups_of_kind(*kind) {
                if system.space.groups[g].atomic {
                    continue;
                }
                let (gyration2, end_to_end2) = Self::measure(system, g);
                averages.gyration2 += gyration2;
                averages.end_to_end2 += end_to_end2;
                averages.samples += 1.0;
            }
        }
        Ok(())
    }

    fn finalize(&mut self, _ctx: &SimulationContext) -> Result<(), AnalysisError> {
        match &self.file {
            Some(file) => write_table(file, self.rows()),
            None => Ok(()),
        }
    }

    fn observables(&self) -> Vec<(String, f64)> {
        self.rows()
    }
}
