use super::{MonteCarloMove, Proposal, Trial};
use crate::core::utils::geometry::random_half;
use crate::core::utils::units::millimolar_to_number_density;
use crate::engine::context::System;
use crate::engine::rng::McRng;

/// Isotropic volume move at constant pressure.
///
/// The new volume is `V + dp (2u - 1)`. Atomic particles scale with the box, molecules are
/// translated rigidly with their mass centers. The bias `-βP ΔV + N ln(V'/V)` counts one
/// translational unit per molecule and per free particle.
#[derive(Debug, Clone)]
pub struct IsobaricMove {
    dp: f64,
    /// βP in Å⁻³.
    beta_pressure: f64,
    weight: f64,
}

impl IsobaricMove {
    pub fn new(dp: f64, pressure_mm: f64, weight: f64) -> Self {
        Self {
            dp,
            beta_pressure: millimolar_to_number_density(pressure_mm),
            weight,
        }
    }

    pub fn beta_pressure(&self) -> f64 {
        self.beta_pressure
    }
}

impl MonteCarloMove for IsobaricMove {
    fn name(&self) -> &str {
        "isobaric"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        if self.dp <= 0.0 {
            return Proposal::Skipped;
        }
        let old_volume = system.space.geometry.volume();
        let new_volume = old_volume + random_half(rng, self.dp);
        let geometry = match system
            .space
            .geometry
            .scaled(new_volume, system.min_container_length())
        {
            Ok(geometry) => geometry,
            Err(e) => return Proposal::Rejected(e),
        };
        let mut scaled = system.space.clone();
        scaled.scale_to(&system.topology, geometry.clone());
        let units = system.space.translational_units() as f64;
        let delta = new_volume - old_volume;
        Proposal::Trial(Trial {
            changes: scaled.particles.into_iter().enumerate().collect(),
            geometry: Some(geometry),
            ln_bias: -self.beta_pressure * delta + units * (new_volume / old_volume).ln(),
            displacement2: delta * delta,
        })
    }
}
