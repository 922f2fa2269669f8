use super::analysis::SamplerSet;
use super::config::SimulationConfig;
use super::context::{DriftCheck, SimulationContext};
use super::error::EngineError;
use super::metropolis::{TrialOutcome, perform_trial};
use super::moves::{MonteCarloMove, MoveSet};
use tracing::{debug, info};

/// Result of one macro step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroSummary {
    pub macro_step: u64,
    pub energy: f64,
    pub acceptance: f64,
    pub drift: DriftCheck,
}

/// The Markov chain driver: a context, the moves acting on it and the samplers observing it.
///
/// One micro step selects a single move by weight and performs it `repeats` times. After
/// every micro step the samplers due at the cumulative micro-step count are triggered. A
/// macro step is `micro_steps` micro steps followed by a drift check.
pub struct Simulation {
    context: SimulationContext,
    moves: MoveSet,
    samplers: SamplerSet,
    macro_steps: u64,
    micro_steps: u64,
    drift_interval: Option<u64>,
}

impl Simulation {
    pub fn from_config(config: &SimulationConfig) -> Result<Self, EngineError> {
        let context = SimulationContext::from_config(config)?;
        let moves = MoveSet::from_configs(&config.moves, &context.system)?;
        let samplers = SamplerSet::from_configs(&config.analysis, &context)?;
        info!(
            moves = moves.len(),
            samplers = samplers.len(),
            macro_steps = config.system.macro_steps,
            micro_steps = config.system.micro_steps,
            "Simulation ready."
        );
        Ok(Self::new(
            context,
            moves,
            samplers,
            config.system.macro_steps,
            config.system.micro_steps,
            config.system.drift_interval,
        ))
    }

    pub fn new(
        context: SimulationContext,
        moves: MoveSet,
        samplers: SamplerSet,
        macro_steps: u64,
        micro_steps: u64,
        drift_interval: Option<u64>,
    ) -> Self {
        Self {
            context,
            moves,
            samplers,
            macro_steps,
            micro_steps,
            drift_interval,
        }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SimulationContext {
        &mut self.context
    }

    pub fn macro_steps(&self) -> u64 {
        self.macro_steps
    }

    pub fn micro_steps(&self) -> u64 {
        self.micro_steps
    }

    pub fn samplers(&self) -> &SamplerSet {
        &self.samplers
    }

    pub fn micro_step(&mut self) -> Result<(), EngineError> {
        if let Some(index) = self.moves.select(&mut self.context.rng) {
            if let Some(mv) = self.moves.get_mut(index) {
                for _ in 0..mv.repeats(&self.context.system) {
                    if perform_trial(&mut self.context, mv) == TrialOutcome::Skipped {
                        break;
                    }
                }
            }
        }
        self.context.state.micro_step += 1;
        let step = self.context.state.micro_step;
        if self.drift_interval.is_some_and(|n| n > 0 && step % n == 0) {
            self.context.check_drift()?;
        }
        self.samplers.sample(step, &self.context)
    }

    pub fn macro_step(&mut self) -> Result<MacroSummary, EngineError> {
        for _ in 0..self.micro_steps {
            self.micro_step()?;
        }
        let drift = self.context.check_drift()?;
        self.context.state.macro_step += 1;
        let summary = MacroSummary {
            macro_step: self.context.state.macro_step,
            energy: self.context.state.energy,
            acceptance: self.context.state.overall_acceptance(),
            drift,
        };
        info!(
            macro_step = summary.macro_step,
            energy = summary.energy,
            acceptance = summary.acceptance,
            relative_drift = drift.relative_drift,
            volume = self.context.system.space.geometry.volume(),
            "Macro step finished."
        );
        for (name, stats) in &self.context.state.statistics {
            debug!(
                name = %name,
                attempts = stats.attempts,
                acceptance = stats.acceptance(),
                msd = stats.mean_squared_displacement(),
                "Move statistics."
            );
        }
        Ok(summary)
    }

    /// Flushes all samplers and returns the run's named observables: the final energy, the
    /// acceptance of every move and whatever the samplers report.
    pub fn finish(&mut self) -> Result<Vec<(String, f64)>, EngineError> {
        self.samplers.finalize(&self.context)?;
        let state = &self.context.state;
        let mut observables = vec![("energy".to_string(), state.energy)];
        observables.extend(
            state
                .statistics
                .iter()
                .map(|(name, s)| (format!("acceptance[{name}]"), s.acceptance())),
        );
        observables.extend(self.samplers.observables());
        Ok(observables)
    }

    /// Names of the configured moves, in configuration order.
    pub fn move_names(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::analysis::test_support::line_context;
    use crate::core::models::ids::MoleculeKindId;
    use crate::engine::moves::{AtomTranslate, Move};
    use nalgebra::Vector3;

    fn simulation(drift_interval: Option<u64>) -> Simulation {
        let ctx = line_context();
        let translate = AtomTranslate::new(
            "mix",
            MoleculeKindId(0),
            Some(1.0),
            Vector3::repeat(1.0),
            false,
            1.0,
        );
        Simulation::new(
            ctx,
            MoveSet::new(vec![Move::AtomTranslate(translate)]),
            SamplerSet::default(),
            2,
            25,
            drift_interval,
        )
    }

    #[test]
    fn macro_step_runs_all_micro_steps_and_counts() {
        let mut sim = simulation(None);
        let first = sim.macro_step().unwrap();
        assert_eq!(first.macro_step, 1);
        assert_eq!(sim.context().state.micro_step, 25);
        assert_eq!(sim.context().state.trials, 25);
        assert!(first.acceptance > 0.0);
        sim.macro_step().unwrap();
        assert_eq!(sim.context().state.micro_step, 50);
    }

    #[test]
    fn finish_reports_energy_and_move_acceptance() {
        let mut sim = simulation(Some(5));
        sim.macro_step().unwrap();
        let observables = sim.finish().unwrap();
        assert_eq!(observables[0].0, "energy");
        assert!(observables.iter().any(|(name, _)| name == "acceptance[atomtranslate[mix]]"));
        assert_eq!(sim.move_names(), vec!["atomtranslate[mix]".to_string()]);
    }
}
