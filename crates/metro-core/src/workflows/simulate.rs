use crate::engine::checkpoint::Checkpoint;
use crate::engine::config::SimulationConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::regression::{self, RegressionOutcome};
use crate::engine::simulation::Simulation;
use crate::engine::state::MoveStatistics;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub initial_energy: f64,
    pub final_energy: f64,
    /// Macro steps performed by this invocation.
    pub macro_steps: u64,
    /// Trials performed since the chain started, including resumed runs.
    pub total_trials: u64,
    pub acceptance: f64,
    pub move_statistics: BTreeMap<String, MoveStatistics>,
    pub drift_warnings: u64,
    pub max_relative_drift: f64,
    pub disabled_samplers: usize,
    pub resumed_from: Option<PathBuf>,
    pub observables: Vec<(String, f64)>,
    pub regression: Option<RegressionOutcome>,
}

/// Runs a complete simulation: assembles the system, resumes from a state file if one
/// exists, performs all macro steps and flushes the samplers.
///
/// # Errors
///
/// Returns [`EngineError`] for invalid configurations, unusable state files, output
/// failures and, when the regression fixture is marked stable, fixture mismatches.
#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(config: &SimulationConfig, reporter: &ProgressReporter) -> Result<SimulationReport, EngineError> {
    // === Phase 1: Assembly and resume ===
    reporter.report(Progress::PhaseStart { name: "Setup" });
    let mut simulation = Simulation::from_config(config)?;
    let resumed_from = match config.resume_file() {
        Some(path) => resume(&mut simulation, path)?,
        None => None,
    };
    let initial_energy = simulation.context().state.energy;
    info!(energy = initial_energy, "Initial energy evaluated.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Sampling ===
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    let macro_steps = simulation.macro_steps();
    reporter.report(Progress::TaskStart {
        total_steps: macro_steps,
    });
    for _ in 0..macro_steps {
        let summary = simulation.macro_step()?;
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::Status {
            macro_step: summary.macro_step,
            energy: summary.energy,
            acceptance: summary.acceptance,
        });
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Output ===
    reporter.report(Progress::PhaseStart { name: "Finalizing" });
    let observables = simulation.finish()?;
    let regression = match &config.system.unittest {
        Some(fixture) => {
            let outcome = regression::check(&fixture.file, &observables, regression::DEFAULT_TOLERANCE)?;
            if fixture.stable && !outcome.passed() {
                return Err(EngineError::Regression {
                    path: fixture.file.clone(),
                    mismatches: outcome.mismatch_count(),
                });
            }
            Some(outcome)
        }
        None => None,
    };
    reporter.report(Progress::PhaseFinish);

    let state = &simulation.context().state;
    if state.drift_warnings > 0 {
        warn!(
            warnings = state.drift_warnings,
            max_relative_drift = state.max_relative_drift,
            "Energy drift exceeded the tolerance during the run."
        );
    }
    let report = SimulationReport {
        initial_energy,
        final_energy: state.energy,
        macro_steps,
        total_trials: state.trials,
        acceptance: state.overall_acceptance(),
        move_statistics: state.statistics.clone(),
        drift_warnings: state.drift_warnings,
        max_relative_drift: state.max_relative_drift,
        disabled_samplers: simulation.samplers().disabled_count(),
        resumed_from,
        observables,
        regression,
    };
    info!(
        trials = report.total_trials,
        energy = report.final_energy,
        acceptance = report.acceptance,
        "Simulation complete."
    );
    Ok(report)
}

fn resume(simulation: &mut Simulation, path: &Path) -> Result<Option<PathBuf>, EngineError> {
    if !path.exists() {
        info!(path = %path.display(), "No state file found; starting from the generated configuration.");
        return Ok(None);
    }
    let state_error = |source| EngineError::StateFile {
        path: path.to_path_buf(),
        source,
    };
    let checkpoint = Checkpoint::load(path).map_err(state_error)?;
    checkpoint.restore(simulation.context_mut()).map_err(state_error)?;
    let state = &simulation.context().state;
    info!(
        path = %path.display(),
        trials = state.trials,
        macro_step = state.macro_step,
        energy = state.energy,
        "Resumed from state file."
    );
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::electrostatics::EwaldParameters;
    use crate::core::geometry::Geometry;
    use crate::engine::config::{
        AnalysisConfig, AtomConfig, ElectrostaticsConfig, EnergyConfig, MoleculeConfig, MoveConfig,
        SimulationConfigBuilder, UnitTestConfig,
    };
    use nalgebra::Vector3;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-6;

    fn builder(dir: &Path) -> SimulationConfigBuilder {
        let mut na = AtomConfig::new("Na");
        na.charge = 1.0;
        na.sigma = 3.0;
        na.dp = 2.0;
        let mut cl = AtomConfig::new("Cl");
        cl.charge = -1.0;
        cl.sigma = 4.0;
        cl.dp = 2.0;
        let mut salt = MoleculeConfig::new("salt");
        salt.atoms = vec!["Na".into(), "Cl".into()];
        salt.atomic = true;
        salt.n_init = 8;
        SimulationConfigBuilder::new()
            .atom(na)
            .atom(cl)
            .molecule(salt)
            .energy(EnergyConfig {
                epsr: 80.0,
                electrostatics: ElectrostaticsConfig::Wolf {
                    alpha: 0.2,
                    cutoff: 12.0,
                },
                lj_cutoff: None,
            })
            .add_move(MoveConfig::AtomTranslate {
                molecule: "salt".into(),
                dp: None,
                direction: Vector3::repeat(1.0),
                per_atom: true,
                weight: 1.0,
            })
            .analysis(AnalysisConfig::StateFile {
                interval: None,
                file: dir.join("state.json"),
            })
            .temperature(298.15)
            .geometry(Geometry::cube(40.0).unwrap())
    }

    #[test]
    fn running_energy_matches_recomputation() {
        let dir = tempdir().unwrap();
        let config = builder(dir.path()).mc_loop(3, 20).build().unwrap();
        let report = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(report.macro_steps, 3);
        assert_eq!(report.total_trials, 3 * 20 * 16);
        assert_eq!(report.drift_warnings, 0);
        assert!(report.max_relative_drift < TOLERANCE);
        assert!(report.resumed_from.is_none());
        assert!(dir.path().join("state.json").exists());
    }

    #[test]
    fn resumed_run_is_bit_identical_to_an_uninterrupted_one() {
        let straight_dir = tempdir().unwrap();
        let straight = builder(straight_dir.path()).mc_loop(2, 15).build().unwrap();
        let uninterrupted = run(&straight, &ProgressReporter::new()).unwrap();

        let split_dir = tempdir().unwrap();
        let half = builder(split_dir.path()).mc_loop(1, 15).build().unwrap();
        let first = run(&half, &ProgressReporter::new()).unwrap();
        assert!(first.resumed_from.is_none());
        let second = run(&half, &ProgressReporter::new()).unwrap();
        assert!(second.resumed_from.is_some());

        assert_eq!(second.total_trials, uninterrupted.total_trials);
        assert_eq!(second.final_energy.to_bits(), uninterrupted.final_energy.to_bits());
        assert_eq!(second.move_statistics, uninterrupted.move_statistics);
        let straight_state = Checkpoint::load(&straight_dir.path().join("state.json")).unwrap();
        let split_state = Checkpoint::load(&split_dir.path().join("state.json")).unwrap();
        assert_eq!(straight_state, split_state);
    }

    fn ewald(dir: &Path) -> SimulationConfigBuilder {
        builder(dir).energy(EnergyConfig {
            epsr: 80.0,
            electrostatics: ElectrostaticsConfig::Ewald(EwaldParameters {
                alpha: 0.2,
                cutoff: 12.0,
                cutoff_k: 4.0,
                eps_surf: None,
                spherical_sum: true,
                update_frequency: 7,
            }),
            lj_cutoff: None,
        })
    }

    #[test]
    fn resumed_ewald_run_carries_structure_factors_and_rebuild_counter() {
        let straight_dir = tempdir().unwrap();
        let straight = ewald(straight_dir.path()).mc_loop(2, 13).build().unwrap();
        let uninterrupted = run(&straight, &ProgressReporter::new()).unwrap();

        let split_dir = tempdir().unwrap();
        let half = ewald(split_dir.path()).mc_loop(1, 13).build().unwrap();
        run(&half, &ProgressReporter::new()).unwrap();
        let midway = Checkpoint::load(&split_dir.path().join("state.json")).unwrap();
        let accepted: u64 = midway.state().statistics.values().map(|s| s.accepted).sum();
        // Several cadence rebuilds ran before the macro-step drift check reset the counter.
        assert!(accepted >= 2 * 7);
        assert_eq!(midway.state().accepted_since_rebuild, 0);

        let second = run(&half, &ProgressReporter::new()).unwrap();
        assert!(second.resumed_from.is_some());
        assert_eq!(second.total_trials, uninterrupted.total_trials);
        assert_eq!(second.final_energy.to_bits(), uninterrupted.final_energy.to_bits());
        let straight_state = Checkpoint::load(&straight_dir.path().join("state.json")).unwrap();
        let split_state = Checkpoint::load(&split_dir.path().join("state.json")).unwrap();
        assert_eq!(straight_state, split_state);
    }

    #[test]
    fn progress_reports_every_macro_step() {
        let dir = tempdir().unwrap();
        let config = builder(dir.path()).mc_loop(4, 5).build().unwrap();
        let increments = Mutex::new(0u64);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::TaskIncrement) {
                *increments.lock().unwrap() += 1;
            }
        }));
        run(&config, &reporter).unwrap();
        drop(reporter);
        assert_eq!(increments.into_inner().unwrap(), 4);
    }

    #[test]
    fn stable_fixture_mismatch_fails_the_run() {
        let dir = tempdir().unwrap();
        let fixture = dir.path().join("fixture.json");
        std::fs::write(&fixture, r#"{ "energy": 1000000.0 }"#).unwrap();
        let config = builder(dir.path())
            .mc_loop(1, 5)
            .unittest(Some(UnitTestConfig {
                file: fixture.clone(),
                stable: true,
            }))
            .build()
            .unwrap();
        let result = run(&config, &ProgressReporter::new());
        assert!(matches!(result, Err(EngineError::Regression { mismatches: 1, .. })));
    }

    #[test]
    fn corrupt_state_file_is_fatal() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), "garbage").unwrap();
        let config = builder(dir.path()).mc_loop(1, 1).build().unwrap();
        let result = run(&config, &ProgressReporter::new());
        assert!(matches!(result, Err(EngineError::StateFile { .. })));
    }
}
