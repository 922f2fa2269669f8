use crate::cli::Cli;
use crate::config::build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use metropp::engine::progress::ProgressReporter;
use metropp::engine::regression::RegressionOutcome;
use metropp::workflows::{self, simulate::SimulationReport};
use std::fmt::Write;
use tracing::{info, warn};

pub fn run(cli: &Cli) -> Result<()> {
    let app_config = build_config(cli)?;
    info!(
        "Configuration loaded from {:?}: {} atom types, {} molecule kinds, {} moves, {} samplers.",
        &app_config.config_path,
        app_config.core_config.atoms.len(),
        app_config.core_config.molecules.len(),
        app_config.core_config.moves.len(),
        app_config.core_config.analysis.len()
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting Metropolis Monte Carlo simulation...");
    let report = workflows::simulate::run(&app_config.core_config, &reporter)?;

    if report.drift_warnings > 0 {
        warn!(
            "Energy drift exceeded the tolerance {} time(s).",
            report.drift_warnings
        );
    }
    print!("{}", summarize(&report));
    Ok(())
}

fn summarize(report: &SimulationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "✓ Simulation finished.");
    if let Some(path) = &report.resumed_from {
        let _ = writeln!(out, "  Resumed from:        {}", path.display());
    }
    let _ = writeln!(out, "  Macro steps:         {}", report.macro_steps);
    let _ = writeln!(out, "  Total trials:        {}", report.total_trials);
    let _ = writeln!(
        out,
        "  Energy (kT):         {:.6} -> {:.6}",
        report.initial_energy, report.final_energy
    );
    let _ = writeln!(out, "  Acceptance:          {:.4}", report.acceptance);
    let _ = writeln!(
        out,
        "  Drift warnings:      {} (max relative drift {:.3e})",
        report.drift_warnings, report.max_relative_drift
    );
    if report.disabled_samplers > 0 {
        let _ = writeln!(out, "  Disabled samplers:   {}", report.disabled_samplers);
    }
    for (name, stats) in &report.move_statistics {
        let _ = writeln!(
            out,
            "  {:<32} attempts {:>10}  acceptance {:.4}  msd {:.4}",
            name,
            stats.attempts,
            stats.acceptance(),
            stats.mean_squared_displacement()
        );
    }
    match &report.regression {
        Some(RegressionOutcome::Created { observables }) => {
            let _ = writeln!(out, "  Regression fixture written ({observables} observables).");
        }
        Some(RegressionOutcome::Checked {
            compared,
            mismatches,
        }) => {
            let _ = writeln!(
                out,
                "  Regression check: {} compared, {} mismatched.",
                compared,
                mismatches.len()
            );
        }
        None => {}
    }
    out
}
