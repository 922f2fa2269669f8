//! # Workflows Module
//!
//! High-level entry points that run complete procedures on top of the [`engine`](crate::engine).
//!
//! - **Simulation Workflow** ([`simulate`]) - Assembles the system from a
//!   [`SimulationConfig`](crate::engine::config::SimulationConfig), resumes from a state file
//!   when one exists, runs the macro/micro loop and flushes every sampler.
//!
//! Workflows report their phases through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and return an
//! [`EngineError`](crate::engine::error::EngineError) for anything fatal.

pub mod simulate;
