//! # Metro++ Core Library
//!
//! A Metropolis Monte Carlo engine for periodic and confined particle systems: salts,
//! dipolar fluids, polymers and titratable molecules with pluggable electrostatics.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `Space`, `Geometry`),
//!   pure potentials and electrostatic schemes, the `Hamiltonian`, Ewald reciprocal space and
//!   coordinate file I/O.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It owns the `SimulationContext`
//!   (system, random stream, running energy), the move kernels, the Metropolis controller
//!   with transactional rollback, the analysis samplers and exact checkpointing.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into complete runs,
//!   such as [`workflows::simulate::run`].

pub mod core;
pub mod engine;
pub mod workflows;
