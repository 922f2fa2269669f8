//! # Engine Module
//!
//! The stateful layer of the simulator: it turns a validated configuration into a running
//! Markov chain and keeps that chain consistent.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Typed, validated description of a run, built once
//! - **Context** ([`context`]) - The [`System`](context::System) plus the random stream and
//!   the running energy, owned in one place and passed to every component
//! - **Moves** ([`moves`]) - Proposal kernels for single atoms, molecules, chains, clusters,
//!   the volume and protonation states
//! - **Metropolis** ([`metropolis`]) - The accept/reject controller with transactional
//!   rollback and incremental Ewald updates
//! - **Analysis** ([`analysis`]) - Samplers observing the chain at their own cadence
//! - **Persistence** ([`checkpoint`], [`regression`]) - Exact state files and regression
//!   fixtures
//! - **Driver** ([`simulation`]) - Macro/micro loop with drift checks
//! - **Progress and errors** ([`progress`], [`error`])
//!
//! The chain is strictly sequential. Parallelism lives inside single energy evaluations
//! (pair sums and k-vector sums) and is always joined before the acceptance decision.

pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub mod metropolis;
pub mod moves;
pub mod progress;
pub mod regression;
pub mod rng;
pub mod simulation;
pub mod state;
pub(crate) mod transaction;
