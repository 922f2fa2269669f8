//! # Core Module
//!
//! The stateless foundation of the engine: what a system is made of and how its energy
//! is computed.
//!
//! ## Architecture
//!
//! - **Container** ([`geometry`]) - Cuboid, slab and sphere boundaries with minimum-image distances
//! - **Molecular Representation** ([`models`]) - Atom types, molecules, particles and the mutable `Space`
//! - **Energy Calculations** ([`forcefield`]) - Pair kernels, electrostatic schemes, Ewald sums and subset energies
//! - **File I/O** ([`io`]) - Coordinate file reading and writing
//! - **Utilities** ([`utils`]) - Unit conversions and rotation helpers
//!
//! ## Conventions
//!
//! Energies are expressed in kT, lengths in Å and charges in elementary charges. Electrostatic
//! energies are converted through the Bjerrum length of the solvent.

pub mod forcefield;
pub mod geometry;
pub mod io;
pub mod models;
pub mod utils;
