//! # Core Models Module
//!
//! Data structures describing what is being simulated.
//!
//! ## Key Components
//!
//! - [`atom`] - Species parameters shared by all particles of one type
//! - [`particle`] - Individual interaction sites with position, charge and orientation
//! - [`molecule`] - Molecule templates, harmonic bonds and molecule instances (groups)
//! - [`topology`] - The immutable tables of atom types and molecule kinds
//! - [`space`] - The mutable configuration: container, particles and groups
//! - [`process`] - Titration equilibria between a bound and a free species
//! - [`ids`] - Index types into the topology tables
//!
//! ## Usage
//!
//! ```ignore
//! use metropp::core::models::{space::Space, topology::Topology};
//!
//! let mut space = Space::new(Geometry::cube(50.0)?);
//! space.populate(&topology, &mut rng)?;
//! let center = space.mass_center(&topology, 0);
//! ```

pub mod atom;
pub mod ids;
pub mod molecule;
pub mod particle;
pub mod process;
pub mod space;
pub mod topology;
