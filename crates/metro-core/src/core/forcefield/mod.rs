//! # Force Field Module
//!
//! Energy evaluation for Metropolis sampling. All energies are in units of kT.
//!
//! ## Overview
//!
//! - **Lennard-Jones** 12-6 interactions with Lorentz-Berthelot mixing; attraction-free
//!   pairs with a finite diameter act as hard spheres
//! - **Electrostatics** through plain or reaction-field Coulomb, Wolf summation,
//!   Ewald summation or Debye-Hückel (Yukawa) screening
//! - **Point dipoles** through a truncated dipole-dipole kernel
//! - **Harmonic bonds** `0.5 k (r - req)²` within molecules
//!
//! ## Key Components
//!
//! - [`potentials`] - Pure pair and bond kernels
//! - [`params`] - Mixed Lennard-Jones pair coefficients
//! - [`electrostatics`] - Selection of the electrostatic scheme and its precomputed kernel
//! - [`ewald`] - Reciprocal-space structure factors with incremental updates
//! - [`hamiltonian`] - Subset energies (`energy_of`) used to score trial moves
//! - [`term`] - Energy decomposition by origin
//!
//! ## Usage
//!
//! ```ignore
//! use metropp::core::forcefield::hamiltonian::Hamiltonian;
//!
//! let hamiltonian = Hamiltonian::new(&topology, electrostatics, lb, epsr, None);
//! let before = hamiltonian.energy_of(&space, &topology, &moved)?;
//! ```

pub mod electrostatics;
pub mod ewald;
pub mod hamiltonian;
pub mod params;
pub(crate) mod potentials;
pub mod term;
