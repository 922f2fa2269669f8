//! Pair and bond kernels in units of kT.
//!
//! Electrostatic kernels take the Bjerrum length `lb` and the charge product `qq`.
//! Functions named `*_virial` return `-r·du/dr`, the pair contribution to the virial.

use libm::erfc;
use nalgebra::Vector3;
use std::f64::consts::PI;

#[inline]
pub fn lennard_jones(r2: f64, sigma2: f64, eps4: f64) -> f64 {
    let x3 = (sigma2 / r2).powi(3);
    eps4 * (x3 * x3 - x3)
}

#[inline]
pub fn lennard_jones_virial(r2: f64, sigma2: f64, eps4: f64) -> f64 {
    let x3 = (sigma2 / r2).powi(3);
    eps4 * (12.0 * x3 * x3 - 6.0 * x3)
}

#[inline]
pub fn hard_sphere(r2: f64, contact2: f64) -> f64 {
    if r2 < contact2 { f64::INFINITY } else { 0.0 }
}

#[inline]
pub fn coulomb(r: f64, lb: f64, qq: f64) -> f64 {
    lb * qq / r
}

/// Reaction-field constants `(k_rf, c_rf)` for a cutoff `rc`, solvent permittivity `epsr`
/// and continuum permittivity `eps_rf`.
#[inline]
pub fn reaction_field_constants(rc: f64, epsr: f64, eps_rf: f64) -> (f64, f64) {
    let k_rf = (eps_rf - epsr) / ((2.0 * eps_rf + epsr) * rc.powi(3));
    let c_rf = 3.0 * eps_rf / ((2.0 * eps_rf + epsr) * rc);
    (k_rf, c_rf)
}

#[inline]
pub fn reaction_field(r: f64, lb: f64, qq: f64, k_rf: f64, c_rf: f64) -> f64 {
    lb * qq * (1.0 / r + k_rf * r * r - c_rf)
}

#[inline]
pub fn reaction_field_virial(r: f64, lb: f64, qq: f64, k_rf: f64) -> f64 {
    lb * qq * (1.0 / r - 2.0 * k_rf * r * r)
}

/// Damped, shifted Coulomb interaction of the Wolf summation; zero beyond `rc`.
#[inline]
pub fn wolf(r: f64, lb: f64, qq: f64, alpha: f64, rc: f64) -> f64 {
    if r >= rc {
        return 0.0;
    }
    lb * qq * (erfc(alpha * r) / r - erfc(alpha * rc) / rc)
}

/// Per-particle self term of the Wolf summation for a squared charge `q2`.
#[inline]
pub fn wolf_self(q2: f64, lb: f64, alpha: f64, rc: f64) -> f64 {
    -lb * q2 * (erfc(alpha * rc) / (2.0 * rc) + alpha / PI.sqrt())
}

/// Real-space term of the Ewald summation.
#[inline]
pub fn ewald_real(r: f64, lb: f64, qq: f64, alpha: f64) -> f64 {
    lb * qq * erfc(alpha * r) / r
}

#[inline]
pub fn ewald_self(q2: f64, lb: f64, alpha: f64) -> f64 {
    -lb * q2 * alpha / PI.sqrt()
}

/// Virial of a Gaussian-damped Coulomb pair (Wolf and Ewald real space).
#[inline]
pub fn damped_coulomb_virial(r: f64, lb: f64, qq: f64, alpha: f64) -> f64 {
    let ar = alpha * r;
    lb * qq * (erfc(ar) / r + 2.0 * alpha / PI.sqrt() * (-ar * ar).exp())
}

/// Debye-Hückel screened Coulomb interaction with inverse screening length `kappa`.
#[inline]
pub fn yukawa(r: f64, lb: f64, qq: f64, kappa: f64) -> f64 {
    lb * qq * (-kappa * r).exp() / r
}

#[inline]
pub fn yukawa_virial(r: f64, lb: f64, qq: f64, kappa: f64) -> f64 {
    lb * qq * (-kappa * r).exp() * (1.0 / r + kappa)
}

/// Interaction between point dipoles `mu_a` and `mu_b` separated by `r_vec`.
#[inline]
pub fn dipole_dipole(r_vec: &Vector3<f64>, mu_a: &Vector3<f64>, mu_b: &Vector3<f64>, lb: f64) -> f64 {
    let r2 = r_vec.norm_squared();
    let r = r2.sqrt();
    let r3 = r2 * r;
    lb * (mu_a.dot(mu_b) / r3 - 3.0 * mu_a.dot(r_vec) * mu_b.dot(r_vec) / (r3 * r2))
}

#[inline]
pub fn harmonic_bond(r: f64, k: f64, req: f64) -> f64 {
    let d = r - req;
    0.5 * k * d * d
}
