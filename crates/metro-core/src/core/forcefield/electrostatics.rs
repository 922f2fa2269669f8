use super::potentials;
use nalgebra::Vector3;

/// Parameters of an Ewald summation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EwaldParameters {
    /// Gaussian damping parameter in 1/Å.
    pub alpha: f64,
    /// Real-space cutoff in Å.
    pub cutoff: f64,
    /// Reciprocal-space cutoff in units of `2π/L`.
    pub cutoff_k: f64,
    /// Dielectric constant of the surrounding continuum; `None` means tinfoil.
    pub eps_surf: Option<f64>,
    /// Spherical (`|n| <= cutoff_k`) rather than cubic truncation of the k-vector set.
    pub spherical_sum: bool,
    /// Number of accepted moves between full structure factor rebuilds.
    pub update_frequency: u64,
}

/// Electrostatic scheme selected for the charge-charge interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Electrostatics {
    None,
    /// Plain Coulomb, optionally truncated, optionally with a reaction field beyond the cutoff.
    Plain {
        cutoff: Option<f64>,
        eps_rf: Option<f64>,
    },
    Wolf {
        alpha: f64,
        cutoff: f64,
    },
    Ewald(EwaldParameters),
    Yukawa {
        debye_length: f64,
        cutoff: Option<f64>,
    },
}

impl Electrostatics {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Plain { .. } => "plain",
            Self::Wolf { .. } => "wolf",
            Self::Ewald(_) => "ewald",
            Self::Yukawa { .. } => "yukawa",
        }
    }

    pub fn cutoff(&self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Plain { cutoff, .. } | Self::Yukawa { cutoff, .. } => *cutoff,
            Self::Wolf { cutoff, .. } => Some(*cutoff),
            Self::Ewald(params) => Some(params.cutoff),
        }
    }
}

/// Electrostatic scheme with all derived constants resolved for fast pair evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectrostaticKernel {
    scheme: Electrostatics,
    lb: f64,
    cutoff2: f64,
    k_rf: f64,
    c_rf: f64,
    kappa: f64,
    self_prefactor: f64,
    dipole_rf: f64,
}

impl ElectrostaticKernel {
    /// `lb` is the Bjerrum length and `epsr` the relative permittivity it was derived from.
    pub fn new(scheme: Electrostatics, lb: f64, epsr: f64) -> Self {
        let cutoff = scheme.cutoff().unwrap_or(f64::INFINITY);
        let mut kernel = Self {
            scheme,
            lb,
            cutoff2: cutoff * cutoff,
            k_rf: 0.0,
            c_rf: 0.0,
            kappa: 0.0,
            self_prefactor: 0.0,
            dipole_rf: 0.0,
        };
        match scheme {
            Electrostatics::None => {}
            Electrostatics::Plain { cutoff, eps_rf } => {
                if let (Some(rc), Some(eps_rf)) = (cutoff, eps_rf) {
                    let (k_rf, c_rf) = potentials::reaction_field_constants(rc, epsr, eps_rf);
                    kernel.k_rf = k_rf;
                    kernel.c_rf = c_rf;
                    kernel.self_prefactor = -0.5 * lb * c_rf;
                    kernel.dipole_rf =
                        -lb * 2.0 * (eps_rf - epsr) / ((2.0 * eps_rf + epsr) * rc.powi(3));
                }
            }
            Electrostatics::Wolf { alpha, cutoff } => {
                kernel.self_prefactor = potentials::wolf_self(1.0, lb, alpha, cutoff);
            }
            Electrostatics::Ewald(params) => {
                kernel.self_prefactor = potentials::ewald_self(1.0, lb, params.alpha);
            }
            Electrostatics::Yukawa { debye_length, .. } => {
                kernel.kappa = 1.0 / debye_length;
            }
        }
        kernel
    }

    #[inline]
    pub fn scheme(&self) -> &Electrostatics {
        &self.scheme
    }

    #[inline]
    pub fn bjerrum_length(&self) -> f64 {
        self.lb
    }

    /// Charge-charge energy of a pair at squared separation `r2`.
    #[inline]
    pub fn pair(&self, r2: f64, qq: f64) -> f64 {
        if qq == 0.0 || r2 >= self.cutoff2 {
            return 0.0;
        }
        let r = r2.sqrt();
        match self.scheme {
            Electrostatics::None => 0.0,
            Electrostatics::Plain {
                cutoff: Some(_),
                eps_rf: Some(_),
            } => potentials::reaction_field(r, self.lb, qq, self.k_rf, self.c_rf),
            Electrostatics::Plain { .. } => potentials::coulomb(r, self.lb, qq),
            Electrostatics::Wolf { alpha, cutoff } => {
                potentials::wolf(r, self.lb, qq, alpha, cutoff)
            }
            Electrostatics::Ewald(params) => {
                potentials::ewald_real(r, self.lb, qq, params.alpha)
            }
            Electrostatics::Yukawa { .. } => potentials::yukawa(r, self.lb, qq, self.kappa),
        }
    }

    /// `-r·du/dr` of the charge-charge term.
    #[inline]
    pub fn pair_virial(&self, r2: f64, qq: f64) -> f64 {
        if qq == 0.0 || r2 >= self.cutoff2 {
            return 0.0;
        }
        let r = r2.sqrt();
        match self.scheme {
            Electrostatics::None => 0.0,
            Electrostatics::Plain { .. } => {
                potentials::reaction_field_virial(r, self.lb, qq, self.k_rf)
            }
            Electrostatics::Wolf { alpha, .. } => {
                potentials::damped_coulomb_virial(r, self.lb, qq, alpha)
            }
            Electrostatics::Ewald(params) => {
                potentials::damped_coulomb_virial(r, self.lb, qq, params.alpha)
            }
            Electrostatics::Yukawa { .. } => {
                potentials::yukawa_virial(r, self.lb, qq, self.kappa)
            }
        }
    }

    /// Dipole-dipole energy, truncated at the scheme's cutoff and reaction-field corrected
    /// when a continuum permittivity is set.
    #[inline]
    pub fn dipole_pair(&self, r_vec: &Vector3<f64>, r2: f64, mu_a: &Vector3<f64>, mu_b: &Vector3<f64>) -> f64 {
        if matches!(self.scheme, Electrostatics::None) || r2 >= self.cutoff2 {
            return 0.0;
        }
        potentials::dipole_dipole(r_vec, mu_a, mu_b, self.lb) + self.dipole_rf * mu_a.dot(mu_b)
    }

    /// Self term of a particle carrying charge `q`.
    #[inline]
    pub fn self_energy(&self, q: f64) -> f64 {
        self.self_prefactor * q * q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::erfc;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn plain_coulomb_without_cutoff_is_unscreened() {
        let kernel = ElectrostaticKernel::new(
            Electrostatics::Plain {
                cutoff: None,
                eps_rf: None,
            },
            7.0,
            80.0,
        );
        assert!((kernel.pair(49.0, -1.0) + 1.0).abs() < TOLERANCE);
        assert_eq!(kernel.self_energy(1.0), 0.0);
    }

    #[test]
    fn truncated_plain_coulomb_without_reaction_field_is_unshifted() {
        let kernel = ElectrostaticKernel::new(
            Electrostatics::Plain {
                cutoff: Some(12.0),
                eps_rf: None,
            },
            7.0,
            80.0,
        );
        let r: f64 = 11.5;
        assert!((kernel.pair(r * r, 1.0) - potentials::coulomb(r, 7.0, 1.0)).abs() < TOLERANCE);
        assert_eq!(kernel.pair(144.0, 1.0), 0.0);
        assert_eq!(kernel.self_energy(1.0), 0.0);
    }

    #[test]
    fn truncation_zeroes_pairs_beyond_cutoff() {
        let kernel = ElectrostaticKernel::new(
            Electrostatics::Yukawa {
                debye_length: 10.0,
                cutoff: Some(20.0),
            },
            7.0,
            80.0,
        );
        assert_eq!(kernel.pair(401.0, 1.0), 0.0);
        assert!(kernel.pair(100.0, 1.0) > 0.0);
    }

    #[test]
    fn wolf_self_energy_includes_shift_and_damping() {
        let (alpha, rc, lb) = (0.2, 10.0, 7.0);
        let kernel = ElectrostaticKernel::new(Electrostatics::Wolf { alpha, cutoff: rc }, lb, 80.0);
        let expected = -lb * (erfc(alpha * rc) / (2.0 * rc) + alpha / PI.sqrt());
        assert!((kernel.self_energy(-1.0) - expected).abs() < TOLERANCE);
    }

    #[test]
    fn reaction_field_self_term_is_half_the_shift() {
        let kernel = ElectrostaticKernel::new(
            Electrostatics::Plain {
                cutoff: Some(10.0),
                eps_rf: Some(1.0),
            },
            2.0,
            1.0,
        );
        assert!((kernel.self_energy(1.0) + 0.5 * 2.0 / 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn dipole_reaction_field_vanishes_without_dielectric_contrast() {
        let kernel = ElectrostaticKernel::new(
            Electrostatics::Plain {
                cutoff: Some(10.0),
                eps_rf: Some(1.0),
            },
            1.0,
            1.0,
        );
        let mu = Vector3::new(0.0, 0.0, 1.0);
        let r_vec = Vector3::new(2.0, 0.0, 0.0);
        assert!((kernel.dipole_pair(&r_vec, 4.0, &mu, &mu) - 1.0 / 8.0).abs() < TOLERANCE);
    }

    #[test]
    fn no_electrostatics_ignores_charges_and_dipoles() {
        let kernel = ElectrostaticKernel::new(Electrostatics::None, 7.0, 80.0);
        let mu = Vector3::new(0.0, 0.0, 1.0);
        assert_eq!(kernel.pair(1.0, 1.0), 0.0);
        assert_eq!(kernel.dipole_pair(&Vector3::x(), 1.0, &mu, &mu), 0.0);
        assert_eq!(Electrostatics::None.cutoff(), None);
    }
}
