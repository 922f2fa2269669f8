use crate::core::models::atom::AtomType;
use crate::core::models::ids::AtomTypeId;

/// Precomputed Lennard-Jones coefficients for one species pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairCoefficients {
    /// Squared mixed diameter `σij²`.
    pub sigma2: f64,
    /// Four times the mixed well depth, `4εij`, in kT.
    pub eps4: f64,
}

impl PairCoefficients {
    /// Pairs with a diameter but no attraction behave as hard spheres.
    #[inline]
    pub fn is_hard_sphere(&self) -> bool {
        self.eps4 == 0.0 && self.sigma2 > 0.0
    }
}

/// Symmetric table of mixed pair coefficients indexed by atom type.
///
/// Cross terms follow the Lorentz-Berthelot rule: arithmetic mean of diameters and
/// geometric mean of well depths.
#[derive(Debug, Clone, PartialEq)]
pub struct PairMatrix {
    size: usize,
    coefficients: Vec<PairCoefficients>,
}

impl PairMatrix {
    pub fn lorentz_berthelot(atoms: &[AtomType]) -> Self {
        let size = atoms.len();
        let mut coefficients = Vec::with_capacity(size * size);
        for a in atoms {
            for b in atoms {
                let sigma = 0.5 * (a.sigma + b.sigma);
                let eps = (a.epsilon * b.epsilon).sqrt();
                coefficients.push(PairCoefficients {
                    sigma2: sigma * sigma,
                    eps4: 4.0 * eps,
                });
            }
        }
        Self { size, coefficients }
    }

    #[inline]
    pub fn get(&self, a: AtomTypeId, b: AtomTypeId) -> &PairCoefficients {
        &self.coefficients[a.0 * self.size + b.0]
    }

    /// True when no pair has any Lennard-Jones or hard-sphere interaction.
    pub fn is_empty(&self) -> bool {
        self.coefficients
            .iter()
            .all(|c| c.eps4 == 0.0 && c.sigma2 == 0.0)
    }
}
