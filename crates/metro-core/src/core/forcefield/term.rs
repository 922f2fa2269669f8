use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

/// Energy decomposed by origin, in kT.
///
/// `electrostatic` holds real-space pair terms and per-particle self terms;
/// `reciprocal` holds the Ewald Fourier-space and surface terms;
/// `external` is the hard-wall term of bounded containers (zero or infinite).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyTerm {
    pub vdw: f64,
    pub electrostatic: f64,
    pub bonded: f64,
    pub reciprocal: f64,
    pub external: f64,
}

impl EnergyTerm {
    pub fn new(vdw: f64, electrostatic: f64, bonded: f64, reciprocal: f64) -> Self {
        Self {
            vdw,
            electrostatic,
            bonded,
            reciprocal,
            external: 0.0,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.vdw + self.electrostatic + self.bonded + self.reciprocal + self.external
    }

    #[inline]
    pub fn is_nan(&self) -> bool {
        self.total().is_nan()
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            vdw: self.vdw + rhs.vdw,
            electrostatic: self.electrostatic + rhs.electrostatic,
            bonded: self.bonded + rhs.bonded,
            reciprocal: self.reciprocal + rhs.reciprocal,
            external: self.external + rhs.external,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        self.vdw += rhs.vdw;
        self.electrostatic += rhs.electrostatic;
        self.bonded += rhs.bonded;
        self.reciprocal += rhs.reciprocal;
        self.external += rhs.external;
    }
}

impl Sub for EnergyTerm {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            vdw: self.vdw - rhs.vdw,
            electrostatic: self.electrostatic - rhs.electrostatic,
            bonded: self.bonded - rhs.bonded,
            reciprocal: self.reciprocal - rhs.reciprocal,
            external: self.external - rhs.external,
        }
    }
}

impl std::iter::Sum for EnergyTerm {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, term| acc + term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_returns_sum_of_all_terms() {
        let term = EnergyTerm::new(1.5, -2.0, 0.25, 0.25);
        assert_eq!(term.total(), 0.0);
    }

    #[test]
    fn add_and_sub_act_componentwise() {
        let a = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        let b = EnergyTerm::new(4.0, 5.0, 6.0, 7.0);
        assert_eq!(a + b, EnergyTerm::new(5.0, 7.0, 9.0, 11.0));
        assert_eq!(b - a, EnergyTerm::new(3.0, 3.0, 3.0, 3.0));
    }

    #[test]
    fn add_assign_accumulates_each_field_correctly() {
        let mut a = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        a += EnergyTerm::new(4.0, 5.0, 6.0, 7.0);
        assert_eq!(a, EnergyTerm::new(5.0, 7.0, 9.0, 11.0));
    }

    #[test]
    fn sum_over_iterator_matches_manual_accumulation() {
        let terms = [
            EnergyTerm::new(1.0, 0.0, 0.0, 0.0),
            EnergyTerm::new(0.0, 2.0, 0.0, 1.0),
        ];
        let total: EnergyTerm = terms.into_iter().sum();
        assert_eq!(total, EnergyTerm::new(1.0, 2.0, 0.0, 1.0));
    }

    #[test]
    fn infinite_wall_term_dominates_the_total() {
        let mut term = EnergyTerm::new(1.0, -5.0, 0.0, 0.0);
        term.external = f64::INFINITY;
        assert!(term.total().is_infinite());
        assert!(!term.is_nan());
    }

    #[test]
    fn default_initializes_all_fields_to_zero() {
        assert_eq!(EnergyTerm::default().total(), 0.0);
    }
}
