use super::ids::AtomTypeId;
use std::f64::consts::LN_10;

/// An acid-base style equilibrium between two atom species.
///
/// The bound form converts to the free form with equilibrium constant `10^(pX - pKd)`,
/// so at `pX == pKd` both forms are equally likely in the absence of interactions.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtonationProcess {
    pub name: String,
    pub bound: AtomTypeId,
    pub free: AtomTypeId,
    pub pkd: f64,
    pub px: f64,
}

impl ProtonationProcess {
    /// Whether particles of `atom_id` take part in this equilibrium.
    pub fn involves(&self, atom_id: AtomTypeId) -> bool {
        atom_id == self.bound || atom_id == self.free
    }

    /// The species a particle of `atom_id` converts to, if it takes part.
    pub fn partner(&self, atom_id: AtomTypeId) -> Option<AtomTypeId> {
        if atom_id == self.bound {
            Some(self.free)
        } else if atom_id == self.free {
            Some(self.bound)
        } else {
            None
        }
    }

    /// Natural log of the intrinsic bias for converting a particle of `from` to its partner.
    ///
    /// Binding (free to bound) carries `+ln10 (pKd - pX)`, release the opposite sign.
    pub fn ln_bias(&self, from: AtomTypeId) -> f64 {
        let binding = LN_10 * (self.pkd - self.px);
        if from == self.free { binding } else { -binding }
    }
}
