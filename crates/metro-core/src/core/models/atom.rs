use super::ids::AtomTypeId;
use nalgebra::Vector3;

/// Per-species parameters shared by every particle of that species.
///
/// Energies are stored in kT, lengths in Å, angles in radians and dipole moments in e·Å.
/// An atom type is immutable once the topology has been built.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomType {
    /// Position of this type in the topology table.
    pub id: AtomTypeId,
    /// The species name used throughout the configuration (e.g., "Na", "Cl", "MM").
    pub name: String,
    /// Charge in elementary charge units.
    pub charge: f64,
    /// Lennard-Jones diameter in Angstroms.
    pub sigma: f64,
    /// Lennard-Jones well depth in kT.
    pub epsilon: f64,
    /// Default trial displacement for translation moves.
    pub dp: f64,
    /// Default trial rotation angle for rotation moves.
    pub dprot: f64,
    /// Permanent dipole moment, if the species is dipolar.
    pub dipole: Option<Vector3<f64>>,
    /// Isotropic polarizability in Å³.
    pub polarizability: Option<f64>,
    /// Molar mass in g/mol, used as weight for mass centers.
    pub molar_mass: f64,
}

impl AtomType {
    pub fn new(id: AtomTypeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            charge: 0.0,
            sigma: 0.0,
            epsilon: 0.0,
            dp: 0.0,
            dprot: 0.0,
            dipole: None,
            polarizability: None,
            molar_mass: 1.0,
        }
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        0.5 * self.sigma
    }

    #[inline]
    pub fn is_dipolar(&self) -> bool {
        self.dipole.is_some_and(|mu| mu.norm_squared() > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_type_is_a_neutral_point_with_unit_mass() {
        let atom = AtomType::new(AtomTypeId(3), "Na");
        assert_eq!(atom.id, AtomTypeId(3));
        assert_eq!(atom.name, "Na");
        assert_eq!(atom.charge, 0.0);
        assert_eq!(atom.molar_mass, 1.0);
        assert!(!atom.is_dipolar());
    }

    #[test]
    fn radius_is_half_of_sigma() {
        let mut atom = AtomType::new(AtomTypeId(0), "MM");
        atom.sigma = 6.0;
        assert_eq!(atom.radius(), 3.0);
    }

    #[test]
    fn zero_dipole_is_not_dipolar() {
        let mut atom = AtomType::new(AtomTypeId(0), "sol");
        atom.dipole = Some(Vector3::zeros());
        assert!(!atom.is_dipolar());
        atom.dipole = Some(Vector3::new(0.0, 0.0, 0.34));
        assert!(atom.is_dipolar());
    }
}
