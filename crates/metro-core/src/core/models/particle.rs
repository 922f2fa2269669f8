use super::atom::AtomType;
use super::ids::AtomTypeId;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A single interaction site.
///
/// The charge and dipole are copied from the atom type on creation and follow the type
/// when a titration move converts the particle to another species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub atom_id: AtomTypeId,
    pub position: Point3<f64>,
    pub charge: f64,
    /// Dipole moment vector in e·Å; zero for non-dipolar species.
    pub dipole: Vector3<f64>,
    /// Index of the group (molecule instance) owning this particle.
    pub group: usize,
}

impl Particle {
    pub fn new(atom: &AtomType, position: Point3<f64>, group: usize) -> Self {
        Self {
            atom_id: atom.id,
            position,
            charge: atom.charge,
            dipole: atom.dipole.unwrap_or_else(Vector3::zeros),
            group,
        }
    }

    /// Converts the particle into another species, keeping its position and orientation.
    pub fn convert_to(&mut self, atom: &AtomType) {
        self.atom_id = atom.id;
        self.charge = atom.charge;
        let magnitude = atom.dipole.map_or(0.0, |mu| mu.norm());
        let direction = self.dipole.try_normalize(f64::EPSILON);
        self.dipole = match (direction, atom.dipole) {
            (Some(unit), Some(_)) => unit * magnitude,
            (None, Some(mu)) => mu,
            (_, None) => Vector3::zeros(),
        };
    }

    #[inline]
    pub fn is_dipolar(&self) -> bool {
        self.dipole.norm_squared() > 0.0
    }
}
