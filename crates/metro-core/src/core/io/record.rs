use crate::core::models::space::Space;
use crate::core::models::topology::Topology;
use nalgebra::Point3;

/// One particle line of a coordinate file.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRecord {
    pub name: String,
    pub index: usize,
    pub position: Point3<f64>,
    pub charge: f64,
    /// Molar mass in g/mol.
    pub weight: f64,
    pub radius: f64,
}

impl CoordinateRecord {
    /// Records for every particle of `space`, numbered from one.
    pub fn from_space(space: &Space, topology: &Topology) -> Vec<Self> {
        space
            .particles
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let atom = topology.atom(p.atom_id);
                Self {
                    name: atom.name.clone(),
                    index: i + 1,
                    position: p.position,
                    charge: p.charge,
                    weight: atom.molar_mass,
                    radius: atom.radius(),
                }
            })
            .collect()
    }
}
