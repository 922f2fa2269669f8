use super::ids::{AtomTypeId, MoleculeKindId};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A harmonic spring between two atoms of the same molecule.
///
/// Indices are relative to the first atom of the molecule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub first: usize,
    pub second: usize,
    /// Spring constant in kT/Å².
    pub k: f64,
    /// Equilibrium length in Å.
    pub req: f64,
}

/// Template for a molecule species.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeKind {
    pub id: MoleculeKindId,
    pub name: String,
    /// Atom species in order of insertion.
    pub atoms: Vec<AtomTypeId>,
    /// Atomic kinds are a bag of free particles rather than a connected molecule.
    pub atomic: bool,
    pub rotatable: bool,
    pub bonds: Vec<Bond>,
    /// Number of instances inserted at startup. For atomic kinds this is the number of
    /// copies of the atom list placed in the single group.
    pub n_init: usize,
    /// Per-axis mask applied to random insertion positions.
    pub insertion_direction: Vector3<f64>,
    pub insertion_offset: Vector3<f64>,
    /// Reference conformation, one position per atom.
    pub structure: Option<Vec<Point3<f64>>>,
}

impl MoleculeKind {
    pub fn new(id: MoleculeKindId, name: &str, atoms: Vec<AtomTypeId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            atoms,
            atomic: false,
            rotatable: true,
            bonds: Vec::new(),
            n_init: 0,
            insertion_direction: Vector3::repeat(1.0),
            insertion_offset: Vector3::zeros(),
            structure: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Bond length used along a generated chain between atoms `i` and `i + 1`.
    fn chain_spacing(&self, i: usize, fallback: f64) -> f64 {
        self.bonds
            .iter()
            .find(|b| (b.first == i && b.second == i + 1) || (b.first == i + 1 && b.second == i))
            .map(|b| b.req)
            .filter(|req| *req > 0.0)
            .unwrap_or(fallback)
    }

    /// Positions of the atoms relative to their geometric center.
    ///
    /// Molecules without an explicit structure are laid out as a straight chain along x,
    /// spaced by the bond equilibrium lengths (or `fallback_spacing` where no bond exists).
    pub fn reference_positions(&self, fallback_spacing: f64) -> Vec<Vector3<f64>> {
        let raw: Vec<Vector3<f64>> = match &self.structure {
            Some(structure) => structure.iter().map(|p| p.coords).collect(),
            None => {
                let mut x = 0.0;
                let mut positions = Vec::with_capacity(self.len());
                for i in 0..self.len() {
                    positions.push(Vector3::new(x, 0.0, 0.0));
                    x += self.chain_spacing(i, fallback_spacing);
                }
                positions
            }
        };
        if raw.is_empty() {
            return raw;
        }
        let center = raw.iter().sum::<Vector3<f64>>() / raw.len() as f64;
        raw.into_iter().map(|p| p - center).collect()
    }
}

/// One molecule instance: a contiguous range of particle indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub kind: MoleculeKindId,
    pub begin: usize,
    pub end: usize,
    pub atomic: bool,
}

impl Group {
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.begin..self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.begin && index < self.end
    }
}
