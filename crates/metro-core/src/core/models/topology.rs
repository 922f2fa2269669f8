use super::atom::AtomType;
use super::ids::{AtomTypeId, MoleculeKindId};
use super::molecule::MoleculeKind;

/// Immutable species tables shared by the whole simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    atoms: Vec<AtomType>,
    molecules: Vec<MoleculeKind>,
}

impl Topology {
    /// Builds a topology from tables whose ids match their positions.
    pub fn new(atoms: Vec<AtomType>, molecules: Vec<MoleculeKind>) -> Self {
        debug_assert!(atoms.iter().enumerate().all(|(i, a)| a.id.0 == i));
        debug_assert!(molecules.iter().enumerate().all(|(i, m)| m.id.0 == i));
        Self { atoms, molecules }
    }

    #[inline]
    pub fn atom(&self, id: AtomTypeId) -> &AtomType {
        &self.atoms[id.0]
    }

    #[inline]
    pub fn molecule(&self, id: MoleculeKindId) -> &MoleculeKind {
        &self.molecules[id.0]
    }

    pub fn atoms(&self) -> &[AtomType] {
        &self.atoms
    }

    pub fn molecules(&self) -> &[MoleculeKind] {
        &self.molecules
    }

    pub fn find_atom(&self, name: &str) -> Option<&AtomType> {
        self.atoms.iter().find(|a| a.name == name)
    }

    pub fn find_molecule(&self, name: &str) -> Option<&MoleculeKind> {
        self.molecules.iter().find(|m| m.name == name)
    }

    /// Largest Lennard-Jones diameter, used as a default spacing for generated chains.
    pub fn max_sigma(&self) -> f64 {
        self.atoms.iter().map(|a| a.sigma).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_topology() -> Topology {
        let mut na = AtomType::new(AtomTypeId(0), "Na");
        na.sigma = 3.0;
        let mut cl = AtomType::new(AtomTypeId(1), "Cl");
        cl.sigma = 4.0;
        let salt = MoleculeKind::new(MoleculeKindId(0), "salt", vec![AtomTypeId(0), AtomTypeId(1)]);
        Topology::new(vec![na, cl], vec![salt])
    }

    #[test]
    fn lookups_by_name_and_id_agree() {
        let topology = sample_topology();
        let cl = topology.find_atom("Cl").unwrap();
        assert_eq!(topology.atom(cl.id).name, "Cl");
        assert_eq!(topology.find_molecule("salt").unwrap().len(), 2);
        assert!(topology.find_atom("K").is_none());
    }

    #[test]
    fn max_sigma_returns_largest_diameter() {
        assert_eq!(sample_topology().max_sigma(), 4.0);
    }
}
