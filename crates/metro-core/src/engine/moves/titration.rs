use super::{MonteCarloMove, Proposal, Trial, choose};
use crate::engine::context::System;
use crate::engine::rng::McRng;

/// Converts one particle between the bound and free species of a protonation process.
///
/// The particle keeps its position and index; only its type, charge and dipole change,
/// so the particle count is conserved.
#[derive(Debug, Clone)]
pub struct TitrationMove {
    /// Indices into the system's process table.
    processes: Vec<usize>,
    weight: f64,
}

impl TitrationMove {
    pub fn new(processes: Vec<usize>, weight: f64) -> Self {
        Self { processes, weight }
    }
}

impl MonteCarloMove for TitrationMove {
    fn name(&self) -> &str {
        "titrate"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(&mut self, system: &System, rng: &mut McRng) -> Proposal {
        let Some(process) = choose(&self.processes, rng).and_then(|&i| system.processes.get(i)) else {
            return Proposal::Skipped;
        };
        let candidates: Vec<usize> = system
            .space
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| process.involves(p.atom_id))
            .map(|(i, _)| i)
            .collect();
        let Some(&index) = choose(&candidates, rng) else {
            return Proposal::Skipped;
        };
        let mut particle = system.space.particles[index].clone();
        let from = particle.atom_id;
        let Some(to) = process.partner(from) else {
            return Proposal::Skipped;
        };
        particle.convert_to(system.topology.atom(to));
        Proposal::Trial(Trial {
            ln_bias: process.ln_bias(from),
            ..Trial::new(vec![(index, particle)])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::core::models::ids::AtomTypeId;
    use crate::core::models::process::ProtonationProcess;

    #[test]
    fn titration_swaps_species_in_place() {
        let mut system = test_support::system();
        system.processes.push(ProtonationProcess {
            name: "swap".into(),
            bound: AtomTypeId(0),
            free: AtomTypeId(1),
            pkd: 5.0,
            px: 7.0,
        });
        let mut mv = TitrationMove::new(vec![0], 1.0);
        let Proposal::Trial(trial) = mv.propose(&system, &mut test_support::rng()) else {
            panic!("expected a trial");
        };
        let (i, new) = &trial.changes[0];
        let old = &system.space.particles[*i];
        assert_ne!(new.atom_id, old.atom_id);
        assert_eq!(new.position, old.position);
        let expected = system.processes[0].ln_bias(old.atom_id);
        assert_eq!(trial.ln_bias, expected);
    }

    #[test]
    fn no_process_skips() {
        let system = test_support::system();
        let mut mv = TitrationMove::new(vec![], 1.0);
        assert_eq!(mv.propose(&system, &mut test_support::rng()), Proposal::Skipped);
    }
}
