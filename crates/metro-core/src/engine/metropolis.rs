use super::context::SimulationContext;
use super::moves::{MonteCarloMove, Proposal, Trial};
use super::transaction::Transaction;
use crate::core::forcefield::ewald::{ReciprocalSpace, ReciprocalUpdate};
use crate::core::forcefield::hamiltonian::EnergyError;
use crate::core::forcefield::term::EnergyTerm;
use rand::Rng;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Accepted,
    Rejected,
    /// The move had nothing to do; no trial was counted.
    Skipped,
}

/// Metropolis criterion on the bias-corrected energy change `ΔU - ln(bias)` in kT.
///
/// Non-positive changes are always accepted without drawing a random number; NaN and
/// `+inf` are always rejected.
pub fn accept<R: Rng + ?Sized>(delta: f64, rng: &mut R) -> bool {
    if delta.is_nan() {
        return false;
    }
    if delta <= 0.0 {
        return true;
    }
    rng.r#gen::<f64>() < (-delta).exp()
}

enum PendingReciprocal {
    None,
    Update(ReciprocalUpdate),
    Resized(ReciprocalSpace),
}

fn short_range_energy(ctx: &SimulationContext, trial: &Trial, subset: &[usize]) -> Result<EnergyTerm, EnergyError> {
    if trial.is_volume_change() {
        ctx.system
            .hamiltonian
            .system_energy(&ctx.system.space, &ctx.system.topology)
    } else {
        ctx.system.energy_of(subset)
    }
}

/// Runs one proposal through the full trial cycle: propose, apply, score, then either
/// commit or roll back. The running energy is updated incrementally on acceptance.
pub fn perform_trial<M: MonteCarloMove + ?Sized>(ctx: &mut SimulationContext, mv: &mut M) -> TrialOutcome {
    let trial = match mv.propose(&ctx.system, &mut ctx.rng) {
        Proposal::Skipped => return TrialOutcome::Skipped,
        Proposal::Rejected(reason) => {
            trace!(name = mv.name(), %reason, "Trial rejected before scoring.");
            ctx.state.trials += 1;
            ctx.state.statistics_mut(mv.name()).attempts += 1;
            return TrialOutcome::Rejected;
        }
        Proposal::Trial(trial) => trial,
    };
    ctx.state.trials += 1;
    ctx.state.statistics_mut(mv.name()).attempts += 1;

    let subset = trial.indices();
    let old_energy = match short_range_energy(ctx, &trial, &subset) {
        Ok(e) => e.total(),
        Err(e) => {
            trace!(name = mv.name(), error = %e, "Current configuration failed to score.");
            ctx.state.statistics_mut(mv.name()).overflows += 1;
            return TrialOutcome::Rejected;
        }
    };
    let old_reciprocal = ctx.system.reciprocal_energy();

    let transaction = Transaction::apply(&mut ctx.system.space, &trial);
    let new_energy = short_range_energy(ctx, &trial, &subset);
    let (new_reciprocal, pending) = match &ctx.system.reciprocal {
        None => (0.0, PendingReciprocal::None),
        Some(reciprocal) => match ctx.system.space.geometry.lengths() {
            Some(lengths) if trial.is_volume_change() => {
                let resized = reciprocal.resized(lengths, &ctx.system.space.particles);
                (resized.energy(), PendingReciprocal::Resized(resized))
            }
            _ => {
                let update = reciprocal.propose(transaction.changes(&ctx.system.space));
                (update.energy, PendingReciprocal::Update(update))
            }
        },
    };
    let ln_bias = mv.ln_bias(&ctx.system, &trial);

    let delta_u = match new_energy {
        Ok(e) => e.total() - old_energy + new_reciprocal - old_reciprocal,
        Err(e) => {
            trace!(name = mv.name(), error = %e, "Trial rejected on energy overflow.");
            transaction.revert(&mut ctx.system.space);
            ctx.state.statistics_mut(mv.name()).overflows += 1;
            return TrialOutcome::Rejected;
        }
    };

    if !accept(delta_u - ln_bias, &mut ctx.rng) {
        transaction.revert(&mut ctx.system.space);
        return TrialOutcome::Rejected;
    }

    match pending {
        PendingReciprocal::None => {}
        PendingReciprocal::Update(update) => {
            if let Some(reciprocal) = &mut ctx.system.reciprocal {
                reciprocal.commit(update);
            }
        }
        PendingReciprocal::Resized(resized) => ctx.system.reciprocal = Some(resized),
    }
    ctx.state.energy += delta_u;
    let stats = ctx.state.statistics_mut(mv.name());
    stats.accepted += 1;
    stats.sum_squared_displacement += trial.displacement2;
    refresh_reciprocal(ctx);
    TrialOutcome::Accepted
}

/// Rebuilds the Ewald structure factors every `update_frequency` accepted moves and moves
/// the resulting round-off change into the running energy.
fn refresh_reciprocal(ctx: &mut SimulationContext) {
    let Some(reciprocal) = &ctx.system.reciprocal else {
        return;
    };
    let update_frequency = reciprocal.params().update_frequency;
    ctx.state.accepted_since_rebuild += 1;
    if ctx.state.accepted_since_rebuild < update_frequency {
        return;
    }
    let before = ctx.system.reciprocal_energy();
    ctx.system.rebuild_reciprocal();
    ctx.state.energy += ctx.system.reciprocal_energy() - before;
    ctx.state.accepted_since_rebuild = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::electrostatics::{Electrostatics, EwaldParameters};
    use crate::core::forcefield::hamiltonian::Hamiltonian;
    use crate::core::geometry::Geometry;
    use crate::core::models::atom::AtomType;
    use crate::core::models::ids::{AtomTypeId, MoleculeKindId};
    use crate::core::models::molecule::MoleculeKind;
    use crate::core::models::process::ProtonationProcess;
    use crate::core::models::space::Space;
    use crate::core::models::topology::Topology;
    use crate::core::utils::units::MILLIMOLAR_TO_NUMBER_DENSITY;
    use crate::engine::context::System;
    use crate::engine::moves::{AtomTranslate, IsobaricMove, Move, MoveSet, TitrationMove};
    use crate::engine::rng::McRng;
    use nalgebra::Vector3;
    use rand::SeedableRng;

    fn rng(seed: u64) -> McRng {
        McRng::seed_from_u64(seed)
    }

    fn ions(n: usize, sigma: f64, charged: bool) -> Topology {
        let mut cation = AtomType::new(AtomTypeId(0), "cat");
        cation.sigma = sigma;
        cation.epsilon = 0.2;
        cation.dp = 2.0;
        let mut anion = AtomType::new(AtomTypeId(1), "an");
        anion.sigma = sigma;
        anion.epsilon = 0.2;
        anion.dp = 2.0;
        if charged {
            cation.charge = 1.0;
            anion.charge = -1.0;
        }
        let mut salt = MoleculeKind::new(MoleculeKindId(0), "salt", vec![AtomTypeId(0), AtomTypeId(1)]);
        salt.atomic = true;
        salt.n_init = n;
        Topology::new(vec![cation, anion], vec![salt])
    }

    fn context(topology: Topology, geometry: Geometry, scheme: Electrostatics, lj_cutoff: Option<f64>) -> SimulationContext {
        let mut rng = rng(99);
        let mut space = Space::new(geometry);
        space.populate(&topology, &mut rng).unwrap();
        let hamiltonian = Hamiltonian::new(&topology, scheme, 7.0, 80.0, lj_cutoff);
        let system = System::new(topology, space, hamiltonian, Vec::new(), 298.15);
        SimulationContext::new(system, rng, 1e-6).unwrap()
    }

    fn translate(weight: f64) -> Move {
        Move::AtomTranslate(AtomTranslate::new(
            "salt",
            MoleculeKindId(0),
            None,
            Vector3::repeat(1.0),
            false,
            weight,
        ))
    }

    fn relative_error(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs().max(1.0)
    }

    #[test]
    fn downhill_and_flat_moves_are_always_accepted() {
        let mut rng = rng(1);
        assert!(accept(-5.0, &mut rng));
        assert!(accept(0.0, &mut rng));
        assert!(!accept(f64::INFINITY, &mut rng));
        assert!(!accept(f64::NAN, &mut rng));
    }

    #[test]
    fn uphill_acceptance_frequency_matches_boltzmann_factor() {
        let mut rng = rng(2);
        for delta in [0.3, 1.0, 2.5] {
            let n = 200_000;
            let accepted = (0..n).filter(|_| accept(delta, &mut rng)).count();
            let frequency = accepted as f64 / n as f64;
            let expected = (-delta).exp();
            assert!(
                (frequency - expected).abs() < 0.005,
                "delta = {delta}: {frequency} vs {expected}"
            );
        }
    }

    #[test]
    fn running_energy_matches_recomputation_with_wolf() {
        let mut ctx = context(
            ions(20, 3.0, true),
            Geometry::cube(30.0).unwrap(),
            Electrostatics::Wolf {
                alpha: 0.2,
                cutoff: 12.0,
            },
            Some(12.0),
        );
        let mut mv = translate(1.0);
        let mut accepted = 0;
        for _ in 0..3000 {
            if perform_trial(&mut ctx, &mut mv) == TrialOutcome::Accepted {
                accepted += 1;
            }
        }
        assert!(accepted > 0);
        let exact = ctx.system.total_energy().unwrap().total();
        assert!(relative_error(ctx.state.energy, exact) < 1e-6);
        let stats = &ctx.state.statistics["atomtranslate[salt]"];
        assert_eq!(stats.attempts, 3000);
        assert_eq!(stats.accepted, accepted);
    }

    #[test]
    fn running_energy_matches_recomputation_with_ewald() {
        let params = EwaldParameters {
            alpha: 0.3,
            cutoff: 9.0,
            cutoff_k: 5.0,
            eps_surf: Some(1.0),
            spherical_sum: true,
            update_frequency: 1_000_000,
        };
        let mut ctx = context(
            ions(10, 3.0, true),
            Geometry::cube(20.0).unwrap(),
            Electrostatics::Ewald(params),
            None,
        );
        let mut mv = translate(1.0);
        for _ in 0..1000 {
            perform_trial(&mut ctx, &mut mv);
        }
        let exact = ctx.system.total_energy().unwrap().total();
        assert!(relative_error(ctx.state.energy, exact) < 1e-6);
    }

    #[test]
    fn reciprocal_space_is_rebuilt_every_update_frequency_accepted_moves() {
        let params = EwaldParameters {
            alpha: 0.3,
            cutoff: 9.0,
            cutoff_k: 4.0,
            eps_surf: None,
            spherical_sum: true,
            update_frequency: 5,
        };
        let mut ctx = context(
            ions(6, 3.0, true),
            Geometry::cube(20.0).unwrap(),
            Electrostatics::Ewald(params),
            None,
        );
        let mut mv = translate(1.0);
        for _ in 0..200 {
            perform_trial(&mut ctx, &mut mv);
        }
        let accepted: u64 = ctx.state.statistics.values().map(|s| s.accepted).sum();
        assert!(accepted >= 5);
        assert_eq!(ctx.state.accepted_since_rebuild, accepted % 5);
    }

    #[test]
    fn rebuild_counter_is_idle_without_reciprocal_space() {
        let mut ctx = context(
            ions(6, 3.0, true),
            Geometry::cube(20.0).unwrap(),
            Electrostatics::Wolf { alpha: 0.2, cutoff: 9.0 },
            None,
        );
        let mut mv = translate(1.0);
        for _ in 0..50 {
            perform_trial(&mut ctx, &mut mv);
        }
        assert_eq!(ctx.state.accepted_since_rebuild, 0);
    }

    #[test]
    fn leaving_a_hard_container_is_rejected() {
        let mut ctx = context(
            ions(5, 1.0, false),
            Geometry::sphere(4.0).unwrap(),
            Electrostatics::None,
            None,
        );
        let mut mv = Move::AtomTranslate(AtomTranslate::new(
            "salt",
            MoleculeKindId(0),
            Some(50.0),
            Vector3::repeat(1.0),
            false,
            1.0,
        ));
        for _ in 0..500 {
            perform_trial(&mut ctx, &mut mv);
        }
        assert!(ctx.state.energy.is_finite());
        assert!(
            ctx.system
                .space
                .particles
                .iter()
                .all(|p| !ctx.system.space.geometry.collision(&p.position))
        );
    }

    #[test]
    fn ideal_gas_volume_follows_isobaric_ensemble() {
        let n = 10;
        let mut ctx = context(ions(n / 2, 0.0, false), Geometry::cube(10.0).unwrap(), Electrostatics::None, None);
        let target = 1000.0;
        let beta_pressure = (n as f64 + 1.0) / target;
        let pressure_mm = beta_pressure / MILLIMOLAR_TO_NUMBER_DENSITY;
        let mut moves = MoveSet::new(vec![
            Move::Isobaric(IsobaricMove::new(400.0, pressure_mm, 1.0)),
            translate(1.0),
        ]);
        let mut sum = 0.0;
        let mut samples = 0usize;
        for step in 0..400_000 {
            let Some(i) = moves.select(&mut ctx.rng) else {
                panic!("no move selected");
            };
            let mv = moves.get_mut(i).unwrap();
            perform_trial(&mut ctx, mv);
            if step >= 20_000 {
                sum += ctx.system.space.geometry.volume();
                samples += 1;
            }
        }
        let average = sum / samples as f64;
        assert!(
            (average - target).abs() / target < 0.04,
            "average volume {average}, expected {target}"
        );
    }

    #[test]
    fn titration_at_pkd_gives_equal_occupancy() {
        for (shift, expected) in [(0.0, 0.5), (1.0, 10.0 / 11.0)] {
            let mut ctx = context(
                ions(10, 0.0, false),
                Geometry::cube(50.0).unwrap(),
                Electrostatics::None,
                None,
            );
            ctx.system.processes.push(ProtonationProcess {
                name: "bind".into(),
                bound: AtomTypeId(0),
                free: AtomTypeId(1),
                pkd: 7.0 + shift,
                px: 7.0,
            });
            let mut mv = Move::Titration(TitrationMove::new(vec![0], 1.0));
            let total = ctx.system.space.len() as f64;
            let mut bound_fraction = 0.0;
            let mut samples = 0usize;
            for step in 0..100_000 {
                perform_trial(&mut ctx, &mut mv);
                if step >= 5_000 {
                    bound_fraction += ctx.system.space.particles_of_type(AtomTypeId(0)).count() as f64 / total;
                    samples += 1;
                }
            }
            let average = bound_fraction / samples as f64;
            assert!(
                (average - expected).abs() < 0.02,
                "shift {shift}: bound fraction {average}, expected {expected}"
            );
            assert_eq!(ctx.system.space.len(), 20);
        }
    }
}
