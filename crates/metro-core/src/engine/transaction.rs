use super::moves::Trial;
use crate::core::geometry::Geometry;
use crate::core::models::particle::Particle;
use crate::core::models::space::Space;

/// The pre-trial state of everything a trial touched, so it can be rolled back as a unit.
#[derive(Debug, Clone)]
pub struct Transaction {
    saved: Vec<(usize, Particle)>,
    saved_geometry: Option<Geometry>,
}

impl Transaction {
    /// Writes the trial into `space` and records what it replaced.
    pub fn apply(space: &mut Space, trial: &Trial) -> Self {
        let saved_geometry = trial
            .geometry
            .as_ref()
            .map(|geometry| std::mem::replace(&mut space.geometry, geometry.clone()));
        let saved = trial
            .changes
            .iter()
            .map(|(i, particle)| (*i, std::mem::replace(&mut space.particles[*i], particle.clone())))
            .collect();
        Self {
            saved,
            saved_geometry,
        }
    }

    /// `(old, new)` particle pairs, for incremental structure factor updates.
    pub fn changes<'a>(&'a self, space: &'a Space) -> impl Iterator<Item = (&'a Particle, &'a Particle)> + 'a {
        self.saved.iter().map(move |(i, old)| (old, &space.particles[*i]))
    }

    /// Restores the recorded particles and container.
    pub fn revert(self, space: &mut Space) {
        for (i, particle) in self.saved {
            space.particles[i] = particle;
        }
        if let Some(geometry) = self.saved_geometry {
            space.geometry = geometry;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::AtomType;
    use crate::core::models::ids::AtomTypeId;
    use nalgebra::Point3;

    fn space() -> Space {
        let atom = AtomType::new(AtomTypeId(0), "A");
        let mut space = Space::new(Geometry::cube(10.0).unwrap());
        for x in [0.0, 1.0, 2.0] {
            space.particles.push(Particle::new(&atom, Point3::new(x, 0.0, 0.0), 0));
        }
        space
    }

    #[test]
    fn revert_restores_particles_and_geometry() {
        let mut space = space();
        let original = space.clone();
        let mut moved = space.particles[1].clone();
        moved.position = Point3::new(4.0, 4.0, 4.0);
        let trial = Trial {
            changes: vec![(1, moved)],
            geometry: Some(Geometry::cube(12.0).unwrap()),
            ln_bias: 0.0,
            displacement2: 0.0,
        };
        let transaction = Transaction::apply(&mut space, &trial);
        assert_eq!(space.particles[1].position, Point3::new(4.0, 4.0, 4.0));
        assert_eq!(space.geometry, Geometry::cube(12.0).unwrap());
        let pairs: Vec<_> = transaction.changes(&space).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.position, Point3::new(1.0, 0.0, 0.0));
        transaction.revert(&mut space);
        assert_eq!(space, original);
    }
}
