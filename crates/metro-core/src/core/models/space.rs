use super::atom::AtomType;
use super::ids::{AtomTypeId, MoleculeKindId};
use super::molecule::{Group, MoleculeKind};
use super::particle::Particle;
use super::topology::Topology;
use crate::core::geometry::{Geometry, GeometryError};
use crate::core::utils::geometry::random_rotation;
use nalgebra::{Point3, Rotation3, Vector3};
use rand::Rng;
use std::f64::consts::PI;
use tracing::debug;

/// Number of random placements tried before an insertion is declared impossible.
pub const MAX_INSERTION_ATTEMPTS: usize = 10_000;

/// Smallest separation accepted between point particles during insertion.
const MIN_INSERTION_SEPARATION: f64 = 1e-3;

/// The mutable configuration of a simulation: container, particles and molecule instances.
///
/// Particles of one group are stored contiguously, so a group is fully described by an
/// index range. Particle indices never change during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub geometry: Geometry,
    pub particles: Vec<Particle>,
    pub groups: Vec<Group>,
}

impl Space {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            particles: Vec::new(),
            groups: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Inserts `n_init` instances of every molecule kind at random, non-overlapping positions.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Insertion`] if a molecule cannot be placed within
    /// [`MAX_INSERTION_ATTEMPTS`] trials.
    pub fn populate<R: Rng + ?Sized>(
        &mut self,
        topology: &Topology,
        rng: &mut R,
    ) -> Result<(), GeometryError> {
        for kind in topology.molecules() {
            if kind.n_init == 0 || kind.is_empty() {
                continue;
            }
            if kind.atomic {
                self.insert_atomic(topology, kind, rng)?;
            } else {
                for _ in 0..kind.n_init {
                    self.insert_molecule(topology, kind, rng)?;
                }
            }
            debug!(
                molecule = kind.name.as_str(),
                count = kind.n_init,
                "Inserted molecules."
            );
        }
        Ok(())
    }

    /// Places `n_init` copies of an atomic kind's atom list into one new group.
    ///
    /// # Return
    ///
    /// The index of the new group.
    pub fn insert_atomic<R: Rng + ?Sized>(
        &mut self,
        topology: &Topology,
        kind: &MoleculeKind,
        rng: &mut R,
    ) -> Result<usize, GeometryError> {
        let group_index = self.groups.len();
        let begin = self.particles.len();
        for _ in 0..kind.n_init {
            for &atom_id in &kind.atoms {
                let atom = topology.atom(atom_id);
                let position = (0..MAX_INSERTION_ATTEMPTS)
                    .map(|_| self.insertion_point(kind, rng))
                    .find(|p| !self.geometry.collision(p) && !self.overlaps(topology, atom, p))
                    .ok_or_else(|| GeometryError::Insertion {
                        molecule: kind.name.clone(),
                        attempts: MAX_INSERTION_ATTEMPTS,
                    })?;
                self.particles
                    .push(Particle::new(atom, position, group_index));
            }
        }
        self.groups.push(Group {
            kind: kind.id,
            begin,
            end: self.particles.len(),
            atomic: true,
        });
        Ok(group_index)
    }

    /// Places one rigid copy of a molecule kind, randomly oriented when rotatable.
    pub fn insert_molecule<R: Rng + ?Sized>(
        &mut self,
        topology: &Topology,
        kind: &MoleculeKind,
        rng: &mut R,
    ) -> Result<usize, GeometryError> {
        let group_index = self.groups.len();
        let reference = kind.reference_positions(topology.max_sigma().max(1.0));
        for _ in 0..MAX_INSERTION_ATTEMPTS {
            let center = self.insertion_point(kind, rng);
            let rotation = if kind.rotatable {
                random_rotation(rng, PI)
            } else {
                Rotation3::identity()
            };
            let mut positions: Vec<Point3<f64>> =
                reference.iter().map(|r| center + rotation * r).collect();
            positions.iter_mut().for_each(|p| self.geometry.boundary(p));
            let fits = positions.iter().zip(&kind.atoms).all(|(p, &atom_id)| {
                !self.geometry.collision(p) && !self.overlaps(topology, topology.atom(atom_id), p)
            });
            if !fits {
                continue;
            }
            let begin = self.particles.len();
            for (position, &atom_id) in positions.into_iter().zip(&kind.atoms) {
                self.particles
                    .push(Particle::new(topology.atom(atom_id), position, group_index));
            }
            self.groups.push(Group {
                kind: kind.id,
                begin,
                end: self.particles.len(),
                atomic: false,
            });
            return Ok(group_index);
        }
        Err(GeometryError::Insertion {
            molecule: kind.name.clone(),
            attempts: MAX_INSERTION_ATTEMPTS,
        })
    }

    fn insertion_point<R: Rng + ?Sized>(&self, kind: &MoleculeKind, rng: &mut R) -> Point3<f64> {
        let mut p = self.geometry.random_position(rng);
        p.coords = p.coords.component_mul(&kind.insertion_direction) + kind.insertion_offset;
        self.geometry.boundary(&mut p);
        p
    }

    fn overlaps(&self, topology: &Topology, atom: &AtomType, position: &Point3<f64>) -> bool {
        self.particles.iter().any(|other| {
            let contact = 0.5 * (atom.sigma + topology.atom(other.atom_id).sigma);
            let min = contact.max(MIN_INSERTION_SEPARATION);
            self.geometry.sqdist(position, &other.position) < min * min
        })
    }

    /// Positions of a group made whole across periodic boundaries, relative to its first atom.
    pub fn unwrapped_positions(&self, group_index: usize) -> Vec<Point3<f64>> {
        let group = &self.groups[group_index];
        let Some(first) = self.particles.get(group.begin) else {
            return Vec::new();
        };
        let origin = first.position;
        self.particles[group.range()]
            .iter()
            .map(|p| origin + self.geometry.vdist(&p.position, &origin))
            .collect()
    }

    /// Mass-weighted center of a group, wrapped into the primary cell.
    pub fn mass_center(&self, topology: &Topology, group_index: usize) -> Point3<f64> {
        let group = &self.groups[group_index];
        let positions = self.unwrapped_positions(group_index);
        let mut total_mass = 0.0;
        let mut weighted = Vector3::zeros();
        for (p, particle) in positions.iter().zip(&self.particles[group.range()]) {
            let mass = topology.atom(particle.atom_id).molar_mass;
            weighted += p.coords * mass;
            total_mass += mass;
        }
        let mut center = if total_mass > 0.0 {
            Point3::from(weighted / total_mass)
        } else {
            Point3::origin()
        };
        self.geometry.boundary(&mut center);
        center
    }

    pub fn groups_of_kind(&self, kind: MoleculeKindId) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.kind == kind && !g.is_empty())
            .map(|(i, _)| i)
    }

    /// Indices of all particles belonging to groups of the given kind.
    pub fn particles_of_kind(&self, kind: MoleculeKindId) -> Vec<usize> {
        self.groups
            .iter()
            .filter(|g| g.kind == kind)
            .flat_map(|g| g.range())
            .collect()
    }

    pub fn particles_of_type(&self, atom_id: AtomTypeId) -> impl Iterator<Item = usize> + '_ {
        self.particles
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.atom_id == atom_id)
            .map(|(i, _)| i)
    }

    /// Number of independently translating entities: one per molecule, one per atom of an
    /// atomic group.
    pub fn translational_units(&self) -> usize {
        self.groups
            .iter()
            .map(|g| if g.atomic { g.len() } else { 1 })
            .sum()
    }

    pub fn net_charge(&self) -> f64 {
        self.particles.iter().map(|p| p.charge).sum()
    }

    /// Moves the whole configuration into `geometry`, scaling atomic particles individually
    /// and translating molecules rigidly with their scaled mass centers.
    pub fn scale_to(&mut self, topology: &Topology, geometry: Geometry) {
        let factor = self.geometry.linear_scale(geometry.volume());
        for group_index in 0..self.groups.len() {
            let group = self.groups[group_index];
            if group.atomic {
                for particle in &mut self.particles[group.range()] {
                    particle.position.coords *= factor;
                }
            } else if !group.is_empty() {
                let center = self.mass_center(topology, group_index);
                let shift = center.coords * (factor - 1.0);
                for particle in &mut self.particles[group.range()] {
                    particle.position += shift;
                }
            }
        }
        self.geometry = geometry;
        for particle in &mut self.particles {
            self.geometry.boundary(&mut particle.position);
        }
    }
}
