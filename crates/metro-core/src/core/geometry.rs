use nalgebra::{Point3, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Invalid container dimension: {0}")]
    InvalidDimension(String),
    #[error("Container volume must be positive, got {0}")]
    NonPositiveVolume(f64),
    #[error(
        "Container would shrink to {actual:.3} Å, below the minimum of {required:.3} Å (twice the longest cutoff)"
    )]
    TooSmall { required: f64, actual: f64 },
    #[error("Could not place molecule '{molecule}' after {attempts} attempts")]
    Insertion { molecule: String, attempts: usize },
}

/// The simulation container.
///
/// Cuboids and slabs are centered on the origin and periodic along their periodic axes,
/// so a wrapped coordinate lies in `[-L/2, L/2)`. Slabs have hard walls at `z = ±Lz/2`.
/// Spheres are bounded by a hard wall at `radius` and use plain Euclidean distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Geometry {
    Cuboid { length: Vector3<f64> },
    Slab { length: Vector3<f64> },
    Sphere { radius: f64 },
}

impl Geometry {
    pub fn cuboid(length: Vector3<f64>) -> Result<Self, GeometryError> {
        validate_lengths(&length)?;
        Ok(Self::Cuboid { length })
    }

    pub fn cube(side: f64) -> Result<Self, GeometryError> {
        Self::cuboid(Vector3::repeat(side))
    }

    pub fn slab(length: Vector3<f64>) -> Result<Self, GeometryError> {
        validate_lengths(&length)?;
        Ok(Self::Slab { length })
    }

    pub fn sphere(radius: f64) -> Result<Self, GeometryError> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(GeometryError::InvalidDimension(format!(
                "sphere radius must be positive, got {}",
                radius
            )));
        }
        Ok(Self::Sphere { radius })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cuboid { .. } => "cuboid",
            Self::Slab { .. } => "slab",
            Self::Sphere { .. } => "sphere",
        }
    }

    /// Box side lengths for the periodic shapes.
    pub fn lengths(&self) -> Option<Vector3<f64>> {
        match self {
            Self::Cuboid { length } | Self::Slab { length } => Some(*length),
            Self::Sphere { .. } => None,
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            Self::Cuboid { length } | Self::Slab { length } => length.x * length.y * length.z,
            Self::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
        }
    }

    /// Minimum-image displacement `a - b`.
    #[inline]
    pub fn vdist(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        let mut d = a - b;
        match self {
            Self::Cuboid { length } => {
                for i in 0..3 {
                    d[i] -= length[i] * (d[i] / length[i]).round();
                }
            }
            Self::Slab { length } => {
                for i in 0..2 {
                    d[i] -= length[i] * (d[i] / length[i]).round();
                }
            }
            Self::Sphere { .. } => {}
        }
        d
    }

    #[inline]
    pub fn sqdist(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.vdist(a, b).norm_squared()
    }

    #[inline]
    pub fn distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.sqdist(a, b).sqrt()
    }

    /// Wraps a position back into the primary cell along periodic axes.
    pub fn boundary(&self, p: &mut Point3<f64>) {
        let periodic_axes = match self {
            Self::Cuboid { .. } => 3,
            Self::Slab { .. } => 2,
            Self::Sphere { .. } => 0,
        };
        if let Some(length) = self.lengths() {
            for i in 0..periodic_axes {
                p[i] -= length[i] * (p[i] / length[i]).round();
            }
        }
    }

    /// Returns `true` if the point lies outside the container's hard walls.
    pub fn collision(&self, p: &Point3<f64>) -> bool {
        match self {
            Self::Cuboid { .. } => false,
            Self::Slab { length } => p.z.abs() > 0.5 * length.z,
            Self::Sphere { radius } => p.coords.norm_squared() > radius * radius,
        }
    }

    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Point3<f64> {
        match self {
            Self::Cuboid { length } | Self::Slab { length } => Point3::new(
                length.x * (rng.r#gen::<f64>() - 0.5),
                length.y * (rng.r#gen::<f64>() - 0.5),
                length.z * (rng.r#gen::<f64>() - 0.5),
            ),
            Self::Sphere { radius } => loop {
                let p = Point3::new(
                    radius * (2.0 * rng.r#gen::<f64>() - 1.0),
                    radius * (2.0 * rng.r#gen::<f64>() - 1.0),
                    radius * (2.0 * rng.r#gen::<f64>() - 1.0),
                );
                if !self.collision(&p) {
                    break p;
                }
            },
        }
    }

    /// The smallest extent that bounds interaction cutoffs: the shortest periodic side,
    /// or the diameter of a sphere.
    pub fn min_length(&self) -> f64 {
        match self {
            Self::Cuboid { length } => length.min(),
            Self::Slab { length } => length.x.min(length.y),
            Self::Sphere { radius } => 2.0 * radius,
        }
    }

    /// Linear factor that maps this container onto one of `new_volume`.
    pub fn linear_scale(&self, new_volume: f64) -> f64 {
        (new_volume / self.volume()).cbrt()
    }

    /// Returns an isotropically rescaled copy with the requested volume.
    ///
    /// `min_length` is the smallest allowed value of [`Geometry::min_length`] after scaling,
    /// normally twice the longest interaction cutoff.
    pub fn scaled(&self, new_volume: f64, min_length: f64) -> Result<Self, GeometryError> {
        if !(new_volume > 0.0 && new_volume.is_finite()) {
            return Err(GeometryError::NonPositiveVolume(new_volume));
        }
        let factor = self.linear_scale(new_volume);
        let scaled = match self {
            Self::Cuboid { length } => Self::Cuboid {
                length: length * factor,
            },
            Self::Slab { length } => Self::Slab {
                length: length * factor,
            },
            Self::Sphere { radius } => Self::Sphere {
                radius: radius * factor,
            },
        };
        let actual = scaled.min_length();
        if actual < min_length {
            return Err(GeometryError::TooSmall {
                required: min_length,
                actual,
            });
        }
        Ok(scaled)
    }
}

fn validate_lengths(length: &Vector3<f64>) -> Result<(), GeometryError> {
    if length.iter().all(|l| *l > 0.0 && l.is_finite()) {
        Ok(())
    } else {
        Err(GeometryError::InvalidDimension(format!(
            "box lengths must be positive, got [{}, {}, {}]",
            length.x, length.y, length.z
        )))
    }
}
