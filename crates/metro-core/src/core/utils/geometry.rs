use nalgebra::{Rotation3, Unit, Vector3};
use rand::Rng;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_radians: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_radians)
}

/// Uniformly distributed unit vector (Marsaglia's method).
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    loop {
        let a = 2.0 * rng.r#gen::<f64>() - 1.0;
        let b = 2.0 * rng.r#gen::<f64>() - 1.0;
        let s = a * a + b * b;
        if s < 1.0 && s > 0.0 {
            let root = (1.0 - s).sqrt();
            return Vector3::new(2.0 * a * root, 2.0 * b * root, 1.0 - 2.0 * s);
        }
    }
}

/// Uniform value in `[-half_width, half_width]`.
pub fn random_half<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    half_width * (2.0 * rng.r#gen::<f64>() - 1.0)
}

/// A random rotation about a uniformly chosen axis by an angle in `[-max_angle, max_angle]`.
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R, max_angle: f64) -> Rotation3<f64> {
    let axis = random_unit_vector(rng);
    let angle = random_half(rng, max_angle);
    rotation_from_axis_angle(&axis, angle)
}
