//! Physical constants and conversions to the reduced (kT) energy scale used by the engine.

use std::f64::consts::PI;

pub const AVOGADRO: f64 = 6.022_140_76e23;
pub const BOLTZMANN: f64 = 1.380_649e-23;
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_812_8e-12;
pub const GAS_CONSTANT: f64 = BOLTZMANN * AVOGADRO;

/// One Debye expressed in e·Å.
pub const DEBYE_TO_EA: f64 = 0.208_194_34;

/// Number of molecules per Å³ in a 1 mM solution.
pub const MILLIMOLAR_TO_NUMBER_DENSITY: f64 = AVOGADRO * 1.0e-3 / 1.0e27;

/// Bjerrum length in Å: the distance at which two unit charges interact with 1 kT.
pub fn bjerrum_length(relative_permittivity: f64, temperature: f64) -> f64 {
    ELEMENTARY_CHARGE * ELEMENTARY_CHARGE
        / (4.0 * PI * VACUUM_PERMITTIVITY * relative_permittivity * BOLTZMANN * temperature)
        * 1.0e10
}

pub fn kjmol_to_kt(value: f64, temperature: f64) -> f64 {
    value * 1.0e3 / (GAS_CONSTANT * temperature)
}

pub fn kt_to_kjmol(value: f64, temperature: f64) -> f64 {
    value * GAS_CONSTANT * temperature / 1.0e3
}

pub fn millimolar_to_number_density(concentration: f64) -> f64 {
    concentration * MILLIMOLAR_TO_NUMBER_DENSITY
}

pub fn number_density_to_millimolar(density: f64) -> f64 {
    density / MILLIMOLAR_TO_NUMBER_DENSITY
}

/// Debye screening length in Å for a 1:1 electrolyte of the given ionic strength (mol/L).
pub fn debye_length_from_ionic_strength(ionic_strength: f64, bjerrum_length: f64) -> f64 {
    let number_density = ionic_strength * AVOGADRO / 1.0e27;
    1.0 / (8.0 * PI * bjerrum_length * number_density).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn bjerrum_length_of_water_at_room_temperature_is_about_seven_angstrom() {
        let lb = bjerrum_length(78.7, 298.15);
        assert!(f64_approx_equal(lb, 7.12, 0.01), "lB = {}", lb);
    }

    #[test]
    fn bjerrum_length_scales_inversely_with_temperature_and_permittivity() {
        let reference = bjerrum_length(1.0, 1.0);
        assert!(f64_approx_equal(reference, 167_101.0, 5.0));
        assert!(f64_approx_equal(bjerrum_length(2.0, 100.0), reference / 200.0, 1e-9));
    }

    #[test]
    fn kjmol_conversion_round_trips() {
        let kt = kjmol_to_kt(2.4789, 298.15);
        assert!(f64_approx_equal(kt, 1.0, 1e-3));
        assert!(f64_approx_equal(kt_to_kjmol(kt, 298.15), 2.4789, 1e-12));
    }

    #[test]
    fn debye_length_matches_textbook_value_for_physiological_salt() {
        let lb = bjerrum_length(78.5, 298.15);
        let debye = debye_length_from_ionic_strength(0.1, lb);
        assert!(f64_approx_equal(debye, 9.6, 0.1), "debye = {}", debye);
    }

    #[test]
    fn millimolar_round_trip_preserves_value() {
        let density = millimolar_to_number_density(150.0);
        assert!(f64_approx_equal(number_density_to_millimolar(density), 150.0, 1e-9));
    }
}
