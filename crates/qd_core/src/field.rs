//! Concrete differentials and the strategies used to turn them into field values.

use num_complex::Complex64;
use num_traits::One;
use serde::{Deserialize, Serialize};

use crate::error::TrajectoryError;
use crate::traits::QuadraticDifferential;

/// Vectors shorter than this are treated as coincident with a singularity.
pub const SINGULARITY_EPS: f64 = 1e-12;

/// Unit vector in the direction of `w`, or `None` when `w` is (numerically) zero
/// or not finite.
pub fn unit(w: Complex64) -> Option<Complex64> {
    let norm = w.norm();
    if norm <= SINGULARITY_EPS || !norm.is_finite() {
        return None;
    }
    Some(w / norm)
}

/// Unit phase `e^{iθ}`.
pub fn phase_from_angle(theta: f64) -> Complex64 {
    Complex64::from_polar(1.0, theta)
}

/// Rational quadratic differential
/// `phase · Π (z − a) / Π (z − b) / Π (z − c)²` over zeros `a`, simple poles `b`
/// and double poles `c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularField {
    zeros: Vec<Complex64>,
    simple_poles: Vec<Complex64>,
    double_poles: Vec<Complex64>,
    phase: Complex64,
}

impl SingularField {
    pub fn new(
        zeros: Vec<Complex64>,
        simple_poles: Vec<Complex64>,
        double_poles: Vec<Complex64>,
    ) -> Self {
        Self {
            zeros,
            simple_poles,
            double_poles,
            phase: Complex64::one(),
        }
    }

    /// Replaces the default phase; non-unit phases are normalized.
    pub fn with_phase(mut self, phase: Complex64) -> Result<Self, TrajectoryError> {
        self.phase = unit(phase).ok_or(TrajectoryError::InvalidParameter {
            name: "phase",
            value: phase.norm(),
        })?;
        Ok(self)
    }
}

impl QuadraticDifferential for SingularField {
    fn evaluate(
        &self,
        z: Complex64,
        phase: Complex64,
        normalize: bool,
    ) -> Result<Complex64, TrajectoryError> {
        let singular = || TrajectoryError::SingularPoint { point: z };
        let mut value = phase;
        // Same product over unit offsets, so its modulus stays `|phase|`.
        let mut direction = phase;
        for zero in &self.zeros {
            let offset = z - zero;
            let u = unit(offset).ok_or_else(singular)?;
            value *= offset;
            direction *= u;
        }
        for pole in &self.simple_poles {
            let offset = z - pole;
            let u = unit(offset).ok_or_else(singular)?;
            value /= offset;
            direction *= u.conj();
        }
        for pole in &self.double_poles {
            let offset = z - pole;
            let u = unit(offset).ok_or_else(singular)?.conj();
            value /= offset * offset;
            direction *= u * u;
        }
        if normalize {
            return unit(direction).ok_or_else(singular);
        }
        if !(value.re.is_finite() && value.im.is_finite()) {
            return Err(singular());
        }
        Ok(value)
    }

    fn zeros(&self) -> &[Complex64] {
        &self.zeros
    }

    fn simple_poles(&self) -> &[Complex64] {
        &self.simple_poles
    }

    fn double_poles(&self) -> &[Complex64] {
        &self.double_poles
    }

    fn phase(&self) -> Complex64 {
        self.phase
    }
}

/// How the integrator obtains the (unit-modulus) field value at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldStrategy {
    /// Product of unit vectors towards each singularity, with exponents
    /// `+1` for zeros, `−1` for simple poles and `−2` for double poles.
    #[default]
    SingularityProduct,
    /// The differential's own normalized evaluation.
    Direct,
}

impl FieldStrategy {
    pub fn value<F: QuadraticDifferential + ?Sized>(
        self,
        field: &F,
        z: Complex64,
        phase: Complex64,
    ) -> Result<Complex64, TrajectoryError> {
        match self {
            FieldStrategy::SingularityProduct => singularity_product(field, z, phase),
            FieldStrategy::Direct => field.evaluate(z, phase, true),
        }
    }
}

/// Canonical field value:
/// `phase · Π unit(z − a) · Π unit(z − b)⁻¹ · Π unit(z − c)⁻²`.
///
/// Dividing by a unit vector is multiplying by its conjugate, so no division
/// by a small number ever happens here.
pub fn singularity_product<F: QuadraticDifferential + ?Sized>(
    field: &F,
    z: Complex64,
    phase: Complex64,
) -> Result<Complex64, TrajectoryError> {
    let singular = || TrajectoryError::SingularPoint { point: z };
    let mut value = phase;
    for zero in field.zeros() {
        value *= unit(z - zero).ok_or_else(singular)?;
    }
    for pole in field.simple_poles() {
        value *= unit(z - pole).ok_or_else(singular)?.conj();
    }
    for pole in field.double_poles() {
        let u = unit(z - pole).ok_or_else(singular)?.conj();
        value *= u * u;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn sample_field() -> SingularField {
        SingularField::new(
            vec![Complex64::new(0.0, 0.0), Complex64::new(1.0, 1.0)],
            vec![Complex64::new(-2.0, 0.5)],
            vec![Complex64::new(0.5, -1.5)],
        )
    }

    #[test]
    fn unit_rejects_zero_length_vectors() {
        assert!(unit(Complex64::new(0.0, 0.0)).is_none());
        assert!(unit(Complex64::new(f64::NAN, 0.0)).is_none());
        let u = unit(Complex64::new(3.0, 4.0)).expect("unit vector");
        assert!((u - Complex64::new(0.6, 0.8)).norm() < 1e-15);
    }

    #[test]
    fn phase_from_angle_is_unit() {
        let phase = phase_from_angle(FRAC_PI_2);
        assert!((phase - Complex64::new(0.0, 1.0)).norm() < 1e-15);
    }

    #[test]
    fn strategies_agree_away_from_singularities() {
        let field = sample_field();
        let phase = phase_from_angle(0.3);
        for z in [
            Complex64::new(0.3, 0.7),
            Complex64::new(-1.0, -1.0),
            Complex64::new(4.0, 2.5),
        ] {
            let product = FieldStrategy::SingularityProduct
                .value(&field, z, phase)
                .expect("product value");
            let direct = FieldStrategy::Direct
                .value(&field, z, phase)
                .expect("direct value");
            assert!((product - direct).norm() < 1e-12, "{product} vs {direct}");
            assert!((product.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unnormalized_evaluation_matches_rational_form() {
        let field = SingularField::new(
            vec![Complex64::new(1.0, 0.0)],
            vec![],
            vec![Complex64::new(0.0, 0.0)],
        );
        let z = Complex64::new(2.0, 0.0);
        let value = field
            .evaluate(z, Complex64::one(), false)
            .expect("value");
        assert!((value - Complex64::new(0.25, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn normalized_evaluation_ignores_the_magnitude_of_the_value() {
        // |q(0)| = 5^-20 is tiny, yet every pole is 5 away.
        let ring: Vec<Complex64> = (0..10)
            .map(|k| Complex64::from_polar(5.0, k as f64 * std::f64::consts::TAU / 10.0))
            .collect();
        let field = SingularField::new(vec![], vec![], ring);
        let z = Complex64::new(0.0, 0.0);
        assert!((field.distance_to_nearest_pole(z) - 5.0).abs() < 1e-12);

        let direct = field.evaluate(z, Complex64::one(), true).expect("regular point");
        let product = singularity_product(&field, z, Complex64::one()).expect("product");
        assert!((direct.norm() - 1.0).abs() < 1e-12);
        assert!((direct - product).norm() < 1e-12, "{direct} vs {product}");

        let raw = field.evaluate(z, Complex64::one(), false).expect("raw value");
        assert!(raw.norm() < 1e-12);
    }

    #[test]
    fn singular_points_fail_fast() {
        let field = sample_field();
        for z in [
            Complex64::new(0.0, 0.0),
            Complex64::new(-2.0, 0.5),
            Complex64::new(0.5, -1.5),
        ] {
            assert_eq!(
                FieldStrategy::SingularityProduct.value(&field, z, Complex64::one()),
                Err(TrajectoryError::SingularPoint { point: z })
            );
            assert!(field.evaluate(z, Complex64::one(), true).is_err());
        }
    }

    #[test]
    fn nearest_singularity_distances() {
        let field = sample_field();
        let z = Complex64::new(-2.0, 0.0);
        assert!((field.distance_to_nearest_pole(z) - 0.5).abs() < 1e-12);
        assert!((field.distance_to_nearest_zero(z) - 2.0).abs() < 1e-12);

        let empty = SingularField::new(vec![], vec![], vec![]);
        assert_eq!(empty.distance_to_nearest_pole(z), f64::INFINITY);
        assert_eq!(empty.distance_to_nearest_zero(z), f64::INFINITY);
    }

    #[test]
    fn with_phase_normalizes_and_rejects_zero() {
        let field = SingularField::new(vec![], vec![], vec![])
            .with_phase(Complex64::new(0.0, -2.0))
            .expect("phase");
        assert!((field.phase() - Complex64::new(0.0, -1.0)).norm() < 1e-15);
        assert!(SingularField::new(vec![], vec![], vec![])
            .with_phase(Complex64::new(0.0, 0.0))
            .is_err());
    }
}
