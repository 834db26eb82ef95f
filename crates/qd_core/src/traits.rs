use num_complex::Complex64;

use crate::error::TrajectoryError;

/// A meromorphic quadratic differential, consumed through point evaluation
/// and the locations of its singularities.
///
/// Implementations are shared read-only across batch workers, hence `Sync`.
pub trait QuadraticDifferential: Sync {
    /// Evaluates the differential at `z` under the given unit `phase`,
    /// optionally normalized to unit modulus.
    fn evaluate(
        &self,
        z: Complex64,
        phase: Complex64,
        normalize: bool,
    ) -> Result<Complex64, TrajectoryError>;

    fn zeros(&self) -> &[Complex64];

    fn simple_poles(&self) -> &[Complex64];

    fn double_poles(&self) -> &[Complex64];

    /// Default unit-modulus phase defining which trajectories are horizontal.
    fn phase(&self) -> Complex64;

    /// Distance from `z` to the nearest simple or double pole
    /// (`f64::INFINITY` when there are none).
    fn distance_to_nearest_pole(&self, z: Complex64) -> f64 {
        self.simple_poles()
            .iter()
            .chain(self.double_poles())
            .map(|pole| (z - pole).norm())
            .fold(f64::INFINITY, f64::min)
    }

    /// Distance from `z` to the nearest zero (`f64::INFINITY` when there are none).
    fn distance_to_nearest_zero(&self, z: Complex64) -> f64 {
        self.zeros()
            .iter()
            .map(|zero| (z - zero).norm())
            .fold(f64::INFINITY, f64::min)
    }
}

/// An autonomous-or-not planar vector field written in complex form, dz/dt = f(t, z).
pub trait PlanarFlow {
    fn velocity(&self, t: f64, z: Complex64) -> Result<Complex64, TrajectoryError>;
}
