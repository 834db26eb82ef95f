use num_complex::Complex64;
use thiserror::Error;

/// Failures raised while integrating or building trajectories.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("Field is singular at {point}; cannot evaluate at a zero or pole.")]
    SingularPoint { point: Complex64 },
    #[error("Integration produced a non-finite state at t = {t}.")]
    NonFiniteState { t: f64 },
    #[error("Step size {h:e} fell below the minimum step at t = {t}.")]
    StepSizeTooSmall { t: f64, h: f64 },
    #[error("Parameter `{name}` must be positive and finite (got {value}).")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("A trajectory needs at least one point.")]
    EmptyTrajectory,
}
