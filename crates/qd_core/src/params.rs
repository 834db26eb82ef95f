//! Integration parameters and their named defaults.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::TrajectoryError;

pub const DEFAULT_MAX_TIME: f64 = 1000.0;
pub const DEFAULT_MAX_STEP: f64 = 0.1;
pub const DEFAULT_VELOCITY_SCALE: f64 = 1.0;
pub const DEFAULT_DOMAIN_RADIUS: f64 = 10.0;
pub const DEFAULT_CENTER: Complex64 = Complex64::new(0.0, 0.0);
pub const DEFAULT_CLOSE_TO_POLE: f64 = 0.01;
pub const DEFAULT_CLOSE_TO_START: f64 = 0.01;
pub const DEFAULT_CLOSE_TO_ZERO: f64 = 0.01;
pub const DEFAULT_ABSOLUTE_TOLERANCE: f64 = 1e-8;
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-8;
pub const DEFAULT_MIN_STEP: f64 = 1e-12;

/// Integration time after which the return-to-start event is armed.
pub const CLOSE_TO_START_WARMUP: f64 = 100.0;

/// Settings for one trajectory integration. Every field can be overridden
/// independently; missing fields deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationParameters {
    pub max_time: f64,
    pub max_step: f64,
    pub velocity_scale: f64,
    pub domain_radius: f64,
    pub center: Complex64,
    pub close_to_pole: f64,
    pub close_to_start: f64,
    pub close_to_zero: f64,
    /// Absolute error tolerance of the adaptive stepper.
    pub atol: f64,
    /// Relative error tolerance of the adaptive stepper.
    pub rtol: f64,
    /// Smallest step the controller may shrink to before giving up.
    pub min_step: f64,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            max_time: DEFAULT_MAX_TIME,
            max_step: DEFAULT_MAX_STEP,
            velocity_scale: DEFAULT_VELOCITY_SCALE,
            domain_radius: DEFAULT_DOMAIN_RADIUS,
            center: DEFAULT_CENTER,
            close_to_pole: DEFAULT_CLOSE_TO_POLE,
            close_to_start: DEFAULT_CLOSE_TO_START,
            close_to_zero: DEFAULT_CLOSE_TO_ZERO,
            atol: DEFAULT_ABSOLUTE_TOLERANCE,
            rtol: DEFAULT_RELATIVE_TOLERANCE,
            min_step: DEFAULT_MIN_STEP,
        }
    }
}

impl IntegrationParameters {
    pub fn with_max_time(mut self, max_time: f64) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn with_velocity_scale(mut self, velocity_scale: f64) -> Self {
        self.velocity_scale = velocity_scale;
        self
    }

    pub fn with_domain_radius(mut self, domain_radius: f64) -> Self {
        self.domain_radius = domain_radius;
        self
    }

    pub fn with_center(mut self, center: Complex64) -> Self {
        self.center = center;
        self
    }

    pub fn with_close_to_pole(mut self, close_to_pole: f64) -> Self {
        self.close_to_pole = close_to_pole;
        self
    }

    pub fn with_close_to_start(mut self, close_to_start: f64) -> Self {
        self.close_to_start = close_to_start;
        self
    }

    pub fn with_close_to_zero(mut self, close_to_zero: f64) -> Self {
        self.close_to_zero = close_to_zero;
        self
    }

    pub fn with_tolerances(mut self, atol: f64, rtol: f64) -> Self {
        self.atol = atol;
        self.rtol = rtol;
        self
    }

    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = min_step;
        self
    }

    /// Checks that every scalar setting is positive and finite and that the
    /// domain center is finite.
    pub fn validate(&self) -> Result<(), TrajectoryError> {
        let checks = [
            ("max_time", self.max_time),
            ("max_step", self.max_step),
            ("velocity_scale", self.velocity_scale),
            ("domain_radius", self.domain_radius),
            ("close_to_pole", self.close_to_pole),
            ("close_to_start", self.close_to_start),
            ("close_to_zero", self.close_to_zero),
            ("atol", self.atol),
            ("rtol", self.rtol),
            ("min_step", self.min_step),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrajectoryError::InvalidParameter { name, value });
            }
        }
        if self.min_step > self.max_step {
            return Err(TrajectoryError::InvalidParameter {
                name: "min_step",
                value: self.min_step,
            });
        }
        if !self.center.re.is_finite() {
            return Err(TrajectoryError::InvalidParameter {
                name: "center.re",
                value: self.center.re,
            });
        }
        if !self.center.im.is_finite() {
            return Err(TrajectoryError::InvalidParameter {
                name: "center.im",
                value: self.center.im,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn defaults_are_valid() {
        let params = IntegrationParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_step, DEFAULT_MAX_STEP);
        assert_eq!(params.center, Complex64::new(0.0, 0.0));
    }

    #[test]
    fn rejects_non_positive_settings() {
        let params = IntegrationParameters::default().with_velocity_scale(0.0);
        assert_err_contains(params.validate().map_err(Into::into), "velocity_scale");

        let params = IntegrationParameters::default().with_max_step(-1.0);
        assert_err_contains(params.validate().map_err(Into::into), "max_step");

        let params = IntegrationParameters::default().with_close_to_start(f64::NAN);
        assert_err_contains(params.validate().map_err(Into::into), "close_to_start");

        let params =
            IntegrationParameters::default().with_center(Complex64::new(f64::INFINITY, 0.0));
        assert_err_contains(params.validate().map_err(Into::into), "center.re");
    }

    #[test]
    fn rejects_min_step_above_max_step() {
        let params = IntegrationParameters::default()
            .with_max_step(1e-3)
            .with_min_step(1e-2);
        assert_err_contains(params.validate().map_err(Into::into), "min_step");
    }

    #[test]
    fn partial_configuration_deserializes_over_defaults() {
        let params: IntegrationParameters =
            serde_json::from_str(r#"{ "max_time": 25.0, "close_to_pole": 0.5 }"#)
                .expect("parameters should deserialize");
        assert_eq!(params.max_time, 25.0);
        assert_eq!(params.close_to_pole, 0.5);
        assert_eq!(params.domain_radius, DEFAULT_DOMAIN_RADIUS);
        assert_eq!(params.close_to_zero, DEFAULT_CLOSE_TO_ZERO);
    }
}
