//! Terminal events of a ray integration.
//!
//! Every event is a signed distance to its trigger surface: positive while the
//! event is dormant, `<= 0` once it has fired.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::params::{IntegrationParameters, CLOSE_TO_START_WARMUP};
use crate::traits::QuadraticDifferential;

/// Why a ray stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// Left the disk of radius `domain_radius` around `center`.
    FarAway,
    /// Came within `close_to_pole` of a simple or double pole.
    CloseToPole,
    /// Returned within `close_to_start` of its start point after the warm-up period.
    CloseToStart,
    /// Came within `close_to_zero` of a zero.
    CloseToZero,
    /// Ran for `max_time` without any event firing.
    TimeExhausted,
}

impl Termination {
    pub fn is_event(self) -> bool {
        self != Termination::TimeExhausted
    }
}

/// The four terminal events of one ray, bound to its field, start point and parameters.
pub struct EventSet<'a, F: QuadraticDifferential + ?Sized> {
    field: &'a F,
    start: Complex64,
    params: &'a IntegrationParameters,
}

impl<'a, F: QuadraticDifferential + ?Sized> EventSet<'a, F> {
    pub fn new(field: &'a F, start: Complex64, params: &'a IntegrationParameters) -> Self {
        Self {
            field,
            start,
            params,
        }
    }

    pub fn far_away(&self, z: Complex64) -> f64 {
        self.params.domain_radius - (z - self.params.center).norm()
    }

    pub fn close_to_pole(&self, z: Complex64) -> f64 {
        self.field.distance_to_nearest_pole(z) - self.params.close_to_pole
    }

    /// Dormant (constant positive) until `t` reaches the warm-up time.
    pub fn close_to_start(&self, t: f64, z: Complex64) -> f64 {
        if t < CLOSE_TO_START_WARMUP {
            return self.params.close_to_start;
        }
        (z - self.start).norm() - self.params.close_to_start
    }

    pub fn close_to_zero(&self, z: Complex64) -> f64 {
        self.field.distance_to_nearest_zero(z) - self.params.close_to_zero
    }

    /// Smallest signed distance over all events; the ray must stop once this is `<= 0`.
    pub fn min_distance(&self, t: f64, z: Complex64) -> f64 {
        self.far_away(z)
            .min(self.close_to_pole(z))
            .min(self.close_to_start(t, z))
            .min(self.close_to_zero(z))
    }

    /// First fired event, checked in the order far-away, pole, start, zero.
    pub fn triggered(&self, t: f64, z: Complex64) -> Option<Termination> {
        if self.far_away(z) <= 0.0 {
            Some(Termination::FarAway)
        } else if self.close_to_pole(z) <= 0.0 {
            Some(Termination::CloseToPole)
        } else if self.close_to_start(t, z) <= 0.0 {
            Some(Termination::CloseToStart)
        } else if self.close_to_zero(z) <= 0.0 {
            Some(Termination::CloseToZero)
        } else {
            None
        }
    }
}

/// Locates the sign change of `g` on `(0, h]` by bisection, given that
/// `g(0) > 0` and `g(h) <= 0`. Returns the smallest bracketing step found
/// whose end still satisfies `g <= 0`.
pub fn bisect_trigger<E>(
    h: f64,
    tolerance: f64,
    max_iters: usize,
    mut g: impl FnMut(f64) -> Result<f64, E>,
) -> Result<f64, E> {
    let mut lo = 0.0;
    let mut hi = h;
    for _ in 0..max_iters {
        if hi - lo <= tolerance {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if g(mid)? <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(hi)
}
