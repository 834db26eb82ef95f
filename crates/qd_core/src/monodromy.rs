//! Square-root branch tracking along an integration path.
//!
//! The velocity of a horizontal trajectory is `sqrt(conj(q))` for the unit field
//! value `q`. The principal square root jumps sign whenever `q` crosses the
//! negative real axis; the tracker unwraps the phase of `q` continuously and
//! returns a `±1` factor that cancels those jumps.

use std::f64::consts::PI;

use num_complex::Complex64;

/// Monodromy bookkeeping owned by a single ray integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonodromyState {
    last_value: Complex64,
    accumulated_phase: f64,
}

impl MonodromyState {
    /// Seeds the tracker from the (normalized) field value at the start point.
    pub fn new(initial_value: Complex64) -> Self {
        Self {
            last_value: initial_value,
            accumulated_phase: initial_value.arg(),
        }
    }

    pub fn last_value(&self) -> Complex64 {
        self.last_value
    }

    pub fn accumulated_phase(&self) -> f64 {
        self.accumulated_phase
    }

    /// Branch factor for the current accumulated phase.
    pub fn branch(&self) -> f64 {
        branch_factor(self.accumulated_phase)
    }

    /// Branch factor `value` would get if it were the next accepted value,
    /// without committing it. Used for trial stage evaluations.
    pub fn observe(&self, value: Complex64) -> f64 {
        branch_factor(self.accumulated_phase + phase_increment(self.last_value, value))
    }

    /// Commits `value` as the newest field value on the path and returns its branch factor.
    pub fn update(&mut self, value: Complex64) -> f64 {
        self.accumulated_phase += phase_increment(self.last_value, value);
        self.last_value = value;
        branch_factor(self.accumulated_phase)
    }
}

/// Principal argument of `to / from`, in `(−π, π]`.
fn phase_increment(from: Complex64, to: Complex64) -> f64 {
    (to * from.conj()).arg()
}

/// `−1` when `(φ − π) mod 4π < 2π`, otherwise `+1`.
pub fn branch_factor(accumulated_phase: f64) -> f64 {
    if (accumulated_phase - PI).rem_euclid(4.0 * PI) < 2.0 * PI {
        -1.0
    } else {
        1.0
    }
}

/// Branch-corrected square root `branch · sqrt(conj(value))`.
pub fn branch_sqrt(value: Complex64, branch: f64) -> Complex64 {
    let conjugate = value.conj();
    // `+ 0.0` turns a negative zero into a positive one so values on the
    // negative real axis take the principal root `+i`, matching `branch_factor`.
    Complex64::new(conjugate.re, conjugate.im + 0.0).sqrt() * branch
}
