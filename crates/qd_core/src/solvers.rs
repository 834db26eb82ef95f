use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::TrajectoryError;
use crate::traits::PlanarFlow;

// Tsit5 tableau.
const C2: f64 = 0.161;
const C3: f64 = 0.327;
const C4: f64 = 0.9;
const C5: f64 = 0.9800255409045097;

const A21: f64 = 0.161;

const A31: f64 = -0.008480655492356989;
const A32: f64 = 0.335480655492357;

const A41: f64 = 2.897153057105493;
const A42: f64 = -6.359448489975075;
const A43: f64 = 4.3622954328695815;

const A51: f64 = 5.325864828439257;
const A52: f64 = -11.748883564062828;
const A53: f64 = 7.4955393428898365;
const A54: f64 = -0.09249506636175525;

const A61: f64 = 5.86145544294642;
const A62: f64 = -12.92096931784711;
const A63: f64 = 8.159367898576159;
const A64: f64 = -0.071584973281401;
const A65: f64 = -0.028269050394068383;

// 5th order weights (row 7 of the tableau, first-same-as-last).
const B1: f64 = 0.09646076681806523;
const B2: f64 = 0.01;
const B3: f64 = 0.4798896504144996;
const B4: f64 = 1.379008574103742;
const B5: f64 = -3.290069515436081;
const B6: f64 = 2.324710524099774;

// Difference between the 5th and embedded 4th order weights.
const E1: f64 = -0.00178001105222577714;
const E2: f64 = -0.0008164344596567469;
const E3: f64 = 0.007880878010261995;
const E4: f64 = -0.1447110071732629;
const E5: f64 = 0.5823571654525552;
const E6: f64 = -0.45808210592918697;
const E7: f64 = 0.015151515151515152;

/// Counters gathered while integrating one ray.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub fn_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
}

/// I-controller: `h_new = safety · h · error^(−1/5)`, clamped per step.
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    pub safety: f64,
    pub max_factor: f64,
    pub min_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / 5.0,
        }
    }
}

impl StepController {
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Outcome of one attempted adaptive step.
#[derive(Debug, Clone, Copy)]
pub struct StepResult {
    pub z: Complex64,
    pub t: f64,
    pub h: f64,
    /// Normalized error estimate; the step is accepted when `error <= 1`.
    pub error: f64,
    pub h_next: f64,
    pub accepted: bool,
}

/// Tsitouras 5(4) stepper for complex (planar) state with embedded error control.
pub struct Tsit5 {
    controller: StepController,
    atol: f64,
    rtol: f64,
    h_min: f64,
    h_max: f64,
    stats: IntegrationStats,
}

impl Tsit5 {
    pub fn new(atol: f64, rtol: f64, h_min: f64, h_max: f64) -> Self {
        Self {
            controller: StepController::default(),
            atol,
            rtol,
            h_min,
            h_max,
            stats: IntegrationStats::default(),
        }
    }

    pub fn h_min(&self) -> f64 {
        self.h_min
    }

    pub fn h_max(&self) -> f64 {
        self.h_max
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    /// Fixed step of size `h` without error control. Returns the 5th order
    /// solution and the stage slopes `k1..k6`.
    fn stages(
        &mut self,
        flow: &impl PlanarFlow,
        t: f64,
        z: Complex64,
        h: f64,
    ) -> Result<(Complex64, [Complex64; 6]), TrajectoryError> {
        let k1 = flow.velocity(t, z)?;
        let k2 = flow.velocity(t + C2 * h, z + h * (A21 * k1))?;
        let k3 = flow.velocity(t + C3 * h, z + h * (A31 * k1 + A32 * k2))?;
        let k4 = flow.velocity(t + C4 * h, z + h * (A41 * k1 + A42 * k2 + A43 * k3))?;
        let k5 = flow.velocity(
            t + C5 * h,
            z + h * (A51 * k1 + A52 * k2 + A53 * k3 + A54 * k4),
        )?;
        let k6 = flow.velocity(
            t + h,
            z + h * (A61 * k1 + A62 * k2 + A63 * k3 + A64 * k4 + A65 * k5),
        )?;
        self.stats.fn_evals += 6;

        let next = z + h * (B1 * k1 + B2 * k2 + B3 * k3 + B4 * k4 + B5 * k5 + B6 * k6);
        if !(next.re.is_finite() && next.im.is_finite()) {
            return Err(TrajectoryError::NonFiniteState { t: t + h });
        }
        Ok((next, [k1, k2, k3, k4, k5, k6]))
    }

    /// Advances `z` by exactly `h` (no step-size control, no statistics on acceptance).
    pub fn advance(
        &mut self,
        flow: &impl PlanarFlow,
        t: f64,
        z: Complex64,
        h: f64,
    ) -> Result<Complex64, TrajectoryError> {
        self.stages(flow, t, z, h).map(|(next, _)| next)
    }

    /// Attempts one step of size `h` (clamped to `[h_min, h_max]`) and reports
    /// whether it met the tolerances together with the suggested next step.
    /// A step whose stages hit a singular point of the flow is rejected with an
    /// infinite error rather than failing.
    pub fn step(
        &mut self,
        flow: &impl PlanarFlow,
        t: f64,
        z: Complex64,
        h: f64,
    ) -> Result<StepResult, TrajectoryError> {
        let h = h.clamp(self.h_min, self.h_max);
        let staged = self.stages(flow, t, z, h).and_then(|(next, slopes)| {
            let k7 = flow.velocity(t + h, next)?;
            Ok((next, slopes, k7))
        });
        let (next, [k1, k2, k3, k4, k5, k6], k7) = match staged {
            Ok(staged) => staged,
            // A stage landed on a zero or pole: retry from `z` with a shorter step.
            Err(TrajectoryError::SingularPoint { .. }) => {
                self.stats.rejected_steps += 1;
                return Ok(StepResult {
                    z,
                    t,
                    h,
                    error: f64::INFINITY,
                    h_next: (h * self.controller.min_factor).clamp(self.h_min, self.h_max),
                    accepted: false,
                });
            }
            Err(err) => return Err(err),
        };
        self.stats.fn_evals += 1;

        let estimate = h * (E1 * k1 + E2 * k2 + E3 * k3 + E4 * k4 + E5 * k5 + E6 * k6 + E7 * k7);
        let scale = self.atol + self.rtol * z.norm().max(next.norm());
        let error = ((estimate.re / scale).powi(2) + (estimate.im / scale).powi(2)).sqrt()
            / std::f64::consts::SQRT_2;
        if !error.is_finite() {
            return Err(TrajectoryError::NonFiniteState { t: t + h });
        }

        let accepted = error <= 1.0;
        let h_next = (h * self.controller.compute_factor(error)).clamp(self.h_min, self.h_max);
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        Ok(StepResult {
            z: next,
            t: t + h,
            h,
            error,
            h_next,
            accepted,
        })
    }
}
