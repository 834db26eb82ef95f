//! One-directional integration of the horizontal-trajectory ODE.
//!
//! The ray solves `dz/dt = sign · scale · branch · sqrt(conj(q(z)))` for the unit
//! field value `q`, stopping at the first terminal event or at `max_time`.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TrajectoryError;
use crate::events::{bisect_trigger, EventSet, Termination};
use crate::field::{unit, FieldStrategy};
use crate::monodromy::{branch_sqrt, MonodromyState};
use crate::params::IntegrationParameters;
use crate::solvers::{IntegrationStats, Tsit5};
use crate::traits::{PlanarFlow, QuadraticDifferential};

const EVENT_TIME_TOL: f64 = 1e-10;
const EVENT_BISECT_ITERS: usize = 64;

/// Direction of travel along the trajectory from its start point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

/// Samples of one integrated ray. `points[0]` is the start point and
/// `times[i]` is the integration parameter at `points[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub points: Vec<Complex64>,
    pub times: Vec<f64>,
    pub termination: Termination,
    pub stats: IntegrationStats,
}

impl Ray {
    pub fn final_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

struct RayFlow<'a, F: QuadraticDifferential + ?Sized> {
    field: &'a F,
    strategy: FieldStrategy,
    phase: Complex64,
    sign: f64,
    params: &'a IntegrationParameters,
    monodromy: MonodromyState,
}

impl<'a, F: QuadraticDifferential + ?Sized> PlanarFlow for RayFlow<'a, F> {
    fn velocity(&self, _t: f64, z: Complex64) -> Result<Complex64, TrajectoryError> {
        let value = self.strategy.value(self.field, z, self.phase)?;
        let branch = self.monodromy.observe(value);
        let mut velocity = branch_sqrt(value, branch) * (self.sign * self.params.velocity_scale);
        // Keeps angular progress roughly uniform near the domain boundary.
        let radius = z.norm();
        if radius > self.params.domain_radius / 3.0 {
            velocity *= radius;
        }
        Ok(velocity)
    }
}

/// `None` when a fixed step ran into a singular point of the flow.
fn regular(
    advanced: Result<Complex64, TrajectoryError>,
) -> Result<Option<Complex64>, TrajectoryError> {
    match advanced {
        Ok(z) => Ok(Some(z)),
        Err(TrajectoryError::SingularPoint { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Integrates one signed direction of the trajectory through `start`.
pub fn integrate_ray<F: QuadraticDifferential + ?Sized>(
    field: &F,
    strategy: FieldStrategy,
    start: Complex64,
    phase: Complex64,
    direction: Direction,
    params: &IntegrationParameters,
) -> Result<Ray, TrajectoryError> {
    params.validate().map_err(|err| {
        warn!(error = %err, "rejected integration parameters");
        err
    })?;
    let phase = unit(phase).ok_or(TrajectoryError::InvalidParameter {
        name: "phase",
        value: phase.norm(),
    })?;
    if !(start.re.is_finite() && start.im.is_finite()) {
        return Err(TrajectoryError::NonFiniteState { t: 0.0 });
    }
    let initial = strategy.value(field, start, phase).map_err(|err| {
        warn!(start = %start, "cannot integrate from a singular point");
        err
    })?;

    let mut flow = RayFlow {
        field,
        strategy,
        phase,
        sign: direction.sign(),
        params,
        monodromy: MonodromyState::new(initial),
    };
    let events = EventSet::new(field, start, params);
    let mut stepper = Tsit5::new(params.atol, params.rtol, params.min_step, params.max_step);

    let mut points = vec![start];
    let mut times = vec![0.0];
    let mut t = 0.0;
    let mut z = start;
    let mut h = stepper.h_max();

    let termination = match events.triggered(t, z) {
        Some(event) => event,
        None => loop {
            let remaining = params.max_time - t;
            if remaining <= stepper.h_min() {
                break Termination::TimeExhausted;
            }

            let result = stepper.step(&flow, t, z, h.min(remaining))?;
            h = result.h_next;
            if !result.accepted {
                if result.h <= stepper.h_min() {
                    return Err(TrajectoryError::StepSizeTooSmall { t, h: result.h });
                }
                continue;
            }

            if let Some(fired) = events.triggered(result.t, result.z) {
                // Probes that touch a singularity are already past every proximity event.
                let step = bisect_trigger(result.h, EVENT_TIME_TOL, EVENT_BISECT_ITERS, |s| {
                    let trial = regular(stepper.advance(&flow, t, z, s))?;
                    Ok::<f64, TrajectoryError>(
                        trial.map_or(f64::NEG_INFINITY, |trial| events.min_distance(t + s, trial)),
                    )
                })?;
                let located = if step < result.h {
                    regular(stepper.advance(&flow, t, z, step))?.map(|z_event| (t + step, z_event))
                } else {
                    None
                };
                let (t_event, z_event) = located.unwrap_or((result.t, result.z));
                points.push(z_event);
                times.push(t_event);
                break events.triggered(t_event, z_event).unwrap_or(fired);
            }

            let value = strategy.value(field, result.z, phase)?;
            flow.monodromy.update(value);
            t = result.t;
            z = result.z;
            points.push(z);
            times.push(t);
        },
    };

    let stats = stepper.stats();
    debug!(
        direction = ?direction,
        termination = ?termination,
        samples = points.len(),
        t_final = times.last().copied().unwrap_or(0.0),
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        "ray finished"
    );

    Ok(Ray {
        points,
        times,
        termination,
        stats,
    })
}
