//! Bidirectional trajectories and batch computation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TrajectoryError;
use crate::events::Termination;
use crate::field::FieldStrategy;
use crate::params::IntegrationParameters;
use crate::ray::{integrate_ray, Direction, Ray};
use crate::solvers::IntegrationStats;
use crate::trajectory::Trajectory;
use crate::traits::QuadraticDifferential;

/// Hashable identity of a batch job `(point, phase)`, compared bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    point: [u64; 2],
    phase: [u64; 2],
}

impl JobKey {
    pub fn new(point: Complex64, phase: Complex64) -> Self {
        Self {
            point: complex_bits(point),
            phase: complex_bits(phase),
        }
    }

    pub fn point(&self) -> Complex64 {
        complex_from_bits(self.point)
    }

    pub fn phase(&self) -> Complex64 {
        complex_from_bits(self.phase)
    }
}

fn complex_bits(value: Complex64) -> [u64; 2] {
    // `+ 0.0` folds -0.0 into 0.0 so both zeros share a key.
    [(value.re + 0.0).to_bits(), (value.im + 0.0).to_bits()]
}

fn complex_from_bits(bits: [u64; 2]) -> Complex64 {
    Complex64::new(f64::from_bits(bits[0]), f64::from_bits(bits[1]))
}

/// Summary of one of the two rays behind a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayReport {
    pub termination: Termination,
    pub final_time: f64,
    pub samples: usize,
    pub stats: IntegrationStats,
}

impl From<&Ray> for RayReport {
    fn from(ray: &Ray) -> Self {
        Self {
            termination: ray.termination,
            final_time: ray.final_time(),
            samples: ray.points.len(),
            stats: ray.stats,
        }
    }
}

/// A trajectory together with how each of its halves ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySolution {
    pub trajectory: Trajectory,
    pub forward: RayReport,
    pub backward: RayReport,
}

pub type BatchResults = HashMap<JobKey, Result<Trajectory, TrajectoryError>>;

/// Computes horizontal trajectories of one differential.
pub struct TrajectorySolver<'a, F: QuadraticDifferential + ?Sized> {
    field: &'a F,
    params: IntegrationParameters,
    strategy: FieldStrategy,
}

impl<'a, F: QuadraticDifferential + ?Sized> TrajectorySolver<'a, F> {
    pub fn new(field: &'a F) -> Self {
        Self {
            field,
            params: IntegrationParameters::default(),
            strategy: FieldStrategy::default(),
        }
    }

    pub fn with_parameters(mut self, params: IntegrationParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_strategy(mut self, strategy: FieldStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn parameters(&self) -> &IntegrationParameters {
        &self.params
    }

    pub fn strategy(&self) -> FieldStrategy {
        self.strategy
    }

    /// Bidirectional trajectory through `point`; `phase` defaults to the field's phase.
    pub fn calculate(
        &self,
        point: Complex64,
        phase: Option<Complex64>,
    ) -> Result<Trajectory, TrajectoryError> {
        self.calculate_detailed(point, phase).map(|solution| solution.trajectory)
    }

    /// Like `calculate`, also reporting how each ray terminated.
    pub fn calculate_detailed(
        &self,
        point: Complex64,
        phase: Option<Complex64>,
    ) -> Result<TrajectorySolution, TrajectoryError> {
        let phase = phase.unwrap_or_else(|| self.field.phase());
        let forward = self.ray(point, phase, Direction::Forward)?;
        let backward = self.ray(point, phase, Direction::Backward)?;

        let trajectory = Trajectory::from_points(merge_rays(&backward.points, &forward.points))?
            .with_basepoint(point);
        Ok(TrajectorySolution {
            trajectory,
            forward: RayReport::from(&forward),
            backward: RayReport::from(&backward),
        })
    }

    /// Computes every `(point, phase)` job independently on the rayon pool.
    /// A failing job is reported under its own key and never affects the others.
    pub fn batch_calculate(&self, jobs: &[(Complex64, Complex64)]) -> BatchResults {
        self.batch_calculate_with_progress(jobs, None)
    }

    /// `batch_calculate`, calling `on_progress(completed, total)` after each job finishes.
    pub fn batch_calculate_with_progress(
        &self,
        jobs: &[(Complex64, Complex64)],
        on_progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> BatchResults {
        let total = jobs.len();
        let completed = AtomicUsize::new(0);
        let results: BatchResults = jobs
            .par_iter()
            .map(|&(point, phase)| {
                let result = self.calculate(point, Some(phase));
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(progress) = on_progress {
                    progress(done, total);
                }
                (JobKey::new(point, phase), result)
            })
            .collect();

        let failures = results.values().filter(|result| result.is_err()).count();
        info!(jobs = total, unique = results.len(), failures, "batch finished");
        results
    }

    fn ray(
        &self,
        point: Complex64,
        phase: Complex64,
        direction: Direction,
    ) -> Result<Ray, TrajectoryError> {
        integrate_ray(
            self.field,
            self.strategy,
            point,
            phase,
            direction,
            &self.params,
        )
    }
}

/// Reversed backward ray followed by the forward ray, sharing the start sample once.
fn merge_rays(backward: &[Complex64], forward: &[Complex64]) -> Vec<Complex64> {
    let mut points = Vec::with_capacity(backward.len() + forward.len().saturating_sub(1));
    points.extend(backward.iter().rev());
    points.extend(forward.iter().skip(1));
    points
}
