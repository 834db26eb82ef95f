pub mod error;
pub mod events;
pub mod field;
pub mod monodromy;
pub mod params;
pub mod ray;
pub mod solver;
pub mod solvers;
/// The `qd_core` crate computes horizontal trajectories of meromorphic quadratic
/// differentials: curves along which `q(z) dz²` is real and positive.
///
/// Key components:
/// - **Traits**: `QuadraticDifferential` (point evaluation and singularity queries),
///   `PlanarFlow` (ODE right-hand side).
/// - **Field**: `SingularField` and the `FieldStrategy` used to turn it into unit field values.
/// - **Monodromy**: continuous square-root branch tracking along a path.
/// - **Solvers**: adaptive Tsit5 stepper with embedded error control.
/// - **Ray / Solver**: one-directional rays with terminal events, merged into bidirectional
///   trajectories (single or batched).
/// - **Trajectory**: the resulting path with simplify / refine / intersects / converges.
pub mod traits;
pub mod trajectory;

pub use error::TrajectoryError;
pub use events::Termination;
pub use field::{phase_from_angle, FieldStrategy, SingularField};
pub use params::IntegrationParameters;
pub use solver::{BatchResults, JobKey, RayReport, TrajectorySolution, TrajectorySolver};
pub use traits::QuadraticDifferential;
pub use trajectory::Trajectory;
