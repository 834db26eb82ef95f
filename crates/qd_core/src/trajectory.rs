//! The trajectory value type and its geometric operations.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::TrajectoryError;

/// Tolerance used by `intersects` when asked to simplify both curves first.
pub const DEFAULT_SIMPLIFY_DISTANCE: f64 = 1e-3;
/// Minimum spacing used by `intersects` when asked to simplify both curves first.
pub const DEFAULT_SIMPLIFY_MIN_DISTANCE: f64 = 1e-4;
/// Default radius for `converges`.
pub const DEFAULT_CONVERGENCE_DISTANCE: f64 = 0.05;

const DEGENERATE_EPS: f64 = 1e-15;

/// An ordered, non-empty path in the complex plane, optionally anchored at the
/// basepoint it was grown from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    points: Vec<Complex64>,
    basepoint: Option<Complex64>,
}

/// Unchecked wire form; deserialization goes through `from_points`.
#[derive(Deserialize)]
struct RawTrajectory {
    points: Vec<Complex64>,
    #[serde(default)]
    basepoint: Option<Complex64>,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = TrajectoryError;

    fn try_from(raw: RawTrajectory) -> Result<Self, Self::Error> {
        let trajectory = Self::from_points(raw.points)?;
        Ok(match raw.basepoint {
            Some(basepoint) => trajectory.with_basepoint(basepoint),
            None => trajectory,
        })
    }
}

impl Trajectory {
    pub fn from_points(points: Vec<Complex64>) -> Result<Self, TrajectoryError> {
        if points.is_empty() {
            return Err(TrajectoryError::EmptyTrajectory);
        }
        Ok(Self {
            points,
            basepoint: None,
        })
    }

    pub fn with_basepoint(mut self, basepoint: Complex64) -> Self {
        self.basepoint = Some(basepoint);
        self
    }

    pub fn points(&self) -> &[Complex64] {
        &self.points
    }

    pub fn basepoint(&self) -> Option<Complex64> {
        self.basepoint
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Complex64 {
        self.points[0]
    }

    pub fn last(&self) -> Complex64 {
        self.points[self.points.len() - 1]
    }

    /// Total polyline length.
    pub fn arc_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).norm())
            .sum()
    }

    /// Same path walked in the opposite order; the basepoint is kept.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self {
            points,
            basepoint: self.basepoint,
        }
    }

    /// Coarser polyline: points closer than `min_distance` to the previously
    /// kept point are merged away, then Douglas-Peucker removes every point
    /// whose deviation from the retained chord is within `distance_to_line`.
    /// Endpoints are always kept and the output is a subsequence of the input.
    pub fn simplify(&self, distance_to_line: f64, min_distance: f64) -> Self {
        let merged = merge_close_points(&self.points, min_distance);
        let points = if distance_to_line > 0.0 && merged.len() > 2 {
            douglas_peucker(&merged, distance_to_line)
        } else {
            merged
        };
        Self {
            points,
            basepoint: self.basepoint,
        }
    }

    /// Resamples the path so consecutive points are at most `max_distance`
    /// apart. Each long segment is walked from its start in steps of exactly
    /// `max_distance` and then closed with its own endpoint, so the final
    /// sub-step of a segment is whatever remains (at most `max_distance`, and
    /// possibly a sliver when the length is a near-multiple of the step).
    /// Coincident consecutive points are deduplicated.
    pub fn refine(&self, max_distance: f64) -> Vec<Complex64> {
        if !(max_distance > 0.0 && max_distance.is_finite()) {
            return self.points.clone();
        }
        let mut out = Vec::with_capacity(self.points.len());
        out.push(self.points[0]);
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = (b - a).norm();
            if length <= DEGENERATE_EPS {
                continue;
            }
            if length > max_distance {
                let direction = (b - a) / length;
                let mut k = 1.0;
                while k * max_distance < length {
                    out.push(a + direction * (k * max_distance));
                    k += 1.0;
                }
            }
            out.push(b);
        }
        out
    }

    /// Whether any segment of `self` crosses any segment of `other`. With
    /// `simplify`, both curves are first simplified with the default tolerances.
    pub fn intersects(&self, other: &Trajectory, simplify: bool) -> bool {
        if simplify {
            let lhs = self.simplify(DEFAULT_SIMPLIFY_DISTANCE, DEFAULT_SIMPLIFY_MIN_DISTANCE);
            let rhs = other.simplify(DEFAULT_SIMPLIFY_DISTANCE, DEFAULT_SIMPLIFY_MIN_DISTANCE);
            return polylines_intersect(&lhs.points, &rhs.points);
        }
        polylines_intersect(&self.points, &other.points)
    }

    /// True when either endpoint lies within `distance_to_limit`
    /// (default `DEFAULT_CONVERGENCE_DISTANCE`) of `point`.
    pub fn converges(&self, point: Complex64, distance_to_limit: Option<f64>) -> bool {
        let limit = distance_to_limit.unwrap_or(DEFAULT_CONVERGENCE_DISTANCE);
        (self.first() - point).norm() <= limit || (self.last() - point).norm() <= limit
    }
}

fn polylines_intersect(lhs: &[Complex64], rhs: &[Complex64]) -> bool {
    lhs.windows(2).any(|segment| {
        rhs.windows(2)
            .any(|other| segments_cross(segment[0], segment[1], other[0], other[1]))
    })
}

/// Maps `(w1, w2)` into the frame where `z1 -> 0`, `z2 -> 1`; the segments cross
/// when the images straddle the real axis at a parameter in `[0, 1]`.
fn segments_cross(z1: Complex64, z2: Complex64, w1: Complex64, w2: Complex64) -> bool {
    let span = z2 - z1;
    if span.norm() <= DEGENERATE_EPS {
        return false;
    }
    let t1 = (w2 - z1) / span;
    let t2 = (w1 - z1) / span;
    if t1.im * t2.im > 0.0 {
        return false;
    }
    let crossing = (t2.im * t1.re - t1.im * t2.re) / (t2.im - t1.im);
    (0.0..=1.0).contains(&crossing)
}

fn merge_close_points(points: &[Complex64], min_distance: f64) -> Vec<Complex64> {
    if points.len() <= 2 || !(min_distance > 0.0) {
        return points.to_vec();
    }
    let last = points[points.len() - 1];
    let mut kept = vec![points[0]];
    for &point in &points[1..points.len() - 1] {
        let previous = kept[kept.len() - 1];
        if (point - previous).norm() >= min_distance && (last - point).norm() >= min_distance {
            kept.push(point);
        }
    }
    kept.push(last);
    kept
}

fn douglas_peucker(points: &[Complex64], tolerance: f64) -> Vec<Complex64> {
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }
        let mut worst = first;
        let mut worst_distance = 0.0;
        for index in first + 1..last {
            let distance = distance_to_segment(points[index], points[first], points[last]);
            if distance > worst_distance {
                worst = index;
                worst_distance = distance;
            }
        }
        if worst_distance > tolerance {
            keep[worst] = true;
            stack.push((first, worst));
            stack.push((worst, last));
        }
    }
    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

fn distance_to_segment(point: Complex64, a: Complex64, b: Complex64) -> f64 {
    let span = b - a;
    let length_sq = span.norm_sqr();
    if length_sq <= DEGENERATE_EPS * DEGENERATE_EPS {
        return (point - a).norm();
    }
    let offset = point - a;
    let s = ((offset.re * span.re + offset.im * span.im) / length_sq).clamp(0.0, 1.0);
    (point - (a + span * s)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn path(points: &[(f64, f64)]) -> Trajectory {
        Trajectory::from_points(points.iter().map(|&(re, im)| c(re, im)).collect())
            .expect("non-empty path")
    }

    fn assert_close(actual: &[Complex64], expected: &[Complex64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).norm() < 1e-12, "{a} vs {e}");
        }
    }

    #[test]
    fn empty_trajectories_are_rejected() {
        assert_eq!(
            Trajectory::from_points(Vec::new()),
            Err(TrajectoryError::EmptyTrajectory)
        );
    }

    #[test]
    fn deserialization_rejects_empty_paths() {
        let err = serde_json::from_str::<Trajectory>(r#"{ "points": [], "basepoint": null }"#)
            .expect_err("empty path must not deserialize");
        assert!(err.to_string().contains("at least one point"), "{err}");

        let json = r#"{ "points": [[0.0, 0.0], [1.0, 0.0]], "basepoint": [0.5, 0.0] }"#;
        let traj: Trajectory = serde_json::from_str(json).expect("valid path");
        assert_eq!(traj.len(), 2);
        assert_eq!(traj.basepoint(), Some(c(0.5, 0.0)));
        assert!(traj.converges(c(1.0, 0.0), None));

        let encoded = serde_json::to_string(&traj).expect("serialize");
        let decoded: Trajectory = serde_json::from_str(&encoded).expect("parse");
        assert_eq!(decoded, traj);
    }

    #[test]
    fn accessors_and_reversal() {
        let traj = path(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]).with_basepoint(c(3.0, 0.0));
        assert_eq!(traj.len(), 3);
        assert!(!traj.is_empty());
        assert_eq!(traj.first(), c(0.0, 0.0));
        assert_eq!(traj.last(), c(3.0, 4.0));
        assert!((traj.arc_length() - 7.0).abs() < 1e-12);
        let reversed = traj.reversed();
        assert_eq!(reversed.first(), c(3.0, 4.0));
        assert_eq!(reversed.basepoint(), Some(c(3.0, 0.0)));
    }

    #[test]
    fn refine_splits_long_segments_into_unit_steps() {
        let refined = path(&[(0.0, 0.0), (4.0, 0.0)]).refine(1.0);
        assert_close(
            &refined,
            &[c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0), c(4.0, 0.0)],
        );
    }

    #[test]
    fn refine_closes_each_segment_with_its_remainder() {
        let refined = path(&[(0.0, 0.0), (0.0, 2.5), (0.5, 2.5)]).refine(1.0);
        assert_close(
            &refined,
            &[c(0.0, 0.0), c(0.0, 1.0), c(0.0, 2.0), c(0.0, 2.5), c(0.5, 2.5)],
        );
        for pair in refined.windows(2) {
            assert!((pair[1] - pair[0]).norm() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn refine_skips_coincident_points() {
        let refined = path(&[(0.0, 0.0), (0.0, 0.0), (2.0, 0.0), (2.0, 0.0)]).refine(1.0);
        assert_close(&refined, &[c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)]);
        assert!(refined.iter().all(|p| p.re.is_finite() && p.im.is_finite()));
    }

    #[test]
    fn refine_with_non_positive_step_returns_the_input() {
        let traj = path(&[(0.0, 0.0), (4.0, 0.0)]);
        assert_eq!(traj.refine(0.0), traj.points().to_vec());
    }

    #[test]
    fn crossing_lines_intersect() {
        let horizontal = path(&[(-1.0, 0.0), (1.0, 0.0)]);
        let vertical = path(&[(0.0, -1.0), (0.0, 1.0)]);
        assert!(horizontal.intersects(&vertical, false));
        assert!(vertical.intersects(&horizontal, false));
        assert!(horizontal.intersects(&vertical, true));
    }

    #[test]
    fn disjoint_and_parallel_segments_do_not_intersect() {
        let a = path(&[(-1.0, 0.0), (1.0, 0.0)]);
        let above = path(&[(-1.0, 1.0), (1.0, 1.0)]);
        let beside = path(&[(2.0, -1.0), (2.0, 1.0)]);
        assert!(!a.intersects(&above, false));
        assert!(!a.intersects(&beside, false));
        assert!(!beside.intersects(&a, false));
    }

    #[test]
    fn intersection_is_symmetric_on_polylines() {
        let zigzag = path(&[(0.0, 0.0), (1.0, 1.0), (2.0, -1.0), (3.0, 1.0), (4.0, 0.0)]);
        let candidates = [
            path(&[(0.5, -2.0), (0.7, 2.0)]),
            path(&[(-1.0, 3.0), (5.0, 3.0)]),
            path(&[(1.5, 0.2), (2.5, 0.3), (3.6, -0.9)]),
            path(&[(10.0, 10.0)]),
        ];
        for other in &candidates {
            assert_eq!(zigzag.intersects(other, false), other.intersects(&zigzag, false));
        }
        assert!(zigzag.intersects(&candidates[0], false));
        assert!(!zigzag.intersects(&candidates[1], false));
        assert!(zigzag.intersects(&candidates[2], false));
        assert!(!zigzag.intersects(&candidates[3], false));
    }

    #[test]
    fn converges_checks_both_endpoints() {
        let traj = path(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(traj.converges(c(0.0, 0.05), Some(0.1)));
        assert!(traj.converges(c(2.05, 0.0), Some(0.1)));
        assert!(!traj.converges(c(1.0, 0.0), Some(0.1)));
        assert!(traj.converges(c(2.0, 0.04), None));
        assert!(!traj.converges(c(2.0, 0.06), None));
    }

    #[test]
    fn simplify_keeps_endpoints_and_bounds_deviation() {
        let points: Vec<Complex64> = (0..=100)
            .map(|i| {
                let x = i as f64 / 100.0;
                c(x, 0.01 * (10.0 * x).sin())
            })
            .collect();
        let traj = Trajectory::from_points(points.clone())
            .expect("path")
            .with_basepoint(c(0.5, 0.0));
        let simplified = traj.simplify(0.02, 0.0);

        assert_eq!(simplified.first(), traj.first());
        assert_eq!(simplified.last(), traj.last());
        assert_eq!(simplified.basepoint(), Some(c(0.5, 0.0)));
        assert!(simplified.len() < traj.len());

        let mut cursor = 0;
        for kept in simplified.points() {
            cursor += points[cursor..]
                .iter()
                .position(|p| p == kept)
                .expect("simplified points form a subsequence");
        }
        for point in &points {
            let deviation = simplified
                .points()
                .windows(2)
                .map(|pair| distance_to_segment(*point, pair[0], pair[1]))
                .fold(f64::INFINITY, f64::min);
            assert!(deviation <= 0.02 + 1e-12);
        }
    }

    #[test]
    fn simplify_merges_points_closer_than_min_distance() {
        let traj = path(&[(0.0, 0.0), (0.001, 0.0), (0.5, 0.5), (0.501, 0.5), (1.0, 0.0)]);
        let simplified = traj.simplify(0.0, 0.01);
        assert_close(simplified.points(), &[c(0.0, 0.0), c(0.5, 0.5), c(1.0, 0.0)]);
    }

    #[test]
    fn simplify_keeps_short_paths_intact() {
        let single = path(&[(1.0, 1.0)]);
        assert_eq!(single.simplify(0.1, 0.1).points(), single.points());
        let pair = path(&[(0.0, 0.0), (0.0, 0.0)]);
        assert_eq!(pair.simplify(0.1, 0.1).len(), 2);
    }
}
