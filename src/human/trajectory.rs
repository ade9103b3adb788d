//! Pointer trajectory synthesis
//!
//! Real pointers never travel in straight lines. A trajectory is a cubic
//! Bézier curve between two points whose control points are randomly pushed
//! off the straight line, sampled at a fixed cadence with per-sample jitter.

use rand::Rng;
use smallvec::SmallVec;

/// Screen point
pub type Point = (f64, f64);

/// Stack-allocated storage for typical pointer paths
pub type Trajectory = SmallVec<[Point; 64]>;

/// Maximum per-axis offset of a control point from the straight line
pub const MAX_CONTROL_OFFSET: f64 = 75.0;

/// Maximum per-axis jitter applied to sampled points
pub const MAX_JITTER: f64 = 1.5;

/// One sample per this many milliseconds of travel time
const SAMPLE_INTERVAL_MS: u64 = 20;

/// Synthesize a jittered pointer path from `start` to `end`.
///
/// Control points sit at 25% and 75% of the straight-line interpolation,
/// each axis offset by up to ±[`MAX_CONTROL_OFFSET`] px. The curve is
/// sampled roughly every 20ms of `duration_ms` and every sample gets up to
/// ±[`MAX_JITTER`] px of independent jitter, except the final point which
/// is exactly `end`.
pub fn bezier_path<R: Rng>(start: Point, end: Point, duration_ms: u64, rng: &mut R) -> Trajectory {
    let segments = (duration_ms / SAMPLE_INTERVAL_MS).max(1) as usize;

    let cp1 = (
        start.0 + (end.0 - start.0) * 0.25 + rng.gen_range(-MAX_CONTROL_OFFSET..=MAX_CONTROL_OFFSET),
        start.1 + (end.1 - start.1) * 0.25 + rng.gen_range(-MAX_CONTROL_OFFSET..=MAX_CONTROL_OFFSET),
    );
    let cp2 = (
        start.0 + (end.0 - start.0) * 0.75 + rng.gen_range(-MAX_CONTROL_OFFSET..=MAX_CONTROL_OFFSET),
        start.1 + (end.1 - start.1) * 0.75 + rng.gen_range(-MAX_CONTROL_OFFSET..=MAX_CONTROL_OFFSET),
    );

    let mut points = Trajectory::new();
    for i in 0..=segments {
        if i == segments {
            // Always terminate exactly on the target.
            points.push(end);
            break;
        }

        let t = i as f64 / segments as f64;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * start.0 + 3.0 * mt2 * t * cp1.0 + 3.0 * mt * t2 * cp2.0 + t3 * end.0;
        let y = mt3 * start.1 + 3.0 * mt2 * t * cp1.1 + 3.0 * mt * t2 * cp2.1 + t3 * end.1;

        points.push((
            x + rng.gen_range(-MAX_JITTER..=MAX_JITTER),
            y + rng.gen_range(-MAX_JITTER..=MAX_JITTER),
        ));
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_terminates_exactly_at_end() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let path = bezier_path((10.0, 20.0), (640.0, 400.0), 800, &mut rng);
            assert_eq!(*path.last().unwrap(), (640.0, 400.0));
        }
    }

    #[test]
    fn test_point_count_scales_with_duration() {
        let mut rng = StdRng::seed_from_u64(7);
        let short = bezier_path((0.0, 0.0), (100.0, 100.0), 400, &mut rng);
        let long = bezier_path((0.0, 0.0), (100.0, 100.0), 800, &mut rng);
        assert_eq!(short.len(), 21); // 400 / 20 segments + endpoint
        assert_eq!(long.len(), 41);
    }

    #[test]
    fn test_minimum_two_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let path = bezier_path((0.0, 0.0), (5.0, 5.0), 0, &mut rng);
        assert_eq!(path.len(), 2);
        assert_eq!(*path.last().unwrap(), (5.0, 5.0));
    }

    #[test]
    fn test_points_stay_within_expanded_bounding_box() {
        let mut rng = StdRng::seed_from_u64(42);
        let start = (50.0, 75.0);
        let end = (700.0, 500.0);
        let slack = MAX_CONTROL_OFFSET + MAX_JITTER;

        for _ in 0..50 {
            let path = bezier_path(start, end, 1000, &mut rng);
            for (x, y) in path {
                assert!(x >= start.0.min(end.0) - slack && x <= start.0.max(end.0) + slack);
                assert!(y >= start.1.min(end.1) - slack && y <= start.1.max(end.1) + slack);
            }
        }
    }

    #[test]
    fn test_deterministic_under_seed() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        let path_a = bezier_path((1.0, 2.0), (300.0, 200.0), 600, &mut a);
        let path_b = bezier_path((1.0, 2.0), (300.0, 200.0), 600, &mut b);
        assert_eq!(path_a, path_b);
    }
}
