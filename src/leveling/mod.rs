//! Channel level progression. One shared implementation: the same curve
//! backs the profile progress bar and the ranking engine's boost factor, so
//! the two can never disagree on a channel's level.

use serde::Serialize;

/// A channel's level together with the XP thresholds bounding it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub xp_at_level_start: u64,
    pub xp_at_level_end: u64,
    /// Position inside the current level, in [0, 1].
    pub progress: f64,
}

/// XP threshold curve: f(x) = floor(x^2 / 1000).
fn xp_threshold(x: u64) -> u64 {
    x * x / 1000
}

/// Maps accumulated boost points to a level and in-level progress.
///
/// level = floor(floor(sqrt(points * 1000)) / 1000), computed with integer
/// square root so the floors are exact for any point balance.
pub fn compute_level(boost_points: u64) -> LevelProgress {
    let level = (boost_points * 1000).isqrt() / 1000;

    let xp_at_level_start = xp_threshold(1000 * level);
    let xp_at_level_end = xp_threshold(1000 * (level + 1));

    // Thresholds collapse only in degenerate rounding cases; progress is 0
    // there by convention.
    let span = xp_at_level_end - xp_at_level_start;
    let progress = if span == 0 {
        0.0
    } else {
        ((boost_points - xp_at_level_start) as f64 / span as f64).clamp(0.0, 1.0)
    };

    LevelProgress {
        level: level as u32,
        xp_at_level_start,
        xp_at_level_end,
        progress,
    }
}

/// The ranking engine's boost factor: sqrt(1000 * points) / 1000. Continuous
/// counterpart of the level curve above.
pub fn boost_term(boost_points: u64) -> f64 {
    (1000.0 * boost_points as f64).sqrt() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_points_is_level_zero() {
        let p = compute_level(0);
        assert_eq!(p.level, 0);
        assert_eq!(p.xp_at_level_start, 0);
        assert_eq!(p.progress, 0.0);
    }

    #[test]
    fn million_points_is_level_31() {
        // floor(floor(sqrt(1_000_000_000)) / 1000) = floor(31622 / 1000)
        assert_eq!(compute_level(1_000_000).level, 31);
    }

    #[test]
    fn level_is_monotonic_in_points() {
        let mut last = 0;
        for points in (0..2_000_000).step_by(997) {
            let level = compute_level(points).level;
            assert!(level >= last, "level dropped at {points} points");
            last = level;
        }
    }

    #[test]
    fn progress_stays_in_unit_interval() {
        for points in (0..5_000_000).step_by(1013) {
            let p = compute_level(points);
            assert!((0.0..=1.0).contains(&p.progress), "bad progress at {points}");
        }
    }

    #[test]
    fn points_sit_between_level_thresholds() {
        for points in (0..1_000_000).step_by(4999) {
            let p = compute_level(points);
            assert!(p.xp_at_level_start <= points);
            assert!(points < p.xp_at_level_end || p.xp_at_level_end == p.xp_at_level_start);
        }
    }

    #[test]
    fn level_one_boundary() {
        // f(1000) = 1000, so 1000 points is exactly the start of level 1.
        let p = compute_level(1000);
        assert_eq!(p.level, 1);
        assert_eq!(p.xp_at_level_start, 1000);
        assert_eq!(p.xp_at_level_end, 4000);
        assert_eq!(p.progress, 0.0);

        let p = compute_level(999);
        assert_eq!(p.level, 0);
        assert!(p.progress > 0.9);
    }

    #[test]
    fn boost_term_matches_level_curve_at_thresholds() {
        // At x = f(1000 * level) the continuous term equals the level.
        for level in 1u64..20 {
            let points = 1000 * level * level;
            assert!((boost_term(points) - level as f64).abs() < 1e-9);
        }
    }
}
