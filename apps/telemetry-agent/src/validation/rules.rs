//! Individual validation rules, ported from `lap_validator.py`'s
//! `_validate_*` methods. Rules 1-2 return `Option<ValidationOutcome>` (used
//! by `validate_lap` to short-circuit); rules 3-7 return a small result
//! struct carrying both the pass/fail verdict and the measured statistic, so
//! the caller can build a full report even when an earlier-in-order rule has
//! already failed.

use super::{ValidationConfig, ValidationOutcome};
use crate::model::ClosedLap;

pub(crate) fn check_sufficiency(lap: &ClosedLap, config: &ValidationConfig) -> Option<ValidationOutcome> {
    (lap.physics.len() < config.min_points).then_some(ValidationOutcome::InsufficientData)
}

pub(crate) fn check_duration(lap: &ClosedLap, config: &ValidationConfig) -> Option<ValidationOutcome> {
    (lap.lap_time_s < config.min_lap_time_s || lap.lap_time_s > config.max_lap_time_s)
        .then_some(ValidationOutcome::DurationOutOfBounds)
}

pub(crate) struct PositionCheck {
    pub passed: bool,
    pub invalid_pct: f32,
}

/// A position is invalid if it sits at the origin or beyond 1e6 units on any
/// axis — exact match to `utils.py`'s `is_valid_position`. A lap fails once
/// more than 5% of its points are invalid.
pub(crate) fn check_positions(lap: &ClosedLap, _config: &ValidationConfig) -> PositionCheck {
    const MAX_COORD: f32 = 1_000_000.0;
    let total = lap.physics.len().max(1);
    let invalid = lap
        .physics
        .iter()
        .filter(|p| {
            let origin = p.position_x == 0.0 && p.position_y == 0.0 && p.position_z == 0.0;
            let extreme = p.position_x.abs() > MAX_COORD
                || p.position_y.abs() > MAX_COORD
                || p.position_z.abs() > MAX_COORD;
            origin || extreme
        })
        .count();
    let invalid_pct = invalid as f32 / total as f32 * 100.0;
    PositionCheck {
        passed: invalid_pct <= 5.0,
        invalid_pct,
    }
}

pub(crate) struct GapCheck {
    pub passed: bool,
    pub max_gap_s: f64,
}

pub(crate) fn check_gaps(lap: &ClosedLap, config: &ValidationConfig) -> GapCheck {
    let max_gap_s = lap
        .physics
        .windows(2)
        .map(|w| w[1].session_time - w[0].session_time)
        .fold(0.0_f64, f64::max);
    GapCheck {
        passed: max_gap_s <= config.max_gap_s,
        max_gap_s,
    }
}

pub(crate) struct OutlierCheck {
    pub passed: bool,
    pub outlier_pct: f32,
}

/// A speed sample is an outlier if it is both more than 2.5 standard
/// deviations from the lap's mean speed *and* exceeds the fixed
/// `speed_outlier_threshold_kmh` — matching `utils.py`'s `detect_outliers`
/// combined with the fixed-threshold check in `lap_validator.py`. A lap
/// fails once more than 10% of its points are outliers.
pub(crate) fn check_outliers(lap: &ClosedLap, config: &ValidationConfig) -> OutlierCheck {
    let speeds: Vec<f32> = lap.physics.iter().map(|p| p.speed_kmh).collect();
    if speeds.len() < 3 {
        return OutlierCheck {
            passed: true,
            outlier_pct: 0.0,
        };
    }
    let mean = speeds.iter().sum::<f32>() / speeds.len() as f32;
    let variance = speeds.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / speeds.len() as f32;
    let std_dev = variance.sqrt();

    let outliers = speeds
        .iter()
        .filter(|&&s| (s - mean).abs() > 2.5 * std_dev && s > config.speed_outlier_threshold_kmh)
        .count();
    let outlier_pct = outliers as f32 / speeds.len() as f32 * 100.0;
    OutlierCheck {
        passed: outlier_pct <= 10.0,
        outlier_pct,
    }
}

pub(crate) struct DistanceCheck {
    pub passed: bool,
    pub coverage_pct: f32,
}

/// No-op by default: the "estimated" track length defaults to the lap's own
/// integrated distance, so coverage is always 100% unless a real track
/// length is supplied elsewhere. This is an intentional hook, not dead code
/// — see spec §9 / DESIGN.md.
pub(crate) fn check_distance_coverage(lap: &ClosedLap, config: &ValidationConfig) -> DistanceCheck {
    let total_distance = lap.physics.last().map(|p| p.lap_distance).unwrap_or(0.0);
    let estimated = total_distance.max(1.0);
    let coverage_pct = (total_distance / estimated * 100.0).min(100.0);
    DistanceCheck {
        passed: coverage_pct >= config.min_distance_percentage,
        coverage_pct,
    }
}

pub(crate) struct CompletenessCheck {
    pub passed: bool,
    pub incomplete_pct: f32,
}

/// A point has incomplete data if throttle/brake/rpm/speed fall outside
/// plausible bounds, matching `utils.py`'s `is_valid_telemetry_value` used
/// across `lap_validator.py`'s completeness check. A lap fails once more
/// than 2% of its points are incomplete.
pub(crate) fn check_completeness(lap: &ClosedLap, _config: &ValidationConfig) -> CompletenessCheck {
    let total = lap.physics.len().max(1);
    let incomplete = lap
        .physics
        .iter()
        .filter(|p| {
            !(0.0..=1.0).contains(&p.throttle)
                || !(0.0..=1.0).contains(&p.brake)
                || !(0.0..=20000.0).contains(&p.rpm)
                || !(0.0..=500.0).contains(&p.speed_kmh)
        })
        .count();
    let incomplete_pct = incomplete as f32 / total as f32 * 100.0;
    CompletenessCheck {
        passed: incomplete_pct <= 2.0,
        incomplete_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockAdapter;
    use std::sync::Arc;
    use uuid::Uuid;

    fn lap_with_speeds(speeds: &[f32]) -> ClosedLap {
        let lap_id = Uuid::new_v4();
        let physics = speeds
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let mut p = MockAdapter::sample_physics(1, i as f64 * 0.1, i as f32 / speeds.len() as f32);
                p.speed_kmh = s;
                p
            })
            .collect();
        ClosedLap {
            lap_id,
            session_id: Uuid::new_v4(),
            lap_number: 1,
            lap_time_s: speeds.len() as f64 * 0.1,
            physics: Arc::new(physics),
            scoring: Arc::new(vec![]),
        }
    }

    #[test]
    fn flags_origin_positions_as_invalid() {
        let lap_id = Uuid::new_v4();
        let mut p1 = MockAdapter::sample_physics(1, 0.0, 0.0);
        p1.position_x = 0.0;
        p1.position_y = 0.0;
        p1.position_z = 0.0;
        let lap = ClosedLap {
            lap_id,
            session_id: Uuid::new_v4(),
            lap_number: 1,
            lap_time_s: 1.0,
            physics: Arc::new(vec![p1]),
            scoring: Arc::new(vec![]),
        };
        let check = check_positions(&lap, &ValidationConfig::default());
        assert_eq!(check.invalid_pct, 100.0);
        assert!(!check.passed);
    }

    #[test]
    fn outlier_check_passes_for_uniform_speeds() {
        let lap = lap_with_speeds(&[180.0; 100]);
        let check = check_outliers(&lap, &ValidationConfig::default());
        assert!(check.passed);
        assert_eq!(check.outlier_pct, 0.0);
    }

    #[test]
    fn completeness_flags_implausible_rpm() {
        let lap_id = Uuid::new_v4();
        let mut p = MockAdapter::sample_physics(1, 0.0, 0.0);
        p.rpm = -500.0;
        let lap = ClosedLap {
            lap_id,
            session_id: Uuid::new_v4(),
            lap_number: 1,
            lap_time_s: 1.0,
            physics: Arc::new(vec![p]),
            scoring: Arc::new(vec![]),
        };
        let check = check_completeness(&lap, &ValidationConfig::default());
        assert!(!check.passed);
    }
}
