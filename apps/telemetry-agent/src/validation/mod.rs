//! Lap Validator (spec §4.5) — a pure function run inline by the Lap
//! Lifecycle Manager against every closed lap. Ported rule-for-rule from
//! `original_source/.../lap_validator.py`'s `LapValidator`, with one
//! deliberate control-flow change: the spec short-circuits after rules 1-2
//! (sufficiency, duration) but evaluates rules 3-7 in full regardless of
//! earlier failures among them, whereas the Python original never
//! short-circuits at all. This module follows the spec.

mod report;
mod rules;

pub use report::{ValidationOutcome, ValidationReport};

use crate::model::ClosedLap;

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub min_points: usize,
    pub min_lap_time_s: f64,
    pub max_lap_time_s: f64,
    pub max_gap_s: f64,
    pub speed_outlier_threshold_kmh: f32,
    pub min_distance_percentage: f32,
}

/// Matches spec §4.5's stated defaults exactly — these are also the values
/// `Config::load()` falls back to when `validation.*` keys are absent, so
/// this impl and the real config path can never drift again.
impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_points: 100,
            min_lap_time_s: 30.0,
            max_lap_time_s: 300.0,
            max_gap_s: 2.0,
            speed_outlier_threshold_kmh: 400.0,
            min_distance_percentage: 80.0,
        }
    }
}

pub fn validate_lap(lap: &ClosedLap, config: &ValidationConfig) -> ValidationReport {
    if let Some(outcome) = rules::check_sufficiency(lap, config) {
        return ValidationReport::failed(outcome);
    }
    if let Some(outcome) = rules::check_duration(lap, config) {
        return ValidationReport::failed(outcome);
    }

    let position = rules::check_positions(lap, config);
    let gaps = rules::check_gaps(lap, config);
    let outliers = rules::check_outliers(lap, config);
    let distance = rules::check_distance_coverage(lap, config);
    let completeness = rules::check_completeness(lap, config);

    ValidationReport::from_bundle(position, gaps, outliers, distance, completeness)
}
