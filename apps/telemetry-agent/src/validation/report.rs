//! Validation outcome/report shape, ported from `lap_validator.py`'s
//! `ValidationResult` enum and `ValidationReport` dataclass.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    InsufficientData,
    DurationOutOfBounds,
    InvalidPositions,
    DataGaps,
    SpeedOutliers,
    InsufficientDistanceCoverage,
    IncompleteData,
    /// The lap began or ended entirely inside pit/garage exclusion (spec
    /// §3/§4.4): no physics sample was ever recorded for it.
    InvalidPit,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub invalid_position_pct: f32,
    pub outlier_pct: f32,
    pub incomplete_data_pct: f32,
    pub max_gap_s: f64,
    pub distance_coverage_pct: f32,
}

impl ValidationReport {
    pub fn failed(outcome: ValidationOutcome) -> Self {
        Self {
            outcome,
            invalid_position_pct: 0.0,
            outlier_pct: 0.0,
            incomplete_data_pct: 0.0,
            max_gap_s: 0.0,
            distance_coverage_pct: 0.0,
        }
    }

    /// Rules 3-7 all ran to completion; pick the first-in-spec-order
    /// failure as the outcome (if any), while still reporting every rule's
    /// measured statistic.
    pub fn from_bundle(
        position: super::rules::PositionCheck,
        gaps: super::rules::GapCheck,
        outliers: super::rules::OutlierCheck,
        distance: super::rules::DistanceCheck,
        completeness: super::rules::CompletenessCheck,
    ) -> Self {
        let outcome = if !position.passed {
            ValidationOutcome::InvalidPositions
        } else if !gaps.passed {
            ValidationOutcome::DataGaps
        } else if !outliers.passed {
            ValidationOutcome::SpeedOutliers
        } else if !distance.passed {
            ValidationOutcome::InsufficientDistanceCoverage
        } else if !completeness.passed {
            ValidationOutcome::IncompleteData
        } else {
            ValidationOutcome::Valid
        };

        Self {
            outcome,
            invalid_position_pct: position.invalid_pct,
            outlier_pct: outliers.outlier_pct,
            incomplete_data_pct: completeness.incomplete_pct,
            max_gap_s: gaps.max_gap_s,
            distance_coverage_pct: distance.coverage_pct,
        }
    }
}
