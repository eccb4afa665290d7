//! Per-pixel sampling diagnostics
//!
//! Scale sampling may fail at individual pixels (outside the projection's
//! domain, at a pole, numerical trouble). Such failures never abort a run:
//! the pixel is skipped and the failure is tallied here. Only the first
//! [`MAX_REPORTED_SAMPLE_ERRORS`] failures are kept for reporting.

use std::fmt;

/// Number of individual failures kept for reporting
pub const MAX_REPORTED_SAMPLE_ERRORS: usize = 1000;

/// Scale factors could not be obtained at one pixel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFailure {
    /// Projected x of the pixel centre
    pub x: f64,
    /// Projected y of the pixel centre
    pub y: f64,
    /// What went wrong
    pub reason: String,
}

impl SampleFailure {
    pub fn new(x: f64, y: f64, reason: impl Into<String>) -> Self {
        Self {
            x,
            y,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failure to get scaling factor for {:.2}/{:.2}: {}",
            self.x, self.y, self.reason
        )
    }
}

/// Tally of sampling failures over a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleErrors {
    total: usize,
    reported: Vec<SampleFailure>,
}

impl SampleErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a failure, keeping it while under the reporting cap
    pub fn record(&mut self, failure: SampleFailure) {
        self.total += 1;
        if self.reported.len() < MAX_REPORTED_SAMPLE_ERRORS {
            self.reported.push(failure);
        }
    }

    /// Append another tally; call in row order to keep reports ordered
    pub fn merge(&mut self, other: SampleErrors) {
        self.total += other.total;
        let room = MAX_REPORTED_SAMPLE_ERRORS.saturating_sub(self.reported.len());
        self.reported.extend(other.reported.into_iter().take(room));
    }

    /// Total number of failures, reported or not
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The failures kept for reporting, in scan order
    pub fn reported(&self) -> &[SampleFailure] {
        &self.reported
    }

    /// Whether failures were dropped because the cap was reached
    pub fn suppressed(&self) -> bool {
        self.total > MAX_REPORTED_SAMPLE_ERRORS
    }
}

/// Running minimum and maximum of a scale quantity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl ScaleRange {
    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: ScaleRange) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// No value was ever included
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_keeps_first_failures() {
        let mut errors = SampleErrors::new();
        for i in 0..MAX_REPORTED_SAMPLE_ERRORS + 5 {
            errors.record(SampleFailure::new(i as f64, 0.0, "out of range"));
        }
        assert_eq!(errors.total(), MAX_REPORTED_SAMPLE_ERRORS + 5);
        assert_eq!(errors.reported().len(), MAX_REPORTED_SAMPLE_ERRORS);
        assert_eq!(errors.reported()[0].x, 0.0);
        assert!(errors.suppressed());
    }

    #[test]
    fn merge_respects_cap_and_order() {
        let mut a = SampleErrors::new();
        for i in 0..MAX_REPORTED_SAMPLE_ERRORS - 1 {
            a.record(SampleFailure::new(i as f64, 0.0, "a"));
        }
        let mut b = SampleErrors::new();
        b.record(SampleFailure::new(-1.0, 1.0, "b"));
        b.record(SampleFailure::new(-2.0, 2.0, "b"));

        a.merge(b);
        assert_eq!(a.total(), MAX_REPORTED_SAMPLE_ERRORS + 1);
        assert_eq!(a.reported().len(), MAX_REPORTED_SAMPLE_ERRORS);
        assert_eq!(a.reported().last().unwrap().x, -1.0);
    }

    #[test]
    fn failure_message() {
        let f = SampleFailure::new(1234.567, -89.001, "latitude too close to the pole");
        assert_eq!(
            f.to_string(),
            "failure to get scaling factor for 1234.57/-89.00: latitude too close to the pole"
        );
    }

    #[test]
    fn range_tracks_extremes() {
        let mut range = ScaleRange::default();
        assert!(range.is_empty());
        range.include(1.5);
        range.include(0.5);
        let mut other = ScaleRange::default();
        other.include(4.0);
        range.merge(other);
        assert_eq!(range, ScaleRange { min: 0.5, max: 4.0 });
        range.merge(ScaleRange::default());
        assert_eq!(range.max, 4.0);
    }
}
