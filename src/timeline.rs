//! Timeline alignment and step-function lookup.
//!
//! Every aggregation series is sampled independently. The chart needs one
//! shared x-axis and, per series, "the value in force at time t": the latest
//! point whose `start_time <= t`.

use serde::Serialize;
use std::fmt;

use crate::history::{AggregationSeries, ForecastHistoryPoint};

/// Value shown for a series at a cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CursorValue {
    Value(f64),
    Missing,
}

impl CursorValue {
    pub fn value(self) -> Option<f64> {
        match self {
            CursorValue::Value(v) => Some(v),
            CursorValue::Missing => None,
        }
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorValue::Value(v) => write!(f, "{}", v),
            CursorValue::Missing => f.write_str("?"),
        }
    }
}

/// Right edge of the chart: the actual close if it already happened, otherwise now.
pub fn boundary_timestamp(actual_close_time: Option<f64>, now: f64) -> f64 {
    match actual_close_time {
        Some(close) if close.is_finite() => close.min(now),
        _ => now,
    }
}

/// Union of all start/end times plus the boundary, sorted and deduplicated.
///
/// Returns an empty axis when no series contributes a timestamp.
pub fn align_timestamps(
    series: &[&AggregationSeries],
    actual_close_time: Option<f64>,
    now: f64,
) -> Vec<f64> {
    let mut axis: Vec<f64> = series
        .iter()
        .flat_map(|s| s.history.iter())
        .flat_map(|p| std::iter::once(p.start_time).chain(p.end_time))
        .filter(|t| t.is_finite())
        .collect();
    if axis.is_empty() {
        return axis;
    }
    let boundary = boundary_timestamp(actual_close_time, now);
    if boundary.is_finite() {
        axis.push(boundary);
    }
    axis.sort_by(f64::total_cmp);
    axis.dedup();
    axis
}

/// Piecewise-constant series: `values[i]` holds from `timestamps[i]` until the next timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSeries {
    timestamps: Vec<f64>,
    values: Vec<Option<f64>>,
    /// End of the last step; `None` while the last step is still open.
    end: Option<f64>,
}

impl StepSeries {
    /// `timestamps` must be sorted ascending and the same length as `values`.
    pub fn new(timestamps: Vec<f64>, values: Vec<Option<f64>>, end: Option<f64>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        debug_assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
        Self {
            timestamps,
            values,
            end,
        }
    }

    pub fn from_history<F>(history: &[ForecastHistoryPoint], pick: F) -> Self
    where
        F: Fn(&ForecastHistoryPoint) -> Option<f64>,
    {
        let timestamps = history.iter().map(|p| p.start_time).collect();
        let values = history.iter().map(&pick).collect();
        let end = history.last().and_then(|p| p.end_time);
        Self::new(timestamps, values, end)
    }

    pub fn centers(series: &AggregationSeries, option_index: usize) -> Self {
        Self::from_history(&series.history, |p| p.center(option_index))
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Index of the step in force at `cursor`, if any.
    pub fn index_at(&self, cursor: f64) -> Option<usize> {
        if cursor.is_nan() {
            return None;
        }
        let idx = self.timestamps.partition_point(|&t| t <= cursor);
        if idx == 0 {
            return None;
        }
        if idx == self.timestamps.len() {
            if let Some(end) = self.end {
                if cursor >= end {
                    return None;
                }
            }
        }
        Some(idx - 1)
    }

    pub fn at(&self, cursor: f64) -> CursorValue {
        match self.index_at(cursor).and_then(|i| self.values[i]) {
            Some(v) => CursorValue::Value(v),
            None => CursorValue::Missing,
        }
    }
}

/// One value per axis timestamp, ready for the chart library.
pub fn aligned_values(step: &StepSeries, axis: &[f64]) -> Vec<Option<f64>> {
    axis.iter().map(|&t| step.at(t).value()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AggregationMethod;

    fn point(start: f64, end: Option<f64>, center: f64) -> ForecastHistoryPoint {
        ForecastHistoryPoint {
            start_time: start,
            end_time: end,
            centers: vec![center],
            interval_lower_bounds: None,
            interval_upper_bounds: None,
            forecaster_count: 3,
        }
    }

    fn series(points: Vec<ForecastHistoryPoint>) -> AggregationSeries {
        AggregationSeries::new(AggregationMethod::RecencyWeighted, false, points)
    }

    #[test]
    fn lookup_matches_step_semantics() {
        let s = series(vec![point(100.0, None, 0.3), point(200.0, None, 0.5)]);
        let step = StepSeries::centers(&s, 0);
        assert_eq!(step.at(150.0), CursorValue::Value(0.3));
        assert_eq!(step.at(50.0), CursorValue::Missing);
        assert_eq!(step.at(250.0), CursorValue::Value(0.5));
        assert_eq!(step.at(50.0).to_string(), "?");
    }

    #[test]
    fn lookup_exact_start_time_takes_new_value() {
        let s = series(vec![point(100.0, Some(200.0), 0.3), point(200.0, Some(300.0), 0.5)]);
        let step = StepSeries::centers(&s, 0);
        assert_eq!(step.at(200.0), CursorValue::Value(0.5));
    }

    #[test]
    fn lookup_after_closed_last_step_is_missing() {
        let s = series(vec![point(100.0, Some(200.0), 0.3), point(200.0, Some(300.0), 0.5)]);
        let step = StepSeries::centers(&s, 0);
        assert_eq!(step.at(299.0), CursorValue::Value(0.5));
        assert_eq!(step.at(300.0), CursorValue::Missing);
    }

    #[test]
    fn lookup_out_of_range_option_is_missing() {
        let s = series(vec![point(100.0, None, 0.3)]);
        let step = StepSeries::centers(&s, 4);
        assert_eq!(step.at(150.0), CursorValue::Missing);
        assert_eq!(step.index_at(150.0), Some(0));
    }

    #[test]
    fn empty_series_never_has_value() {
        let step = StepSeries::centers(&series(vec![]), 0);
        assert!(step.is_empty());
        assert_eq!(step.at(0.0), CursorValue::Missing);
        assert_eq!(step.index_at(f64::NAN), None);
    }

    #[test]
    fn align_merges_and_adds_boundary() {
        let a = series(vec![point(100.0, Some(200.0), 0.1), point(200.0, None, 0.2)]);
        let b = series(vec![point(150.0, Some(200.0), 0.4)]);
        let axis = align_timestamps(&[&a, &b], None, 500.0);
        assert_eq!(axis, vec![100.0, 150.0, 200.0, 500.0]);
    }

    #[test]
    fn align_boundary_uses_earlier_of_close_and_now() {
        let a = series(vec![point(100.0, None, 0.1)]);
        assert_eq!(align_timestamps(&[&a], Some(300.0), 500.0), vec![100.0, 300.0]);
        assert_eq!(align_timestamps(&[&a], Some(900.0), 500.0), vec![100.0, 500.0]);
    }

    #[test]
    fn align_empty_inputs() {
        assert!(align_timestamps(&[], None, 500.0).is_empty());
        let empty = series(vec![]);
        assert!(align_timestamps(&[&empty], None, 500.0).is_empty());
    }

    #[test]
    fn aligned_values_follow_axis() {
        let a = series(vec![point(100.0, None, 0.1), point(200.0, None, 0.2)]);
        let step = StepSeries::centers(&a, 0);
        let vals = aligned_values(&step, &[50.0, 100.0, 150.0, 250.0]);
        assert_eq!(vals, vec![None, Some(0.1), Some(0.1), Some(0.2)]);
    }
}
