use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::options::AggregationMethod;

/// One step of a piecewise-constant aggregated forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastHistoryPoint {
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub centers: Vec<f64>,
    #[serde(default)]
    pub interval_lower_bounds: Option<Vec<f64>>,
    #[serde(default)]
    pub interval_upper_bounds: Option<Vec<f64>>,
    #[serde(default)]
    pub forecaster_count: u32,
}

impl ForecastHistoryPoint {
    pub fn center(&self, option_index: usize) -> Option<f64> {
        self.centers.get(option_index).copied()
    }

    pub fn lower(&self, option_index: usize) -> Option<f64> {
        self.interval_lower_bounds.as_ref()?.get(option_index).copied()
    }

    pub fn upper(&self, option_index: usize) -> Option<f64> {
        self.interval_upper_bounds.as_ref()?.get(option_index).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationHistory {
    #[serde(default)]
    pub history: Vec<ForecastHistoryPoint>,
}

/// History of one aggregation method, sorted by `start_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationSeries {
    pub method: AggregationMethod,
    pub include_bots: bool,
    pub history: Vec<ForecastHistoryPoint>,
}

impl AggregationSeries {
    /// Drops points with a non-finite start time and sorts the rest.
    pub fn new(method: AggregationMethod, include_bots: bool, history: Vec<ForecastHistoryPoint>) -> Self {
        let mut history: Vec<_> = history
            .into_iter()
            .filter(|p| p.start_time.is_finite())
            .collect();
        history.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Self {
            method,
            include_bots,
            history,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Binary,
    Numeric,
    Discrete,
    Date,
    MultipleChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    #[serde(default)]
    pub range_min: Option<f64>,
    #[serde(default)]
    pub range_max: Option<f64>,
    #[serde(default)]
    pub zero_point: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMeta {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "epoch_or_rfc3339")]
    pub open_time: Option<f64>,
    #[serde(default, deserialize_with = "epoch_or_rfc3339")]
    pub scheduled_close_time: Option<f64>,
    #[serde(default, deserialize_with = "epoch_or_rfc3339")]
    pub actual_close_time: Option<f64>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl QuestionMeta {
    /// Index into `centers` for a multiple-choice option label.
    pub fn option_index(&self, label: &str) -> Option<usize> {
        self.options.as_ref()?.iter().position(|o| o == label)
    }
}

/// Response body of the aggregation explorer endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    #[serde(flatten)]
    pub meta: QuestionMeta,
    #[serde(default)]
    pub aggregations: HashMap<String, AggregationHistory>,
}

impl QuestionPayload {
    pub fn history_for(&self, method: AggregationMethod) -> Vec<ForecastHistoryPoint> {
        self.aggregations
            .get(method.as_str())
            .map(|a| a.history.clone())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Epoch(f64),
    Text(String),
}

/// Accepts epoch seconds or an RFC 3339 string; unparseable text becomes `None`.
fn epoch_or_rfc3339<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawTime> = Option::deserialize(de)?;
    Ok(match raw {
        Some(RawTime::Epoch(secs)) => Some(secs),
        Some(RawTime::Text(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.timestamp_millis() as f64 / 1000.0),
        None => None,
    })
}
