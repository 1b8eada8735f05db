use serde::Serialize;

use crate::config_key::SelectedConfig;
use crate::history::{AggregationSeries, QuestionMeta, QuestionType, Scaling};
use crate::merge::{MergedAggregations, SeriesState};
use crate::scaling::format_value;
use crate::timeline::{aligned_values, CursorValue, StepSeries};

/// Series colors, assigned by selection order and reused cyclically.
pub const PALETTE: &[&str] = &[
    "#3d6ab0", "#d9822b", "#2f9e6e", "#c2415b", "#7b5ea7", "#8c6d31", "#1f9bb5", "#b55d9b",
];

pub fn color_for(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceStatus {
    Ready,
    Empty,
    Error,
    /// No result has been merged for this config yet.
    Pending,
}

/// One chart series, derived from a selected config and the merged data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceItem {
    pub id: String,
    pub label: String,
    pub color: &'static str,
    pub active: bool,
    pub highlighted: bool,
    pub status: ChoiceStatus,
    pub step: StepSeries,
    pub values: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
}

impl ChoiceItem {
    pub fn build(
        index: usize,
        config: &SelectedConfig,
        merged: &MergedAggregations,
        option_index: usize,
        axis: &[f64],
    ) -> Self {
        let (status, series) = match merged.state(&config.id) {
            Some(SeriesState::Ready { series }) => (ChoiceStatus::Ready, Some(series)),
            Some(SeriesState::Empty) => (ChoiceStatus::Empty, None),
            Some(SeriesState::Error { .. }) => (ChoiceStatus::Error, None),
            None => (ChoiceStatus::Pending, None),
        };
        let (step, lower, upper) = match series {
            Some(s) => band_steps(s, option_index),
            None => {
                let empty = StepSeries::new(Vec::new(), Vec::new(), None);
                (empty.clone(), empty.clone(), empty)
            }
        };
        Self {
            id: config.id.clone(),
            label: config.label(),
            color: color_for(index),
            active: config.enabled,
            highlighted: false,
            status,
            values: aligned_values(&step, axis),
            lower: aligned_values(&lower, axis),
            upper: aligned_values(&upper, axis),
            step,
        }
    }

    pub fn value_at(&self, cursor: f64) -> CursorValue {
        self.step.at(cursor)
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }
}

fn band_steps(series: &AggregationSeries, option_index: usize) -> (StepSeries, StepSeries, StepSeries) {
    (
        StepSeries::centers(series, option_index),
        StepSeries::from_history(&series.history, |p| p.lower(option_index)),
        StepSeries::from_history(&series.history, |p| p.upper(option_index)),
    )
}

/// Highlights exactly the item with `id`, or none.
pub fn highlight(items: &mut [ChoiceItem], id: Option<&str>) {
    for item in items.iter_mut() {
        item.set_highlighted(Some(item.id.as_str()) == id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipRow {
    pub id: String,
    pub label: String,
    pub color: &'static str,
    pub value: String,
}

/// Rows for the hover tooltip: active items only, in legend order.
pub fn tooltip_rows(items: &[ChoiceItem], cursor: f64, question: &QuestionMeta) -> Vec<TooltipRow> {
    tooltip_rows_with(items, cursor, question.question_type, &question.scaling)
}

pub fn tooltip_rows_with(
    items: &[ChoiceItem],
    cursor: f64,
    question_type: QuestionType,
    scaling: &Scaling,
) -> Vec<TooltipRow> {
    items
        .iter()
        .filter(|item| item.active)
        .map(|item| TooltipRow {
            id: item.id.clone(),
            label: item.label.clone(),
            color: item.color,
            value: format_value(item.value_at(cursor), question_type, scaling),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_key::decode;
    use crate::merge::{FetchOutcome, FetchResult};
    use serde_json::json;

    fn merged_with(key: &str, history: serde_json::Value) -> MergedAggregations {
        let config = decode(key).unwrap();
        let method = config.option().method.as_str();
        let payload = serde_json::from_value(json!({
            "id": 9, "type": "binary",
            "aggregations": { method: { "history": history } }
        }))
        .unwrap();
        MergedAggregations::new().merge(&FetchResult {
            config,
            seq: 1,
            outcome: FetchOutcome::Loaded(payload),
        })
    }

    #[test]
    fn ready_item_has_aligned_values_and_bands() {
        let merged = merged_with(
            "recency_weighted",
            json!([
                {"start_time": 100.0, "centers": [0.3], "interval_lower_bounds": [0.2], "interval_upper_bounds": [0.4]},
                {"start_time": 200.0, "centers": [0.5]}
            ]),
        );
        let cfg = decode("recency_weighted").unwrap();
        let item = ChoiceItem::build(0, &cfg, &merged, 0, &[100.0, 200.0, 300.0]);
        assert_eq!(item.status, ChoiceStatus::Ready);
        assert_eq!(item.values, vec![Some(0.3), Some(0.5), Some(0.5)]);
        assert_eq!(item.lower, vec![Some(0.2), None, None]);
        assert_eq!(item.color, PALETTE[0]);
        assert_eq!(item.value_at(150.0), CursorValue::Value(0.3));
    }

    #[test]
    fn missing_entry_is_pending() {
        let merged = MergedAggregations::new();
        let cfg = decode("unweighted").unwrap();
        let item = ChoiceItem::build(9, &cfg, &merged, 0, &[1.0]);
        assert_eq!(item.status, ChoiceStatus::Pending);
        assert_eq!(item.values, vec![None]);
        assert_eq!(item.color, PALETTE[1]);
    }

    #[test]
    fn tooltip_skips_inactive_and_marks_missing() {
        let merged = merged_with("unweighted", json!([{"start_time": 100.0, "centers": [0.25]}]));
        let on = decode("unweighted").unwrap();
        let off = decode("~recency_weighted").unwrap();
        let pending = decode("single_aggregation").unwrap();
        let items = vec![
            ChoiceItem::build(0, &on, &merged, 0, &[100.0]),
            ChoiceItem::build(1, &off, &merged, 0, &[100.0]),
            ChoiceItem::build(2, &pending, &merged, 0, &[100.0]),
        ];
        let rows = tooltip_rows(&items, 150.0, merged.question().unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, "25%");
        assert_eq!(rows[1].value, "?");
    }

    #[test]
    fn highlight_is_exclusive() {
        let merged = MergedAggregations::new();
        let mut items: Vec<ChoiceItem> = ["unweighted", "recency_weighted"]
            .iter()
            .enumerate()
            .map(|(i, k)| ChoiceItem::build(i, &decode(k).unwrap(), &merged, 0, &[]))
            .collect();
        highlight(&mut items, Some("recency_weighted"));
        assert!(!items[0].highlighted);
        assert!(items[1].highlighted);
        highlight(&mut items, None);
        assert!(items.iter().all(|i| !i.highlighted));
        items[0].set_active(false);
        assert!(tooltip_rows_with(&items, 0.0, QuestionType::Binary, &Scaling::default()).len() == 1);
    }
}
