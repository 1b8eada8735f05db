//! Pure view pipeline: merged fetch results + URL state -> render-ready view.
//!
//! Nothing here is cached; callers re-run [`build_view`] whenever an input changes.

use serde::Serialize;
use serde_json::json;

use crate::choices::{ChoiceItem, ChoiceStatus};
use crate::history::{AggregationSeries, QuestionMeta};
use crate::logging::{log, obj, Domain, Level, ProfileScope};
use crate::merge::{MergedAggregations, SeriesState};
use crate::timeline::align_timestamps;
use crate::url_state::{ExplorerUrlState, SubQuestion};

pub const EMPTY_PLACEHOLDER: &str = "No aggregation data to display";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorerView {
    pub question: Option<QuestionMeta>,
    pub option_index: usize,
    pub timestamps: Vec<f64>,
    pub choices: Vec<ChoiceItem>,
    /// Lists labels of series whose fetch failed.
    pub error_message: Option<String>,
    /// Lists labels of series that loaded without data.
    pub empty_warning: Option<String>,
    /// Set when there is nothing to chart.
    pub placeholder: Option<&'static str>,
}

impl ExplorerView {
    pub fn choice(&self, id: &str) -> Option<&ChoiceItem> {
        self.choices.iter().find(|c| c.id == id)
    }
}

/// Which entry of `centers` to chart: the option matching a label `sub`, else the first.
pub fn resolve_option_index(question: Option<&QuestionMeta>, sub: Option<&SubQuestion>) -> usize {
    match (question, sub) {
        (Some(q), Some(SubQuestion::Label(label))) => q.option_index(label).unwrap_or(0),
        _ => 0,
    }
}

pub fn build_view(merged: &MergedAggregations, url: &ExplorerUrlState, now: f64) -> ExplorerView {
    let _scope = ProfileScope::with_context("build_view", &[("configs", json!(url.configs.len()))]);
    let question = merged.question().cloned();
    let option_index = resolve_option_index(question.as_ref(), url.sub.as_ref());

    let ready: Vec<&AggregationSeries> = url
        .configs
        .iter()
        .filter_map(|cfg| match merged.state(&cfg.id) {
            Some(SeriesState::Ready { series }) => Some(series),
            _ => None,
        })
        .collect();
    let actual_close = question.as_ref().and_then(|q| q.actual_close_time);
    let timestamps = align_timestamps(&ready, actual_close, now);

    let choices: Vec<ChoiceItem> = url
        .configs
        .iter()
        .enumerate()
        .map(|(i, cfg)| ChoiceItem::build(i, cfg, merged, option_index, &timestamps))
        .collect();

    let error_message = label_list(&choices, ChoiceStatus::Error, "Failed to load");
    let empty_warning = label_list(&choices, ChoiceStatus::Empty, "No data for");
    let placeholder = timestamps.is_empty().then_some(EMPTY_PLACEHOLDER);

    log(
        Level::Debug,
        Domain::Timeline,
        "view_built",
        obj(&[
            ("axis_len", json!(timestamps.len())),
            ("choices", json!(choices.len())),
            ("errors", json!(error_message.is_some())),
        ]),
    );

    ExplorerView {
        question,
        option_index,
        timestamps,
        choices,
        error_message,
        empty_warning,
        placeholder,
    }
}

fn label_list(choices: &[ChoiceItem], status: ChoiceStatus, prefix: &str) -> Option<String> {
    let labels: Vec<&str> = choices
        .iter()
        .filter(|c| c.status == status)
        .map(|c| c.label.as_str())
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(format!("{}: {}", prefix, labels.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_key::decode;
    use crate::merge::{FetchOutcome, FetchResult};

    fn result(key: &str, seq: u64, history: serde_json::Value) -> FetchResult {
        let config = decode(key).unwrap();
        let method = config.option().method.as_str();
        let payload = serde_json::from_value(json!({
            "id": 4,
            "type": "multiple_choice",
            "options": ["A", "B"],
            "aggregations": { method: { "history": history } }
        }))
        .unwrap();
        FetchResult {
            config,
            seq,
            outcome: FetchOutcome::Loaded(payload),
        }
    }

    #[test]
    fn label_sub_selects_option_column() {
        let merged = MergedAggregations::new().merge(&result(
            "unweighted",
            1,
            json!([{"start_time": 10.0, "centers": [0.1, 0.9]}]),
        ));
        let url = ExplorerUrlState::from_query("sub=B&methods=unweighted");
        let view = build_view(&merged, &url, 50.0);
        assert_eq!(view.option_index, 1);
        assert_eq!(view.timestamps, vec![10.0, 50.0]);
        assert_eq!(view.choices[0].values, vec![Some(0.9), Some(0.9)]);
        assert!(view.placeholder.is_none());
    }

    #[test]
    fn errors_and_empty_are_reported_separately() {
        let failed = FetchResult {
            config: decode("recency_weighted").unwrap(),
            seq: 2,
            outcome: FetchOutcome::Failed("boom".to_string()),
        };
        let merged = MergedAggregations::merge_all([
            &result("unweighted", 1, json!([{"start_time": 10.0, "centers": [0.2, 0.8]}])),
            &failed,
            &result("single_aggregation", 3, json!([])),
        ]);
        let url = ExplorerUrlState::from_query(
            "methods=unweighted|recency_weighted|single_aggregation",
        );
        let view = build_view(&merged, &url, 20.0);
        assert_eq!(view.error_message.as_deref(), Some("Failed to load: Recency weighted"));
        assert_eq!(view.empty_warning.as_deref(), Some("No data for: Single aggregation"));
        assert_eq!(view.choices.len(), 3);
        assert_eq!(view.choice("unweighted").unwrap().status, ChoiceStatus::Ready);
    }

    #[test]
    fn nothing_loaded_gives_placeholder() {
        let url = ExplorerUrlState::from_query("methods=unweighted");
        let view = build_view(&MergedAggregations::new(), &url, 20.0);
        assert!(view.timestamps.is_empty());
        assert_eq!(view.placeholder, Some(EMPTY_PLACEHOLDER));
        assert_eq!(view.choices[0].status, ChoiceStatus::Pending);
    }

    #[test]
    fn unselected_merged_entries_are_ignored() {
        let merged = MergedAggregations::new().merge(&result(
            "unweighted",
            1,
            json!([{"start_time": 10.0, "centers": [0.5, 0.5]}]),
        ));
        let url = ExplorerUrlState::from_query("methods=recency_weighted");
        let view = build_view(&merged, &url, 20.0);
        assert!(view.timestamps.is_empty());
    }
}
