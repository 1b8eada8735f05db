//! Combines independently resolved fetch results into one question + aggregations view.
//!
//! Ordering policy: the question metadata comes from the earliest resolved
//! successful payload, and for a given config key the most recently resolved
//! result wins. Both rules look only at resolution sequence numbers, so the
//! order in which results are applied does not matter.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::config_key::SelectedConfig;
use crate::history::{AggregationSeries, QuestionMeta, QuestionPayload};
use crate::logging::{log, obj, v_str, Domain, Level};

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded(QuestionPayload),
    Failed(String),
}

/// A completed request for one config. `seq` is unique per resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub config: SelectedConfig,
    pub seq: u64,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeriesState {
    Ready { series: AggregationSeries },
    Empty,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedEntry {
    pub seq: u64,
    pub state: SeriesState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedAggregations {
    template: Option<(u64, QuestionMeta)>,
    entries: BTreeMap<String, MergedEntry>,
}

impl MergedAggregations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_all<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a FetchResult>,
    {
        results
            .into_iter()
            .fold(Self::new(), |merged, result| merged.merge(result))
    }

    /// Returns the state with `result` applied. Re-applying the same result is a no-op.
    pub fn merge(mut self, result: &FetchResult) -> Self {
        let key = result.config.id.clone();
        if let Some(existing) = self.entries.get(&key) {
            if existing.seq >= result.seq {
                log(
                    Level::Debug,
                    Domain::Merge,
                    "stale_result_ignored",
                    obj(&[
                        ("config_id", v_str(&key)),
                        ("seq", json!(result.seq)),
                        ("kept_seq", json!(existing.seq)),
                    ]),
                );
                // Template may still be older than the stored entry's payload
                self.adopt_template(result);
                return self;
            }
        }

        self.adopt_template(result);
        let state = match &result.outcome {
            FetchOutcome::Loaded(payload) => {
                let option = result.config.option();
                let series = AggregationSeries::new(
                    option.method,
                    result.config.include_bots,
                    payload.history_for(option.method),
                );
                if series.is_empty() {
                    SeriesState::Empty
                } else {
                    SeriesState::Ready { series }
                }
            }
            FetchOutcome::Failed(message) => SeriesState::Error {
                message: message.clone(),
            },
        };
        log(
            Level::Debug,
            Domain::Merge,
            "result_applied",
            obj(&[
                ("config_id", v_str(&key)),
                ("seq", json!(result.seq)),
                ("status", v_str(state.status_str())),
            ]),
        );
        self.entries.insert(
            key,
            MergedEntry {
                seq: result.seq,
                state,
            },
        );
        self
    }

    fn adopt_template(&mut self, result: &FetchResult) {
        let FetchOutcome::Loaded(payload) = &result.outcome else {
            return;
        };
        let replace = match &self.template {
            Some((seq, _)) => result.seq < *seq,
            None => true,
        };
        if replace {
            self.template = Some((result.seq, payload.meta.clone()));
        }
    }

    pub fn question(&self) -> Option<&QuestionMeta> {
        self.template.as_ref().map(|(_, meta)| meta)
    }

    pub fn entry(&self, config_id: &str) -> Option<&MergedEntry> {
        self.entries.get(config_id)
    }

    pub fn state(&self, config_id: &str) -> Option<&SeriesState> {
        self.entry(config_id).map(|e| &e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SeriesState {
    pub fn status_str(&self) -> &'static str {
        match self {
            SeriesState::Ready { .. } => "ready",
            SeriesState::Empty => "empty",
            SeriesState::Error { .. } => "error",
        }
    }
}
