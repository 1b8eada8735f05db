use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Backend aggregation algorithm, as named in the `aggregations` map of the API payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    RecencyWeighted,
    Unweighted,
    SingleAggregation,
    MetaculusPrediction,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::RecencyWeighted => "recency_weighted",
            AggregationMethod::Unweighted => "unweighted",
            AggregationMethod::SingleAggregation => "single_aggregation",
            AggregationMethod::MetaculusPrediction => "metaculus_prediction",
        }
    }
}

/// One entry of the explorer's option menu.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationOption {
    pub id: &'static str,
    pub label: &'static str,
    pub method: AggregationMethod,
    pub supports_bots: bool,
    pub supports_user_filters: bool,
    pub pros_only: bool,
    pub staff_only: bool,
}

const CATALOG: &[AggregationOption] = &[
    AggregationOption {
        id: "recency_weighted",
        label: "Recency weighted",
        method: AggregationMethod::RecencyWeighted,
        supports_bots: true,
        supports_user_filters: true,
        pros_only: false,
        staff_only: false,
    },
    AggregationOption {
        id: "unweighted",
        label: "Unweighted",
        method: AggregationMethod::Unweighted,
        supports_bots: true,
        supports_user_filters: true,
        pros_only: false,
        staff_only: false,
    },
    AggregationOption {
        id: "single_aggregation",
        label: "Single aggregation",
        method: AggregationMethod::SingleAggregation,
        supports_bots: true,
        supports_user_filters: true,
        pros_only: false,
        staff_only: false,
    },
    AggregationOption {
        id: "metaculus_prediction",
        label: "Metaculus prediction",
        method: AggregationMethod::MetaculusPrediction,
        supports_bots: false,
        supports_user_filters: false,
        pros_only: false,
        staff_only: true,
    },
    AggregationOption {
        id: "metaculus_pros",
        label: "Pro forecasters",
        method: AggregationMethod::SingleAggregation,
        supports_bots: false,
        supports_user_filters: false,
        pros_only: true,
        staff_only: false,
    },
];

static BY_ID: OnceLock<HashMap<&'static str, &'static AggregationOption>> = OnceLock::new();

fn by_id() -> &'static HashMap<&'static str, &'static AggregationOption> {
    BY_ID.get_or_init(|| CATALOG.iter().map(|opt| (opt.id, opt)).collect())
}

/// All options in menu order.
pub fn all() -> &'static [AggregationOption] {
    CATALOG
}

pub fn lookup(id: &str) -> Option<&'static AggregationOption> {
    by_id().get(id).copied()
}

pub fn is_known(id: &str) -> bool {
    by_id().contains_key(id)
}
