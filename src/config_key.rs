//! Stable string identity for a selected aggregation config.
//!
//! Format: `option[:bots][:YYYY-MM-DD][:u<id>,<id>...]`, with a leading `~`
//! when the config is disabled. The key without `~` doubles as the chart
//! series id and as the key in the merged aggregation map.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::options::{self, AggregationOption};

pub const DISABLED_PREFIX: char = '~';
pub const BOTS_MARKER: &str = "bots";
pub const USER_IDS_PREFIX: char = 'u';
pub const SEGMENT_SEP: char = ':';
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedConfig {
    pub id: String,
    pub option_id: &'static str,
    pub include_bots: bool,
    pub joined_before_date: Option<NaiveDate>,
    /// Empty means no user filter.
    pub user_ids: BTreeSet<u64>,
    pub enabled: bool,
}

/// Builds the key; user ids are sorted and deduplicated.
pub fn encode(
    option_id: &str,
    include_bots: bool,
    joined_before_date: Option<NaiveDate>,
    user_ids: &[u64],
) -> String {
    let mut key = option_id.to_string();
    if include_bots {
        key.push(SEGMENT_SEP);
        key.push_str(BOTS_MARKER);
    }
    if let Some(date) = joined_before_date {
        key.push(SEGMENT_SEP);
        key.push_str(&date.format(DATE_FORMAT).to_string());
    }
    let ids: BTreeSet<u64> = user_ids.iter().copied().collect();
    if !ids.is_empty() {
        key.push(SEGMENT_SEP);
        key.push(USER_IDS_PREFIX);
        let joined: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        key.push_str(&joined.join(","));
    }
    key
}

/// Parses a key (optionally `~`-prefixed). Any malformed segment rejects the whole key.
pub fn decode(raw: &str) -> Option<SelectedConfig> {
    let (enabled, body) = match raw.strip_prefix(DISABLED_PREFIX) {
        Some(rest) => (false, rest),
        None => (true, raw),
    };
    let mut segments = body.split(SEGMENT_SEP);
    let option = options::lookup(segments.next()?)?;

    let mut include_bots = false;
    let mut joined_before_date = None;
    let mut user_ids: Option<BTreeSet<u64>> = None;
    for segment in segments {
        if segment == BOTS_MARKER {
            if include_bots {
                return None;
            }
            include_bots = true;
        } else if let Some(list) = segment.strip_prefix(USER_IDS_PREFIX) {
            if user_ids.is_some() {
                return None;
            }
            user_ids = Some(parse_user_ids(list)?);
        } else {
            if joined_before_date.is_some() {
                return None;
            }
            joined_before_date = Some(NaiveDate::parse_from_str(segment, DATE_FORMAT).ok()?);
        }
    }

    let ids: Vec<u64> = user_ids.unwrap_or_default().into_iter().collect();
    SelectedConfig::from_option(option, include_bots, joined_before_date, &ids)
        .map(|cfg| cfg.with_enabled(enabled))
}

fn parse_user_ids(list: &str) -> Option<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    for part in list.split(',') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id: u64 = part.parse().ok()?;
        if id == 0 {
            return None;
        }
        ids.insert(id);
    }
    Some(ids)
}

impl SelectedConfig {
    /// `None` for unknown options, zero user ids, or filters the option does not support.
    pub fn new(
        option_id: &str,
        include_bots: bool,
        joined_before_date: Option<NaiveDate>,
        user_ids: &[u64],
    ) -> Option<Self> {
        Self::from_option(options::lookup(option_id)?, include_bots, joined_before_date, user_ids)
    }

    fn from_option(
        option: &'static AggregationOption,
        include_bots: bool,
        joined_before_date: Option<NaiveDate>,
        user_ids: &[u64],
    ) -> Option<Self> {
        if include_bots && !option.supports_bots {
            return None;
        }
        let has_user_filter = joined_before_date.is_some() || !user_ids.is_empty();
        if has_user_filter && !option.supports_user_filters {
            return None;
        }
        if user_ids.contains(&0) {
            return None;
        }
        Some(Self {
            id: encode(option.id, include_bots, joined_before_date, user_ids),
            option_id: option.id,
            include_bots,
            joined_before_date,
            user_ids: user_ids.iter().copied().collect(),
            enabled: true,
        })
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn option(&self) -> &'static AggregationOption {
        // option_id always comes from the catalog
        options::lookup(self.option_id).unwrap_or(&options::all()[0])
    }

    /// Key as written into the `methods` query parameter.
    pub fn to_url_segment(&self) -> String {
        if self.enabled {
            self.id.clone()
        } else {
            format!("{}{}", DISABLED_PREFIX, self.id)
        }
    }

    pub fn label(&self) -> String {
        let mut label = self.option().label.to_string();
        if self.include_bots {
            label.push_str(" (incl. bots)");
        }
        if let Some(date) = self.joined_before_date {
            label.push_str(&format!(" joined before {}", date.format(DATE_FORMAT)));
        }
        if !self.user_ids.is_empty() {
            let ids: Vec<String> = self.user_ids.iter().map(|id| id.to_string()).collect();
            label.push_str(&format!(" users {}", ids.join(", ")));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn encode_sorts_user_ids() {
        assert_eq!(encode("unweighted", true, None, &[5, 2, 9]), "unweighted:bots:u2,5,9");
    }

    #[test]
    fn decode_bots_and_users() {
        let cfg = decode("unweighted:bots:u2,5,9").unwrap();
        assert_eq!(cfg.option_id, "unweighted");
        assert!(cfg.include_bots);
        assert_eq!(cfg.joined_before_date, None);
        assert_eq!(cfg.user_ids.iter().copied().collect::<Vec<_>>(), vec![2, 5, 9]);
        assert!(cfg.enabled);
        assert_eq!(cfg.id, "unweighted:bots:u2,5,9");
    }

    #[test]
    fn decode_full_key_with_date() {
        let cfg = decode("recency_weighted:2024-03-01:u7").unwrap();
        assert_eq!(cfg.joined_before_date, Some(date(2024, 3, 1)));
        assert!(!cfg.include_bots);
        assert_eq!(cfg.id, "recency_weighted:2024-03-01:u7");
    }

    #[test]
    fn disabled_prefix_round_trips() {
        let cfg = decode("~single_aggregation:bots").unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.id, "single_aggregation:bots");
        assert_eq!(cfg.to_url_segment(), "~single_aggregation:bots");
    }

    #[test]
    fn decode_normalizes_user_id_order() {
        let cfg = decode("unweighted:u9,2,2,5").unwrap();
        assert_eq!(cfg.id, "unweighted:u2,5,9");
    }

    #[test]
    fn decode_rejects_malformed() {
        assert!(decode("").is_none());
        assert!(decode("median").is_none());
        assert!(decode("~~unweighted").is_none());
        assert!(decode("unweighted:robots").is_none());
        assert!(decode("unweighted:2024-13-01").is_none());
        assert!(decode("unweighted:u").is_none());
        assert!(decode("unweighted:u1,,2").is_none());
        assert!(decode("unweighted:u0").is_none());
        assert!(decode("unweighted:u-3").is_none());
        assert!(decode("unweighted:bots:bots").is_none());
        assert!(decode("unweighted:u1:u2").is_none());
    }

    #[test]
    fn unsupported_filters_are_rejected() {
        assert!(decode("metaculus_prediction:bots").is_none());
        assert!(decode("metaculus_pros:u4").is_none());
        assert!(SelectedConfig::new("metaculus_pros", false, Some(date(2023, 1, 1)), &[]).is_none());
        assert!(decode("metaculus_pros").is_some());
    }

    #[test]
    fn label_lists_filters() {
        let cfg = SelectedConfig::new("unweighted", true, Some(date(2024, 1, 2)), &[3, 1]).unwrap();
        assert_eq!(
            cfg.label(),
            "Unweighted (incl. bots) joined before 2024-01-02 users 1, 3"
        );
    }
}
