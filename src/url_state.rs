use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;
use url::form_urlencoded;

use crate::config_key::{self, SelectedConfig};
use crate::logging::log_config_dropped;

pub const METHODS_SEP: char = '|';

/// Which sub-question a group or multiple-choice post shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubQuestion {
    Id(u64),
    Label(String),
}

impl SubQuestion {
    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<u64>() {
            Ok(id) => Some(SubQuestion::Id(id)),
            Err(_) => Some(SubQuestion::Label(raw.to_string())),
        }
    }
}

impl fmt::Display for SubQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubQuestion::Id(id) => write!(f, "{}", id),
            SubQuestion::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistView {
    Pmf,
    Cdf,
}

impl DistView {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pmf" => Some(DistView::Pmf),
            "cdf" => Some(DistView::Cdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistView::Pmf => "pmf",
            DistView::Cdf => "cdf",
        }
    }
}

/// Everything the explorer keeps in its shareable link.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplorerUrlState {
    pub post_id: Option<u64>,
    pub question_id: Option<u64>,
    pub configs: Vec<SelectedConfig>,
    pub sub: Option<SubQuestion>,
    pub dist: Option<DistView>,
}

impl ExplorerUrlState {
    /// Parses a bare query string; malformed values are treated as absent.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "post_id" => state.post_id = value.parse().ok(),
                "question_id" => state.question_id = value.parse().ok(),
                "sub" => state.sub = SubQuestion::parse(&value),
                "dist" => state.dist = DistView::parse(&value),
                "methods" => state.configs = parse_methods(&value),
                _ => {}
            }
        }
        state
    }

    /// Accepts a full explorer URL or a bare query string.
    pub fn from_link(link: &str) -> Result<Self> {
        if !link.contains("://") {
            return Ok(Self::from_query(link));
        }
        let url = url::Url::parse(link).map_err(|e| anyhow!("invalid explorer url: {}", e))?;
        Ok(Self::from_query(url.query().unwrap_or("")))
    }

    /// Fixed parameter order, so equal states give equal links.
    pub fn to_query(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        if let Some(id) = self.post_id {
            ser.append_pair("post_id", &id.to_string());
        }
        if let Some(id) = self.question_id {
            ser.append_pair("question_id", &id.to_string());
        }
        if let Some(sub) = &self.sub {
            ser.append_pair("sub", &sub.to_string());
        }
        if let Some(dist) = self.dist {
            ser.append_pair("dist", dist.as_str());
        }
        if !self.configs.is_empty() {
            let methods: Vec<String> = self.configs.iter().map(|c| c.to_url_segment()).collect();
            ser.append_pair("methods", &methods.join(&METHODS_SEP.to_string()));
        }
        ser.finish()
    }

    pub fn config(&self, id: &str) -> Option<&SelectedConfig> {
        self.configs.iter().find(|c| c.id == id)
    }

    /// Appends `config` unless one with the same id is already selected.
    pub fn with_config(mut self, config: SelectedConfig) -> Self {
        if self.config(&config.id).is_none() {
            self.configs.push(config);
        }
        self
    }

    pub fn toggled(mut self, id: &str) -> Self {
        for cfg in self.configs.iter_mut().filter(|c| c.id == id) {
            cfg.enabled = !cfg.enabled;
        }
        self
    }

    pub fn without_config(mut self, id: &str) -> Self {
        self.configs.retain(|c| c.id != id);
        self
    }
}

/// Splits the `methods` value; malformed and duplicate entries are dropped.
pub fn parse_methods(raw: &str) -> Vec<SelectedConfig> {
    let mut configs: Vec<SelectedConfig> = Vec::new();
    for part in raw.split(METHODS_SEP).filter(|p| !p.is_empty()) {
        match config_key::decode(part) {
            Some(cfg) if configs.iter().all(|c| c.id != cfg.id) => configs.push(cfg),
            Some(_) => {}
            None => log_config_dropped(part),
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_parameters() {
        let state = ExplorerUrlState::from_query(
            "?post_id=12&question_id=34&sub=Blue&dist=cdf&methods=unweighted:bots%7C~recency_weighted",
        );
        assert_eq!(state.post_id, Some(12));
        assert_eq!(state.question_id, Some(34));
        assert_eq!(state.sub, Some(SubQuestion::Label("Blue".to_string())));
        assert_eq!(state.dist, Some(DistView::Cdf));
        assert_eq!(state.configs.len(), 2);
        assert_eq!(state.configs[0].id, "unweighted:bots");
        assert!(!state.configs[1].enabled);
    }

    #[test]
    fn numeric_sub_is_an_id() {
        let state = ExplorerUrlState::from_query("sub=991");
        assert_eq!(state.sub, Some(SubQuestion::Id(991)));
    }

    #[test]
    fn malformed_values_are_absent() {
        let state = ExplorerUrlState::from_query(
            "post_id=abc&dist=histogram&methods=nope|unweighted|unweighted:u0|unweighted",
        );
        assert_eq!(state.post_id, None);
        assert_eq!(state.dist, None);
        let ids: Vec<&str> = state.configs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["unweighted"]);
    }

    #[test]
    fn query_round_trips() {
        let state = ExplorerUrlState::from_query(
            "post_id=1&question_id=2&sub=7&dist=pmf&methods=~unweighted:u3,1|single_aggregation:2024-05-05",
        );
        let again = ExplorerUrlState::from_query(&state.to_query());
        assert_eq!(again, state);
        assert_eq!(again.configs[0].to_url_segment(), "~unweighted:u1,3");
    }

    #[test]
    fn from_link_accepts_full_url() {
        let state = ExplorerUrlState::from_link(
            "https://example.org/aggregation-explorer/?post_id=5&methods=recency_weighted",
        )
        .unwrap();
        assert_eq!(state.post_id, Some(5));
        assert_eq!(state.configs.len(), 1);
        assert!(ExplorerUrlState::from_link("http://[bad").is_err());
    }

    #[test]
    fn add_toggle_remove() {
        let a = config_key::decode("unweighted").unwrap();
        let b = config_key::decode("recency_weighted:bots").unwrap();
        let state = ExplorerUrlState::default()
            .with_config(a.clone())
            .with_config(b)
            .with_config(a);
        assert_eq!(state.configs.len(), 2);

        let state = state.toggled("unweighted");
        assert!(!state.config("unweighted").unwrap().enabled);
        let state = state.toggled("unweighted");
        assert!(state.config("unweighted").unwrap().enabled);

        let state = state.without_config("recency_weighted:bots");
        assert_eq!(state.configs.len(), 1);
        assert!(state.to_query().starts_with("methods=unweighted"));
    }
}
