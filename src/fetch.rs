use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::ExplorerConfig;
use crate::config_key::SelectedConfig;
use crate::history::QuestionPayload;
use crate::logging::{log, log_fetch_failed, obj, v_str, Domain, Level, ProfileScope};
use crate::merge::{FetchOutcome, FetchResult};
use crate::retry::{is_retryable_http_error, retry_async, Permanent, RetryConfig};
use crate::url_state::{ExplorerUrlState, SubQuestion};

/// One explorer request: the subject plus a single config.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerRequest {
    pub post_id: Option<u64>,
    pub question_id: Option<u64>,
    pub config: SelectedConfig,
}

impl ExplorerRequest {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let option = self.config.option();
        let mut pairs = Vec::new();
        if let Some(id) = self.post_id {
            pairs.push(("post_id", id.to_string()));
        }
        if let Some(id) = self.question_id {
            pairs.push(("question_id", id.to_string()));
        }
        pairs.push(("aggregation_methods", option.method.as_str().to_string()));
        pairs.push(("include_bots", self.config.include_bots.to_string()));
        if !self.config.user_ids.is_empty() {
            let ids: Vec<String> = self.config.user_ids.iter().map(|id| id.to_string()).collect();
            pairs.push(("user_ids", ids.join(",")));
        }
        if let Some(date) = self.config.joined_before_date {
            pairs.push(("joined_before_date", date.format("%Y-%m-%d").to_string()));
        }
        if option.pros_only {
            pairs.push(("only_include_pros", "true".to_string()));
        }
        pairs
    }
}

#[async_trait]
pub trait AggregationSource {
    async fn fetch(&self, request: &ExplorerRequest) -> Result<QuestionPayload>;
}

/// Backend explorer endpoint over HTTP.
pub struct HttpSource {
    client: Client,
    endpoint: url::Url,
    api_token: Option<String>,
}

impl HttpSource {
    pub fn new(cfg: &ExplorerConfig) -> Result<Self> {
        let base = cfg.api_base.trim_end_matches('/');
        let endpoint = url::Url::parse(&format!("{}/aggregation_explorer/", base))
            .with_context(|| format!("invalid API_BASE {}", cfg.api_base))?;
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.request_timeout_secs))
                .build()?,
            endpoint,
            api_token: cfg.api_token.clone(),
        })
    }

    pub fn request_url(&self, request: &ExplorerRequest) -> url::Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(request.query_pairs());
        url
    }
}

#[async_trait]
impl AggregationSource for HttpSource {
    async fn fetch(&self, request: &ExplorerRequest) -> Result<QuestionPayload> {
        let url = self.request_url(request);
        let mut req = self.client.get(url.clone());
        if let Some(token) = &self.api_token {
            req = req.header("Authorization", format!("Token {}", token));
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let msg = format!("HTTP {} from {}", status.as_u16(), url.path());
            if is_retryable_http_error(status.as_u16()) {
                return Err(anyhow!(msg));
            }
            return Err(Permanent(msg).into());
        }
        let payload: QuestionPayload = resp.json().await?;
        Ok(payload)
    }
}

/// Saved explorer responses on disk: `question_<id>.json` or `post_<id>.json`.
///
/// Every config of a subject is answered from the same file, which is
/// expected to hold all methods in its `aggregations` map.
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, request: &ExplorerRequest) -> Result<PathBuf> {
        let name = match (request.question_id, request.post_id) {
            (Some(q), _) => format!("question_{}.json", q),
            (None, Some(p)) => format!("post_{}.json", p),
            (None, None) => return Err(Permanent("request has no subject".to_string()).into()),
        };
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl AggregationSource for FileSource {
    async fn fetch(&self, request: &ExplorerRequest) -> Result<QuestionPayload> {
        let path = self.path_for(request)?;
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Permanent(format!("{}: {}", path.display(), e)))?;
        let payload: QuestionPayload = serde_json::from_str(&raw)
            .map_err(|e| Permanent(format!("{}: {}", path.display(), e)))?;
        Ok(payload)
    }
}

/// Numeric `sub` picks a sub-question of a group post and overrides `question_id`.
pub fn effective_question_id(url: &ExplorerUrlState) -> Option<u64> {
    match url.sub {
        Some(SubQuestion::Id(id)) => Some(id),
        _ => url.question_id,
    }
}

/// Fetches every selected config concurrently.
///
/// Results come back in selection order; `seq` records resolution order.
/// A failed config becomes a `Failed` outcome, never an error of the batch.
pub async fn fetch_all<S>(
    source: &S,
    url: &ExplorerUrlState,
    retry: &RetryConfig,
) -> Result<Vec<FetchResult>>
where
    S: AggregationSource + Sync + ?Sized,
{
    let question_id = effective_question_id(url);
    if url.post_id.is_none() && question_id.is_none() {
        return Err(anyhow!("explorer link needs post_id or question_id"));
    }
    let _scope = ProfileScope::with_context("fetch_all", &[("configs", json!(url.configs.len()))]);
    let resolved = AtomicU64::new(0);

    let pending = url.configs.iter().map(|config| {
        let request = ExplorerRequest {
            post_id: url.post_id,
            question_id,
            config: config.clone(),
        };
        let resolved = &resolved;
        async move {
            let attempts = retry.max_retries + 1;
            let outcome = match retry_async(retry, &config.id, || source.fetch(&request)).await {
                Ok(payload) => FetchOutcome::Loaded(payload),
                Err(e) => {
                    log_fetch_failed(&config.id, attempts, &e.to_string());
                    FetchOutcome::Failed(e.to_string())
                }
            };
            let seq = resolved.fetch_add(1, Ordering::SeqCst) + 1;
            log(
                Level::Info,
                Domain::Fetch,
                "resolved",
                obj(&[
                    ("config_id", v_str(&config.id)),
                    ("seq", json!(seq)),
                    ("ok", json!(matches!(outcome, FetchOutcome::Loaded(_)))),
                ]),
            );
            FetchResult {
                config: request.config,
                seq,
                outcome,
            }
        }
    });
    Ok(join_all(pending).await)
}
