use crate::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub api_base: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl ExplorerConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("API_BASE").unwrap_or_else(|_| "https://www.metaculus.com/api".to_string()),
            api_token: std::env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            max_retries: std::env::var("FETCH_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(2),
            retry_base_ms: std::env::var("FETCH_RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(250),
            retry_max_ms: std::env::var("FETCH_RETRY_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(4000),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_base_ms,
            max_delay_ms: self.retry_max_ms,
            ..RetryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_settings_carry_over() {
        let cfg = ExplorerConfig {
            api_base: "http://localhost".to_string(),
            api_token: None,
            request_timeout_secs: 5,
            max_retries: 7,
            retry_base_ms: 10,
            retry_max_ms: 20,
        };
        let retry = cfg.retry();
        assert_eq!(retry.max_retries, 7);
        assert_eq!(retry.base_delay_ms, 10);
        assert_eq!(retry.max_delay_ms, 20);
    }
}
