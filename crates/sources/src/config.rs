use std::time::Duration;

/// Default timeout for a single source request, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default cap on records kept after de-duplication.
const DEFAULT_MAX_RECORDS: usize = 30;

const DEFAULT_USER_AGENT: &str = concat!("inquiry/", env!("CARGO_PKG_VERSION"));

/// Settings for the HTTP data sources.
///
/// | Env var                   | Default            |
/// |---------------------------|--------------------|
/// | `SOURCE_TIMEOUT_SECS`     | `10`               |
/// | `SOURCE_MAX_RECORDS`      | `30`               |
/// | `SOURCE_USER_AGENT`       | `inquiry/<version>`|
/// | `NEWSAPI_KEY`             | unset              |
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub request_timeout: Duration,
    pub max_records: usize,
    pub user_agent: String,
    pub newsapi_key: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_records: DEFAULT_MAX_RECORDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            newsapi_key: None,
        }
    }
}

impl SourcesConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let request_timeout = std::env::var("SOURCE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let max_records = std::env::var("SOURCE_MAX_RECORDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_records);

        let user_agent = std::env::var("SOURCE_USER_AGENT").unwrap_or(defaults.user_agent);

        let newsapi_key = std::env::var("NEWSAPI_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Self {
            request_timeout,
            max_records,
            user_agent,
            newsapi_key,
        }
    }
}
