use std::str::FromStr;
use std::time::Duration;

use inquiry_core::error::CoreError;

/// Which [`ExecutionScheduler`](crate::scheduler::ExecutionScheduler) the
/// dispatcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run in a background task of the submitting process.
    Inline,
    /// Enqueue for out-of-process workers.
    Queue,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "queue" => Ok(Self::Queue),
            other => Err(format!("unknown execution mode '{other}' (expected inline or queue)")),
        }
    }
}

/// Per-step retry policy for transient collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub backoff: Duration,
}

impl StepRetryPolicy {
    pub const NONE: Self = Self {
        max_retries: 0,
        backoff: Duration::ZERO,
    };

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

/// Pipeline tuning loaded from the environment.
///
/// | Env Var                      | Default  |
/// |------------------------------|----------|
/// | `EXECUTION_MODE`             | `inline` |
/// | `PIPELINE_HARD_TIMEOUT_SECS` | `300`    |
/// | `PIPELINE_SOFT_TIMEOUT_SECS` | `240`    |
/// | `STEP_MAX_RETRIES`           | `0`      |
/// | `STEP_RETRY_BACKOFF_MS`      | `500`    |
/// | `MAX_SEARCH_QUERIES`         | `3`      |
/// | `MAX_TOPIC_LENGTH`           | `500`    |
/// | `STALE_JOB_GRACE_SECS`       | `60`     |
/// | `SWEEP_INTERVAL_SECS`        | `60`     |
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub execution_mode: ExecutionMode,
    /// Wall-clock limit for one whole execution.
    pub hard_timeout: Duration,
    /// Limit after which the running step is aborted gracefully.
    pub soft_timeout: Duration,
    pub retry: StepRetryPolicy,
    pub max_search_queries: usize,
    pub max_topic_length: usize,
    pub stale_grace: Duration,
    pub sweep_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Inline,
            hard_timeout: Duration::from_secs(300),
            soft_timeout: Duration::from_secs(240),
            retry: StepRetryPolicy {
                max_retries: 0,
                backoff: Duration::from_millis(500),
            },
            max_search_queries: 3,
            max_topic_length: 500,
            stale_grace: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// Panics on malformed values, like the server configuration does.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Duration {
            lookup(key)
                .map(|v| {
                    Duration::from_secs(
                        v.parse()
                            .unwrap_or_else(|_| panic!("{key} must be a valid u64")),
                    )
                })
                .unwrap_or(default)
        };

        let execution_mode = lookup("EXECUTION_MODE")
            .map(|v| v.parse().unwrap_or_else(|e: String| panic!("EXECUTION_MODE: {e}")))
            .unwrap_or(defaults.execution_mode);

        let max_retries: u32 = lookup("STEP_MAX_RETRIES")
            .map(|v| v.parse().expect("STEP_MAX_RETRIES must be a valid u32"))
            .unwrap_or(defaults.retry.max_retries);

        let backoff = lookup("STEP_RETRY_BACKOFF_MS")
            .map(|v| {
                Duration::from_millis(v.parse().expect("STEP_RETRY_BACKOFF_MS must be a valid u64"))
            })
            .unwrap_or(defaults.retry.backoff);

        let max_search_queries: usize = lookup("MAX_SEARCH_QUERIES")
            .map(|v| v.parse().expect("MAX_SEARCH_QUERIES must be a valid usize"))
            .unwrap_or(defaults.max_search_queries);

        let max_topic_length: usize = lookup("MAX_TOPIC_LENGTH")
            .map(|v| v.parse().expect("MAX_TOPIC_LENGTH must be a valid usize"))
            .unwrap_or(defaults.max_topic_length);

        Self {
            execution_mode,
            hard_timeout: secs("PIPELINE_HARD_TIMEOUT_SECS", defaults.hard_timeout),
            soft_timeout: secs("PIPELINE_SOFT_TIMEOUT_SECS", defaults.soft_timeout),
            retry: StepRetryPolicy {
                max_retries,
                backoff,
            },
            max_search_queries,
            max_topic_length,
            stale_grace: secs("STALE_JOB_GRACE_SECS", defaults.stale_grace),
            sweep_interval: secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
        }
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.hard_timeout.is_zero() {
            return Err(CoreError::Validation(
                "PIPELINE_HARD_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }
        if self.soft_timeout > self.hard_timeout {
            return Err(CoreError::Validation(format!(
                "soft timeout ({}s) must not exceed hard timeout ({}s)",
                self.soft_timeout.as_secs(),
                self.hard_timeout.as_secs()
            )));
        }
        if self.max_search_queries == 0 {
            return Err(CoreError::Validation(
                "MAX_SEARCH_QUERIES must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// How long an `IN_PROGRESS` job may go without an update before the
    /// reconciliation sweep fails it.
    pub fn stale_after(&self) -> Duration {
        self.hard_timeout + self.stale_grace
    }
}
