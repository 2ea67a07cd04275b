//! Enumerated configuration (spec §6): plain typed structs composed into
//! [`RailyardConfig`], validated with a standalone [`validate`] rather
//! than the teacher's `ConfigProperties`/file-loader machinery — there is
//! no config-file syntax here, so a caller builds this programmatically.

use std::time::Duration;

use railyard_core::WorkerLimit;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_limit: WorkerLimit,
    pub restart_worker: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_limit: WorkerLimit::Count(1),
            restart_worker: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub bail: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: 0,
            retry_delay: Duration::ZERO,
            bail: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutsConfig {
    pub test_timeout: Duration,
    pub context_close: Duration,
    pub browser_close: Duration,
    pub session_close: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(30),
            context_close: Duration::from_secs(5),
            browser_close: Duration::from_secs(5),
            session_close: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsStoreConfig {
    pub thread_count: usize,
    pub artifact_root: std::path::PathBuf,
}

impl Default for FsStoreConfig {
    fn default() -> Self {
        Self {
            thread_count: 10,
            artifact_root: std::env::temp_dir().join("railyard-artifacts"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DebugConfig {
    pub local: bool,
    pub trace_spawn: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RailyardConfig {
    pub pool: PoolConfig,
    pub retry: RetryConfig,
    pub timeouts: TimeoutsConfig,
    pub fs_store: FsStoreConfig,
    pub debug: DebugConfig,
}

/// One invalid field, aggregated by [`validate`] rather than failing fast
/// on the first problem, following the teacher's `ConfigValidationError`
/// aggregate-then-report shape.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks the invariants spec §6 implies (non-negative durations and
/// counts) without constructing anything. Returns every violation found,
/// not just the first.
pub fn validate(config: &RailyardConfig) -> Vec<ConfigError> {
    // `workerLimit = 0` is a valid, if degenerate, configuration (spec
    // §8: `runQueue` returns immediately with no errors), so it is not
    // flagged here. A zero `retryDelay` is likewise valid — an immediate
    // retry.
    let mut errors = Vec::new();

    if config.fs_store.thread_count == 0 {
        errors.push(ConfigError {
            field: "fsStore.threadCount",
            message: "must be at least 1".to_string(),
        });
    }

    for (field, duration) in [
        ("timeouts.testTimeout", config.timeouts.test_timeout),
        ("timeouts.contextClose", config.timeouts.context_close),
        ("timeouts.browserClose", config.timeouts.browser_close),
        ("timeouts.sessionClose", config.timeouts.session_close),
    ] {
        if duration.is_zero() {
            errors.push(ConfigError {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&RailyardConfig::default()).is_empty());
    }

    #[test]
    fn zero_test_timeout_is_rejected() {
        let mut config = RailyardConfig::default();
        config.timeouts.test_timeout = Duration::ZERO;
        let errors = validate(&config);
        assert!(errors.iter().any(|e| e.field == "timeouts.testTimeout"));
    }

    #[test]
    fn zero_thread_count_is_rejected() {
        let mut config = RailyardConfig::default();
        config.fs_store.thread_count = 0;
        let errors = validate(&config);
        assert!(errors.iter().any(|e| e.field == "fsStore.threadCount"));
    }

    #[test]
    fn worker_limit_zero_is_not_a_validation_error() {
        let mut config = RailyardConfig::default();
        config.pool.worker_limit = WorkerLimit::Count(0);
        assert!(validate(&config).is_empty());
    }
}
