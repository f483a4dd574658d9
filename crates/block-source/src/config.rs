use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use serde::{Deserialize, Serialize};

// Block source config
// ================================================================================================

/// Retry behaviour of a [`StreamingBlockSource`](crate::StreamingBlockSource).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BlockSourceConfig {
    /// Number of times a failed producer request is retried before the failure is reported.
    ///
    /// Range requests are idempotent by rollup id so they are always safe to repeat.
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds. Doubled after every further failure.
    pub retry_backoff_ms: u64,

    /// Upper bound on the retry delay, in milliseconds.
    pub max_retry_backoff_ms: u64,
}

impl BlockSourceConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.max_retry_backoff_ms)
    }
}

impl Display for BlockSourceConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{{ max_retries: {}, retry_backoff_ms: {}, max_retry_backoff_ms: {} }}",
            self.max_retries, self.retry_backoff_ms, self.max_retry_backoff_ms,
        ))
    }
}

impl Default for BlockSourceConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_backoff_ms: 100,
            max_retry_backoff_ms: 5_000,
        }
    }
}

// Local producer config
// ================================================================================================

/// Configuration of the in-process [`LocalBlockProducer`](crate::LocalBlockProducer).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LocalProducerConfig {
    /// Maximum number of blocks returned by a single range fetch.
    pub page_size: usize,

    /// Number of live notifications buffered per subscriber before it is considered lagging.
    pub live_capacity: usize,
}

impl Display for LocalProducerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{{ page_size: {}, live_capacity: {} }}",
            self.page_size, self.live_capacity,
        ))
    }
}

impl Default for LocalProducerConfig {
    fn default() -> Self {
        Self { page_size: 128, live_capacity: 1024 }
    }
}
