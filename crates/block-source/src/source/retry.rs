use std::{future::Future, time::Duration};

use tokio::sync::watch;
use tracing::warn;

use crate::{
    config::BlockSourceConfig,
    errors::{BlockSourceError, ProducerError},
    COMPONENT,
};

// SHUTDOWN
// =================================================================================================

/// Shutdown signal of a single `start`/`stop` session.
///
/// A closed channel counts as triggered, so a session can never outlive the phase which owns the
/// sending half.
#[derive(Clone, Debug)]
pub(super) struct Shutdown(Option<watch::Receiver<bool>>);

impl Shutdown {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self(Some(receiver))
    }

    /// A signal which never triggers, for requests made outside of a session.
    pub fn never() -> Self {
        Self(None)
    }

    pub fn is_triggered(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|receiver| *receiver.borrow() || receiver.has_changed().is_err())
    }

    /// Resolves once the signal has been triggered.
    pub async fn triggered(&self) {
        match &self.0 {
            Some(receiver) => {
                let mut receiver = receiver.clone();
                // An error means the sender is gone, which is treated the same as a trigger.
                let _ = receiver.wait_for(|stop| *stop).await;
            },
            None => std::future::pending().await,
        }
    }
}

// RETRY POLICY
// =================================================================================================

/// Exponential backoff for block producer requests.
#[derive(Clone, Debug)]
pub(super) struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl From<&BlockSourceConfig> for RetryPolicy {
    fn from(config: &BlockSourceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.retry_backoff(),
            max_backoff: config.max_retry_backoff(),
        }
    }
}

impl RetryPolicy {
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs `request` until it succeeds, the retry budget is exhausted, or `shutdown` triggers.
    ///
    /// Only idempotent requests may be passed in, as a request is repeated after any error.
    pub async fn run<T, F, Fut>(
        &self,
        shutdown: &Shutdown,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, BlockSourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProducerError>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let result = tokio::select! {
                biased;
                () = shutdown.triggered() => return Err(BlockSourceError::Cancelled),
                result = request() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempts > self.max_retries {
                return Err(BlockSourceError::TransportFailure { attempts, source: err });
            }

            warn!(
                target: COMPONENT,
                operation,
                attempts,
                backoff = ?self.backoff(attempts),
                error = %err,
                "block producer request failed, retrying",
            );

            self.pause(shutdown, attempts).await?;
        }
    }

    /// Sleeps for the backoff of the given (1-based) retry attempt, unless `shutdown` triggers
    /// first.
    pub async fn pause(&self, shutdown: &Shutdown, attempt: u32) -> Result<(), BlockSourceError> {
        tokio::select! {
            biased;
            () = shutdown.triggered() => Err(BlockSourceError::Cancelled),
            () = tokio::time::sleep(self.backoff(attempt)) => Ok(()),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use tokio::sync::watch;

    use super::{RetryPolicy, Shutdown};
    use crate::{
        config::BlockSourceConfig,
        errors::{BlockSourceError, ProducerError},
    };

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::from(&BlockSourceConfig {
            max_retries,
            retry_backoff_ms: 10,
            max_retry_backoff_ms: 40,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = &AtomicU32::new(0);

        let result = policy(3)
            .run(&Shutdown::never(), "test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProducerError::Unavailable("offline".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_the_last_error() {
        let result: Result<(), _> = policy(2)
            .run(&Shutdown::never(), "test", || async { Err(ProducerError::StreamClosed) })
            .await;

        assert_matches!(
            result,
            Err(BlockSourceError::TransportFailure {
                attempts: 3,
                source: ProducerError::StreamClosed
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_pending_requests() {
        let (sender, receiver) = watch::channel(false);
        let shutdown = Shutdown::new(receiver);

        let pending = tokio::spawn(async move {
            policy(0)
                .run(&shutdown, "test", || std::future::pending::<Result<(), ProducerError>>())
                .await
        });

        sender.send(true).unwrap();
        assert_matches!(pending.await.unwrap(), Err(BlockSourceError::Cancelled));
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = policy(10);
        let delays: Vec<_> = (1..=4).map(|attempt| policy.backoff(attempt).as_millis()).collect();
        assert_eq!(delays, vec![10, 20, 40, 40]);
    }

    #[test]
    fn dropped_sender_counts_as_triggered() {
        let (sender, receiver) = watch::channel(false);
        let shutdown = Shutdown::new(receiver);
        assert!(!shutdown.is_triggered());

        drop(sender);
        assert!(shutdown.is_triggered());
        assert!(!Shutdown::never().is_triggered());
    }
}
