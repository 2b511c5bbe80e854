use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

/// Errors that may go away when the same request is sent again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Rate limiting and server side failures are worth another attempt, anything else in the 4xx range is not.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub fn is_transient_request(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Exponential backoff with jitter: roughly 200ms, 400ms, 800ms... capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: usize,
    base: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `attempts` is the number of retries after the first try.
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts,
            base: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }

    pub fn with_base(self, base: Duration) -> Self {
        Self { base, ..self }
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        let factor = self.base.as_millis().max(1) as u64;

        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.attempts)
    }

    /// Run `action` until it succeeds, fails with a permanent error, or the attempts run out.
    pub async fn run<T, E, F, Fut>(&self, action: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + std::fmt::Display,
    {
        RetryIf::start(self.strategy(), action, |error: &E| {
            let transient = error.is_transient();
            if transient {
                tracing::warn!(%error, "transient failure, retrying");
            }
            transient
        })
        .await
    }
}
