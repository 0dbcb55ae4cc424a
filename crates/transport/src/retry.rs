use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::Transport;

/// Delay curve between retry attempts. Every variant is clamped to `max`.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// `delay * (attempt + 1)`.
    Linear {
        /// Per-attempt increment.
        delay: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
    },
    /// `base * multiplier^attempt`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
        /// Factor applied on each successive attempt.
        multiplier: f64,
    },
}

impl Backoff {
    /// Upper bound on any delay this curve produces.
    pub fn max(&self) -> Duration {
        match self {
            Self::Linear { max, .. } | Self::Exponential { max, .. } => *max,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Linear { delay, max } => {
                let raw = delay.as_secs_f64() * f64::from(attempt + 1);
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
            Self::Exponential {
                base,
                max,
                multiplier,
            } => {
                // `attempt` is a small retry count, so the cast cannot wrap.
                #[allow(clippy::cast_possible_wrap)]
                let raw = base.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
        }
    }
}

/// Bounded retry policy for the transient-overload signal.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    /// Delay curve between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Linear {
                delay: Duration::from_secs(1),
                max: Duration::from_secs(10),
            },
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Linear backoff with the given step and cap.
    pub fn linear(max_retries: u32, delay: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Linear { delay, max },
        }
    }

    /// Delay before retry `attempt`, honouring a larger backend hint up to
    /// the backoff cap.
    pub fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = self.backoff.delay_for(attempt);
        hint.map_or(computed, |h| h.max(computed).min(self.backoff.max()))
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(TransportError::RateLimited { retry_after }) => {
                    if attempt >= self.max_retries {
                        warn!(what, attempts = attempt + 1, "retries exhausted");
                        return Err(TransportError::RetriesExhausted {
                            attempts: attempt + 1,
                        });
                    }
                    let delay = self.delay(attempt, retry_after);
                    warn!(
                        what,
                        attempt,
                        delay_ms = %delay.as_millis(),
                        "rate limited, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(what, attempt, error = %err, "non-retryable transport error");
                    return Err(err);
                }
            }
        }
    }
}

/// Serializable form of a [`RetryPolicy`] for configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff step in milliseconds.
    pub delay_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::linear(
            config.max_retries,
            Duration::from_millis(config.delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

/// [`Transport`] decorator that retries rate-limited calls under a
/// [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryTransport<T> {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let what = format!("{} {}", request.method.as_str(), request.endpoint);
        self.policy
            .run(&what, || self.inner.send(request.clone()))
            .await
    }

    async fn fetch_binary(&self, url: &str) -> Result<Bytes, TransportError> {
        self.policy
            .run("fetch attachment", || self.inner.fetch_binary(url))
            .await
    }
}
