//! One retry policy for every source.
//!
//! Transient failures (store errors) are retried a bounded number of times
//! with a fixed or doubling delay. Once the attempts are exhausted the
//! failure surfaces as `Error::SourceUnavailable`. Deterministic failures
//! such as validation or balance checks are returned immediately.

use super::{RecordSource, RevenueStatistics, WorkingCapitalSource};
use crate::{
    core::period::Period,
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::{future::Future, time::Duration};
use tracing::warn;

/// How the delay grows between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after every failed attempt.
    Exponential,
}

/// Bounded retry policy shared by all sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub delay_ms: u64,
    /// Growth of the delay
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping, for tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay_ms: 0,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.delay_ms);
        match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential => {
                let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor)
            }
        }
    }

    /// Runs `op` until it succeeds, fails non-transiently, or runs out of
    /// attempts.
    pub async fn run<T, F, Fut>(&self, collection: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    warn!(collection, attempt, error = %e, "source retries exhausted");
                    return Err(Error::SourceUnavailable {
                        collection: collection.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        collection,
                        attempt,
                        remaining = max_attempts - attempt,
                        error = %e,
                        "source call failed, retrying"
                    );
                    let delay = self.delay_after(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Wraps any source so that each call goes through a [`RetryPolicy`].
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    /// Wraps `inner` with `policy`.
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<M, S> RecordSource<M> for Retrying<S>
where
    M: Clone + Send + Sync + 'static,
    S: RecordSource<M>,
{
    fn collection(&self) -> &'static str {
        self.inner.collection()
    }

    async fn list(&self) -> Result<Vec<M>> {
        self.policy
            .run(self.collection(), || self.inner.list())
            .await
    }

    async fn create(&self, record: M) -> Result<M> {
        self.policy
            .run(self.collection(), || self.inner.create(record.clone()))
            .await
    }

    async fn update(&self, record: M) -> Result<M> {
        self.policy
            .run(self.collection(), || self.inner.update(record.clone()))
            .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.policy
            .run(self.collection(), || self.inner.delete(id))
            .await
    }
}

#[async_trait]
impl<S: WorkingCapitalSource> WorkingCapitalSource for Retrying<S> {
    async fn working_capital(&self) -> Result<f64> {
        self.policy
            .run("working_capital", || self.inner.working_capital())
            .await
    }
}

#[async_trait]
impl<S: RevenueStatistics> RevenueStatistics for Retrying<S> {
    async fn monthly_revenue(&self, period: Period) -> Result<f64> {
        self.policy
            .run("revenue_statistics", || self.inner.monthly_revenue(period))
            .await
    }
}
