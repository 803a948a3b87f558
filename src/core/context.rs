//! Engine context - the selected period, the cache, and cycle bookkeeping.
//!
//! Every aggregation cycle is stamped with a [`CycleToken`]. Changing the
//! period bumps the generation, so a cycle that was still fetching when the
//! user moved on produces a report that [`EngineContext::accept`] discards.

use crate::{cache::TtlCache, core::period::Period};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Identifies one aggregation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleToken {
    /// Period selected when the cycle started
    pub period: Period,
    /// Number of period changes before the cycle started
    pub generation: u64,
}

/// Anything produced by a cycle.
pub trait Stamped {
    /// Cycle the value was produced by.
    fn token(&self) -> CycleToken;
}

/// Shared state of one engine instance.
#[derive(Clone)]
pub struct EngineContext {
    cache: TtlCache,
    period: Arc<RwLock<Period>>,
    generation: Arc<AtomicU64>,
}

impl EngineContext {
    /// Context starting at `period`, generation zero.
    #[must_use]
    pub fn new(cache: TtlCache, period: Period) -> Self {
        Self {
            cache,
            period: Arc::new(RwLock::new(period)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cache shared by every cycle.
    #[must_use]
    pub const fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Currently selected period.
    pub async fn period(&self) -> Period {
        *self.period.read().await
    }

    /// Switches the selected period. The cache is cleared and every cycle
    /// started before the switch becomes stale.
    pub async fn select_period(&self, period: Period) {
        let mut current = self.period.write().await;
        if *current == period {
            debug!(%period, "period unchanged");
            return;
        }
        *current = period;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.clear().await;
        info!(%period, "period selected");
    }

    /// Drops cached data without changing the period.
    pub async fn force_reload(&self) {
        self.cache.clear().await;
        debug!("forced reload");
    }

    /// Drops a single cached collection after a mutation.
    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Stamps a new cycle for the currently selected period.
    pub async fn begin_cycle(&self) -> CycleToken {
        let period = self.period.read().await;
        CycleToken {
            period: *period,
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Whether `token` still describes the current selection.
    pub async fn is_current(&self, token: CycleToken) -> bool {
        let period = self.period.read().await;
        *period == token.period && self.generation.load(Ordering::SeqCst) == token.generation
    }

    /// Returns `output` unless its cycle has been superseded.
    pub async fn accept<T: Stamped>(&self, output: T) -> Option<T> {
        let token = output.token();
        if self.is_current(token).await {
            Some(output)
        } else {
            debug!(period = %token.period, generation = token.generation, "stale cycle discarded");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    struct Output(CycleToken);

    impl Stamped for Output {
        fn token(&self) -> CycleToken {
            self.0
        }
    }

    #[tokio::test]
    async fn test_stale_cycle_is_discarded() {
        let may: Period = "2024-05".parse().unwrap();
        let ctx = EngineContext::new(TtlCache::default(), may);

        let token = ctx.begin_cycle().await;
        ctx.select_period(may.next()).await;
        assert!(ctx.accept(Output(token)).await.is_none());

        let fresh = ctx.begin_cycle().await;
        assert_eq!(fresh.period, may.next());
        assert!(ctx.accept(Output(fresh)).await.is_some());
    }

    #[tokio::test]
    async fn test_going_back_to_a_period_still_invalidates() {
        let may: Period = "2024-05".parse().unwrap();
        let ctx = EngineContext::new(TtlCache::default(), may);

        let token = ctx.begin_cycle().await;
        ctx.select_period(may.next()).await;
        ctx.select_period(may).await;
        assert!(!ctx.is_current(token).await);
    }

    #[tokio::test]
    async fn test_select_period_clears_cache() {
        let may: Period = "2024-05".parse().unwrap();
        let ctx = EngineContext::new(TtlCache::default(), may);
        ctx.cache().set("revenues", 1_u32).await;

        // Same period: nothing happens.
        ctx.select_period(may).await;
        assert_eq!(ctx.cache().get::<u32>("revenues").await, Some(1));

        ctx.select_period(may.previous()).await;
        assert_eq!(ctx.cache().get::<u32>("revenues").await, None);
        assert_eq!(ctx.period().await, may.previous());
    }

    #[tokio::test]
    async fn test_force_reload_keeps_cycle_current() {
        let may: Period = "2024-05".parse().unwrap();
        let ctx = EngineContext::new(TtlCache::default(), may);
        ctx.cache().set("expenses", 1_u32).await;
        let token = ctx.begin_cycle().await;

        ctx.force_reload().await;
        assert_eq!(ctx.cache().get::<u32>("expenses").await, None);
        assert!(ctx.is_current(token).await);
    }
}
