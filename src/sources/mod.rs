//! Source fetchers - the collaborator interface the engine reads and writes
//! record collections through.
//!
//! Each collection is reached through a minimal CRUD contract
//! ([`RecordSource`]). The engine never assumes anything about the transport
//! behind it; the crate ships a SeaORM implementation in [`database`] and
//! every source is wrapped in one shared [`RetryPolicy`].

use crate::{
    core::period::Period,
    entities::{employee, encumbrance, expense, fixed_expense, misc_payroll, revenue},
    errors::Result,
};
use async_trait::async_trait;
use std::sync::Arc;

/// SeaORM-backed sources
pub mod database;
/// Bounded retries around any source
pub mod retry;

pub use retry::{Backoff, RetryPolicy, Retrying};

/// CRUD access to one record collection.
#[async_trait]
pub trait RecordSource<M>: Send + Sync
where
    M: Clone + Send + Sync + 'static,
{
    /// Collection name used in logs and `SourceUnavailable` errors.
    fn collection(&self) -> &'static str;

    /// Every record in the collection.
    async fn list(&self) -> Result<Vec<M>>;

    /// Stores a new record; the returned copy carries the assigned id.
    async fn create(&self, record: M) -> Result<M>;

    /// Replaces the stored record with the same id.
    async fn update(&self, record: M) -> Result<M>;

    /// Removes the record with `id`.
    async fn delete(&self, id: i64) -> Result<()>;
}

/// The working-capital figure added to period revenue in the cash-flow view.
#[async_trait]
pub trait WorkingCapitalSource: Send + Sync {
    /// Current figure, or the configured default.
    async fn working_capital(&self) -> Result<f64>;
}

/// Primary revenue statistic: total revenue of a period across all units.
#[async_trait]
pub trait RevenueStatistics: Send + Sync {
    /// Total revenue of `period`.
    async fn monthly_revenue(&self, period: Period) -> Result<f64>;
}

/// Every collaborator the engine talks to, bundled for injection.
#[derive(Clone)]
pub struct Sources {
    /// Expenses, envelope withdrawals included
    pub expenses: Arc<dyn RecordSource<expense::Model>>,
    /// Revenue entries
    pub revenues: Arc<dyn RecordSource<revenue::Model>>,
    /// Payroll, allowance withdrawals included
    pub employees: Arc<dyn RecordSource<employee::Model>>,
    /// Encumbrances
    pub encumbrances: Arc<dyn RecordSource<encumbrance::Model>>,
    /// Miscellaneous payroll
    pub misc_payroll: Arc<dyn RecordSource<misc_payroll::Model>>,
    /// Fixed-expense envelopes
    pub envelopes: Arc<dyn RecordSource<fixed_expense::Model>>,
    /// Working capital
    pub working_capital: Arc<dyn WorkingCapitalSource>,
    /// Primary revenue statistic
    pub revenue_stats: Arc<dyn RevenueStatistics>,
}
