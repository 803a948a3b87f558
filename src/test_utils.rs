//! Shared test utilities.
//!
//! Helpers for setting up an in-memory store, building records with sensible
//! defaults, and source doubles that fail or count calls.

#![allow(clippy::unwrap_used)]

use crate::{
    config::database::create_tables,
    core::period::Period,
    entities::{EncumbranceModel, MiscPayrollModel, employee, expense, fixed_expense, revenue},
    errors::{Error, Result},
    sources::{
        RecordSource, RetryPolicy, RevenueStatistics, Sources, WorkingCapitalSource,
        database::SettingsStore,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tracing_subscriber::EnvFilter;

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Database-backed sources over `db` with the given default working capital.
/// Retries are disabled.
pub async fn sources_with_capital(db: &DatabaseConnection, working_capital: f64) -> Result<Sources> {
    create_tables(db).await?;
    Ok(Sources::from_database(
        db,
        SettingsStore::new(db.clone(), working_capital),
        RetryPolicy::immediate(1),
    ))
}

/// Fresh store plus sources wired to it.
pub async fn setup_sources() -> Result<(DatabaseConnection, Sources)> {
    let db = setup_test_db().await?;
    let sources = sources_with_capital(&db, 0.0).await?;
    Ok((db, sources))
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// A standalone variable expense with no payment details.
pub fn expense_record(day: &str, payee: &str, amount: f64, unit: &str, paid: bool) -> expense::Model {
    expense::Model {
        id: 0,
        date: date(day),
        payee: payee.to_string(),
        amount,
        unit: unit.to_string(),
        category: expense::CATEGORY_VARIABLE.to_string(),
        paid,
        bank: None,
        method: None,
        envelope_id: None,
    }
}

/// A revenue entry taken entirely in cash.
pub fn revenue_record(day: &str, unit: &str, total: f64) -> revenue::Model {
    revenue::Model {
        id: 0,
        date: date(day),
        unit: unit.to_string(),
        cash: total,
        debit: 0.0,
        credit: 0.0,
        instant_transfer: 0.0,
        voucher: 0.0,
        total,
    }
}

pub fn employee_record(name: &str, amount: f64, unit: &str, paid: bool) -> employee::Model {
    employee::Model {
        id: 0,
        name: name.to_string(),
        amount,
        unit: unit.to_string(),
        paid,
        allowance_period: None,
    }
}

/// An allowance withdrawal with a fixed id, as the store would return it.
pub fn allowance_record(id: i64, unit: &str, period: Period, amount: f64) -> employee::Model {
    employee::Model {
        id,
        name: employee::allowance_withdrawal_name(period, "teste"),
        amount,
        unit: unit.to_string(),
        paid: true,
        allowance_period: Some(period.to_string()),
    }
}

pub fn envelope_record(id: i64, name: &str, unit: &str, period: &str, total: f64) -> fixed_expense::Model {
    fixed_expense::Model {
        id,
        name: name.to_string(),
        unit: unit.to_string(),
        period: period.to_string(),
        total,
    }
}

pub fn encumbrance_record(kind: &str, amount: f64, unit: &str, period: &str, paid: bool) -> EncumbranceModel {
    EncumbranceModel {
        id: 0,
        kind: kind.to_string(),
        amount,
        unit: unit.to_string(),
        period: period.to_string(),
        paid,
    }
}

pub fn misc_record(kind: &str, amount: f64, unit: &str, period: &str, paid: bool) -> MiscPayrollModel {
    MiscPayrollModel {
        id: 0,
        kind: kind.to_string(),
        amount,
        unit: unit.to_string(),
        period: period.to_string(),
        paid,
    }
}

fn unavailable(collection: &str) -> Error {
    Error::SourceUnavailable {
        collection: collection.to_string(),
        attempts: 1,
        message: "connection refused".to_string(),
    }
}

const FAILING: &str = "failing";

/// A source whose every call fails as if retries were exhausted.
pub struct FailingSource;

#[async_trait]
impl<M> RecordSource<M> for FailingSource
where
    M: Clone + Send + Sync + 'static,
{
    fn collection(&self) -> &'static str {
        FAILING
    }

    async fn list(&self) -> Result<Vec<M>> {
        Err(unavailable(FAILING))
    }

    async fn create(&self, _record: M) -> Result<M> {
        Err(unavailable(FAILING))
    }

    async fn update(&self, _record: M) -> Result<M> {
        Err(unavailable(FAILING))
    }

    async fn delete(&self, _id: i64) -> Result<()> {
        Err(unavailable(FAILING))
    }
}

#[async_trait]
impl WorkingCapitalSource for FailingSource {
    async fn working_capital(&self) -> Result<f64> {
        Err(unavailable("working_capital"))
    }
}

#[async_trait]
impl RevenueStatistics for FailingSource {
    async fn monthly_revenue(&self, _period: Period) -> Result<f64> {
        Err(unavailable("revenue_statistics"))
    }
}

/// Wraps a source and counts `list` calls.
pub struct CountingSource<M>
where
    M: Clone + Send + Sync + 'static,
{
    inner: Arc<dyn RecordSource<M>>,
    pub lists: AtomicUsize,
}

impl<M> CountingSource<M>
where
    M: Clone + Send + Sync + 'static,
{
    pub fn new(inner: Arc<dyn RecordSource<M>>) -> Self {
        Self {
            inner,
            lists: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<M> RecordSource<M> for CountingSource<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn collection(&self) -> &'static str {
        self.inner.collection()
    }

    async fn list(&self) -> Result<Vec<M>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list().await
    }

    async fn create(&self, record: M) -> Result<M> {
        self.inner.create(record).await
    }

    async fn update(&self, record: M) -> Result<M> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id).await
    }
}

/// In-memory payroll collection whose deletes fail for chosen ids.
pub struct ScriptedEmployees {
    records: Mutex<Vec<employee::Model>>,
    failing_deletes: Vec<i64>,
}

#[async_trait]
impl RecordSource<employee::Model> for ScriptedEmployees {
    fn collection(&self) -> &'static str {
        "employees"
    }

    async fn list(&self) -> Result<Vec<employee::Model>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn create(&self, mut record: employee::Model) -> Result<employee::Model> {
        let mut records = self.records.lock().unwrap();
        record.id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: employee::Model) -> Result<employee::Model> {
        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(Error::RecordNotFound {
                collection: "employees",
                id: record.id,
            })?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if self.failing_deletes.contains(&id) {
            return Err(unavailable(self.collection()));
        }
        self.records.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}

/// Sources whose payroll collection is [`ScriptedEmployees`]; every other
/// collection fails.
pub fn sources_with_employees(records: Vec<employee::Model>, failing_deletes: Vec<i64>) -> Sources {
    Sources {
        expenses: Arc::new(FailingSource),
        revenues: Arc::new(FailingSource),
        employees: Arc::new(ScriptedEmployees {
            records: Mutex::new(records),
            failing_deletes,
        }),
        encumbrances: Arc::new(FailingSource),
        misc_payroll: Arc::new(FailingSource),
        envelopes: Arc::new(FailingSource),
        working_capital: Arc::new(FailingSource),
        revenue_stats: Arc::new(FailingSource),
    }
}
