//! SeaORM-backed sources over the `SQLite` record store.
//!
//! One generic [`SeaOrmSource`] serves every record collection. The settings
//! table backs the working-capital figure, and revenue statistics are
//! answered with a date-range query.

use super::{
    RecordSource, RetryPolicy, Retrying, RevenueStatistics, Sources, WorkingCapitalSource,
};
use crate::{
    core::period::Period,
    entities::{
        Employee, Encumbrance, Expense, FixedExpense, MiscPayroll, Revenue, Setting, revenue,
        setting,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, IntoActiveModel, Iterable, PrimaryKeyToColumn, PrimaryKeyTrait, Set,
    prelude::*,
};
use std::{marker::PhantomData, sync::Arc};
use tracing::debug;

/// Settings key of the working-capital figure.
pub const WORKING_CAPITAL_KEY: &str = "working_capital";

/// A record collection stored in one database table.
pub struct SeaOrmSource<E> {
    db: DatabaseConnection,
    collection: &'static str,
    _entity: PhantomData<E>,
}

impl<E> SeaOrmSource<E> {
    /// Source over the table of `E`, named `collection` in logs.
    pub const fn new(db: DatabaseConnection, collection: &'static str) -> Self {
        Self {
            db,
            collection,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E> RecordSource<E::Model> for SeaOrmSource<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync + 'static,
    E::ActiveModel: Send,
    i64: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    fn collection(&self) -> &'static str {
        self.collection
    }

    async fn list(&self) -> Result<Vec<E::Model>> {
        E::find().all(&self.db).await.map_err(Into::into)
    }

    async fn create(&self, record: E::Model) -> Result<E::Model> {
        // Every column is written except the key, which the store assigns.
        let mut active = record.into_active_model().reset_all();
        for key in <E::PrimaryKey as Iterable>::iter() {
            active.not_set(key.into_column());
        }
        let created = active.insert(&self.db).await?;
        debug!(collection = self.collection, "record created");
        Ok(created)
    }

    async fn update(&self, record: E::Model) -> Result<E::Model> {
        let active = record.into_active_model().reset_all();
        active.update(&self.db).await.map_err(Into::into)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = E::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(Error::RecordNotFound {
                collection: self.collection,
                id,
            });
        }
        debug!(collection = self.collection, id, "record deleted");
        Ok(())
    }
}

/// Key/value settings persisted in the `settings` table.
#[derive(Clone)]
pub struct SettingsStore {
    db: DatabaseConnection,
    default_working_capital: f64,
}

impl SettingsStore {
    /// `default_working_capital` applies until a figure is persisted.
    #[must_use]
    pub const fn new(db: DatabaseConnection, default_working_capital: f64) -> Self {
        Self {
            db,
            default_working_capital,
        }
    }

    /// Raw value stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = Setting::find()
            .filter(setting::Column::Key.eq(key))
            .one(&self.db)
            .await?;
        Ok(row.map(|s| s.value))
    }

    /// Inserts or overwrites `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().naive_utc();
        let existing = Setting::find()
            .filter(setting::Column::Key.eq(key))
            .one(&self.db)
            .await?;

        if let Some(row) = existing {
            let mut active_model: setting::ActiveModel = row.into();
            active_model.value = Set(value.to_string());
            active_model.updated_at = Set(now);
            active_model.update(&self.db).await?;
        } else {
            let new_row = setting::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value.to_string()),
                updated_at: Set(now),
                ..Default::default()
            };
            new_row.insert(&self.db).await?;
        }
        Ok(())
    }

    /// Numeric value stored under `key`, if any.
    pub async fn get_amount(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)
            .await?
            .map(|raw| {
                raw.parse::<f64>().map_err(|e| {
                    Error::config(format!("Setting '{key}' is not a number ('{raw}'): {e}"))
                })
            })
            .transpose()
    }

    /// Stores a numeric value under `key`.
    pub async fn set_amount(&self, key: &str, amount: f64) -> Result<()> {
        if !amount.is_finite() {
            return Err(Error::InvalidAmount { amount });
        }
        self.set(key, &amount.to_string()).await
    }

    /// Persists a new working-capital figure.
    pub async fn set_working_capital(&self, amount: f64) -> Result<()> {
        self.set_amount(WORKING_CAPITAL_KEY, amount).await
    }
}

#[async_trait]
impl WorkingCapitalSource for SettingsStore {
    async fn working_capital(&self) -> Result<f64> {
        Ok(self
            .get_amount(WORKING_CAPITAL_KEY)
            .await?
            .unwrap_or(self.default_working_capital))
    }
}

/// Revenue statistics computed by the store.
#[derive(Clone)]
pub struct DbRevenueStatistics {
    db: DatabaseConnection,
}

impl DbRevenueStatistics {
    /// Statistics computed from the revenue table.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RevenueStatistics for DbRevenueStatistics {
    async fn monthly_revenue(&self, period: Period) -> Result<f64> {
        let rows = Revenue::find()
            .filter(revenue::Column::Date.between(period.first_day(), period.last_day()))
            .all(&self.db)
            .await?;
        Ok(rows.iter().map(|r| r.total).sum())
    }
}

impl Sources {
    /// Wires every collection to the database, each behind `policy`.
    #[must_use]
    pub fn from_database(
        db: &DatabaseConnection,
        settings: SettingsStore,
        policy: RetryPolicy,
    ) -> Self {
        fn table<E>(
            db: &DatabaseConnection,
            name: &'static str,
            policy: RetryPolicy,
        ) -> Arc<Retrying<SeaOrmSource<E>>> {
            Arc::new(Retrying::new(SeaOrmSource::new(db.clone(), name), policy))
        }

        Self {
            expenses: table::<Expense>(db, "expenses", policy),
            revenues: table::<Revenue>(db, "revenues", policy),
            employees: table::<Employee>(db, "employees", policy),
            encumbrances: table::<Encumbrance>(db, "encumbrances", policy),
            misc_payroll: table::<MiscPayroll>(db, "misc_payroll", policy),
            envelopes: table::<FixedExpense>(db, "fixed_expenses", policy),
            working_capital: Arc::new(Retrying::new(settings, policy)),
            revenue_stats: Arc::new(Retrying::new(DbRevenueStatistics::new(db.clone()), policy)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{entities::expense, test_utils::*};

    #[tokio::test]
    async fn test_create_assigns_id_and_list_returns_it() -> Result<()> {
        let db = setup_test_db().await?;
        let source = SeaOrmSource::<Expense>::new(db.clone(), "expenses");

        let first = source
            .create(expense_record("2024-05-03", "Padaria", 120.0, "UN1", true))
            .await?;
        let second = source
            .create(expense_record("2024-05-04", "Mercado", 80.0, "UN2", false))
            .await?;
        assert_ne!(first.id, second.id);

        let all = source.list().await?;
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|e| e.payee == "Padaria" && e.paid));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete() -> Result<()> {
        let db = setup_test_db().await?;
        let source = SeaOrmSource::<Expense>::new(db.clone(), "expenses");

        let mut created = source
            .create(expense_record("2024-05-03", "Luz", 300.0, "UN1", false))
            .await?;
        created.paid = true;
        created.bank = Some("Caixa".to_string());
        let updated = source.update(created.clone()).await?;
        assert!(updated.paid);
        assert_eq!(updated.bank.as_deref(), Some("Caixa"));

        source.delete(created.id).await?;
        assert!(source.list().await?.is_empty());

        let missing = source.delete(created.id).await;
        assert!(matches!(missing, Err(Error::RecordNotFound { id, .. }) if id == created.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_settings_round_trip_and_working_capital_default() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = SettingsStore::new(db.clone(), 1500.0);

        assert_eq!(settings.working_capital().await?, 1500.0);
        settings.set_working_capital(8000.0).await?;
        settings.set_working_capital(9000.0).await?;
        assert_eq!(settings.working_capital().await?, 9000.0);

        let rows = Setting::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_revenue_statistics_respects_period_bounds() -> Result<()> {
        let db = setup_test_db().await?;
        let source = SeaOrmSource::<Revenue>::new(db.clone(), "revenues");
        source.create(revenue_record("2024-04-30", "UN1", 999.0)).await?;
        source.create(revenue_record("2024-05-01", "UN1", 100.0)).await?;
        source.create(revenue_record("2024-05-31", "UN2", 250.0)).await?;

        let stats = DbRevenueStatistics::new(db);
        let may: Period = "2024-05".parse()?;
        assert_eq!(stats.monthly_revenue(may).await?, 350.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_from_database_wires_every_collection() -> Result<()> {
        let db = setup_test_db().await?;
        let sources = Sources::from_database(
            &db,
            SettingsStore::new(db.clone(), 0.0),
            RetryPolicy::immediate(1),
        );
        assert_eq!(sources.expenses.collection(), "expenses");
        assert_eq!(sources.envelopes.collection(), "fixed_expenses");
        let created = sources
            .expenses
            .create(expense::Model {
                envelope_id: Some(3),
                ..expense_record("2024-05-10", "DF-3-Retirada", 50.0, "UN1", true)
            })
            .await?;
        assert_eq!(created.envelope_id, Some(3));
        Ok(())
    }
}
