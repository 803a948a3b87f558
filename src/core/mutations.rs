//! Writes made through an [`Aggregator`].
//!
//! Each method runs one operation from [`envelope`], [`allowance`] or
//! [`records`] and, once the store has accepted it, drops the cache keys the
//! write touched. The next cycle then fetches those collections again instead
//! of serving the cached copy until it expires. A rejected write leaves the
//! cache alone.

use crate::{
    core::{
        aggregate::{Aggregator, keys},
        allowance::{self, AllowanceConfig, BatchReport},
        envelope,
        period::Period,
        records::{self, RevenueChannels},
    },
    entities::{EncumbranceModel, MiscPayrollModel, employee, expense, fixed_expense, revenue},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use tracing::debug;

impl Aggregator {
    async fn invalidating<T>(&self, result: Result<T>, touched: &[&str]) -> Result<T> {
        if result.is_ok() {
            for key in touched {
                self.context().invalidate(key).await;
            }
            debug!(?touched, "cache keys invalidated after write");
        }
        result
    }

    /// See [`envelope::withdraw`].
    pub async fn withdraw_from_envelope(
        &self,
        envelope: &fixed_expense::Model,
        amount: f64,
        date: NaiveDate,
    ) -> Result<expense::Model> {
        let result = envelope::withdraw(self.sources(), envelope, amount, date).await;
        self.invalidating(result, &[keys::EXPENSES]).await
    }

    /// See [`envelope::create_envelope`].
    pub async fn create_envelope(
        &self,
        name: &str,
        unit: &str,
        period: Period,
        total: f64,
    ) -> Result<fixed_expense::Model> {
        let result = envelope::create_envelope(self.sources(), name, unit, period, total).await;
        self.invalidating(result, &[keys::ENVELOPES]).await
    }

    /// See [`envelope::update_total`].
    pub async fn update_envelope_total(
        &self,
        envelope: &fixed_expense::Model,
        new_total: f64,
    ) -> Result<fixed_expense::Model> {
        let result = envelope::update_total(self.sources(), envelope, new_total).await;
        self.invalidating(result, &[keys::ENVELOPES]).await
    }

    /// See [`envelope::delete`].
    pub async fn delete_envelope(&self, envelope: &fixed_expense::Model) -> Result<()> {
        let result = envelope::delete(self.sources(), envelope).await;
        self.invalidating(result, &[keys::ENVELOPES]).await
    }

    /// Withdraws from `unit`'s allowance share using the configuration
    /// resolved for `period`. See [`allowance::withdraw`].
    pub async fn withdraw_allowance(
        &self,
        unit: &str,
        period: Period,
        amount: f64,
        note: &str,
    ) -> Result<employee::Model> {
        let config = self.allowance_for(period).await?;
        let result = allowance::withdraw(self.sources(), &config, unit, period, amount, note).await;
        self.invalidating(result, &[keys::EMPLOYEES]).await
    }

    /// See [`allowance::zero_all_withdrawals`]. Partial failures still
    /// invalidate, since some records may be gone.
    pub async fn zero_allowance_withdrawals(&self, period: Period) -> Result<BatchReport> {
        let result = allowance::zero_all_withdrawals(self.sources(), period).await;
        self.invalidating(result, &[keys::EMPLOYEES]).await
    }

    /// Persists a new monthly allowance amount for `period` and returns the
    /// resulting configuration. Needs a settings store.
    pub async fn reset_allowance_total(
        &self,
        period: Period,
        new_monthly_amount: f64,
    ) -> Result<AllowanceConfig> {
        let settings = self
            .settings()
            .ok_or_else(|| Error::config("No settings store to persist the allowance total"))?;
        let mut config = self.allowance_for(period).await?;
        let result = allowance::persist_total(settings, &mut config, period, new_monthly_amount)
            .await
            .map(|()| config);
        let allowance_key = keys::allowance(period);
        self.invalidating(result, &[allowance_key.as_str()]).await
    }

    /// Persists a new working-capital figure. Needs a settings store.
    pub async fn set_working_capital(&self, amount: f64) -> Result<()> {
        let settings = self
            .settings()
            .ok_or_else(|| Error::config("No settings store to persist working capital"))?;
        let result = settings.set_working_capital(amount).await;
        self.invalidating(result, &[keys::WORKING_CAPITAL]).await
    }

    /// See [`records::record_revenue`]. Also drops the revenue statistic of
    /// the entry's period.
    pub async fn record_revenue(
        &self,
        date: NaiveDate,
        unit: &str,
        channels: RevenueChannels,
    ) -> Result<revenue::Model> {
        let result = records::record_revenue(self.sources(), date, unit, channels).await;
        let stats_key = keys::revenue_statistics(Period::of(date));
        self.invalidating(result, &[keys::REVENUES, stats_key.as_str()])
            .await
    }

    /// See [`records::mark_expense_paid`].
    pub async fn mark_expense_paid(
        &self,
        id: i64,
        bank: &str,
        method: &str,
    ) -> Result<expense::Model> {
        let result = records::mark_expense_paid(self.sources(), id, bank, method).await;
        self.invalidating(result, &[keys::EXPENSES]).await
    }

    /// See [`records::mark_expense_unpaid`].
    pub async fn mark_expense_unpaid(&self, id: i64) -> Result<expense::Model> {
        let result = records::mark_expense_unpaid(self.sources(), id).await;
        self.invalidating(result, &[keys::EXPENSES]).await
    }

    /// See [`records::set_employee_paid`].
    pub async fn set_employee_paid(&self, id: i64, paid: bool) -> Result<employee::Model> {
        let result = records::set_employee_paid(self.sources(), id, paid).await;
        self.invalidating(result, &[keys::EMPLOYEES]).await
    }

    /// See [`records::set_encumbrance_paid`].
    pub async fn set_encumbrance_paid(&self, id: i64, paid: bool) -> Result<EncumbranceModel> {
        let result = records::set_encumbrance_paid(self.sources(), id, paid).await;
        self.invalidating(result, &[keys::ENCUMBRANCES]).await
    }

    /// See [`records::set_misc_payroll_paid`].
    pub async fn set_misc_payroll_paid(&self, id: i64, paid: bool) -> Result<MiscPayrollModel> {
        let result = records::set_misc_payroll_paid(self.sources(), id, paid).await;
        self.invalidating(result, &[keys::MISC_PAYROLL]).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        cache::TtlCache,
        core::context::EngineContext,
        sources::{RecordSource, Sources, database::SettingsStore},
        test_utils::*,
    };

    fn may() -> Period {
        "2024-05".parse().unwrap()
    }

    fn aggregator(sources: Sources) -> Aggregator {
        Aggregator::new(
            sources,
            EngineContext::new(TtlCache::default(), may()),
            vec!["UN1".to_string(), "UN2".to_string()],
            AllowanceConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_withdrawals_show_up_in_next_cycle() -> Result<()> {
        init_test_tracing();
        let (db, _) = setup_sources().await?;
        let agg = aggregator(sources_with_capital(&db, 1000.0).await?);
        let rent = agg.create_envelope("Aluguel", "UN1", may(), 800.0).await?;

        let before = agg.refresh(None).await.unwrap();
        assert_eq!(before.envelopes[0].remaining, 800.0);
        assert_eq!(before.cash_flow.cash_flow, 1000.0);

        agg.withdraw_from_envelope(&rent, 300.0, date("2024-05-10")).await?;
        agg.withdraw_allowance("UN1", may(), 500.0, "").await?;

        // Same cycle window, well inside the cache TTL.
        let after = agg.refresh(None).await.unwrap();
        assert_eq!(after.cash_flow.paid_envelope_withdrawals, 300.0);
        assert_eq!(after.cash_flow.paid_payroll, 500.0);
        assert_eq!(after.cash_flow.cash_flow, 200.0);
        assert_eq!(after.envelopes[0].remaining, 500.0);
        let un1 = after.allowance.iter().find(|u| u.unit == "UN1").unwrap();
        assert_eq!(un1.remaining, 16000.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_cached_collection() -> Result<()> {
        let (db, _) = setup_sources().await?;
        let agg = aggregator(sources_with_capital(&db, 0.0).await?);
        let water = agg.create_envelope("Água", "UN1", may(), 100.0).await?;
        agg.refresh(None).await.unwrap();

        let cache = agg.context().cache();
        let rejected = agg
            .withdraw_from_envelope(&water, 150.0, date("2024-05-02"))
            .await;
        assert!(matches!(rejected, Err(Error::InsufficientEnvelopeBalance { .. })));
        assert!(cache.get::<Vec<expense::Model>>(keys::EXPENSES).await.is_some());

        agg.withdraw_from_envelope(&water, 50.0, date("2024-05-02")).await?;
        assert!(cache.get::<Vec<expense::Model>>(keys::EXPENSES).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_allowance_total_applies_to_its_period_only() -> Result<()> {
        let (db, sources) = setup_sources().await?;
        let agg = aggregator(sources).with_settings(SettingsStore::new(db.clone(), 0.0));
        let june = may().next();

        agg.refresh(None).await.unwrap();
        let config = agg.reset_allowance_total(june, 10000.0).await?;
        assert_eq!(config.total_for_unit("UN1")?, 5500.0);

        agg.context().select_period(june).await;
        let report = agg.refresh(None).await.unwrap();
        assert_eq!(report.monthly.units["UN1"].payroll, 5500.0);

        agg.context().select_period(may()).await;
        let report = agg.refresh(None).await.unwrap();
        assert_eq!(report.monthly.units["UN1"].payroll, 16500.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_allowance_total_needs_settings() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let agg = aggregator(sources);
        let result = agg.reset_allowance_total(may(), 10000.0).await;
        assert!(matches!(result, Err(Error::Config { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_revenue_and_payment_updates_are_served_fresh() -> Result<()> {
        let (db, _) = setup_sources().await?;
        let agg = aggregator(sources_with_capital(&db, 0.0).await?);
        let bill = agg
            .sources()
            .expenses
            .create(expense_record("2024-05-03", "Luz", 100.0, "UN1", false))
            .await?;

        let before = agg.refresh(None).await.unwrap();
        assert_eq!(before.cash_flow.revenue, 0.0);
        assert_eq!(before.cash_flow.paid_expenses, 0.0);

        let channels = RevenueChannels {
            cash: 300.0,
            credit: 400.0,
            ..RevenueChannels::default()
        };
        agg.record_revenue(date("2024-05-12"), "UN2", channels).await?;
        agg.mark_expense_paid(bill.id, "Itaú", "pix").await?;

        let after = agg.refresh(None).await.unwrap();
        assert_eq!(after.cash_flow.revenue, 700.0);
        assert_eq!(after.cash_flow.paid_expenses, 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_working_capital_update_is_served_fresh() -> Result<()> {
        let (db, _) = setup_sources().await?;
        let store = SettingsStore::new(db.clone(), 250.0);
        let agg = aggregator(sources_with_capital(&db, 250.0).await?).with_settings(store);

        assert_eq!(agg.refresh(None).await.unwrap().cash_flow.working_capital, 250.0);
        agg.set_working_capital(900.0).await?;
        assert_eq!(agg.refresh(None).await.unwrap().cash_flow.working_capital, 900.0);
        Ok(())
    }
}
