//! Proportional distributor for the monthly owner allowance (pró-labore).
//!
//! One monthly amount is split across business units by a fixed percentage
//! table. Each unit's share is consumed by allowance-withdrawal payroll
//! records tagged with the unit and period; a withdrawal that would overdraw
//! the unit's share is rejected before anything is written.

use crate::{
    core::period::Period,
    entities::employee::{self, PayrollKind, allowance_withdrawal_name},
    errors::{Error, Result},
    sources::{RecordSource, Sources, database::SettingsStore},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Allowed deviation of the percentage sum from 100.
pub const PERCENT_TOLERANCE: f64 = 1e-6;

/// Note used when a withdrawal is recorded without one.
pub const DEFAULT_WITHDRAWAL_NOTE: &str = "Retirada sem descrição";

const BALANCE_TOLERANCE: f64 = 1e-9;

/// Raw allowance table as written in config.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowanceSettings {
    /// Monthly amount before the split
    pub monthly_amount: f64,
    /// Unit name to percentage
    pub split: BTreeMap<String, f64>,
}

/// A validated allowance configuration: the percentages sum to 100.
#[derive(Debug, Clone, PartialEq)]
pub struct AllowanceConfig {
    monthly_amount: f64,
    split: BTreeMap<String, f64>,
}

impl AllowanceConfig {
    /// Validates and builds a configuration.
    ///
    /// Rejects a negative or non-finite amount, negative percentages, an
    /// empty table, and any table whose percentages do not sum to 100.
    pub fn new(monthly_amount: f64, split: BTreeMap<String, f64>) -> Result<Self> {
        validate_amount(monthly_amount)?;
        if split.is_empty() {
            return Err(Error::config("Allowance split must name at least one unit"));
        }
        if let Some((unit, pct)) = split.iter().find(|(_, pct)| !pct.is_finite() || **pct < 0.0) {
            return Err(Error::config(format!(
                "Allowance percentage for {unit} must be a non-negative number, got {pct}"
            )));
        }
        let sum: f64 = split.values().sum();
        if (sum - 100.0).abs() > PERCENT_TOLERANCE {
            return Err(Error::config(format!(
                "Allowance percentages must sum to 100, got {sum}"
            )));
        }
        Ok(Self {
            monthly_amount,
            split,
        })
    }

    /// Monthly amount before the split.
    #[must_use]
    pub const fn monthly_amount(&self) -> f64 {
        self.monthly_amount
    }

    /// Units in the split, in name order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.split.keys().map(String::as_str)
    }

    /// Per-unit totals for the current monthly amount.
    #[must_use]
    pub fn per_unit_totals(&self) -> BTreeMap<String, f64> {
        split_amount(self.monthly_amount, &self.split)
    }

    /// Total share of `unit`.
    pub fn total_for_unit(&self, unit: &str) -> Result<f64> {
        self.split
            .get(unit)
            .map(|pct| self.monthly_amount * pct / 100.0)
            .ok_or_else(|| Error::UnknownUnit {
                unit: unit.to_string(),
            })
    }

    /// Changes the monthly amount; per-unit totals follow the same split.
    ///
    /// Existing withdrawals are never touched, so a unit's remaining share can
    /// go negative after lowering the amount.
    pub fn reset_total(&mut self, new_monthly_amount: f64) -> Result<()> {
        validate_amount(new_monthly_amount)?;
        info!(
            old = self.monthly_amount,
            new = new_monthly_amount,
            "allowance monthly amount reset"
        );
        self.monthly_amount = new_monthly_amount;
        Ok(())
    }
}

impl Default for AllowanceConfig {
    /// 30000 per month, split 55/45 between `UN1` and `UN2`.
    fn default() -> Self {
        Self {
            monthly_amount: 30000.0,
            split: BTreeMap::from([("UN1".to_string(), 55.0), ("UN2".to_string(), 45.0)]),
        }
    }
}

impl TryFrom<AllowanceSettings> for AllowanceConfig {
    type Error = Error;

    fn try_from(settings: AllowanceSettings) -> Result<Self> {
        Self::new(settings.monthly_amount, settings.split)
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

fn split_amount(monthly_amount: f64, percentages: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    percentages
        .iter()
        .map(|(unit, pct)| (unit.clone(), monthly_amount * pct / 100.0))
        .collect()
}

/// Splits `monthly_amount` by `percentages`, which must sum to 100.
pub fn split_total(
    monthly_amount: f64,
    percentages: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>> {
    let config = AllowanceConfig::new(monthly_amount, percentages.clone())?;
    Ok(config.per_unit_totals())
}

/// Sum of allowance withdrawals tagged with `unit` and `period`.
#[must_use]
pub fn consumed_for_unit(employees: &[employee::Model], unit: &str, period: Period) -> f64 {
    employees
        .iter()
        .filter(|e| e.unit == unit && e.is_allowance_for(period))
        .map(|e| e.amount)
        .sum()
}

/// Unit share minus what has been withdrawn. Negative after an over-allocating
/// `reset_total`.
pub fn remaining_for_unit(
    config: &AllowanceConfig,
    employees: &[employee::Model],
    unit: &str,
    period: Period,
) -> Result<f64> {
    Ok(config.total_for_unit(unit)? - consumed_for_unit(employees, unit, period))
}

/// Snapshot of one unit's allowance for a period.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitAllowance {
    /// Business unit
    pub unit: String,
    /// Share of the monthly amount
    pub total: f64,
    /// Withdrawn so far in the period
    pub consumed: f64,
    /// Share minus consumed; negative after lowering the total
    pub remaining: f64,
}

impl UnitAllowance {
    /// No share left to withdraw.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.remaining <= BALANCE_TOLERANCE
    }
}

/// Per-unit snapshot for every unit in the split.
#[must_use]
pub fn summarize(
    config: &AllowanceConfig,
    employees: &[employee::Model],
    period: Period,
) -> Vec<UnitAllowance> {
    config
        .per_unit_totals()
        .into_iter()
        .map(|(unit, total)| {
            let consumed = consumed_for_unit(employees, &unit, period);
            UnitAllowance {
                remaining: total - consumed,
                unit,
                total,
                consumed,
            }
        })
        .collect()
}

/// Withdraws `amount` from `unit`'s share for `period`.
///
/// The balance check runs against a fresh listing of the payroll collection
/// and fails with `InsufficientAllowanceBalance` before anything is written.
/// On success a synthetic payroll record named
/// `Pró-labore-<period> - <note>` is created and returned.
pub async fn withdraw(
    sources: &Sources,
    config: &AllowanceConfig,
    unit: &str,
    period: Period,
    amount: f64,
    note: &str,
) -> Result<employee::Model> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    let total = config.total_for_unit(unit)?;

    let employees = sources.employees.list().await?;
    let remaining = total - consumed_for_unit(&employees, unit, period);
    if amount > remaining + BALANCE_TOLERANCE {
        warn!(unit, period = %period, amount, remaining, "allowance withdrawal rejected");
        return Err(Error::InsufficientAllowanceBalance {
            unit: unit.to_string(),
            remaining,
            requested: amount,
        });
    }

    let note = match note.trim() {
        "" => DEFAULT_WITHDRAWAL_NOTE,
        trimmed => trimmed,
    };
    let record = employee::Model {
        id: 0,
        name: allowance_withdrawal_name(period, note),
        amount,
        unit: unit.to_string(),
        paid: true,
        allowance_period: Some(period.to_string()),
    };
    let created = sources.employees.create(record).await?;
    info!(unit, period = %period, amount, id = created.id, "allowance withdrawn");
    Ok(created)
}

/// Outcome of a best-effort batch: which ids went through and which failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Ids that were processed
    pub succeeded: Vec<i64>,
    /// Ids that failed, with the error message
    pub failed: Vec<(i64, String)>,
}

impl BatchReport {
    /// Some, but not necessarily all, operations failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Nothing was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    /// "N succeeded, M failed"
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

/// Deletes every allowance withdrawal of `period`, one record at a time.
///
/// Individual failures are collected in the report; the batch never stops
/// early. Only a failure to list the collection is returned as an error.
pub async fn zero_all_withdrawals(sources: &Sources, period: Period) -> Result<BatchReport> {
    let employees = sources.employees.list().await?;
    let mut report = BatchReport::default();

    for record in employees.iter().filter(|e| e.is_allowance_for(period)) {
        match sources.employees.delete(record.id).await {
            Ok(()) => report.succeeded.push(record.id),
            Err(e) => {
                warn!(id = record.id, error = %e, "failed to delete allowance withdrawal");
                report.failed.push((record.id, e.to_string()));
            }
        }
    }

    info!(period = %period, "zeroed allowance withdrawals: {}", report.summary());
    Ok(report)
}

/// Settings key of a per-period monthly amount override.
#[must_use]
pub fn total_setting_key(period: Period) -> String {
    format!("allowance_total:{period}")
}

/// Configuration for `period`: the base split with the period's persisted
/// monthly amount when one was saved.
pub async fn load_config_for_period(
    settings: &SettingsStore,
    base: &AllowanceConfig,
    period: Period,
) -> Result<AllowanceConfig> {
    let mut config = base.clone();
    if let Some(amount) = settings.get_amount(&total_setting_key(period)).await? {
        config.reset_total(amount)?;
    }
    Ok(config)
}

/// Resets the monthly amount of `config` and persists it for `period`.
pub async fn persist_total(
    settings: &SettingsStore,
    config: &mut AllowanceConfig,
    period: Period,
    new_monthly_amount: f64,
) -> Result<()> {
    config.reset_total(new_monthly_amount)?;
    settings
        .set_amount(&total_setting_key(period), new_monthly_amount)
        .await
}

/// Legacy allowance rows without a period token; they count toward no period.
#[must_use]
pub fn untagged_withdrawals(employees: &[employee::Model]) -> Vec<&employee::Model> {
    employees
        .iter()
        .filter(|e| e.kind() == PayrollKind::AllowanceWithdrawal { period: None })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn split_55_45() -> BTreeMap<String, f64> {
        BTreeMap::from([("UN1".to_string(), 55.0), ("UN2".to_string(), 45.0)])
    }

    #[test]
    fn test_split_30000_by_55_45() -> Result<()> {
        let totals = split_total(30000.0, &split_55_45())?;
        assert_eq!(totals["UN1"], 16500.0);
        assert_eq!(totals["UN2"], 13500.0);
        Ok(())
    }

    #[test]
    fn test_per_unit_totals_sum_to_monthly_amount() -> Result<()> {
        let splits = [
            vec![("A", 33.3), ("B", 33.3), ("C", 33.4)],
            vec![("A", 12.5), ("B", 87.5)],
            vec![("A", 100.0)],
        ];
        for amount in [0.0, 1.0, 999.99, 30000.0, 1234567.89] {
            for split in &splits {
                let table = split.iter().map(|(u, p)| ((*u).to_string(), *p)).collect();
                let total: f64 = split_total(amount, &table)?.values().sum();
                assert!((total - amount).abs() < 1e-6, "{amount} split as {split:?} gave {total}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_config_rejects_split_not_summing_to_100() {
        let bad = BTreeMap::from([("UN1".to_string(), 55.0), ("UN2".to_string(), 40.0)]);
        assert!(matches!(AllowanceConfig::new(30000.0, bad), Err(Error::Config { .. })));
        assert!(matches!(
            AllowanceConfig::new(30000.0, BTreeMap::new()),
            Err(Error::Config { .. })
        ));
        let negative = BTreeMap::from([("UN1".to_string(), 120.0), ("UN2".to_string(), -20.0)]);
        assert!(matches!(AllowanceConfig::new(30000.0, negative), Err(Error::Config { .. })));
    }

    #[test]
    fn test_unknown_unit() {
        let config = AllowanceConfig::new(30000.0, split_55_45()).unwrap();
        assert!(matches!(config.total_for_unit("UN9"), Err(Error::UnknownUnit { .. })));
    }

    #[tokio::test]
    async fn test_withdraw_reduces_remaining_for_unit() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let config = AllowanceConfig::new(30000.0, split_55_45())?;
        let period: Period = "2024-05".parse()?;

        let record = withdraw(&sources, &config, "UN1", period, 5000.0, "aluguel").await?;
        assert_eq!(record.name, "Pró-labore-2024-05 - aluguel");
        assert_eq!(record.allowance_period.as_deref(), Some("2024-05"));
        assert!(record.paid);

        let employees = sources.employees.list().await?;
        assert_eq!(remaining_for_unit(&config, &employees, "UN1", period)?, 11500.0);
        assert_eq!(remaining_for_unit(&config, &employees, "UN2", period)?, 13500.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_overdraw_is_rejected_before_any_write() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let config = AllowanceConfig::new(30000.0, split_55_45())?;
        let period: Period = "2024-05".parse()?;

        withdraw(&sources, &config, "UN2", period, 13000.0, "").await?;
        let result = withdraw(&sources, &config, "UN2", period, 600.0, "extra").await;
        assert!(matches!(
            result,
            Err(Error::InsufficientAllowanceBalance { ref unit, remaining, requested })
                if unit == "UN2" && remaining == 500.0 && requested == 600.0
        ));
        assert_eq!(sources.employees.list().await?.len(), 1);

        // Exactly the remaining share is allowed and depletes the unit.
        withdraw(&sources, &config, "UN2", period, 500.0, "").await?;
        let employees = sources.employees.list().await?;
        let snapshot = summarize(&config, &employees, period);
        assert!(snapshot.iter().any(|u| u.unit == "UN2" && u.is_depleted()));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_note_uses_default() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let config = AllowanceConfig::new(1000.0, split_55_45())?;
        let period: Period = "2024-05".parse()?;
        let record = withdraw(&sources, &config, "UN1", period, 10.0, "   ").await?;
        assert_eq!(record.name, "Pró-labore-2024-05 - Retirada sem descrição");
        Ok(())
    }

    #[tokio::test]
    async fn test_withdrawals_are_scoped_to_their_period() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let config = AllowanceConfig::new(30000.0, split_55_45())?;
        let may: Period = "2024-05".parse()?;
        let june = may.next();

        withdraw(&sources, &config, "UN1", may, 16500.0, "").await?;
        // May is depleted, June is untouched.
        assert!(withdraw(&sources, &config, "UN1", may, 1.0, "").await.is_err());
        withdraw(&sources, &config, "UN1", june, 1.0, "").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_total_keeps_withdrawals_and_can_go_negative() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let mut config = AllowanceConfig::new(30000.0, split_55_45())?;
        let period: Period = "2024-05".parse()?;
        withdraw(&sources, &config, "UN1", period, 10000.0, "").await?;

        config.reset_total(10000.0)?;
        let employees = sources.employees.list().await?;
        assert_eq!(employees.len(), 1);
        assert_eq!(remaining_for_unit(&config, &employees, "UN1", period)?, -4500.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_all_withdrawals_only_touches_the_period() -> Result<()> {
        let (_db, sources) = setup_sources().await?;
        let config = AllowanceConfig::new(30000.0, split_55_45())?;
        let may: Period = "2024-05".parse()?;

        withdraw(&sources, &config, "UN1", may, 100.0, "a").await?;
        withdraw(&sources, &config, "UN2", may, 200.0, "b").await?;
        withdraw(&sources, &config, "UN1", may.next(), 300.0, "c").await?;
        sources.employees.create(employee_record("Maria", 2000.0, "UN1", true)).await?;

        let report = zero_all_withdrawals(&sources, may).await?;
        assert_eq!(report.succeeded.len(), 2);
        assert!(!report.has_failures());
        assert_eq!(report.summary(), "2 succeeded, 0 failed");

        let remaining = sources.employees.list().await?;
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|e| !e.is_allowance_for(may)));
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_all_withdrawals_reports_partial_failure() -> Result<()> {
        let period: Period = "2024-05".parse()?;
        let withdrawals = vec![
            allowance_record(1, "UN1", period, 100.0),
            allowance_record(2, "UN1", period, 200.0),
            allowance_record(3, "UN2", period, 300.0),
        ];
        let sources = sources_with_employees(withdrawals, vec![2]);

        let report = zero_all_withdrawals(&sources, period).await?;
        assert_eq!(report.succeeded, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert_eq!(report.summary(), "2 succeeded, 1 failed");
        Ok(())
    }

    #[tokio::test]
    async fn test_period_total_override_is_persisted() -> Result<()> {
        let (db, _sources) = setup_sources().await?;
        let settings = SettingsStore::new(db, 0.0);
        let base = AllowanceConfig::new(30000.0, split_55_45())?;
        let may: Period = "2024-05".parse()?;

        let mut config = load_config_for_period(&settings, &base, may).await?;
        assert_eq!(config.monthly_amount(), 30000.0);

        persist_total(&settings, &mut config, may, 20000.0).await?;
        let reloaded = load_config_for_period(&settings, &base, may).await?;
        assert_eq!(reloaded.total_for_unit("UN1")?, 11000.0);

        let june = load_config_for_period(&settings, &base, may.next()).await?;
        assert_eq!(june.monthly_amount(), 30000.0);
        Ok(())
    }

    #[test]
    fn test_untagged_legacy_rows_belong_to_no_period() {
        let legacy = employee_record("Pró-labore - antigo", 700.0, "UN1", true);
        let rows = vec![legacy, employee_record("João", 1800.0, "UN1", true)];
        assert_eq!(untagged_withdrawals(&rows).len(), 1);
        let may: Period = "2024-05".parse().unwrap();
        assert_eq!(consumed_for_unit(&rows, "UN1", may), 0.0);
    }
}
