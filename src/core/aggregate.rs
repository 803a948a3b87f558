//! Aggregator - builds the cash-flow, monthly-summary and weekly views.
//!
//! One cycle fetches every collection concurrently through the cache, waits
//! for all of them, and only then computes. A source that fails after its
//! retries is recorded in [`AggregateReport::degraded`] and treated as empty;
//! aggregation itself never fails.
//!
//! Monthly revenue comes from the revenue-statistics source when it answers.
//! Otherwise it is recomputed from the raw revenue records of the period, and
//! when those are unavailable too it is zero. A unit filter always uses the
//! raw records because the statistic is not broken down by unit.

use crate::{
    core::{
        allowance::{self, AllowanceConfig, UnitAllowance},
        context::{CycleToken, EngineContext, Stamped},
        envelope::{self, EnvelopeSummary},
        period::Period,
        reconcile::{reconcile, withdrawals},
    },
    entities::{PayrollAdjustment, employee, expense, fixed_expense, revenue},
    errors::Result,
    sources::{Sources, database::SettingsStore},
};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
};
use tracing::{debug, info, warn};

/// Cache keys, one per fetched collection.
pub mod keys {
    /// Expense records, withdrawals included.
    pub const EXPENSES: &str = "expenses";
    /// Raw revenue entries.
    pub const REVENUES: &str = "revenues";
    /// Payroll rows, allowance withdrawals included.
    pub const EMPLOYEES: &str = "employees";
    /// Period-scoped payroll charges.
    pub const ENCUMBRANCES: &str = "encumbrances";
    /// Miscellaneous payroll adjustments.
    pub const MISC_PAYROLL: &str = "misc_payroll";
    /// Fixed-expense envelopes.
    pub const ENVELOPES: &str = "fixed_expenses";
    /// The working-capital figure.
    pub const WORKING_CAPITAL: &str = "working_capital";
    /// Prefix of the per-period revenue statistic keys.
    pub const REVENUE_STATISTICS: &str = "revenue_statistics";
    /// Prefix of the per-period allowance configuration keys.
    pub const ALLOWANCE: &str = "allowance";

    /// The statistic is per period, so its key is too.
    #[must_use]
    pub fn revenue_statistics(period: crate::core::period::Period) -> String {
        format!("{REVENUE_STATISTICS}:{period}")
    }

    /// Allowance configuration resolved for one period.
    #[must_use]
    pub fn allowance(period: crate::core::period::Period) -> String {
        format!("{ALLOWANCE}:{period}")
    }
}

/// Money in versus money out for the period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CashFlowView {
    /// Revenue of the period
    pub revenue: f64,
    /// Working capital, never split by unit
    pub working_capital: f64,
    /// Revenue plus working capital
    pub total_cash: f64,
    /// Paid expenses, envelope withdrawals excluded
    pub paid_expenses: f64,
    /// Paid envelope withdrawals dated in the period
    pub paid_envelope_withdrawals: f64,
    /// Paid salaries plus the allowance withdrawals of the period
    pub paid_payroll: f64,
    /// Paid encumbrances of the period
    pub paid_encumbrances: f64,
    /// Paid miscellaneous payroll of the period
    pub paid_misc: f64,
    /// Sum of every paid line
    pub total_paid_out: f64,
    /// Total cash minus total paid out
    pub cash_flow: f64,
}

impl CashFlowView {
    fn new(
        revenue: f64,
        working_capital: f64,
        paid_expenses: f64,
        paid_envelope_withdrawals: f64,
        paid_payroll: f64,
        paid_encumbrances: f64,
        paid_misc: f64,
    ) -> Self {
        let total_cash = revenue + working_capital;
        let total_paid_out = paid_expenses
            + paid_envelope_withdrawals
            + paid_payroll
            + paid_encumbrances
            + paid_misc;
        Self {
            revenue: unsigned_zero(revenue),
            working_capital: unsigned_zero(working_capital),
            total_cash: unsigned_zero(total_cash),
            paid_expenses: unsigned_zero(paid_expenses),
            paid_envelope_withdrawals: unsigned_zero(paid_envelope_withdrawals),
            paid_payroll: unsigned_zero(paid_payroll),
            paid_encumbrances: unsigned_zero(paid_encumbrances),
            paid_misc: unsigned_zero(paid_misc),
            total_paid_out: unsigned_zero(total_paid_out),
            cash_flow: unsigned_zero(total_cash - total_paid_out),
        }
    }
}

/// Revenue, expenses and payroll of one unit (or of all units combined).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitSummary {
    /// Revenue of the unit
    pub revenue: f64,
    /// Reconciled expenses plus envelope budgets
    pub expenses: f64,
    /// Salaries, payroll adjustments and the allowance share
    pub payroll: f64,
    /// Revenue minus expenses minus payroll
    pub net: f64,
}

impl UnitSummary {
    fn new(revenue: f64, expenses: f64, payroll: f64) -> Self {
        Self {
            revenue: unsigned_zero(revenue),
            expenses: unsigned_zero(expenses),
            payroll: unsigned_zero(payroll),
            net: unsigned_zero(revenue - expenses - payroll),
        }
    }
}

/// Per-unit rows plus the combined row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// One row per unit, by name
    pub units: BTreeMap<String, UnitSummary>,
    /// All units together
    pub combined: UnitSummary,
}

/// Revenue per week of the month, ascending by week number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklySeries {
    /// Week number and revenue, weeks without revenue omitted
    pub weeks: Vec<(u32, f64)>,
}

impl WeeklySeries {
    /// Buckets `revenues` of `period` by week of month.
    #[must_use]
    pub fn from_revenues<'a>(
        period: Period,
        revenues: impl IntoIterator<Item = &'a revenue::Model>,
    ) -> Self {
        let mut buckets: BTreeMap<u32, f64> = BTreeMap::new();
        for entry in revenues {
            if period.contains(entry.date) {
                *buckets.entry(period.week_of_month(entry.date)).or_default() += entry.total;
            }
        }
        Self {
            weeks: buckets.into_iter().collect(),
        }
    }

    /// Revenue across every week.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.weeks.iter().map(|(_, total)| total).sum()
    }
}

/// A source that failed during a cycle and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedSource {
    /// Cache key of the failed collection
    pub collection: String,
    /// Error that was absorbed
    pub message: String,
}

/// Everything one cycle produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    /// Cycle that produced the report
    pub token: CycleToken,
    /// Unit the report was restricted to, if any
    pub unit_filter: Option<String>,
    /// Money in versus money out
    pub cash_flow: CashFlowView,
    /// Per-unit monthly summary
    pub monthly: MonthlySummary,
    /// Revenue by week of month
    pub weekly: WeeklySeries,
    /// Envelopes budgeted for the period
    pub envelopes: Vec<EnvelopeSummary>,
    /// Allowance snapshot per unit
    pub allowance: Vec<UnitAllowance>,
    /// Sources that failed and were treated as empty
    pub degraded: Vec<DegradedSource>,
}

impl AggregateReport {
    /// At least one source failed during the cycle.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

impl Stamped for AggregateReport {
    fn token(&self) -> CycleToken {
        self.token
    }
}

/// Raw inputs of one cycle, already restricted to the period.
struct Snapshot {
    expenses: Vec<expense::Model>,
    all_expenses: Vec<expense::Model>,
    revenues: Vec<revenue::Model>,
    employees: Vec<employee::Model>,
    encumbrances: Vec<crate::entities::EncumbranceModel>,
    misc_payroll: Vec<crate::entities::MiscPayrollModel>,
    envelopes: Vec<fixed_expense::Model>,
}

/// Builds reports from the sources of one engine.
///
/// Writes that should show up in the next report go through the methods in
/// [`crate::core::mutations`], which drop the affected cache keys.
pub struct Aggregator {
    sources: Sources,
    context: EngineContext,
    units: Vec<String>,
    allowance: AllowanceConfig,
    settings: Option<SettingsStore>,
}

impl Aggregator {
    /// `allowance` is the base configuration. Without a settings store it is
    /// used for every period.
    #[must_use]
    pub const fn new(
        sources: Sources,
        context: EngineContext,
        units: Vec<String>,
        allowance: AllowanceConfig,
    ) -> Self {
        Self {
            sources,
            context,
            units,
            allowance,
            settings: None,
        }
    }

    /// Reads per-period allowance amounts from `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Shared period, cache and cycle state.
    #[must_use]
    pub const fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Sources the aggregator reads and writes.
    #[must_use]
    pub const fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Settings store for per-period amounts, if configured.
    #[must_use]
    pub const fn settings(&self) -> Option<&SettingsStore> {
        self.settings.as_ref()
    }

    /// Allowance configuration of `period`: the base split with the amount
    /// persisted for that period, if any.
    pub async fn allowance_for(&self, period: Period) -> Result<AllowanceConfig> {
        match &self.settings {
            Some(settings) => {
                self.cached(&keys::allowance(period), || {
                    allowance::load_config_for_period(settings, &self.allowance, period)
                })
                .await
            }
            None => Ok(self.allowance.clone()),
        }
    }

    /// Starts a cycle for the selected period and builds its report.
    ///
    /// Returns `None` when the period changed while the cycle was running.
    pub async fn refresh(&self, unit_filter: Option<&str>) -> Option<AggregateReport> {
        let token = self.context.begin_cycle().await;
        let report = self.aggregate(token, unit_filter).await;
        self.context.accept(report).await
    }

    async fn cached<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.context.cache().get::<T>(key).await {
            debug!(key, "cache hit");
            return Ok(hit);
        }
        let fresh = fetch().await?;
        Ok(self.context.cache().set(key, fresh).await)
    }

    /// Builds the report of the cycle identified by `token`.
    #[allow(clippy::too_many_lines)]
    pub async fn aggregate(&self, token: CycleToken, unit_filter: Option<&str>) -> AggregateReport {
        let period = token.period;
        let stats_key = keys::revenue_statistics(period);

        let (
            expenses,
            revenues,
            employees,
            encumbrances,
            misc_payroll,
            envelopes,
            capital,
            stats,
            allowance_config,
        ) = tokio::join!(
            self.cached(keys::EXPENSES, || self.sources.expenses.list()),
            self.cached(keys::REVENUES, || self.sources.revenues.list()),
            self.cached(keys::EMPLOYEES, || self.sources.employees.list()),
            self.cached(keys::ENCUMBRANCES, || self.sources.encumbrances.list()),
            self.cached(keys::MISC_PAYROLL, || self.sources.misc_payroll.list()),
            self.cached(keys::ENVELOPES, || self.sources.envelopes.list()),
            self.cached(keys::WORKING_CAPITAL, || {
                self.sources.working_capital.working_capital()
            }),
            async {
                if unit_filter.is_some() {
                    None
                } else {
                    Some(
                        self.cached(&stats_key, || {
                            self.sources.revenue_stats.monthly_revenue(period)
                        })
                        .await,
                    )
                }
            },
            self.allowance_for(period),
        );

        let mut degraded = Vec::new();
        let all_expenses = absorb(expenses, keys::EXPENSES, &mut degraded).unwrap_or_default();
        let revenues = absorb(revenues, keys::REVENUES, &mut degraded);
        let employees = absorb(employees, keys::EMPLOYEES, &mut degraded).unwrap_or_default();
        let encumbrances =
            absorb(encumbrances, keys::ENCUMBRANCES, &mut degraded).unwrap_or_default();
        let misc_payroll =
            absorb(misc_payroll, keys::MISC_PAYROLL, &mut degraded).unwrap_or_default();
        let envelopes = absorb(envelopes, keys::ENVELOPES, &mut degraded).unwrap_or_default();
        let working_capital =
            absorb(capital, keys::WORKING_CAPITAL, &mut degraded).unwrap_or_default();
        let statistic =
            stats.and_then(|result| absorb(result, keys::REVENUE_STATISTICS, &mut degraded));
        let allowance_config = absorb(allowance_config, keys::ALLOWANCE, &mut degraded)
            .unwrap_or_else(|| self.allowance.clone());

        let in_unit = |unit: &str| unit_filter.is_none_or(|wanted| wanted == unit);
        let raw_revenue_available = revenues.is_some();
        let snapshot = Snapshot {
            expenses: all_expenses
                .iter()
                .filter(|e| period.contains(e.date) && in_unit(e.unit.as_str()))
                .cloned()
                .collect(),
            revenues: revenues
                .unwrap_or_default()
                .into_iter()
                .filter(|r| period.contains(r.date) && in_unit(r.unit.as_str()))
                .collect(),
            employees: employees.into_iter().filter(|e| in_unit(e.unit.as_str())).collect(),
            encumbrances: in_period(encumbrances, period, &in_unit),
            misc_payroll: in_period(misc_payroll, period, &in_unit),
            envelopes: envelope::envelopes_for_period(&envelopes, period)
                .into_iter()
                .filter(|env| in_unit(env.unit.as_str()))
                .collect(),
            all_expenses,
        };

        let raw_revenue: f64 = snapshot.revenues.iter().map(|r| r.total).sum();
        let revenue = statistic.unwrap_or_else(|| {
            if !raw_revenue_available {
                warn!(%period, "no revenue source available, using zero");
            }
            raw_revenue
        });

        let cash_flow = cash_flow_view(&snapshot, period, revenue, working_capital);
        let units = self.report_units(&snapshot, unit_filter);
        let monthly = monthly_summary(&snapshot, period, &units, revenue, &allowance_config);
        let weekly = WeeklySeries::from_revenues(period, &snapshot.revenues);
        let envelope_summaries = envelope::summarize_all(&snapshot.envelopes, &snapshot.all_expenses);
        let allowance = allowance::summarize(&allowance_config, &snapshot.employees, period)
            .into_iter()
            .filter(|u| in_unit(u.unit.as_str()))
            .collect();

        info!(
            %period,
            unit = unit_filter.unwrap_or("all"),
            cash_flow = cash_flow.cash_flow,
            degraded = degraded.len(),
            "aggregation finished"
        );

        AggregateReport {
            token,
            unit_filter: unit_filter.map(str::to_string),
            cash_flow,
            monthly,
            weekly,
            envelopes: envelope_summaries,
            allowance,
            degraded,
        }
    }

    /// Configured units, plus any unit the records mention.
    fn report_units(&self, snapshot: &Snapshot, unit_filter: Option<&str>) -> BTreeSet<String> {
        if let Some(unit) = unit_filter {
            return BTreeSet::from([unit.to_string()]);
        }
        let mut units: BTreeSet<String> = self.units.iter().cloned().collect();
        units.extend(snapshot.expenses.iter().map(|e| e.unit.clone()));
        units.extend(snapshot.revenues.iter().map(|r| r.unit.clone()));
        units.extend(snapshot.employees.iter().map(|e| e.unit.clone()));
        units.extend(snapshot.encumbrances.iter().map(|a| a.unit.clone()));
        units.extend(snapshot.misc_payroll.iter().map(|a| a.unit.clone()));
        units.extend(snapshot.envelopes.iter().map(|env| env.unit.clone()));
        units
    }
}

fn monthly_summary(
    snapshot: &Snapshot,
    period: Period,
    units: &BTreeSet<String>,
    combined_revenue: f64,
    allowance_config: &AllowanceConfig,
) -> MonthlySummary {
    let reconciled = reconcile(&snapshot.expenses);
    let per_unit_allowance = allowance_config.per_unit_totals();

    let units: BTreeMap<String, UnitSummary> = units
        .iter()
        .map(|unit| {
            let revenue = sum_for(&snapshot.revenues, unit, |r| &r.unit, |r| r.total);
            let expenses = sum_for(&reconciled, unit, |e| &e.unit, |e| e.amount)
                + sum_for(&snapshot.envelopes, unit, |env| &env.unit, |env| env.total);
            let ordinary_payroll: f64 = snapshot
                .employees
                .iter()
                .filter(|e| e.unit == *unit && e.is_employee())
                .map(|e| e.amount)
                .sum();
            let payroll = ordinary_payroll
                + adjustments_for(&snapshot.encumbrances, unit, period)
                + adjustments_for(&snapshot.misc_payroll, unit, period)
                + per_unit_allowance.get(unit).copied().unwrap_or_default();
            (unit.clone(), UnitSummary::new(revenue, expenses, payroll))
        })
        .collect();

    let combined = UnitSummary::new(
        combined_revenue,
        units.values().map(|u| u.expenses).sum(),
        units.values().map(|u| u.payroll).sum(),
    );
    MonthlySummary { units, combined }
}

/// An empty float sum is -0.0; views carry 0.0 instead.
fn unsigned_zero(amount: f64) -> f64 {
    amount + 0.0
}

fn absorb<T>(result: Result<T>, collection: &str, degraded: &mut Vec<DegradedSource>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(collection, error = %e, "source degraded, treating as empty");
            degraded.push(DegradedSource {
                collection: collection.to_string(),
                message: e.to_string(),
            });
            None
        }
    }
}

fn in_period<A: PayrollAdjustment>(
    records: Vec<A>,
    period: Period,
    in_unit: &impl Fn(&str) -> bool,
) -> Vec<A> {
    let token = period.to_string();
    records
        .into_iter()
        .filter(|a| a.period() == token && in_unit(a.unit()))
        .collect()
}

fn adjustments_for<A: PayrollAdjustment>(records: &[A], unit: &str, period: Period) -> f64 {
    let token = period.to_string();
    records
        .iter()
        .filter(|a| a.unit() == unit && a.period() == token)
        .map(PayrollAdjustment::amount)
        .sum()
}

fn paid_adjustments<A: PayrollAdjustment>(records: &[A]) -> f64 {
    records
        .iter()
        .filter(|a| a.is_paid())
        .map(PayrollAdjustment::amount)
        .sum()
}

fn sum_for<T>(
    records: &[T],
    unit: &str,
    unit_of: impl Fn(&T) -> &String,
    amount_of: impl Fn(&T) -> f64,
) -> f64 {
    records
        .iter()
        .filter(|r| unit_of(r) == unit)
        .map(amount_of)
        .sum()
}

fn cash_flow_view(
    snapshot: &Snapshot,
    period: Period,
    revenue: f64,
    working_capital: f64,
) -> CashFlowView {
    let paid_expenses: f64 = reconcile(&snapshot.expenses)
        .iter()
        .filter(|e| e.paid)
        .map(|e| e.amount)
        .sum();
    let paid_envelope_withdrawals: f64 = withdrawals(&snapshot.expenses)
        .into_iter()
        .filter(|e| e.paid)
        .map(|e| e.amount)
        .sum();
    // Allowance withdrawals are money already moved, paid flag or not.
    let paid_payroll: f64 = snapshot
        .employees
        .iter()
        .filter(|e| (e.is_employee() && e.paid) || e.is_allowance_for(period))
        .map(|e| e.amount)
        .sum();

    CashFlowView::new(
        revenue,
        working_capital,
        paid_expenses,
        paid_envelope_withdrawals,
        paid_payroll,
        paid_adjustments(&snapshot.encumbrances),
        paid_adjustments(&snapshot.misc_payroll),
    )
}
