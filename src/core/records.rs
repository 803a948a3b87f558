//! Record maintenance - revenue entry and paid/unpaid marking.
//!
//! These are the only mutations the engine performs on existing records.
//! The `Aggregator` wrappers in `core::mutations` also drop the matching cache
//! keys.

use crate::{
    entities::{EncumbranceModel, MiscPayrollModel, employee, expense, revenue},
    errors::{Error, Result},
    sources::{RecordSource, Sources},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

/// Per-channel takings of one revenue entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RevenueChannels {
    /// Cash
    pub cash: f64,
    /// Debit card
    pub debit: f64,
    /// Credit card
    pub credit: f64,
    /// Instant bank transfer (Pix)
    pub instant_transfer: f64,
    /// Meal vouchers
    pub voucher: f64,
}

impl RevenueChannels {
    /// Sum of every channel.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cash + self.debit + self.credit + self.instant_transfer + self.voucher
    }

    fn validate(&self) -> Result<()> {
        let channels = [
            self.cash,
            self.debit,
            self.credit,
            self.instant_transfer,
            self.voucher,
        ];
        match channels.into_iter().find(|v| !v.is_finite() || *v < 0.0) {
            Some(amount) => Err(Error::InvalidAmount { amount }),
            None => Ok(()),
        }
    }
}

/// Records the takings of `unit` on `date`; the total is the channel sum.
pub async fn record_revenue(
    sources: &Sources,
    date: NaiveDate,
    unit: &str,
    channels: RevenueChannels,
) -> Result<revenue::Model> {
    channels.validate()?;
    let entry = revenue::Model {
        id: 0,
        date,
        unit: unit.to_string(),
        cash: channels.cash,
        debit: channels.debit,
        credit: channels.credit,
        instant_transfer: channels.instant_transfer,
        voucher: channels.voucher,
        total: channels.total(),
    };
    let created = sources.revenues.create(entry).await?;
    info!(id = created.id, unit, total = created.total, "revenue recorded");
    Ok(created)
}

async fn find<M>(source: &dyn RecordSource<M>, id: i64, id_of: fn(&M) -> i64) -> Result<M>
where
    M: Clone + Send + Sync + 'static,
{
    source
        .list()
        .await?
        .into_iter()
        .find(|record| id_of(record) == id)
        .ok_or(Error::RecordNotFound {
            collection: source.collection(),
            id,
        })
}

/// Marks an expense paid through `bank` with `method`.
pub async fn mark_expense_paid(
    sources: &Sources,
    id: i64,
    bank: &str,
    method: &str,
) -> Result<expense::Model> {
    let record = find(sources.expenses.as_ref(), id, |e| e.id).await?;
    let updated = expense::Model {
        paid: true,
        bank: Some(bank.to_string()),
        method: Some(method.to_string()),
        ..record
    };
    let saved = sources.expenses.update(updated).await?;
    info!(id, bank, method, "expense marked paid");
    Ok(saved)
}

/// Marks an expense unpaid and forgets how it was paid.
pub async fn mark_expense_unpaid(sources: &Sources, id: i64) -> Result<expense::Model> {
    let record = find(sources.expenses.as_ref(), id, |e| e.id).await?;
    let updated = expense::Model {
        paid: false,
        bank: None,
        method: None,
        ..record
    };
    sources.expenses.update(updated).await
}

/// Sets the paid flag of a payroll record.
pub async fn set_employee_paid(
    sources: &Sources,
    id: i64,
    paid: bool,
) -> Result<employee::Model> {
    let record = find(sources.employees.as_ref(), id, |e| e.id).await?;
    sources
        .employees
        .update(employee::Model { paid, ..record })
        .await
}

/// Sets the paid flag of an encumbrance.
pub async fn set_encumbrance_paid(
    sources: &Sources,
    id: i64,
    paid: bool,
) -> Result<EncumbranceModel> {
    let record = find(sources.encumbrances.as_ref(), id, |e| e.id).await?;
    sources
        .encumbrances
        .update(EncumbranceModel { paid, ..record })
        .await
}

/// Sets the paid flag of a miscellaneous payroll record.
pub async fn set_misc_payroll_paid(
    sources: &Sources,
    id: i64,
    paid: bool,
) -> Result<MiscPayrollModel> {
    let record = find(sources.misc_payroll.as_ref(), id, |m| m.id).await?;
    sources
        .misc_payroll
        .update(MiscPayrollModel { paid, ..record })
        .await
}
