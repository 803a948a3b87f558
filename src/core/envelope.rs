//! Fixed-expense envelope tracking - Budgets consumed by withdrawals.
//!
//! An envelope never stores what has been spent from it. Consumption is the
//! sum of paid withdrawal expenses that reference the envelope, so deleting or
//! unpaying a withdrawal gives the money back automatically.

use crate::{
    core::period::Period,
    entities::{
        expense::{self, CATEGORY_VARIABLE, withdrawal_marker},
        fixed_expense,
    },
    errors::{Error, Result},
    sources::{RecordSource, Sources},
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

/// Placeholder bank and method of a withdrawal record.
pub const NOT_APPLICABLE: &str = "N/A";

const BALANCE_TOLERANCE: f64 = 1e-9;

/// Derived state of one envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeSummary {
    /// Id of the envelope
    pub envelope_id: i64,
    /// Envelope name
    pub name: String,
    /// Business unit
    pub unit: String,
    /// Budgeted amount
    pub total: f64,
    /// Sum of paid withdrawals
    pub consumed: f64,
    /// Total minus consumed
    pub remaining: f64,
    /// Number of paid withdrawals
    pub withdrawal_count: usize,
}

impl EnvelopeSummary {
    /// Nothing left to withdraw.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.remaining <= BALANCE_TOLERANCE
    }
}

fn paid_withdrawals_of(
    envelope_id: i64,
    expenses: &[expense::Model],
) -> impl Iterator<Item = &expense::Model> {
    expenses
        .iter()
        .filter(move |e| e.paid && e.withdrawn_envelope() == Some(envelope_id))
}

/// Consumed and remaining amounts of `envelope` given every known expense.
#[must_use]
pub fn summarize(envelope: &fixed_expense::Model, expenses: &[expense::Model]) -> EnvelopeSummary {
    let (consumed, withdrawal_count) = paid_withdrawals_of(envelope.id, expenses)
        .fold((0.0, 0), |(sum, count), e| (sum + e.amount, count + 1));
    EnvelopeSummary {
        envelope_id: envelope.id,
        name: envelope.name.clone(),
        unit: envelope.unit.clone(),
        total: envelope.total,
        consumed,
        remaining: envelope.total - consumed,
        withdrawal_count,
    }
}

/// [`summarize`] for each envelope, in the given order.
#[must_use]
pub fn summarize_all(
    envelopes: &[fixed_expense::Model],
    expenses: &[expense::Model],
) -> Vec<EnvelopeSummary> {
    envelopes.iter().map(|env| summarize(env, expenses)).collect()
}

/// Envelopes budgeted for `period`.
#[must_use]
pub fn envelopes_for_period(
    envelopes: &[fixed_expense::Model],
    period: Period,
) -> Vec<fixed_expense::Model> {
    let token = period.to_string();
    envelopes
        .iter()
        .filter(|env| env.period == token)
        .cloned()
        .collect()
}

/// Withdraws `amount` from `envelope`, recording it as a paid expense.
///
/// The remaining balance is computed from a fresh listing of the expense
/// collection; an overdraw fails with `InsufficientEnvelopeBalance` and
/// nothing is written.
pub async fn withdraw(
    sources: &Sources,
    envelope: &fixed_expense::Model,
    amount: f64,
    date: NaiveDate,
) -> Result<expense::Model> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }

    let expenses = sources.expenses.list().await?;
    let summary = summarize(envelope, &expenses);
    if amount > summary.remaining + BALANCE_TOLERANCE {
        warn!(
            envelope_id = envelope.id,
            amount,
            remaining = summary.remaining,
            "envelope withdrawal rejected"
        );
        return Err(Error::InsufficientEnvelopeBalance {
            envelope_id: envelope.id,
            remaining: summary.remaining,
            requested: amount,
        });
    }

    let record = expense::Model {
        id: 0,
        date,
        payee: withdrawal_marker(envelope.id),
        amount,
        unit: envelope.unit.clone(),
        category: CATEGORY_VARIABLE.to_string(),
        paid: true,
        bank: Some(NOT_APPLICABLE.to_string()),
        method: Some(NOT_APPLICABLE.to_string()),
        envelope_id: Some(envelope.id),
    };
    let created = sources.expenses.create(record).await?;
    info!(
        envelope_id = envelope.id,
        amount,
        remaining = summary.remaining - amount,
        "envelope withdrawal recorded"
    );
    Ok(created)
}

/// Creates an envelope for `unit` and `period`.
pub async fn create_envelope(
    sources: &Sources,
    name: &str,
    unit: &str,
    period: Period,
    total: f64,
) -> Result<fixed_expense::Model> {
    if name.trim().is_empty() {
        return Err(Error::config("Envelope name cannot be empty"));
    }
    if !total.is_finite() || total < 0.0 {
        return Err(Error::InvalidAmount { amount: total });
    }
    let envelope = fixed_expense::Model {
        id: 0,
        name: name.trim().to_string(),
        unit: unit.to_string(),
        period: period.to_string(),
        total,
    };
    sources.envelopes.create(envelope).await
}

/// Changes the budgeted total.
///
/// A total below what has already been withdrawn is rejected with
/// `EnvelopeTotalBelowConsumed`, checked against a fresh expense listing.
pub async fn update_total(
    sources: &Sources,
    envelope: &fixed_expense::Model,
    new_total: f64,
) -> Result<fixed_expense::Model> {
    if !new_total.is_finite() || new_total < 0.0 {
        return Err(Error::InvalidAmount { amount: new_total });
    }
    let consumed = summarize(envelope, &sources.expenses.list().await?).consumed;
    if new_total + BALANCE_TOLERANCE < consumed {
        warn!(envelope_id = envelope.id, new_total, consumed, "envelope total update rejected");
        return Err(Error::EnvelopeTotalBelowConsumed {
            envelope_id: envelope.id,
            consumed,
            total: new_total,
        });
    }
    let updated = fixed_expense::Model {
        total: new_total,
        ..envelope.clone()
    };
    sources.envelopes.update(updated).await
}

/// Deletes the envelope itself. Its withdrawal records stay in the expense
/// collection and remain excluded from generic totals.
pub async fn delete(sources: &Sources, envelope: &fixed_expense::Model) -> Result<()> {
    sources
        .envelopes
        .delete(envelope.id)
        .await
        .map_err(|e| match e {
            Error::RecordNotFound { .. } => Error::EnvelopeNotFound { id: envelope.id },
            other => other,
        })?;
    info!(envelope_id = envelope.id, "envelope deleted");
    Ok(())
}

/// Looks an envelope up by id.
pub async fn find_envelope(sources: &Sources, id: i64) -> Result<fixed_expense::Model> {
    sources
        .envelopes
        .list()
        .await?
        .into_iter()
        .find(|env| env.id == id)
        .ok_or(Error::EnvelopeNotFound { id })
}
