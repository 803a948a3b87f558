//! Expense entity - Free-form expense records.
//!
//! Most rows are standalone expenses entered through the expense form. Rows
//! created by an envelope withdrawal are the external trace of money already
//! accounted for inside a fixed-expense envelope; they carry the envelope id
//! and a `DF-<id>-Retirada` payee so they can be excluded from generic totals.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payee prefix that marks an envelope withdrawal.
pub const WITHDRAWAL_MARKER_PREFIX: &str = "DF-";
/// Payee suffix that closes an envelope withdrawal marker.
pub const WITHDRAWAL_MARKER_SUFFIX: &str = "-Retirada";

/// Category value for recurring bills.
pub const CATEGORY_FIXED_BILL: &str = "fixed-bill";
/// Category value for everything else, including envelope withdrawals.
pub const CATEGORY_VARIABLE: &str = "variable";

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Day the expense was incurred
    pub date: Date,
    /// Free-text payee; may carry the withdrawal marker
    pub payee: String,
    /// Non-negative amount
    pub amount: f64,
    /// Business unit the expense belongs to (e.g. `"UN1"`)
    pub unit: String,
    /// `"fixed-bill"` or `"variable"`
    pub category: String,
    /// Whether the expense has been paid
    pub paid: bool,
    /// Bank used for payment, once paid
    pub bank: Option<String>,
    /// Payment method used, once paid
    pub method: Option<String>,
    /// Envelope this record withdraws from, if it is a withdrawal
    pub envelope_id: Option<i64>,
}

/// What an expense row actually represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseKind {
    /// A real expense that counts toward generic totals.
    Standalone,
    /// Consumption of a fixed-expense envelope. The id is `None` when the
    /// payee carries the marker prefix but no parseable envelope id.
    EnvelopeWithdrawal {
        /// Envelope consumed, when known
        envelope_id: Option<i64>,
    },
}

/// Builds the payee string for a withdrawal from `envelope_id`.
#[must_use]
pub fn withdrawal_marker(envelope_id: i64) -> String {
    format!("{WITHDRAWAL_MARKER_PREFIX}{envelope_id}{WITHDRAWAL_MARKER_SUFFIX}")
}

/// Extracts the envelope id from a `DF-<id>-Retirada` payee.
#[must_use]
pub fn parse_withdrawal_marker(payee: &str) -> Option<i64> {
    payee
        .strip_prefix(WITHDRAWAL_MARKER_PREFIX)?
        .strip_suffix(WITHDRAWAL_MARKER_SUFFIX)?
        .parse()
        .ok()
}

impl Model {
    /// Classifies the row. The explicit `envelope_id` column wins; rows
    /// written before the column existed are recognized by their payee.
    #[must_use]
    pub fn kind(&self) -> ExpenseKind {
        if let Some(envelope_id) = self.envelope_id {
            return ExpenseKind::EnvelopeWithdrawal {
                envelope_id: Some(envelope_id),
            };
        }
        if self.payee.starts_with(WITHDRAWAL_MARKER_PREFIX) {
            return ExpenseKind::EnvelopeWithdrawal {
                envelope_id: parse_withdrawal_marker(&self.payee),
            };
        }
        ExpenseKind::Standalone
    }

    /// True for any envelope withdrawal, referenced or not.
    #[must_use]
    pub fn is_withdrawal(&self) -> bool {
        matches!(self.kind(), ExpenseKind::EnvelopeWithdrawal { .. })
    }

    /// Envelope this row withdraws from, when known.
    #[must_use]
    pub fn withdrawn_envelope(&self) -> Option<i64> {
        match self.kind() {
            ExpenseKind::EnvelopeWithdrawal { envelope_id } => envelope_id,
            ExpenseKind::Standalone => None,
        }
    }
}

/// Expenses have no relationships the engine navigates
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        assert_eq!(withdrawal_marker(7), "DF-7-Retirada");
        assert_eq!(parse_withdrawal_marker("DF-7-Retirada"), Some(7));
    }

    #[test]
    fn test_marker_rejects_malformed_payees() {
        assert_eq!(parse_withdrawal_marker("DF-abc-Retirada"), None);
        assert_eq!(parse_withdrawal_marker("DF-7"), None);
        assert_eq!(parse_withdrawal_marker("Padaria DF-7-Retirada"), None);
    }
}
