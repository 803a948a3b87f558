//! Employee entity - Payroll records.
//!
//! The collection holds both real employees and synthetic allowance
//! withdrawals (`Pró-labore-YYYY-MM - <note>`). Withdrawals carry their period
//! in `allowance_period`; older rows only have the name convention.

use crate::core::period::Period;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Name prefix of every allowance withdrawal.
pub const ALLOWANCE_NAME_PREFIX: &str = "Pró-labore";

/// Employee database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Employee name, or the allowance withdrawal label
    pub name: String,
    /// Monthly salary, or the withdrawn amount
    pub amount: f64,
    /// Business unit paying the amount
    pub unit: String,
    /// Whether this month's amount has been paid
    pub paid: bool,
    /// `YYYY-MM` period of an allowance withdrawal
    pub allowance_period: Option<String>,
}

/// What a payroll row actually represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayrollKind {
    /// A real employee salary.
    Employee,
    /// An allowance withdrawal. Legacy rows without a period token have
    /// `period: None` and belong to no period.
    AllowanceWithdrawal {
        /// Period token parsed from the row, if any
        period: Option<Period>,
    },
}

/// Builds the display name of an allowance withdrawal.
#[must_use]
pub fn allowance_withdrawal_name(period: Period, note: &str) -> String {
    format!("{ALLOWANCE_NAME_PREFIX}-{period} - {note}")
}

impl Model {
    /// Classifies the row, preferring the explicit period column.
    #[must_use]
    pub fn kind(&self) -> PayrollKind {
        if let Some(token) = &self.allowance_period {
            return PayrollKind::AllowanceWithdrawal {
                period: token.parse().ok(),
            };
        }
        let Some(rest) = self.name.strip_prefix(ALLOWANCE_NAME_PREFIX) else {
            return PayrollKind::Employee;
        };
        // "-2024-05 - note" -> "2024-05"
        let period = rest
            .strip_prefix('-')
            .and_then(|tail| tail.get(..7))
            .and_then(|token| token.parse().ok());
        PayrollKind::AllowanceWithdrawal { period }
    }

    /// True for allowance withdrawals tagged with `period`.
    #[must_use]
    pub fn is_allowance_for(&self, period: Period) -> bool {
        self.kind()
            == PayrollKind::AllowanceWithdrawal {
                period: Some(period),
            }
    }

    /// True for real employees.
    #[must_use]
    pub fn is_employee(&self) -> bool {
        self.kind() == PayrollKind::Employee
    }
}

/// Employees have no relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
