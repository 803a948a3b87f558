//! Entity module - SeaORM entity definitions for every record collection the
//! engine reconciles, plus the settings table.
//! Each entity has a Model struct for data and an Entity struct for operations.

/// Payroll rows
pub mod employee;
/// Period-scoped payroll charges
pub mod encumbrance;
/// Expenses and envelope withdrawals
pub mod expense;
/// Fixed-expense envelopes
pub mod fixed_expense;
/// Miscellaneous payroll adjustments
pub mod misc_payroll;
/// Revenue entries by payment channel
pub mod revenue;
/// Key/value settings
pub mod setting;

// Re-export specific types to avoid conflicts
pub use employee::{Entity as Employee, Model as EmployeeModel};
pub use encumbrance::{Entity as Encumbrance, Model as EncumbranceModel};
pub use expense::{Entity as Expense, Model as ExpenseModel};
pub use fixed_expense::{Entity as FixedExpense, Model as FixedExpenseModel};
pub use misc_payroll::{Entity as MiscPayroll, Model as MiscPayrollModel};
pub use revenue::{Entity as Revenue, Model as RevenueModel};
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};

/// Common view of encumbrances and miscellaneous payroll, which aggregate
/// identically: an amount owed by a unit for a period, paid or not.
pub trait PayrollAdjustment {
    /// Amount of the adjustment
    fn amount(&self) -> f64;
    /// Business unit it belongs to
    fn unit(&self) -> &str;
    /// `YYYY-MM` period token
    fn period(&self) -> &str;
    /// Whether it has been paid
    fn is_paid(&self) -> bool;
}

impl PayrollAdjustment for encumbrance::Model {
    fn amount(&self) -> f64 {
        self.amount
    }
    fn unit(&self) -> &str {
        &self.unit
    }
    fn period(&self) -> &str {
        &self.period
    }
    fn is_paid(&self) -> bool {
        self.paid
    }
}

impl PayrollAdjustment for misc_payroll::Model {
    fn amount(&self) -> f64 {
        self.amount
    }
    fn unit(&self) -> &str {
        &self.unit
    }
    fn period(&self) -> &str {
        &self.period
    }
    fn is_paid(&self) -> bool {
        self.paid
    }
}
