//! Double-count guard between envelopes and the expense collection.
//!
//! An envelope withdrawal is written to the expense collection so it shows
//! up in payment history, but the same money is already accounted for by the
//! envelope total. Generic expense totals must therefore be computed over
//! [`reconcile`]d records only.

use crate::entities::expense;

/// Expenses that count toward generic totals: every record that is not an
/// envelope withdrawal.
///
/// Order is preserved and the function is idempotent.
#[must_use]
pub fn reconcile(expenses: &[expense::Model]) -> Vec<expense::Model> {
    expenses
        .iter()
        .filter(|e| !e.is_withdrawal())
        .cloned()
        .collect()
}

/// The complement of [`reconcile`]: envelope withdrawals only.
#[must_use]
pub fn withdrawals(expenses: &[expense::Model]) -> Vec<&expense::Model> {
    expenses.iter().filter(|e| e.is_withdrawal()).collect()
}
