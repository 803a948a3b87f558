//! Fixed-expense envelope entity.
//!
//! An envelope budgets a total for one unit and period. Consumption is never
//! stored; it is derived from the withdrawal expenses that reference the
//! envelope (see `core::envelope`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed-expense envelope database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fixed_expenses")]
pub struct Model {
    /// Unique identifier, referenced by withdrawal markers
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable name (e.g. "Aluguel", "Energia")
    pub name: String,
    /// Business unit the budget belongs to
    pub unit: String,
    /// `YYYY-MM` period the budget covers
    pub period: String,
    /// Total budgeted amount
    pub total: f64,
}

/// Withdrawals link to envelopes by id only; no declared relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
