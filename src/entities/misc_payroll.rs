//! Miscellaneous payroll entity - Ad-hoc payroll adjustments (bonuses,
//! transport vouchers, one-off payments) for one unit and period.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Miscellaneous payroll database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "misc_payroll")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Adjustment type
    pub kind: String,
    /// Amount of the adjustment
    pub amount: f64,
    /// Business unit paying it
    pub unit: String,
    /// `YYYY-MM` period the adjustment belongs to
    pub period: String,
    /// Whether it has been paid
    pub paid: bool,
}

/// No relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
