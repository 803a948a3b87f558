//! Encumbrance entity - Statutory payroll charges (social security, severance
//! fund and similar) owed by a unit for one period.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Encumbrance database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "encumbrances")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Charge type (e.g. `"INSS"`, `"FGTS"`)
    pub kind: String,
    /// Amount owed
    pub amount: f64,
    /// Business unit that owes it
    pub unit: String,
    /// `YYYY-MM` period the charge belongs to
    pub period: String,
    /// Whether the charge has been paid
    pub paid: bool,
}

/// Encumbrances have no relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
