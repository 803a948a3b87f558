//! Revenue entity - Point-of-sale revenue entries.
//!
//! Each entry records the takings of one unit on one day split by payment
//! channel. `total` is the sum of the channels and is computed when the entry
//! is created.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Revenue database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revenues")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Day the revenue was taken
    pub date: Date,
    /// Business unit that took the revenue
    pub unit: String,
    /// Cash takings
    pub cash: f64,
    /// Debit card takings
    pub debit: f64,
    /// Credit card takings
    pub credit: f64,
    /// Instant-transfer takings
    pub instant_transfer: f64,
    /// Meal voucher takings
    pub voucher: f64,
    /// Sum of all channels
    pub total: f64,
}

impl Model {
    /// Sum of the per-channel amounts.
    #[must_use]
    pub fn channel_sum(&self) -> f64 {
        self.cash + self.debit + self.credit + self.instant_transfer + self.voucher
    }
}

/// Revenue entries have no relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
