//! Unified error type for the reconciliation engine.
//!
//! Local precondition failures (`InsufficientEnvelopeBalance`,
//! `InsufficientAllowanceBalance`, `InvalidAmount`) are raised before any
//! write reaches a source. `SourceUnavailable` is what a source reports once
//! its retry policy is exhausted; the aggregator absorbs it into degraded
//! output instead of failing.

use thiserror::Error;

/// Every failure the engine reports.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or input
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// Store failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Negative, zero where not allowed, or non-finite amount
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Period text not in `YYYY-MM` form
    #[error("Invalid period '{value}', expected YYYY-MM")]
    InvalidPeriod {
        /// The rejected text
        value: String,
    },

    /// No envelope with this id
    #[error("Envelope not found: {id}")]
    EnvelopeNotFound {
        /// Requested envelope id
        id: i64,
    },

    /// No record with this id in the collection
    #[error("Record not found in {collection}: {id}")]
    RecordNotFound {
        /// Collection searched
        collection: &'static str,
        /// Requested record id
        id: i64,
    },

    /// Unit missing from the configuration
    #[error("Unknown business unit: {unit}")]
    UnknownUnit {
        /// The unknown unit name
        unit: String,
    },

    /// Withdrawal larger than what is left in the envelope
    #[error(
        "Insufficient balance in envelope {envelope_id}: remaining {remaining:.2}, requested {requested:.2}"
    )]
    InsufficientEnvelopeBalance {
        /// Envelope withdrawn from
        envelope_id: i64,
        /// Balance left before the withdrawal
        remaining: f64,
        /// Amount asked for
        requested: f64,
    },

    /// New envelope total below what was already withdrawn
    #[error(
        "Envelope {envelope_id} already has {consumed:.2} withdrawn, total {total:.2} is too low"
    )]
    EnvelopeTotalBelowConsumed {
        /// Envelope being edited
        envelope_id: i64,
        /// Sum of its paid withdrawals
        consumed: f64,
        /// Rejected new total
        total: f64,
    },

    /// Withdrawal larger than the unit's remaining share
    #[error(
        "Insufficient allowance for unit {unit}: remaining {remaining:.2}, requested {requested:.2}"
    )]
    InsufficientAllowanceBalance {
        /// Unit withdrawn from
        unit: String,
        /// Share left before the withdrawal
        remaining: f64,
        /// Amount asked for
        requested: f64,
    },

    /// A source kept failing until its retries ran out
    #[error("Source '{collection}' unavailable after {attempts} attempt(s): {message}")]
    SourceUnavailable {
        /// Failing collection
        collection: String,
        /// Attempts made, the first included
        attempts: u32,
        /// Last error seen
        message: String,
    },
}

impl Error {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only store-side failures qualify; validation and balance checks are
    /// deterministic and fail the same way every time.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Io(_) | Self::SourceUnavailable { .. }
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
