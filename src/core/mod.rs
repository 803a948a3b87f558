//! Core business logic - framework-agnostic reconciliation, budgeting and
//! aggregation over the record sources.

/// Concurrent fetch and the cash-flow, monthly and weekly views
pub mod aggregate;
/// Monthly owner allowance split across units
pub mod allowance;
/// Selected period, cache and cycle tokens
pub mod context;
/// Fixed-expense envelopes and their withdrawals
pub mod envelope;
/// Writes that keep the cache in step
pub mod mutations;
/// Calendar months
pub mod period;
/// Keeps envelope withdrawals out of generic totals
pub mod reconcile;
/// Revenue entry and paid flags
pub mod records;
/// Plain-text rendering
pub mod report;
