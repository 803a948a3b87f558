//! Plain-text rendering of an [`AggregateReport`].
//!
//! Framework-agnostic; the binary prints these strings, other front ends can
//! render the structured report directly.

use crate::core::aggregate::{AggregateReport, CashFlowView, MonthlySummary, WeeklySeries};
use std::fmt::Write;

/// Width of a full bar in characters.
pub const BAR_LENGTH: usize = 20;

/// Consumed share of a budget as a percentage; zero for an empty budget.
#[must_use]
pub fn calculate_progress(consumed: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    (consumed / total) * 100.0
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let filled = filled_cells(progress_percent, length);
    let empty = length.saturating_sub(filled);

    let filled_str = "█".repeat(filled);
    let empty_str = "░".repeat(empty);

    format!("[{filled_str}{empty_str}] {progress_percent:.1}%")
}

// Cast safety: clamped ∈ [0, 100] and length is a small display width.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn filled_cells(progress_percent: f64, length: usize) -> usize {
    let clamped = if progress_percent.is_finite() {
        progress_percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    ((clamped / 100.0) * length as f64).round() as usize
}

/// Formats an amount as `R$ 1234.56`, with a leading minus when negative.
///
/// Amounts that round to zero cents print as `R$ 0.00`, whatever their sign.
#[must_use]
pub fn format_money(amount: f64) -> String {
    // Adding +0.0 turns -0.0 into 0.0.
    let cents = (amount * 100.0).round() / 100.0 + 0.0;
    if cents < 0.0 {
        format!("-R$ {:.2}", cents.abs())
    } else {
        format!("R$ {cents:.2}")
    }
}

/// One labelled line per cash-flow figure.
#[must_use]
pub fn format_cash_flow(view: &CashFlowView) -> String {
    let mut out = String::from("CASH FLOW\n");
    let rows = [
        ("Revenue", view.revenue),
        ("Working capital", view.working_capital),
        ("Total cash", view.total_cash),
        ("Paid expenses", view.paid_expenses),
        ("Envelope withdrawals", view.paid_envelope_withdrawals),
        ("Paid payroll", view.paid_payroll),
        ("Paid encumbrances", view.paid_encumbrances),
        ("Paid other payroll", view.paid_misc),
        ("Total paid out", view.total_paid_out),
        ("Cash flow", view.cash_flow),
    ];
    for (label, amount) in rows {
        let _ = writeln!(out, "  {label:<22}{:>16}", format_money(amount));
    }
    out
}

/// A table with one row per unit and a combined row.
#[must_use]
pub fn format_monthly_summary(summary: &MonthlySummary) -> String {
    let mut out = String::from("MONTHLY SUMMARY\n");
    let _ = writeln!(
        out,
        "  {:<8}{:>16}{:>16}{:>16}{:>16}",
        "Unit", "Revenue", "Expenses", "Payroll", "Net"
    );
    let combined = ("All".to_string(), &summary.combined);
    for (unit, row) in summary.units.iter().map(|(u, r)| (u.clone(), r)).chain([combined]) {
        let _ = writeln!(
            out,
            "  {unit:<8}{:>16}{:>16}{:>16}{:>16}",
            format_money(row.revenue),
            format_money(row.expenses),
            format_money(row.payroll),
            format_money(row.net)
        );
    }
    out
}

/// One bar per week, scaled to the best week.
#[must_use]
pub fn format_weekly_series(series: &WeeklySeries) -> String {
    let mut out = String::from("WEEKLY REVENUE\n");
    if series.weeks.is_empty() {
        out.push_str("  No revenue this month\n");
        return out;
    }
    let best = series
        .weeks
        .iter()
        .map(|(_, total)| *total)
        .fold(0.0_f64, f64::max);
    for (week, total) in &series.weeks {
        let cells = filled_cells(calculate_progress(*total, best), BAR_LENGTH);
        let _ = writeln!(
            out,
            "  Week {week} {:<width$} {}",
            "█".repeat(cells),
            format_money(*total),
            width = BAR_LENGTH
        );
    }
    out
}

/// The whole report, section by section.
#[must_use]
pub fn format_report(report: &AggregateReport) -> String {
    let mut out = format!(
        "Period {} ({})\n\n",
        report.token.period,
        report.unit_filter.as_deref().unwrap_or("all units")
    );
    out.push_str(&format_cash_flow(&report.cash_flow));
    out.push('\n');
    out.push_str(&format_monthly_summary(&report.monthly));
    out.push('\n');
    out.push_str(&format_weekly_series(&report.weekly));

    if !report.envelopes.is_empty() {
        out.push_str("\nENVELOPES\n");
        for env in &report.envelopes {
            let progress = calculate_progress(env.consumed, env.total);
            let _ = writeln!(
                out,
                "  #{} {} ({}) {} remaining {}",
                env.envelope_id,
                env.name,
                env.unit,
                format_progress_bar(progress, None),
                format_money(env.remaining)
            );
        }
    }

    if !report.allowance.is_empty() {
        out.push_str("\nALLOWANCE\n");
        for unit in &report.allowance {
            let progress = calculate_progress(unit.consumed, unit.total);
            let _ = writeln!(
                out,
                "  {} {} remaining {} of {}",
                unit.unit,
                format_progress_bar(progress, None),
                format_money(unit.remaining),
                format_money(unit.total)
            );
        }
    }

    if report.is_degraded() {
        out.push_str("\nUNAVAILABLE SOURCES (shown as empty)\n");
        for source in &report.degraded {
            let _ = writeln!(out, "  {}: {}", source.collection, source.message);
        }
    }
    out
}
