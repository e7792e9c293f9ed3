//! Human-readable output.

use std::fmt::Write;

use tender_search::SearchOutcome;

use crate::stats::DeadlineStats;

/// Format an amount with thousands separators, or `N/A` when unknown.
pub fn format_value(value: Option<f64>) -> String {
    let Some(value) = value else {
        return "N/A".to_string();
    };
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Render search results, best first.
pub fn format_outcome(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Found {} matches above threshold", outcome.total_matches);
    let _ = writeln!(out, "Showing top {} results:", outcome.results.len());

    for result in &outcome.results {
        let record = &result.record;
        let _ = writeln!(out);
        let _ = writeln!(out, "Score: {:.3}", result.similarity_score);
        let _ = writeln!(out, "Title: {}", record.title);
        let _ = writeln!(out, "Type: {}", record.procurement_type);
        let _ = writeln!(out, "Entity: {}", record.entity);
        let _ = writeln!(out, "Value: {}", format_value(record.estimated_value));
        let _ = writeln!(out, "Year: {}", result.financial_year);
        let _ = writeln!(out, "Deadline: {}", record.deadline);
        let _ = writeln!(out, "{}", "- ".repeat(40).trim_end());
    }

    if outcome.hidden() > 0 {
        let _ = writeln!(out, "\n{} more matches not shown", outcome.hidden());
    }
    out
}

/// Render deadline statistics for a financial year.
pub fn format_stats(year: &str, stats: &DeadlineStats) -> String {
    format!(
        "Statistics for {year}:\n\
         Total tenders: {}\n\
         Valid deadline dates: {}\n\
         Invalid/empty deadline dates: {}\n\
         Future deadlines: {}\n",
        stats.total, stats.valid_dates, stats.invalid_dates, stats.future_dates
    )
}
