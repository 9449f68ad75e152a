//! Text rendering of a [`SprintSummary`].

use crate::types::SprintSummary;
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

/// Layout of the rendered summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Banner, section headers, one item per two lines and totals.
    #[default]
    Detailed,
    /// One line per item, meant to be pasted elsewhere verbatim.
    Concise,
}

/// Renders the summary. Items keep the order they were fetched in.
pub fn format(summary: &SprintSummary, mode: OutputMode) -> String {
    match mode {
        OutputMode::Detailed => format_detailed(summary),
        OutputMode::Concise => format_concise(summary),
    }
}

fn format_detailed(summary: &SprintSummary) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "📊 SPRINT SUMMARY");
    let _ = writeln!(out, "📅 Date Range: {}", summary.interval);
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out);

    let _ = writeln!(out, "✅ COMPLETED JIRA TICKETS");
    let _ = writeln!(out, "{light}");
    for ticket in &summary.tickets {
        let _ = writeln!(out, "{}: {}", ticket.key, ticket.title);
        let _ = writeln!(out, "   {}", ticket.url);
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "Total: {} ticket(s)", summary.tickets.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out);

    let _ = writeln!(out, "👀 GITHUB PR REVIEWS");
    let _ = writeln!(out, "{light}");
    for review in &summary.reviews {
        let _ = writeln!(
            out,
            "{} [{}] #{}: {} ({})",
            review.state.marker(),
            review.repository,
            review.number,
            review.title,
            review.state
        );
        let _ = writeln!(out, "   {}", review.url);
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "Total: {} PR(s) reviewed", summary.reviews.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "{heavy}");

    out
}

fn format_concise(summary: &SprintSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Completed JIRA Tickets:");
    if summary.tickets.is_empty() {
        let _ = writeln!(out, "Total: 0");
    }
    for ticket in &summary.tickets {
        let _ = writeln!(out, "{}: {} - {}", ticket.key, ticket.title, ticket.url);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "GitHub PR Reviews:");
    if summary.reviews.is_empty() {
        let _ = writeln!(out, "Total: 0");
    }
    for review in &summary.reviews {
        let _ = writeln!(
            out,
            "{} #{}: {} - {}",
            review.repository, review.number, review.title, review.url
        );
    }

    out
}
