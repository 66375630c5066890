//! Plain-text rendering of reports for the UI's report pane.

use std::fmt::{Display, Write};

use rust_decimal::{Decimal, RoundingStrategy};

use crate::report::{ClaimGroup, ClaimTimeline, FinancialSummary};

const NO_CLAIMS: &str = "No claims found";
const NO_FINANCIAL_DATA: &str = "No financial data found";

fn money(amount: Decimal) -> String {
    format!(
        "£{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn heading(out: &mut String, title: &str) {
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count()));
    out.push_str("\n\n");
}

/// One section per group, one line per claim:
///
/// ```text
/// Status: pending
/// --------------------------------------------------
/// Claim #CLM-001 - Amount: £5000.00
/// ```
pub fn render_groups<K: Display>(title: &str, label: &str, groups: &[ClaimGroup<K>]) -> String {
    if groups.iter().all(|g| g.claims.is_empty()) {
        return NO_CLAIMS.to_string();
    }

    let mut out = String::new();
    heading(&mut out, title);
    for group in groups {
        let _ = writeln!(out, "{label}: {}", group.key);
        out.push_str(&"-".repeat(50));
        out.push('\n');
        for claim in &group.claims {
            let _ = writeln!(
                out,
                "Claim #{} - Amount: {}",
                claim.claim_number,
                money(claim.claim_amount)
            );
        }
        out.push('\n');
    }
    out
}

pub fn render_financial_summary(summary: Option<&FinancialSummary>) -> String {
    let Some(summary) = summary else {
        return NO_FINANCIAL_DATA.to_string();
    };

    let mut out = String::new();
    heading(&mut out, "Financial Summary Report");
    let _ = writeln!(out, "Total Premiums: {}", money(summary.total_premiums));
    let _ = writeln!(out, "Total Claims: {}", money(summary.total_claims));
    let _ = writeln!(out, "Net Income: {}", money(summary.net));
    out
}

pub fn render_claim_timeline(timeline: &ClaimTimeline) -> String {
    let mut out = String::new();
    heading(
        &mut out,
        &format!("Claim Timeline Report - Claim #{}", timeline.claim_number),
    );
    let _ = writeln!(out, "Date Filed: {}", timeline.claim_date);
    let _ = writeln!(out, "Incident Date: {}", timeline.incident_date);
    let _ = writeln!(out, "Status: {}", timeline.status);
    let _ = writeln!(out, "Amount: {}", money(timeline.amount));
    out
}
