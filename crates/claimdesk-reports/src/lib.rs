//! Claimdesk Reports — read-only summaries of claims and premiums built on
//! the `claimdesk-core` repository contracts.

pub mod render;
pub mod report;

pub use render::{render_claim_timeline, render_financial_summary, render_groups};
pub use report::{ClaimGroup, ClaimTimeline, FinancialSummary, ReportGenerator};
