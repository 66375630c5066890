//! Report queries.
//!
//! [`ReportGenerator`] is generic over the claim and policy repositories so
//! it has no dependency on the database crate. It only reads; the one side
//! effect a read can have (repair of a claim without a status) belongs to
//! the claim repository.

use std::collections::HashMap;

use chrono::NaiveDate;
use claimdesk_core::error::ClaimdeskResult;
use claimdesk_core::models::claim::{Claim, ClaimStatus};
use claimdesk_core::models::policy::PolicyType;
use claimdesk_core::models::user::Actor;
use claimdesk_core::repository::{ClaimRepository, PolicyRepository};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::render;

/// Claims sharing one key (a status or a policy type).
#[derive(Debug, Clone, Serialize)]
pub struct ClaimGroup<K> {
    pub key: K,
    pub claims: Vec<Claim>,
}

impl<K> ClaimGroup<K> {
    pub fn total(&self) -> Decimal {
        self.claims.iter().map(|c| c.claim_amount).sum()
    }
}

/// Premiums written against claims filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub total_premiums: Decimal,
    pub total_claims: Decimal,
    /// Premiums minus claims; negative when claims exceed premiums.
    pub net: Decimal,
}

/// Key dates and state of one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimTimeline {
    pub claim_number: String,
    pub claim_date: NaiveDate,
    pub incident_date: NaiveDate,
    pub status: ClaimStatus,
    pub amount: Decimal,
}

impl From<&Claim> for ClaimTimeline {
    fn from(claim: &Claim) -> Self {
        Self {
            claim_number: claim.claim_number.clone(),
            claim_date: claim.claim_date,
            incident_date: claim.incident_date,
            status: claim.status,
            amount: claim.claim_amount,
        }
    }
}

/// Group `claims` by `key_of`, ordering groups as `order` lists the keys
/// and dropping empty groups.
fn group_in_order<K>(
    claims: Vec<Claim>,
    order: &[K],
    key_of: impl Fn(&Claim) -> Option<K>,
) -> Vec<ClaimGroup<K>>
where
    K: Copy + Eq + std::hash::Hash,
{
    let mut buckets: HashMap<K, Vec<Claim>> = HashMap::new();
    for claim in claims {
        if let Some(key) = key_of(&claim) {
            buckets.entry(key).or_default().push(claim);
        }
    }
    order
        .iter()
        .filter_map(|key| {
            buckets.remove(key).map(|claims| ClaimGroup { key: *key, claims })
        })
        .collect()
}

/// Builds reports from the claim and policy repositories.
pub struct ReportGenerator<C: ClaimRepository, P: PolicyRepository> {
    claims: C,
    policies: P,
}

impl<C: ClaimRepository, P: PolicyRepository> ReportGenerator<C, P> {
    pub fn new(claims: C, policies: P) -> Self {
        Self { claims, policies }
    }

    /// Claims grouped by status in workflow order (pending, approved,
    /// rejected, paid). Statuses with no claims are omitted.
    pub async fn claims_by_status(
        &self,
        actor: &Actor,
    ) -> ClaimdeskResult<Vec<ClaimGroup<ClaimStatus>>> {
        let claims = self.claims.list(actor).await?;
        debug!(claims = claims.len(), "Building claims-by-status report");
        Ok(group_in_order(claims, &ClaimStatus::ALL, |c| Some(c.status)))
    }

    /// Claims grouped by the type of the policy they were filed against.
    pub async fn claims_by_policy_type(
        &self,
        actor: &Actor,
    ) -> ClaimdeskResult<Vec<ClaimGroup<PolicyType>>> {
        let types: HashMap<i64, PolicyType> = self
            .policies
            .list(actor)
            .await?
            .into_iter()
            .map(|p| (p.id, p.policy_type))
            .collect();
        let claims = self.claims.list(actor).await?;
        debug!(
            claims = claims.len(),
            policies = types.len(),
            "Building claims-by-policy-type report"
        );

        Ok(group_in_order(claims, &PolicyType::ALL, |c| {
            let found = types.get(&c.policy_id).copied();
            if found.is_none() {
                warn!(
                    claim_number = %c.claim_number,
                    policy_id = c.policy_id,
                    "Claim references an unknown policy"
                );
            }
            found
        }))
    }

    /// Total premiums, total claimed and the difference. `None` when there
    /// are neither policies nor claims.
    pub async fn financial_summary(
        &self,
        actor: &Actor,
    ) -> ClaimdeskResult<Option<FinancialSummary>> {
        let policies = self.policies.list(actor).await?;
        let claims = self.claims.list(actor).await?;
        if policies.is_empty() && claims.is_empty() {
            return Ok(None);
        }

        let total_premiums: Decimal = policies.iter().map(|p| p.premium).sum();
        let total_claims: Decimal = claims.iter().map(|c| c.claim_amount).sum();
        Ok(Some(FinancialSummary {
            total_premiums,
            total_claims,
            net: total_premiums - total_claims,
        }))
    }

    /// Filing date, incident date, status and amount of one claim.
    pub async fn claim_timeline(
        &self,
        actor: &Actor,
        claim_number: &str,
    ) -> ClaimdeskResult<ClaimTimeline> {
        let claim = self.claims.get_by_number(actor, claim_number).await?;
        Ok(ClaimTimeline::from(&claim))
    }

    pub async fn claims_by_status_report(&self, actor: &Actor) -> ClaimdeskResult<String> {
        let groups = self.claims_by_status(actor).await?;
        Ok(render::render_groups("Claims by Status Report", "Status", &groups))
    }

    pub async fn claims_by_policy_type_report(&self, actor: &Actor) -> ClaimdeskResult<String> {
        let groups = self.claims_by_policy_type(actor).await?;
        Ok(render::render_groups("Claims by Policy Type Report", "Policy Type", &groups))
    }

    pub async fn financial_summary_report(&self, actor: &Actor) -> ClaimdeskResult<String> {
        let summary = self.financial_summary(actor).await?;
        Ok(render::render_financial_summary(summary.as_ref()))
    }

    pub async fn claim_timeline_report(
        &self,
        actor: &Actor,
        claim_number: &str,
    ) -> ClaimdeskResult<String> {
        let timeline = self.claim_timeline(actor, claim_number).await?;
        Ok(render::render_claim_timeline(&timeline))
    }
}

