//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async and take the acting principal
//! ([`Actor`]) so that access checks and audit attribution happen inside
//! the data layer. Implementations must check access before touching
//! storage, run each call as one transaction, and write exactly one audit
//! entry per successful mutation.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::ClaimdeskResult;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    branch::{Branch, CreateBranch},
    claim::{Claim, ClaimStatus, CreateClaim},
    customer::{CreateCustomer, Customer, CustomerFilter, UpdateCustomer},
    payment::Payment,
    policy::{CreatePolicy, Policy, UpdatePolicyDetails},
    user::{Actor, CreateUser, User},
};

// ---------------------------------------------------------------------------
// Staff
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Admin-only. The password is hashed before storage.
    fn create(
        &self,
        actor: &Actor,
        input: CreateUser,
    ) -> impl Future<Output = ClaimdeskResult<User>> + Send;
    /// Unauthenticated lookup used by the login flow.
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = ClaimdeskResult<User>> + Send;
    fn get_by_id(&self, id: i64) -> impl Future<Output = ClaimdeskResult<User>> + Send;
    fn list(&self, actor: &Actor) -> impl Future<Output = ClaimdeskResult<Vec<User>>> + Send;
    /// Number of accounts; zero means the first admin still has to be
    /// created.
    fn count(&self) -> impl Future<Output = ClaimdeskResult<u64>> + Send;
}

pub trait BranchRepository: Send + Sync {
    fn create(
        &self,
        actor: &Actor,
        input: CreateBranch,
    ) -> impl Future<Output = ClaimdeskResult<Branch>> + Send;
    fn get(&self, actor: &Actor, id: i64) -> impl Future<Output = ClaimdeskResult<Branch>> + Send;
    fn list(&self, actor: &Actor) -> impl Future<Output = ClaimdeskResult<Vec<Branch>>> + Send;
}

// ---------------------------------------------------------------------------
// Customers & policies
// ---------------------------------------------------------------------------

pub trait CustomerRepository: Send + Sync {
    /// Fails with `DuplicateKey` when the email is already registered.
    fn create(
        &self,
        actor: &Actor,
        input: CreateCustomer,
    ) -> impl Future<Output = ClaimdeskResult<Customer>> + Send;
    /// Decrypts the national id; disclosing one is audited as a view.
    fn get(
        &self,
        actor: &Actor,
        id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Customer>> + Send;
    fn list(
        &self,
        actor: &Actor,
        filter: Option<CustomerFilter>,
    ) -> impl Future<Output = ClaimdeskResult<Vec<Customer>>> + Send;
    fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateCustomer,
    ) -> impl Future<Output = ClaimdeskResult<Customer>> + Send;
    /// Refused while the customer still owns policies.
    fn delete(&self, actor: &Actor, id: i64) -> impl Future<Output = ClaimdeskResult<()>> + Send;
}

pub trait PolicyRepository: Send + Sync {
    /// Fails with `NotFound` (and inserts nothing) when the customer does
    /// not exist.
    fn create(
        &self,
        actor: &Actor,
        input: CreatePolicy,
    ) -> impl Future<Output = ClaimdeskResult<Policy>> + Send;
    /// Partial update; only supplied fields change.
    fn update_details(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdatePolicyDetails,
    ) -> impl Future<Output = ClaimdeskResult<Policy>> + Send;
    fn get(&self, actor: &Actor, id: i64) -> impl Future<Output = ClaimdeskResult<Policy>> + Send;
    fn list_for_customer(
        &self,
        actor: &Actor,
        customer_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Vec<Policy>>> + Send;
    fn list(&self, actor: &Actor) -> impl Future<Output = ClaimdeskResult<Vec<Policy>>> + Send;
    /// Record a premium payment against the policy.
    fn record_payment(
        &self,
        actor: &Actor,
        policy_id: i64,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> impl Future<Output = ClaimdeskResult<Payment>> + Send;
}

// ---------------------------------------------------------------------------
// Claims & payments
// ---------------------------------------------------------------------------

pub trait ClaimRepository: Send + Sync {
    /// The number the next created claim would receive.
    fn next_claim_number(&self) -> impl Future<Output = ClaimdeskResult<String>> + Send;
    /// Fails with `NotFound` (and inserts nothing) when the policy does not
    /// exist.
    fn create(
        &self,
        actor: &Actor,
        input: CreateClaim,
    ) -> impl Future<Output = ClaimdeskResult<Claim>> + Send;
    /// Unconditionally overwrites the status and stamps `updated_at`.
    fn update_status(
        &self,
        actor: &Actor,
        id: i64,
        status: ClaimStatus,
    ) -> impl Future<Output = ClaimdeskResult<Claim>> + Send;
    fn get(&self, actor: &Actor, id: i64) -> impl Future<Output = ClaimdeskResult<Claim>> + Send;
    fn get_by_number(
        &self,
        actor: &Actor,
        claim_number: &str,
    ) -> impl Future<Output = ClaimdeskResult<Claim>> + Send;
    fn list(&self, actor: &Actor) -> impl Future<Output = ClaimdeskResult<Vec<Claim>>> + Send;
    fn list_by_status(
        &self,
        actor: &Actor,
        status: ClaimStatus,
    ) -> impl Future<Output = ClaimdeskResult<Vec<Claim>>> + Send;
    fn list_for_policy(
        &self,
        actor: &Actor,
        policy_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Vec<Claim>>> + Send;
    /// Record a payout against the claim.
    fn record_payment(
        &self,
        actor: &Actor,
        claim_id: i64,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> impl Future<Output = ClaimdeskResult<Payment>> + Send;
}

pub trait PaymentRepository: Send + Sync {
    fn get(&self, actor: &Actor, id: i64)
    -> impl Future<Output = ClaimdeskResult<Payment>> + Send;
    fn list_for_policy(
        &self,
        actor: &Actor,
        policy_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Vec<Payment>>> + Send;
    fn list_for_claim(
        &self,
        actor: &Actor,
        claim_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Vec<Payment>>> + Send;
    fn total_for_policy(
        &self,
        actor: &Actor,
        policy_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Decimal>> + Send;
    fn total_for_claim(
        &self,
        actor: &Actor,
        claim_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Decimal>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

pub trait AuditLogRepository: Send + Sync {
    /// Append one entry. A failed write is reported as
    /// `AuditWriteFailure`, never swallowed.
    fn record(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = ClaimdeskResult<AuditLogEntry>> + Send;
    /// Everything `user_id` did, newest first. Admins may review anyone;
    /// other actors only themselves.
    fn actions_by(
        &self,
        actor: &Actor,
        user_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Vec<AuditLogEntry>>> + Send;
    /// History of one record, oldest first.
    fn for_record(
        &self,
        actor: &Actor,
        table_name: &str,
        record_id: i64,
    ) -> impl Future<Output = ClaimdeskResult<Vec<AuditLogEntry>>> + Send;
}
