//! Integration tests for the Claim repository: numbering, lenient status
//! input, status updates and repair of rows without a status.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use claimdesk_auth::AuthConfig;
use claimdesk_core::error::ClaimdeskError;
use claimdesk_core::models::audit::AuditAction;
use claimdesk_core::models::claim::{ClaimStatus, CreateClaim};
use claimdesk_core::models::customer::CreateCustomer;
use claimdesk_core::models::policy::{CreatePolicy, PolicyType};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::{
    AuditLogRepository, ClaimRepository, CustomerRepository, PolicyRepository,
};
use claimdesk_db::{Database, DbConfig};
use rust_decimal_macros::dec;

/// Helper: temp-file DB with one customer holding one policy.
async fn setup() -> (tempfile::TempDir, Database, i64) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(
        &DbConfig {
            path: dir.path().join("claims.db"),
            ..DbConfig::default()
        },
        AuthConfig::new([7u8; 32]),
    )
    .await
    .unwrap();

    let manager = Actor::user(2, Role::ClaimsManager);
    let customer = db
        .customers()
        .create(
            &manager,
            CreateCustomer {
                first_name: "Ana".into(),
                last_name: "Ruiz".into(),
                email: "ana@example.com".into(),
                phone: None,
                address: None,
                date_of_birth: None,
                national_id: None,
            },
        )
        .await
        .unwrap();
    let policy = db
        .policies()
        .create(
            &manager,
            CreatePolicy {
                customer_id: customer.id,
                policy_type: PolicyType::Home,
                policy_number: "HOME-100".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                premium: dec!(640.00),
                coverage_limit: dec!(300000.00),
                status: None,
                payment_schedule: None,
                beneficiary_info: None,
                exclusions: None,
            },
        )
        .await
        .unwrap();

    (dir, db, policy.id)
}

fn adjuster() -> Actor {
    Actor::user(3, Role::Adjuster)
}

fn manager() -> Actor {
    Actor::user(2, Role::ClaimsManager)
}

fn claim(policy_id: i64, status: Option<&str>) -> CreateClaim {
    CreateClaim {
        policy_id,
        claim_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        incident_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        incident_time: None,
        incident_location: Some("Kitchen".into()),
        description: "Burst pipe".into(),
        claim_amount: dec!(1800.00),
        status: status.map(String::from),
    }
}

async fn claim_rows(db: &Database) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    sqlx::query_scalar("SELECT COUNT(*) FROM claims")
        .fetch_one(&mut *conn)
        .await
        .unwrap()
}

/// Insert a claim the way an older tool would have: without a status.
async fn insert_legacy_claim(db: &Database, policy_id: i64, number: &str) -> i64 {
    let mut conn = db.pool().acquire().await.unwrap();
    sqlx::query(
        "INSERT INTO claims (policy_id, claim_number, claim_date, incident_date, \
         description, claim_amount, status, created_at, updated_at) \
         VALUES (?, ?, '2024-01-10', '2024-01-09', 'Legacy import', '75.00', NULL, ?, ?)",
    )
    .bind(policy_id)
    .bind(number)
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .unwrap()
    .last_insert_rowid()
}

#[tokio::test]
async fn numbering_starts_at_one_and_increments() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();

    assert_eq!(repo.next_claim_number().await.unwrap(), "CLM-001");

    let mut numbers = Vec::new();
    for _ in 0..3 {
        numbers.push(repo.create(&adjuster(), claim(policy_id, None)).await.unwrap().claim_number);
    }
    assert_eq!(numbers, ["CLM-001", "CLM-002", "CLM-003"]);
    assert_eq!(repo.next_claim_number().await.unwrap(), "CLM-004");
}

#[tokio::test]
async fn numbering_widens_past_999() {
    let (_dir, db, policy_id) = setup().await;
    insert_legacy_claim(&db, policy_id, "CLM-999").await;

    let created = db
        .claims()
        .create(&adjuster(), claim(policy_id, Some("pending")))
        .await
        .unwrap();
    assert_eq!(created.claim_number, "CLM-1000");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_never_share_a_number() {
    let (_dir, db, policy_id) = setup().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let repo = db.claims();
        handles.push(tokio::spawn(async move {
            repo.create(&adjuster(), claim(policy_id, None))
                .await
                .unwrap()
                .claim_number
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        assert!(numbers.insert(handle.await.unwrap()));
    }
    let expected: HashSet<String> = (1..=10).map(|n| format!("CLM-{n:03}")).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn missing_or_unknown_status_becomes_pending() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();

    let missing = repo.create(&adjuster(), claim(policy_id, None)).await.unwrap();
    let unknown = repo.create(&adjuster(), claim(policy_id, Some("lost"))).await.unwrap();
    let explicit = repo
        .create(&adjuster(), claim(policy_id, Some("Approved")))
        .await
        .unwrap();

    assert_eq!(missing.status, ClaimStatus::Pending);
    assert_eq!(unknown.status, ClaimStatus::Pending);
    assert_eq!(explicit.status, ClaimStatus::Approved);
}

#[tokio::test]
async fn missing_policy_fails_and_inserts_nothing() {
    let (_dir, db, _) = setup().await;

    let err = db
        .claims()
        .create(&adjuster(), claim(4242, None))
        .await
        .unwrap_err();

    assert!(matches!(err, ClaimdeskError::NotFound { ref entity, .. } if entity == "policy"));
    assert_eq!(claim_rows(&db).await, 0);
    assert_eq!(db.claims().next_claim_number().await.unwrap(), "CLM-001");
}

#[tokio::test]
async fn plain_users_cannot_file_claims() {
    let (_dir, db, policy_id) = setup().await;
    let err = db
        .claims()
        .create(&Actor::user(8, Role::User), claim(policy_id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::AccessDenied { .. }));
    assert_eq!(claim_rows(&db).await, 0);
}

#[tokio::test]
async fn update_status_always_stamps_updated_at() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();
    let created = repo.create(&adjuster(), claim(policy_id, None)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let approved = repo
        .update_status(&manager(), created.id, ClaimStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, ClaimStatus::Approved);
    assert!(approved.updated_at > created.updated_at);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let again = repo
        .update_status(&manager(), created.id, ClaimStatus::Approved)
        .await
        .unwrap();
    assert!(again.updated_at > approved.updated_at);

    let history = db
        .audit()
        .for_record(&manager(), "claims", created.id)
        .await
        .unwrap();
    let actions: Vec<_> = history.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        [AuditAction::Create, AuditAction::Update, AuditAction::Update]
    );
}

#[tokio::test]
async fn backward_transitions_are_allowed() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();
    let created = repo.create(&adjuster(), claim(policy_id, Some("paid"))).await.unwrap();

    let reopened = repo
        .update_status(&manager(), created.id, ClaimStatus::Pending)
        .await
        .unwrap();
    assert_eq!(reopened.status, ClaimStatus::Pending);
}

#[tokio::test]
async fn adjusters_cannot_change_status() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();
    let created = repo.create(&adjuster(), claim(policy_id, None)).await.unwrap();

    let err = repo
        .update_status(&adjuster(), created.id, ClaimStatus::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::AccessDenied { .. }));
    assert_eq!(
        repo.get(&adjuster(), created.id).await.unwrap().status,
        ClaimStatus::Pending
    );
}

#[tokio::test]
async fn null_status_is_repaired_on_read() {
    let (_dir, db, policy_id) = setup().await;
    let id = insert_legacy_claim(&db, policy_id, "CLM-050").await;
    let reader = Actor::user(11, Role::User);

    let claim = db.claims().get(&reader, id).await.unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);

    let mut conn = db.pool().acquire().await.unwrap();
    let stored: Option<String> = sqlx::query_scalar("SELECT status FROM claims WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    drop(conn);
    assert_eq!(stored.as_deref(), Some("pending"));

    let history = db.audit().for_record(&reader, "claims", id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, AuditAction::Update);
    assert_eq!(history[0].user_id, Some(11));

    // Already repaired: a second read writes nothing.
    db.claims().get(&reader, id).await.unwrap();
    assert_eq!(
        db.audit().for_record(&reader, "claims", id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn pending_listing_includes_rows_without_status() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();
    let legacy = insert_legacy_claim(&db, policy_id, "CLM-007").await;
    let filed = repo.create(&adjuster(), claim(policy_id, None)).await.unwrap();
    repo.create(&adjuster(), claim(policy_id, Some("rejected")))
        .await
        .unwrap();

    let pending = repo
        .list_by_status(&manager(), ClaimStatus::Pending)
        .await
        .unwrap();
    let ids: Vec<i64> = pending.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![legacy, filed.id]);
    assert!(pending.iter().all(|c| c.status == ClaimStatus::Pending));
    assert_eq!(filed.claim_number, "CLM-008");

    let rejected = repo
        .list_by_status(&manager(), ClaimStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.len(), 1);
}

#[tokio::test]
async fn lookup_by_number_and_policy() {
    let (_dir, db, policy_id) = setup().await;
    let repo = db.claims();
    let created = repo.create(&adjuster(), claim(policy_id, None)).await.unwrap();

    let by_number = repo.get_by_number(&adjuster(), "CLM-001").await.unwrap();
    assert_eq!(by_number.id, created.id);
    assert_eq!(by_number.claim_amount, dec!(1800.00));
    assert_eq!(by_number.incident_location.as_deref(), Some("Kitchen"));

    let err = repo.get_by_number(&adjuster(), "CLM-404").await.unwrap_err();
    assert!(matches!(err, ClaimdeskError::NotFound { .. }));

    assert_eq!(repo.list_for_policy(&adjuster(), policy_id).await.unwrap().len(), 1);
    assert!(repo.list_for_policy(&adjuster(), 999).await.unwrap().is_empty());
}
