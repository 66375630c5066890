//! Integration tests for payment recording, payment reads and the audit
//! trail.

use chrono::NaiveDate;
use claimdesk_auth::AuthConfig;
use claimdesk_core::error::ClaimdeskError;
use claimdesk_core::models::audit::{AuditAction, CreateAuditLogEntry};
use claimdesk_core::models::claim::CreateClaim;
use claimdesk_core::models::customer::CreateCustomer;
use claimdesk_core::models::payment::{PaymentStatus, PaymentTarget};
use claimdesk_core::models::policy::{CreatePolicy, PolicyType};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::{
    AuditLogRepository, ClaimRepository, CustomerRepository, PaymentRepository, PolicyRepository,
};
use claimdesk_db::{Database, DbConfig};
use rust_decimal_macros::dec;

/// Helper: temp-file DB with a customer, a policy and a claim on it.
async fn setup() -> (tempfile::TempDir, Database, i64, i64) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(
        &DbConfig {
            path: dir.path().join("payments.db"),
            ..DbConfig::default()
        },
        AuthConfig::new([9u8; 32]),
    )
    .await
    .unwrap();

    let customer = db
        .customers()
        .create(
            &manager(),
            CreateCustomer {
                first_name: "Kim".into(),
                last_name: "Park".into(),
                email: "kim@example.com".into(),
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
            &manager(),
            CreatePolicy {
                customer_id: customer.id,
                policy_type: PolicyType::Travel,
                policy_number: "TRV-1".into(),
                start_date: date(2024, 1, 1),
                end_date: date(2024, 12, 31),
                premium: dec!(90.00),
                coverage_limit: dec!(10000.00),
                status: None,
                payment_schedule: Some("quarterly".into()),
                beneficiary_info: None,
                exclusions: None,
            },
        )
        .await
        .unwrap();
    let claim = db
        .claims()
        .create(
            &Actor::user(3, Role::Adjuster),
            CreateClaim {
                policy_id: policy.id,
                claim_date: date(2024, 5, 3),
                incident_date: date(2024, 5, 1),
                incident_time: None,
                incident_location: Some("Lisbon".into()),
                description: "Lost luggage".into(),
                claim_amount: dec!(400.00),
                status: None,
            },
        )
        .await
        .unwrap();

    (dir, db, policy.id, claim.id)
}

fn manager() -> Actor {
    Actor::user(2, Role::ClaimsManager)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn premium_payments_are_recorded_and_totalled() {
    let (_dir, db, policy_id, _) = setup().await;

    let first = db
        .policies()
        .record_payment(&manager(), policy_id, dec!(22.50), date(2024, 1, 1))
        .await
        .unwrap();
    db.policies()
        .record_payment(&manager(), policy_id, dec!(22.50), date(2024, 4, 1))
        .await
        .unwrap();

    assert_eq!(first.target, PaymentTarget::Policy(policy_id));
    assert_eq!(first.status, PaymentStatus::Completed);

    let payments = db.payments();
    let reader = Actor::user(9, Role::User);
    assert_eq!(payments.get(&reader, first.id).await.unwrap().amount, dec!(22.50));
    assert_eq!(payments.list_for_policy(&reader, policy_id).await.unwrap().len(), 2);
    assert_eq!(
        payments.total_for_policy(&reader, policy_id).await.unwrap(),
        dec!(45.00)
    );
}

#[tokio::test]
async fn claim_payouts_are_recorded_against_the_claim() {
    let (_dir, db, policy_id, claim_id) = setup().await;

    let payout = db
        .claims()
        .record_payment(&manager(), claim_id, dec!(400.00), date(2024, 6, 1))
        .await
        .unwrap();
    assert_eq!(payout.target, PaymentTarget::Claim(claim_id));

    let reader = Actor::user(9, Role::User);
    let payments = db.payments();
    assert_eq!(payments.total_for_claim(&reader, claim_id).await.unwrap(), dec!(400.00));
    assert!(payments.list_for_policy(&reader, policy_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let (_dir, db, policy_id, claim_id) = setup().await;

    let err = db
        .policies()
        .record_payment(&manager(), policy_id, dec!(0), date(2024, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::Validation { .. }));

    let err = db
        .claims()
        .record_payment(&manager(), claim_id, dec!(-5), date(2024, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::Validation { .. }));
}

#[tokio::test]
async fn payment_for_missing_target_is_not_found() {
    let (_dir, db, _, _) = setup().await;

    let err = db
        .policies()
        .record_payment(&manager(), 999, dec!(10), date(2024, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::NotFound { .. }));

    let err = db
        .claims()
        .record_payment(&manager(), 999, dec!(10), date(2024, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::NotFound { .. }));

    let err = db
        .payments()
        .get(&manager(), 999)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::NotFound { .. }));
}

#[tokio::test]
async fn adjusters_cannot_record_payouts() {
    let (_dir, db, _, claim_id) = setup().await;
    let err = db
        .claims()
        .record_payment(&Actor::user(3, Role::Adjuster), claim_id, dec!(10), date(2024, 6, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::AccessDenied { .. }));
}

#[tokio::test]
async fn each_mutation_writes_exactly_one_entry() {
    let (_dir, db, policy_id, _) = setup().await;
    let audit = db.audit();
    let admin = Actor::user(1, Role::Admin);

    // Setup performed three creations: two by the manager, one by the adjuster.
    assert_eq!(audit.actions_by(&admin, 2).await.unwrap().len(), 2);
    assert_eq!(audit.actions_by(&admin, 3).await.unwrap().len(), 1);

    let payment = db
        .policies()
        .record_payment(&manager(), policy_id, dec!(30), date(2024, 2, 1))
        .await
        .unwrap();

    let by_manager = audit.actions_by(&admin, 2).await.unwrap();
    assert_eq!(by_manager.len(), 3);
    // Newest first.
    assert_eq!(by_manager[0].table_name, "payments");
    assert_eq!(by_manager[0].record_id, Some(payment.id));
    assert_eq!(by_manager[0].action, AuditAction::Create);
}

#[tokio::test]
async fn staff_may_only_review_their_own_actions() {
    let (_dir, db, _, _) = setup().await;
    let audit = db.audit();

    assert_eq!(audit.actions_by(&manager(), 2).await.unwrap().len(), 2);

    let err = audit.actions_by(&manager(), 3).await.unwrap_err();
    assert!(matches!(err, ClaimdeskError::AccessDenied { .. }));
}

#[tokio::test]
async fn record_appends_system_entries() {
    let (_dir, db, _, _) = setup().await;
    let audit = db.audit();

    let entry = audit
        .record(CreateAuditLogEntry {
            user_id: None,
            action: AuditAction::View,
            table_name: "reports".into(),
            record_id: None,
            details: Some(serde_json::json!({ "report": "financial_summary" })),
        })
        .await
        .unwrap();

    assert!(entry.id > 0);
    assert_eq!(entry.user_id, None);
    assert_eq!(entry.details.unwrap()["report"], "financial_summary");
}

#[tokio::test]
async fn failed_audit_write_rolls_back_the_mutation() {
    let (_dir, db, policy_id, _) = setup().await;

    let count = |table: &'static str| {
        let db = db.clone();
        async move {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let mut conn = db.pool().acquire().await.unwrap();
            let rows: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await.unwrap();
            rows
        }
    };
    let customers_before = count("customers").await;
    let payments_before = count("payments").await;

    {
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER audit_logs_read_only BEFORE INSERT ON audit_logs \
             BEGIN SELECT RAISE(ABORT, 'audit trail is read-only'); END",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
    }

    let err = db
        .customers()
        .create(
            &manager(),
            CreateCustomer {
                first_name: "Lee".into(),
                last_name: "Chen".into(),
                email: "lee@example.com".into(),
                phone: None,
                address: None,
                date_of_birth: None,
                national_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::AuditWriteFailure(_)));
    assert_eq!(count("customers").await, customers_before);

    let err = db
        .policies()
        .record_payment(&manager(), policy_id, dec!(15), date(2024, 3, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimdeskError::AuditWriteFailure(_)));
    assert_eq!(count("payments").await, payments_before);
}
