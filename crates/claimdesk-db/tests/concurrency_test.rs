//! Reads that write (national id disclosure, status repair) running
//! alongside creations must never make a creation fail.

use chrono::{NaiveDate, Utc};
use claimdesk_auth::AuthConfig;
use claimdesk_core::models::claim::{ClaimStatus, CreateClaim};
use claimdesk_core::models::customer::CreateCustomer;
use claimdesk_core::models::policy::{CreatePolicy, PolicyType};
use claimdesk_core::models::user::{Actor, Role};
use claimdesk_core::repository::{ClaimRepository, CustomerRepository, PolicyRepository};
use claimdesk_db::{Database, DbConfig};
use rust_decimal_macros::dec;

const LEGACY_CLAIMS: usize = 40;
const CREATIONS: usize = 120;
const READERS: usize = 4;
const READS_PER_TASK: usize = 120;

/// Helper: a customer with a stored national id, one policy, and a batch
/// of imported claims that have no status.
async fn setup() -> (tempfile::TempDir, Database, i64, i64) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(
        &DbConfig {
            path: dir.path().join("concurrency.db"),
            max_connections: 6,
            ..DbConfig::default()
        },
        AuthConfig::new([21u8; 32]),
    )
    .await
    .unwrap();

    let customer = db
        .customers()
        .create(
            &manager(),
            CreateCustomer {
                first_name: "Noor".into(),
                last_name: "Haddad".into(),
                email: "noor@example.com".into(),
                phone: None,
                address: None,
                date_of_birth: None,
                national_id: Some("AB 12 34 56 C".into()),
            },
        )
        .await
        .unwrap();
    let policy = db
        .policies()
        .create(&manager(), policy_input(customer.id, "LIFE-0"))
        .await
        .unwrap();

    let mut conn = db.pool().acquire().await.unwrap();
    for n in 0..LEGACY_CLAIMS {
        sqlx::query(
            "INSERT INTO claims (policy_id, claim_number, claim_date, incident_date, \
             description, claim_amount, status, created_at, updated_at) \
             VALUES (?, ?, '2023-05-02', '2023-05-01', 'Imported', '10.00', NULL, ?, ?)",
        )
        .bind(policy.id)
        .bind(format!("IMP-{n:03}"))
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .unwrap();
    }
    drop(conn);

    (dir, db, customer.id, policy.id)
}

fn manager() -> Actor {
    Actor::user(2, Role::ClaimsManager)
}

fn policy_input(customer_id: i64, number: &str) -> CreatePolicy {
    CreatePolicy {
        customer_id,
        policy_type: PolicyType::Life,
        policy_number: number.into(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2034, 1, 1).unwrap(),
        premium: dec!(55.00),
        coverage_limit: dec!(100000.00),
        status: None,
        payment_schedule: None,
        beneficiary_info: None,
        exclusions: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writing_reads_do_not_break_creations() {
    let (_dir, db, customer_id, policy_id) = setup().await;

    let mut readers = Vec::new();
    for r in 0..READERS {
        let db = db.clone();
        readers.push(tokio::spawn(async move {
            let actor = Actor::user(100 + r as i64, Role::ClaimsManager);
            let mut failures = Vec::new();
            for _ in 0..READS_PER_TASK {
                if let Err(e) = db.customers().get(&actor, customer_id).await {
                    failures.push(e.to_string());
                }
                if let Err(e) = db.claims().list_for_policy(&actor, policy_id).await {
                    failures.push(e.to_string());
                }
            }
            failures
        }));
    }

    let mut creation_failures = Vec::new();
    for n in 0..CREATIONS {
        let result = if n % 2 == 0 {
            db.policies()
                .create(&manager(), policy_input(customer_id, &format!("LIFE-{}", n + 1)))
                .await
                .map(|_| ())
        } else {
            db.claims()
                .create(
                    &Actor::user(3, Role::Adjuster),
                    CreateClaim {
                        policy_id,
                        claim_date: NaiveDate::from_ymd_opt(2024, 8, 2).unwrap(),
                        incident_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
                        incident_time: None,
                        incident_location: None,
                        description: "Hospital stay".into(),
                        claim_amount: dec!(900.00),
                        status: None,
                    },
                )
                .await
                .map(|_| ())
        };
        if let Err(e) = result {
            creation_failures.push(e.to_string());
        }
    }

    let mut read_failures = Vec::new();
    for reader in readers {
        read_failures.extend(reader.await.unwrap());
    }

    assert!(creation_failures.is_empty(), "creations failed: {creation_failures:?}");
    assert!(read_failures.is_empty(), "reads failed: {read_failures:?}");

    let claims = db.claims().list_for_policy(&manager(), policy_id).await.unwrap();
    assert_eq!(claims.len(), LEGACY_CLAIMS + CREATIONS / 2);
    assert!(claims.iter().all(|c| c.status == ClaimStatus::Pending));
}
