//! Partial-payment split and proof-workflow integration tests
//!
//! These run against a real PostgreSQL database; set TEST_DATABASE_URL and
//! remove the ignore markers to run them. Review tests seed the in_review
//! state directly so no object store is needed.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use prestamigo_server::capital::CapitalTransactionKind;
use prestamigo_server::capital_service::CapitalService;
use prestamigo_server::error::ApiError;
use prestamigo_server::loan::{
    BorrowerContact, CreateLoanRequest, InstallmentStatus, LoanStatus, PaymentFrequency,
    ProofStatus, SplitInstallmentRequest,
};
use prestamigo_server::loan_service::LoanService;
use prestamigo_server::notifier::Notifier;
use prestamigo_server::profile::ProfileDirectory;
use prestamigo_server::proof_service::{ProofService, ReviewProofRequest, SubmitProofRequest};
use prestamigo_server::storage::StorageClient;

/// Helper to create a test database pool with migrations applied
async fn setup_test_db() -> PgPool {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/prestamigo_test".to_string());

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Register a profile with a unique Peruvian mobile number
async fn seed_profile(pool: &PgPool, name: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let digits = u32::from_le_bytes(user_id.as_bytes()[..4].try_into().unwrap()) % 100_000_000;
    let phone = format!("+519{:08}", digits);

    sqlx::query(
        "INSERT INTO profiles (user_id, name, surname, phone) VALUES ($1, $2, 'Test', $3)",
    )
    .bind(user_id)
    .bind(name)
    .bind(&phone)
    .execute(pool)
    .await
    .expect("Failed to seed profile");

    (user_id, phone)
}

fn test_notifier(pool: &PgPool) -> Arc<Notifier> {
    // Unreachable gateway: notification failures are logged, not propagated
    Arc::new(Notifier::new(
        "http://127.0.0.1:1/push".to_string(),
        ProfileDirectory::new(pool.clone()),
    ))
}

fn build_loan_service(pool: &PgPool) -> LoanService {
    LoanService::new(
        pool.clone(),
        ProfileDirectory::new(pool.clone()),
        test_notifier(pool),
    )
}

fn build_proof_service(pool: &PgPool) -> ProofService {
    let storage = StorageClient::new(
        "http://127.0.0.1:1/storage/v1".to_string(),
        "test-key".to_string(),
        "comprobantes".to_string(),
    );
    ProofService::new(pool.clone(), storage, test_notifier(pool))
}

struct Fixture {
    lender: Uuid,
    borrower: Uuid,
    loan_id: Uuid,
    installments: Vec<Uuid>,
    installment_amount_cents: i64,
}

/// Funded two-installment loan: principal 200.00, no interest, so each
/// installment is 100.00.
async fn seed_loan(pool: &PgPool) -> Fixture {
    let loan_service = build_loan_service(pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(pool, "Luis").await;
    let (borrower, borrower_phone) = seed_profile(pool, "Ana").await;

    capital
        .credit(lender, 100_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let loan = loan_service
        .create_loan(CreateLoanRequest {
            lender_id: lender,
            borrower: BorrowerContact {
                name: "Ana".to_string(),
                surname: "Paredes".to_string(),
                phone: borrower_phone,
                email: None,
            },
            principal_cents: 20_000,
            interest_rate_bps: 0,
            installment_count: 2,
            payment_frequency: PaymentFrequency::Monthly,
            start_date: Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()),
        })
        .await
        .unwrap();

    let detail = loan_service.get_detail(loan.id).await.unwrap();
    Fixture {
        lender,
        borrower,
        loan_id: loan.id,
        installments: detail.installments.iter().map(|c| c.id).collect(),
        installment_amount_cents: loan.installment_amount_cents,
    }
}

/// Put an installment into the in_review state the way a submitted proof
/// leaves it.
async fn seed_proof_in_review(pool: &PgPool, installment_id: Uuid) {
    sqlx::query(
        r#"
        UPDATE installments SET
            proof_url = 'http://127.0.0.1:1/storage/v1/object/public/comprobantes/test.jpg',
            proof_status = 'in_review',
            proof_uploaded_at = $1,
            updated_at = $1
        WHERE id = $2
        "#,
    )
    .bind(Utc::now())
    .bind(installment_id)
    .execute(pool)
    .await
    .expect("Failed to seed proof state");
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_split_conserves_total_and_keeps_due_date() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let loan_service = build_loan_service(&pool);

    let target = fixture.installments[0];
    let before = loan_service.get_installment(target).await.unwrap();

    // 100.00 split at 30.00
    let split = loan_service
        .split_installment(
            target,
            SplitInstallmentRequest {
                requester_id: fixture.lender,
                partial_amount_cents: 3_000,
            },
        )
        .await
        .unwrap();

    assert_eq!(split.parent.id, target);
    assert_eq!(split.parent.amount_cents, 3_000);
    assert_eq!(split.child.amount_cents, 7_000);
    assert_eq!(split.child.due_date, before.due_date);
    assert_eq!(split.child.sequence_number, before.sequence_number);
    assert_eq!(split.child.split_seq, 1);
    assert_eq!(split.child.parent_installment_id, Some(target));
    assert!(split.child.is_partial_payment);
    assert_eq!(split.child.status, InstallmentStatus::Pending);
    assert_eq!(split.child.display_number(), "1.1");

    // Splitting the parent again takes the next slot
    let again = loan_service
        .split_installment(
            target,
            SplitInstallmentRequest {
                requester_id: fixture.lender,
                partial_amount_cents: 1_000,
            },
        )
        .await
        .unwrap();
    assert_eq!(again.parent.amount_cents, 1_000);
    assert_eq!(again.child.amount_cents, 2_000);
    assert_eq!(again.child.split_seq, 2);

    // Total owed across the loan is unchanged
    let detail = loan_service.get_detail(fixture.loan_id).await.unwrap();
    let owed: i64 = detail.installments.iter().map(|c| c.amount_cents).sum();
    assert_eq!(owed, fixture.installment_amount_cents * 2);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_split_rejects_tiny_remainder() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let loan_service = build_loan_service(&pool);

    let target = fixture.installments[0];

    // 100.00 split at 99.95 would leave a 0.05 child
    let err = loan_service
        .split_installment(
            target,
            SplitInstallmentRequest {
                requester_id: fixture.lender,
                partial_amount_cents: 9_995,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::RemainderTooSmall(_)));

    // Out-of-range partials are rejected outright
    for partial in [0, -1, 10_000, 10_001] {
        let err = loan_service
            .split_installment(
                target,
                SplitInstallmentRequest {
                    requester_id: fixture.lender,
                    partial_amount_cents: partial,
                },
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApiError::InvalidAmount(_) | ApiError::ValidationError(_)),
            "partial {} should be rejected",
            partial
        );
    }

    // The installment is untouched
    let after = loan_service.get_installment(target).await.unwrap();
    assert_eq!(after.amount_cents, 10_000);
    let detail = loan_service.get_detail(fixture.loan_id).await.unwrap();
    assert_eq!(detail.installments.len(), 2);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_split_is_lender_only_and_pending_only() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let loan_service = build_loan_service(&pool);

    let target = fixture.installments[0];

    let err = loan_service
        .split_installment(
            target,
            SplitInstallmentRequest {
                requester_id: fixture.borrower,
                partial_amount_cents: 3_000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    sqlx::query("UPDATE installments SET status = 'paid', paid_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(target)
        .execute(&pool)
        .await
        .unwrap();

    let err = loan_service
        .split_installment(
            target,
            SplitInstallmentRequest {
                requester_id: fixture.lender,
                partial_amount_cents: 3_000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_submit_proof_checks_run_before_upload() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let proof_service = build_proof_service(&pool);

    let target = fixture.installments[0];
    let image = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        b"fake image bytes",
    );

    // Only the borrower may submit
    let err = proof_service
        .submit_proof(
            target,
            SubmitProofRequest {
                requester_id: fixture.lender,
                image_base64: image.clone(),
                extension: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // A proof already under review blocks resubmission
    seed_proof_in_review(&pool, target).await;
    let err = proof_service
        .submit_proof(
            target,
            SubmitProofRequest {
                requester_id: fixture.borrower,
                image_base64: image.clone(),
                extension: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));

    // Garbage payloads never reach the store either
    let err = proof_service
        .submit_proof(
            target,
            SubmitProofRequest {
                requester_id: fixture.borrower,
                image_base64: "not base64 at all!!!".to_string(),
                extension: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_approve_pays_installment_and_credits_lender_once() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let proof_service = build_proof_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let target = fixture.installments[0];
    seed_proof_in_review(&pool, target).await;

    let balance_before = capital.get_balance(fixture.lender).await.unwrap();

    let approved = proof_service
        .approve(
            target,
            ReviewProofRequest {
                requester_id: fixture.lender,
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.proof_status, ProofStatus::Approved);
    assert_eq!(approved.status, InstallmentStatus::Paid);
    assert!(approved.paid_at.is_some());
    assert!(approved.proof_reviewed_at.is_some());

    assert_eq!(
        capital.get_balance(fixture.lender).await.unwrap(),
        balance_before + fixture.installment_amount_cents
    );

    // Exactly one repayment-collection credit was recorded
    let history = capital.history(fixture.lender, 50).await.unwrap();
    let collections = history
        .iter()
        .filter(|t| t.kind == CapitalTransactionKind::RepaymentCollection)
        .count();
    assert_eq!(collections, 1);

    // Approving again is rejected and the balance stays put
    let err = proof_service
        .approve(
            target,
            ReviewProofRequest {
                requester_id: fixture.lender,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
    assert_eq!(
        capital.get_balance(fixture.lender).await.unwrap(),
        balance_before + fixture.installment_amount_cents
    );
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_approving_last_installment_completes_loan() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let proof_service = build_proof_service(&pool);
    let loan_service = build_loan_service(&pool);

    for id in &fixture.installments {
        seed_proof_in_review(&pool, *id).await;
        proof_service
            .approve(
                *id,
                ReviewProofRequest {
                    requester_id: fixture.lender,
                },
            )
            .await
            .unwrap();
    }

    let detail = loan_service.get_detail(fixture.loan_id).await.unwrap();
    assert_eq!(detail.loan.status, LoanStatus::Completed);
    assert_eq!(detail.outstanding_amount_cents, 0);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_reject_keeps_installment_pending() {
    let pool = setup_test_db().await;
    let fixture = seed_loan(&pool).await;
    let proof_service = build_proof_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let target = fixture.installments[0];
    seed_proof_in_review(&pool, target).await;

    let balance_before = capital.get_balance(fixture.lender).await.unwrap();

    // Only the lender reviews
    let err = proof_service
        .reject(
            target,
            ReviewProofRequest {
                requester_id: fixture.borrower,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let rejected = proof_service
        .reject(
            target,
            ReviewProofRequest {
                requester_id: fixture.lender,
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.proof_status, ProofStatus::Rejected);
    assert_eq!(rejected.status, InstallmentStatus::Pending);
    assert!(rejected.paid_at.is_none());

    // No capital moved
    assert_eq!(
        capital.get_balance(fixture.lender).await.unwrap(),
        balance_before
    );
}
