//! Loan lifecycle integration tests
//!
//! These run against a real PostgreSQL database; set TEST_DATABASE_URL and
//! remove the ignore markers to run them.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use prestamigo_server::capital::CapitalTransactionKind;
use prestamigo_server::capital_service::CapitalService;
use prestamigo_server::error::ApiError;
use prestamigo_server::loan::{
    BorrowerContact, CreateLoanRequest, DeleteLoanRequest, InstallmentStatus, ListLoansQuery,
    MarkPaidRequest, PaymentFrequency, UpdateLoanRequest,
};
use prestamigo_server::loan_service::LoanService;
use prestamigo_server::notifier::Notifier;
use prestamigo_server::profile::ProfileDirectory;

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

fn build_loan_service(pool: &PgPool) -> LoanService {
    let directory = ProfileDirectory::new(pool.clone());
    // Unreachable gateway: notification failures are logged, not propagated
    let notifier = Arc::new(Notifier::new(
        "http://127.0.0.1:1/push".to_string(),
        directory.clone(),
    ));
    LoanService::new(pool.clone(), directory, notifier)
}

fn create_request(
    lender_id: Uuid,
    borrower_phone: &str,
    principal_cents: i64,
) -> CreateLoanRequest {
    CreateLoanRequest {
        lender_id,
        borrower: BorrowerContact {
            name: "Ana".to_string(),
            surname: "Paredes".to_string(),
            phone: borrower_phone.to_string(),
            email: None,
        },
        principal_cents,
        interest_rate_bps: 1000, // 10%
        installment_count: 4,
        payment_frequency: PaymentFrequency::Monthly,
        start_date: Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()),
    }
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_create_loan_generates_schedule_and_debits_capital() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    let (_borrower, borrower_phone) = seed_profile(&pool, "Ana").await;

    capital
        .credit(lender, 200_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    // 1000.00 at 10% over 4 monthly installments
    let loan = loan_service
        .create_loan(create_request(lender, &borrower_phone, 100_000))
        .await
        .unwrap();

    assert_eq!(loan.total_amount_cents, 110_000);
    assert_eq!(loan.installment_amount_cents, 27_500);

    let detail = loan_service.get_detail(loan.id).await.unwrap();
    assert_eq!(detail.installments.len(), 4);
    let dues: Vec<NaiveDate> = detail.installments.iter().map(|c| c.due_date).collect();
    assert_eq!(
        dues,
        vec![
            NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 15).unwrap(),
        ]
    );
    assert!(detail
        .installments
        .iter()
        .all(|c| c.status == InstallmentStatus::Pending && c.amount_cents == 27_500));

    // Principal debited from the lender's capital
    assert_eq!(capital.get_balance(lender).await.unwrap(), 100_000);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_create_loan_fails_without_sufficient_capital() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    let (_borrower, borrower_phone) = seed_profile(&pool, "Ana").await;

    capital
        .credit(lender, 50_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let err = loan_service
        .create_loan(create_request(lender, &borrower_phone, 100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InsufficientCapital(_)));

    // Nothing was created and the balance is untouched
    let loans = loan_service
        .list_loans(ListLoansQuery {
            lender_id: Some(lender),
            borrower_id: None,
        })
        .await
        .unwrap();
    assert!(loans.is_empty());
    assert_eq!(capital.get_balance(lender).await.unwrap(), 50_000);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_create_loan_rejects_unregistered_borrower() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    capital
        .credit(lender, 200_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let err = loan_service
        .create_loan(create_request(lender, "+51911111111", 100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BorrowerNotRegistered(_)));

    let err = loan_service
        .create_loan(create_request(lender, "not a phone", 100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidPhone(_)));
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_edit_loan_is_lender_only_and_limited() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    let (borrower, borrower_phone) = seed_profile(&pool, "Ana").await;
    capital
        .credit(lender, 200_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let loan = loan_service
        .create_loan(create_request(lender, &borrower_phone, 100_000))
        .await
        .unwrap();

    // Borrower cannot edit
    let err = loan_service
        .edit_loan(
            loan.id,
            UpdateLoanRequest {
                requester_id: borrower,
                borrower_name: Some("Maria".to_string()),
                borrower_surname: None,
                borrower_phone: None,
                borrower_email: None,
                interest_rate_bps: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Lender edits the snapshot and the rate; totals stay fixed
    let updated = loan_service
        .edit_loan(
            loan.id,
            UpdateLoanRequest {
                requester_id: lender,
                borrower_name: Some("Maria".to_string()),
                borrower_surname: None,
                borrower_phone: None,
                borrower_email: None,
                interest_rate_bps: Some(500),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.borrower_name, "Maria");
    assert_eq!(updated.interest_rate_bps, 500);
    assert_eq!(updated.total_amount_cents, loan.total_amount_cents);
    assert_eq!(updated.principal_cents, loan.principal_cents);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_delete_loan_blocked_by_paid_installment() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    let (borrower, borrower_phone) = seed_profile(&pool, "Ana").await;
    capital
        .credit(lender, 200_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let loan = loan_service
        .create_loan(create_request(lender, &borrower_phone, 100_000))
        .await
        .unwrap();
    let detail = loan_service.get_detail(loan.id).await.unwrap();
    let first = detail.installments[0].id;

    // Only the lender may delete
    let err = loan_service
        .delete_loan(loan.id, DeleteLoanRequest { requester_id: borrower })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    loan_service
        .mark_paid(
            first,
            MarkPaidRequest {
                requester_id: lender,
                proof_url: None,
            },
        )
        .await
        .unwrap();

    let err = loan_service
        .delete_loan(loan.id, DeleteLoanRequest { requester_id: lender })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::HasPaidInstallments(_)));
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_delete_untouched_loan_cascades() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    let (_borrower, borrower_phone) = seed_profile(&pool, "Ana").await;
    capital
        .credit(lender, 200_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let loan = loan_service
        .create_loan(create_request(lender, &borrower_phone, 100_000))
        .await
        .unwrap();

    loan_service
        .delete_loan(loan.id, DeleteLoanRequest { requester_id: lender })
        .await
        .unwrap();

    let err = loan_service.get_detail(loan.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let (remaining,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM installments WHERE loan_id = $1")
            .bind(loan.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore] // Requires database setup
async fn test_mark_paid_credits_lender_and_completes_loan() {
    let pool = setup_test_db().await;
    let loan_service = build_loan_service(&pool);
    let capital = CapitalService::new(pool.clone());

    let (lender, _) = seed_profile(&pool, "Luis").await;
    let (_borrower, borrower_phone) = seed_profile(&pool, "Ana").await;
    capital
        .credit(lender, 200_000, CapitalTransactionKind::Inflow, "Deposit")
        .await
        .unwrap();

    let mut request = create_request(lender, &borrower_phone, 100_000);
    request.installment_count = 2;
    let loan = loan_service.create_loan(request).await.unwrap();
    let balance_after_funding = capital.get_balance(lender).await.unwrap();

    let detail = loan_service.get_detail(loan.id).await.unwrap();
    for cuota in &detail.installments {
        loan_service
            .mark_paid(
                cuota.id,
                MarkPaidRequest {
                    requester_id: lender,
                    proof_url: None,
                },
            )
            .await
            .unwrap();
    }

    // Each paid installment credited the lender
    assert_eq!(
        capital.get_balance(lender).await.unwrap(),
        balance_after_funding + loan.installment_amount_cents * 2
    );

    // All installments paid: the loan completes
    let detail = loan_service.get_detail(loan.id).await.unwrap();
    assert_eq!(
        detail.loan.status,
        prestamigo_server::loan::LoanStatus::Completed
    );

    // Marking an already-paid installment again is rejected
    let err = loan_service
        .mark_paid(
            detail.installments[0].id,
            MarkPaidRequest {
                requester_id: lender,
                proof_url: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
}
