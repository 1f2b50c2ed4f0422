//! Loan and installment models for the PrestAmigo backend

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

/// How often installments fall due
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentFrequency {
    Daily,
    Weekly,
    Weekend, // every Saturday
    Monthly,
}

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
}

/// Installment status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "installment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Pending,
    Paid,
}

/// Payment-proof review status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "proof_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    None,
    InReview,
    Approved,
    Rejected,
}

/// Loan model
///
/// Borrower contact fields are a snapshot taken at creation time; the
/// resolved `borrower_id` is the live identity reference. Editing one never
/// touches the other.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Loan {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub borrower_id: Uuid,
    pub borrower_name: String,
    pub borrower_surname: String,
    pub borrower_phone: String,
    pub borrower_email: Option<String>,
    pub principal_cents: i64,
    pub interest_rate_bps: i32, // basis points
    pub installment_count: i32,
    pub payment_frequency: PaymentFrequency,
    pub installment_amount_cents: i64,
    pub total_amount_cents: i64, // fixed at creation, never recomputed
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Installment ("cuota") model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Installment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub sequence_number: i32,
    /// 0 for scheduled installments; split children take 1, 2, ... so the
    /// ordering key is the (sequence_number, split_seq) pair.
    pub split_seq: i32,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub proof_url: Option<String>,
    pub proof_status: ProofStatus,
    pub proof_uploaded_at: Option<DateTime<Utc>>,
    pub proof_reviewed_at: Option<DateTime<Utc>>,
    pub parent_installment_id: Option<Uuid>,
    pub is_partial_payment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Installment {
    /// Display form of the ordering key: "3" for scheduled installments,
    /// "3.1", "3.2", ... for split children.
    pub fn display_number(&self) -> String {
        if self.split_seq == 0 {
            self.sequence_number.to_string()
        } else {
            format!("{}.{}", self.sequence_number, self.split_seq)
        }
    }
}

/// Borrower contact details supplied when creating a loan
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BorrowerContact {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub surname: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
}

/// Request to create a new loan
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanRequest {
    pub lender_id: Uuid,
    #[validate]
    pub borrower: BorrowerContact,
    #[validate(range(min = 1))]
    pub principal_cents: i64,
    #[validate(range(min = 0))]
    pub interest_rate_bps: i32,
    #[validate(range(min = 1, max = 365))]
    pub installment_count: i32,
    pub payment_frequency: PaymentFrequency,
    /// Schedule anchor; defaults to today when omitted.
    pub start_date: Option<NaiveDate>,
}

/// Patch for editing a loan. Principal, installment count and frequency are
/// deliberately unrepresentable here: they are immutable after creation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLoanRequest {
    pub requester_id: Uuid,
    pub borrower_name: Option<String>,
    pub borrower_surname: Option<String>,
    pub borrower_phone: Option<String>,
    #[validate(email)]
    pub borrower_email: Option<String>,
    #[validate(range(min = 0))]
    pub interest_rate_bps: Option<i32>,
}

impl UpdateLoanRequest {
    /// True when the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.borrower_name.is_none()
            && self.borrower_surname.is_none()
            && self.borrower_phone.is_none()
            && self.borrower_email.is_none()
            && self.interest_rate_bps.is_none()
    }
}

/// Query for listing loans; exactly one side must be given
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    pub lender_id: Option<Uuid>,
    pub borrower_id: Option<Uuid>,
}

/// Request to split a pending installment into a partial payment and a
/// remainder child
#[derive(Debug, Deserialize, Validate)]
pub struct SplitInstallmentRequest {
    pub requester_id: Uuid,
    #[validate(range(min = 1))]
    pub partial_amount_cents: i64,
}

/// Result of a split: the shrunk parent and the newly created child
#[derive(Debug, Serialize)]
pub struct SplitInstallmentResponse {
    pub parent: Installment,
    pub child: Installment,
}

/// Request for the lender's direct mark-as-paid bypass (no proof review)
#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub requester_id: Uuid,
    pub proof_url: Option<String>,
}

/// Request to delete a loan
#[derive(Debug, Deserialize)]
pub struct DeleteLoanRequest {
    pub requester_id: Uuid,
}

/// Loan with its installments and repayment aggregates, as shown in the
/// lender's and borrower's list screens
#[derive(Debug, Serialize)]
pub struct LoanSummary {
    #[serde(flatten)]
    pub loan: Loan,
    pub installments: Vec<Installment>,
    pub paid_installments: i64,
    pub paid_amount_cents: i64,
    pub outstanding_amount_cents: i64,
    /// Lender contact, populated on borrower-side listings only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lender: Option<LenderInfo>,
}

/// Lender contact attached to borrower-side loan listings
#[derive(Debug, Serialize, Clone)]
pub struct LenderInfo {
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: Option<String>,
}
