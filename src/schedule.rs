//! Installment schedule generation
//!
//! Pure date and amount arithmetic: given loan terms, produce the ordered
//! sequence of installment rows for the caller to persist. No I/O.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::loan::PaymentFrequency;

/// One generated installment, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInstallment {
    pub sequence_number: i32,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
}

/// Total owed for a loan: principal plus simple interest, in cents.
///
/// Rates are basis points; the interest component is rounded half-up to a
/// whole cent.
pub fn total_amount_cents(principal_cents: i64, interest_rate_bps: i32) -> i64 {
    principal_cents + div_round_half_up(principal_cents * interest_rate_bps as i64, 10_000)
}

/// Flat per-installment amount: total divided by count, rounded half-up.
///
/// Every installment carries the same amount. The sum over the schedule may
/// differ from the loan total by a sub-cent-per-installment rounding margin.
pub fn installment_amount_cents(total_cents: i64, count: i32) -> i64 {
    div_round_half_up(total_cents, count as i64)
}

/// Generate the due-date/amount sequence for a loan.
///
/// The cursor starts at `start_date` and is advanced once per installment,
/// so the first installment is due one step after the start, never on it.
pub fn generate_schedule(
    count: i32,
    amount_cents: i64,
    frequency: PaymentFrequency,
    start_date: NaiveDate,
) -> Vec<ScheduledInstallment> {
    let mut cursor = start_date;
    let mut installments = Vec::with_capacity(count.max(0) as usize);

    for i in 1..=count {
        cursor = next_due_date(cursor, frequency);
        installments.push(ScheduledInstallment {
            sequence_number: i,
            amount_cents,
            due_date: cursor,
        });
    }

    installments
}

/// Advance the schedule cursor by one frequency step.
fn next_due_date(cursor: NaiveDate, frequency: PaymentFrequency) -> NaiveDate {
    match frequency {
        PaymentFrequency::Daily => cursor + Days::new(1),
        PaymentFrequency::Weekly => cursor + Days::new(7),
        PaymentFrequency::Monthly => cursor + Months::new(1),
        PaymentFrequency::Weekend => {
            // Next Saturday strictly after the cursor
            let mut next = cursor + Days::new(1);
            while next.weekday() != Weekday::Sat {
                next = next + Days::new(1);
            }
            next
        }
    }
}

/// Integer division rounding half away from zero (amounts are non-negative).
fn div_round_half_up(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator / 2) / denominator
}
