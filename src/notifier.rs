//! Push notification dispatch and due-date reminders
//!
//! Notifications are fire-and-forget: delivery failures are logged, never
//! propagated into domain results. The gateway speaks the Expo push message
//! format. A background loop scans for installments coming due and reminds
//! the borrower, in the style of the mobile app's scheduled reminders.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::profile::ProfileDirectory;

/// Days before the due date at which the borrower is reminded.
const REMINDER_LEAD_DAYS: u64 = 2;

/// Expo-format push message
#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    sound: &'a str,
    title: &'a str,
    body: &'a str,
    data: serde_json::Value,
}

/// Push notification dispatcher
pub struct Notifier {
    http: reqwest::Client,
    gateway_url: String,
    directory: ProfileDirectory,
}

impl Notifier {
    /// Create a new notifier
    pub fn new(gateway_url: String, directory: ProfileDirectory) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url,
            directory,
        }
    }

    /// Send a push notification to a user. Best-effort: users without a
    /// registered push token are silently skipped, gateway failures are
    /// logged.
    pub async fn notify(&self, user_id: Uuid, title: &str, body: &str, data: serde_json::Value) {
        let token = match self.directory.get_profile(user_id).await {
            Ok(Some(profile)) => profile.push_token,
            Ok(None) => {
                tracing::debug!(%user_id, "Notification skipped: unknown user");
                return;
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Notification skipped: profile lookup failed");
                return;
            }
        };

        let Some(token) = token else {
            tracing::debug!(%user_id, "Notification skipped: no push token registered");
            return;
        };

        let message = PushMessage {
            to: &token,
            sound: "default",
            title,
            body,
            data,
        };

        match self.http.post(&self.gateway_url).json(&message).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(%user_id, title, "Push notification sent");
            }
            Ok(response) => {
                tracing::warn!(%user_id, status = %response.status(), "Push gateway rejected notification");
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Failed to reach push gateway");
            }
        }
    }
}

/// Format an amount in cents as the user-facing currency string.
pub fn format_soles(amount_cents: i64) -> String {
    format!("S/ {}.{:02}", amount_cents / 100, amount_cents % 100)
}

#[derive(Debug, sqlx::FromRow)]
struct DueReminder {
    borrower_id: Uuid,
    installment_id: Uuid,
    sequence_number: i32,
    split_seq: i32,
    amount_cents: i64,
    lender_name: String,
}

/// Background loop reminding borrowers of installments due in two days.
/// Runs until the process shuts down.
pub async fn reminder_loop(db_pool: PgPool, notifier: Arc<Notifier>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(60)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let target = Utc::now().date_naive() + Days::new(REMINDER_LEAD_DAYS);
        match send_due_reminders(&db_pool, &notifier, target).await {
            Ok(0) => {}
            Ok(sent) => tracing::info!(sent, %target, "Sent due-date reminders"),
            Err(e) => tracing::error!(error = %e, "Due-date reminder scan failed"),
        }
    }
}

async fn send_due_reminders(
    db_pool: &PgPool,
    notifier: &Notifier,
    due_date: NaiveDate,
) -> anyhow::Result<usize> {
    let reminders = sqlx::query_as::<_, DueReminder>(
        r#"
        SELECT
            l.borrower_id,
            i.id AS installment_id,
            i.sequence_number,
            i.split_seq,
            i.amount_cents,
            COALESCE(p.name, 'tu prestamista') AS lender_name
        FROM installments i
        JOIN loans l ON l.id = i.loan_id
        LEFT JOIN profiles p ON p.user_id = l.lender_id
        WHERE i.status = 'pending' AND i.due_date = $1
        "#,
    )
    .bind(due_date)
    .fetch_all(db_pool)
    .await?;

    let count = reminders.len();

    for reminder in reminders {
        let number = if reminder.split_seq == 0 {
            reminder.sequence_number.to_string()
        } else {
            format!("{}.{}", reminder.sequence_number, reminder.split_seq)
        };
        let body = format!(
            "Tu cuota #{} de {} a {} vence en {} días",
            number,
            format_soles(reminder.amount_cents),
            reminder.lender_name,
            REMINDER_LEAD_DAYS
        );

        notifier
            .notify(
                reminder.borrower_id,
                "Recordatorio de Pago",
                &body,
                serde_json::json!({
                    "type": "installment_due",
                    "installment_id": reminder.installment_id,
                }),
            )
            .await;
    }

    Ok(count)
}
