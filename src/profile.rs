//! Identity directory - read-only access to registered user profiles
//!
//! Profiles are written by the out-of-scope auth/onboarding flow; this
//! server only resolves them. Loans can only be created against phone
//! numbers that resolve to a registered profile.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::phone::normalize_phone;

/// Registered user profile
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct Profile {
    pub user_id: Uuid,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub push_token: Option<String>,
}

/// Result of the pre-submit contact lookup performed by the create-loan
/// screen
#[derive(Debug, Serialize)]
pub struct ContactLookup {
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
}

/// Directory of registered identities, keyed by normalized phone
#[derive(Clone)]
pub struct ProfileDirectory {
    db_pool: PgPool,
}

impl ProfileDirectory {
    /// Create a new directory instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Resolve a registered profile by its normalized phone number.
    ///
    /// Matches the stored column directly first. Legacy rows may hold
    /// unnormalized values, so when the direct match misses we scan and
    /// compare normalized forms.
    pub async fn resolve_by_phone(&self, normalized_phone: &str) -> ApiResult<Option<Profile>> {
        if normalized_phone.is_empty() {
            return Ok(None);
        }

        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, name, surname, phone, email, push_token FROM profiles WHERE phone = $1",
        )
        .bind(normalized_phone)
        .fetch_optional(&self.db_pool)
        .await?;

        if profile.is_some() {
            return Ok(profile);
        }

        let all = sqlx::query_as::<_, Profile>(
            "SELECT user_id, name, surname, phone, email, push_token FROM profiles",
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(all
            .into_iter()
            .find(|p| normalize_phone(&p.phone) == normalized_phone))
    }

    /// Fetch a profile by user id.
    pub async fn get_profile(&self, user_id: Uuid) -> ApiResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, name, surname, phone, email, push_token FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(profile)
    }

    /// Pre-submit check: does this contact have an account?
    pub async fn lookup_contact(&self, raw_phone: &str) -> ApiResult<ContactLookup> {
        let normalized = normalize_phone(raw_phone);
        if normalized.is_empty() {
            return Ok(ContactLookup {
                registered: false,
                user_id: None,
                name: None,
                surname: None,
            });
        }

        match self.resolve_by_phone(&normalized).await? {
            Some(profile) => Ok(ContactLookup {
                registered: true,
                user_id: Some(profile.user_id),
                name: Some(profile.name),
                surname: Some(profile.surname),
            }),
            None => Ok(ContactLookup {
                registered: false,
                user_id: None,
                name: None,
                surname: None,
            }),
        }
    }
}
