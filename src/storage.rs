//! Object storage client for payment-proof images
//!
//! Thin reqwest client against a Supabase-style storage REST API. Uploads
//! return a public URL that is stored on the installment row; deletes are
//! best-effort (a dangling image is preferable to a failed review action).

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Storage client for the proof-image bucket
#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl StorageClient {
    /// Create a new storage client
    pub fn new(base_url: String, service_key: String, bucket: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            bucket,
        }
    }

    /// Path for a proof image, unique per upload.
    pub fn proof_path(installment_id: Uuid, extension: &str) -> String {
        format!(
            "installments/proof_{}_{}.{}",
            installment_id,
            Utc::now().timestamp_millis(),
            extension
        )
    }

    /// Upload an object and return its public URL.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ApiResult<String> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type.to_string())
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::StorageError(format!(
                "upload failed with status {}: {}",
                status, body
            )));
        }

        Ok(self.public_url(path))
    }

    /// Delete an object given its public URL. Failures are logged, not
    /// propagated.
    pub async fn delete(&self, public_url: &str) {
        let Some(path) = self.path_from_public_url(public_url) else {
            tracing::warn!(url = %public_url, "Cannot derive storage path from proof URL");
            return;
        };

        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, path);
        match self
            .http
            .delete(&url)
            .bearer_auth(&self.service_key)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(status = %response.status(), path = %path, "Failed to delete proof image");
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path, "Failed to delete proof image");
            }
        }
    }

    /// Public URL for an object path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, path)
    }

    /// Extract the bucket-relative path back out of a public URL.
    fn path_from_public_url(&self, public_url: &str) -> Option<String> {
        let marker = format!("/object/public/{}/", self.bucket);
        public_url
            .split_once(&marker)
            .map(|(_, path)| path.to_string())
    }
}
