//! KYC document domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identity-verification document queued for upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycDocument {
    pub id: String,
    pub user_id: String,
    /// Local file or content URI of the captured document
    pub uri: String,
    pub mime: String,
    pub uploaded_at: DateTime<Utc>,
    /// Remote identifier; presence means the upload was confirmed
    pub remote_id: Option<String>,
}

impl KycDocument {
    pub fn new(user_id: impl Into<String>, uri: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            id: format!("doc_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            uri: uri.into(),
            mime: mime.into(),
            uploaded_at: Utc::now(),
            remote_id: None,
        }
    }

    /// True once the remote provider has acknowledged the upload
    pub fn is_confirmed(&self) -> bool {
        self.remote_id.is_some()
    }
}
