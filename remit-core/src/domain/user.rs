//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// KYC verification progress for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    /// No document submitted yet
    None,
    /// At least one document queued for upload
    Pending,
    /// All queued documents confirmed by the provider
    Submitted,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::None => "none",
            KycStatus::Pending => "pending",
            KycStatus::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => KycStatus::Pending,
            "submitted" => KycStatus::Submitted,
            _ => KycStatus::None,
        }
    }
}

/// A local user of the app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kyc_status: KycStatus::None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation() {
        let user = User::new("demo-user", "Demo User");
        assert_eq!(user.id, "demo-user");
        assert_eq!(user.kyc_status, KycStatus::None);
    }

    #[test]
    fn test_kyc_status_parse_is_lenient() {
        assert_eq!(KycStatus::parse("pending"), KycStatus::Pending);
        assert_eq!(KycStatus::parse("garbage"), KycStatus::None);
    }
}
