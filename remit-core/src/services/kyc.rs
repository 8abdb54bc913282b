//! KYC service - queues identity-verification document uploads

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{DocPayload, Entity, KycDocument, KycStatus, Op, OutboxEntry, User};

/// Service that queues document uploads and tracks the user's KYC progress
pub struct KycService {
    repository: Arc<DuckDbRepository>,
}

impl KycService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Queue a document for upload.
    ///
    /// The document row and its outbox entry are written in one atomic unit;
    /// the user's kyc_status moves to pending until every queued document is
    /// confirmed by the provider.
    pub fn submit_document(
        &self,
        user_id: &str,
        uri: &str,
        mime: &str,
    ) -> Result<KycDocument> {
        if uri.trim().is_empty() {
            return Err(Error::validation("Document URI is required"));
        }

        // Make sure the user row exists before pointing a document at it
        let mut user = match self.repository.get_user(user_id)? {
            Some(user) => user,
            None => User::new(user_id, user_id),
        };
        user.kyc_status = KycStatus::Pending;
        self.repository.upsert_user(&user)?;

        let doc = KycDocument::new(user_id, uri, mime);
        let payload = DocPayload {
            id: doc.id.clone(),
            user_id: doc.user_id.clone(),
            uri: doc.uri.clone(),
            mime: doc.mime.clone(),
            uploaded_at: doc.uploaded_at,
        };
        let entry = OutboxEntry::new(
            Entity::KycDoc,
            doc.id.clone(),
            Op::KycUpload,
            payload.to_json()?,
        );
        self.repository.create_kyc_doc_with_outbox(&doc, &entry)?;

        Ok(doc)
    }

    /// The user's documents, newest first
    pub fn documents(&self, user_id: &str) -> Result<Vec<KycDocument>> {
        self.repository.get_kyc_docs(user_id)
    }

    /// The user's current verification progress
    pub fn status(&self, user_id: &str) -> Result<KycStatus> {
        Ok(self
            .repository
            .get_user(user_id)?
            .map(|user| user.kyc_status)
            .unwrap_or(KycStatus::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> KycService {
        let repository = Arc::new(
            DuckDbRepository::new(&dir.path().join("test.duckdb")).unwrap(),
        );
        repository.ensure_schema().unwrap();
        KycService::new(repository)
    }

    #[test]
    fn test_submit_creates_doc_outbox_and_pending_user() {
        let dir = TempDir::new().unwrap();
        let kyc = service(&dir);

        let doc = kyc
            .submit_document("demo-user", "file:///tmp/passport.jpg", "image/jpeg")
            .unwrap();

        assert!(!doc.is_confirmed());
        assert_eq!(kyc.status("demo-user").unwrap(), KycStatus::Pending);
        assert_eq!(kyc.documents("demo-user").unwrap().len(), 1);
    }

    #[test]
    fn test_submit_rejects_empty_uri() {
        let dir = TempDir::new().unwrap();
        let kyc = service(&dir);
        assert!(kyc.submit_document("demo-user", "", "image/jpeg").is_err());
    }

    #[test]
    fn test_status_defaults_to_none() {
        let dir = TempDir::new().unwrap();
        let kyc = service(&dir);
        assert_eq!(kyc.status("nobody").unwrap(), KycStatus::None);
    }
}
