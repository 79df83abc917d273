//! Interfaces to collaborators that live outside the core: notification
//! transport (email/Slack/etc is out of scope per the purpose statement),
//! and the API-facing task summary view. The core only needs to know it can
//! call out; the transport itself is someone else's problem.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::DocumentRecord;

/// A process that flipped into `category_status = pending` during a run —
/// the dispatcher groups these for operator attention.
#[derive(Debug, Clone)]
pub struct PendingCategorization {
    pub tenant_id: String,
    pub process_number: String,
}

/// A newly discovered document, grouped by signer for the post-run digest.
#[derive(Debug, Clone)]
pub struct NewDocumentNotice {
    pub process_number: String,
    pub document_number: String,
    pub record: DocumentRecord,
}

/// Snapshot-based notification dispatch, called once per extraction run.
/// Deliberately stateless across runs: the legacy system does not diff
/// category/status over time, and this interface preserves that.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        pending_categorization: Vec<PendingCategorization>,
        new_documents_by_signer: HashMap<String, Vec<NewDocumentNotice>>,
    );
}

/// No-op dispatcher used where no transport is wired up (tests, or a
/// deployment that does not need notifications). Logs at info level so the
/// snapshot is still observable.
#[derive(Default)]
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn dispatch(
        &self,
        pending_categorization: Vec<PendingCategorization>,
        new_documents_by_signer: HashMap<String, Vec<NewDocumentNotice>>,
    ) {
        tracing::info!(
            pending_categorization = pending_categorization.len(),
            signers = new_documents_by_signer.len(),
            "extraction run notification snapshot"
        );
    }
}
