use crate::error::DomainError;
use crate::identity::IdentityResolver;
use crate::row::{SourceDocument, to_row};
use crate::sql::{UpsertTarget, compile_upsert};
use crate::store::ReportingStore;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Persisted { rows_affected: u64 },
    Skipped { reason: SkipReason }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Subscription owned by an organization account. Only delegate owned
    /// subscriptions are imported.
    OrganizationOwner,
    /// No gateway subscription exists for the service.
    SubscriptionNotFound
}

/// Trigger input: either one document or a batch of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DocumentBatch {
    Many(Vec<SourceDocument>),
    One(Box<SourceDocument>)
}

impl DocumentBatch {
    pub fn into_documents(self) -> Vec<SourceDocument> {
        match self {
            Self::Many(documents) => documents,
            Self::One(document) => vec![*document]
        }
    }
}

impl From<SourceDocument> for DocumentBatch {
    fn from(document: SourceDocument) -> Self {
        Self::One(Box::new(document))
    }
}

impl From<Vec<SourceDocument>> for DocumentBatch {
    fn from(documents: Vec<SourceDocument>) -> Self {
        Self::Many(documents)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub service_id: String,
    pub outcome: Result<SyncOutcome, DomainError>
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub persisted: u32,
    pub skipped: u32,
    pub failed: u32,
    pub results: Vec<DocumentResult>
}

impl BatchReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            persisted: 0,
            skipped: 0,
            failed: 0,
            results: Vec::new()
        }
    }

    fn record(&mut self, result: DocumentResult) {
        match &result.outcome {
            Ok(SyncOutcome::Persisted { .. }) => self.persisted += 1,
            Ok(SyncOutcome::Skipped { .. }) => self.skipped += 1,
            Err(_) => self.failed += 1
        }
        self.results.push(result);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Imports changed service documents into the reporting table.
pub struct ChangeSyncPipeline {
    resolver: IdentityResolver,
    store: Arc<dyn ReportingStore>,
    target: UpsertTarget,
    concurrency: usize
}

impl ChangeSyncPipeline {
    pub fn new(
        resolver: IdentityResolver,
        store: Arc<dyn ReportingStore>,
        target: UpsertTarget
    ) -> Self {
        Self {
            resolver,
            store,
            target,
            concurrency: 1
        }
    }

    /// Number of documents processed at once by [`Self::process_batch`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Processes one document. Benign failures resolve to a skip; anything
    /// else is returned to the caller.
    pub async fn process(&self, document: &SourceDocument) -> Result<SyncOutcome, DomainError> {
        match self.store_document(document).await {
            Err(err) if err.is_subscription_not_found() => {
                debug!(service_id = %document.service_id, reason = %err, "Service has no subscription, skipping");
                Ok(SyncOutcome::Skipped {
                    reason: SkipReason::SubscriptionNotFound
                })
            }
            other => other
        }
    }

    async fn store_document(&self, document: &SourceDocument) -> Result<SyncOutcome, DomainError> {
        let owner = self
            .resolver
            .resolve_owner_reference(&document.service_id)
            .await?;
        let account = self.resolver.resolve_account(&owner).await?;

        if !account.is_delegate() {
            debug!(service_id = %document.service_id, owner_id = %owner.owner_id, "Subscription owned by an organization, skipping");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::OrganizationOwner
            });
        }

        let row = to_row(document, &account, &owner, None);
        let sql = compile_upsert(&self.target, &row.to_columns());
        let rows_affected = self
            .store
            .execute(&sql)
            .await
            .map_err(|e| DomainError::storage(e.to_string()))?;

        debug!(service_id = %document.service_id, version = document.version, rows_affected, "Service stored");
        Ok(SyncOutcome::Persisted { rows_affected })
    }

    /// Runs every document of the batch to completion, whatever happens to
    /// the others, and reports one result per document in input order.
    pub async fn process_batch(&self, batch: impl Into<DocumentBatch>) -> BatchReport {
        let documents = batch.into().into_documents();
        let mut report = BatchReport::new();
        info!(count = documents.len(), "Processing service changes");

        let results: Vec<DocumentResult> = stream::iter(documents.iter())
            .map(|document| async move {
                DocumentResult {
                    service_id: document.service_id.clone(),
                    outcome: self.process(document).await
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for result in results {
            if let Err(err) = &result.outcome {
                warn!(service_id = %result.service_id, error = %err, "Service change failed");
            }
            report.record(result);
        }

        report.completed_at = Some(Utc::now());
        info!(
            persisted = report.persisted,
            skipped = report.skipped,
            failed = report.failed,
            "Service changes processed"
        );

        report
    }
}
