//! Best-effort batch execution.
//!
//! A batch binds once, then submits its directives one after another. Stores
//! that read before writing hand their session to [`execute_on`] so the
//! preparation and the directives share that single bind. A
//! failing directive is recorded against the identifier it was issued for
//! and the batch moves on; only a failed bind stops the batch, before any
//! directive runs.

use crate::directory::{BindError, DirectoryGateway, DirectoryRequest, DirectorySession};
use log::{debug, info, trace, warn};
use thiserror::Error;

/// A directive and the identifier failures are attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedRequest {
    pub request: DirectoryRequest,
    pub id: String,
}

impl CorrelatedRequest {
    pub fn new(request: DirectoryRequest, id: impl Into<String>) -> Self {
        Self {
            request,
            id: id.into(),
        }
    }
}

/// Failure of one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{id}: {message}")]
pub struct ItemError {
    pub id: String,
    pub message: String,
}

/// Per-item outcomes of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<Result<(), ItemError>>,
}

impl BatchReport {
    pub fn outcomes(&self) -> &[Result<(), ItemError>] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_ok()).count()
    }

    /// `"{id}: {message}"` for every failed item.
    pub fn errors(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .map(ToString::to_string)
            .collect()
    }
}

/// Runs correlated directives over a single bound session.
pub struct BatchExecutor<'g, G> {
    gateway: &'g G,
}

impl<'g, G: DirectoryGateway> BatchExecutor<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Execute all requests sequentially.
    ///
    /// Returns `Err` only when the bind fails; every other failure is
    /// captured in the report.
    pub async fn execute(&self, requests: Vec<CorrelatedRequest>) -> Result<BatchReport, BindError> {
        if requests.is_empty() {
            debug!("Empty batch, skipping bind");
            return Ok(BatchReport::default());
        }
        let session = self.gateway.connect().await?;
        Ok(execute_on(&session, requests).await)
    }
}

/// Execute requests over a session the caller already bound, e.g. the one
/// used to prepare the batch.
pub async fn execute_on<S: DirectorySession>(
    session: &S,
    requests: Vec<CorrelatedRequest>,
) -> BatchReport {
    let batch_id = uuid::Uuid::new_v4();
    info!("Batch {} running {} directives", batch_id, requests.len());

    let mut outcomes = Vec::with_capacity(requests.len());
    for CorrelatedRequest { request, id } in requests {
        trace!("Batch {} submitting {:?}", batch_id, request);
        let outcome = session.submit(request).await.map_err(|e| {
            warn!("Batch {} item '{}' failed: {}", batch_id, id, e);
            ItemError {
                id,
                message: e.to_string(),
            }
        });
        outcomes.push(outcome);
    }

    let report = BatchReport { outcomes };
    info!(
        "Batch {} finished: {}/{} succeeded",
        batch_id,
        report.succeeded(),
        report.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{AttributeSet, InMemoryDirectory};

    fn add(dn: &str) -> DirectoryRequest {
        let mut attributes = AttributeSet::new();
        attributes.insert("objectClass".into(), vec!["organizationalUnit".into()]);
        DirectoryRequest::Add {
            dn: dn.to_string(),
            attributes,
        }
    }

    #[tokio::test]
    async fn test_failures_are_correlated_and_do_not_abort() {
        let directory = InMemoryDirectory::new("dc=x");
        let executor = BatchExecutor::new(&directory);

        let report = executor
            .execute(vec![
                CorrelatedRequest::new(add("ou=a,dc=x"), "a"),
                CorrelatedRequest::new(add("ou=a,dc=x"), "a-again"),
                CorrelatedRequest::new(add("ou=c,ou=missing,dc=x"), "c"),
                CorrelatedRequest::new(add("ou=d,dc=x"), "d"),
            ])
            .await
            .unwrap();

        assert_eq!(report.len(), 4);
        assert_eq!(report.succeeded(), 2);
        let errors = report.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("a-again: "));
        assert!(errors[1].starts_with("c: "));
        assert!(report.outcomes()[3].is_ok());
        assert!(directory.entry("ou=d,dc=x").await.is_some());
    }

    #[tokio::test]
    async fn test_single_bind_per_batch() {
        let directory = InMemoryDirectory::new("dc=x");
        let requests = (0..5)
            .map(|i| CorrelatedRequest::new(add(&format!("ou={},dc=x", i)), i.to_string()))
            .collect();

        BatchExecutor::new(&directory).execute(requests).await.unwrap();
        assert_eq!(directory.stats().await.bind_count, 1);
    }

    #[tokio::test]
    async fn test_bind_failure_aborts_before_any_item() {
        let directory = InMemoryDirectory::new("dc=x");
        directory.set_unavailable(true);

        let result = BatchExecutor::new(&directory)
            .execute(vec![CorrelatedRequest::new(add("ou=a,dc=x"), "a")])
            .await;
        assert!(result.is_err());

        directory.set_unavailable(false);
        assert!(directory.entry("ou=a,dc=x").await.is_none());
    }
}
