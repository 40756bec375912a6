use crate::{
    error::ReconcileError,
    fetch::{FetchLimits, PagedFetcher},
    reconcile::state_machine::{FileStateMachine, plan_changes},
    retry::call_with_retry,
};
use engine_config::SyncSettings;
use engine_core::{
    error::RemoteError, metrics::SyncMetrics, remote::TransformationService, retry::RetryPolicy,
};
use model::{
    core::identifiers::{FileId, Lfn, TransformationId},
    files::{record::StatusChange, status::FileStatus},
    pagination::filter::FileQuery,
};
use serde::{Serialize, Serializer};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Statuses proposed for a set of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusProposal {
    /// The same status for every listed file.
    Uniform { status: FileStatus, lfns: Vec<Lfn> },
    PerFile(BTreeMap<Lfn, FileStatus>),
}

impl StatusProposal {
    pub fn uniform(status: FileStatus, lfns: impl IntoIterator<Item = Lfn>) -> Self {
        Self::Uniform {
            status,
            lfns: lfns.into_iter().collect(),
        }
    }

    pub fn into_map(self) -> BTreeMap<Lfn, FileStatus> {
        match self {
            Self::Uniform { status, lfns } => lfns.into_iter().map(|lfn| (lfn, status)).collect(),
            Self::PerFile(map) => map,
        }
    }
}

impl From<BTreeMap<Lfn, FileStatus>> for StatusProposal {
    fn from(map: BTreeMap<Lfn, FileStatus>) -> Self {
        Self::PerFile(map)
    }
}

/// A submission the service did not accept, even after retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub changes: Vec<StatusChange>,
    pub attempts: usize,
    #[serde(serialize_with = "display")]
    pub error: RemoteError,
}

fn display<S: Serializer>(err: &RemoteError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(err)
}

/// What one `set_file_status` call did. Files that were already in their
/// target status appear nowhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusUpdateOutcome {
    pub committed: BTreeMap<Lfn, FileStatus>,
    pub failed: Vec<ChunkFailure>,
    /// Proposed LFNs the transformation does not hold.
    pub unknown: Vec<Lfn>,
}

impl StatusUpdateOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_lfns(&self) -> Vec<Lfn> {
        self.failed
            .iter()
            .flat_map(|f| f.changes.iter().map(|c| c.lfn.clone()))
            .collect()
    }
}

/// Applies file status proposals through a [`FileStateMachine`] and commits
/// the resulting changes in bounded chunks.
///
/// Every call re-reads the current records, so repeating a proposal that was
/// already committed submits nothing.
#[derive(Clone)]
pub struct FileStatusReconciler {
    service: Arc<dyn TransformationService>,
    fetcher: PagedFetcher,
    machine: Arc<dyn FileStateMachine>,
    retry: RetryPolicy,
    page_size: usize,
    chunk_size: usize,
    call_timeout: Duration,
    metrics: SyncMetrics,
}

impl FileStatusReconciler {
    pub fn new(
        service: Arc<dyn TransformationService>,
        fetcher: PagedFetcher,
        machine: Arc<dyn FileStateMachine>,
        settings: &SyncSettings,
        metrics: SyncMetrics,
    ) -> Self {
        Self {
            service,
            fetcher,
            machine,
            retry: settings.chunk_retry_policy(),
            page_size: settings.page_size,
            chunk_size: settings.status_chunk_size.max(1),
            call_timeout: settings.call_timeout(),
            metrics,
        }
    }

    pub async fn set_file_status(
        &self,
        transformation_id: TransformationId,
        proposal: impl Into<StatusProposal>,
        force: bool,
    ) -> Result<StatusUpdateOutcome, ReconcileError> {
        let proposed = proposal.into().into_map();
        if proposed.is_empty() {
            return Ok(StatusUpdateOutcome::default());
        }

        let query =
            FileQuery::for_transformation(transformation_id).with_lfns(proposed.keys().cloned());
        let service = &self.service;
        let query_ref = &query;
        let current = self
            .fetcher
            .fetch_all(FetchLimits::new(self.page_size), move |page| {
                service.list_transformation_files(query_ref, page)
            })
            .await
            .map_err(|source| ReconcileError::ReadCurrent {
                transformation_id,
                source,
            })?;

        let plan = plan_changes(self.machine.as_ref(), &current, &proposed, force);
        if !plan.unknown.is_empty() {
            self.metrics.increment_anomalies(plan.unknown.len() as u64);
            warn!(
                transformation = %transformation_id,
                count = plan.unknown.len(),
                "Skipping files not attached to the transformation"
            );
        }

        let proposed_count = proposed.len();
        let mut outcome = self.submit(transformation_id, plan.changes).await;
        outcome.unknown = plan.unknown;

        info!(
            transformation = %transformation_id,
            proposed = proposed_count,
            committed = outcome.committed.len(),
            failed = outcome.failed.len(),
            force,
            "File status update finished"
        );
        Ok(outcome)
    }

    /// Submits already-decided changes in chunks. A rejected chunk is
    /// recorded and the remaining chunks are still sent.
    async fn submit(
        &self,
        transformation_id: TransformationId,
        changes: Vec<StatusChange>,
    ) -> StatusUpdateOutcome {
        let mut outcome = StatusUpdateOutcome::default();

        for (index, chunk) in changes.chunks(self.chunk_size).enumerate() {
            let updates: HashMap<FileId, FileStatus> =
                chunk.iter().map(|c| (c.file_id, c.to)).collect();
            let service = &self.service;
            let updates_ref = &updates;

            let result = call_with_retry(
                &self.retry,
                "set_file_status",
                self.call_timeout,
                move || service.set_file_status_for_transformation(transformation_id, updates_ref),
            )
            .await;

            match result {
                Ok(()) => {
                    self.metrics.record_chunk_committed(chunk.len());
                    debug!(
                        transformation = %transformation_id,
                        chunk = index,
                        size = chunk.len(),
                        "Committed status chunk"
                    );
                    outcome
                        .committed
                        .extend(chunk.iter().map(|c| (c.lfn.clone(), c.to)));
                }
                Err(err) => {
                    self.metrics.record_chunk_failed();
                    let attempts = err.attempts();
                    let error = err.into_inner();
                    error!(
                        transformation = %transformation_id,
                        chunk = index,
                        size = chunk.len(),
                        attempts,
                        error = %error,
                        "Status chunk rejected"
                    );
                    outcome.failed.push(ChunkFailure {
                        changes: chunk.to_vec(),
                        attempts,
                        error,
                    });
                }
            }
        }
        outcome
    }
}
