use crate::{
    error::{FetchError, MigrationError},
    fetch::{FetchLimits, PagedFetcher},
    migrate::report::{MigrationReport, MoveLabel},
    reconcile::{FileStatusReconciler, StatusProposal},
    retry::call_with_retry,
};
use engine_config::SyncSettings;
use engine_core::{metrics::SyncMetrics, remote::TransformationService, retry::RetryPolicy};
use model::{
    core::identifiers::{Lfn, TransformationId},
    files::{
        record::TransformationFile,
        status::{FileState, FileStatus},
    },
    pagination::filter::FileQuery,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};

/// Status changes computed for one migration, before anything is sent.
#[derive(Debug, Default)]
struct MovePlan {
    /// Parent-side mark to the LFNs receiving it.
    parent_marks: BTreeMap<FileStatus, Vec<Lfn>>,
    /// `(derived target, parent status)` to the LFNs moving that way.
    derived_moves: BTreeMap<(FileStatus, FileStatus), Vec<Lfn>>,
}

fn plan_moves(
    parent_files: &[TransformationFile],
    derived: &HashMap<Lfn, FileStatus>,
    reset_unused: bool,
    report: &mut MigrationReport,
) -> MovePlan {
    let mut plan = MovePlan::default();

    for file in parent_files {
        let Some(&derived_status) = derived.get(&file.lfn) else {
            report.missing_in_derived += 1;
            continue;
        };
        let parent_status = file.status;

        // The parent record is retired even when the derived side made its
        // own progress, so the file is never processed by both.
        let mark = if parent_status.is(FileState::Unused) {
            FileStatus::NOT_PROCESSED
        } else {
            FileStatus::MOVED
        };
        plan.parent_marks
            .entry(mark)
            .or_default()
            .push(file.lfn.clone());

        if !derived_status.is_inherited() {
            report.record_anomaly(derived_status);
            continue;
        }

        let target = if parent_status.is(FileState::MaxReset) {
            if reset_unused {
                FileStatus::UNUSED
            } else {
                FileStatus::inherited(FileState::MaxReset)
            }
        } else {
            parent_status
        };
        plan.derived_moves
            .entry((target, parent_status))
            .or_default()
            .push(file.lfn.clone());
    }
    plan
}

/// Moves processing state from a parent transformation to one derived
/// from it.
///
/// Parent records are retired first, then the derived records take over
/// the parent's pending work. When a derived-side chunk fails, the parent
/// records of that chunk are restored to their pre-migration status. None
/// of this is transactional: every step is logged and counted in the
/// returned [`MigrationReport`], and a repeated run only touches what the
/// previous one left undone.
#[derive(Clone)]
pub struct DerivedMigrator {
    service: Arc<dyn TransformationService>,
    fetcher: PagedFetcher,
    reconciler: FileStatusReconciler,
    retry: RetryPolicy,
    page_size: usize,
    chunk_size: usize,
    call_timeout: Duration,
    metrics: SyncMetrics,
}

impl DerivedMigrator {
    pub fn new(
        service: Arc<dyn TransformationService>,
        fetcher: PagedFetcher,
        reconciler: FileStatusReconciler,
        settings: &SyncSettings,
        metrics: SyncMetrics,
    ) -> Self {
        Self {
            service,
            fetcher,
            reconciler,
            retry: settings.chunk_retry_policy(),
            page_size: settings.page_size,
            chunk_size: settings.status_chunk_size.max(1),
            call_timeout: settings.call_timeout(),
            metrics,
        }
    }

    pub async fn migrate(
        &self,
        derived_id: TransformationId,
        reset_unused: bool,
    ) -> Result<MigrationReport, MigrationError> {
        let service = &self.service;
        let derived = call_with_retry(
            &self.retry,
            "get_transformation",
            self.call_timeout,
            move || service.get_transformation(derived_id),
        )
        .await
        .map_err(|err| MigrationError::Resolve {
            transformation_id: derived_id,
            source: err.into_inner(),
        })?;

        let Some(parent_id) = derived.parent() else {
            warn!(transformation = %derived_id, "Transformation was not derived, nothing to move");
            return Ok(MigrationReport::for_pair(derived_id, None));
        };
        let mut report = MigrationReport::for_pair(derived_id, Some(parent_id));

        let parent_files = self
            .list_files(
                FileQuery::for_transformation(parent_id)
                    .with_statuses([FileStatus::UNUSED, FileStatus::MAX_RESET]),
            )
            .await
            .map_err(|source| MigrationError::Listing {
                transformation_id: parent_id,
                source,
            })?;
        if parent_files.is_empty() {
            info!(
                run_id = %report.run_id,
                transformation = %derived_id,
                parent = %parent_id,
                "No parent files to move"
            );
            return Ok(report);
        }

        let derived_files = self
            .list_files(
                FileQuery::for_transformation(derived_id)
                    .with_lfns(parent_files.iter().map(|f| f.lfn.clone())),
            )
            .await
            .map_err(|source| MigrationError::Listing {
                transformation_id: derived_id,
                source,
            })?;
        let derived_status: HashMap<Lfn, FileStatus> = derived_files
            .into_iter()
            .map(|f| (f.lfn, f.status))
            .collect();

        let plan = plan_moves(&parent_files, &derived_status, reset_unused, &mut report);
        if report.missing_in_derived > 0 {
            warn!(
                run_id = %report.run_id,
                transformation = %derived_id,
                parent = %parent_id,
                count = report.missing_in_derived,
                "Parent files missing from the derived transformation"
            );
        }
        let anomalies = report.missing_in_derived + report.anomalies.values().sum::<usize>();
        self.metrics.increment_anomalies(anomalies as u64);
        for (status, count) in &report.anomalies {
            warn!(
                run_id = %report.run_id,
                transformation = %derived_id,
                status = %status,
                count,
                "Derived files already have their own status, leaving them alone"
            );
        }

        let parent_failed = self
            .mark_parent(parent_id, plan.parent_marks, &mut report)
            .await;

        for ((target, parent_status), lfns) in plan.derived_moves {
            let (lfns, skipped): (Vec<Lfn>, Vec<Lfn>) =
                lfns.into_iter().partition(|lfn| !parent_failed.contains(lfn));
            if !skipped.is_empty() {
                warn!(
                    run_id = %report.run_id,
                    transformation = %derived_id,
                    count = skipped.len(),
                    "Not moving files whose parent record could not be retired"
                );
            }
            for chunk in lfns.chunks(self.chunk_size) {
                self.move_chunk(
                    derived_id,
                    parent_id,
                    (target, parent_status),
                    chunk,
                    &mut report,
                )
                .await;
            }
        }

        match self.inherit_parent_progress(derived_id, parent_id).await {
            Ok(count) => report.processed_inherited = count,
            Err(err) => error!(
                run_id = %report.run_id,
                transformation = %derived_id,
                error = %err,
                "Failed to propagate parent progress to derived files"
            ),
        }

        info!(
            run_id = %report.run_id,
            transformation = %derived_id,
            parent = %parent_id,
            moved = report.total_moved(),
            processed_inherited = report.processed_inherited,
            failures = report.has_failures(),
            "Migration finished"
        );
        Ok(report)
    }

    /// Commits the parent-side marks and returns the LFNs whose mark was
    /// not accepted.
    async fn mark_parent(
        &self,
        parent_id: TransformationId,
        marks: BTreeMap<FileStatus, Vec<Lfn>>,
        report: &mut MigrationReport,
    ) -> HashSet<Lfn> {
        let mut failed = HashSet::new();

        for (mark, lfns) in marks {
            for chunk in lfns.chunks(self.chunk_size) {
                let proposal = StatusProposal::uniform(mark, chunk.iter().cloned());
                match self.reconciler.set_file_status(parent_id, proposal, false).await {
                    Ok(outcome) => failed.extend(outcome.failed_lfns()),
                    Err(err) => {
                        error!(
                            run_id = %report.run_id,
                            transformation = %parent_id,
                            status = %mark,
                            count = chunk.len(),
                            error = %err,
                            "Failed to retire parent files"
                        );
                        failed.extend(chunk.iter().cloned());
                    }
                }
            }
        }
        report.parent_failures = failed.len();
        failed
    }

    async fn move_chunk(
        &self,
        derived_id: TransformationId,
        parent_id: TransformationId,
        (target, parent_status): (FileStatus, FileStatus),
        chunk: &[Lfn],
        report: &mut MigrationReport,
    ) {
        let proposal = StatusProposal::uniform(target, chunk.iter().cloned());
        let (committed, failed, vanished) = match self
            .reconciler
            .set_file_status(derived_id, proposal, false)
            .await
        {
            Ok(outcome) => {
                let failed = outcome.failed_lfns();
                (outcome.committed, failed, outcome.unknown)
            }
            Err(err) => {
                error!(
                    run_id = %report.run_id,
                    transformation = %derived_id,
                    error = %err,
                    "Failed to read derived files before moving them"
                );
                (BTreeMap::new(), chunk.to_vec(), Vec::new())
            }
        };

        // Labels follow what the service accepted, which the state machine
        // may have changed from the planned target.
        for status in committed.values() {
            report.record_move(MoveLabel::classify(parent_status, *status), 1);
        }
        if !committed.is_empty() {
            self.metrics.increment_files_moved(committed.len() as u64);
            info!(
                run_id = %report.run_id,
                transformation = %derived_id,
                count = committed.len(),
                from = %parent_status,
                to = %target,
                "Moved files from parent"
            );
        }
        if !vanished.is_empty() {
            report.missing_in_derived += vanished.len();
            warn!(
                run_id = %report.run_id,
                transformation = %derived_id,
                count = vanished.len(),
                "Derived files disappeared before they could be moved"
            );
        }
        if failed.is_empty() && vanished.is_empty() {
            return;
        }

        report.derived_failures += failed.len();
        let restore_lfns: Vec<Lfn> = failed.into_iter().chain(vanished).collect();
        error!(
            run_id = %report.run_id,
            transformation = %derived_id,
            count = restore_lfns.len(),
            restore = %parent_status,
            "Derived update failed, restoring parent files"
        );
        let restore = StatusProposal::uniform(parent_status, restore_lfns.iter().cloned());
        let unrestored = match self.reconciler.set_file_status(parent_id, restore, true).await {
            Ok(outcome) => outcome.failed_lfns().len() + outcome.unknown.len(),
            Err(err) => {
                error!(
                    run_id = %report.run_id,
                    transformation = %parent_id,
                    error = %err,
                    "Failed to read parent files for restoration"
                );
                restore_lfns.len()
            }
        };
        self.metrics.record_compensation(
            restore_lfns.len().saturating_sub(unrestored) as u64,
            unrestored as u64,
        );
        if unrestored > 0 {
            report.compensation_failures += unrestored;
            error!(
                run_id = %report.run_id,
                transformation = %parent_id,
                count = unrestored,
                "Parent files could not be restored and need manual attention"
            );
        }
    }

    /// Promotes derived files still waiting on inherited work to
    /// `Processed-inherited` when the parent has finished them since the
    /// derivation.
    async fn inherit_parent_progress(
        &self,
        derived_id: TransformationId,
        parent_id: TransformationId,
    ) -> Result<usize, FetchError> {
        let waiting = self
            .list_files(FileQuery::for_transformation(derived_id).with_statuses([
                FileStatus::inherited(FileState::Assigned),
                FileStatus::inherited(FileState::Unused),
            ]))
            .await?;
        if waiting.is_empty() {
            return Ok(0);
        }

        let parent_files = self
            .list_files(
                FileQuery::for_transformation(parent_id)
                    .with_lfns(waiting.into_iter().map(|f| f.lfn)),
            )
            .await?;
        let processed: Vec<Lfn> = parent_files
            .into_iter()
            .filter(|f| f.status.is(FileState::Processed))
            .map(|f| f.lfn)
            .collect();

        let mut promoted = 0;
        for chunk in processed.chunks(self.chunk_size) {
            let proposal = StatusProposal::uniform(
                FileStatus::inherited(FileState::Processed),
                chunk.iter().cloned(),
            );
            match self.reconciler.set_file_status(derived_id, proposal, false).await {
                Ok(outcome) => promoted += outcome.committed.len(),
                Err(err) => error!(
                    transformation = %derived_id,
                    count = chunk.len(),
                    error = %err,
                    "Failed to promote derived files"
                ),
            }
        }
        if promoted > 0 {
            info!(
                transformation = %derived_id,
                count = promoted,
                "Derived files marked Processed-inherited"
            );
        }
        Ok(promoted)
    }

    async fn list_files(&self, query: FileQuery) -> Result<Vec<TransformationFile>, FetchError> {
        let service = &self.service;
        let query = &query;
        self.fetcher
            .fetch_all(FetchLimits::new(self.page_size), move |page| {
                service.list_transformation_files(query, page)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::DefaultFileStateMachine;
    use engine_core::{
        error::RemoteError,
        metrics::SyncMetrics,
        remote::memory::{FaultRule, InMemoryTransformationService, Operation},
    };
    use model::transformation::record::NewTransformation;
    use tracing_test::traced_test;

    struct Fixture {
        service: Arc<InMemoryTransformationService>,
        migrator: DerivedMigrator,
        metrics: SyncMetrics,
        parent: TransformationId,
    }

    impl Fixture {
        async fn new(settings: SyncSettings) -> Self {
            let service = Arc::new(InMemoryTransformationService::new());
            let parent = service
                .add_transformation(&NewTransformation {
                    name: "reco".to_string(),
                    kind: "DataReconstruction".to_string(),
                    inherited_from: None,
                })
                .await
                .unwrap();

            let settings = SyncSettings {
                retry_base_delay_ms: 0,
                retry_max_delay_ms: 0,
                ..settings
            };
            let metrics = SyncMetrics::new();
            let fetcher = PagedFetcher::new(
                settings.page_retry_policy(),
                settings.listing_timeout(),
                metrics.clone(),
            );
            let reconciler = FileStatusReconciler::new(
                service.clone(),
                fetcher.clone(),
                Arc::new(DefaultFileStateMachine::new(settings.max_reset_counter)),
                &settings,
                metrics.clone(),
            );
            let migrator = DerivedMigrator::new(
                service.clone(),
                fetcher,
                reconciler,
                &settings,
                metrics.clone(),
            );
            Self {
                service,
                migrator,
                metrics,
                parent,
            }
        }

        async fn seed_parent(&self, lfn: &str, status: FileStatus) {
            self.seed(self.parent, lfn, status, 0).await;
        }

        async fn seed(&self, id: TransformationId, lfn: &str, status: FileStatus, errors: u32) {
            self.service.seed_file(id, lfn, status, errors).await.unwrap();
        }

        async fn derive(&self) -> TransformationId {
            self.service
                .add_transformation(&NewTransformation {
                    name: "reco-v2".to_string(),
                    kind: "DataReconstruction".to_string(),
                    inherited_from: Some(self.parent),
                })
                .await
                .unwrap()
        }

        async fn status(&self, id: TransformationId, lfn: &str) -> FileStatus {
            self.service
                .file(id, &Lfn::from(lfn))
                .await
                .unwrap()
                .status
        }
    }

    #[tokio::test]
    async fn test_not_derived_is_a_noop() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        fx.service.clear_calls().await;

        let report = fx.migrator.migrate(fx.parent, true).await.unwrap();

        assert_eq!(report.parent, None);
        assert!(report.moved.is_empty());
        let calls = fx.service.calls().await;
        assert!(calls.iter().all(|c| c.operation != Operation::SetFileStatus));
    }

    #[tokio::test]
    async fn test_moves_pending_parent_files() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        fx.seed_parent("/b", FileStatus::MAX_RESET).await;
        fx.seed_parent("/c", FileStatus::PROCESSED).await;
        fx.seed_parent("/d", FileStatus::ASSIGNED).await;
        let derived = fx.derive().await;
        // The parent finishes /d after the derivation.
        fx.seed_parent("/d", FileStatus::PROCESSED).await;

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(report.parent, Some(fx.parent));
        assert_eq!(
            report.moved,
            BTreeMap::from([(MoveLabel::Unused, 1), (MoveLabel::UnusedFromMaxReset, 1)])
        );
        assert_eq!(report.processed_inherited, 1);
        assert!(!report.has_failures());

        assert_eq!(fx.status(fx.parent, "/a").await, FileStatus::NOT_PROCESSED);
        assert_eq!(fx.status(fx.parent, "/b").await, FileStatus::MAX_RESET);
        assert_eq!(fx.status(derived, "/a").await, FileStatus::UNUSED);
        assert_eq!(fx.status(derived, "/b").await, FileStatus::UNUSED);
        assert_eq!(
            fx.status(derived, "/c").await,
            FileStatus::inherited(FileState::Processed)
        );
        assert_eq!(
            fx.status(derived, "/d").await,
            FileStatus::inherited(FileState::Processed)
        );
    }

    #[tokio::test]
    async fn test_max_reset_after_repeated_failures_resets_to_unused() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed(fx.parent, "/b", FileStatus::MAX_RESET, 10).await;
        let derived = fx.derive().await;

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(fx.status(derived, "/b").await, FileStatus::UNUSED);
        assert_eq!(
            report.moved,
            BTreeMap::from([(MoveLabel::UnusedFromMaxReset, 1)])
        );
        assert_eq!(fx.metrics.snapshot().files_moved, 1);
    }

    #[tokio::test]
    async fn test_moves_are_labelled_by_committed_status() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/b", FileStatus::MAX_RESET).await;
        let derived = fx.derive().await;
        // The derived file failed on its own since the derivation.
        fx.seed(derived, "/b", FileStatus::inherited(FileState::MaxReset), 10)
            .await;

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(fx.status(derived, "/b").await, FileStatus::MAX_RESET);
        assert_eq!(report.moved, BTreeMap::from([(MoveLabel::MaxReset, 1)]));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_parent_file_added_after_derivation_is_logged() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        let derived = fx.derive().await;
        fx.seed_parent("/late", FileStatus::UNUSED).await;

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(report.missing_in_derived, 1);
        assert_eq!(fx.status(fx.parent, "/late").await, FileStatus::UNUSED);
        assert_eq!(fx.metrics.snapshot().anomalies, 1);
        assert!(logs_contain("Parent files missing from the derived transformation"));
    }

    #[tokio::test]
    async fn test_vanished_derived_file_restores_parent() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        let derived = fx.derive().await;
        // Retired by the parent-side step, but gone from the derived side
        // by the time the chunk is applied.
        fx.seed_parent("/a", FileStatus::NOT_PROCESSED).await;
        fx.seed_parent("/gone", FileStatus::NOT_PROCESSED).await;
        let mut report = MigrationReport::for_pair(derived, Some(fx.parent));

        fx.migrator
            .move_chunk(
                derived,
                fx.parent,
                (FileStatus::UNUSED, FileStatus::UNUSED),
                &[Lfn::from("/a"), Lfn::from("/gone")],
                &mut report,
            )
            .await;

        assert_eq!(report.moved, BTreeMap::from([(MoveLabel::Unused, 1)]));
        assert_eq!(report.missing_in_derived, 1);
        assert_eq!(report.compensation_failures, 0);
        assert_eq!(fx.status(fx.parent, "/gone").await, FileStatus::UNUSED);
        assert_eq!(fx.status(fx.parent, "/a").await, FileStatus::NOT_PROCESSED);
        assert_eq!(fx.metrics.snapshot().compensations, 1);
    }

    #[tokio::test]
    async fn test_keeping_max_reset_leaves_inherited_status() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/b", FileStatus::MAX_RESET).await;
        let derived = fx.derive().await;

        let report = fx.migrator.migrate(derived, false).await.unwrap();

        assert_eq!(
            fx.status(derived, "/b").await,
            FileStatus::inherited(FileState::MaxReset)
        );
        assert_eq!(report.total_moved(), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_independent_derived_progress_is_an_anomaly() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        let derived = fx.derive().await;
        fx.service
            .seed_file(derived, "/a", FileStatus::ASSIGNED, 0)
            .await
            .unwrap();

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(report.anomalies, BTreeMap::from([(FileStatus::ASSIGNED, 1)]));
        assert_eq!(fx.status(derived, "/a").await, FileStatus::ASSIGNED);
        assert_eq!(fx.status(fx.parent, "/a").await, FileStatus::NOT_PROCESSED);
        assert!(logs_contain("already have their own status"));
    }

    #[tokio::test]
    async fn test_second_run_changes_nothing() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        fx.seed_parent("/b", FileStatus::MAX_RESET).await;
        fx.seed_parent("/d", FileStatus::ASSIGNED).await;
        let derived = fx.derive().await;
        fx.seed_parent("/d", FileStatus::PROCESSED).await;

        fx.migrator.migrate(derived, true).await.unwrap();
        fx.service.clear_calls().await;
        let second = fx.migrator.migrate(derived, true).await.unwrap();

        assert!(fx.service.accepted_status_updates().await.is_empty());
        assert_eq!(second.total_moved(), 0);
        assert_eq!(second.processed_inherited, 0);
    }

    #[tokio::test]
    async fn test_failed_derived_chunk_restores_parent_files() {
        let fx = Fixture::new(SyncSettings {
            status_chunk_size: 2,
            ..Default::default()
        })
        .await;
        for lfn in ["/f0", "/f1", "/f2", "/f3"] {
            fx.seed_parent(lfn, FileStatus::UNUSED).await;
        }
        let derived = fx.derive().await;
        fx.service
            .inject(
                FaultRule::fail(
                    Operation::SetFileStatus,
                    RemoteError::Rejected("derived transformation is locked".into()),
                )
                .for_transformation(derived)
                .after(1),
            )
            .await;

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(report.derived_failures, 2);
        assert_eq!(report.compensation_failures, 0);
        let metrics = fx.metrics.snapshot();
        assert_eq!(metrics.compensations, 2);
        assert_eq!(metrics.compensation_failures, 0);
        assert_eq!(metrics.files_moved, 2);
        assert_eq!(report.moved, BTreeMap::from([(MoveLabel::Unused, 2)]));
        for lfn in ["/f0", "/f1"] {
            assert_eq!(fx.status(fx.parent, lfn).await, FileStatus::NOT_PROCESSED);
            assert_eq!(fx.status(derived, lfn).await, FileStatus::UNUSED);
        }
        for lfn in ["/f2", "/f3"] {
            assert_eq!(fx.status(fx.parent, lfn).await, FileStatus::UNUSED);
            assert_eq!(
                fx.status(derived, lfn).await,
                FileStatus::inherited(FileState::Unused)
            );
        }
    }

    #[tokio::test]
    async fn test_failed_parent_mark_keeps_derived_side_untouched() {
        let fx = Fixture::new(SyncSettings {
            status_chunk_size: 2,
            ..Default::default()
        })
        .await;
        for lfn in ["/f0", "/f1", "/f2", "/f3"] {
            fx.seed_parent(lfn, FileStatus::UNUSED).await;
        }
        let derived = fx.derive().await;
        fx.service
            .inject(
                FaultRule::fail(
                    Operation::SetFileStatus,
                    RemoteError::Rejected("parent is locked".into()),
                )
                .for_transformation(fx.parent),
            )
            .await;

        let report = fx.migrator.migrate(derived, true).await.unwrap();

        assert_eq!(report.parent_failures, 2);
        assert_eq!(report.moved, BTreeMap::from([(MoveLabel::Unused, 2)]));
        for lfn in ["/f0", "/f1"] {
            assert_eq!(fx.status(fx.parent, lfn).await, FileStatus::UNUSED);
            assert_eq!(
                fx.status(derived, lfn).await,
                FileStatus::inherited(FileState::Unused)
            );
        }
        assert_eq!(fx.status(derived, "/f2").await, FileStatus::UNUSED);
    }

    #[tokio::test]
    async fn test_parent_listing_failure_is_an_error() {
        let fx = Fixture::new(SyncSettings::default()).await;
        fx.seed_parent("/a", FileStatus::UNUSED).await;
        let derived = fx.derive().await;
        fx.service
            .inject(
                FaultRule::fail(
                    Operation::ListFiles,
                    RemoteError::InvalidArgument("bad condition".into()),
                )
                .for_transformation(fx.parent),
            )
            .await;

        let err = fx.migrator.migrate(derived, true).await.unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Listing { transformation_id, .. } if transformation_id == fx.parent
        ));
    }
}
