use crate::{
    error::ClientError,
    fetch::{FetchLimits, PagedFetcher},
    gate::{
        ParameterWrite, PermissiveStatusPolicy, TransformationStatusGate,
        TransformationStatusPolicy,
    },
    migrate::{DerivedMigrator, MigrationReport},
    reconcile::{
        DefaultFileStateMachine, FileStateMachine, FileStatusReconciler, StatusProposal,
        StatusUpdateOutcome,
    },
    retry::call_with_retry,
};
use engine_config::SyncSettings;
use engine_core::{
    metrics::{MetricsSnapshot, SyncMetrics},
    remote::{AddFilesOutcome, RemovalOutcome, TransformationService},
    retry::{RetryError, RetryPolicy},
};
use model::{
    core::identifiers::{Lfn, TransformationId},
    files::record::TransformationFile,
    pagination::filter::{FileQuery, TaskQuery, TransformationQuery},
    tasks::record::TransformationTask,
    transformation::{
        record::{NewTransformation, STATUS_PARAMETER, Transformation},
        status::TransformationStatus,
    },
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Client-side entry point to a remote transformation service.
///
/// Every component shares one [`SyncMetrics`] instance and the settings the
/// client was built with.
pub struct TransformationClient {
    service: Arc<dyn TransformationService>,
    settings: SyncSettings,
    metrics: SyncMetrics,
    fetcher: PagedFetcher,
    reconciler: FileStatusReconciler,
    gate: TransformationStatusGate,
    migrator: DerivedMigrator,
    call_retry: RetryPolicy,
}

impl TransformationClient {
    pub fn new(service: Arc<dyn TransformationService>, settings: SyncSettings) -> Self {
        let machine = Arc::new(DefaultFileStateMachine::new(settings.max_reset_counter));
        Self::with_policies(service, settings, machine, Arc::new(PermissiveStatusPolicy))
    }

    pub fn with_policies(
        service: Arc<dyn TransformationService>,
        settings: SyncSettings,
        machine: Arc<dyn FileStateMachine>,
        policy: Arc<dyn TransformationStatusPolicy>,
    ) -> Self {
        let metrics = SyncMetrics::new();
        let fetcher = PagedFetcher::new(
            settings.page_retry_policy(),
            settings.listing_timeout(),
            metrics.clone(),
        );
        let reconciler = FileStatusReconciler::new(
            service.clone(),
            fetcher.clone(),
            machine,
            &settings,
            metrics.clone(),
        );
        let call_retry = settings.chunk_retry_policy();
        let gate = TransformationStatusGate::new(
            service.clone(),
            policy,
            call_retry.clone(),
            settings.call_timeout(),
        );
        let migrator = DerivedMigrator::new(
            service.clone(),
            fetcher.clone(),
            reconciler.clone(),
            &settings,
            metrics.clone(),
        );

        Self {
            service,
            settings,
            metrics,
            fetcher,
            reconciler,
            gate,
            migrator,
            call_retry,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn get_transformation(
        &self,
        id: TransformationId,
    ) -> Result<Transformation, ClientError> {
        let service = &self.service;
        call_with_retry(
            &self.call_retry,
            "get_transformation",
            self.settings.call_timeout(),
            move || service.get_transformation(id),
        )
        .await
        .map_err(|err| err.into_inner().into())
    }

    pub async fn get_transformations(
        &self,
        query: &TransformationQuery,
    ) -> Result<Vec<Transformation>, ClientError> {
        let service = &self.service;
        let limits = FetchLimits::new(self.settings.transformation_page_size);
        Ok(self
            .fetcher
            .fetch_all(limits, move |page| service.list_transformations(query, page))
            .await?)
    }

    /// Lists matching files starting at `start_offset`, stopping after
    /// `max_files` when given.
    pub async fn get_transformation_files(
        &self,
        query: &FileQuery,
        start_offset: usize,
        max_files: Option<usize>,
    ) -> Result<Vec<TransformationFile>, ClientError> {
        let service = &self.service;
        let limits = FetchLimits::new(self.settings.page_size)
            .starting_at(start_offset)
            .at_most(max_files);
        Ok(self
            .fetcher
            .fetch_all(limits, move |page| service.list_transformation_files(query, page))
            .await?)
    }

    pub async fn get_transformation_tasks(
        &self,
        query: &TaskQuery,
    ) -> Result<Vec<TransformationTask>, ClientError> {
        let service = &self.service;
        let limits = FetchLimits::new(self.settings.page_size);
        Ok(self
            .fetcher
            .fetch_all(limits, move |page| service.list_transformation_tasks(query, page))
            .await?)
    }

    pub async fn set_file_status(
        &self,
        id: TransformationId,
        proposal: impl Into<StatusProposal>,
        force: bool,
    ) -> Result<StatusUpdateOutcome, ClientError> {
        Ok(self.reconciler.set_file_status(id, proposal, force).await?)
    }

    pub async fn set_transformation_parameter(
        &self,
        id: TransformationId,
        name: &str,
        value: Value,
        force: bool,
    ) -> Result<ParameterWrite, ClientError> {
        Ok(self.gate.set_parameter(id, name, value, force).await?)
    }

    pub async fn add_transformation(
        &self,
        request: &NewTransformation,
    ) -> Result<TransformationId, ClientError> {
        let id = self.service.add_transformation(request).await?;
        info!(
            transformation = %id,
            name = %request.name,
            inherited_from = ?request.inherited_from,
            "Transformation added"
        );
        Ok(id)
    }

    pub async fn add_files_to_transformation(
        &self,
        id: TransformationId,
        lfns: &[Lfn],
    ) -> Result<AddFilesOutcome, ClientError> {
        let service = &self.service;
        let outcome = call_with_retry(
            &self.call_retry,
            "add_files",
            self.settings.call_timeout(),
            move || service.add_files_to_transformation(id, lfns),
        )
        .await
        .map_err(RetryError::into_inner)?;
        info!(
            transformation = %id,
            added = outcome.added.len(),
            present = outcome.present.len(),
            "Files added to transformation"
        );
        Ok(outcome)
    }

    /// Drops the transformation's files and tasks remotely, then marks it
    /// `TransformationCleaned`.
    pub async fn clean_transformation(
        &self,
        id: TransformationId,
    ) -> Result<ParameterWrite, ClientError> {
        let service = &self.service;
        call_with_retry(
            &self.call_retry,
            "clean_transformation",
            self.settings.call_timeout(),
            move || service.clean_transformation(id),
        )
        .await
        .map_err(RetryError::into_inner)?;

        let write = self
            .gate
            .set_parameter(
                id,
                STATUS_PARAMETER,
                Value::from(TransformationStatus::TransformationCleaned.as_str()),
                false,
            )
            .await?;
        info!(transformation = %id, "Transformation cleaned");
        Ok(write)
    }

    /// Marks LFNs deleted in every transformation, in chunks. The first chunk
    /// the service refuses ends the operation with its error.
    pub async fn remove_files(&self, lfns: &[Lfn]) -> Result<RemovalOutcome, ClientError> {
        let mut outcome = RemovalOutcome::default();
        let service = &self.service;

        for chunk in lfns.chunks(self.settings.removal_chunk_size.max(1)) {
            let result = call_with_retry(
                &self.call_retry,
                "remove_files",
                self.settings.call_timeout(),
                move || service.remove_files(chunk),
            )
            .await;
            match result {
                Ok(removed) => outcome.merge(removed),
                Err(err) => {
                    let err = err.into_inner();
                    error!(
                        count = chunk.len(),
                        removed_so_far = outcome.successful.len(),
                        error = %err,
                        "File removal failed"
                    );
                    return Err(err.into());
                }
            }
        }
        info!(
            successful = outcome.successful.len(),
            failed = outcome.failed.len(),
            "File removal finished"
        );
        Ok(outcome)
    }

    /// Moves pending parent files to the derived transformation `id`.
    /// `reset_unused` falls back to the configured default.
    pub async fn move_files_to_derived(
        &self,
        id: TransformationId,
        reset_unused: Option<bool>,
    ) -> Result<MigrationReport, ClientError> {
        let reset_unused = reset_unused.unwrap_or(self.settings.reset_unused_on_max_reset);
        Ok(self.migrator.migrate(id, reset_unused).await?)
    }
}
