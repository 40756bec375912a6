use crate::{
    error::{RemoteError, SnapshotError},
    remote::{AddFilesOutcome, RemovalOutcome, TransformationService},
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::identifiers::{FileId, Lfn, TaskId, TransformationId},
    files::{record::TransformationFile, status::FileStatus},
    pagination::{
        filter::{FileQuery, TaskQuery, TransformationQuery},
        page::PageRequest,
    },
    tasks::record::TransformationTask,
    transformation::{
        record::{NewTransformation, STATUS_PARAMETER, Transformation},
        status::TransformationStatus,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::debug;

/// Remote operations, used to target injected faults and to inspect the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetTransformation,
    AddTransformation,
    ListTransformations,
    ListFiles,
    ListTasks,
    SetFileStatus,
    GetParameters,
    SetParameter,
    AddFiles,
    Clean,
    RemoveFiles,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallDetail {
    None,
    Page(PageRequest),
    StatusUpdates(BTreeMap<FileId, FileStatus>),
    Parameter { name: String, value: Value },
    Lfns(Vec<Lfn>),
}

/// One call received by the service, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub operation: Operation,
    pub transformation_id: Option<TransformationId>,
    pub detail: CallDetail,
    pub succeeded: bool,
}

#[derive(Debug, Clone)]
pub enum FaultAction {
    Fail(RemoteError),
    Delay(Duration),
}

/// Makes matching calls misbehave: the first `skip` matches pass through,
/// the following `times` matches trigger `action`.
#[derive(Debug, Clone)]
pub struct FaultRule {
    operation: Operation,
    transformation_id: Option<TransformationId>,
    skip: usize,
    times: usize,
    action: FaultAction,
}

impl FaultRule {
    pub fn fail(operation: Operation, error: RemoteError) -> Self {
        Self {
            operation,
            transformation_id: None,
            skip: 0,
            times: 1,
            action: FaultAction::Fail(error),
        }
    }

    pub fn delay(operation: Operation, by: Duration) -> Self {
        Self {
            operation,
            transformation_id: None,
            skip: 0,
            times: 1,
            action: FaultAction::Delay(by),
        }
    }

    pub fn for_transformation(mut self, id: TransformationId) -> Self {
        self.transformation_id = Some(id);
        self
    }

    pub fn after(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    fn trigger(
        &mut self,
        operation: Operation,
        transformation_id: Option<TransformationId>,
    ) -> Option<FaultAction> {
        if self.operation != operation || self.times == 0 {
            return None;
        }
        if self.transformation_id.is_some() && self.transformation_id != transformation_id {
            return None;
        }
        if self.skip > 0 {
            self.skip -= 1;
            return None;
        }
        self.times -= 1;
        Some(self.action.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationEntry {
    pub transformation: Transformation,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub files: Vec<TransformationFile>,
    #[serde(default)]
    pub tasks: Vec<TransformationTask>,
}

/// Serializable state of the in-memory service. Files keep their
/// insertion order, which is the order listings page through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    #[serde(default)]
    pub transformations: Vec<TransformationEntry>,
    #[serde(default)]
    catalog: BTreeMap<Lfn, FileId>,
    #[serde(default)]
    next_file_id: u64,
    #[serde(default)]
    next_task_id: u64,
}

impl ServiceSnapshot {
    /// Rebuilds the LFN catalog and id counters from the records, so
    /// hand-edited snapshots stay consistent.
    fn normalize(mut self) -> Self {
        self.transformations.sort_by_key(|e| e.transformation.id);
        for entry in &self.transformations {
            for file in &entry.files {
                self.catalog.entry(file.lfn.clone()).or_insert(file.file_id);
                self.next_file_id = self.next_file_id.max(file.file_id.get());
            }
            for task in &entry.tasks {
                self.next_task_id = self.next_task_id.max(task.task_id.get());
            }
        }
        self
    }

    fn entry(&self, id: TransformationId) -> Result<&TransformationEntry, RemoteError> {
        self.transformations
            .iter()
            .find(|e| e.transformation.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("transformation {id}")))
    }

    fn entry_mut(&mut self, id: TransformationId) -> Result<&mut TransformationEntry, RemoteError> {
        self.transformations
            .iter_mut()
            .find(|e| e.transformation.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("transformation {id}")))
    }

    fn file_id_for(&mut self, lfn: &Lfn) -> FileId {
        if let Some(id) = self.catalog.get(lfn) {
            return *id;
        }
        self.next_file_id += 1;
        let id = FileId::new(self.next_file_id);
        self.catalog.insert(lfn.clone(), id);
        id
    }

    fn next_transformation_id(&self) -> TransformationId {
        let max = self
            .transformations
            .iter()
            .map(|e| e.transformation.id.get())
            .max()
            .unwrap_or(0);
        TransformationId::new(max + 1)
    }

    fn add_transformation(
        &mut self,
        request: &NewTransformation,
    ) -> Result<TransformationId, RemoteError> {
        if request.name.trim().is_empty() {
            return Err(RemoteError::InvalidArgument(
                "transformation name must not be empty".to_string(),
            ));
        }
        if self
            .transformations
            .iter()
            .any(|e| e.transformation.name == request.name)
        {
            return Err(RemoteError::Rejected(format!(
                "transformation '{}' already exists",
                request.name
            )));
        }

        let parent = request.inherited_from.filter(|id| id.get() != 0);
        let id = self.next_transformation_id();
        let now = Utc::now();

        // A derived transformation starts with its parent's files, each
        // marked as inherited and with no processing failures of its own.
        let files = match parent {
            Some(parent_id) => self
                .entry(parent_id)?
                .files
                .iter()
                .map(|f| TransformationFile {
                    transformation_id: id,
                    status: f.status.as_inherited(),
                    error_count: 0,
                    last_update: now,
                    ..f.clone()
                })
                .collect(),
            None => Vec::new(),
        };

        self.transformations.push(TransformationEntry {
            transformation: Transformation {
                id,
                name: request.name.clone(),
                status: TransformationStatus::New,
                kind: request.kind.clone(),
                inherited_from: parent,
                creation_date: now,
            },
            parameters: BTreeMap::new(),
            files,
            tasks: Vec::new(),
        });
        Ok(id)
    }

    fn set_file_status(
        &mut self,
        id: TransformationId,
        updates: &HashMap<FileId, FileStatus>,
    ) -> Result<(), RemoteError> {
        let entry = self.entry_mut(id)?;
        let attached: HashSet<FileId> = entry.files.iter().map(|f| f.file_id).collect();
        if let Some(unknown) = updates.keys().find(|fid| !attached.contains(fid)) {
            return Err(RemoteError::InvalidArgument(format!(
                "file {unknown} is not attached to transformation {id}"
            )));
        }

        let now = Utc::now();
        for file in entry.files.iter_mut() {
            if let Some(status) = updates.get(&file.file_id) {
                file.status = *status;
                file.last_update = now;
            }
        }
        Ok(())
    }

    fn get_parameters(
        &self,
        id: TransformationId,
        names: &[String],
    ) -> Result<BTreeMap<String, Value>, RemoteError> {
        let entry = self.entry(id)?;
        let t = &entry.transformation;
        let mut values = BTreeMap::new();

        for name in names {
            let value = match name.to_ascii_lowercase().as_str() {
                "status" => Value::from(t.status.as_str()),
                "type" => Value::from(t.kind.clone()),
                "transformationname" => Value::from(t.name.clone()),
                "inheritedfrom" => Value::from(t.parent().map(|p| p.get()).unwrap_or(0)),
                "creationdate" => Value::from(t.creation_date.to_rfc3339()),
                _ => entry.parameters.get(name).cloned().ok_or_else(|| {
                    RemoteError::NotFound(format!("parameter '{name}' of transformation {id}"))
                })?,
            };
            values.insert(name.clone(), value);
        }
        Ok(values)
    }

    fn set_parameter(
        &mut self,
        id: TransformationId,
        name: &str,
        value: &Value,
    ) -> Result<(), RemoteError> {
        let entry = self.entry_mut(id)?;
        match name.to_ascii_lowercase().as_str() {
            "status" => {
                let status = value
                    .as_str()
                    .and_then(|s| s.parse::<TransformationStatus>().ok())
                    .ok_or_else(|| {
                        RemoteError::InvalidArgument(format!(
                            "'{value}' is not a valid {STATUS_PARAMETER}"
                        ))
                    })?;
                entry.transformation.status = status;
            }
            "type" => {
                entry.transformation.kind = value
                    .as_str()
                    .ok_or_else(|| RemoteError::InvalidArgument("Type must be a string".into()))?
                    .to_string();
            }
            "transformationname" | "inheritedfrom" | "creationdate" => {
                return Err(RemoteError::Rejected(format!(
                    "parameter '{name}' is immutable"
                )));
            }
            _ => {
                entry.parameters.insert(name.to_string(), value.clone());
            }
        }
        Ok(())
    }

    fn add_files(
        &mut self,
        id: TransformationId,
        lfns: &[Lfn],
    ) -> Result<AddFilesOutcome, RemoteError> {
        let mut attached: HashSet<Lfn> =
            self.entry(id)?.files.iter().map(|f| f.lfn.clone()).collect();
        let mut outcome = AddFilesOutcome::default();
        for lfn in lfns {
            if !attached.insert(lfn.clone()) {
                outcome.present.push(lfn.clone());
                continue;
            }
            let file_id = self.file_id_for(lfn);
            let entry = self.entry_mut(id)?;
            entry.files.push(TransformationFile {
                transformation_id: id,
                lfn: lfn.clone(),
                file_id,
                status: FileStatus::UNUSED,
                error_count: 0,
                last_update: Utc::now(),
            });
            outcome.added.push(lfn.clone());
        }
        Ok(outcome)
    }

    fn remove_files(&mut self, lfns: &[Lfn]) -> RemovalOutcome {
        let mut outcome = RemovalOutcome::default();
        let now = Utc::now();
        for lfn in lfns {
            let mut touched = 0;
            for entry in self.transformations.iter_mut() {
                if let Some(file) = entry.files.iter_mut().find(|f| &f.lfn == lfn) {
                    file.status = FileStatus::DELETED;
                    file.last_update = now;
                    touched += 1;
                }
            }
            if touched == 0 {
                outcome.failed.insert(
                    lfn.clone(),
                    "not attached to any transformation".to_string(),
                );
            } else {
                outcome.successful.insert(lfn.clone(), touched);
            }
        }
        outcome
    }
}

/// A complete transformation service held in memory.
///
/// Backs the command-line tool (through JSON snapshots) and doubles as the
/// remote used by tests, with a call log and injectable faults.
#[derive(Debug, Default)]
pub struct InMemoryTransformationService {
    state: Mutex<ServiceSnapshot>,
    faults: Mutex<Vec<FaultRule>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl InMemoryTransformationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ServiceSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot.normalize()),
            ..Default::default()
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let snapshot: ServiceSnapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(&*self.state.lock().await)?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }

    pub async fn snapshot(&self) -> ServiceSnapshot {
        self.state.lock().await.clone()
    }

    pub async fn inject(&self, rule: FaultRule) {
        self.faults.lock().await.push(rule);
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Status submissions the service accepted, in order.
    pub async fn accepted_status_updates(
        &self,
    ) -> Vec<(TransformationId, BTreeMap<FileId, FileStatus>)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.succeeded && c.operation == Operation::SetFileStatus)
            .filter_map(|c| match (&c.detail, c.transformation_id) {
                (CallDetail::StatusUpdates(updates), Some(id)) => Some((id, updates.clone())),
                _ => None,
            })
            .collect()
    }

    /// Inserts or overwrites a file record directly, bypassing the
    /// client-facing operations. Used to stage service state.
    pub async fn seed_file(
        &self,
        id: TransformationId,
        lfn: impl Into<Lfn>,
        status: FileStatus,
        error_count: u32,
    ) -> Result<FileId, RemoteError> {
        let lfn = lfn.into();
        let mut state = self.state.lock().await;
        let file_id = state.file_id_for(&lfn);
        let entry = state.entry_mut(id)?;
        let record = TransformationFile {
            transformation_id: id,
            lfn: lfn.clone(),
            file_id,
            status,
            error_count,
            last_update: Utc::now(),
        };
        match entry.files.iter_mut().find(|f| f.lfn == lfn) {
            Some(existing) => *existing = record,
            None => entry.files.push(record),
        }
        Ok(file_id)
    }

    /// Simulates a failed processing attempt reported by a worker.
    pub async fn record_processing_failure(
        &self,
        id: TransformationId,
        lfn: &Lfn,
    ) -> Result<u32, RemoteError> {
        let mut state = self.state.lock().await;
        let file = state
            .entry_mut(id)?
            .files
            .iter_mut()
            .find(|f| &f.lfn == lfn)
            .ok_or_else(|| RemoteError::NotFound(format!("{lfn} in transformation {id}")))?;
        file.error_count += 1;
        Ok(file.error_count)
    }

    pub async fn add_task(
        &self,
        id: TransformationId,
        status: &str,
        input_vector: Vec<Lfn>,
    ) -> Result<TaskId, RemoteError> {
        let mut state = self.state.lock().await;
        state.next_task_id += 1;
        let task_id = TaskId::new(state.next_task_id);
        state.entry_mut(id)?.tasks.push(TransformationTask {
            transformation_id: id,
            task_id,
            status: status.to_string(),
            external_id: None,
            input_vector,
            creation_time: Utc::now(),
        });
        Ok(task_id)
    }

    pub async fn file(&self, id: TransformationId, lfn: &Lfn) -> Option<TransformationFile> {
        let state = self.state.lock().await;
        state
            .entry(id)
            .ok()
            .and_then(|e| e.files.iter().find(|f| &f.lfn == lfn).cloned())
    }

    async fn call<T>(
        &self,
        operation: Operation,
        transformation_id: Option<TransformationId>,
        detail: CallDetail,
        body: impl FnOnce(&mut ServiceSnapshot) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let fault = self
            .faults
            .lock()
            .await
            .iter_mut()
            .find_map(|rule| rule.trigger(operation, transformation_id));

        let result = match fault {
            Some(FaultAction::Fail(err)) => Err(err),
            Some(FaultAction::Delay(by)) => {
                tokio::time::sleep(by).await;
                body(&mut *self.state.lock().await)
            }
            None => body(&mut *self.state.lock().await),
        };

        debug!(
            ?operation,
            transformation_id = transformation_id.map(|id| id.get()),
            succeeded = result.is_ok(),
            "In-memory service call"
        );
        self.calls.lock().await.push(RemoteCall {
            operation,
            transformation_id,
            detail,
            succeeded: result.is_ok(),
        });
        result
    }
}

#[async_trait]
impl TransformationService for InMemoryTransformationService {
    async fn get_transformation(
        &self,
        id: TransformationId,
    ) -> Result<Transformation, RemoteError> {
        self.call(Operation::GetTransformation, Some(id), CallDetail::None, |s| {
            s.entry(id).map(|e| e.transformation.clone())
        })
        .await
    }

    async fn add_transformation(
        &self,
        request: &NewTransformation,
    ) -> Result<TransformationId, RemoteError> {
        self.call(
            Operation::AddTransformation,
            request.inherited_from,
            CallDetail::None,
            |s| s.add_transformation(request),
        )
        .await
    }

    async fn list_transformations(
        &self,
        query: &TransformationQuery,
        page: PageRequest,
    ) -> Result<Vec<Transformation>, RemoteError> {
        self.call(
            Operation::ListTransformations,
            None,
            CallDetail::Page(page),
            |s| {
                let matching: Vec<Transformation> = s
                    .transformations
                    .iter()
                    .map(|e| &e.transformation)
                    .filter(|t| query.matches(t))
                    .cloned()
                    .collect();
                Ok(page.window(&matching).to_vec())
            },
        )
        .await
    }

    async fn list_transformation_files(
        &self,
        query: &FileQuery,
        page: PageRequest,
    ) -> Result<Vec<TransformationFile>, RemoteError> {
        self.call(
            Operation::ListFiles,
            query.transformation_id,
            CallDetail::Page(page),
            |s| {
                let matches = query.matcher();
                let matching: Vec<&TransformationFile> = s
                    .transformations
                    .iter()
                    .flat_map(|e| e.files.iter())
                    .filter(|f| matches(f))
                    .collect();
                Ok(page.window(&matching).iter().map(|f| (*f).clone()).collect())
            },
        )
        .await
    }

    async fn list_transformation_tasks(
        &self,
        query: &TaskQuery,
        page: PageRequest,
    ) -> Result<Vec<TransformationTask>, RemoteError> {
        self.call(
            Operation::ListTasks,
            query.transformation_id,
            CallDetail::Page(page),
            |s| {
                let matching: Vec<&TransformationTask> = s
                    .transformations
                    .iter()
                    .flat_map(|e| e.tasks.iter())
                    .filter(|t| query.matches(t))
                    .collect();
                Ok(page.window(&matching).iter().map(|t| (*t).clone()).collect())
            },
        )
        .await
    }

    async fn set_file_status_for_transformation(
        &self,
        id: TransformationId,
        updates: &HashMap<FileId, FileStatus>,
    ) -> Result<(), RemoteError> {
        let detail = CallDetail::StatusUpdates(updates.iter().map(|(k, v)| (*k, *v)).collect());
        self.call(Operation::SetFileStatus, Some(id), detail, |s| {
            s.set_file_status(id, updates)
        })
        .await
    }

    async fn get_transformation_parameters(
        &self,
        id: TransformationId,
        names: &[String],
    ) -> Result<BTreeMap<String, Value>, RemoteError> {
        self.call(Operation::GetParameters, Some(id), CallDetail::None, |s| {
            s.get_parameters(id, names)
        })
        .await
    }

    async fn set_transformation_parameter(
        &self,
        id: TransformationId,
        name: &str,
        value: &Value,
    ) -> Result<(), RemoteError> {
        let detail = CallDetail::Parameter {
            name: name.to_string(),
            value: value.clone(),
        };
        self.call(Operation::SetParameter, Some(id), detail, |s| {
            s.set_parameter(id, name, value)
        })
        .await
    }

    async fn add_files_to_transformation(
        &self,
        id: TransformationId,
        lfns: &[Lfn],
    ) -> Result<AddFilesOutcome, RemoteError> {
        self.call(
            Operation::AddFiles,
            Some(id),
            CallDetail::Lfns(lfns.to_vec()),
            |s| s.add_files(id, lfns),
        )
        .await
    }

    async fn clean_transformation(&self, id: TransformationId) -> Result<(), RemoteError> {
        self.call(Operation::Clean, Some(id), CallDetail::None, |s| {
            let entry = s.entry_mut(id)?;
            entry.files.clear();
            entry.tasks.clear();
            Ok(())
        })
        .await
    }

    async fn remove_files(&self, lfns: &[Lfn]) -> Result<RemovalOutcome, RemoteError> {
        self.call(
            Operation::RemoveFiles,
            None,
            CallDetail::Lfns(lfns.to_vec()),
            |s| Ok(s.remove_files(lfns)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::files::status::FileState;
    use tempfile::tempdir;

    async fn service_with_parent() -> (InMemoryTransformationService, TransformationId) {
        let service = InMemoryTransformationService::new();
        let parent = service
            .add_transformation(&NewTransformation {
                name: "simulation".to_string(),
                kind: "MCSimulation".to_string(),
                inherited_from: None,
            })
            .await
            .unwrap();
        (service, parent)
    }

    #[tokio::test]
    async fn test_derived_transformation_inherits_files() {
        let (service, parent) = service_with_parent().await;
        service
            .seed_file(parent, "/a", FileStatus::UNUSED, 3)
            .await
            .unwrap();
        service
            .seed_file(parent, "/b", FileStatus::PROCESSED, 0)
            .await
            .unwrap();

        let derived = service
            .add_transformation(&NewTransformation {
                name: "simulation-v2".to_string(),
                kind: "MCSimulation".to_string(),
                inherited_from: Some(parent),
            })
            .await
            .unwrap();

        let a = service.file(derived, &Lfn::from("/a")).await.unwrap();
        assert_eq!(a.status, FileStatus::inherited(FileState::Unused));
        // Failures recorded against the parent do not carry over.
        assert_eq!(a.error_count, 0);
        let b = service.file(derived, &Lfn::from("/b")).await.unwrap();
        assert_eq!(b.status, FileStatus::inherited(FileState::Processed));

        // The same LFN keeps its file id across transformations.
        let parent_a = service.file(parent, &Lfn::from("/a")).await.unwrap();
        assert_eq!(parent_a.file_id, a.file_id);
    }

    #[tokio::test]
    async fn test_listing_honors_page_window() {
        let (service, parent) = service_with_parent().await;
        for i in 0..5 {
            service
                .seed_file(parent, format!("/f{i}"), FileStatus::UNUSED, 0)
                .await
                .unwrap();
        }

        let query = FileQuery::for_transformation(parent);
        let page = service
            .list_transformation_files(&query, PageRequest::new(2, 4))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].lfn, Lfn::from("/f4"));
    }

    #[tokio::test]
    async fn test_fault_rule_skips_then_fails() {
        let (service, parent) = service_with_parent().await;
        service
            .inject(
                FaultRule::fail(Operation::GetTransformation, RemoteError::Unavailable("down".into()))
                    .after(1)
                    .times(1),
            )
            .await;

        assert!(service.get_transformation(parent).await.is_ok());
        assert!(service.get_transformation(parent).await.is_err());
        assert!(service.get_transformation(parent).await.is_ok());

        let failed = service.calls().await.iter().filter(|c| !c.succeeded).count();
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_file_id_rejects_whole_update() {
        let (service, parent) = service_with_parent().await;
        let known = service
            .seed_file(parent, "/a", FileStatus::UNUSED, 0)
            .await
            .unwrap();

        let updates = HashMap::from([
            (known, FileStatus::ASSIGNED),
            (FileId::new(999), FileStatus::ASSIGNED),
        ]);
        let err = service
            .set_file_status_for_transformation(parent, &updates)
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::InvalidArgument(_)));
        let file = service.file(parent, &Lfn::from("/a")).await.unwrap();
        assert_eq!(file.status, FileStatus::UNUSED);
    }

    #[tokio::test]
    async fn test_status_parameter_is_validated() {
        let (service, parent) = service_with_parent().await;

        let err = service
            .set_transformation_parameter(parent, "Status", &Value::from("Sleeping"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidArgument(_)));

        service
            .set_transformation_parameter(parent, "Status", &Value::from("Active"))
            .await
            .unwrap();
        let params = service
            .get_transformation_parameters(parent, &["Status".to_string()])
            .await
            .unwrap();
        assert_eq!(params["Status"], Value::from("Active"));
    }

    #[tokio::test]
    async fn test_snapshot_survives_a_round_trip_on_disk() {
        let (service, parent) = service_with_parent().await;
        service
            .seed_file(parent, "/a", FileStatus::MAX_RESET, 10)
            .await
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        service.save(&path).await.unwrap();

        let restored = InMemoryTransformationService::load(&path).await.unwrap();
        let file = restored.file(parent, &Lfn::from("/a")).await.unwrap();
        assert_eq!(file.status, FileStatus::MAX_RESET);
        assert_eq!(file.error_count, 10);

        // Fresh LFNs still get ids that do not collide with restored ones.
        let outcome = restored
            .add_files_to_transformation(parent, &[Lfn::from("/b")])
            .await
            .unwrap();
        assert_eq!(outcome.added, vec![Lfn::from("/b")]);
        let b = restored.file(parent, &Lfn::from("/b")).await.unwrap();
        assert_ne!(b.file_id, file.file_id);
    }

    #[tokio::test]
    async fn test_remove_files_marks_every_transformation() {
        let (service, parent) = service_with_parent().await;
        service
            .seed_file(parent, "/a", FileStatus::UNUSED, 0)
            .await
            .unwrap();
        service
            .add_transformation(&NewTransformation {
                name: "derived".to_string(),
                kind: "MCSimulation".to_string(),
                inherited_from: Some(parent),
            })
            .await
            .unwrap();

        let outcome = service
            .remove_files(&[Lfn::from("/a"), Lfn::from("/missing")])
            .await
            .unwrap();

        assert_eq!(outcome.successful.get(&Lfn::from("/a")), Some(&2));
        assert!(outcome.failed.contains_key(&Lfn::from("/missing")));
    }
}
