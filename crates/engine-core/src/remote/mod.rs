use crate::error::RemoteError;
use async_trait::async_trait;
use model::{
    core::identifiers::{FileId, Lfn, TransformationId},
    files::{record::TransformationFile, status::FileStatus},
    pagination::{
        filter::{FileQuery, TaskQuery, TransformationQuery},
        page::PageRequest,
    },
    tasks::record::TransformationTask,
    transformation::record::{NewTransformation, Transformation},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    time::Duration,
};

pub mod memory;

/// Result of attaching LFNs to a transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFilesOutcome {
    pub added: Vec<Lfn>,
    pub present: Vec<Lfn>,
}

/// Result of marking LFNs deleted across every transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalOutcome {
    /// LFN to the number of transformations it was marked deleted in.
    pub successful: BTreeMap<Lfn, usize>,
    pub failed: BTreeMap<Lfn, String>,
}

impl RemovalOutcome {
    pub fn merge(&mut self, other: RemovalOutcome) {
        self.successful.extend(other.successful);
        self.failed.extend(other.failed);
    }
}

/// The remote transformation service as seen by the client.
///
/// Listing operations must honor `page.limit` strictly: a page shorter than
/// the limit is read as the last one.
#[async_trait]
pub trait TransformationService: Send + Sync {
    async fn get_transformation(&self, id: TransformationId)
    -> Result<Transformation, RemoteError>;

    async fn add_transformation(
        &self,
        request: &NewTransformation,
    ) -> Result<TransformationId, RemoteError>;

    async fn list_transformations(
        &self,
        query: &TransformationQuery,
        page: PageRequest,
    ) -> Result<Vec<Transformation>, RemoteError>;

    async fn list_transformation_files(
        &self,
        query: &FileQuery,
        page: PageRequest,
    ) -> Result<Vec<TransformationFile>, RemoteError>;

    async fn list_transformation_tasks(
        &self,
        query: &TaskQuery,
        page: PageRequest,
    ) -> Result<Vec<TransformationTask>, RemoteError>;

    async fn set_file_status_for_transformation(
        &self,
        id: TransformationId,
        updates: &HashMap<FileId, FileStatus>,
    ) -> Result<(), RemoteError>;

    async fn get_transformation_parameters(
        &self,
        id: TransformationId,
        names: &[String],
    ) -> Result<BTreeMap<String, Value>, RemoteError>;

    async fn set_transformation_parameter(
        &self,
        id: TransformationId,
        name: &str,
        value: &Value,
    ) -> Result<(), RemoteError>;

    async fn add_files_to_transformation(
        &self,
        id: TransformationId,
        lfns: &[Lfn],
    ) -> Result<AddFilesOutcome, RemoteError>;

    async fn clean_transformation(&self, id: TransformationId) -> Result<(), RemoteError>;

    async fn remove_files(&self, lfns: &[Lfn]) -> Result<RemovalOutcome, RemoteError>;
}

/// Bounds a remote call by `limit`. An elapsed call surfaces as
/// [`RemoteError::Timeout`], which the retry classifier treats as transient.
pub async fn timed<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout {
            operation,
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryDisposition;

    #[tokio::test]
    async fn test_timed_maps_elapsed_to_timeout() {
        let result: Result<(), _> = timed("list_files", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { operation: "list_files", .. }));
        assert_eq!(err.disposition(), RetryDisposition::Retry);
    }

    #[tokio::test]
    async fn test_timed_passes_through_results() {
        let value = timed("get", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(value, Ok(7));
    }
}
