#![allow(dead_code)]

use engine_core::remote::memory::{InMemoryTransformationService, Operation};
use engine_processing::client::TransformationClient;
use model::{
    core::identifiers::{Lfn, TransformationId},
    files::status::FileStatus,
    transformation::record::NewTransformation,
};

pub fn lfns(prefix: &str, count: usize) -> Vec<Lfn> {
    (0..count)
        .map(|i| Lfn::new(format!("{prefix}/{i:06}.dst")))
        .collect()
}

pub async fn create_transformation(client: &TransformationClient, name: &str) -> TransformationId {
    client
        .add_transformation(&NewTransformation {
            name: name.to_string(),
            kind: "DataReconstruction".to_string(),
            inherited_from: None,
        })
        .await
        .expect("create transformation")
}

/// Creates a transformation derived from `parent`; it starts with the
/// parent's files under inherited statuses.
pub async fn derive_transformation(
    client: &TransformationClient,
    parent: TransformationId,
    name: &str,
) -> TransformationId {
    client
        .add_transformation(&NewTransformation {
            name: name.to_string(),
            kind: "DataReconstruction".to_string(),
            inherited_from: Some(parent),
        })
        .await
        .expect("derive transformation")
}

pub async fn seed_files(
    service: &InMemoryTransformationService,
    id: TransformationId,
    files: &[(&str, FileStatus)],
) {
    for (lfn, status) in files {
        service
            .seed_file(id, *lfn, *status, 0)
            .await
            .expect("seed file");
    }
}

pub async fn status_of(
    service: &InMemoryTransformationService,
    id: TransformationId,
    lfn: &str,
) -> FileStatus {
    service
        .file(id, &Lfn::from(lfn))
        .await
        .unwrap_or_else(|| panic!("{lfn} is not attached to transformation {id}"))
        .status
}

pub async fn assert_status(
    service: &InMemoryTransformationService,
    id: TransformationId,
    lfn: &str,
    expected: FileStatus,
) {
    let actual = status_of(service, id, lfn).await;
    assert_eq!(
        actual, expected,
        "unexpected status for {lfn} in transformation {id}"
    );
}

pub async fn count_calls(service: &InMemoryTransformationService, operation: Operation) -> usize {
    service
        .calls()
        .await
        .iter()
        .filter(|c| c.operation == operation)
        .count()
}

/// Number of individual file status changes the service accepted.
pub async fn accepted_changes(service: &InMemoryTransformationService) -> usize {
    service
        .accepted_status_updates()
        .await
        .iter()
        .map(|(_, updates)| updates.len())
        .sum()
}
