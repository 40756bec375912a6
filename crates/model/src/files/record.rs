use crate::{
    core::identifiers::{FileId, Lfn, TransformationId},
    files::status::FileStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file attached to a transformation, as reported by the remote service.
///
/// `error_count` is maintained remotely; clients only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationFile {
    pub transformation_id: TransformationId,
    pub lfn: Lfn,
    pub file_id: FileId,
    pub status: FileStatus,
    #[serde(default)]
    pub error_count: u32,
    pub last_update: DateTime<Utc>,
}

/// A status transition decided for one file, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub lfn: Lfn,
    pub file_id: FileId,
    pub from: FileStatus,
    pub to: FileStatus,
}
