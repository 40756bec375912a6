use crate::core::identifiers::{Lfn, TaskId, TransformationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work instantiated against files of a transformation.
/// Read-only from the client's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationTask {
    pub transformation_id: TransformationId,
    pub task_id: TaskId,
    pub status: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub input_vector: Vec<Lfn>,
    pub creation_time: DateTime<Utc>,
}
