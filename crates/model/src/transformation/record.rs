use crate::{
    core::identifiers::TransformationId, transformation::status::TransformationStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the parameter guarded by the transformation status gate.
pub const STATUS_PARAMETER: &str = "Status";

/// Client-side copy of a transformation. The remote service owns the
/// authoritative record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub id: TransformationId,
    pub name: String,
    pub status: TransformationStatus,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub inherited_from: Option<TransformationId>,
    pub creation_date: DateTime<Utc>,
}

impl Transformation {
    /// The parent this transformation was derived from, if any.
    pub fn parent(&self) -> Option<TransformationId> {
        self.inherited_from.filter(|id| id.get() != 0)
    }

    pub fn is_derived(&self) -> bool {
        self.parent().is_some()
    }
}

/// Request payload for registering a transformation with the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransformation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub inherited_from: Option<TransformationId>,
}
