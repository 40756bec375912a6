use model::{
    core::identifiers::TransformationId, transformation::status::TransformationStatus,
};

/// What a status policy knows about the transformation being updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusContext {
    pub transformation_id: TransformationId,
    pub current: TransformationStatus,
    pub kind: String,
}

/// Decides which status is written when a new one is proposed.
pub trait TransformationStatusPolicy: Send + Sync {
    fn decide(
        &self,
        context: &StatusContext,
        proposed: TransformationStatus,
        force: bool,
    ) -> TransformationStatus;
}

/// Accepts every proposal as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveStatusPolicy;

impl TransformationStatusPolicy for PermissiveStatusPolicy {
    fn decide(
        &self,
        _context: &StatusContext,
        proposed: TransformationStatus,
        _force: bool,
    ) -> TransformationStatus {
        proposed
    }
}
