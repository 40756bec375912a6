use model::{
    core::identifiers::TransformationId,
    files::status::{FileState, FileStatus},
};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// How a parent file reached the derived transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MoveLabel {
    Unused,
    MaxReset,
    #[serde(rename = "Unused from MaxReset")]
    UnusedFromMaxReset,
}

impl MoveLabel {
    /// Labels a derived-side change from the parent's status and the
    /// status the derived file receives.
    pub fn classify(parent_status: FileStatus, target: FileStatus) -> Self {
        if parent_status.is(FileState::Unused) {
            MoveLabel::Unused
        } else if target.is(FileState::Unused) {
            MoveLabel::UnusedFromMaxReset
        } else {
            MoveLabel::MaxReset
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveLabel::Unused => "Unused",
            MoveLabel::MaxReset => "MaxReset",
            MoveLabel::UnusedFromMaxReset => "Unused from MaxReset",
        }
    }
}

impl fmt::Display for MoveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one migration run. Counts cover changes the service
/// committed; files that were already in place are not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub derived: Option<TransformationId>,
    /// `None` when the transformation has no parent.
    pub parent: Option<TransformationId>,
    pub moved: BTreeMap<MoveLabel, usize>,
    /// Derived files promoted to `Processed-inherited` because the parent
    /// finished them.
    pub processed_inherited: usize,
    /// Derived files skipped because they already carry their own status.
    pub anomalies: BTreeMap<FileStatus, usize>,
    /// Parent candidates with no counterpart in the derived transformation.
    pub missing_in_derived: usize,
    /// Files whose parent-side mark could not be committed. They were left
    /// untouched on the derived side.
    pub parent_failures: usize,
    /// Files whose derived-side change failed and whose parent record was
    /// restored.
    pub derived_failures: usize,
    /// Files whose parent record could not be restored after a derived-side
    /// failure.
    pub compensation_failures: usize,
}

impl MigrationReport {
    pub fn for_pair(derived: TransformationId, parent: Option<TransformationId>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            derived: Some(derived),
            parent,
            ..Default::default()
        }
    }

    pub fn total_moved(&self) -> usize {
        self.moved.values().sum()
    }

    pub fn record_move(&mut self, label: MoveLabel, count: usize) {
        if count > 0 {
            *self.moved.entry(label).or_default() += count;
        }
    }

    pub fn record_anomaly(&mut self, status: FileStatus) {
        *self.anomalies.entry(status).or_default() += 1;
    }

    pub fn has_failures(&self) -> bool {
        self.parent_failures > 0 || self.derived_failures > 0 || self.compensation_failures > 0
    }
}
