use crate::{
    core::identifiers::{Lfn, TransformationId},
    files::{record::TransformationFile, status::FileStatus},
    tasks::record::TransformationTask,
    transformation::{record::Transformation, status::TransformationStatus},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Selection criteria for transformation file listings.
///
/// Empty status lists mean "any status"; `lfns: None` means "any file".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileQuery {
    pub transformation_id: Option<TransformationId>,
    #[serde(default)]
    pub statuses: Vec<FileStatus>,
    #[serde(default)]
    pub lfns: Option<Vec<Lfn>>,
}

impl FileQuery {
    pub fn for_transformation(id: TransformationId) -> Self {
        Self {
            transformation_id: Some(id),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = FileStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_lfns(mut self, lfns: impl IntoIterator<Item = Lfn>) -> Self {
        self.lfns = Some(lfns.into_iter().collect());
        self
    }

    /// Compiles the query into a predicate. LFN lists can be large, so
    /// membership goes through a set.
    pub fn matcher(&self) -> impl Fn(&TransformationFile) -> bool + '_ {
        let lfns: Option<HashSet<&Lfn>> = self.lfns.as_ref().map(|l| l.iter().collect());
        move |file| {
            self.transformation_id
                .is_none_or(|id| id == file.transformation_id)
                && (self.statuses.is_empty() || self.statuses.contains(&file.status))
                && lfns.as_ref().is_none_or(|set| set.contains(&file.lfn))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    pub transformation_id: Option<TransformationId>,
    #[serde(default)]
    pub statuses: Vec<String>,
}

impl TaskQuery {
    pub fn for_transformation(id: TransformationId) -> Self {
        Self {
            transformation_id: Some(id),
            statuses: Vec::new(),
        }
    }

    pub fn matches(&self, task: &TransformationTask) -> bool {
        self.transformation_id
            .is_none_or(|id| id == task.transformation_id)
            && (self.statuses.is_empty()
                || self
                    .statuses
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(&task.status)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationQuery {
    #[serde(default)]
    pub statuses: Vec<TransformationStatus>,
    #[serde(default)]
    pub kind: Option<String>,
}

impl TransformationQuery {
    pub fn matches(&self, transformation: &Transformation) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&transformation.status))
            && self
                .kind
                .as_ref()
                .is_none_or(|kind| kind == &transformation.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::FileId;
    use chrono::Utc;

    fn file(transformation: u64, lfn: &str, status: FileStatus) -> TransformationFile {
        TransformationFile {
            transformation_id: TransformationId::new(transformation),
            lfn: Lfn::from(lfn),
            file_id: FileId::new(1),
            status,
            error_count: 0,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn test_file_query_combines_all_criteria() {
        let query = FileQuery::for_transformation(TransformationId::new(1))
            .with_statuses([FileStatus::UNUSED, FileStatus::MAX_RESET])
            .with_lfns([Lfn::from("/a"), Lfn::from("/b")]);
        let matches = query.matcher();

        assert!(matches(&file(1, "/a", FileStatus::UNUSED)));
        assert!(matches(&file(1, "/b", FileStatus::MAX_RESET)));
        assert!(!matches(&file(2, "/a", FileStatus::UNUSED)));
        assert!(!matches(&file(1, "/c", FileStatus::UNUSED)));
        assert!(!matches(&file(1, "/a", FileStatus::PROCESSED)));
    }

    #[test]
    fn test_empty_file_query_matches_everything() {
        let query = FileQuery::default();
        assert!(query.matcher()(&file(9, "/z", FileStatus::DELETED)));
    }
}
