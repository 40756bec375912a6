use model::{
    core::identifiers::Lfn,
    files::{
        record::{StatusChange, TransformationFile},
        status::{FileState, FileStatus},
    },
};
use std::collections::{BTreeMap, HashMap};

/// Decides the status a file actually receives when a new one is proposed.
pub trait FileStateMachine: Send + Sync {
    fn decide(&self, current: &TransformationFile, proposed: FileStatus) -> FileStatus;
}

/// The service's default file lifecycle rules, applied in order:
///
/// 1. `Processed` is terminal: any proposal away from it keeps `Processed`.
/// 2. `MaxReset` is parked: it stays `MaxReset` whatever is proposed.
/// 3. A file proposed back to `Unused` whose error count is a positive
///    multiple of `max_reset_counter` goes to `MaxReset` instead.
///
/// Inherited statuses are distinct values and never trigger rules 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultFileStateMachine {
    pub max_reset_counter: u32,
}

impl DefaultFileStateMachine {
    pub fn new(max_reset_counter: u32) -> Self {
        Self { max_reset_counter }
    }

    fn reached_reset_limit(&self, error_count: u32) -> bool {
        self.max_reset_counter > 0
            && error_count > 0
            && error_count % self.max_reset_counter == 0
    }
}

impl FileStateMachine for DefaultFileStateMachine {
    fn decide(&self, current: &TransformationFile, proposed: FileStatus) -> FileStatus {
        if current.status.is(FileState::Processed) && !proposed.is(FileState::Processed) {
            FileStatus::PROCESSED
        } else if current.status.is(FileState::MaxReset) {
            FileStatus::MAX_RESET
        } else if proposed.is(FileState::Unused) && self.reached_reset_limit(current.error_count) {
            FileStatus::MAX_RESET
        } else {
            proposed
        }
    }
}

/// Changes to submit for one proposal, plus the LFNs the transformation
/// does not hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPlan {
    pub changes: Vec<StatusChange>,
    pub unknown: Vec<Lfn>,
}

/// Resolves `proposed` against the current records. With `force` every
/// proposal is taken verbatim; either way a file already in its target
/// status produces no change.
pub fn plan_changes(
    machine: &dyn FileStateMachine,
    current: &[TransformationFile],
    proposed: &BTreeMap<Lfn, FileStatus>,
    force: bool,
) -> StatusPlan {
    let by_lfn: HashMap<&Lfn, &TransformationFile> =
        current.iter().map(|file| (&file.lfn, file)).collect();

    let mut plan = StatusPlan::default();
    for (lfn, &status) in proposed {
        let Some(file) = by_lfn.get(lfn) else {
            plan.unknown.push(lfn.clone());
            continue;
        };
        let target = if force {
            status
        } else {
            machine.decide(file, status)
        };
        if target != file.status {
            plan.changes.push(StatusChange {
                lfn: lfn.clone(),
                file_id: file.file_id,
                from: file.status,
                to: target,
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::core::identifiers::{FileId, TransformationId};

    fn file(lfn: &str, status: FileStatus, error_count: u32) -> TransformationFile {
        TransformationFile {
            transformation_id: TransformationId::new(1),
            lfn: Lfn::from(lfn),
            file_id: FileId::new(lfn.len() as u64),
            status,
            error_count,
            last_update: Utc::now(),
        }
    }

    fn machine() -> DefaultFileStateMachine {
        DefaultFileStateMachine::new(10)
    }

    #[test]
    fn test_processed_is_sticky() {
        let current = file("/a", FileStatus::PROCESSED, 0);
        assert_eq!(
            machine().decide(&current, FileStatus::UNUSED),
            FileStatus::PROCESSED
        );
        assert_eq!(
            machine().decide(&current, FileStatus::ASSIGNED),
            FileStatus::PROCESSED
        );
    }

    #[test]
    fn test_max_reset_stays_parked() {
        let current = file("/a", FileStatus::MAX_RESET, 3);
        assert_eq!(
            machine().decide(&current, FileStatus::UNUSED),
            FileStatus::MAX_RESET
        );
        assert_eq!(
            machine().decide(&current, FileStatus::PROCESSED),
            FileStatus::MAX_RESET
        );
    }

    #[test]
    fn test_error_count_multiple_of_limit_parks_file() {
        let m = machine();
        assert_eq!(
            m.decide(&file("/a", FileStatus::ASSIGNED, 20), FileStatus::UNUSED),
            FileStatus::MAX_RESET
        );
        assert_eq!(
            m.decide(&file("/a", FileStatus::ASSIGNED, 15), FileStatus::UNUSED),
            FileStatus::UNUSED
        );
        assert_eq!(
            m.decide(&file("/a", FileStatus::ASSIGNED, 0), FileStatus::UNUSED),
            FileStatus::UNUSED
        );
    }

    #[test]
    fn test_error_count_only_matters_for_unused_proposals() {
        assert_eq!(
            machine().decide(&file("/a", FileStatus::UNUSED, 10), FileStatus::ASSIGNED),
            FileStatus::ASSIGNED
        );
    }

    #[test]
    fn test_inherited_statuses_are_not_terminal() {
        let current = file("/a", FileStatus::inherited(FileState::Processed), 0);
        assert_eq!(
            machine().decide(&current, FileStatus::UNUSED),
            FileStatus::UNUSED
        );
    }

    #[test]
    fn test_plan_skips_noops_and_reports_unknown_lfns() {
        let current = vec![
            file("/a", FileStatus::UNUSED, 0),
            file("/bb", FileStatus::PROCESSED, 0),
            file("/ccc", FileStatus::ASSIGNED, 0),
        ];
        let proposed = BTreeMap::from([
            (Lfn::from("/a"), FileStatus::UNUSED),
            (Lfn::from("/bb"), FileStatus::UNUSED),
            (Lfn::from("/ccc"), FileStatus::PROCESSED),
            (Lfn::from("/missing"), FileStatus::PROCESSED),
        ]);

        let plan = plan_changes(&machine(), &current, &proposed, false);

        assert_eq!(plan.unknown, vec![Lfn::from("/missing")]);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].lfn, Lfn::from("/ccc"));
        assert_eq!(plan.changes[0].from, FileStatus::ASSIGNED);
        assert_eq!(plan.changes[0].to, FileStatus::PROCESSED);
    }

    #[test]
    fn test_force_bypasses_rules() {
        let current = vec![
            file("/a", FileStatus::PROCESSED, 0),
            file("/bb", FileStatus::MAX_RESET, 0),
        ];
        let proposed = BTreeMap::from([
            (Lfn::from("/a"), FileStatus::UNUSED),
            (Lfn::from("/bb"), FileStatus::UNUSED),
        ]);

        let plan = plan_changes(&machine(), &current, &proposed, true);

        let targets: Vec<_> = plan.changes.iter().map(|c| c.to).collect();
        assert_eq!(targets, vec![FileStatus::UNUSED, FileStatus::UNUSED]);
    }

    #[test]
    fn test_plan_is_idempotent_once_applied() {
        let mut current = vec![file("/a", FileStatus::ASSIGNED, 20)];
        let proposed = BTreeMap::from([(Lfn::from("/a"), FileStatus::UNUSED)]);

        let first = plan_changes(&machine(), &current, &proposed, false);
        assert_eq!(first.changes[0].to, FileStatus::MAX_RESET);

        current[0].status = first.changes[0].to;
        let second = plan_changes(&machine(), &current, &proposed, false);
        assert!(second.changes.is_empty());
    }
}
