use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

const INHERITED_SUFFIX: &str = "-inherited";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status '{0}'")]
pub struct ParseStatusError(pub String);

/// Processing state of a file within one transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileState {
    Unused,
    Assigned,
    Processed,
    Problematic,
    MaxReset,
    NotProcessed,
    Moved,
    Removed,
    Deleted,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Unused => "Unused",
            FileState::Assigned => "Assigned",
            FileState::Processed => "Processed",
            FileState::Problematic => "Problematic",
            FileState::MaxReset => "MaxReset",
            FileState::NotProcessed => "NotProcessed",
            FileState::Moved => "Moved",
            FileState::Removed => "Removed",
            FileState::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileState {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The service has historically been lenient on case.
        let state = match s.to_ascii_lowercase().as_str() {
            "unused" => FileState::Unused,
            "assigned" => FileState::Assigned,
            "processed" => FileState::Processed,
            "problematic" => FileState::Problematic,
            "maxreset" => FileState::MaxReset,
            "notprocessed" => FileState::NotProcessed,
            "moved" => FileState::Moved,
            "removed" => FileState::Removed,
            "deleted" => FileState::Deleted,
            _ => return Err(ParseStatusError(s.to_string())),
        };
        Ok(state)
    }
}

/// Status of a transformation file: a base state, optionally marked as
/// carried over from the parent of a derived transformation
/// (rendered with the `-inherited` suffix, e.g. `Unused-inherited`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileStatus {
    state: FileState,
    inherited: bool,
}

impl FileStatus {
    pub const UNUSED: FileStatus = FileStatus::new(FileState::Unused);
    pub const ASSIGNED: FileStatus = FileStatus::new(FileState::Assigned);
    pub const PROCESSED: FileStatus = FileStatus::new(FileState::Processed);
    pub const MAX_RESET: FileStatus = FileStatus::new(FileState::MaxReset);
    pub const NOT_PROCESSED: FileStatus = FileStatus::new(FileState::NotProcessed);
    pub const MOVED: FileStatus = FileStatus::new(FileState::Moved);
    pub const DELETED: FileStatus = FileStatus::new(FileState::Deleted);

    pub const fn new(state: FileState) -> Self {
        Self {
            state,
            inherited: false,
        }
    }

    pub const fn inherited(state: FileState) -> Self {
        Self {
            state,
            inherited: true,
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Same state with the inherited marker set.
    pub fn as_inherited(&self) -> Self {
        Self::inherited(self.state)
    }

    /// Same state with the inherited marker cleared.
    pub fn as_local(&self) -> Self {
        Self::new(self.state)
    }

    /// True when this is exactly the given local (non-inherited) state.
    pub fn is(&self, state: FileState) -> bool {
        !self.inherited && self.state == state
    }
}

impl From<FileState> for FileStatus {
    fn from(state: FileState) -> Self {
        FileStatus::new(state)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inherited {
            write!(f, "{}{}", self.state, INHERITED_SUFFIX)
        } else {
            write!(f, "{}", self.state)
        }
    }
}

impl FromStr for FileStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.strip_suffix(INHERITED_SUFFIX) {
            Some(base) => base
                .parse::<FileState>()
                .map(FileStatus::inherited)
                .map_err(|_| ParseStatusError(s.to_string())),
            None => trimmed.parse::<FileState>().map(FileStatus::new),
        }
    }
}

impl TryFrom<String> for FileStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileStatus> for String {
    fn from(status: FileStatus) -> Self {
        status.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inherited_suffix() {
        let status: FileStatus = "Assigned-inherited".parse().unwrap();
        assert_eq!(status, FileStatus::inherited(FileState::Assigned));
        assert!(status.is_inherited());
        assert_eq!(status.to_string(), "Assigned-inherited");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "maxreset".parse::<FileStatus>().unwrap(),
            FileStatus::MAX_RESET
        );
        assert_eq!(
            "UNUSED".parse::<FileStatus>().unwrap(),
            FileStatus::UNUSED
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("Waiting".parse::<FileStatus>().is_err());
        assert!("-inherited".parse::<FileStatus>().is_err());
    }

    #[test]
    fn test_is_only_matches_local_state() {
        let inherited = FileStatus::inherited(FileState::MaxReset);
        assert!(!inherited.is(FileState::MaxReset));
        assert!(inherited.as_local().is(FileState::MaxReset));
    }

    #[test]
    fn test_serde_uses_display_form() {
        let json = serde_json::to_string(&FileStatus::inherited(FileState::Unused)).unwrap();
        assert_eq!(json, "\"Unused-inherited\"");
        let back: FileStatus = serde_json::from_str("\"Processed\"").unwrap();
        assert_eq!(back, FileStatus::PROCESSED);
    }
}
