use crate::files::status::ParseStatusError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle status of a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransformationStatus {
    New,
    Active,
    Flush,
    Stopped,
    Completing,
    Completed,
    ValidatingInput,
    ValidatingOutput,
    WaitingIntegrity,
    RemovingFiles,
    RemovedFiles,
    Cleaning,
    TransformationCleaned,
    Archived,
    Deleted,
}

impl TransformationStatus {
    const ALL: [TransformationStatus; 15] = [
        TransformationStatus::New,
        TransformationStatus::Active,
        TransformationStatus::Flush,
        TransformationStatus::Stopped,
        TransformationStatus::Completing,
        TransformationStatus::Completed,
        TransformationStatus::ValidatingInput,
        TransformationStatus::ValidatingOutput,
        TransformationStatus::WaitingIntegrity,
        TransformationStatus::RemovingFiles,
        TransformationStatus::RemovedFiles,
        TransformationStatus::Cleaning,
        TransformationStatus::TransformationCleaned,
        TransformationStatus::Archived,
        TransformationStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationStatus::New => "New",
            TransformationStatus::Active => "Active",
            TransformationStatus::Flush => "Flush",
            TransformationStatus::Stopped => "Stopped",
            TransformationStatus::Completing => "Completing",
            TransformationStatus::Completed => "Completed",
            TransformationStatus::ValidatingInput => "ValidatingInput",
            TransformationStatus::ValidatingOutput => "ValidatingOutput",
            TransformationStatus::WaitingIntegrity => "WaitingIntegrity",
            TransformationStatus::RemovingFiles => "RemovingFiles",
            TransformationStatus::RemovedFiles => "RemovedFiles",
            TransformationStatus::Cleaning => "Cleaning",
            TransformationStatus::TransformationCleaned => "TransformationCleaned",
            TransformationStatus::Archived => "Archived",
            TransformationStatus::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for TransformationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(needle))
            .copied()
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl TryFrom<String> for TransformationStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransformationStatus> for String {
    fn from(status: TransformationStatus) -> Self {
        status.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_round_trips_through_its_name() {
        for status in TransformationStatus::ALL {
            assert_eq!(status.as_str().parse::<TransformationStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "Paused".parse::<TransformationStatus>().unwrap_err();
        assert_eq!(err, ParseStatusError("Paused".to_string()));
    }
}
