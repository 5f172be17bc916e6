use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::EmptyIdentifier(stringify!($name)));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

identifier!(
    /// Lottery bucket of jobs; the lottery always runs per group.
    GroupId
);
identifier!(JobId);
identifier!(
    /// Youth profile identifier. One applicant may hold several applications in a group.
    ApplicantId
);
identifier!(ApplicationId);
identifier!(
    /// The user who triggered a run.
    ActorId
);
identifier!(RunId);

/// Value construction failures for the lottery domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
    #[error("applicant {0} appears more than once")]
    DuplicateApplicant(ApplicantId),
    #[error("job {0} appears more than once")]
    DuplicateJob(JobId),
}

/// Lottery configuration for a bucket of jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default = "default_min_age")]
    pub min_age: u32,
    #[serde(default = "default_max_age")]
    pub max_age: u32,
}

fn default_min_age() -> u32 {
    15
}

fn default_max_age() -> u32 {
    19
}

/// Publication state of a job listing; only published jobs enter the lottery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Draft,
    Published,
    Archived,
}

/// Job listing as seen by the lottery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub group_id: GroupId,
    #[serde(default)]
    pub title: String,
    pub total_spots: u32,
    pub status: JobStatus,
    /// Raw grade codes as stored upstream; unknown codes are ignored by the filter.
    #[serde(default)]
    pub min_grade: Option<String>,
    #[serde(default)]
    pub max_grade: Option<String>,
}

/// Biographical attributes used by the eligibility filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub id: ApplicantId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub grade: Option<String>,
}

/// Lifecycle of a single application. The lottery writes only `Offered`, `Rejected` and
/// `Reserve`; `Pending` is its precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Lottery,
    Offered,
    Accepted,
    Rejected,
    Reserve,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Lottery => "entered lottery",
            Self::Offered => "offered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Reserve => "reserve list",
        }
    }

    /// Applications still open to a lottery decision.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Lottery)
    }
}

/// Application record supplied by the surrounding record-management system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub applicant_id: ApplicantId,
    pub job_id: JobId,
    pub status: ApplicationStatus,
    /// 1 is the applicant's first choice; `None` when the applicant never ranked it.
    #[serde(default)]
    pub priority_rank: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_reject_blank_values() {
        assert_eq!(
            JobId::new("  "),
            Err(DomainError::EmptyIdentifier("JobId"))
        );
        assert_eq!(JobId::new("job-1").expect("valid").as_str(), "job-1");
    }

    #[test]
    fn identifiers_validate_during_deserialization() {
        let parsed: Result<ApplicantId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());

        let parsed: ApplicantId = serde_json::from_str("\"youth-7\"").expect("valid id");
        assert_eq!(parsed.to_string(), "youth-7");
    }

    #[test]
    fn group_age_bounds_default_when_missing() {
        let group: JobGroup =
            serde_json::from_str(r#"{"id":"g-1","name":"Outdoor"}"#).expect("group parses");
        assert_eq!((group.min_age, group.max_age), (15, 19));
    }

    #[test]
    fn statuses_use_upper_case_wire_names() {
        let encoded = serde_json::to_string(&ApplicationStatus::Reserve).expect("encodes");
        assert_eq!(encoded, "\"RESERVE\"");
        assert!(ApplicationStatus::Lottery.is_open());
        assert!(!ApplicationStatus::Offered.is_open());
    }
}
