use serde::Serialize;

use super::domain::{ApplicantId, ApplicationStatus, JobId};
use super::engine::MatchResult;

/// One status write applied inside the run's unit of work, keyed by applicant and job
/// rather than by application id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusChange {
    /// The won application becomes `Offered`.
    Offer { applicant: ApplicantId, job: JobId },
    /// Every other open application of the winner in the group becomes `Rejected`.
    RejectOthers { applicant: ApplicantId, keep: JobId },
    /// Every open application of an unmatched applicant in the group becomes `Reserve`.
    Reserve { applicant: ApplicantId },
}

impl StatusChange {
    pub fn applicant(&self) -> &ApplicantId {
        match self {
            Self::Offer { applicant, .. }
            | Self::RejectOthers { applicant, .. }
            | Self::Reserve { applicant } => applicant,
        }
    }

    /// New status for an application of this change's applicant, or `None` when the
    /// change leaves it alone. Only open (pending or lottery) applications move.
    pub fn target_status(&self, job: &JobId, current: ApplicationStatus) -> Option<ApplicationStatus> {
        match self {
            Self::Offer { job: won, .. } if won == job && current.is_open() => {
                Some(ApplicationStatus::Offered)
            }
            Self::Offer { .. } => None,
            Self::RejectOthers { keep, .. } if keep != job && current.is_open() => {
                Some(ApplicationStatus::Rejected)
            }
            Self::RejectOthers { .. } => None,
            Self::Reserve { .. } if current.is_open() => Some(ApplicationStatus::Reserve),
            Self::Reserve { .. } => None,
        }
    }
}

/// Ordered status writes derived from a match result: offers first, each followed by the
/// rejection of the winner's other applications, then the reserves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    pub changes: Vec<StatusChange>,
}

impl TransitionPlan {
    pub fn from_result(result: &MatchResult) -> Self {
        let mut changes = Vec::with_capacity(result.matches.len() * 2 + result.reserves.len());

        for (applicant, job) in &result.matches {
            changes.push(StatusChange::Offer {
                applicant: applicant.clone(),
                job: job.clone(),
            });
            changes.push(StatusChange::RejectOthers {
                applicant: applicant.clone(),
                keep: job.clone(),
            });
        }

        for applicant in &result.reserves {
            changes.push(StatusChange::Reserve {
                applicant: applicant.clone(),
            });
        }

        Self { changes }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
