use super::domain::{
    ApplicantId, ApplicantProfile, ApplicationId, ApplicationRecord, GroupId, JobGroup, JobRecord,
    RunId,
};
use super::run::LotteryRun;
use super::transition::StatusChange;

/// Data-access boundary to the surrounding record-management system.
pub trait LotteryRepository: Send + Sync {
    fn find_group(&self, id: &GroupId) -> Result<Option<JobGroup>, RepositoryError>;
    fn list_groups(&self) -> Result<Vec<JobGroup>, RepositoryError>;
    /// Published jobs belonging to the group.
    fn published_jobs(&self, group: &GroupId) -> Result<Vec<JobRecord>, RepositoryError>;
    /// Pending applications for the group's published jobs, ordered by applicant, then
    /// rank (unranked last), then submission time.
    fn pending_applications(
        &self,
        group: &GroupId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    /// Profiles for the given applicants; unknown ids are simply absent from the result.
    fn applicant_profiles(
        &self,
        ids: &[ApplicantId],
    ) -> Result<Vec<ApplicantProfile>, RepositoryError>;
    /// Mark applications rejected ahead of matching. Runs outside the run's unit of work.
    fn reject_applications(&self, ids: &[ApplicationId]) -> Result<(), RepositoryError>;
    fn next_run_id(&self) -> Result<RunId, RepositoryError>;
    /// Open an all-or-nothing unit of work. Dropping it without `commit` discards every
    /// write made through it.
    fn begin(&self, group: &GroupId) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError>;
    /// Persist a failed run outside any unit of work so it survives the rollback.
    fn record_failed_run(&self, run: &LotteryRun) -> Result<(), RepositoryError>;
    fn find_run(&self, id: &RunId) -> Result<Option<LotteryRun>, RepositoryError>;
    /// Runs for the group, newest first.
    fn runs_for_group(&self, group: &GroupId) -> Result<Vec<LotteryRun>, RepositoryError>;
}

/// Writes applied atomically for one run.
pub trait UnitOfWork {
    fn insert_run(&mut self, run: &LotteryRun) -> Result<(), RepositoryError>;
    /// Apply a status change, returning how many applications it touched.
    fn apply(&mut self, change: &StatusChange) -> Result<usize, RepositoryError>;
    fn update_run(&mut self, run: &LotteryRun) -> Result<(), RepositoryError>;
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
