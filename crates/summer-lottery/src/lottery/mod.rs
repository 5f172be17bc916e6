//! Summer-job lottery: eligibility filtering, ranked choice building, Random Serial
//! Dictatorship matching, audit reporting, and the transactional run that applies it all.

pub mod audit;
pub mod choices;
pub mod domain;
pub mod eligibility;
pub mod engine;
pub mod export;
pub mod memory;
pub mod repository;
pub mod run;
pub mod service;
pub mod snapshot;
pub mod transition;

#[cfg(test)]
mod tests;

pub use audit::{
    verify_report, AuditReport, EligibilitySection, Exclusion, InputSummary, OutputSummary,
    ReplayError, RunInputs,
};
pub use domain::{
    ActorId, ApplicantId, ApplicantProfile, ApplicationId, ApplicationRecord, ApplicationStatus,
    DomainError, GroupId, JobGroup, JobId, JobRecord, JobStatus, RunId,
};
pub use eligibility::{Eligibility, Grade, Ineligibility};
pub use engine::{
    random_seed, seed_from_time, Applicant, JobCapacity, MatchEngine, MatchResult,
    ENGINE_VERSION, MAX_SEED,
};
pub use export::write_results_csv;
pub use memory::InMemoryLotteryStore;
pub use repository::{LotteryRepository, RepositoryError, UnitOfWork};
pub use run::{LotteryRun, RunAudit, RunStateError, RunStatus, RunSummary};
pub use service::{ErrorClass, LotteryError, LotteryPreview, LotteryService, SeedPolicy};
pub use snapshot::{Snapshot, SnapshotError};
pub use transition::{StatusChange, TransitionPlan};
