use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::audit::{self, EligibilitySection, Exclusion, ReplayError};
use super::choices;
use super::domain::{
    ActorId, ApplicantId, ApplicantProfile, ApplicationId, ApplicationRecord, DomainError, GroupId,
    JobGroup, JobId, JobRecord, RunId,
};
use super::eligibility::{self, Eligibility};
use super::engine::{
    random_seed, seed_from_time, JobCapacity, MatchEngine, MatchResult, ENGINE_VERSION,
};
use super::repository::{LotteryRepository, RepositoryError};
use super::run::{LotteryRun, RunStateError};
use super::transition::TransitionPlan;

/// Where run seeds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Wall-clock milliseconds folded into the seed range; fresh for every run.
    #[default]
    TimeDerived,
    /// Independent draw per run, so runs started in the same millisecond still differ.
    Random,
    Fixed(u64),
}

impl SeedPolicy {
    pub fn seed_for(self, now: DateTime<Utc>) -> u64 {
        match self {
            Self::TimeDerived => seed_from_time(now),
            Self::Random => random_seed(),
            Self::Fixed(seed) => seed,
        }
    }
}

/// Read-only statistics used to check a group before running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotteryPreview {
    pub group_id: GroupId,
    pub group_name: String,
    pub total_jobs: usize,
    pub total_spots: u64,
    pub unique_applicants: usize,
    pub total_applications: usize,
    pub can_run: bool,
}

/// How a caller should surface a [`LotteryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request can be corrected by the caller.
    ClientInput,
    ServerFault,
}

/// Error raised by the lottery service.
#[derive(Debug, thiserror::Error)]
pub enum LotteryError {
    #[error("job group {0} not found")]
    GroupNotFound(GroupId),
    #[error("no published jobs found in group '{0}'")]
    NoPublishedJobs(String),
    #[error("no eligible applications found in group '{0}'")]
    NoEligibleApplicants(String),
    #[error("lottery run {run_id} failed: {message}")]
    ExecutionFailure { run_id: RunId, message: String },
    #[error("lottery run {0} not found")]
    RunNotFound(RunId),
    #[error("lottery run {0} has no audit report to replay")]
    MissingReport(RunId),
    #[error("audit replay failed: {0}")]
    Replay(#[from] ReplayError),
    #[error("invalid lottery input: {0}")]
    InvalidInput(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LotteryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::GroupNotFound(_)
            | Self::NoPublishedJobs(_)
            | Self::NoEligibleApplicants(_)
            | Self::RunNotFound(_)
            | Self::MissingReport(_) => ErrorClass::ClientInput,
            Self::ExecutionFailure { .. }
            | Self::Replay(_)
            | Self::InvalidInput(_)
            | Self::Repository(_) => ErrorClass::ServerFault,
        }
    }
}

/// Failure inside the run's unit of work.
#[derive(Debug, thiserror::Error)]
enum UnitOfWorkError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    RunState(#[from] RunStateError),
}

/// Per-group mutexes so two runs on the same group never interleave.
#[derive(Debug, Default)]
struct GroupLocks {
    locks: Mutex<HashMap<GroupId, Arc<Mutex<()>>>>,
}

impl GroupLocks {
    fn handle(&self, group: &GroupId) -> Arc<Mutex<()>> {
        // The guarded values carry no state, so a poisoned lock is still usable.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(group.clone()).or_default().clone()
    }
}

/// Applications split by the eligibility filter.
struct Screening {
    eligible: Vec<ApplicationRecord>,
    rejected: Vec<ApplicationId>,
    exclusions: Vec<Exclusion>,
}

/// Orchestrates one lottery run: fetch, filter, match, report, persist.
pub struct LotteryService<R> {
    repository: Arc<R>,
    seed_policy: SeedPolicy,
    locks: GroupLocks,
}

impl<R> LotteryService<R>
where
    R: LotteryRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            seed_policy: SeedPolicy::default(),
            locks: GroupLocks::default(),
        }
    }

    pub fn with_seed_policy(mut self, seed_policy: SeedPolicy) -> Self {
        self.seed_policy = seed_policy;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Run the lottery for a group now.
    pub fn run_for_group(
        &self,
        group_id: &GroupId,
        actor: &ActorId,
    ) -> Result<LotteryRun, LotteryError> {
        self.run_for_group_at(group_id, actor, Utc::now())
    }

    /// Run the lottery as of `now`, which also fixes "today" for age checks.
    pub fn run_for_group_at(
        &self,
        group_id: &GroupId,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> Result<LotteryRun, LotteryError> {
        let lock = self.locks.handle(group_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let group = self
            .repository
            .find_group(group_id)?
            .ok_or_else(|| LotteryError::GroupNotFound(group_id.clone()))?;

        let jobs = self.repository.published_jobs(group_id)?;
        if jobs.is_empty() {
            return Err(LotteryError::NoPublishedJobs(group.name));
        }

        let applications = self.repository.pending_applications(group_id)?;
        let total_checked = applications.len();
        let screening = self.screen(&group, &jobs, applications, now.date_naive())?;

        if !screening.rejected.is_empty() {
            self.repository.reject_applications(&screening.rejected)?;
        }

        let applicants = choices::build(&screening.eligible);
        if applicants.is_empty() {
            return Err(LotteryError::NoEligibleApplicants(group.name));
        }

        let capacities = jobs
            .iter()
            .map(|job| JobCapacity {
                job_id: job.id.clone(),
                remaining_spots: job.total_spots,
            })
            .collect();
        let engine = MatchEngine::new(applicants, capacities)?;
        let seed = self.seed_policy.seed_for(now);

        info!(
            group = %group.id,
            seed,
            candidates = engine.applicants().len(),
            excluded = screening.exclusions.len(),
            "lottery run started"
        );

        let result = engine.run(Some(seed));
        let section = EligibilitySection::new(
            total_checked,
            engine.applicants().len(),
            screening.exclusions,
        );
        let report = audit::build(&engine, &result, Some(section));
        let plan = TransitionPlan::from_result(&result);

        let mut run = LotteryRun::start(
            self.repository.next_run_id()?,
            group.id.clone(),
            actor.clone(),
            seed,
            ENGINE_VERSION,
            engine.applicants().len(),
            now,
        );

        match self.persist(&mut run, report, &plan, now) {
            Ok(()) => {
                info!(
                    group = %group.id,
                    run = %run.id,
                    matched = run.matched_count,
                    reserves = run.unmatched_count,
                    "lottery run completed"
                );
                Ok(run)
            }
            Err(err) => {
                let message = err.to_string();
                error!(group = %group.id, run = %run.id, error = %message, "lottery run failed");
                self.record_failure(&mut run, &message, now);
                Err(LotteryError::ExecutionFailure {
                    run_id: run.id,
                    message,
                })
            }
        }
    }

    /// Statistics for a group without touching any state.
    pub fn preview(&self, group_id: &GroupId) -> Result<LotteryPreview, LotteryError> {
        let group = self
            .repository
            .find_group(group_id)?
            .ok_or_else(|| LotteryError::GroupNotFound(group_id.clone()))?;

        let jobs = self.repository.published_jobs(group_id)?;
        let applications = self.repository.pending_applications(group_id)?;
        let unique_applicants = applications
            .iter()
            .map(|application| &application.applicant_id)
            .collect::<BTreeSet<_>>()
            .len();

        Ok(LotteryPreview {
            group_id: group.id,
            group_name: group.name,
            total_jobs: jobs.len(),
            total_spots: jobs.iter().map(|job| u64::from(job.total_spots)).sum(),
            unique_applicants,
            total_applications: applications.len(),
            can_run: !jobs.is_empty() && unique_applicants > 0,
        })
    }

    pub fn groups(&self) -> Result<Vec<JobGroup>, LotteryError> {
        Ok(self.repository.list_groups()?)
    }

    pub fn run(&self, run_id: &RunId) -> Result<LotteryRun, LotteryError> {
        self.repository
            .find_run(run_id)?
            .ok_or_else(|| LotteryError::RunNotFound(run_id.clone()))
    }

    pub fn runs_for_group(&self, group_id: &GroupId) -> Result<Vec<LotteryRun>, LotteryError> {
        if self.repository.find_group(group_id)?.is_none() {
            return Err(LotteryError::GroupNotFound(group_id.clone()));
        }
        Ok(self.repository.runs_for_group(group_id)?)
    }

    /// Replay a stored run from its audit report and confirm the outcome is unchanged.
    pub fn verify_run(&self, run_id: &RunId) -> Result<MatchResult, LotteryError> {
        let run = self.run(run_id)?;
        let report = run
            .report()
            .ok_or_else(|| LotteryError::MissingReport(run_id.clone()))?;
        Ok(audit::verify_report(report)?)
    }

    fn screen(
        &self,
        group: &JobGroup,
        jobs: &[JobRecord],
        applications: Vec<ApplicationRecord>,
        today: NaiveDate,
    ) -> Result<Screening, LotteryError> {
        let jobs_by_id: HashMap<&JobId, &JobRecord> =
            jobs.iter().map(|job| (&job.id, job)).collect();

        let applicant_ids: Vec<ApplicantId> = applications
            .iter()
            .map(|application| application.applicant_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let profiles: HashMap<ApplicantId, ApplicantProfile> = self
            .repository
            .applicant_profiles(&applicant_ids)?
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();

        let mut screening = Screening {
            eligible: Vec::with_capacity(applications.len()),
            rejected: Vec::new(),
            exclusions: Vec::new(),
        };

        for application in applications {
            let Some(job) = jobs_by_id.get(&application.job_id) else {
                warn!(
                    application = %application.id,
                    job = %application.job_id,
                    "skipping application for a job outside the published set"
                );
                continue;
            };

            let unknown;
            let profile = match profiles.get(&application.applicant_id) {
                Some(profile) => profile,
                None => {
                    unknown = ApplicantProfile {
                        id: application.applicant_id.clone(),
                        email: None,
                        birth_date: None,
                        grade: None,
                    };
                    &unknown
                }
            };

            match eligibility::check(profile, job, group, today) {
                Eligibility::Eligible => screening.eligible.push(application),
                verdict @ Eligibility::Ineligible(_) => {
                    let reason = verdict.reason();
                    debug!(
                        applicant = %application.applicant_id,
                        job = %application.job_id,
                        %reason,
                        "application excluded by eligibility filter"
                    );
                    screening.rejected.push(application.id.clone());
                    screening.exclusions.push(Exclusion {
                        applicant_id: application.applicant_id,
                        applicant_email: profile.email.clone(),
                        job_id: application.job_id,
                        job_title: job.title.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(screening)
    }

    fn persist(
        &self,
        run: &mut LotteryRun,
        report: audit::AuditReport,
        plan: &TransitionPlan,
        now: DateTime<Utc>,
    ) -> Result<(), UnitOfWorkError> {
        let mut unit = self.repository.begin(&run.group_id)?;
        unit.insert_run(run)?;
        for change in &plan.changes {
            unit.apply(change)?;
        }

        let mut completed = run.clone();
        completed.complete(report, now)?;
        unit.update_run(&completed)?;
        unit.commit()?;

        *run = completed;
        Ok(())
    }

    fn record_failure(&self, run: &mut LotteryRun, message: &str, now: DateTime<Utc>) {
        if let Err(err) = run.fail(message, now) {
            error!(run = %run.id, error = %err, "could not mark lottery run as failed");
            return;
        }
        if let Err(err) = self.repository.record_failed_run(run) {
            error!(run = %run.id, error = %err, "could not persist failed lottery run");
        }
    }
}
