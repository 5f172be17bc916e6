use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    ApplicantId, ApplicantProfile, ApplicationId, ApplicationRecord, ApplicationStatus, GroupId,
    JobGroup, JobId, JobRecord, JobStatus, RunId,
};
use super::repository::{LotteryRepository, RepositoryError, UnitOfWork};
use super::run::LotteryRun;
use super::snapshot::Snapshot;
use super::transition::StatusChange;

#[derive(Debug, Default, Clone)]
struct StoreState {
    groups: BTreeMap<GroupId, JobGroup>,
    jobs: BTreeMap<JobId, JobRecord>,
    applicants: BTreeMap<ApplicantId, ApplicantProfile>,
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
    runs: Vec<LotteryRun>,
    /// Last run sequence number handed out, including ids whose run was never stored.
    issued_runs: u64,
}

impl StoreState {
    fn group_job_ids(&self, group: &GroupId) -> BTreeSet<JobId> {
        self.jobs
            .values()
            .filter(|job| &job.group_id == group)
            .map(|job| job.id.clone())
            .collect()
    }
}

/// Thread-safe store backing the CLI and tests. Units of work stage their writes and only
/// publish them on commit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLotteryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLotteryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let Snapshot {
            groups,
            jobs,
            applicants,
            applications,
            runs,
        } = snapshot;

        let state = StoreState {
            groups: groups.into_iter().map(|group| (group.id.clone(), group)).collect(),
            jobs: jobs.into_iter().map(|job| (job.id.clone(), job)).collect(),
            applicants: applicants
                .into_iter()
                .map(|profile| (profile.id.clone(), profile))
                .collect(),
            applications: applications
                .into_iter()
                .map(|application| (application.id.clone(), application))
                .collect(),
            issued_runs: runs.len() as u64,
            runs,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> Result<Snapshot, RepositoryError> {
        let state = self.lock()?;
        Ok(Snapshot {
            groups: state.groups.values().cloned().collect(),
            jobs: state.jobs.values().cloned().collect(),
            applicants: state.applicants.values().cloned().collect(),
            applications: state.applications.values().cloned().collect(),
            runs: state.runs.clone(),
        })
    }

    pub fn insert_group(&self, group: JobGroup) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.groups.contains_key(&group.id) {
            return Err(RepositoryError::Conflict);
        }
        state.groups.insert(group.id.clone(), group);
        Ok(())
    }

    pub fn insert_job(&self, job: JobRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        state.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn insert_applicant(&self, profile: ApplicantProfile) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.applicants.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }
        state.applicants.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn insert_application(&self, application: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        let duplicate = state.applications.values().any(|existing| {
            existing.applicant_id == application.applicant_id && existing.job_id == application.job_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        state.applications.insert(application.id.clone(), application);
        Ok(())
    }

    pub fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    pub fn applications_for(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|application| &application.applicant_id == applicant)
            .cloned()
            .collect())
    }

    pub fn runs(&self) -> Result<Vec<LotteryRun>, RepositoryError> {
        Ok(self.lock()?.runs.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl LotteryRepository for InMemoryLotteryStore {
    fn find_group(&self, id: &GroupId) -> Result<Option<JobGroup>, RepositoryError> {
        Ok(self.lock()?.groups.get(id).cloned())
    }

    fn list_groups(&self) -> Result<Vec<JobGroup>, RepositoryError> {
        Ok(self.lock()?.groups.values().cloned().collect())
    }

    fn published_jobs(&self, group: &GroupId) -> Result<Vec<JobRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|job| &job.group_id == group && job.status == JobStatus::Published)
            .cloned()
            .collect())
    }

    fn pending_applications(
        &self,
        group: &GroupId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let state = self.lock()?;
        let published: BTreeSet<&JobId> = state
            .jobs
            .values()
            .filter(|job| &job.group_id == group && job.status == JobStatus::Published)
            .map(|job| &job.id)
            .collect();

        let mut pending: Vec<ApplicationRecord> = state
            .applications
            .values()
            .filter(|application| {
                application.status == ApplicationStatus::Pending
                    && published.contains(&application.job_id)
            })
            .cloned()
            .collect();

        pending.sort_by(|left, right| {
            (
                &left.applicant_id,
                left.priority_rank.is_none(),
                left.priority_rank,
                left.created_at,
            )
                .cmp(&(
                    &right.applicant_id,
                    right.priority_rank.is_none(),
                    right.priority_rank,
                    right.created_at,
                ))
        });
        Ok(pending)
    }

    fn applicant_profiles(
        &self,
        ids: &[ApplicantId],
    ) -> Result<Vec<ApplicantProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.applicants.get(id).cloned())
            .collect())
    }

    fn reject_applications(&self, ids: &[ApplicationId]) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if ids.iter().any(|id| !state.applications.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }
        for id in ids {
            if let Some(application) = state.applications.get_mut(id) {
                application.status = ApplicationStatus::Rejected;
            }
        }
        Ok(())
    }

    fn next_run_id(&self) -> Result<RunId, RepositoryError> {
        let mut state = self.lock()?;
        loop {
            state.issued_runs += 1;
            let candidate = format!("run-{:06}", state.issued_runs);
            if !state.runs.iter().any(|run| run.id.as_str() == candidate) {
                return RunId::new(candidate)
                    .map_err(|err| RepositoryError::Unavailable(err.to_string()));
            }
        }
    }

    fn begin(&self, group: &GroupId) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError> {
        let state = self.lock()?;
        let job_ids = state.group_job_ids(group);
        let staged = state
            .applications
            .values()
            .filter(|application| job_ids.contains(&application.job_id))
            .map(|application| (application.id.clone(), application.clone()))
            .collect();

        Ok(Box::new(MemoryUnitOfWork {
            store: self,
            staged,
            run: None,
        }))
    }

    fn record_failed_run(&self, run: &LotteryRun) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.runs.iter().any(|existing| existing.id == run.id) {
            return Err(RepositoryError::Conflict);
        }
        state.runs.push(run.clone());
        Ok(())
    }

    fn find_run(&self, id: &RunId) -> Result<Option<LotteryRun>, RepositoryError> {
        Ok(self.lock()?.runs.iter().find(|run| &run.id == id).cloned())
    }

    fn runs_for_group(&self, group: &GroupId) -> Result<Vec<LotteryRun>, RepositoryError> {
        let state = self.lock()?;
        let mut runs: Vec<LotteryRun> = state
            .runs
            .iter()
            .filter(|run| &run.group_id == group)
            .cloned()
            .collect();
        runs.sort_by(|left, right| right.executed_at.cmp(&left.executed_at));
        Ok(runs)
    }
}

/// Staged copy of one group's applications plus the pending run record.
struct MemoryUnitOfWork<'a> {
    store: &'a InMemoryLotteryStore,
    staged: BTreeMap<ApplicationId, ApplicationRecord>,
    run: Option<LotteryRun>,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn insert_run(&mut self, run: &LotteryRun) -> Result<(), RepositoryError> {
        if self.run.is_some() {
            return Err(RepositoryError::Conflict);
        }
        if self.store.find_run(&run.id)?.is_some() {
            return Err(RepositoryError::Conflict);
        }
        self.run = Some(run.clone());
        Ok(())
    }

    fn apply(&mut self, change: &StatusChange) -> Result<usize, RepositoryError> {
        let mut touched = 0;
        for application in self.staged.values_mut() {
            if &application.applicant_id != change.applicant() {
                continue;
            }
            if let Some(status) = change.target_status(&application.job_id, application.status) {
                application.status = status;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn update_run(&mut self, run: &LotteryRun) -> Result<(), RepositoryError> {
        match &mut self.run {
            Some(staged) if staged.id == run.id => {
                *staged = run.clone();
                Ok(())
            }
            _ => Err(RepositoryError::NotFound),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let MemoryUnitOfWork { store, staged, run } = *self;
        let mut state = store.lock()?;
        if let Some(run) = &run {
            if state.runs.iter().any(|existing| existing.id == run.id) {
                return Err(RepositoryError::Conflict);
            }
        }
        for (id, application) in staged {
            state.applications.insert(id, application);
        }
        if let Some(run) = run {
            state.runs.push(run);
        }
        Ok(())
    }
}
