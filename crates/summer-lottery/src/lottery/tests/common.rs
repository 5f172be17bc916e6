use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as Pause;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::lottery::domain::{
    ActorId, ApplicantId, ApplicantProfile, ApplicationId, ApplicationRecord, ApplicationStatus,
    GroupId, JobGroup, JobId, JobRecord, JobStatus, RunId,
};
use crate::lottery::engine::{Applicant, JobCapacity};
use crate::lottery::memory::InMemoryLotteryStore;
use crate::lottery::repository::{LotteryRepository, RepositoryError, UnitOfWork};
use crate::lottery::run::LotteryRun;
use crate::lottery::transition::StatusChange;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn group_id(id: &str) -> GroupId {
    GroupId::new(id).expect("valid group id")
}

pub(super) fn job_id(id: &str) -> JobId {
    JobId::new(id).expect("valid job id")
}

pub(super) fn youth_id(id: &str) -> ApplicantId {
    ApplicantId::new(id).expect("valid applicant id")
}

pub(super) fn application_id(id: &str) -> ApplicationId {
    ApplicationId::new(id).expect("valid application id")
}

pub(super) fn actor() -> ActorId {
    ActorId::new("municipality-admin").expect("valid actor id")
}

pub(super) fn applicant(id: &str, choices: &[&str]) -> Applicant {
    Applicant {
        id: youth_id(id),
        choices: choices.iter().map(|job| job_id(job)).collect(),
    }
}

pub(super) fn capacity(id: &str, spots: u32) -> JobCapacity {
    JobCapacity {
        job_id: job_id(id),
        remaining_spots: spots,
    }
}

pub(super) fn group(id: &str, min_age: u32, max_age: u32) -> JobGroup {
    JobGroup {
        id: group_id(id),
        name: format!("{id} jobs"),
        min_age,
        max_age,
    }
}

pub(super) fn job(id: &str, group: &str, spots: u32) -> JobRecord {
    JobRecord {
        id: job_id(id),
        group_id: group_id(group),
        title: id.to_string(),
        total_spots: spots,
        status: JobStatus::Published,
        min_grade: None,
        max_grade: None,
    }
}

pub(super) fn youth(id: &str, birth_date: Option<NaiveDate>, grade: Option<&str>) -> ApplicantProfile {
    ApplicantProfile {
        id: youth_id(id),
        email: Some(format!("{id}@example.org")),
        birth_date,
        grade: grade.map(str::to_string),
    }
}

pub(super) fn application(
    id: &str,
    applicant: &str,
    job: &str,
    rank: Option<u32>,
) -> ApplicationRecord {
    let base = Utc
        .with_ymd_and_hms(2025, 4, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp");
    let offset: i64 = id.bytes().map(i64::from).sum();
    ApplicationRecord {
        id: application_id(id),
        applicant_id: youth_id(applicant),
        job_id: job_id(job),
        status: ApplicationStatus::Pending,
        priority_rank: rank,
        created_at: base + Duration::minutes(offset),
    }
}

/// Group "outdoor" (ages 15-19) with two one-spot jobs and five 17-year-olds who all rank
/// pool first and park second.
pub(super) fn contested_store() -> InMemoryLotteryStore {
    let store = InMemoryLotteryStore::new();
    store.insert_group(group("outdoor", 15, 19)).expect("group");
    store.insert_job(job("pool", "outdoor", 1)).expect("job");
    store.insert_job(job("park", "outdoor", 1)).expect("job");
    for n in 1..=5 {
        let id = format!("youth-{n}");
        store
            .insert_applicant(youth(&id, Some(date(2008, 1, 1)), Some("GYM_1")))
            .expect("applicant");
        store
            .insert_application(application(&format!("{id}-pool"), &id, "pool", Some(1)))
            .expect("application");
        store
            .insert_application(application(&format!("{id}-park"), &id, "park", Some(2)))
            .expect("application");
    }
    store
}

/// `contested_store` plus group "indoor" whose single library spot three of the same
/// youths also applied for.
pub(super) fn two_group_store() -> InMemoryLotteryStore {
    let store = contested_store();
    store.insert_group(group("indoor", 15, 19)).expect("group");
    store.insert_job(job("library", "indoor", 1)).expect("job");
    for n in 1..=3 {
        let id = format!("youth-{n}");
        store
            .insert_application(application(&format!("{id}-library"), &id, "library", Some(1)))
            .expect("application");
    }
    store
}

pub(super) fn status_of(store: &InMemoryLotteryStore, id: &str) -> ApplicationStatus {
    store
        .application(&application_id(id))
        .expect("lookup succeeds")
        .expect("application exists")
        .status
}

/// Delegates to an in-memory store but fails the unit of work after `succeed` status
/// changes have been applied. Can also stall after handing out a run id so concurrent
/// runs overlap.
pub(super) struct FailingRepository {
    pub(super) inner: InMemoryLotteryStore,
    pub(super) succeed: usize,
    pub(super) begun: AtomicUsize,
    run_id_pause: Pause,
}

impl FailingRepository {
    pub(super) fn new(inner: InMemoryLotteryStore, succeed: usize) -> Self {
        Self {
            inner,
            succeed,
            begun: AtomicUsize::new(0),
            run_id_pause: Pause::ZERO,
        }
    }

    pub(super) fn with_run_id_pause(mut self, pause: Pause) -> Self {
        self.run_id_pause = pause;
        self
    }
}

impl LotteryRepository for FailingRepository {
    fn find_group(&self, id: &GroupId) -> Result<Option<JobGroup>, RepositoryError> {
        self.inner.find_group(id)
    }

    fn list_groups(&self) -> Result<Vec<JobGroup>, RepositoryError> {
        self.inner.list_groups()
    }

    fn published_jobs(&self, group: &GroupId) -> Result<Vec<JobRecord>, RepositoryError> {
        self.inner.published_jobs(group)
    }

    fn pending_applications(
        &self,
        group: &GroupId,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.pending_applications(group)
    }

    fn applicant_profiles(
        &self,
        ids: &[ApplicantId],
    ) -> Result<Vec<ApplicantProfile>, RepositoryError> {
        self.inner.applicant_profiles(ids)
    }

    fn reject_applications(&self, ids: &[ApplicationId]) -> Result<(), RepositoryError> {
        self.inner.reject_applications(ids)
    }

    fn next_run_id(&self) -> Result<RunId, RepositoryError> {
        let id = self.inner.next_run_id()?;
        std::thread::sleep(self.run_id_pause);
        Ok(id)
    }

    fn begin(&self, group: &GroupId) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FailingUnit {
            inner: self.inner.begin(group)?,
            remaining: self.succeed,
        }))
    }

    fn record_failed_run(&self, run: &LotteryRun) -> Result<(), RepositoryError> {
        self.inner.record_failed_run(run)
    }

    fn find_run(&self, id: &RunId) -> Result<Option<LotteryRun>, RepositoryError> {
        self.inner.find_run(id)
    }

    fn runs_for_group(&self, group: &GroupId) -> Result<Vec<LotteryRun>, RepositoryError> {
        self.inner.runs_for_group(group)
    }
}

struct FailingUnit<'a> {
    inner: Box<dyn UnitOfWork + 'a>,
    remaining: usize,
}

impl UnitOfWork for FailingUnit<'_> {
    fn insert_run(&mut self, run: &LotteryRun) -> Result<(), RepositoryError> {
        self.inner.insert_run(run)
    }

    fn apply(&mut self, change: &StatusChange) -> Result<usize, RepositoryError> {
        if self.remaining == 0 {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.remaining -= 1;
        self.inner.apply(change)
    }

    fn update_run(&mut self, run: &LotteryRun) -> Result<(), RepositoryError> {
        self.inner.update_run(run)
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let unit = *self;
        unit.inner.commit()
    }
}
