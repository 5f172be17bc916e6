//! Random Serial Dictatorship matching.
//!
//! Applicants are put in a random priority order drawn from a seeded generator, then each
//! applicant in turn takes their highest-ranked job that still has a free spot. Given the
//! same applicants, jobs, and seed the result is identical, which is what makes a run
//! auditable after the fact.
//!
//! The shuffle is part of the audit contract. Historical seeds only reproduce if all of
//! the following stay fixed:
//!
//! 1. Applicants are sorted by id before shuffling, so caller input order never matters.
//! 2. The generator is `ChaCha8Rng::seed_from_u64(seed)`.
//! 3. Fisher-Yates from the back: for `i` in `n-1` down to `1`, draw
//!    `j = gen_range(0..=i)` over `u64` and swap positions `i` and `j`.
//!
//! Any change to these steps must bump [`ENGINE_VERSION`].

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicantId, DomainError, JobId};

/// Recorded on every run so old reports can be replayed with the matching algorithm.
pub const ENGINE_VERSION: &str = "1.0.0";

/// Largest seed the lottery hands out or accepts from configuration.
pub const MAX_SEED: u64 = SEED_MODULUS - 1;

const SEED_MODULUS: u64 = (1 << 31) - 1;

/// An applicant with their job choices, first choice first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub choices: Vec<JobId>,
}

/// Remaining assignable spots for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCapacity {
    pub job_id: JobId,
    pub remaining_spots: u32,
}

/// Output of one engine run. Every input applicant lands in exactly one of `matches`
/// or `reserves`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matches: BTreeMap<ApplicantId, JobId>,
    /// Unassigned applicants in the order they were processed.
    pub reserves: Vec<ApplicantId>,
    /// Remaining spots per job after the run.
    pub job_status: BTreeMap<JobId, u32>,
    /// The drawn priority order; position 0 chose first.
    pub priority_order: Vec<ApplicantId>,
    pub seed: u64,
    pub engine_version: String,
}

impl MatchResult {
    pub fn assignment(&self, applicant: &ApplicantId) -> Option<&JobId> {
        self.matches.get(applicant)
    }

    pub fn is_reserve(&self, applicant: &ApplicantId) -> bool {
        self.reserves.contains(applicant)
    }
}

/// Validated engine input. Construction rejects duplicate applicants and jobs.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    applicants: Vec<Applicant>,
    jobs: Vec<JobCapacity>,
}

impl MatchEngine {
    pub fn new(applicants: Vec<Applicant>, jobs: Vec<JobCapacity>) -> Result<Self, DomainError> {
        let mut seen_applicants = HashSet::new();
        for applicant in &applicants {
            if !seen_applicants.insert(&applicant.id) {
                return Err(DomainError::DuplicateApplicant(applicant.id.clone()));
            }
        }

        let mut seen_jobs = HashSet::new();
        for job in &jobs {
            if !seen_jobs.insert(&job.job_id) {
                return Err(DomainError::DuplicateJob(job.job_id.clone()));
            }
        }

        Ok(Self { applicants, jobs })
    }

    pub fn applicants(&self) -> &[Applicant] {
        &self.applicants
    }

    pub fn jobs(&self) -> &[JobCapacity] {
        &self.jobs
    }

    /// Run the lottery. Without a seed one is drawn at random and recorded in the result.
    pub fn run(&self, seed: Option<u64>) -> MatchResult {
        let seed = seed.unwrap_or_else(random_seed);

        let mut capacities: BTreeMap<JobId, u32> = self
            .jobs
            .iter()
            .map(|job| (job.job_id.clone(), job.remaining_spots))
            .collect();

        let order = priority_order(&self.applicants, seed);

        let mut matches = BTreeMap::new();
        let mut reserves = Vec::new();

        for applicant in &order {
            match take_first_open(&applicant.choices, &mut capacities) {
                Some(job_id) => {
                    matches.insert(applicant.id.clone(), job_id);
                }
                None => reserves.push(applicant.id.clone()),
            }
        }

        MatchResult {
            matches,
            reserves,
            job_status: capacities,
            priority_order: order.iter().map(|applicant| applicant.id.clone()).collect(),
            seed,
            engine_version: ENGINE_VERSION.to_string(),
        }
    }
}

fn take_first_open(choices: &[JobId], capacities: &mut BTreeMap<JobId, u32>) -> Option<JobId> {
    for job_id in choices {
        if let Some(remaining) = capacities.get_mut(job_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Some(job_id.clone());
            }
        }
    }
    None
}

/// Sorted-then-shuffled copy of the applicants; the caller's list is never touched.
fn priority_order(applicants: &[Applicant], seed: u64) -> Vec<&Applicant> {
    let mut order: Vec<&Applicant> = applicants.iter().collect();
    order.sort_by(|left, right| left.id.cmp(&right.id));
    shuffle(&mut order, seed);
    order
}

/// Seeded Fisher-Yates shuffle.
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i as u64) as usize;
        items.swap(i, j);
    }
}

/// Fresh seed drawn uniformly from `0..=MAX_SEED`.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen_range(0..=MAX_SEED)
}

/// Seed derived from a wall-clock instant: epoch milliseconds folded into the seed range.
pub fn seed_from_time(now: DateTime<Utc>) -> u64 {
    (now.timestamp_millis() as i128).rem_euclid(SEED_MODULUS as i128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn shuffle_is_a_pure_function_of_seed_and_length() {
        let mut first: Vec<u32> = (0..20).collect();
        let mut second: Vec<u32> = (0..20).collect();
        shuffle(&mut first, 7);
        shuffle(&mut second, 7);
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn different_seeds_usually_yield_different_orders() {
        let base: Vec<u32> = (0..20).collect();
        let distinct = (0..10u64)
            .map(|seed| {
                let mut items = base.clone();
                shuffle(&mut items, seed);
                items
            })
            .collect::<HashSet<_>>();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn shuffle_handles_trivial_lengths() {
        let mut empty: Vec<u32> = Vec::new();
        shuffle(&mut empty, 3);
        assert!(empty.is_empty());

        let mut single = vec![9];
        shuffle(&mut single, 3);
        assert_eq!(single, vec![9]);
    }

    #[test]
    fn time_seed_stays_in_range() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid");
        let seed = seed_from_time(now);
        assert!(seed <= MAX_SEED);
        assert_eq!(seed, (now.timestamp_millis() as u64) % SEED_MODULUS);

        let before_epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).single().expect("valid");
        assert!(seed_from_time(before_epoch) <= MAX_SEED);
    }

    #[test]
    fn random_seed_stays_in_range() {
        for _ in 0..100 {
            assert!(random_seed() <= MAX_SEED);
        }
    }
}
