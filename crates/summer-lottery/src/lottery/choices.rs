use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{ApplicantId, ApplicationRecord, JobId};
use super::engine::Applicant;

/// Sort key for applications without an explicit rank; larger than any real rank.
const UNRANKED: u64 = u64::MAX;

struct RankedChoice<'a> {
    rank: u64,
    created_at: DateTime<Utc>,
    position: usize,
    job_id: &'a JobId,
}

/// Group surviving applications into applicants with ranked choice lists.
///
/// Ranks are only compared within one applicant. Unranked choices sort last; ties break
/// on submission time and then on input position. Applicants come out ordered by id.
pub fn build(applications: &[ApplicationRecord]) -> Vec<Applicant> {
    let mut grouped: BTreeMap<&ApplicantId, Vec<RankedChoice<'_>>> = BTreeMap::new();

    for (position, application) in applications.iter().enumerate() {
        grouped
            .entry(&application.applicant_id)
            .or_default()
            .push(RankedChoice {
                rank: application.priority_rank.map_or(UNRANKED, u64::from),
                created_at: application.created_at,
                position,
                job_id: &application.job_id,
            });
    }

    grouped
        .into_iter()
        .map(|(applicant_id, mut choices)| {
            choices.sort_by(|left, right| {
                (left.rank, left.created_at, left.position).cmp(&(
                    right.rank,
                    right.created_at,
                    right.position,
                ))
            });

            let mut ordered: Vec<JobId> = Vec::with_capacity(choices.len());
            for choice in choices {
                if !ordered.contains(choice.job_id) {
                    ordered.push(choice.job_id.clone());
                }
            }

            Applicant {
                id: applicant_id.clone(),
                choices: ordered,
            }
        })
        .collect()
}
