use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{ApplicantId, DomainError, JobId};
use super::engine::{Applicant, JobCapacity, MatchEngine, MatchResult, ENGINE_VERSION};

/// Serializable record of one lottery run, persisted verbatim on the run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub engine_version: String,
    pub seed: u64,
    pub input_summary: InputSummary,
    pub output_summary: OutputSummary,
    pub matches: BTreeMap<ApplicantId, JobId>,
    pub reserves: Vec<ApplicantId>,
    pub job_status: BTreeMap<JobId, u32>,
    pub priority_order: Vec<ApplicantId>,
    /// Exact engine input, so the run can be replayed from the report alone.
    pub inputs: RunInputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<EligibilitySection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    pub total_applicants: usize,
    pub total_jobs: usize,
    pub total_spots: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSummary {
    pub matched_count: usize,
    pub reserve_count: usize,
    pub remaining_spots: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInputs {
    pub applicants: Vec<Applicant>,
    pub jobs: Vec<JobCapacity>,
}

/// Applications removed by the eligibility filter before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySection {
    pub total_applications_checked: usize,
    pub eligible_applicants: usize,
    pub ineligible_count: usize,
    pub ineligible_details: Vec<Exclusion>,
}

impl EligibilitySection {
    pub fn new(
        total_applications_checked: usize,
        eligible_applicants: usize,
        ineligible_details: Vec<Exclusion>,
    ) -> Self {
        Self {
            total_applications_checked,
            eligible_applicants,
            ineligible_count: ineligible_details.len(),
            ineligible_details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub applicant_id: ApplicantId,
    #[serde(default)]
    pub applicant_email: Option<String>,
    pub job_id: JobId,
    #[serde(default)]
    pub job_title: String,
    pub reason: String,
}

/// Assemble the report for a finished engine run.
pub fn build(
    engine: &MatchEngine,
    result: &MatchResult,
    eligibility: Option<EligibilitySection>,
) -> AuditReport {
    let input_summary = InputSummary {
        total_applicants: engine.applicants().len(),
        total_jobs: engine.jobs().len(),
        total_spots: engine
            .jobs()
            .iter()
            .map(|job| u64::from(job.remaining_spots))
            .sum(),
    };

    let output_summary = OutputSummary {
        matched_count: result.matches.len(),
        reserve_count: result.reserves.len(),
        remaining_spots: result.job_status.values().copied().map(u64::from).sum(),
    };

    AuditReport {
        engine_version: result.engine_version.clone(),
        seed: result.seed,
        input_summary,
        output_summary,
        matches: result.matches.clone(),
        reserves: result.reserves.clone(),
        job_status: result.job_status.clone(),
        priority_order: result.priority_order.clone(),
        inputs: RunInputs {
            applicants: engine.applicants().to_vec(),
            jobs: engine.jobs().to_vec(),
        },
        eligibility,
    }
}

/// Reasons a stored report does not reproduce.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("report was produced by engine {recorded}, this build runs {}", ENGINE_VERSION)]
    EngineVersion { recorded: String },
    #[error("recorded inputs are invalid: {0}")]
    InvalidInputs(#[from] DomainError),
    #[error("replay diverged from the recorded {field}")]
    Mismatch { field: &'static str },
}

/// Re-run the engine from a report's recorded seed and inputs and compare the outcome.
pub fn verify_report(report: &AuditReport) -> Result<MatchResult, ReplayError> {
    if report.engine_version != ENGINE_VERSION {
        return Err(ReplayError::EngineVersion {
            recorded: report.engine_version.clone(),
        });
    }

    let engine = MatchEngine::new(
        report.inputs.applicants.clone(),
        report.inputs.jobs.clone(),
    )?;
    let replayed = engine.run(Some(report.seed));

    if replayed.priority_order != report.priority_order {
        return Err(ReplayError::Mismatch {
            field: "priority order",
        });
    }
    if replayed.matches != report.matches {
        return Err(ReplayError::Mismatch { field: "matches" });
    }
    if replayed.reserves != report.reserves {
        return Err(ReplayError::Mismatch { field: "reserves" });
    }
    if replayed.job_status != report.job_status {
        return Err(ReplayError::Mismatch {
            field: "job status",
        });
    }

    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applicant(id: &str, choices: &[&str]) -> Applicant {
        Applicant {
            id: ApplicantId::new(id).expect("id"),
            choices: choices
                .iter()
                .map(|job| JobId::new(*job).expect("id"))
                .collect(),
        }
    }

    fn capacity(id: &str, spots: u32) -> JobCapacity {
        JobCapacity {
            job_id: JobId::new(id).expect("id"),
            remaining_spots: spots,
        }
    }

    fn engine() -> MatchEngine {
        MatchEngine::new(
            vec![
                applicant("youth-1", &["pool", "park"]),
                applicant("youth-2", &["pool"]),
                applicant("youth-3", &["park"]),
                applicant("youth-4", &[]),
            ],
            vec![capacity("pool", 1), capacity("park", 2)],
        )
        .expect("valid input")
    }

    #[test]
    fn summarises_inputs_and_outputs() {
        let engine = engine();
        let result = engine.run(Some(42));
        let report = build(&engine, &result, None);

        assert_eq!(report.input_summary.total_applicants, 4);
        assert_eq!(report.input_summary.total_jobs, 2);
        assert_eq!(report.input_summary.total_spots, 3);
        assert_eq!(
            report.output_summary.matched_count + report.output_summary.reserve_count,
            4
        );
        assert_eq!(
            report.output_summary.remaining_spots,
            3 - report.output_summary.matched_count as u64
        );
        assert_eq!(report.matches, result.matches);
        assert_eq!(report.seed, 42);
    }

    #[test]
    fn eligibility_section_is_omitted_when_filter_did_not_run() {
        let engine = engine();
        let report = build(&engine, &engine.run(Some(1)), None);
        let encoded = serde_json::to_value(&report).expect("report serializes");
        assert!(encoded.get("eligibility").is_none());
        assert_eq!(encoded["engine_version"], ENGINE_VERSION);
    }

    #[test]
    fn report_survives_json_and_replays() {
        let engine = engine();
        let section = EligibilitySection::new(
            6,
            4,
            vec![Exclusion {
                applicant_id: ApplicantId::new("youth-9").expect("id"),
                applicant_email: Some("youth-9@example.org".to_string()),
                job_id: JobId::new("pool").expect("id"),
                job_title: "Pool attendant".to_string(),
                reason: "Too young (age 14, min 15)".to_string(),
            }],
        );
        let report = build(&engine, &engine.run(Some(99)), Some(section));

        let encoded = serde_json::to_string(&report).expect("encodes");
        let decoded: AuditReport = serde_json::from_str(&encoded).expect("decodes");
        assert_eq!(decoded, report);
        assert_eq!(decoded.eligibility.as_ref().map(|e| e.ineligible_count), Some(1));

        let replayed = verify_report(&decoded).expect("report reproduces");
        assert_eq!(replayed.matches, report.matches);
    }

    #[test]
    fn tampered_report_fails_verification() {
        let engine = engine();
        let mut report = build(&engine, &engine.run(Some(5)), None);
        let winner = report
            .matches
            .keys()
            .next()
            .cloned()
            .expect("someone was matched");
        report.matches.remove(&winner);
        report.reserves.push(winner);

        match verify_report(&report) {
            Err(ReplayError::Mismatch { field }) => assert_eq!(field, "matches"),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn foreign_engine_versions_are_not_replayed() {
        let engine = engine();
        let mut report = build(&engine, &engine.run(Some(5)), None);
        report.engine_version = "0.9.0".to_string();
        assert!(matches!(
            verify_report(&report),
            Err(ReplayError::EngineVersion { .. })
        ));
    }
}
