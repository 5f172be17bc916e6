use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::AuditReport;
use super::domain::{ActorId, GroupId, RunId};

/// Lifecycle of a run record. Runs are created directly in `Running`; `Pending` only
/// exists for records written by other tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Payload stored on the run: the full report, or the error that aborted the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunAudit {
    Report(Box<AuditReport>),
    Failure { error: String },
}

/// Persisted, append-only record of one lottery execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryRun {
    pub id: RunId,
    pub group_id: GroupId,
    pub status: RunStatus,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub executed_by: ActorId,
    pub seed: u64,
    pub engine_version: String,
    pub candidates_count: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    #[serde(default)]
    pub audit_report: Option<RunAudit>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("run {run_id} is already {} and cannot become {}", .from.label(), .to.label())]
pub struct RunStateError {
    pub run_id: RunId,
    pub from: RunStatus,
    pub to: RunStatus,
}

impl LotteryRun {
    pub fn start(
        id: RunId,
        group_id: GroupId,
        executed_by: ActorId,
        seed: u64,
        engine_version: &str,
        candidates_count: usize,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            group_id,
            status: RunStatus::Running,
            executed_at,
            completed_at: None,
            executed_by,
            seed,
            engine_version: engine_version.to_string(),
            candidates_count,
            matched_count: 0,
            unmatched_count: 0,
            audit_report: None,
        }
    }

    pub fn complete(
        &mut self,
        report: AuditReport,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RunStateError> {
        self.ensure_open(RunStatus::Completed)?;
        self.status = RunStatus::Completed;
        self.completed_at = Some(completed_at);
        self.matched_count = report.output_summary.matched_count;
        self.unmatched_count = report.output_summary.reserve_count;
        self.audit_report = Some(RunAudit::Report(Box::new(report)));
        Ok(())
    }

    pub fn fail(
        &mut self,
        error: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RunStateError> {
        self.ensure_open(RunStatus::Failed)?;
        self.status = RunStatus::Failed;
        self.completed_at = Some(completed_at);
        self.matched_count = 0;
        self.unmatched_count = 0;
        self.audit_report = Some(RunAudit::Failure {
            error: error.into(),
        });
        Ok(())
    }

    pub fn report(&self) -> Option<&AuditReport> {
        match &self.audit_report {
            Some(RunAudit::Report(report)) => Some(report),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.audit_report {
            Some(RunAudit::Failure { error }) => Some(error),
            _ => None,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.id.clone(),
            group_id: self.group_id.clone(),
            status: self.status,
            matched: self.matched_count,
            reserves: self.unmatched_count,
            candidates: self.candidates_count,
            seed: self.seed,
        }
    }

    fn ensure_open(&self, to: RunStatus) -> Result<(), RunStateError> {
        if self.status.is_terminal() {
            return Err(RunStateError {
                run_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

/// Success payload handed back to whoever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub group_id: GroupId,
    pub status: RunStatus,
    pub matched: usize,
    pub reserves: usize,
    pub candidates: usize,
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lottery::audit::{self, AuditReport};
    use crate::lottery::domain::{ApplicantId, JobId};
    use crate::lottery::engine::{Applicant, JobCapacity, MatchEngine, ENGINE_VERSION};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, hour, 0, 0)
            .single()
            .expect("valid")
    }

    fn running() -> LotteryRun {
        LotteryRun::start(
            RunId::new("run-000001").expect("id"),
            GroupId::new("outdoor").expect("id"),
            ActorId::new("admin-1").expect("id"),
            42,
            ENGINE_VERSION,
            1,
            at(9),
        )
    }

    fn report() -> AuditReport {
        let engine = MatchEngine::new(
            vec![Applicant {
                id: ApplicantId::new("youth-1").expect("id"),
                choices: vec![JobId::new("pool").expect("id")],
            }],
            vec![JobCapacity {
                job_id: JobId::new("pool").expect("id"),
                remaining_spots: 1,
            }],
        )
        .expect("valid");
        let result = engine.run(Some(42));
        audit::build(&engine, &result, None)
    }

    #[test]
    fn completing_records_counts_and_report() {
        let mut run = running();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.completed_at.is_none());

        run.complete(report(), at(10)).expect("running run completes");

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.completed_at, Some(at(10)));
        assert_eq!(run.matched_count, 1);
        assert_eq!(run.unmatched_count, 0);
        assert!(run.report().is_some());
    }

    #[test]
    fn terminal_runs_are_never_reopened() {
        let mut run = running();
        run.fail("database offline", at(10)).expect("running run fails");
        assert_eq!(run.failure(), Some("database offline"));

        let err = run.complete(report(), at(11)).expect_err("failed run stays failed");
        assert_eq!(err.from, RunStatus::Failed);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.completed_at, Some(at(10)));
    }

    #[test]
    fn audit_payload_round_trips_both_shapes() {
        let mut completed = running();
        completed.complete(report(), at(10)).expect("completes");
        let decoded: LotteryRun =
            serde_json::from_str(&serde_json::to_string(&completed).expect("encodes"))
                .expect("decodes");
        assert_eq!(decoded, completed);

        let mut failed = running();
        failed.fail("boom", at(10)).expect("fails");
        let encoded = serde_json::to_value(&failed).expect("encodes");
        assert_eq!(encoded["audit_report"]["error"], "boom");
        assert_eq!(encoded["status"], "FAILED");
    }
}
