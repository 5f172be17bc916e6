use std::io::Write;

use serde::Serialize;

use super::domain::{ApplicantId, JobId};
use super::run::LotteryRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Offered,
    Reserve,
}

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    applicant_id: &'a ApplicantId,
    job_id: Option<&'a JobId>,
    outcome: Outcome,
}

/// Write a completed run's outcome as CSV: winners in applicant order, then reserves in
/// the order they were drawn. Runs without a report produce only the header.
pub fn write_results_csv<W: Write>(run: &LotteryRun, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    match run.report() {
        Some(report) => {
            for (applicant_id, job_id) in &report.matches {
                csv_writer.serialize(ResultRow {
                    applicant_id,
                    job_id: Some(job_id),
                    outcome: Outcome::Offered,
                })?;
            }
            for applicant_id in &report.reserves {
                csv_writer.serialize(ResultRow {
                    applicant_id,
                    job_id: None,
                    outcome: Outcome::Reserve,
                })?;
            }
        }
        None => csv_writer.write_record(["applicant_id", "job_id", "outcome"])?,
    }

    csv_writer.flush()?;
    Ok(())
}
