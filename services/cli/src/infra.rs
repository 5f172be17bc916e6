use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use summer_lottery::error::AppError;
use summer_lottery::lottery::{SnapshotError, MAX_SEED};

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_seed(raw: &str) -> Result<u64, String> {
    let seed: u64 = raw
        .trim()
        .parse()
        .map_err(|err| format!("failed to parse '{raw}' as a seed ({err})"))?;
    if seed > MAX_SEED {
        return Err(format!("seed {seed} is above the maximum of {MAX_SEED}"));
    }
    Ok(seed)
}

/// The run instant: the current time of day on `today` when a date override is given.
pub(crate) fn run_instant(today: Option<NaiveDate>, now: DateTime<Utc>) -> DateTime<Utc> {
    match today {
        Some(date) => date.and_time(now.time()).and_utc(),
        None => now,
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(SnapshotError::from)?;
    println!("{rendered}");
    Ok(())
}

/// Malformed command-line input the caller can correct.
pub(crate) fn usage(err: impl std::fmt::Display) -> AppError {
    AppError::Usage(err.to_string())
}
