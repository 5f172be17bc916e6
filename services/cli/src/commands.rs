use crate::cli::{GroupArgs, RunAllArgs, RunArgs, VerifyArgs};
use crate::infra::{print_json, run_instant, usage};
use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use summer_lottery::config::AppConfig;
use summer_lottery::error::AppError;
use summer_lottery::lottery::{
    write_results_csv, ActorId, GroupId, InMemoryLotteryStore, LotteryError, LotteryService,
    RunId, RunSummary, SeedPolicy, Snapshot,
};
use summer_lottery::telemetry;
use tracing::{debug, error, info, warn};

/// Loaded configuration plus the data file every command works against.
pub(crate) struct Session {
    config: AppConfig,
    data_path: PathBuf,
    store: InMemoryLotteryStore,
}

impl Session {
    pub(crate) fn open(data: Option<PathBuf>) -> Result<Self, AppError> {
        let config = AppConfig::load()?;
        telemetry::init(&config.telemetry)?;

        let data_path = data
            .or_else(|| config.lottery.data_path.clone())
            .ok_or_else(|| {
                AppError::Usage("no lottery data file; pass --data or set LOTTERY_DATA".to_string())
            })?;
        let store = InMemoryLotteryStore::from_snapshot(Snapshot::load(&data_path)?);

        info!(?config.environment, data = %data_path.display(), "lottery data loaded");
        Ok(Self {
            config,
            data_path,
            store,
        })
    }

    fn service(&self, policy: SeedPolicy) -> LotteryService<InMemoryLotteryStore> {
        LotteryService::new(Arc::new(self.store.clone())).with_seed_policy(policy)
    }

    fn save(&self) -> Result<(), AppError> {
        let snapshot = self.store.snapshot().map_err(LotteryError::from)?;
        snapshot.save(&self.data_path)?;
        debug!(data = %self.data_path.display(), "lottery data saved");
        Ok(())
    }
}

/// A seed from the command line wins over `LOTTERY_SEED`; without either, `unseeded` applies.
fn seed_policy(
    explicit: Option<u64>,
    configured: Option<u64>,
    unseeded: SeedPolicy,
) -> SeedPolicy {
    explicit
        .or(configured)
        .map(SeedPolicy::Fixed)
        .unwrap_or(unseeded)
}

#[derive(Debug, Serialize)]
struct GroupOutcome {
    group_id: GroupId,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Verification {
    run_id: RunId,
    verified: bool,
    seed: u64,
    matched: usize,
    reserves: usize,
}

pub(crate) fn preview(session: &Session, args: GroupArgs) -> Result<(), AppError> {
    let group = GroupId::new(args.group).map_err(usage)?;
    let preview = session.service(SeedPolicy::default()).preview(&group)?;
    print_json(&preview)
}

pub(crate) fn run_group(session: &Session, args: RunArgs) -> Result<(), AppError> {
    let group = GroupId::new(args.group).map_err(usage)?;
    let actor = ActorId::new(args.actor).map_err(usage)?;

    let policy = seed_policy(args.seed, session.config.lottery.seed, SeedPolicy::TimeDerived);
    let service = session.service(policy);
    let outcome = service.run_for_group_at(&group, &actor, run_instant(args.today, Utc::now()));
    // Filter rejections and failed runs are recorded even when the run errors out.
    session.save()?;
    let run = outcome?;

    if let Some(path) = args.results_csv {
        write_results_csv(&run, BufWriter::new(File::create(&path)?))?;
        info!(run = %run.id, path = %path.display(), "results exported");
    }

    print_json(&run.summary())
}

pub(crate) async fn run_all(session: &Session, args: RunAllArgs) -> Result<(), AppError> {
    let actor = ActorId::new(args.actor).map_err(usage)?;
    // Groups start within the same millisecond, so a time-derived seed would repeat.
    let policy = seed_policy(args.seed, session.config.lottery.seed, SeedPolicy::Random);
    let service = Arc::new(session.service(policy));

    let mut handles = Vec::new();
    for group in service.groups()? {
        let service = Arc::clone(&service);
        let actor = actor.clone();
        let group_id = group.id.clone();
        let handle = tokio::task::spawn_blocking(move || {
            service.run_for_group_at(&group.id, &actor, Utc::now())
        });
        handles.push((group_id, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (group_id, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(run)) => GroupOutcome {
                group_id,
                run: Some(run.summary()),
                error: None,
            },
            Ok(Err(err)) => {
                warn!(group = %group_id, error = %err, "group not drawn");
                GroupOutcome {
                    group_id,
                    run: None,
                    error: Some(err.to_string()),
                }
            }
            Err(err) => {
                error!(group = %group_id, error = %err, "lottery task aborted");
                GroupOutcome {
                    group_id,
                    run: None,
                    error: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    session.save()?;
    print_json(&outcomes)
}

pub(crate) fn history(session: &Session, args: GroupArgs) -> Result<(), AppError> {
    let group = GroupId::new(args.group).map_err(usage)?;
    let summaries: Vec<RunSummary> = session
        .service(SeedPolicy::default())
        .runs_for_group(&group)?
        .iter()
        .map(|run| run.summary())
        .collect();
    print_json(&summaries)
}

pub(crate) fn verify(session: &Session, args: VerifyArgs) -> Result<(), AppError> {
    let run_id = RunId::new(args.run).map_err(usage)?;
    let result = session.service(SeedPolicy::default()).verify_run(&run_id)?;
    info!(run = %run_id, "audit replay matches the recorded outcome");
    print_json(&Verification {
        run_id,
        verified: true,
        seed: result.seed,
        matched: result.matches.len(),
        reserves: result.reserves.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_seed_beats_configured_seed() {
        assert_eq!(
            seed_policy(Some(7), Some(9), SeedPolicy::Random),
            SeedPolicy::Fixed(7)
        );
        assert_eq!(
            seed_policy(None, Some(9), SeedPolicy::Random),
            SeedPolicy::Fixed(9)
        );
    }

    #[test]
    fn unseeded_batches_draw_independent_seeds() {
        assert_eq!(seed_policy(None, None, SeedPolicy::Random), SeedPolicy::Random);
        assert_eq!(
            seed_policy(None, None, SeedPolicy::TimeDerived),
            SeedPolicy::TimeDerived
        );
    }
}
