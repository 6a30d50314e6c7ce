use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tide_pool::{ElasticPool, PoolConfig, PoolSnapshot, Preset, format_duration};
use tokio::sync::mpsc;
use tracing::info;

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub size: Option<usize>,
    pub jobs: usize,
    pub job_ms: u64,
    pub priorities: u32,
    pub blocking: bool,
    pub report_ms: u64,
}

/// Final report printed as JSON.
#[derive(Debug, Serialize)]
struct RunSummary {
    core_size: usize,
    max_size: usize,
    idle_timeout: String,
    dispatch_timeout: String,
    jobs: usize,
    completed: usize,
    elapsed_ms: u128,
    stats: PoolSnapshot,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let pool = ElasticPool::new(config.clone())?;

    let job_time = Duration::from_millis(args.job_ms);
    let priorities = args.priorities.max(1);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();

    let started = Instant::now();
    for i in 0..args.jobs {
        let priority = (i % priorities as usize) as i32;
        let done_tx = done_tx.clone();
        if args.blocking {
            pool.execute_blocking(
                move || {
                    std::thread::sleep(job_time);
                    let _ = done_tx.send(());
                },
                priority,
            )?;
        } else {
            pool.execute(
                async move {
                    tokio::time::sleep(job_time).await;
                    let _ = done_tx.send(());
                },
                priority,
            )?;
        }
    }
    drop(done_tx);
    info!(jobs = args.jobs, priorities, "workload submitted");

    let mut completed = 0;
    let mut ticker = tokio::time::interval(Duration::from_millis(args.report_ms.max(1)));
    while completed < args.jobs {
        tokio::select! {
            done = done_rx.recv() => match done {
                Some(()) => completed += 1,
                // Every job either finished or was dropped.
                None => break,
            },
            _ = ticker.tick() => {
                let stats = pool.stats();
                info!(
                    alive = stats.alive_workers,
                    pending = stats.pending,
                    executed = stats.executed,
                    spawned = stats.spawned,
                    retired = stats.retired,
                    "progress"
                );
            }
        }
    }
    let elapsed = started.elapsed();

    pool.shutdown_and_join().await;

    let summary = RunSummary {
        core_size: config.core_size,
        max_size: config.max_size,
        idle_timeout: format_duration(config.idle_timeout),
        dispatch_timeout: format_duration(config.dispatch_timeout),
        jobs: args.jobs,
        completed,
        elapsed_ms: elapsed.as_millis(),
        stats: pool.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn resolve_config(args: &RunArgs) -> anyhow::Result<PoolConfig> {
    if let Some(path) = &args.config {
        return Ok(PoolConfig::from_file(path)?);
    }
    let config = match args.preset.as_deref() {
        Some(name) => name.parse::<Preset>()?.config(args.size)?,
        None => PoolConfig::cached(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            preset: None,
            size: None,
            jobs: 4,
            job_ms: 1,
            priorities: 2,
            blocking: false,
            report_ms: 50,
        }
    }

    #[test]
    fn defaults_to_cached_preset() {
        assert_eq!(resolve_config(&args()).unwrap(), PoolConfig::cached());
    }

    #[test]
    fn fixed_preset_uses_size() {
        let mut args = args();
        args.preset = Some("fixed".to_string());
        args.size = Some(3);
        assert_eq!(resolve_config(&args).unwrap(), PoolConfig::fixed(3));
    }

    #[test]
    fn fixed_preset_without_size_fails() {
        let mut args = args();
        args.preset = Some("fixed".to_string());
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn unknown_preset_fails() {
        let mut args = args();
        args.preset = Some("turbo".to_string());
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn config_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.toml");
        std::fs::write(&path, "[pool]\npreset = \"single\"\n").unwrap();

        let mut args = args();
        args.config = Some(path);
        assert_eq!(resolve_config(&args).unwrap(), PoolConfig::single());
    }

    #[tokio::test]
    async fn runs_small_workload() {
        let mut args = args();
        args.preset = Some("fixed".to_string());
        args.size = Some(2);
        run(args).await.unwrap();
    }
}
