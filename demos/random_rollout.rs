use std::{env, fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use marketgym::prelude::*;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let _guard = init_tracing()?;

    println!("Starting random rollout...");

    let build_start = Instant::now();
    let mut env = environment()?;
    let build_time = build_start.elapsed();

    let mut hold = HoldAgent;
    let baseline = env.evaluate_agent(&mut hold)?;
    env.journal()?.to_csv(report_dir().join("hold_journal.csv"))?;

    let n_agents = 256u64;
    let sweep_start = Instant::now();
    let agents = (0..n_agents)
        .into_par_iter()
        .map(|seed| RandomAgent::new(seed, 10).map(|a| (seed as usize, a)))
        .collect::<GymResult<Vec<_>>>()?;
    let leaderboard = env.evaluate_agents(agents.into_par_iter(), 10, n_agents)?;
    let sweep_time = sweep_start.elapsed();
    leaderboard.to_csv(report_dir().join("random_leaderboard.csv"))?;

    println!("\n--- Rollout Summary ---");
    println!("Sessions:                        {}", env.len());
    println!("Hold baseline return:            {:.2}%", baseline.return_pct());
    println!("1. Environment build time:       {build_time:?}");
    println!("2. {n_agents} random agents run time:  {sweep_time:?}");

    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "marketgym";

    let in_container =
        env::var("CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stdout (container mode)");
        Ok(None)
    } else {
        let log_dir = dirs::state_dir()
            .or_else(dirs::home_dir)
            .map(|mut p| {
                p.push(app_name);
                p.push("logs");
                p
            })
            .context("Failed to find a state or home directory")?;
        fs::create_dir_all(&log_dir)?;

        let timestamp = time::OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format timestamp")?;
        let file_name = format!("{app_name}-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!(log_file = %log_dir.join(&file_name).display(), "Logging to file (local mode)");
        Ok(Some(guard))
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/prices")
        .join(name)
}

fn report_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/reports")
}

fn environment() -> Result<Environment> {
    let cfg = EnvConfig::default()
        .with_initial_cash(25_000.0)
        .with_window(10);
    let sources = [
        (InstrumentId::new("AAA"), fixture("AAA.csv")),
        (InstrumentId::new("BBB"), fixture("BBB.csv")),
    ];
    let env = marketgym::make_from_csv(cfg, &sources)?;
    Ok(env)
}
