use std::{path::Path, sync::Arc};

use crate::{
    data::{
        bar::{PriceTable, align},
        domain::InstrumentId,
        series::{FeatureSeries, build_all},
        store,
    },
    error::{EnvError, GymResult},
    gym::{config::EnvConfig, env::Environment},
};

/// Builds an environment from raw price tables.
///
/// Tables are restricted to their common sessions, run through the indicator
/// pipeline in parallel, and handed to the simulation in the given order.
#[tracing::instrument(skip_all, fields(hash = tracing::field::Empty, instruments = tables.len()))]
pub fn make(cfg: impl Into<EnvConfig>, tables: Vec<PriceTable>) -> GymResult<Environment> {
    let env_cfg: EnvConfig = cfg.into();
    if let Err(e) = env_cfg.validate() {
        tracing::error!(error = %e, "Invalid environment configuration");
        return Err(e);
    }
    if let Ok(hash) = env_cfg.hash() {
        tracing::Span::current().record("hash", &hash);
    }

    let series = preprocess(&env_cfg, tables)?;
    Environment::new(env_cfg, series.into())
}

/// Like [`make`], loading each instrument from a CSV snapshot first.
pub fn make_from_csv<P: AsRef<Path>>(
    cfg: impl Into<EnvConfig>,
    sources: &[(InstrumentId, P)],
) -> GymResult<Environment> {
    make(cfg, read_tables(sources)?)
}

/// Restores the feature series from `dir` when a matching cache exists,
/// otherwise builds them and writes the cache.
///
/// Caches are keyed by the indicator parameters and the aligned bars, so
/// refreshed prices always rebuild. A restored cache must also carry the same
/// instruments, sessions and closes as the input. Any read failure is a miss.
#[tracing::instrument(skip_all, fields(hash = tracing::field::Empty, dir = %dir.as_ref().display()))]
pub fn load(
    cfg: impl Into<EnvConfig>,
    dir: impl AsRef<Path>,
    tables: Vec<PriceTable>,
) -> GymResult<Environment> {
    let env_cfg: EnvConfig = cfg.into();
    if let Err(e) = env_cfg.validate() {
        tracing::error!(error = %e, "Invalid environment configuration");
        return Err(e);
    }
    if let Ok(hash) = env_cfg.hash() {
        tracing::Span::current().record("hash", &hash);
    }

    let tables = align(tables)?;
    let series = match store::read(&dir, env_cfg.indicators(), &tables) {
        Ok(cached) if matches_tables(&cached, &tables) => {
            tracing::info!("Cache hit: Initializing environment from loaded data.");
            cached
        }
        Ok(_) => {
            tracing::warn!("Cache does not match its input bars. Rebuilding.");
            build_and_store(&env_cfg, &tables, dir.as_ref())?
        }
        Err(_) => {
            tracing::info!("Cache miss: Building new environment.");
            build_and_store(&env_cfg, &tables, dir.as_ref())?
        }
    };

    Environment::new(env_cfg, Arc::from(series))
}

fn preprocess(cfg: &EnvConfig, tables: Vec<PriceTable>) -> GymResult<Vec<FeatureSeries>> {
    if tables.is_empty() {
        let e = EnvError::InvalidConfig("at least one instrument is required".to_string());
        tracing::error!(error = %e, "Invalid environment configuration");
        return Err(e.into());
    }
    let tables = align(tables)?;
    build_all(&tables, cfg.indicators())
}

fn build_and_store(
    cfg: &EnvConfig,
    tables: &[PriceTable],
    dir: &Path,
) -> GymResult<Vec<FeatureSeries>> {
    let series = build_all(tables, cfg.indicators())?;
    if let Err(e) = store::write(dir, cfg.indicators(), tables, &series) {
        tracing::warn!(error = %e, "Could not write feature cache; continuing without it");
    }
    Ok(series)
}

fn matches_tables(series: &[FeatureSeries], tables: &[PriceTable]) -> bool {
    series.len() == tables.len()
        && series.iter().zip(tables).all(|(s, t)| {
            s.id() == t.id()
                && s.len() == t.len()
                && t.bars().iter().enumerate().all(|(i, bar)| {
                    s.date_at(i) == Some(bar.date) && s.close_at(i) == Some(bar.close)
                })
        })
}

fn read_tables<P: AsRef<Path>>(sources: &[(InstrumentId, P)]) -> GymResult<Vec<PriceTable>> {
    sources
        .iter()
        .map(|(id, path)| PriceTable::from_csv(id.clone(), path))
        .collect()
}
