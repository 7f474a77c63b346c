//! On-disk cache of preprocessed feature series.
//!
//! Files are named after a fingerprint of the indicator parameters and the
//! aligned price tables, so new bars or a different date range never hit an
//! old file, while settings the pipeline ignores (initial cash) share one.
//! Postcard carries no schema, so a file written by a different build of this
//! crate may fail to decode; callers treat any read error as a cache miss and
//! rebuild.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    data::{bar::PriceTable, indicator::IndicatorConfig, series::FeatureSeries},
    error::{EnvError, GymResult, IoError},
};

pub const CACHE_EXTENSION: &str = "postcard";

/// blake3 over the postcard encoding of `(cfg, tables)`.
pub fn fingerprint(cfg: &IndicatorConfig, tables: &[PriceTable]) -> GymResult<String> {
    let bytes = postcard::to_stdvec(&(cfg, tables)).map_err(EnvError::Encoding)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub fn cache_path(
    dir: impl AsRef<Path>,
    cfg: &IndicatorConfig,
    tables: &[PriceTable],
) -> GymResult<PathBuf> {
    let key = fingerprint(cfg, tables)?;
    Ok(dir.as_ref().join(format!("{key}.{CACHE_EXTENSION}")))
}

#[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display(), instruments = series.len()))]
pub fn write(
    dir: impl AsRef<Path>,
    cfg: &IndicatorConfig,
    tables: &[PriceTable],
    series: &[FeatureSeries],
) -> GymResult<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| {
        IoError::WriteFailed(format!("Failed to create directory {}: {e}", dir.display()))
    })?;

    let path = cache_path(dir, cfg, tables)?;
    let bytes = postcard::to_stdvec(series).map_err(|e| IoError::WriteFailed(e.to_string()))?;

    match fs::write(&path, bytes) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Wrote feature cache");
            Ok(path)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to write feature cache");
            Err(IoError::Io(e).into())
        }
    }
}

#[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub fn read(
    dir: impl AsRef<Path>,
    cfg: &IndicatorConfig,
    tables: &[PriceTable],
) -> GymResult<Vec<FeatureSeries>> {
    let path = cache_path(dir, cfg, tables)?;
    let data = fs::read(&path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Cache miss: feature cache not found");
        IoError::ReadFailed(format!("{}: {e}", path.display()))
    })?;

    let series: Vec<FeatureSeries> = postcard::from_bytes(&data).map_err(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Cache miss: deserialization failed (possible schema mismatch)"
        );
        IoError::ReadFailed(e.to_string())
    })?;

    tracing::info!(path = %path.display(), instruments = series.len(), "Loaded feature cache");
    Ok(series)
}
