use std::{fs, path::Path};

use chrono::NaiveDate;
use polars::prelude::{Column, CsvWriter, DataFrame, SerWriter};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    data::{
        bar::PriceTable,
        csv::{DATE_FORMAT, PriceCol},
        domain::{InstrumentId, Price},
        indicator::{FeatureKind, IndicatorConfig, compute_features},
    },
    error::{GymResult, IoError, polars_to_gym_error},
};

/// Preprocessed, read-only feature table of one instrument.
///
/// Row `i` holds the close and every configured indicator at session `i`.
/// Features are stored row-major so an observation can copy a row in one go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    id: InstrumentId,
    dates: Vec<NaiveDate>,
    closes: Vec<Price>,
    kinds: Vec<FeatureKind>,
    features: Vec<f64>,
}

impl FeatureSeries {
    #[tracing::instrument(skip_all, fields(instrument = %table.id()))]
    pub fn build(table: &PriceTable, cfg: &IndicatorConfig) -> GymResult<Self> {
        cfg.validate()?;

        let columns = compute_features(table.bars(), cfg);
        let n = table.len();
        let mut features = Vec::with_capacity(n * columns.len());
        for row in 0..n {
            features.extend(columns.iter().map(|col| col[row]));
        }

        Ok(Self {
            id: table.id().clone(),
            dates: table.dates().collect(),
            closes: table.bars().iter().map(|b| b.close).collect(),
            kinds: cfg.features.clone(),
            features,
        })
    }

    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn feature_kinds(&self) -> &[FeatureKind] {
        &self.kinds
    }

    /// Values contributed per instrument to an observation: the close plus every feature.
    pub fn width(&self) -> usize {
        1 + self.kinds.len()
    }

    pub fn date_at(&self, step: usize) -> Option<NaiveDate> {
        self.dates.get(step).copied()
    }

    pub fn close_at(&self, step: usize) -> Option<Price> {
        self.closes.get(step).copied()
    }

    pub fn features_at(&self, step: usize) -> Option<&[f64]> {
        let k = self.kinds.len();
        let start = step.checked_mul(k)?;
        self.features.get(start..start + k)
    }

    /// A single feature column, in row order.
    pub fn column(&self, kind: FeatureKind) -> Option<Vec<f64>> {
        let k = self.kinds.len();
        let offset = self.kinds.iter().position(|&f| f == kind)?;
        Some(self.features.iter().skip(offset).step_by(k).copied().collect())
    }

    pub fn to_df(&self) -> GymResult<DataFrame> {
        let mut columns = Vec::with_capacity(2 + self.kinds.len());
        columns.push(Column::new(
            PriceCol::Date.as_str().into(),
            self.dates
                .iter()
                .map(|d| d.format(DATE_FORMAT).to_string())
                .collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            PriceCol::Close.as_str().into(),
            self.closes.iter().map(|p| p.0).collect::<Vec<_>>(),
        ));
        for &kind in &self.kinds {
            let values = self.column(kind).unwrap_or_default();
            columns.push(Column::new(kind.as_str().into(), values));
        }

        DataFrame::new(columns).map_err(polars_to_gym_error)
    }

    /// Writes [`FeatureSeries::to_df`] to `path` as CSV, creating parent directories.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> GymResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(IoError::Io)?;
        }

        let mut df = self.to_df()?;
        let mut file = fs::File::create(path).map_err(|e| {
            IoError::WriteFailed(format!("Failed to create {}: {e}", path.display()))
        })?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(polars_to_gym_error)
    }
}

/// Builds one feature series per table, in input order, in parallel.
#[tracing::instrument(skip_all, fields(instruments = tables.len()))]
pub fn build_all(tables: &[PriceTable], cfg: &IndicatorConfig) -> GymResult<Vec<FeatureSeries>> {
    cfg.validate()?;
    tables
        .par_iter()
        .map(|t| FeatureSeries::build(t, cfg))
        .collect()
}
