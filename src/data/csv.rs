use std::{path::Path, sync::Arc};

use chrono::NaiveDate;
use polars::prelude::{
    DataFrame, DataType, Field, LazyCsvReader, LazyFileListReader, PlPath, Schema, SchemaRef,
};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    data::{
        bar::{PriceBar, PriceTable},
        domain::{InstrumentId, Price, Volume},
    },
    error::{DataError, GymResult, IoError, polars_to_gym_error},
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Columns of a raw price snapshot, in file order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum PriceCol {
    Date,
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
}

impl PriceCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Expected layout of a raw price snapshot. Dates stay strings so chrono owns
/// the parsing and reports the offending cell.
pub fn price_schema() -> SchemaRef {
    let fields: Vec<Field> = PriceCol::iter()
        .map(|col| {
            let dtype = match col {
                PriceCol::Date => DataType::String,
                PriceCol::Volume
                | PriceCol::Open
                | PriceCol::High
                | PriceCol::Low
                | PriceCol::Close
                | PriceCol::AdjClose => DataType::Float64,
            };
            Field::new(col.as_str().into(), dtype)
        })
        .collect();

    Arc::new(Schema::from_iter(fields))
}

impl PriceTable {
    /// Loads a price snapshot with header `date,open,high,low,close,adj_close,volume`.
    #[tracing::instrument(skip(path), fields(instrument = %id, path = %path.as_ref().display()))]
    pub fn from_csv(id: InstrumentId, path: impl AsRef<Path>) -> GymResult<Self> {
        let path = path.as_ref();
        let uri = path.to_str().ok_or_else(|| {
            IoError::ReadFailed(format!(
                "Path contains invalid UTF-8 characters: {}",
                path.display()
            ))
        })?;
        if !path.exists() {
            return Err(IoError::ReadFailed(format!("No such file: {}", path.display())).into());
        }

        let df = LazyCsvReader::new(PlPath::new(uri))
            .with_has_header(true)
            .with_schema(Some(price_schema()))
            .finish()
            .map_err(polars_to_gym_error)?
            .collect()
            .map_err(polars_to_gym_error)?;

        let table = Self::from_df(id, &df)?;
        tracing::debug!(rows = table.len(), "Loaded price table");
        Ok(table)
    }

    /// Converts a frame laid out like [`price_schema`] into a validated table.
    pub fn from_df(id: InstrumentId, df: &DataFrame) -> GymResult<Self> {
        let dates = df
            .column(PriceCol::Date.as_str())
            .map_err(|_| DataError::MissingColumn(PriceCol::Date.to_string()))?
            .str()
            .map_err(polars_to_gym_error)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| -> GymResult<NaiveDate> {
                let raw = cell.ok_or_else(|| DataError::NullValue {
                    column: PriceCol::Date.to_string(),
                    row,
                })?;
                NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                    .map_err(|_| DataError::InvalidDate(raw.to_string()).into())
            })
            .collect::<GymResult<Vec<_>>>()?;

        let open = f64_column(df, PriceCol::Open)?;
        let high = f64_column(df, PriceCol::High)?;
        let low = f64_column(df, PriceCol::Low)?;
        let close = f64_column(df, PriceCol::Close)?;
        let adj_close = f64_column(df, PriceCol::AdjClose)?;
        let volume = f64_column(df, PriceCol::Volume)?;

        let bars = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| PriceBar {
                date,
                open: Price(open[i]),
                high: Price(high[i]),
                low: Price(low[i]),
                close: Price(close[i]),
                adj_close: Price(adj_close[i]),
                volume: Volume(volume[i]),
            })
            .collect();

        PriceTable::new(id, bars)
    }
}

fn f64_column(df: &DataFrame, col: PriceCol) -> GymResult<Vec<f64>> {
    df.column(col.as_str())
        .map_err(|_| DataError::MissingColumn(col.to_string()))?
        .f64()
        .map_err(polars_to_gym_error)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| -> GymResult<f64> {
            v.ok_or_else(|| {
                DataError::NullValue {
                    column: col.to_string(),
                    row,
                }
                .into()
            })
        })
        .collect()
}
