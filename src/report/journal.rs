use std::{fs, path::Path, sync::Arc};

use chrono::NaiveDate;
use polars::{
    df,
    frame::DataFrame,
    prelude::{CsvWriter, DataType, Field, PlSmallStr, Schema, SchemaRef, SerWriter},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    data::csv::DATE_FORMAT,
    error::{DataError, GymResult, IoError, polars_to_gym_error},
};

/// What happened during one `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step pointer at which the trades were applied.
    pub step: usize,
    /// Session of that step.
    pub date: NaiveDate,
    pub cash: f64,
    /// Post-trade portfolio value, marked at the session's close.
    pub portfolio_value: f64,
    pub reward: f64,
    pub executed: u32,
    pub rejected: u32,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum JournalCol {
    Step,
    Date,
    Cash,
    PortfolioValue,
    Reward,
    /// Trades applied in this step.
    Executed,
    /// Trades the ledger skipped in this step.
    Rejected,
}

impl From<JournalCol> for PlSmallStr {
    fn from(value: JournalCol) -> Self {
        value.as_str().into()
    }
}

impl JournalCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Step-by-step log of one episode as a data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Journal {
    df: DataFrame,
}

impl Journal {
    pub fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = JournalCol::iter()
            .map(|col| {
                let dtype = match col {
                    JournalCol::Step => DataType::UInt64,
                    JournalCol::Date => DataType::String,
                    JournalCol::Cash | JournalCol::PortfolioValue | JournalCol::Reward => {
                        DataType::Float64
                    }
                    JournalCol::Executed | JournalCol::Rejected => DataType::UInt32,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }

    pub fn from_records(records: &[StepRecord]) -> GymResult<Self> {
        let df = df!(
            JournalCol::Step.to_string() => records.iter().map(|r| r.step as u64).collect::<Vec<_>>(),
            JournalCol::Date.to_string() => records.iter().map(|r| r.date.format(DATE_FORMAT).to_string()).collect::<Vec<_>>(),
            JournalCol::Cash.to_string() => records.iter().map(|r| r.cash).collect::<Vec<_>>(),
            JournalCol::PortfolioValue.to_string() => records.iter().map(|r| r.portfolio_value).collect::<Vec<_>>(),
            JournalCol::Reward.to_string() => records.iter().map(|r| r.reward).collect::<Vec<_>>(),
            JournalCol::Executed.to_string() => records.iter().map(|r| r.executed).collect::<Vec<_>>(),
            JournalCol::Rejected.to_string() => records.iter().map(|r| r.rejected).collect::<Vec<_>>(),
        )
        .map_err(polars_to_gym_error)?;

        Self::new(df)
    }

    /// Wraps a frame after checking that it carries every journal column.
    pub fn new(df: DataFrame) -> GymResult<Self> {
        for col in JournalCol::iter() {
            if df.column(col.as_str()).is_err() {
                return Err(DataError::MissingColumn(col.to_string()).into());
            }
        }
        Ok(Self { df })
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn total_reward(&self) -> GymResult<f64> {
        let rewards = self
            .df
            .column(JournalCol::Reward.as_str())
            .map_err(polars_to_gym_error)?
            .f64()
            .map_err(polars_to_gym_error)?;
        Ok(rewards.into_iter().flatten().sum())
    }

    pub fn to_csv(&self, path: impl AsRef<Path>) -> GymResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                IoError::WriteFailed(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut df = self.df.clone();
        let mut file = fs::File::create(path).map_err(IoError::Io)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| {
                DataError::DataFrame(format!("Failed to write CSV to '{}': {e}", path.display()))
                    .into()
            })
    }
}

/// Headline numbers of one finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub initial_value: f64,
    pub final_value: f64,
    pub total_reward: f64,
    pub steps: usize,
    pub executed_trades: u32,
    pub rejected_trades: u32,
}

impl EpisodeSummary {
    pub fn from_records(initial_value: f64, records: &[StepRecord]) -> Self {
        Self {
            initial_value,
            final_value: records
                .last()
                .map_or(initial_value, |r| r.portfolio_value),
            total_reward: records.iter().map(|r| r.reward).sum(),
            steps: records.len(),
            executed_trades: records.iter().map(|r| r.executed).sum(),
            rejected_trades: records.iter().map(|r| r.rejected).sum(),
        }
    }

    /// Relative change of portfolio value over the episode. 0 for a worthless start.
    pub fn return_pct(&self) -> f64 {
        if self.initial_value == 0.0 {
            0.0
        } else {
            (self.final_value / self.initial_value - 1.0) * 100.0
        }
    }
}
