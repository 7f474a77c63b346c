use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
    fs,
    path::Path,
    sync::Arc,
};

use ordered_float::OrderedFloat;
use polars::{
    df,
    frame::DataFrame,
    prelude::{CsvWriter, DataType, Field, PlSmallStr, Schema, SchemaRef, SerWriter},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    error::{DataError, GymError, GymResult, IoError, polars_to_gym_error},
    report::journal::EpisodeSummary,
};

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
pub enum LeaderboardCol {
    Rank,
    AgentUid,
    TotalReward,
    FinalValue,
    RejectedTrades,
    AgentParameterization,
}

impl From<LeaderboardCol> for PlSmallStr {
    fn from(value: LeaderboardCol) -> Self {
        value.as_str().into()
    }
}

impl LeaderboardCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Top agents of an evaluation run, best first.
///
/// # Example Table
///
/// | rank | agent_uid | total_reward | final_value | rejected_trades | agent_parameterization      |
/// |------|-----------|--------------|-------------|-----------------|-----------------------------|
/// | 1    | 17        | 812.40       | 10812.40    | 3               | { "seed": 17, "max_delta": 5 } |
/// | 2    | 4         | 455.10       | 10455.10    | 0               | { "seed": 4, "max_delta": 5 }  |
#[derive(Clone, Debug, PartialEq)]
pub struct Leaderboard {
    df: DataFrame,
}

impl Leaderboard {
    pub fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = LeaderboardCol::iter()
            .map(|col| {
                let dtype = match col {
                    LeaderboardCol::Rank | LeaderboardCol::RejectedTrades => DataType::UInt32,
                    LeaderboardCol::AgentUid => DataType::UInt64,
                    LeaderboardCol::TotalReward | LeaderboardCol::FinalValue => DataType::Float64,
                    LeaderboardCol::AgentParameterization => DataType::String,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
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

    pub fn to_csv(&self, path: impl AsRef<Path>) -> GymResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(IoError::Io)?;
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

// ================================================================================================
// The Accumulator
// ================================================================================================

/// Tracks the top-k agents by total reward.
///
/// A min-heap (`BinaryHeap<Reverse<LeaderboardEntry>>`) keeps the weakest of
/// the current top-k on top, so each new result costs one comparison.
#[derive(Clone, Debug)]
pub(crate) struct AgentLeaderboard<T> {
    pub top: BinaryHeap<Reverse<LeaderboardEntry>>,
    pub k: usize,
    /// Parameterizations of the agents currently in `top`.
    pub agent_data: HashMap<u64, T>,
}

impl<T> AgentLeaderboard<T> {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            top: BinaryHeap::with_capacity(k),
            k,
            agent_data: HashMap::with_capacity(k),
        }
    }

    pub(crate) fn update(&mut self, entry: LeaderboardEntry, agent: T) {
        if self.k == 0 {
            return;
        }

        if self.top.len() < self.k {
            self.top.push(Reverse(entry));
            self.agent_data.insert(entry.agent_uid, agent);
            return;
        }

        let qualifies = self.top.peek().is_none_or(|Reverse(worst)| entry > *worst);
        if qualifies && let Some(Reverse(evicted)) = self.top.pop() {
            self.agent_data.remove(&evicted.agent_uid);
            self.top.push(Reverse(entry));
            self.agent_data.insert(entry.agent_uid, agent);
        }
    }

    pub(crate) fn merge(mut self, other: Self) -> Self {
        self.top.extend(other.top);
        self.agent_data.extend(other.agent_data);
        while self.top.len() > self.k {
            if let Some(Reverse(evicted)) = self.top.pop() {
                self.agent_data.remove(&evicted.agent_uid);
            }
        }
        self
    }
}

impl<T> TryFrom<AgentLeaderboard<T>> for Leaderboard
where
    T: Serialize,
{
    type Error = GymError;

    fn try_from(value: AgentLeaderboard<T>) -> Result<Self, Self::Error> {
        let capacity = value.top.len();
        let mut rank = Vec::with_capacity(capacity);
        let mut agent_uid = Vec::with_capacity(capacity);
        let mut total_reward = Vec::with_capacity(capacity);
        let mut final_value = Vec::with_capacity(capacity);
        let mut rejected = Vec::with_capacity(capacity);
        let mut params = Vec::with_capacity(capacity);

        // `into_sorted_vec` is ascending on `Reverse`, i.e. best entry first.
        for (i, Reverse(entry)) in value.top.into_sorted_vec().into_iter().enumerate() {
            let agent = value.agent_data.get(&entry.agent_uid).ok_or_else(|| {
                IoError::WriteFailed(format!("Agent UID {} missing from cache", entry.agent_uid))
            })?;

            rank.push((i + 1) as u32);
            agent_uid.push(entry.agent_uid);
            total_reward.push(entry.score.0);
            final_value.push(entry.summary.final_value);
            rejected.push(entry.summary.rejected_trades);
            params.push(serde_json::to_string(agent).map_err(IoError::Json)?);
        }

        let df = df!(
            LeaderboardCol::Rank.to_string() => rank,
            LeaderboardCol::AgentUid.to_string() => agent_uid,
            LeaderboardCol::TotalReward.to_string() => total_reward,
            LeaderboardCol::FinalValue.to_string() => final_value,
            LeaderboardCol::RejectedTrades.to_string() => rejected,
            LeaderboardCol::AgentParameterization.to_string() => params,
        )
        .map_err(polars_to_gym_error)?;

        Ok(Self { df })
    }
}

/// One agent's result. Ordered by score; on ties the lower uid ranks higher.
#[derive(Copy, Clone, Debug)]
pub struct LeaderboardEntry {
    pub agent_uid: u64,
    pub score: OrderedFloat<f64>,
    pub summary: EpisodeSummary,
}

impl LeaderboardEntry {
    pub fn new(agent_uid: u64, summary: EpisodeSummary) -> Self {
        Self {
            agent_uid,
            score: OrderedFloat(summary.total_reward),
            summary,
        }
    }
}

impl PartialEq for LeaderboardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LeaderboardEntry {}

impl PartialOrd for LeaderboardEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LeaderboardEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.agent_uid.cmp(&self.agent_uid))
    }
}
