use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    data::domain::{InstrumentId, Price, Volume},
    error::{DataError, GymResult},
};

/// One trading session of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub adj_close: Price,
    pub volume: Volume,
}

/// A validated, chronologically ordered price history of one instrument.
///
/// # Invariants
/// - at least one bar,
/// - dates strictly increasing (no duplicates),
/// - `open`, `high`, `low`, `close` finite and positive, `low <= high`,
/// - `volume` finite and non-negative.
///
/// Session filtering (weekends, exchange holidays) happens during acquisition;
/// a table only checks what it can see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    id: InstrumentId,
    bars: Vec<PriceBar>,
}

impl PriceTable {
    pub fn new(id: InstrumentId, bars: Vec<PriceBar>) -> GymResult<Self> {
        if bars.is_empty() {
            return Err(DataError::EmptySeries(id.to_string()).into());
        }

        for bar in &bars {
            validate_bar(&id, bar)?;
        }

        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(DataError::NonMonotonicDates {
                instrument: id.to_string(),
                prev: w[0].date.to_string(),
                next: w[1].date.to_string(),
            }
            .into());
        }

        Ok(Self { id, bars })
    }

    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close.0).collect()
    }
}

/// Restricts every table to the dates present in *all* tables.
///
/// After alignment, the same row index maps to the same calendar date across
/// instruments, which is what the environment assumes. Fails when the
/// intersection is empty.
pub fn align(tables: Vec<PriceTable>) -> GymResult<Vec<PriceTable>> {
    let Some(first) = tables.first() else {
        return Ok(tables);
    };

    let common = tables
        .iter()
        .skip(1)
        .fold(first.dates().collect::<BTreeSet<_>>(), |acc, t| {
            let dates = t.dates().collect::<BTreeSet<_>>();
            acc.intersection(&dates).copied().collect()
        });

    tables
        .into_iter()
        .map(|t| {
            let before = t.len();
            let bars = t
                .bars
                .into_iter()
                .filter(|b| common.contains(&b.date))
                .collect::<Vec<_>>();
            if bars.len() < before {
                tracing::debug!(
                    instrument = %t.id,
                    dropped = before - bars.len(),
                    "Dropped sessions missing from other instruments"
                );
            }
            PriceTable::new(t.id, bars)
        })
        .collect()
}

fn validate_bar(id: &InstrumentId, bar: &PriceBar) -> GymResult<()> {
    let invalid = |msg: &str| -> GymResult<()> {
        Err(DataError::InvalidBar {
            instrument: id.to_string(),
            date: bar.date.to_string(),
            msg: msg.to_string(),
        }
        .into())
    };

    let prices = [bar.open, bar.high, bar.low, bar.close];
    if !prices.iter().all(Price::is_tradable) {
        return invalid("open/high/low/close must be finite and positive");
    }
    if !bar.adj_close.0.is_finite() {
        return invalid("adj_close must be finite");
    }
    if bar.low > bar.high {
        return invalid("low is above high");
    }
    if !bar.volume.0.is_finite() || bar.volume.0 < 0.0 {
        return invalid("volume must be finite and non-negative");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: Price(close),
            high: Price(close + 1.0),
            low: Price(close * 0.5),
            close: Price(close),
            adj_close: Price(close),
            volume: Volume(1_000.0),
        }
    }

    #[test]
    fn rejects_empty_table() {
        let err = PriceTable::new(InstrumentId::new("MSFT"), vec![]).unwrap_err();
        assert!(err.to_string().contains("Empty price series"));
    }

    #[test]
    fn rejects_duplicate_and_decreasing_dates() {
        let dup = vec![bar("2024-01-02", 10.0), bar("2024-01-02", 11.0)];
        assert!(PriceTable::new("MSFT".into(), dup).is_err());

        let back = vec![bar("2024-01-03", 10.0), bar("2024-01-02", 11.0)];
        let err = PriceTable::new("MSFT".into(), back).unwrap_err();
        assert!(err.to_string().contains("2024-01-03 followed by 2024-01-02"));
    }

    #[test]
    fn rejects_inverted_range_and_bad_prices() {
        let mut inverted = bar("2024-01-02", 10.0);
        inverted.low = Price(12.0);
        assert!(PriceTable::new("MSFT".into(), vec![inverted]).is_err());

        let mut nan = bar("2024-01-02", 10.0);
        nan.close = Price(f64::NAN);
        assert!(PriceTable::new("MSFT".into(), vec![nan]).is_err());

        let mut negative_volume = bar("2024-01-02", 10.0);
        negative_volume.volume = Volume(-1.0);
        assert!(PriceTable::new("MSFT".into(), vec![negative_volume]).is_err());
    }

    #[test]
    fn align_keeps_only_common_sessions() {
        let a = PriceTable::new(
            "AAA".into(),
            vec![
                bar("2024-01-02", 1.0),
                bar("2024-01-03", 2.0),
                bar("2024-01-04", 3.0),
            ],
        )
        .unwrap();
        let b = PriceTable::new(
            "BBB".into(),
            vec![bar("2024-01-03", 20.0), bar("2024-01-04", 30.0), bar("2024-01-05", 40.0)],
        )
        .unwrap();

        let aligned = align(vec![a, b]).unwrap();
        assert_eq!(aligned.len(), 2);
        for t in &aligned {
            let dates: Vec<String> = t.dates().map(|d| d.to_string()).collect();
            assert_eq!(dates, vec!["2024-01-03", "2024-01-04"]);
        }
        assert_eq!(aligned[0].closes(), vec![2.0, 3.0]);
        assert_eq!(aligned[1].closes(), vec![20.0, 30.0]);
    }

    #[test]
    fn align_fails_without_overlap() {
        let a = PriceTable::new("AAA".into(), vec![bar("2024-01-02", 1.0)]).unwrap();
        let b = PriceTable::new("BBB".into(), vec![bar("2024-01-03", 1.0)]).unwrap();
        assert!(align(vec![a, b]).is_err());
    }
}
