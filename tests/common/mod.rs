#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use marketgym::prelude::*;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/prices")
        .join(name)
}

/// `AAA.csv` and `BBB.csv`: 45 sessions each, 43 in common.
pub fn fixture_sources() -> Vec<(InstrumentId, PathBuf)> {
    vec![
        (InstrumentId::new("AAA"), fixture_path("AAA.csv")),
        (InstrumentId::new("BBB"), fixture_path("BBB.csv")),
    ]
}

pub fn load_fixture_tables() -> Vec<PriceTable> {
    fixture_sources()
        .into_iter()
        .map(|(id, path)| PriceTable::from_csv(id, path).expect("fixture must load"))
        .collect()
}

/// Daily bars at the given closes with a narrow, valid high/low range.
pub fn synthetic_table(id: &str, closes: &[f64]) -> PriceTable {
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).expect("valid date");
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar {
            date: start + Days::new(i as u64),
            open: Price(c),
            high: Price(c + 0.25),
            low: Price(c - 0.25),
            close: Price(c),
            adj_close: Price(c),
            volume: Volume(5_000.0),
        })
        .collect();
    PriceTable::new(id.into(), bars).expect("synthetic table must be valid")
}
