use std::fmt;

use serde::{Deserialize, Serialize};

use crate::impl_newtype;

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// Identifier of a tradable instrument (usually its ticker, e.g. `MSFT`).
///
/// The order in which instruments are handed to an environment is the
/// *canonical order*: holdings, observation blocks and action entries all
/// follow it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Represents a price level in the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Price(pub f64);
impl_newtype!(Price, f64);

impl Price {
    /// A price the ledger can trade against: finite and strictly positive.
    pub fn is_tradable(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }
}

/// Aggregated traded quantity of one session.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Volume(pub f64);
impl_newtype!(Volume, f64);

/// A non-negative whole number of shares held in one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Shares(pub u64);
impl_newtype!(Shares, u64);

impl Shares {
    /// Market value of the position at `price`.
    pub fn value_at(&self, price: Price) -> f64 {
        self.0 as f64 * price.0
    }
}
