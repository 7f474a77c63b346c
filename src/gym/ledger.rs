use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data::domain::{InstrumentId, Price, Shares},
    gym::action::Actions,
};

/// Why a single trade intent was not applied.
///
/// This never leaves the environment: a rejected trade becomes a no-op for
/// that instrument and the rest of the action vector still executes.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TradeRejected {
    #[error("insufficient cash: need {needed}, have {available}")]
    InsufficientCash { needed: f64, available: f64 },

    #[error("insufficient shares: selling {requested}, holding {held}")]
    InsufficientShares { requested: u64, held: u64 },

    #[error("price {0} is not tradable")]
    InvalidPrice(f64),

    #[error("position size overflow")]
    PositionOverflow,

    #[error("no instrument at slot {0}")]
    UnknownSlot(usize),
}

/// Outcome counters of one batch of trade intents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub executed: u32,
    pub rejected: u32,
}

/// Cash plus whole-share holdings, one slot per instrument in canonical order.
///
/// Every successful mutation is one validated trade; cash and holdings never
/// go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    ids: Vec<InstrumentId>,
    cash: f64,
    holdings: Vec<Shares>,
}

impl Ledger {
    pub fn new(ids: Vec<InstrumentId>, initial_cash: f64) -> Self {
        let holdings = vec![Shares::default(); ids.len()];
        Self {
            ids,
            cash: initial_cash,
            holdings,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> &[Shares] {
        &self.holdings
    }

    pub fn holding(&self, id: &InstrumentId) -> Option<Shares> {
        let idx = self.ids.iter().position(|i| i == id)?;
        self.holdings.get(idx).copied()
    }

    pub fn instruments(&self) -> &[InstrumentId] {
        &self.ids
    }

    /// Cash plus every holding marked at `prices` (canonical order).
    pub fn value(&self, prices: &[Price]) -> f64 {
        self.cash
            + self
                .holdings
                .iter()
                .zip(prices)
                .map(|(shares, &price)| shares.value_at(price))
                .sum::<f64>()
    }

    pub fn reset(&mut self, initial_cash: f64) {
        self.cash = initial_cash;
        self.holdings.fill(Shares::default());
    }

    /// Applies one share delta for instrument `idx` at `price`.
    ///
    /// Positive buys, negative sells, zero is a no-op. On rejection neither cash
    /// nor holdings change.
    pub fn apply_trade(&mut self, idx: usize, delta: i64, price: Price) -> Result<(), TradeRejected> {
        if delta == 0 {
            return Ok(());
        }
        if !price.is_tradable() {
            return Err(TradeRejected::InvalidPrice(price.0));
        }
        let Some(&held) = self.holdings.get(idx) else {
            return Err(TradeRejected::UnknownSlot(idx));
        };

        let qty = delta.unsigned_abs();
        let notional = qty as f64 * price.0;

        let (cash, shares) = if delta > 0 {
            if notional > self.cash {
                return Err(TradeRejected::InsufficientCash {
                    needed: notional,
                    available: self.cash,
                });
            }
            let shares = held
                .0
                .checked_add(qty)
                .ok_or(TradeRejected::PositionOverflow)?;
            (self.cash - notional, shares)
        } else {
            if qty > held.0 {
                return Err(TradeRejected::InsufficientShares {
                    requested: qty,
                    held: held.0,
                });
            }
            (self.cash + notional, held.0 - qty)
        };

        self.cash = cash;
        self.holdings[idx] = Shares(shares);
        Ok(())
    }

    /// Applies every entry of `actions` in canonical order at `prices`.
    ///
    /// Rejections are logged and counted, then skipped.
    pub fn apply_actions(&mut self, actions: &Actions, prices: &[Price]) -> ActionSummary {
        let mut report = ActionSummary::default();

        for (idx, (&delta, &price)) in actions.deltas().iter().zip(prices).enumerate() {
            if delta == 0 {
                continue;
            }
            match self.apply_trade(idx, delta, price) {
                Ok(()) => report.executed += 1,
                Err(reason) => {
                    tracing::debug!(
                        instrument = ?self.ids.get(idx),
                        delta,
                        price = price.0,
                        %reason,
                        "Trade rejected"
                    );
                    report.rejected += 1;
                }
            }
        }

        report
    }
}
