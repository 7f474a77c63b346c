use serde::{Deserialize, Serialize};

use crate::{
    data::domain::InstrumentId,
    error::{EnvError, GymResult},
};

/// One signed share delta per instrument, in canonical order.
///
/// `> 0` buys, `< 0` sells, `0` holds. No bound is applied here; the ledger
/// rejects what it cannot fill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actions(Vec<i64>);

impl Actions {
    pub fn new(deltas: Vec<i64>) -> Self {
        Self(deltas)
    }

    pub fn deltas(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_hold(&self) -> bool {
        self.0.iter().all(|&d| d == 0)
    }
}

impl From<Vec<i64>> for Actions {
    fn from(deltas: Vec<i64>) -> Self {
        Self(deltas)
    }
}

/// Maps instrument ids onto action slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    ids: Vec<InstrumentId>,
}

impl ActionSpace {
    pub fn new(ids: Vec<InstrumentId>) -> Self {
        Self { ids }
    }

    pub fn instruments(&self) -> &[InstrumentId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn slot(&self, id: &InstrumentId) -> GymResult<usize> {
        self.ids
            .iter()
            .position(|i| i == id)
            .ok_or_else(|| EnvError::UnknownInstrument(id.to_string()).into())
    }

    pub fn hold(&self) -> Actions {
        Actions(vec![0; self.ids.len()])
    }

    /// Builds a positional action from `(instrument, delta)` pairs.
    /// Instruments not mentioned hold; repeated instruments accumulate.
    pub fn actions<'a, I>(&self, pairs: I) -> GymResult<Actions>
    where
        I: IntoIterator<Item = (&'a InstrumentId, i64)>,
    {
        let mut deltas = vec![0i64; self.ids.len()];
        for (id, delta) in pairs {
            let slot = self.slot(id)?;
            deltas[slot] = deltas[slot].saturating_add(delta);
        }
        Ok(Actions(deltas))
    }

    /// Fails with [`EnvError::ActionLength`] unless `actions` has one entry per instrument.
    pub fn check(&self, actions: &Actions) -> GymResult<()> {
        if actions.len() == self.ids.len() {
            Ok(())
        } else {
            Err(EnvError::ActionLength {
                expected: self.ids.len(),
                got: actions.len(),
            }
            .into())
        }
    }
}
