use ndarray::{Array1, ArrayView1, s};
use serde::{Deserialize, Serialize};

use crate::data::{domain::InstrumentId, indicator::FeatureKind};

/// Snapshot handed to the decision-maker after `reset` and every `step`.
///
/// Layout, with `n` instruments and `w` values per instrument:
///
/// ```text
/// [cash, shares_0 .. shares_{n-1}, close_0, f_0_0 .. f_0_{w-2}, .., close_{n-1}, ..]
/// ```
///
/// The length `1 + n + n * w` is fixed for a given environment. Each call
/// allocates a fresh array, so holding on to an observation never aliases
/// simulation state.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    values: Array1<f64>,
    instruments: usize,
}

impl Observation {
    pub(crate) fn new(values: Array1<f64>, instruments: usize) -> Self {
        Self {
            values,
            instruments,
        }
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn into_array(self) -> Array1<f64> {
        self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn instruments(&self) -> usize {
        self.instruments
    }

    pub fn cash(&self) -> f64 {
        self.values[0]
    }

    pub fn holdings(&self) -> ArrayView1<'_, f64> {
        self.values.slice(s![1..1 + self.instruments])
    }

    /// `[close, features..]` of the instrument in slot `idx`.
    pub fn instrument(&self, idx: usize) -> Option<ArrayView1<'_, f64>> {
        if idx >= self.instruments {
            return None;
        }
        let width = self.instrument_width();
        let start = 1 + self.instruments + idx * width;
        Some(self.values.slice(s![start..start + width]))
    }

    pub fn close(&self, idx: usize) -> Option<f64> {
        self.instrument(idx).map(|block| block[0])
    }

    fn instrument_width(&self) -> usize {
        match self.instruments {
            0 => 0,
            n => (self.values.len() - 1 - n) / n,
        }
    }
}

/// Names and lower bounds of every observation slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    pub names: Vec<String>,
    pub low: Vec<f64>,
}

impl ObservationSpace {
    pub fn new(ids: &[InstrumentId], features: &[FeatureKind]) -> Self {
        let len = 1 + ids.len() * (2 + features.len());
        let mut names = Vec::with_capacity(len);
        let mut low = Vec::with_capacity(len);

        names.push("cash".to_string());
        low.push(0.0);
        for id in ids {
            names.push(format!("shares.{id}"));
            low.push(0.0);
        }
        for id in ids {
            names.push(format!("{id}.close"));
            low.push(0.0);
            for kind in features {
                names.push(format!("{id}.{kind}"));
                low.push(f64::NEG_INFINITY);
            }
        }

        Self { names, low }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
