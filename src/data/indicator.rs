//! Batch indicator pipeline.
//!
//! Every function here is pure: it takes one instrument's chronologically
//! ordered series and returns one value per row. Row `i` only depends on rows
//! `0..=i`, so no value ever looks ahead.
//!
//! Rows where an indicator is not defined yet (window not filled) or where its
//! formula divides by zero get a fixed fill value instead of `NaN`; see
//! [`FeatureKind::fill_value`]. NaN in an observation silently corrupts
//! training, so the pipeline never emits one for finite input.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    data::bar::PriceBar,
    error::{EnvError, GymResult},
    math::indicator::{
        BarIndicator, StreamingAdi, StreamingEma, StreamingIndicator, StreamingMacd, StreamingObv,
        StreamingRoc, StreamingRsi, StreamingSma, StreamingStochastic, StreamingWilliamsR,
    },
};

pub const DEFAULT_WINDOW: u16 = 14;
pub const DEFAULT_STOCHASTIC_SMOOTHING: u16 = 3;
pub const DEFAULT_MACD_FAST: u16 = 12;
pub const DEFAULT_MACD_SLOW: u16 = 26;

/// The derived feature columns an instrument can expose.
///
/// The declaration order is the default column order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    Sma,
    Ema,
    Rsi,
    StochasticK,
    Macd,
    Adi,
    Obv,
    Roc,
    WilliamsR,
    Disparity,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Value emitted where the indicator is undefined.
    ///
    /// | feature        | fill                    |
    /// |----------------|-------------------------|
    /// | `sma`, `ema`   | the row's close         |
    /// | `rsi`, `stochastic_k` | `50`             |
    /// | `williams_r`   | `-50`                   |
    /// | `disparity`    | `100`                   |
    /// | `macd`, `roc`, `adi`, `obv` | `0`        |
    pub fn fill_value(&self, close: f64) -> f64 {
        match self {
            FeatureKind::Sma | FeatureKind::Ema => close,
            FeatureKind::Rsi | FeatureKind::StochasticK => 50.0,
            FeatureKind::WilliamsR => -50.0,
            FeatureKind::Disparity => 100.0,
            FeatureKind::Macd | FeatureKind::Roc | FeatureKind::Adi | FeatureKind::Obv => 0.0,
        }
    }
}

/// Lookback parameters and the ordered set of feature columns to derive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Lookback window `W` shared by SMA, EMA, RSI, %K, Williams %R, ROC and disparity.
    pub window: u16,
    /// Short SMA applied to the raw %K line.
    pub stochastic_smoothing: u16,
    pub macd_fast: u16,
    pub macd_slow: u16,
    pub features: Vec<FeatureKind>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            stochastic_smoothing: DEFAULT_STOCHASTIC_SMOOTHING,
            macd_fast: DEFAULT_MACD_FAST,
            macd_slow: DEFAULT_MACD_SLOW,
            features: FeatureKind::iter().collect(),
        }
    }
}

impl IndicatorConfig {
    pub fn with_window(self, window: u16) -> Self {
        Self { window, ..self }
    }

    pub fn with_stochastic_smoothing(self, stochastic_smoothing: u16) -> Self {
        Self {
            stochastic_smoothing,
            ..self
        }
    }

    pub fn with_macd(self, fast: u16, slow: u16) -> Self {
        Self {
            macd_fast: fast,
            macd_slow: slow,
            ..self
        }
    }

    pub fn with_features(self, features: Vec<FeatureKind>) -> Self {
        Self { features, ..self }
    }

    pub fn validate(&self) -> GymResult<()> {
        let invalid = |msg: String| Err(EnvError::InvalidConfig(msg).into());

        if self.window == 0 {
            return invalid("indicator window must be at least 1".to_string());
        }
        if self.stochastic_smoothing == 0 {
            return invalid("stochastic smoothing must be at least 1".to_string());
        }
        if self.macd_fast == 0 || self.macd_fast >= self.macd_slow {
            return invalid(format!(
                "MACD spans must satisfy 0 < fast < slow, got fast={} slow={}",
                self.macd_fast, self.macd_slow
            ));
        }
        if self.features.is_empty() {
            return invalid("at least one feature is required".to_string());
        }
        for (i, kind) in self.features.iter().enumerate() {
            if self.features[..i].contains(kind) {
                return invalid(format!("duplicate feature '{kind}'"));
            }
        }
        Ok(())
    }
}

// ================================================================================================
// Pipeline
// ================================================================================================

/// Derives every configured feature column for one instrument.
///
/// Returns one column per entry of `cfg.features`, in that order, each as long
/// as `bars`. EMA is derived first since disparity is defined against it.
pub fn compute_features(bars: &[PriceBar], cfg: &IndicatorConfig) -> Vec<Vec<f64>> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close.0).collect();
    let adj_closes: Vec<f64> = bars.iter().map(|b| b.adj_close.0).collect();
    let ema_col = ema(&closes, cfg.window);

    cfg.features
        .iter()
        .map(|kind| match kind {
            FeatureKind::Sma => sma(&closes, cfg.window),
            FeatureKind::Ema => ema_col.clone(),
            FeatureKind::Rsi => rsi(&adj_closes, cfg.window),
            FeatureKind::StochasticK => {
                stochastic_k(bars, cfg.window, cfg.stochastic_smoothing)
            }
            FeatureKind::Macd => macd(&closes, cfg.macd_fast, cfg.macd_slow),
            FeatureKind::Adi => adi(bars),
            FeatureKind::Obv => obv(bars),
            FeatureKind::Roc => roc(&closes, cfg.window),
            FeatureKind::WilliamsR => williams_r(bars, cfg.window),
            FeatureKind::Disparity => disparity(&closes, &ema_col),
        })
        .collect()
}

// ================================================================================================
// Indicators
// ================================================================================================

/// Unweighted mean of the last `window` closes. The first `window - 1` rows
/// carry the row's own close.
pub fn sma(closes: &[f64], window: u16) -> Vec<f64> {
    let mut ind = StreamingSma::new(window);
    closes
        .iter()
        .map(|&c| ind.update(c).unwrap_or(FeatureKind::Sma.fill_value(c)))
        .collect()
}

/// `EMA_t = a * close_t + (1 - a) * EMA_{t-1}`, `a = 2 / (span + 1)`, `EMA_0 = close_0`.
pub fn ema(closes: &[f64], span: u16) -> Vec<f64> {
    run_scalar(StreamingEma::new(span), closes, FeatureKind::Ema)
}

/// RSI on a 0..100 scale over adjusted closes, so splits and dividends do not
/// register as moves. Undefined for the first `window - 1` rows and on a
/// perfectly flat series; both map to 50.
pub fn rsi(adj_closes: &[f64], window: u16) -> Vec<f64> {
    run_scalar(StreamingRsi::new(window), adj_closes, FeatureKind::Rsi)
}

/// `fast EMA - slow EMA` of closes.
pub fn macd(closes: &[f64], fast: u16, slow: u16) -> Vec<f64> {
    run_scalar(StreamingMacd::new(fast, slow), closes, FeatureKind::Macd)
}

/// Percentage change of the close against the close `window` rows earlier.
pub fn roc(closes: &[f64], window: u16) -> Vec<f64> {
    run_scalar(StreamingRoc::new(window), closes, FeatureKind::Roc)
}

/// Close as a percentage of its EMA. `ema` must be the EMA column of the same closes.
pub fn disparity(closes: &[f64], ema: &[f64]) -> Vec<f64> {
    closes
        .iter()
        .zip(ema)
        .map(|(&c, &e)| {
            if e == 0.0 || !e.is_finite() {
                FeatureKind::Disparity.fill_value(c)
            } else {
                c / e * 100.0
            }
        })
        .collect()
}

/// %K over a `window` high/low range, smoothed by an SMA of `smoothing` rows.
/// A zero-width range counts as 50.
pub fn stochastic_k(bars: &[PriceBar], window: u16, smoothing: u16) -> Vec<f64> {
    run_bar(
        StreamingStochastic::new(window, smoothing),
        bars,
        FeatureKind::StochasticK,
    )
}

/// Williams %R on a -100..0 scale over the same range as %K.
pub fn williams_r(bars: &[PriceBar], window: u16) -> Vec<f64> {
    run_bar(StreamingWilliamsR::new(window), bars, FeatureKind::WilliamsR)
}

/// Cumulative accumulation/distribution line, zero on the first row.
pub fn adi(bars: &[PriceBar]) -> Vec<f64> {
    run_bar(StreamingAdi::new(), bars, FeatureKind::Adi)
}

/// Cumulative on-balance volume, zero on the first row.
pub fn obv(bars: &[PriceBar]) -> Vec<f64> {
    run_bar(StreamingObv::new(), bars, FeatureKind::Obv)
}

fn run_scalar(mut ind: impl StreamingIndicator, closes: &[f64], kind: FeatureKind) -> Vec<f64> {
    closes
        .iter()
        .map(|&c| sanitize(ind.update(c), kind, c))
        .collect()
}

fn run_bar(mut ind: impl BarIndicator, bars: &[PriceBar], kind: FeatureKind) -> Vec<f64> {
    bars.iter()
        .map(|bar| sanitize(ind.update(bar), kind, bar.close.0))
        .collect()
}

fn sanitize(value: Option<f64>, kind: FeatureKind, close: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => kind.fill_value(close),
    }
}
