use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::data::bar::PriceBar;

/// A trait for incremental indicators over a scalar input (usually the close).
/// Designed to be object-safe so agents can hold `Box<dyn StreamingIndicator>`.
pub trait StreamingIndicator: std::fmt::Debug + Send + Sync {
    /// Update the indicator with the latest scalar value (e.g., close price).
    /// Returns `Some(value)` if the indicator is warm (enough data seen), otherwise `None`.
    fn update(&mut self, value: f64) -> Option<f64>;

    /// Reset the internal state to clear history (e.g., for a new episode).
    fn reset(&mut self);
}

/// Incremental indicators that need the whole bar (high/low range, volume).
pub trait BarIndicator: std::fmt::Debug + Send + Sync {
    fn update(&mut self, bar: &PriceBar) -> Option<f64>;

    fn reset(&mut self);
}

// ================================================================================================
// SMA: Simple Moving Average
// ================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSma {
    window_size: usize,
    buffer: VecDeque<f64>,
    sum: f64,
}

impl StreamingSma {
    pub fn new(window_size: u16) -> Self {
        let size = window_size as usize;
        Self {
            window_size: size,
            buffer: VecDeque::with_capacity(size),
            sum: 0.0,
        }
    }
}

impl StreamingIndicator for StreamingSma {
    fn update(&mut self, value: f64) -> Option<f64> {
        self.buffer.push_back(value);
        self.sum += value;

        if self.buffer.len() > self.window_size
            && let Some(removed) = self.buffer.pop_front()
        {
            self.sum -= removed;
        }

        (self.buffer.len() >= self.window_size).then(|| self.sum / self.buffer.len() as f64)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.sum = 0.0;
    }
}

// ================================================================================================
// SHARED: Exponential Weighted Mean (Base Logic)
// ================================================================================================

/// Recursive mean $y_t = \alpha x_t + (1 - \alpha) y_{t-1}$ seeded with $y_0 = x_0$.
/// Backs EMA and MACD (`alpha = 2 / (W + 1)`, `ewm(adjust=False)` in pandas terms).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamingEwm {
    alpha: f64,
    mean: Option<f64>,
    min_periods: usize,
    count: usize,
}

impl StreamingEwm {
    fn new(alpha: f64, min_periods: usize) -> Self {
        Self {
            alpha,
            mean: None,
            min_periods,
            count: 0,
        }
    }

    fn update(&mut self, value: f64) -> Option<f64> {
        let mean = match self.mean {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.mean = Some(mean);
        self.count += 1;

        (self.count >= self.min_periods).then_some(mean)
    }

    fn reset(&mut self) {
        self.mean = None;
        self.count = 0;
    }
}

// ================================================================================================
// EMA: Exponential Moving Average
// ================================================================================================

/// EMA with smoothing span `W` (`alpha = 2 / (W + 1)`).
///
/// Warm from the first value: the first output equals the first input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingEma {
    inner: StreamingEwm,
}

impl StreamingEma {
    pub fn new(span: u16) -> Self {
        let alpha = 2.0 / (span as f64 + 1.0);
        Self {
            inner: StreamingEwm::new(alpha, 1),
        }
    }
}

impl StreamingIndicator for StreamingEma {
    fn update(&mut self, value: f64) -> Option<f64> {
        self.inner.update(value)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

// ================================================================================================
// MACD: fast EMA - slow EMA
// ================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingMacd {
    fast: StreamingEma,
    slow: StreamingEma,
}

impl StreamingMacd {
    pub fn new(fast: u16, slow: u16) -> Self {
        Self {
            fast: StreamingEma::new(fast),
            slow: StreamingEma::new(slow),
        }
    }
}

impl StreamingIndicator for StreamingMacd {
    fn update(&mut self, value: f64) -> Option<f64> {
        match (self.fast.update(value), self.slow.update(value)) {
            (Some(fast), Some(slow)) => Some(fast - slow),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
    }
}

// ================================================================================================
// RSI: Relative Strength Index
// ================================================================================================

/// Bias-corrected exponential mean: every observation `x_{t-i}` weighs
/// `(1 - alpha)^i`, normalised by the sum of the weights in play.
///
/// Matches `ewm(adjust=True)` in pandas; unlike [`StreamingEwm`] the first
/// observation does not dominate the warm-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamingAdjustedEwm {
    decay: f64,
    weighted_sum: f64,
    weight_total: f64,
    min_periods: usize,
    count: usize,
}

impl StreamingAdjustedEwm {
    fn new(alpha: f64, min_periods: usize) -> Self {
        Self {
            decay: 1.0 - alpha,
            weighted_sum: 0.0,
            weight_total: 0.0,
            min_periods,
            count: 0,
        }
    }

    fn update(&mut self, value: f64) -> Option<f64> {
        self.weighted_sum = value + self.decay * self.weighted_sum;
        self.weight_total = 1.0 + self.decay * self.weight_total;
        self.count += 1;

        (self.count >= self.min_periods).then(|| self.weighted_sum / self.weight_total)
    }

    fn reset(&mut self) {
        self.weighted_sum = 0.0;
        self.weight_total = 0.0;
        self.count = 0;
    }
}

/// RSI with Wilder's `alpha = 1 / W` over bias-corrected means of gains and losses.
///
/// The first price counts as a zero change, so the output is warm from the
/// `W`-th price on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingRsi {
    prev_price: Option<f64>,
    avg_gain: StreamingAdjustedEwm,
    avg_loss: StreamingAdjustedEwm,
}

impl StreamingRsi {
    pub fn new(window_size: u16) -> Self {
        let alpha = 1.0 / (window_size as f64);
        let win = window_size as usize;

        Self {
            prev_price: None,
            avg_gain: StreamingAdjustedEwm::new(alpha, win),
            avg_loss: StreamingAdjustedEwm::new(alpha, win),
        }
    }
}

impl StreamingIndicator for StreamingRsi {
    fn update(&mut self, value: f64) -> Option<f64> {
        let delta = self.prev_price.replace(value).map_or(0.0, |prev| value - prev);

        let gain = self.avg_gain.update(delta.max(0.0));
        let loss = self.avg_loss.update((-delta).max(0.0));
        Some(rsi_from_averages(gain?, loss?))
    }

    fn reset(&mut self) {
        self.prev_price = None;
        self.avg_gain.reset();
        self.avg_loss.reset();
    }
}

/// 50 on a flat line, 100 when there were only gains.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

// ================================================================================================
// ROC: Rate of Change
// ================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingRoc {
    window_size: usize,
    buffer: VecDeque<f64>,
}

impl StreamingRoc {
    pub fn new(window_size: u16) -> Self {
        let size = window_size as usize;
        Self {
            window_size: size,
            buffer: VecDeque::with_capacity(size + 1),
        }
    }
}

impl StreamingIndicator for StreamingRoc {
    fn update(&mut self, value: f64) -> Option<f64> {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window_size + 1 {
            self.buffer.pop_front();
        }

        if self.buffer.len() <= self.window_size {
            return None;
        }

        let base = *self.buffer.front()?;
        if base == 0.0 {
            Some(0.0)
        } else {
            Some((value - base) / base * 100.0)
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

// ================================================================================================
// SHARED: Rolling high/low range
// ================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RollingRange {
    window_size: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
}

impl RollingRange {
    fn new(window_size: usize) -> Self {
        Self {
            window_size,
            highs: VecDeque::with_capacity(window_size),
            lows: VecDeque::with_capacity(window_size),
        }
    }

    /// Returns `(highest high, lowest low)` once the window is full.
    fn update(&mut self, high: f64, low: f64) -> Option<(f64, f64)> {
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > self.window_size {
            self.highs.pop_front();
            self.lows.pop_front();
        }

        if self.highs.len() < self.window_size {
            return None;
        }

        let hh = self.highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ll = self.lows.iter().copied().fold(f64::INFINITY, f64::min);
        Some((hh, ll))
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
    }
}

// ================================================================================================
// Stochastic Oscillator (%K, smoothed)
// ================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingStochastic {
    range: RollingRange,
    smoothing: StreamingSma,
}

impl StreamingStochastic {
    pub fn new(window_size: u16, smoothing: u16) -> Self {
        Self {
            range: RollingRange::new(window_size as usize),
            smoothing: StreamingSma::new(smoothing),
        }
    }
}

impl BarIndicator for StreamingStochastic {
    fn update(&mut self, bar: &PriceBar) -> Option<f64> {
        let (hh, ll) = self.range.update(bar.high.0, bar.low.0)?;
        let raw = if hh == ll {
            // Flat market: the close sits nowhere in a zero-width range
            50.0
        } else {
            (bar.close.0 - ll) / (hh - ll) * 100.0
        };
        self.smoothing.update(raw)
    }

    fn reset(&mut self) {
        self.range.reset();
        self.smoothing.reset();
    }
}

// ================================================================================================
// Williams %R
// ================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingWilliamsR {
    range: RollingRange,
}

impl StreamingWilliamsR {
    pub fn new(window_size: u16) -> Self {
        Self {
            range: RollingRange::new(window_size as usize),
        }
    }
}

impl BarIndicator for StreamingWilliamsR {
    fn update(&mut self, bar: &PriceBar) -> Option<f64> {
        let (hh, ll) = self.range.update(bar.high.0, bar.low.0)?;
        if hh == ll {
            Some(-50.0)
        } else {
            Some((hh - bar.close.0) / (hh - ll) * -100.0)
        }
    }

    fn reset(&mut self) {
        self.range.reset();
    }
}

// ================================================================================================
// OBV: On-Balance Volume
// ================================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamingObv {
    prev_close: Option<f64>,
    total: f64,
}

impl StreamingObv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BarIndicator for StreamingObv {
    fn update(&mut self, bar: &PriceBar) -> Option<f64> {
        let close = bar.close.0;
        if let Some(prev) = self.prev_close {
            if close > prev {
                self.total += bar.volume.0;
            } else if close < prev {
                self.total -= bar.volume.0;
            }
        }
        self.prev_close = Some(close);
        Some(self.total)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ================================================================================================
// ADI: Accumulation / Distribution
// ================================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamingAdi {
    started: bool,
    total: f64,
}

impl StreamingAdi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BarIndicator for StreamingAdi {
    fn update(&mut self, bar: &PriceBar) -> Option<f64> {
        // The running total starts at zero on the first bar.
        if !self.started {
            self.started = true;
            return Some(self.total);
        }

        let (high, low, close) = (bar.high.0, bar.low.0, bar.close.0);
        let range = high - low;
        let multiplier = if range == 0.0 {
            0.0
        } else {
            ((close - low) - (high - close)) / range
        };
        self.total += multiplier * bar.volume.0;
        Some(self.total)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
