//! Daily-bar market simulation for reinforcement-learning trading agents.
//!
//! Raw OHLCV tables go through the indicator pipeline into immutable
//! [`data::series::FeatureSeries`]; an [`gym::env::Environment`] walks them
//! step by step, applying each action vector to a cash/shares ledger and
//! rewarding the change in portfolio value.

pub mod agent;
pub mod data;
pub mod error;
pub mod gym;
pub mod macros;
pub mod math;
pub mod prelude;
pub mod report;

pub use gym::factory::{load, make, make_from_csv};
