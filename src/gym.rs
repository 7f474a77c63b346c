use serde::{Deserialize, Serialize};

use crate::{
    error::GymResult,
    gym::{action::Actions, observation::Observation},
    impl_newtype,
};

pub mod action;
pub mod config;
pub mod env;
pub mod factory;
pub mod ledger;
pub mod observation;

/// Change in portfolio value over one step, in the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Reward(pub f64);
impl_newtype!(Reward, f64; signed);

pub trait Env {
    /// Starts a new episode from the configured initial cash.
    fn reset(&mut self) -> GymResult<Observation>;

    /// Applies `actions` at the current session and advances time.
    fn step(&mut self, actions: &Actions) -> GymResult<(Observation, Reward, StepOutcome)>;
}

/// Lifecycle of a simulation.
///
/// ```md
/// Current State | Action  | Next State | Notes
/// --------------|---------|------------|------------------------------------------
/// any           | reset() | Ready      | step pointer back to 0, ledger refilled
/// `Ready`       | step()  | Running    | pointer advanced, last session not reached
/// `Ready`       | step()  | Terminated | single-session series, or two sessions
/// `Running`     | step()  | Running    | continue within episode
/// `Running`     | step()  | Terminated | pointer reached the last session
/// `Terminated`  | step()  | error      | `EnvError::InvalidTransition`, no mutation
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvStatus {
    /// Post-reset, step pointer at 0.
    Ready,

    /// Mid-episode.
    Running,

    /// The last session was reached. Only `reset()` is accepted.
    Terminated,
}

impl EnvStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    InProgress,
    /// end of data, the episode is over
    Terminated,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}
