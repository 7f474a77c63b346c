use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};
use strum::{Display, EnumString};

use crate::{
    error::{AgentError, GymResult},
    gym::{action::Actions, observation::Observation},
};

/// Represents the unique identifier of an agent, used in logs and reports.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    Default,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentIdentifier {
    /// A custom user-defined agent.
    #[strum(to_string = "{0}")]
    Named(Arc<String>),

    #[default]
    Random,

    Hold,
}

/// A decision-maker driving an environment step by step.
pub trait Agent {
    /// Decide on one share delta per instrument for the current observation.
    fn act(&mut self, obs: &Observation) -> GymResult<Actions>;

    /// Optional agent name for logging/debugging.
    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Named(Arc::new(
            "UnnamedAgent: override Agent::identifier()".to_string(),
        ))
    }

    /// Reset internal state at the end of an episode. Default is no-op.
    fn reset(&mut self) {}
}

impl Agent for Box<dyn Agent> {
    fn act(&mut self, obs: &Observation) -> GymResult<Actions> {
        (**self).act(obs)
    }

    fn identifier(&self) -> AgentIdentifier {
        (**self).identifier()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

// ============================================================================
//  Baseline Agents
// ============================================================================

/// Never trades.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HoldAgent;

impl Agent for HoldAgent {
    fn act(&mut self, obs: &Observation) -> GymResult<Actions> {
        Ok(Actions::new(vec![0; obs.instruments()]))
    }

    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Hold
    }
}

/// Draws every share delta uniformly from `-max_delta..=max_delta`.
///
/// Seeded, so a given `seed` replays the same action sequence after `reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomAgent {
    seed: u64,
    max_delta: i64,
    #[serde(skip, default = "default_rng")]
    rng: StdRng,
}

fn default_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

impl RandomAgent {
    pub fn new(seed: u64, max_delta: i64) -> GymResult<Self> {
        if max_delta < 0 {
            return Err(AgentError::InvalidInput(format!(
                "max_delta must be non-negative, got {max_delta}"
            ))
            .into());
        }
        Ok(Self {
            seed,
            max_delta,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn max_delta(&self) -> i64 {
        self.max_delta
    }
}

impl Agent for RandomAgent {
    fn act(&mut self, obs: &Observation) -> GymResult<Actions> {
        let deltas = (0..obs.instruments())
            .map(|_| self.rng.random_range(-self.max_delta..=self.max_delta))
            .collect();
        Ok(Actions::new(deltas))
    }

    fn identifier(&self) -> AgentIdentifier {
        AgentIdentifier::Random
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn obs() -> Observation {
        Observation::new(array![100.0, 0.0, 0.0, 10.0, 20.0], 2)
    }

    #[test]
    fn hold_agent_never_trades() {
        let a = HoldAgent.act(&obs()).unwrap();
        assert_eq!(a.deltas(), &[0, 0]);
    }

    #[test]
    fn random_agent_is_bounded_and_replayable() {
        let mut agent = RandomAgent::new(7, 3).unwrap();
        let first: Vec<Actions> = (0..20).map(|_| agent.act(&obs()).unwrap()).collect();
        assert!(
            first
                .iter()
                .flat_map(|a| a.deltas().to_vec())
                .all(|d| (-3..=3).contains(&d))
        );

        agent.reset();
        let again: Vec<Actions> = (0..20).map(|_| agent.act(&obs()).unwrap()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn random_agent_rejects_negative_bound() {
        assert!(RandomAgent::new(1, -1).is_err());
    }

    #[test]
    fn identifiers() {
        assert_eq!(HoldAgent.identifier().to_string(), "HOLD");
        let boxed: Box<dyn Agent> = Box::new(RandomAgent::new(1, 1).unwrap());
        assert_eq!(boxed.identifier(), AgentIdentifier::Random);
    }
}
