// 1. Traits
pub use crate::agent::Agent;
pub use crate::gym::Env;
pub use crate::math::indicator::{BarIndicator, StreamingIndicator};

// 2. The Core "Loop" Types
pub use crate::gym::{
    EnvStatus, Reward, StepOutcome,
    action::{ActionSpace, Actions},
    config::EnvConfig,
    env::Environment,
    observation::{Observation, ObservationSpace},
};

// 3. Market Data
pub use crate::data::bar::{PriceBar, PriceTable, align};
pub use crate::data::domain::{InstrumentId, Price, Shares, Volume};
pub use crate::data::indicator::{FeatureKind, IndicatorConfig};
pub use crate::data::series::FeatureSeries;

// 4. Agents & Reports
pub use crate::agent::{AgentIdentifier, HoldAgent, RandomAgent};
pub use crate::report::journal::{EpisodeSummary, Journal, StepRecord};
pub use crate::report::leaderboard::Leaderboard;

// 5. Errors
pub use crate::error::{AgentError, DataError, EnvError, GymError, GymResult, IoError};

// 6. Factories
pub use crate::gym::factory::{load, make, make_from_csv};
