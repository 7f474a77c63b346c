use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use ndarray::Array1;
use rayon::iter::ParallelIterator;
use serde::Serialize;

use crate::{
    agent::Agent,
    data::{domain::Price, series::FeatureSeries},
    error::{EnvError, GymError, GymResult},
    gym::{
        Env, EnvStatus, Reward, StepOutcome,
        action::{ActionSpace, Actions},
        config::{EnvConfig, validate_cash},
        ledger::Ledger,
        observation::{Observation, ObservationSpace},
    },
    report::{
        journal::{EpisodeSummary, Journal, StepRecord},
        leaderboard::{AgentLeaderboard, Leaderboard, LeaderboardEntry},
    },
};

/// The market simulation: owns a ledger and a step pointer over shared,
/// time-aligned feature series.
///
/// Cloning is cheap on data: clones share the series and own an independent
/// ledger, step pointer and previous portfolio value.
#[derive(Clone, Debug)]
pub struct Environment {
    cfg: EnvConfig,

    /// One series per instrument, in canonical order, all of equal length.
    series: Arc<[FeatureSeries]>,

    action_space: ActionSpace,
    observation_space: ObservationSpace,

    ledger: Ledger,

    /// Index of the current session, `0..=last_step()`.
    step: usize,

    /// Portfolio value after the previous step (or at reset); reward baseline.
    prev_value: f64,

    /// Portfolio value at reset.
    initial_value: f64,

    status: EnvStatus,

    /// One record per `step` of the current episode.
    history: Vec<StepRecord>,
}

impl Environment {
    pub fn cfg(&self) -> &EnvConfig {
        &self.cfg
    }

    pub fn series(&self) -> &Arc<[FeatureSeries]> {
        &self.series
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    pub fn observation_space(&self) -> &ObservationSpace {
        &self.observation_space
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn status(&self) -> EnvStatus {
        self.status
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Number of sessions in every series.
    pub fn len(&self) -> usize {
        self.series.first().map_or(0, FeatureSeries::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the final session; the episode ends when the pointer gets here.
    pub fn last_step(&self) -> usize {
        self.len().saturating_sub(1)
    }

    /// Length of every observation this environment produces.
    pub fn observation_len(&self) -> usize {
        self.observation_space.len()
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// Current portfolio value, marked at the current session's close.
    ///
    /// Once the episode is done the pointer sits on the final session, so this
    /// includes the final bar's move, which no reward covers. The rewarded
    /// end value is [`EpisodeSummary::final_value`].
    pub fn portfolio_value(&self) -> GymResult<f64> {
        Ok(self.ledger.value(&self.prices(self.step)?))
    }

    pub fn journal(&self) -> GymResult<Journal> {
        Journal::from_records(&self.history)
    }

    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary::from_records(self.initial_value, &self.history)
    }

    /// Starts a new episode with `initial_cash` instead of the configured amount.
    #[tracing::instrument(skip(self))]
    pub fn reset_with_cash(&mut self, initial_cash: f64) -> GymResult<Observation> {
        validate_cash(initial_cash)?;

        self.ledger.reset(initial_cash);
        self.step = 0;
        self.prev_value = self.ledger.value(&self.prices(0)?);
        self.initial_value = self.prev_value;
        self.history.clear();
        self.status = EnvStatus::Ready;

        tracing::info!(
            initial_cash,
            sessions = self.len(),
            instruments = self.series.len(),
            "Episode started"
        );
        self.observe()
    }

    /// Assembles the observation for the current step. Pure read.
    pub fn observe(&self) -> GymResult<Observation> {
        let n = self.series.len();
        let mut values = Vec::with_capacity(self.observation_len());

        values.push(self.ledger.cash());
        values.extend(self.ledger.holdings().iter().map(|s| s.0 as f64));
        for s in self.series.iter() {
            let close = s.close_at(self.step).ok_or_else(|| self.out_of_range())?;
            let features = s.features_at(self.step).ok_or_else(|| self.out_of_range())?;
            values.push(close.0);
            values.extend_from_slice(features);
        }

        Ok(Observation::new(Array1::from_vec(values), n))
    }

    /// Runs one full episode from a fresh reset and returns its summary.
    pub fn evaluate_agent<T: Agent>(&mut self, agent: &mut T) -> GymResult<EpisodeSummary> {
        self.reset()?;
        self.run_episode(agent)?;
        Ok(self.summary())
    }

    /// Evaluates a stream of agents in parallel, keeping the `top_k` by total reward.
    ///
    /// Every worker runs on its own clone of this environment. `agents` yields
    /// `(uid, agent)`, usually from `.enumerate()`; `stream_len` only sizes the
    /// progress bar.
    pub fn evaluate_agents<T>(
        &self,
        agents: impl ParallelIterator<Item = (usize, T)>,
        top_k: usize,
        stream_len: u64,
    ) -> GymResult<Leaderboard>
    where
        T: Agent + Send + Serialize,
    {
        let pb = progress_bar(stream_len)?;
        pb.set_message("Running evaluation...");

        let board = agents
            .try_fold(
                || AgentLeaderboard::new(top_k),
                |mut board, (uid, mut agent)| {
                    let summary = self.worker(&mut agent, uid as u64)?;
                    board.update(LeaderboardEntry::new(uid as u64, summary), agent);
                    pb.inc(1);
                    Ok(board)
                },
            )
            .try_reduce(
                || AgentLeaderboard::new(top_k),
                |a, b| Ok::<_, GymError>(a.merge(b)),
            )?;

        pb.finish_with_message("Evaluation complete.");
        board.try_into()
    }
}

impl Env for Environment {
    fn reset(&mut self) -> GymResult<Observation> {
        let cash = self.cfg.initial_cash();
        self.reset_with_cash(cash)
    }

    #[tracing::instrument(skip(self, actions), fields(step = self.step))]
    fn step(&mut self, actions: &Actions) -> GymResult<(Observation, Reward, StepOutcome)> {
        // 1. Validate before touching any state
        self.check_step_status()?;
        self.action_space.check(actions)?;

        // 2. Trade at the current session's close
        let prices = self.prices(self.step)?;
        let date = self.series[0]
            .date_at(self.step)
            .ok_or_else(|| self.out_of_range())?;
        let summary = self.ledger.apply_actions(actions, &prices);

        // 3. Reward against the previous value
        let value = self.ledger.value(&prices);
        let reward = Reward(value - self.prev_value);
        self.prev_value = value;

        let record = StepRecord {
            step: self.step,
            date,
            cash: self.ledger.cash(),
            portfolio_value: value,
            reward: reward.0,
            executed: summary.executed,
            rejected: summary.rejected,
        };
        self.history.push(record);

        // 4. Time passes, never beyond the last session
        let last = self.last_step();
        if self.step < last {
            self.step += 1;
        }

        let outcome = if self.step == last {
            self.status = EnvStatus::Terminated;
            tracing::info!(
                steps = self.history.len(),
                final_value = value,
                total_reward = self.summary().total_reward,
                "Episode terminated"
            );
            StepOutcome::Terminated
        } else {
            self.status = EnvStatus::Running;
            StepOutcome::InProgress
        };

        Ok((self.observe()?, reward, outcome))
    }
}

impl Environment {
    fn run_episode<T: Agent>(&mut self, agent: &mut T) -> GymResult<()> {
        let mut obs = self.observe()?;
        let mut outcome = StepOutcome::InProgress;

        while !outcome.is_done() {
            let actions = agent.act(&obs)?;
            (obs, _, outcome) = self.step(&actions)?;
        }

        agent.reset();
        Ok(())
    }

    #[tracing::instrument(skip(self, agent), fields(agent_uid = %agent_uid))]
    fn worker<T: Agent>(&self, agent: &mut T, agent_uid: u64) -> GymResult<EpisodeSummary> {
        let mut thread_env = self.clone();
        thread_env.evaluate_agent(agent)
    }

    fn prices(&self, step: usize) -> GymResult<Vec<Price>> {
        self.series
            .iter()
            .map(|s| s.close_at(step).ok_or_else(|| self.out_of_range()))
            .collect()
    }

    fn out_of_range(&self) -> GymError {
        EnvError::InvalidTransition(format!(
            "step {} is outside the series (length {})",
            self.step,
            self.len()
        ))
        .into()
    }

    fn check_step_status(&self) -> GymResult<()> {
        match self.status {
            EnvStatus::Ready | EnvStatus::Running => Ok(()),
            EnvStatus::Terminated => Err(EnvError::InvalidTransition(
                "Episode is terminated. Call `reset()` before stepping.".to_string(),
            )
            .into()),
        }
    }
}

// ================================================================================================
// Building
// ================================================================================================
impl Environment {
    /// Validates `series` against `cfg` and performs the initial reset.
    ///
    /// Fails with [`EnvError::InvalidConfig`] when there are no instruments, when
    /// series lengths, session dates or feature sets differ, or when instrument
    /// ids repeat.
    #[tracing::instrument(skip_all, fields(instruments = series.len()))]
    pub fn new(cfg: EnvConfig, series: Arc<[FeatureSeries]>) -> GymResult<Self> {
        if let Err(e) = cfg.validate().and_then(|()| check_series(&cfg, &series)) {
            tracing::error!(error = %e, "Invalid environment configuration");
            return Err(e);
        }

        let ids: Vec<_> = series.iter().map(|s| s.id().clone()).collect();
        let kinds = series[0].feature_kinds();

        let mut env = Self {
            action_space: ActionSpace::new(ids.clone()),
            observation_space: ObservationSpace::new(&ids, kinds),
            ledger: Ledger::new(ids, cfg.initial_cash()),
            step: 0,
            prev_value: cfg.initial_cash(),
            initial_value: cfg.initial_cash(),
            status: EnvStatus::Ready,
            history: Vec::new(),
            cfg,
            series,
        };
        env.reset()?;
        Ok(env)
    }
}

fn check_series(cfg: &EnvConfig, series: &[FeatureSeries]) -> GymResult<()> {
    let invalid = |msg: String| -> GymResult<()> { Err(EnvError::InvalidConfig(msg).into()) };

    if series.is_empty() {
        return invalid("at least one instrument is required".to_string());
    }
    if !series.iter().map(FeatureSeries::len).all_equal() {
        let lens = series
            .iter()
            .map(|s| format!("{}={}", s.id(), s.len()))
            .join(", ");
        return invalid(format!("series lengths differ: {lens}"));
    }
    if series[0].is_empty() {
        return invalid("series are empty".to_string());
    }
    if !series.iter().map(FeatureSeries::dates).all_equal() {
        let step = (0..series[0].len())
            .find(|&i| !series.iter().map(|s| s.dates()[i]).all_equal())
            .unwrap_or_default();
        return invalid(format!("series are not time-aligned, first difference at step {step}"));
    }
    if !series.iter().map(FeatureSeries::feature_kinds).all_equal() {
        return invalid("instruments expose different feature sets".to_string());
    }
    if series[0].feature_kinds() != cfg.indicators().features.as_slice() {
        return invalid("series were built with a different feature set".to_string());
    }
    if let Some(dup) = series.iter().map(FeatureSeries::id).duplicates().next() {
        return invalid(format!("instrument '{dup}' appears more than once"));
    }
    Ok(())
}

// ================================================================================================
// Helper Functions
// ================================================================================================
fn progress_bar(capacity: u64) -> GymResult<ProgressBar> {
    let bar = ProgressBar::new(capacity);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta_precise}) {msg}")
            .map_err(EnvError::ProgressBar)?
            .progress_chars("#>-"));
    Ok(bar)
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use rayon::iter::IntoParallelIterator;
    use strum::EnumCount;

    use crate::{
        agent::{HoldAgent, RandomAgent},
        data::{
            bar::{PriceBar, PriceTable},
            domain::{Shares, Volume},
            indicator::{FeatureKind, IndicatorConfig},
        },
    };

    use super::*;

    fn table(id: &str, closes: &[f64]) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + Days::new(i as u64),
                open: Price(c),
                high: Price(c * 1.01),
                low: Price(c * 0.99),
                close: Price(c),
                adj_close: Price(c),
                volume: Volume(1_000.0),
            })
            .collect();
        PriceTable::new(id.into(), bars).unwrap()
    }

    fn env_with(cfg: EnvConfig, tables: &[PriceTable]) -> GymResult<Environment> {
        let series: Vec<FeatureSeries> = tables
            .iter()
            .map(|t| FeatureSeries::build(t, cfg.indicators()).unwrap())
            .collect();
        Environment::new(cfg, series.into())
    }

    fn env(tables: &[PriceTable]) -> Environment {
        env_with(EnvConfig::default(), tables).unwrap()
    }

    #[test]
    fn reset_values_portfolio_at_initial_cash() {
        let mut e = env(&[table("AAA", &[100.0, 101.0, 102.0])]);
        let obs = e.reset_with_cash(2_500.0).unwrap();
        assert_eq!(e.portfolio_value().unwrap(), 2_500.0);
        assert_eq!(obs.cash(), 2_500.0);
        assert_eq!(e.status(), EnvStatus::Ready);
        assert_eq!(e.current_step(), 0);
        assert!(e.reset_with_cash(-5.0).is_err());
    }

    #[test]
    fn observation_layout_and_fixed_length() {
        let mut e = env(&[
            table("AAA", &[100.0, 101.0, 99.0, 98.0]),
            table("BBB", &[10.0, 11.0, 12.0, 13.0]),
        ]);
        let width = 1 + FeatureKind::COUNT;
        let expected = 1 + 2 + 2 * width;

        let obs = e.reset().unwrap();
        assert_eq!(obs.len(), expected);
        assert_eq!(e.observation_len(), expected);
        assert_eq!(obs.close(1), Some(10.0));

        let (obs, _, _) = e.step(&Actions::new(vec![1, 2])).unwrap();
        assert_eq!(obs.len(), expected);
        assert_eq!(obs.holdings().to_vec(), vec![1.0, 2.0]);
        assert_eq!(obs.close(0), Some(101.0));
        assert!(obs.as_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn scripted_single_trade_reward() {
        let mut e = env(&[table("AAA", &[100.0, 100.0, 110.0])]);
        e.reset().unwrap();

        let (_, r0, out0) = e.step(&Actions::new(vec![10])).unwrap();
        assert_eq!(e.ledger().cash(), 9_000.0);
        assert_eq!(e.ledger().holdings(), &[Shares(10)]);
        assert_eq!(r0, Reward(0.0));
        assert_eq!(out0, StepOutcome::InProgress);

        let (_, r1, out1) = e.step(&Actions::new(vec![0])).unwrap();
        assert_eq!(r1, Reward(0.0));
        assert_eq!(out1, StepOutcome::Terminated);

        // Pointer now sits on the last session; the next call is refused.
        assert!(e.step(&Actions::new(vec![0])).is_err());
    }

    #[test]
    fn reward_tracks_price_moves_of_holdings() {
        let mut e = env(&[table("AAA", &[100.0, 110.0, 105.0])]);
        e.reset().unwrap();
        let (_, r0, _) = e.step(&Actions::new(vec![10])).unwrap();
        let (_, r1, _) = e.step(&Actions::new(vec![0])).unwrap();
        assert_eq!(r0, Reward(0.0));
        assert_eq!(r1, Reward(100.0));
        assert_eq!(e.summary().final_value, 10_100.0);
        // Marked at the final close (105), past the last reward.
        assert_eq!(e.portfolio_value().unwrap(), 10_050.0);
    }

    #[test]
    fn steps_until_done_equals_length_minus_one() {
        for n in [2usize, 3, 7] {
            let closes: Vec<f64> = (0..n).map(|i| 50.0 + i as f64).collect();
            let mut e = env(&[table("AAA", &closes)]);
            e.reset().unwrap();

            let mut calls = 0;
            loop {
                let (_, _, out) = e.step(&Actions::new(vec![0])).unwrap();
                calls += 1;
                assert!(e.current_step() <= e.last_step());
                if out.is_done() {
                    break;
                }
            }
            assert_eq!(calls, n - 1);
            assert_eq!(e.current_step(), n - 1);
        }
    }

    #[test]
    fn single_session_is_done_after_one_step() {
        let mut e = env(&[table("AAA", &[100.0])]);
        e.reset().unwrap();
        let (_, reward, out) = e.step(&Actions::new(vec![1])).unwrap();
        assert!(out.is_done());
        assert_eq!(reward, Reward(0.0));
        assert_eq!(e.current_step(), 0);
        assert!(e.status().is_terminated());
    }

    #[test]
    fn unaffordable_buy_skips_only_that_instrument() {
        let mut e = env(&[table("AAA", &[100.0, 100.0]), table("BBB", &[10.0, 10.0])]);
        e.reset_with_cash(1_000.0).unwrap();

        let (_, reward, _) = e.step(&Actions::new(vec![50, 5])).unwrap();
        assert_eq!(e.ledger().holdings(), &[Shares(0), Shares(5)]);
        assert_eq!(e.ledger().cash(), 950.0);
        assert_eq!(reward, Reward(0.0));
        assert_eq!(e.history()[0].rejected, 1);
        assert_eq!(e.history()[0].executed, 1);
    }

    #[test]
    fn step_after_termination_leaves_state_untouched() {
        let mut e = env(&[table("AAA", &[100.0, 101.0])]);
        e.reset().unwrap();
        e.step(&Actions::new(vec![3])).unwrap();

        let ledger = e.ledger().clone();
        let step = e.current_step();
        let history = e.history().len();

        let err = e.step(&Actions::new(vec![1])).unwrap_err();
        assert!(matches!(err, GymError::Env(EnvError::InvalidTransition(_))));
        assert_eq!(e.ledger(), &ledger);
        assert_eq!(e.current_step(), step);
        assert_eq!(e.history().len(), history);

        e.reset().unwrap();
        assert!(e.step(&Actions::new(vec![0])).is_ok());
    }

    #[test]
    fn wrong_action_length_is_rejected_without_mutation() {
        let mut e = env(&[table("AAA", &[100.0, 101.0, 102.0])]);
        e.reset().unwrap();
        assert!(matches!(
            e.step(&Actions::new(vec![1, 1])),
            Err(GymError::Env(EnvError::ActionLength { expected: 1, got: 2 }))
        ));
        assert_eq!(e.current_step(), 0);
        assert!(e.history().is_empty());
    }

    #[test]
    fn mismatched_series_are_a_config_error() {
        let err = env_with(
            EnvConfig::default(),
            &[table("AAA", &[1.0, 2.0, 3.0]), table("BBB", &[1.0, 2.0])],
        )
        .unwrap_err();
        assert!(matches!(err, GymError::Env(EnvError::InvalidConfig(_))));

        let dup = env_with(
            EnvConfig::default(),
            &[table("AAA", &[1.0, 2.0]), table("AAA", &[1.0, 2.0])],
        );
        assert!(dup.is_err());

        assert!(Environment::new(EnvConfig::default(), Vec::new().into()).is_err());
    }

    #[test]
    fn misaligned_dates_are_a_config_error() {
        let cfg = EnvConfig::default();
        let a = FeatureSeries::build(&table("AAA", &[1.0, 2.0, 3.0]), cfg.indicators()).unwrap();
        let shifted = {
            let t = table("BBB", &[1.0, 2.0, 3.0, 4.0]);
            PriceTable::new("BBB".into(), t.bars()[1..].to_vec()).unwrap()
        };
        let b = FeatureSeries::build(&shifted, cfg.indicators()).unwrap();
        assert_eq!(a.len(), b.len());

        let err = Environment::new(cfg, vec![a, b].into()).unwrap_err();
        match err {
            GymError::Env(EnvError::InvalidConfig(msg)) => assert!(msg.contains("step 0")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn differing_feature_sets_are_a_config_error() {
        let narrow = IndicatorConfig::default().with_features(vec![FeatureKind::Rsi]);
        let a = FeatureSeries::build(&table("AAA", &[1.0, 2.0]), &narrow).unwrap();
        let b = FeatureSeries::build(&table("BBB", &[1.0, 2.0]), &IndicatorConfig::default())
            .unwrap();
        let cfg = EnvConfig::default().with_indicators(narrow);
        assert!(Environment::new(cfg, vec![a, b].into()).is_err());
    }

    #[test]
    fn cash_and_holdings_never_go_negative_under_random_play() {
        let closes: Vec<f64> = (0..60).map(|i| 20.0 + ((i * 7) % 11) as f64).collect();
        let reversed: Vec<f64> = closes.iter().rev().copied().collect();
        let mut e = env(&[table("AAA", &closes), table("BBB", &reversed)]);
        let mut agent = RandomAgent::new(42, 40).unwrap();

        let mut obs = e.reset_with_cash(500.0).unwrap();
        loop {
            let actions = agent.act(&obs).unwrap();
            let (next, _, out) = e.step(&actions).unwrap();
            assert!(e.ledger().cash() >= 0.0);
            assert!(next.cash() >= 0.0);
            obs = next;
            if out.is_done() {
                break;
            }
        }
        let summary = e.summary();
        assert_eq!(summary.steps, 59);
        assert!((summary.final_value - summary.initial_value - summary.total_reward).abs() < 1e-6);
    }

    #[test]
    fn clones_are_independent() {
        let mut a = env(&[table("AAA", &[100.0, 101.0, 102.0])]);
        let mut b = a.clone();
        a.step(&Actions::new(vec![5])).unwrap();
        assert_eq!(b.ledger().holdings(), &[Shares(0)]);
        assert_eq!(b.current_step(), 0);
        assert!(Arc::ptr_eq(a.series(), b.series()));
        b.step(&Actions::new(vec![0])).unwrap();
    }

    #[test]
    fn evaluate_agent_runs_a_full_episode() {
        let mut e = env(&[table("AAA", &[10.0, 11.0, 12.0, 13.0])]);
        let summary = e.evaluate_agent(&mut HoldAgent).unwrap();
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.total_reward, 0.0);
        assert_eq!(e.journal().unwrap().len(), 3);
    }

    #[test]
    fn evaluate_agents_ranks_by_total_reward() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let e = env(&[table("AAA", &closes)]);

        let agents: Vec<(usize, RandomAgent)> = (0..8u64)
            .map(|seed| RandomAgent::new(seed, 5).unwrap())
            .enumerate()
            .collect();
        let board = e.evaluate_agents(agents.into_par_iter(), 3, 8).unwrap();
        assert_eq!(board.len(), 3);

        let rewards: Vec<f64> = board
            .as_df()
            .column("total_reward")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(rewards.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(e.status(), EnvStatus::Ready);
    }
}
