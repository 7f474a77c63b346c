use marketgym::prelude::*;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

mod common;

fn fixture_env() -> Environment {
    marketgym::make_from_csv(EnvConfig::default(), &common::fixture_sources())
        .expect("fixture environment builds")
}

#[test]
fn full_episode_over_fixture_data() {
    let mut env = fixture_env();
    assert_eq!(env.len(), 43);

    let n_features = env.cfg().indicators().features.len();
    let expected_len = 1 + 2 + 2 * (1 + n_features);
    assert_eq!(env.observation_space().len(), expected_len);

    let obs = env.reset().expect("reset");
    assert_eq!(obs.len(), expected_len);
    assert_eq!(obs.cash(), 10_000.0);
    assert_eq!(obs.close(0), Some(101.52));
    assert_eq!(obs.close(1), Some(52.41));

    let mut steps = 0;
    let mut total = Reward(0.0);
    let mut done = false;
    while !done {
        let action = if steps == 0 {
            Actions::new(vec![20, 40])
        } else {
            env.action_space().hold()
        };
        let (obs, reward, outcome) = env.step(&action).expect("step");
        assert_eq!(obs.len(), expected_len);
        assert!(obs.as_array().iter().all(|v| v.is_finite()));
        total += reward;
        steps += 1;
        done = outcome.is_done();
    }

    assert_eq!(steps, 42);
    assert_eq!(env.status(), EnvStatus::Terminated);

    // Holdings bought on day one. The last reward is taken at the
    // second-to-last session; the final bar's move is marked but never rewarded.
    let cash_left = 10_000.0 - 20.0 * 101.52 - 40.0 * 52.41;
    let rewarded_value = cash_left + 20.0 * 108.9 + 40.0 * 56.29;
    let summary = env.summary();
    assert!((summary.final_value - rewarded_value).abs() < 1e-6);
    assert!((total.0 - (summary.final_value - 10_000.0)).abs() < 1e-6);

    let marked_value = env.portfolio_value().expect("value");
    assert!((marked_value - (cash_left + 20.0 * 107.81 + 40.0 * 55.58)).abs() < 1e-6);

    let journal = env.journal().expect("journal");
    assert_eq!(journal.len(), 42);
    assert!((journal.total_reward().expect("rewards") - total.0).abs() < 1e-9);

    let hold = env.action_space().hold();
    assert!(env.step(&hold).is_err());
}

#[test]
fn named_actions_route_to_instruments() {
    let mut env = fixture_env();
    env.reset().expect("reset");

    let bbb = InstrumentId::new("BBB");
    let action = env.action_space().actions([(&bbb, 3)]).expect("known id");
    env.step(&action).expect("step");
    assert_eq!(env.ledger().holding(&bbb), Some(Shares(3)));
    assert_eq!(env.ledger().holding(&InstrumentId::new("AAA")), Some(Shares(0)));

    let ghost = InstrumentId::new("ZZZ");
    let err = env.action_space().actions([(&ghost, 1)]).unwrap_err();
    assert!(matches!(err, GymError::Env(EnvError::UnknownInstrument(_))));
}

#[test]
fn oversized_orders_degrade_gracefully() {
    let mut env = marketgym::make(
        EnvConfig::default().with_initial_cash(1_000.0),
        vec![
            common::synthetic_table("AAA", &[100.0, 100.0, 100.0]),
            common::synthetic_table("BBB", &[10.0, 10.0, 10.0]),
        ],
    )
    .expect("env");

    env.reset().expect("reset");
    let (obs, reward, _) = env.step(&Actions::new(vec![1_000, -5])).expect("step");
    assert_eq!(obs.cash(), 1_000.0);
    assert_eq!(obs.holdings().to_vec(), vec![0.0, 0.0]);
    assert_eq!(reward, Reward(0.0));
    assert_eq!(env.history()[0].rejected, 2);
}

#[test]
fn parallel_rollouts_share_series() {
    let env = fixture_env();

    let agents: Vec<(usize, RandomAgent)> = (0..16u64)
        .map(|seed| RandomAgent::new(seed, 10).expect("agent"))
        .enumerate()
        .collect();
    let board = env
        .evaluate_agents(agents.into_par_iter(), 5, 16)
        .expect("evaluation");
    assert_eq!(board.len(), 5);

    // Re-running the winner alone reproduces its reward.
    let df = board.as_df();
    let best_uid = df
        .column("agent_uid")
        .expect("column")
        .u64()
        .expect("u64")
        .get(0)
        .expect("row");
    let best_reward = df
        .column("total_reward")
        .expect("column")
        .f64()
        .expect("f64")
        .get(0)
        .expect("row");

    let mut solo = env.clone();
    let mut agent = RandomAgent::new(best_uid, 10).expect("agent");
    let summary = solo.evaluate_agent(&mut agent).expect("episode");
    assert!((summary.total_reward - best_reward).abs() < 1e-9);
}

#[test]
fn hold_agent_earns_nothing() {
    let mut env = fixture_env();
    let summary = env.evaluate_agent(&mut HoldAgent).expect("episode");
    assert_eq!(summary.total_reward, 0.0);
    assert_eq!(summary.final_value, 10_000.0);
    assert_eq!(summary.steps, 42);
}

#[test]
fn config_file_round_trip_drives_environment() {
    let cfg = EnvConfig::default()
        .with_initial_cash(2_000.0)
        .with_indicators(IndicatorConfig::default().with_window(5).with_features(vec![
            FeatureKind::Rsi,
            FeatureKind::Macd,
        ]));
    let json = cfg.to_json().expect("json");
    let restored = EnvConfig::from_json(&json).expect("parse");

    let mut env =
        marketgym::make_from_csv(restored, &common::fixture_sources()).expect("environment");
    let obs = env.reset().expect("reset");
    assert_eq!(obs.len(), 1 + 2 + 2 * 3);
    assert_eq!(obs.cash(), 2_000.0);
}
