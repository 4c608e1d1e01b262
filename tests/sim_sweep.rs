use std::collections::BTreeMap;

use quantsweep::sim::{
    env_factory, MarketConfig, SimEvaluator, SimTrainer, TradingEnvConfig, CONTRARIAN, MOMENTUM,
};
use quantsweep::sweep::{
    action_breakdowns, tally, Algorithm, ComparisonView, EnvironmentPair, Labeled, RowCells,
    RunSettings, SweepRunner, Verbosity,
};
use serde_json::json;

fn env_config(trend: f64, seed: u64) -> TradingEnvConfig {
    TradingEnvConfig {
        market: MarketConfig {
            trend,
            volatility: 0.01,
            seed: Some(seed),
            ..MarketConfig::default()
        },
        max_steps: 30,
        ..TradingEnvConfig::default()
    }
}

fn environments() -> Labeled<EnvironmentPair<quantsweep::sim::TradingEnv>> {
    let mut envs = Labeled::new();
    envs.insert(
        "uptrend",
        EnvironmentPair::from_factories(
            env_factory(env_config(0.3, 1)),
            env_factory(env_config(0.3, 101)),
        ),
    );
    envs.insert(
        "downtrend",
        EnvironmentPair::from_factories(
            env_factory(env_config(-0.3, 2)),
            env_factory(env_config(-0.3, 102)),
        ),
    );
    envs
}

fn runner() -> SweepRunner<SimTrainer, SimEvaluator> {
    SweepRunner::new(SimTrainer::new(), SimEvaluator).with_settings(RunSettings {
        total_steps: 300,
        parallelism: 2,
        eval_episodes: 2,
        verbosity: Verbosity::Quiet,
    })
}

#[test]
fn simulated_sweep_isolates_unsupported_algorithm() {
    let algorithms: Vec<Algorithm> = [MOMENTUM, CONTRARIAN, "PPO"]
        .into_iter()
        .map(Algorithm::from)
        .collect();

    let results = runner()
        .run_comprehensive(&algorithms, &environments(), None, &BTreeMap::new())
        .unwrap();

    assert_eq!(tally(&results), (8, 4));
    let ppo_cell = results
        .get("PPO")
        .unwrap()
        .get("uptrend")
        .unwrap()
        .get("default")
        .unwrap();
    assert!(ppo_cell
        .error()
        .unwrap()
        .contains("unsupported algorithm 'PPO'"));

    let view = ComparisonView::full_matrix(&results);
    assert_eq!(view.rows.len(), 12);
    assert_eq!(view.error_count(), 4);
    assert_eq!(view.rows[0].path, vec![MOMENTUM, "uptrend", "default"]);
    assert!(view.best_by_test_return().is_some());

    for row in &view.rows {
        if let RowCells::Metrics {
            top_train_action: Some(top),
            ..
        } = &row.cells
        {
            assert!(["hold", "buy", "sell"].contains(&top.label.as_str()));
        }
    }

    let first = serde_json::to_string(&view).unwrap();
    let second = serde_json::to_string(&ComparisonView::full_matrix(&results)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn simulated_custom_config_and_bad_params() {
    let mut custom = BTreeMap::new();
    custom.insert(MOMENTUM.to_string(), json!({"lookback": 4, "threshold": 0.0}));
    custom.insert(CONTRARIAN.to_string(), json!({"lookback": "long"}));

    let algorithms = vec![Algorithm::from(MOMENTUM), Algorithm::from(CONTRARIAN)];
    let results = runner()
        .run_comprehensive(&algorithms, &environments(), None, &custom)
        .unwrap();

    // One custom cell per algorithm and environment
    assert_eq!(tally(&results), (2, 2));
    let momentum = results.get(MOMENTUM).unwrap().get("uptrend").unwrap();
    let run = momentum.get("custom").unwrap().as_success().unwrap();
    assert!((3..=5).contains(&run.model.lookback));
    assert_eq!(run.train.metrics.valid_episodes, 2);
    assert_eq!(run.test.episodes.len(), 2);

    let contrarian = results.get(CONTRARIAN).unwrap().get("downtrend").unwrap();
    assert!(contrarian
        .get("custom")
        .unwrap()
        .error()
        .unwrap()
        .contains("lookback"));
}

#[test]
fn simulated_preset_comparison_breakdowns() {
    let envs = environments();
    let results = runner()
        .run_preset_comparison(
            &Algorithm::from(MOMENTUM),
            envs.get("uptrend").unwrap(),
            None,
        )
        .unwrap();

    assert_eq!(
        results.keys().collect::<Vec<_>>(),
        vec!["default", "explorative", "conservative"]
    );
    let breakdowns = action_breakdowns(&results);
    assert_eq!(breakdowns.len(), 3);
    for rows in breakdowns.values() {
        let total_pct: f64 = rows.iter().map(|r| r.train_pct).sum();
        assert!((total_pct - 100.0).abs() < 1e-6);
    }
}
