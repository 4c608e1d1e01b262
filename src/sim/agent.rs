//! Momentum trading agents
//!
//! A rule-based policy family with a small parameter search standing in for
//! training. `MOMENTUM` follows recent price moves, `CONTRARIAN` fades them.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::env::{TradeAction, TradingEnv};
use crate::sweep::{
    Algorithm, BuiltinPresets, EnvFactory, Environment, EpisodeRecord, Evaluation, Evaluator,
    ParallelEnv, ParamMap, PresetRegistry, Trainer, Verbosity,
};

pub const MOMENTUM: &str = "MOMENTUM";
pub const CONTRARIAN: &str = "CONTRARIAN";

const DEFAULT_LOOKBACK: usize = 5;
const DEFAULT_THRESHOLD: f64 = 0.001;
/// Largest lookback spread searched on either side of the configured one
pub const MAX_SEARCH_WIDTH: usize = 32;

/// Trained policy: act when the lookback return crosses a threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumPolicy {
    pub lookback: usize,
    pub threshold: f64,
    pub contrarian: bool,
}

impl MomentumPolicy {
    pub fn decide(&self, env: &TradingEnv) -> TradeAction {
        let Some(signal) = env.market_state().momentum(self.lookback) else {
            return TradeAction::Hold;
        };
        let signal = if self.contrarian { -signal } else { signal };

        if signal > self.threshold && !env.is_long() {
            TradeAction::Buy
        } else if signal < -self.threshold && env.is_long() {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        }
    }
}

/// One played-out episode
#[derive(Debug, Clone)]
pub struct Rollout {
    pub total_reward: f64,
    pub initial_value: f64,
    pub final_value: f64,
    pub actions: Vec<TradeAction>,
}

/// Reset `env` and play `policy` until the episode ends or `max_steps` is hit
pub fn rollout(
    policy: &MomentumPolicy,
    env: &mut TradingEnv,
    max_steps: usize,
) -> Result<Rollout> {
    env.reset()?;
    let initial_value = env.portfolio_value();
    let mut total_reward = 0.0;
    let mut actions = Vec::new();

    while !env.is_done() && actions.len() < max_steps {
        let action = policy.decide(env);
        let step = env.step(action)?;
        total_reward += step.reward;
        actions.push(action);
    }

    Ok(Rollout {
        total_reward,
        initial_value,
        final_value: env.portfolio_value(),
        actions,
    })
}

/// Trainer for the momentum family over [`TradingEnv`]
pub struct SimTrainer {
    presets: BuiltinPresets,
}

impl Default for SimTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTrainer {
    pub fn new() -> Self {
        Self::with_presets(momentum_presets(BuiltinPresets::standard()))
    }

    pub fn with_presets(presets: BuiltinPresets) -> Self {
        Self { presets }
    }

    fn contrarian(algorithm: &Algorithm) -> Result<bool> {
        match algorithm.name() {
            MOMENTUM => Ok(false),
            CONTRARIAN => Ok(true),
            other => bail!("unsupported algorithm '{other}' for the simulated trainer"),
        }
    }
}

impl Trainer<TradingEnv> for SimTrainer {
    type Model = MomentumPolicy;
    type Parallel = ParallelEnv<TradingEnv>;

    fn presets(&self) -> &dyn PresetRegistry {
        &self.presets
    }

    fn make_parallel(
        &self,
        factory: &EnvFactory<TradingEnv>,
        parallelism: usize,
    ) -> Result<Self::Parallel> {
        ParallelEnv::build(factory, parallelism)
    }

    fn train(
        &self,
        algorithm: &Algorithm,
        env: &mut Self::Parallel,
        config: &ParamMap,
        total_steps: u64,
        verbosity: Verbosity,
    ) -> Result<MomentumPolicy> {
        let contrarian = Self::contrarian(algorithm)?;
        let lookback = param_usize(config, "lookback", DEFAULT_LOOKBACK)?.max(1);
        let threshold = param_f64(config, "threshold", DEFAULT_THRESHOLD)?;
        let width = param_usize(config, "search_width", 1)?;
        if width > MAX_SEARCH_WIDTH {
            bail!(
                "parameter 'search_width' must be at most {MAX_SEARCH_WIDTH}, got {width}"
            );
        }

        let base = MomentumPolicy {
            lookback,
            threshold,
            contrarian,
        };
        if total_steps == 0 {
            return Ok(base);
        }
        if env.envs_mut().is_empty() {
            bail!("no training replicas");
        }

        let candidates = candidate_grid(&base, width);
        let per_candidate = (total_steps as usize / candidates.len()).max(1);

        let mut best: Option<(MomentumPolicy, f64)> = None;
        for candidate in candidates {
            let mut score = 0.0;
            let mut budget = per_candidate;
            'replicas: while budget > 0 {
                for replica in env.envs_mut() {
                    if budget == 0 {
                        break 'replicas;
                    }
                    let played = rollout(&candidate, replica, budget)?;
                    if played.actions.is_empty() {
                        break 'replicas;
                    }
                    budget -= played.actions.len();
                    score += played.total_reward;
                }
            }

            if verbosity.is_verbose() {
                info!(
                    %algorithm,
                    lookback = candidate.lookback,
                    threshold = candidate.threshold,
                    score,
                    "Candidate scored"
                );
            } else {
                debug!(
                    %algorithm,
                    lookback = candidate.lookback,
                    threshold = candidate.threshold,
                    score,
                    "Candidate scored"
                );
            }

            let improved = best
                .as_ref()
                .map_or(true, |(_, best_score)| score > *best_score);
            if improved {
                best = Some((candidate, score));
            }
        }

        best.map(|(policy, _)| policy)
            .ok_or_else(|| anyhow!("no candidate policies to train"))
    }
}

/// Plays the trained policy for a fixed number of episodes
#[derive(Debug, Clone, Copy, Default)]
pub struct SimEvaluator;

impl Evaluator<TradingEnv, MomentumPolicy> for SimEvaluator {
    fn evaluate(
        &self,
        model: &MomentumPolicy,
        env: &mut TradingEnv,
        episodes: usize,
    ) -> Result<Evaluation> {
        let mut evaluation = Evaluation::default();
        let max_steps = env.config().max_steps;

        for episode in 0..episodes {
            match rollout(model, env, max_steps) {
                Ok(played) => {
                    evaluation.rewards.push(played.total_reward);
                    evaluation.episodes.push(EpisodeRecord::completed(
                        played.initial_value,
                        played.final_value,
                        played.actions.iter().map(|a| a.label().to_string()).collect(),
                    ));
                }
                Err(e) => {
                    debug!(episode, "Evaluation episode failed: {:#}", e);
                    evaluation.episodes.push(EpisodeRecord::failed(format!("{e:#}")));
                }
            }
        }

        Ok(evaluation)
    }
}

fn candidate_grid(base: &MomentumPolicy, width: usize) -> Vec<MomentumPolicy> {
    let low = base.lookback.saturating_sub(width).max(1);
    let high = base.lookback.saturating_add(width);
    let mut grid = Vec::new();
    for lookback in low..=high {
        for scale in [0.5, 1.0, 2.0] {
            grid.push(MomentumPolicy {
                lookback,
                threshold: base.threshold * scale,
                contrarian: base.contrarian,
            });
        }
    }
    grid
}

fn param_f64(config: &ParamMap, key: &str, default: f64) -> Result<f64> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| anyhow!("parameter '{key}' must be a number, got {value}")),
    }
}

fn param_usize(config: &ParamMap, key: &str, default: usize) -> Result<usize> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| {
                anyhow!("parameter '{key}' must be a non-negative integer, got {value}")
            }),
    }
}

/// Add default/explorative/conservative presets for both momentum families
pub fn momentum_presets(presets: BuiltinPresets) -> BuiltinPresets {
    let mut presets = presets;
    for family in [MOMENTUM, CONTRARIAN] {
        presets = presets
            .with_preset(
                family,
                "default",
                params(DEFAULT_LOOKBACK, DEFAULT_THRESHOLD, 1),
            )
            .with_preset(family, "explorative", params(3, 0.0005, 3))
            .with_preset(family, "conservative", params(10, 0.003, 0));
    }
    presets
}

fn params(lookback: usize, threshold: f64, search_width: usize) -> ParamMap {
    crate::sweep::custom_config([
        ("lookback", json!(lookback)),
        ("threshold", json!(threshold)),
        ("search_width", json!(search_width)),
    ])
}
