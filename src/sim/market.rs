//! Simulated price process
//!
//! Mean-reverting random walk with an optional drift, driven by a seeded
//! generator so identical configurations replay identical paths.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Price history retained for momentum lookbacks
const HISTORY_LEN: usize = 120;

/// Market simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Initial price
    pub initial_price: f64,
    /// Std dev of per-step returns
    pub volatility: f64,
    /// Pull towards `mean_price` (0 = pure random walk)
    pub mean_reversion: f64,
    pub mean_price: f64,
    /// Drift in units of volatility per step (-1 to 1)
    pub trend: f64,
    /// RNG seed; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            initial_price: 100.0,
            volatility: 0.01,
            mean_reversion: 0.0,
            mean_price: 100.0,
            trend: 0.0,
            seed: None,
        }
    }
}

/// Current market state
#[derive(Debug, Clone)]
pub struct MarketState {
    pub price: f64,
    /// Most recent last
    pub price_history: Vec<f64>,
    pub step: usize,
}

impl MarketState {
    fn fresh(initial_price: f64) -> Self {
        Self {
            price: initial_price,
            price_history: vec![initial_price],
            step: 0,
        }
    }

    /// Relative price change over the last `n` steps
    pub fn momentum(&self, n: usize) -> Option<f64> {
        if n == 0 || self.price_history.len() <= n {
            return None;
        }
        let current = self.price_history.last()?;
        let past = self.price_history.get(self.price_history.len() - n - 1)?;
        Some((current - past) / past)
    }
}

/// Single-asset simulated market
pub struct SimulatedMarket {
    config: MarketConfig,
    state: MarketState,
    rng: StdRng,
}

impl SimulatedMarket {
    pub fn new(config: MarketConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: MarketState::fresh(config.initial_price),
            config,
            rng,
        }
    }

    /// Box-Muller standard normal sample
    fn sample_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(0.0001..1.0);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Return to the initial price; the generator keeps its position
    pub fn reset(&mut self) -> &MarketState {
        self.state = MarketState::fresh(self.config.initial_price);
        &self.state
    }

    pub fn step(&mut self) -> &MarketState {
        self.state.step += 1;

        let noise = self.sample_normal() * self.config.volatility;
        let reversion = self.config.mean_reversion
            * (self.config.mean_price - self.state.price)
            / self.config.mean_price.max(f64::EPSILON);
        let drift = self.config.trend * self.config.volatility;

        self.state.price = (self.state.price * (1.0 + noise + reversion + drift)).max(0.01);

        self.state.price_history.push(self.state.price);
        if self.state.price_history.len() > HISTORY_LEN {
            self.state.price_history.remove(0);
        }

        &self.state
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }
}
