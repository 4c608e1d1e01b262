//! Trading environment
//!
//! All-in/all-out single-asset account over a [`SimulatedMarket`]. Reward is
//! the change in portfolio value per step.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::market::{MarketConfig, MarketState, SimulatedMarket};
use crate::sweep::{EnvFactory, Environment};

/// Trading environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingEnvConfig {
    pub market: MarketConfig,
    pub initial_capital: f64,
    /// Fraction of traded notional paid as cost
    pub transaction_cost: f64,
    /// Steps per episode
    pub max_steps: usize,
}

impl Default for TradingEnvConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            initial_capital: 10_000.0,
            transaction_cost: 0.001,
            max_steps: 250,
        }
    }
}

/// Action taken at one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Hold,
    Buy,
    Sell,
}

impl TradeAction {
    /// Label the action is reported under
    pub fn label(self) -> &'static str {
        match self {
            TradeAction::Hold => "hold",
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one environment step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub reward: f64,
    pub portfolio_value: f64,
    pub done: bool,
}

/// Factory building fresh environments from `config`
///
/// With a seeded market, the n-th environment built uses `seed + n`, so
/// replicas see different but reproducible paths.
pub fn env_factory(config: TradingEnvConfig) -> EnvFactory<TradingEnv> {
    let built = Arc::new(AtomicU64::new(0));
    Arc::new(move || {
        let n = built.fetch_add(1, Ordering::Relaxed);
        let mut config = config.clone();
        config.market.seed = config.market.seed.map(|seed| seed.wrapping_add(n));
        Ok(TradingEnv::new(config))
    })
}

pub struct TradingEnv {
    config: TradingEnvConfig,
    market: SimulatedMarket,
    cash: f64,
    units: f64,
    steps: usize,
    closed: bool,
}

impl TradingEnv {
    pub fn new(config: TradingEnvConfig) -> Self {
        let market = SimulatedMarket::new(config.market.clone());
        Self {
            cash: config.initial_capital,
            units: 0.0,
            steps: 0,
            closed: false,
            market,
            config,
        }
    }

    pub fn config(&self) -> &TradingEnvConfig {
        &self.config
    }

    pub fn market_state(&self) -> &MarketState {
        self.market.state()
    }

    pub fn portfolio_value(&self) -> f64 {
        self.cash + self.units * self.market.state().price
    }

    pub fn is_long(&self) -> bool {
        self.units > 0.0
    }

    pub fn is_done(&self) -> bool {
        self.steps >= self.config.max_steps
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn step(&mut self, action: TradeAction) -> Result<StepResult> {
        if self.closed {
            bail!("step on a closed environment");
        }
        if self.is_done() {
            bail!("step past end of episode, reset first");
        }

        let before = self.portfolio_value();
        let price = self.market.state().price;
        match action {
            TradeAction::Buy if self.cash > 0.0 => {
                let spend = self.cash * (1.0 - self.config.transaction_cost);
                self.units += spend / price;
                self.cash = 0.0;
            }
            TradeAction::Sell if self.units > 0.0 => {
                self.cash += self.units * price * (1.0 - self.config.transaction_cost);
                self.units = 0.0;
            }
            _ => {}
        }

        self.market.step();
        self.steps += 1;
        let portfolio_value = self.portfolio_value();

        Ok(StepResult {
            reward: portfolio_value - before,
            portfolio_value,
            done: self.is_done(),
        })
    }
}

impl Environment for TradingEnv {
    fn reset(&mut self) -> Result<()> {
        if self.closed {
            bail!("reset on a closed environment");
        }
        self.market.reset();
        self.cash = self.config.initial_capital;
        self.units = 0.0;
        self.steps = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
