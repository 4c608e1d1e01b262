//! Simulated collaborators
//!
//! A seeded market, a trading environment over it, and a momentum trainer
//! and evaluator that plug into the sweep runner.

pub mod agent;
pub mod env;
pub mod market;

pub use agent::{
    momentum_presets, rollout, MomentumPolicy, Rollout, SimEvaluator, SimTrainer, CONTRARIAN,
    MOMENTUM,
};
pub use env::{env_factory, StepResult, TradeAction, TradingEnv, TradingEnvConfig};
pub use market::{MarketConfig, MarketState, SimulatedMarket};
