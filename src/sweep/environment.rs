//! Environment lifecycle
//!
//! Factories, train/test pairs, the stock parallel wrapper, and the scoped
//! release discipline every phase of an experiment runs under.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, SweepError};

/// Lifecycle capability every environment product must expose
pub trait Environment {
    /// Return the environment to its initial state
    fn reset(&mut self) -> anyhow::Result<()>;

    /// Release the environment; no further use is allowed afterwards
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Replicated training surface built from one factory
pub trait VecEnvironment {
    /// Number of replicas
    fn num_envs(&self) -> usize;

    /// Release every replica
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Zero-argument environment constructor
pub type EnvFactory<E> = Arc<dyn Fn() -> anyhow::Result<E> + Send + Sync>;

/// Training and held-out environment constructors for one configuration
pub struct EnvironmentPair<E> {
    train: EnvFactory<E>,
    test: EnvFactory<E>,
}

impl<E> EnvironmentPair<E> {
    pub fn new<F, G>(train: F, test: G) -> Self
    where
        F: Fn() -> anyhow::Result<E> + Send + Sync + 'static,
        G: Fn() -> anyhow::Result<E> + Send + Sync + 'static,
    {
        Self {
            train: Arc::new(train),
            test: Arc::new(test),
        }
    }

    pub fn from_factories(train: EnvFactory<E>, test: EnvFactory<E>) -> Self {
        Self { train, test }
    }

    pub fn train_factory(&self) -> &EnvFactory<E> {
        &self.train
    }

    pub fn test_factory(&self) -> &EnvFactory<E> {
        &self.test
    }
}

impl<E> Clone for EnvironmentPair<E> {
    fn clone(&self) -> Self {
        Self {
            train: Arc::clone(&self.train),
            test: Arc::clone(&self.test),
        }
    }
}

impl<E> fmt::Debug for EnvironmentPair<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentPair").finish_non_exhaustive()
    }
}

/// Adapter for callers that hold separate train and test factories
impl<E> From<(EnvFactory<E>, EnvFactory<E>)> for EnvironmentPair<E> {
    fn from((train, test): (EnvFactory<E>, EnvFactory<E>)) -> Self {
        Self::from_factories(train, test)
    }
}

/// Sequential replicas of one environment
///
/// Trainers without a native vectorized surface can return this from
/// [`Trainer::make_parallel`](crate::sweep::Trainer::make_parallel).
pub struct ParallelEnv<E> {
    envs: Vec<E>,
}

impl<E: Environment> ParallelEnv<E> {
    /// Build `count` replicas, closing the already-built ones if a later
    /// construction fails
    pub fn build(factory: &EnvFactory<E>, count: usize) -> anyhow::Result<Self> {
        let mut envs = Vec::with_capacity(count);
        for idx in 0..count.max(1) {
            match factory() {
                Ok(env) => envs.push(env),
                Err(e) => {
                    let mut partial = Self { envs };
                    if let Err(close_err) = VecEnvironment::close(&mut partial) {
                        warn!("Failed to close partial replica set: {:#}", close_err);
                    }
                    return Err(e.context(format!("building replica {idx}")));
                }
            }
        }
        Ok(Self { envs })
    }

    pub fn envs_mut(&mut self) -> &mut [E] {
        &mut self.envs
    }
}

impl<E: Environment> VecEnvironment for ParallelEnv<E> {
    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        let mut first_err = None;
        for env in &mut self.envs {
            if let Err(e) = env.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

pub(crate) fn close_env<E: Environment>(env: &mut E) -> anyhow::Result<()> {
    env.close()
}

pub(crate) fn close_parallel<V: VecEnvironment>(env: &mut V) -> anyhow::Result<()> {
    env.close()
}

/// Owned resource that is closed exactly once
///
/// `release` closes and reports the outcome; dropping an unreleased guard
/// (early return or unwinding) still closes and logs failures.
struct Scoped<T> {
    value: T,
    close: fn(&mut T) -> anyhow::Result<()>,
    phase: &'static str,
    released: bool,
}

impl<T> Scoped<T> {
    fn new(value: T, close: fn(&mut T) -> anyhow::Result<()>, phase: &'static str) -> Self {
        Self {
            value,
            close,
            phase,
            released: false,
        }
    }

    fn release(mut self) -> anyhow::Result<()> {
        self.released = true;
        (self.close)(&mut self.value)
    }
}

impl<T> Drop for Scoped<T> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = (self.close)(&mut self.value) {
            warn!(
                phase = self.phase,
                "Failed to close environment during unwind: {:#}", e
            );
        }
    }
}

/// Run `body` against `value`, releasing it on every exit path
///
/// The body's error takes precedence over a release failure. A release
/// failure after a successful body is an environment contract violation.
pub(crate) fn with_scoped<T, R>(
    value: T,
    close: fn(&mut T) -> anyhow::Result<()>,
    phase: &'static str,
    body: impl FnOnce(&mut T) -> Result<R>,
) -> Result<R> {
    let mut guard = Scoped::new(value, close, phase);
    let outcome = body(&mut guard.value);
    let released = guard.release();

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(SweepError::contract_violation(
            phase,
            format!("failed to close environment: {e:#}"),
        )),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(e)) => {
            warn!(phase, "Failed to close environment after phase failure: {:#}", e);
            Err(err)
        }
    }
}
