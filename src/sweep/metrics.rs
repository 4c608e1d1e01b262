//! Episode metrics
//!
//! Pure reductions from evaluation output to comparable scalars. Failed
//! episodes are excluded from every statistic, never zero-filled.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::collaborators::Evaluation;

/// Outcome of one evaluation rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeRecord {
    Completed(EpisodeOutcome),
    Failed { error: String },
}

impl EpisodeRecord {
    pub fn completed(initial_value: f64, final_value: f64, actions: Vec<String>) -> Self {
        EpisodeRecord::Completed(EpisodeOutcome {
            initial_value,
            final_value,
            actions,
        })
    }

    pub fn failed(error: impl Into<String>) -> Self {
        EpisodeRecord::Failed {
            error: error.into(),
        }
    }

    pub fn outcome(&self) -> Option<&EpisodeOutcome> {
        match self {
            EpisodeRecord::Completed(outcome) => Some(outcome),
            EpisodeRecord::Failed { .. } => None,
        }
    }
}

/// Financial result of a completed episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    /// Portfolio value at episode start
    pub initial_value: f64,
    /// Portfolio value at episode end
    pub final_value: f64,
    /// Action label taken at each step
    pub actions: Vec<String>,
}

impl EpisodeOutcome {
    /// Percentage return, `None` when the initial value cannot be divided by
    pub fn return_pct(&self) -> Option<f64> {
        if self.initial_value == 0.0 || !self.initial_value.is_finite() {
            return None;
        }
        Some((self.final_value - self.initial_value) / self.initial_value * 100.0)
    }
}

/// Mean percentage return over completed episodes, `0.0` when there are none
pub fn average_return_pct(episodes: &[EpisodeRecord]) -> f64 {
    let returns: Vec<f64> = episodes
        .iter()
        .filter_map(EpisodeRecord::outcome)
        .filter_map(EpisodeOutcome::return_pct)
        .collect();
    mean(&returns)
}

/// Arithmetic mean, `0.0` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, `0.0` for fewer than two values
pub fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Most used action and its share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopAction {
    pub label: String,
    pub percentage: f64,
}

/// Action usage across completed episodes
///
/// Labels iterate in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStats {
    pub counts: BTreeMap<String, u64>,
    pub percentages: BTreeMap<String, f64>,
    /// Total action-taking steps counted
    pub total_actions: u64,
}

impl ActionStats {
    pub fn from_episodes(episodes: &[EpisodeRecord]) -> Self {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for outcome in episodes.iter().filter_map(EpisodeRecord::outcome) {
            for action in &outcome.actions {
                *counts.entry(action.clone()).or_insert(0) += 1;
            }
        }

        let total_actions: u64 = counts.values().sum();
        let percentages = counts
            .iter()
            .map(|(label, count)| {
                let pct = if total_actions > 0 {
                    *count as f64 / total_actions as f64 * 100.0
                } else {
                    0.0
                };
                (label.clone(), pct)
            })
            .collect();

        Self {
            counts,
            percentages,
            total_actions,
        }
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn percentage(&self, label: &str) -> f64 {
        self.percentages.get(label).copied().unwrap_or(0.0)
    }

    /// Highest-share action
    ///
    /// Exact ties resolve to the lexicographically first label. Callers
    /// should not rely on which of several tied actions is reported.
    pub fn top_action(&self) -> Option<TopAction> {
        let mut best: Option<(&String, f64)> = None;
        for (label, pct) in &self.percentages {
            match best {
                Some((_, best_pct)) if *pct <= best_pct => {}
                _ => best = Some((label, *pct)),
            }
        }
        best.map(|(label, percentage)| TopAction {
            label: label.clone(),
            percentage,
        })
    }
}

/// One action's usage in the train and test phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionUsageRow {
    pub label: String,
    pub train_count: u64,
    pub train_pct: f64,
    pub test_count: u64,
    pub test_pct: f64,
}

/// Align two phases' action usage over the union of their labels
///
/// An action seen in only one phase is reported with count 0 and 0.0 % in
/// the other.
pub fn compare_actions(train: &ActionStats, test: &ActionStats) -> Vec<ActionUsageRow> {
    let labels: BTreeSet<&String> =
        train.counts.keys().chain(test.counts.keys()).collect();
    labels
        .into_iter()
        .map(|label| ActionUsageRow {
            label: label.clone(),
            train_count: train.count(label),
            train_pct: train.percentage(label),
            test_count: test.count(label),
            test_pct: test.percentage(label),
        })
        .collect()
}

/// Scalars derived from one evaluation phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub avg_return_pct: f64,
    pub avg_reward: f64,
    pub reward_std: f64,
    pub action_stats: ActionStats,
    pub valid_episodes: usize,
    pub failed_episodes: usize,
}

impl PhaseMetrics {
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        let valid_episodes = evaluation
            .episodes
            .iter()
            .filter(|ep| ep.outcome().is_some())
            .count();

        Self {
            avg_return_pct: average_return_pct(&evaluation.episodes),
            avg_reward: mean(&evaluation.rewards),
            reward_std: population_std(&evaluation.rewards),
            action_stats: ActionStats::from_episodes(&evaluation.episodes),
            valid_episodes,
            failed_episodes: evaluation.episodes.len() - valid_episodes,
        }
    }
}
