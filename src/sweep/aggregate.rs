//! Result Aggregator
//!
//! Reduces completed comparisons and sweeps into flat summary rows. Reading
//! only, never mutating, so summarizing the same result twice yields
//! identical output.

use serde::Serialize;

use super::labeled::Labeled;
use super::metrics::{compare_actions, ActionUsageRow, TopAction};
use super::result::{Comparison, ExperimentOutcome, ExperimentResult, SweepResult};

/// Columns of one summary row
///
/// A failed cell is a uniform error marker, never a partially filled row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowCells {
    Metrics {
        train_return_pct: f64,
        test_return_pct: f64,
        train_avg_reward: f64,
        test_avg_reward: f64,
        top_train_action: Option<TopAction>,
        top_test_action: Option<TopAction>,
    },
    Error,
}

impl RowCells {
    pub fn from_outcome<M>(outcome: &ExperimentOutcome<M>) -> Self {
        match outcome {
            ExperimentOutcome::Success(result) => RowCells::Metrics {
                train_return_pct: result.train.metrics.avg_return_pct,
                test_return_pct: result.test.metrics.avg_return_pct,
                train_avg_reward: result.train.metrics.avg_reward,
                test_avg_reward: result.test.metrics.avg_reward,
                top_train_action: result.train.metrics.action_stats.top_action(),
                top_test_action: result.test.metrics.action_stats.top_action(),
            },
            ExperimentOutcome::Error(_) => RowCells::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RowCells::Error)
    }
}

/// One summarized cell, identified by its key path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub path: Vec<String>,
    #[serde(flatten)]
    pub cells: RowCells,
}

/// What a view's key columns mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Algorithm,
    Preset,
    Environment,
    FullMatrix,
}

impl ViewKind {
    pub fn key_columns(self) -> &'static [&'static str] {
        match self {
            ViewKind::Algorithm => &["algorithm"],
            ViewKind::Preset => &["preset"],
            ViewKind::Environment => &["environment"],
            ViewKind::FullMatrix => &["algorithm", "environment", "preset"],
        }
    }
}

/// Summary table of a comparison or sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    pub kind: ViewKind,
    pub key_columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl ComparisonView {
    pub fn by_algorithm<M>(comparison: &Comparison<M>) -> Self {
        Self::new(ViewKind::Algorithm, summarize_comparison(comparison))
    }

    pub fn by_preset<M>(comparison: &Comparison<M>) -> Self {
        Self::new(ViewKind::Preset, summarize_comparison(comparison))
    }

    pub fn by_environment<M>(comparison: &Comparison<M>) -> Self {
        Self::new(ViewKind::Environment, summarize_comparison(comparison))
    }

    pub fn full_matrix<M>(sweep: &SweepResult<M>) -> Self {
        Self::new(ViewKind::FullMatrix, summarize_sweep(sweep))
    }

    fn new(kind: ViewKind, rows: Vec<SummaryRow>) -> Self {
        Self {
            kind,
            key_columns: kind.key_columns().iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Successful row with the highest test-data return
    pub fn best_by_test_return(&self) -> Option<&SummaryRow> {
        let mut best: Option<(&SummaryRow, f64)> = None;
        for row in &self.rows {
            if let RowCells::Metrics {
                test_return_pct, ..
            } = row.cells
            {
                match best {
                    Some((_, best_pct)) if test_return_pct <= best_pct => {}
                    _ => best = Some((row, test_return_pct)),
                }
            }
        }
        best.map(|(row, _)| row)
    }

    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.cells.is_error()).count()
    }
}

/// One row per entry of a single-key comparison, in comparison order
pub fn summarize_comparison<M>(comparison: &Comparison<M>) -> Vec<SummaryRow> {
    comparison
        .iter()
        .map(|(key, outcome)| SummaryRow {
            path: vec![key.to_string()],
            cells: RowCells::from_outcome(outcome),
        })
        .collect()
}

/// One row per (algorithm, environment, run label) cell, in traversal order
pub fn summarize_sweep<M>(sweep: &SweepResult<M>) -> Vec<SummaryRow> {
    let mut rows = Vec::new();
    for (algorithm, by_env) in sweep.iter() {
        for (environment, cells) in by_env.iter() {
            for (label, outcome) in cells.iter() {
                rows.push(SummaryRow {
                    path: vec![
                        algorithm.to_string(),
                        environment.to_string(),
                        label.to_string(),
                    ],
                    cells: RowCells::from_outcome(outcome),
                });
            }
        }
    }
    rows
}

/// Train versus test action usage for one run
pub fn action_breakdown<M>(result: &ExperimentResult<M>) -> Vec<ActionUsageRow> {
    compare_actions(
        &result.train.metrics.action_stats,
        &result.test.metrics.action_stats,
    )
}

/// Action breakdown for every successful entry of a comparison
pub fn action_breakdowns<M>(comparison: &Comparison<M>) -> Labeled<Vec<ActionUsageRow>> {
    comparison
        .iter()
        .filter_map(|(key, outcome)| {
            outcome
                .as_success()
                .map(|result| (key, action_breakdown(result)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::collaborators::Evaluation;
    use crate::sweep::metrics::EpisodeRecord;
    use crate::sweep::params::{ParamMap, ResolvedConfig};
    use crate::sweep::result::PhaseResult;
    use chrono::Utc;
    use uuid::Uuid;

    fn phase(final_value: f64, actions: &[&str]) -> PhaseResult {
        PhaseResult::from_evaluation(Evaluation {
            rewards: vec![final_value - 100.0],
            episodes: vec![EpisodeRecord::completed(
                100.0,
                final_value,
                actions.iter().map(|a| a.to_string()).collect(),
            )],
        })
    }

    fn success(train_final: f64, test_final: f64) -> ExperimentOutcome<()> {
        ExperimentOutcome::success(ExperimentResult {
            run_id: Uuid::new_v4(),
            model: (),
            algorithm: "PPO".to_string(),
            config: ResolvedConfig::preset("default", ParamMap::new()),
            total_steps: 1000,
            train: phase(train_final, &["buy", "buy", "hold"]),
            test: phase(test_final, &["sell"]),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        })
    }

    #[test]
    fn test_rows_follow_comparison_order() {
        let mut comparison = Comparison::new();
        comparison.insert("A2C", success(110.0, 105.0));
        comparison.insert("PPO", ExperimentOutcome::failure("timeout"));

        let view = ComparisonView::by_algorithm(&comparison);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.rows[0].path, vec!["A2C"]);
        assert_eq!(view.rows[1].cells, RowCells::Error);
        assert_eq!(view.error_count(), 1);

        match &view.rows[0].cells {
            RowCells::Metrics {
                train_return_pct,
                test_return_pct,
                top_train_action,
                top_test_action,
                ..
            } => {
                assert!((train_return_pct - 10.0).abs() < 1e-9);
                assert!((test_return_pct - 5.0).abs() < 1e-9);
                assert_eq!(top_train_action.as_ref().unwrap().label, "buy");
                assert_eq!(top_test_action.as_ref().unwrap().percentage, 100.0);
            }
            RowCells::Error => panic!("expected metrics row"),
        }
    }

    #[test]
    fn test_error_row_serializes_uniformly() {
        let row = SummaryRow {
            path: vec!["PPO".to_string()],
            cells: RowCells::Error,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"path": ["PPO"], "status": "error"}));
    }

    #[test]
    fn test_full_matrix_and_idempotence() {
        let mut cells = Labeled::new();
        cells.insert("default", success(120.0, 90.0));
        cells.insert("explorative", ExperimentOutcome::failure("diverged"));
        let mut by_env = Labeled::new();
        by_env.insert("bull", cells);
        let mut sweep: SweepResult<()> = Labeled::new();
        sweep.insert("PPO", by_env);

        let first = serde_json::to_string(&ComparisonView::full_matrix(&sweep)).unwrap();
        let second = serde_json::to_string(&ComparisonView::full_matrix(&sweep)).unwrap();
        assert_eq!(first, second);

        let view = ComparisonView::full_matrix(&sweep);
        assert_eq!(view.key_columns, vec!["algorithm", "environment", "preset"]);
        assert_eq!(view.rows[0].path, vec!["PPO", "bull", "default"]);
        assert_eq!(view.rows[1].path, vec!["PPO", "bull", "explorative"]);
    }

    #[test]
    fn test_best_by_test_return_skips_errors() {
        let mut comparison = Comparison::new();
        comparison.insert("default", success(110.0, 101.0));
        comparison.insert("explorative", ExperimentOutcome::failure("nan loss"));
        comparison.insert("conservative", success(105.0, 103.0));

        let view = ComparisonView::by_preset(&comparison);
        assert_eq!(view.best_by_test_return().unwrap().path, vec!["conservative"]);
    }

    #[test]
    fn test_action_breakdowns_skip_failed_entries() {
        let mut comparison = Comparison::new();
        comparison.insert("bull", success(110.0, 101.0));
        comparison.insert("bear", ExperimentOutcome::failure("no data"));

        let breakdowns = action_breakdowns(&comparison);
        assert_eq!(breakdowns.len(), 1);
        let rows = breakdowns.get("bull").unwrap();
        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["buy", "hold", "sell"]);
        assert_eq!(rows[2].train_count, 0);
    }
}
