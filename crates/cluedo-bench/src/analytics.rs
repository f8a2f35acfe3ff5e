use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind, BenchmarkConfig};
use crate::simulation::{DeductionSummary, GameOutcome};

const CONFIDENCE_Z: f64 = 1.96; // 95% CI

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("baseline agent '{0}' not present in simulation results")]
    MissingBaseline(String),
    #[error("agent '{0}' defined in results but missing from configuration")]
    UnknownAgent(String),
    #[error("baseline '{0}' missing for game {1}")]
    MissingBaselineGame(String, String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

pub struct AnalyticsCollector {
    baseline: String,
    agents: HashMap<String, AgentAccumulator>,
    comparisons: HashMap<String, ComparisonAccumulator>,
    agent_order: Vec<String>,
}

impl AnalyticsCollector {
    pub fn new(config: &BenchmarkConfig) -> Result<Self, AnalyticsError> {
        let baseline = config.metrics.baseline.clone();

        let mut agents = HashMap::new();
        let mut order = Vec::new();
        for agent in &config.agents {
            agents.insert(
                agent.name.clone(),
                AgentAccumulator::new(agent.name.clone(), agent.clone()),
            );
            order.push(agent.name.clone());
        }

        Ok(Self {
            baseline,
            agents,
            comparisons: HashMap::new(),
            agent_order: order,
        })
    }

    /// Seats that never reach certainty are charged the game's turn limit so
    /// the paired comparison still sees them.
    pub fn record_game(&mut self, outcome: &GameOutcome) -> Result<(), AnalyticsError> {
        let charged = |certain_at: Option<usize>| certain_at.unwrap_or(outcome.turn_limit) as f64;

        let baseline_turns = outcome
            .seat_results
            .iter()
            .find(|seat| seat.agent_name == self.baseline)
            .map(|seat| charged(seat.certain_at))
            .ok_or_else(|| {
                AnalyticsError::MissingBaselineGame(self.baseline.clone(), outcome.game_id.clone())
            })?;

        for seat in &outcome.seat_results {
            let acc = self
                .agents
                .get_mut(&seat.agent_name)
                .ok_or_else(|| AnalyticsError::UnknownAgent(seat.agent_name.clone()))?;
            acc.record_seat(seat.certain_at, &seat.metrics);
        }

        for seat in &outcome.seat_results {
            if seat.agent_name == self.baseline {
                continue;
            }
            let diff = charged(seat.certain_at) - baseline_turns;
            self.comparisons
                .entry(seat.agent_name.clone())
                .or_insert_with(ComparisonAccumulator::new)
                .record(diff);
        }

        Ok(())
    }

    pub fn finalize(mut self) -> Result<AnalyticsSummary, AnalyticsError> {
        let mut reports = Vec::new();
        for name in &self.agent_order {
            if let Some(acc) = self.agents.remove(name) {
                reports.push(acc.into_report());
            }
        }

        if !reports.iter().any(|report| report.name == self.baseline) {
            return Err(AnalyticsError::MissingBaseline(self.baseline));
        }

        let mut comparisons = Vec::new();
        for report in &reports {
            if report.name == self.baseline {
                comparisons.push(ComparisonReport {
                    agent: report.name.clone(),
                    p_value: 1.0,
                    sample_size: report.seats,
                });
                continue;
            }
            let (p_value, sample_size) = self
                .comparisons
                .remove(&report.name)
                .map(ComparisonAccumulator::wilcoxon_signed_rank)
                .unwrap_or((1.0, 0));
            comparisons.push(ComparisonReport {
                agent: report.name.clone(),
                p_value,
                sample_size,
            });
        }

        Ok(AnalyticsSummary {
            baseline: self.baseline,
            agents: reports,
            comparisons,
        }
        .enrich())
    }
}

struct AgentAccumulator {
    name: String,
    config: AgentConfig,
    seats: usize,
    turns_to_certainty: Vec<usize>,
    suggestions: usize,
    events: usize,
    weighted_passes: f64,
    max_passes: usize,
    cap_hits: usize,
    rule_firings: usize,
}

impl AgentAccumulator {
    fn new(name: String, config: AgentConfig) -> Self {
        Self {
            name,
            config,
            seats: 0,
            turns_to_certainty: Vec::new(),
            suggestions: 0,
            events: 0,
            weighted_passes: 0.0,
            max_passes: 0,
            cap_hits: 0,
            rule_firings: 0,
        }
    }

    fn record_seat(&mut self, certain_at: Option<usize>, metrics: &DeductionSummary) {
        self.seats += 1;
        if let Some(turn) = certain_at {
            self.turns_to_certainty.push(turn);
        }
        self.suggestions += metrics.suggestions;
        self.events += metrics.events;
        self.weighted_passes += metrics.avg_passes * metrics.events as f64;
        self.max_passes = self.max_passes.max(metrics.max_passes);
        self.cap_hits += metrics.cap_hits;
        self.rule_firings += metrics.rule_firings;
    }

    fn into_report(self) -> AgentReport {
        let turns: Vec<f64> = self.turns_to_certainty.iter().map(|&t| t as f64).collect();
        let mean_turns = mean(&turns);
        let ci95 = confidence_interval(&turns);
        let solve_rate = if self.seats == 0 {
            0.0
        } else {
            self.turns_to_certainty.len() as f64 / self.seats as f64
        };
        let avg_passes = if self.events == 0 {
            0.0
        } else {
            self.weighted_passes / self.events as f64
        };

        AgentReport {
            name: self.name,
            kind: self.config.kind,
            params: self.config.params,
            seats: self.seats,
            solved: self.turns_to_certainty.len(),
            solve_rate,
            mean_turns,
            ci95,
            suggestions: self.suggestions,
            events: self.events,
            avg_passes,
            max_passes: self.max_passes,
            cap_hits: self.cap_hits,
            rule_firings: self.rule_firings,
            turns_to_certainty: self.turns_to_certainty,
            delta_vs_baseline: 0.0,
        }
    }
}

#[derive(Clone)]
struct ComparisonAccumulator {
    diffs: Vec<f64>,
}

impl ComparisonAccumulator {
    fn new() -> Self {
        Self { diffs: Vec::new() }
    }

    fn record(&mut self, diff: f64) {
        self.diffs.push(diff);
    }

    /// Two-sided normal approximation with tie correction; zero differences
    /// are dropped.
    fn wilcoxon_signed_rank(self) -> (f64, usize) {
        let diffs: Vec<f64> = self
            .diffs
            .into_iter()
            .filter(|d| d.abs() > f64::EPSILON)
            .collect();
        let n = diffs.len();
        if n == 0 {
            return (1.0, 0);
        }

        let mut paired: Vec<(f64, f64)> =
            diffs.into_iter().map(|d| (d.abs(), d.signum())).collect();
        paired.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut ranks = Vec::with_capacity(n);
        let mut tie_sizes = Vec::new();
        let mut i = 0;
        while i < paired.len() {
            let mut j = i;
            while j + 1 < paired.len() && (paired[j + 1].0 - paired[i].0).abs() < 1e-12 {
                j += 1;
            }
            let rank = (i + j + 2) as f64 / 2.0;
            for (_, sign) in &paired[i..=j] {
                ranks.push((rank, *sign));
            }
            if j > i {
                tie_sizes.push(j - i + 1);
            }
            i = j + 1;
        }

        let w_plus: f64 = ranks
            .iter()
            .filter(|(_, sign)| *sign > 0.0)
            .map(|(rank, _)| *rank)
            .sum();
        let w_minus: f64 = ranks
            .iter()
            .filter(|(_, sign)| *sign < 0.0)
            .map(|(rank, _)| *rank)
            .sum();

        let w = w_plus.min(w_minus);
        let n_f = n as f64;
        let mean_w = n_f * (n_f + 1.0) / 4.0;

        let tie_adjustment: f64 = tie_sizes
            .into_iter()
            .map(|count| {
                let c = count as f64;
                (c.powi(3) - c) / 48.0
            })
            .sum();
        let variance_w = n_f * (n_f + 1.0) * (2.0 * n_f + 1.0) / 24.0 - tie_adjustment;
        if variance_w <= 0.0 {
            return (1.0, n);
        }

        let z = ((w - mean_w).abs() - 0.5).max(0.0) / variance_w.sqrt();
        let Ok(normal) = Normal::new(0.0, 1.0) else {
            return (1.0, n);
        };
        let p = 2.0 * (1.0 - normal.cdf(z));
        (p.clamp(0.0, 1.0), n)
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub baseline: String,
    pub agents: Vec<AgentReport>,
    pub comparisons: Vec<ComparisonReport>,
}

impl AnalyticsSummary {
    pub fn enrich(mut self) -> Self {
        let baseline_mean = self
            .agents
            .iter()
            .find(|agent| agent.name == self.baseline)
            .map(|agent| agent.mean_turns)
            .unwrap_or(0.0);

        for agent in &mut self.agents {
            agent.delta_vs_baseline = agent.mean_turns - baseline_mean;
        }

        self
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str("# Deduction Benchmark Summary\n\n");
        rows.push_str(&format!(
            "Baseline: `{}`. Turns count suggestions made at the table until the seat's solution became certain.\n\n",
            self.baseline
        ));
        rows.push_str("| Agent | Kind | Seats | Solved % | Mean turns | Δ vs baseline | 95% CI | Avg passes | Max passes | Cap hits | p-value |\n");
        rows.push_str("|-------|------|-------|----------|------------|---------------|--------|------------|------------|----------|---------|\n");

        for agent in &self.agents {
            let p_value = self
                .comparisons
                .iter()
                .find(|c| c.agent == agent.name)
                .map(|c| c.p_value)
                .unwrap_or(1.0);

            rows.push_str(&format!(
                "| {name} | {kind:?} | {seats} | {solved:.1}% | {mean:.2} | {delta:+.2} | [{ci_low:.2}, {ci_high:.2}] | {passes:.2} | {max_passes} | {cap_hits} | {pval:.3} |\n",
                name = agent.name,
                kind = agent.kind,
                seats = agent.seats,
                solved = agent.solve_rate * 100.0,
                mean = agent.mean_turns,
                delta = agent.delta_vs_baseline,
                ci_low = agent.ci95.0,
                ci_high = agent.ci95.1,
                passes = agent.avg_passes,
                max_passes = agent.max_passes,
                cap_hits = agent.cap_hits,
                pval = p_value,
            ));
        }

        fs::write(path.as_ref(), rows).map_err(|e| AnalyticsError::Io {
            context: "writing summary markdown",
            source: e,
        })?;
        Ok(())
    }

    /// Grouped histogram of turns to certainty, one colour per agent.
    pub fn render_plot(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyticsError> {
        let dir = dir.as_ref();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| AnalyticsError::Io {
                context: "creating plots directory",
                source: e,
            })?;
        }

        let output_path = dir.join("turns_to_certainty.png");
        let agents_snapshot = self.agents.clone();

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let plot_attempt = std::panic::catch_unwind(move || {
            let root = BitMapBackend::new(&output_path, (800, 480)).into_drawing_area();
            root.fill(&WHITE)
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            let max_turn = agents_snapshot
                .iter()
                .flat_map(|agent| agent.turns_to_certainty.iter().copied())
                .max()
                .unwrap_or(0)
                .max(1);
            let histograms: Vec<Vec<usize>> = agents_snapshot
                .iter()
                .map(|agent| {
                    let mut counts = vec![0usize; max_turn + 1];
                    for &turn in &agent.turns_to_certainty {
                        counts[turn] += 1;
                    }
                    counts
                })
                .collect();
            let max_count = histograms
                .iter()
                .flat_map(|counts| counts.iter().copied())
                .max()
                .unwrap_or(0)
                .max(1);
            let width = 1.0 / agents_snapshot.len().max(1) as f64;

            let mut chart = ChartBuilder::on(&root)
                .margin(20)
                .caption("Turns to certainty per agent", ("sans-serif", 22))
                .set_label_area_size(LabelAreaPosition::Left, 50)
                .set_label_area_size(LabelAreaPosition::Bottom, 60)
                .build_cartesian_2d(0.0..(max_turn as f64 + 1.0), 0usize..(max_count + 1))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .configure_mesh()
                .disable_mesh()
                .y_desc("Seats")
                .x_desc("Turn")
                .draw()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            chart
                .draw_series(histograms.iter().enumerate().flat_map(|(agent_idx, counts)| {
                    let offset = agent_idx as f64 * width;
                    counts
                        .iter()
                        .enumerate()
                        .filter(|(_, count)| **count > 0)
                        .map(move |(turn, count)| {
                            let left = turn as f64 + offset;
                            Rectangle::new(
                                [(left, 0), (left + width, *count)],
                                Palette99::pick(agent_idx).filled(),
                            )
                        })
                }))
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(chart);

            root.present()
                .map_err(|e| AnalyticsError::Plot(e.to_string()))?;

            drop(root);

            Ok(output_path)
        });

        std::panic::set_hook(prev_hook);

        match plot_attempt {
            Ok(result) => result,
            Err(_) => Err(AnalyticsError::Plot(
                "plotters panicked while rendering (missing font support?)".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub name: String,
    pub kind: AgentKind,
    pub params: serde_yaml::Value,
    pub seats: usize,
    pub solved: usize,
    pub solve_rate: f64,
    pub mean_turns: f64,
    pub ci95: (f64, f64),
    pub suggestions: usize,
    pub events: usize,
    pub avg_passes: f64,
    pub max_passes: usize,
    pub cap_hits: usize,
    pub rule_firings: usize,
    #[serde(skip)]
    pub turns_to_certainty: Vec<usize>,
    #[serde(skip)]
    pub delta_vs_baseline: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub agent: String,
    pub p_value: f64,
    pub sample_size: usize,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn confidence_interval(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = mean(values);
    if values.len() == 1 {
        return (mean, mean);
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    let std_error = (variance / values.len() as f64).sqrt();
    let margin = CONFIDENCE_Z * std_error;
    (mean - margin, mean + margin)
}
