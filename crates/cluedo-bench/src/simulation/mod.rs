pub mod policy;
mod rotation;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use cluedo_core::error::KnowledgeError;
use cluedo_core::game::{Deal, resolve};
use cluedo_core::knowledge::{FixedPointReport, Knowledge, KnowledgeMetrics, Solution};
use cluedo_core::model::player::PlayerId;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{BenchmarkConfig, ResolvedOutputs};
use crate::telemetry::{
    TelemetryError, TelemetryOutputs, append_highlights_to_markdown, write_summary_outputs,
};

use policy::{AgentBlueprint, AgentError, SuggestionPolicy};
use rotation::SeatRotations;

/// Mixed into the deal seed so suggestion choices do not mirror the shuffle.
const POLICY_STREAM: u64 = 0x5EED_C1DE_D0_u64;

/// Primary entry point for running simulated games.
pub struct SimulationRunner {
    config: BenchmarkConfig,
    outputs: ResolvedOutputs,
    agents: Vec<AgentBlueprint>,
    rotations: SeatRotations,
    logging_enabled: bool,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub games_played: usize,
    pub rotations: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_path: Option<PathBuf>,
    pub telemetry_path: Option<PathBuf>,
    pub telemetry_outputs: Option<TelemetryOutputs>,
}

impl SimulationRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchmarkConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let agents = AgentBlueprint::from_configs(&config.agents)?;
        let rotations = SeatRotations::new(
            agents.len(),
            config.games.rotation_count(agents.len()),
        );

        Ok(Self {
            logging_enabled: config.logging.enable_structured,
            config,
            outputs,
            agents,
            rotations,
        })
    }

    /// Play every configured game, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        fs::create_dir_all(&self.outputs.plots_dir)?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let rotations = self.rotations.as_slice();
        let mut rng = StdRng::seed_from_u64(self.config.games.seed.unwrap_or(0));
        let mut rows_written = 0usize;
        let mut analytics = AnalyticsCollector::new(&self.config)?;

        for game_index in 0..self.config.games.count {
            let base_seed = rng.next_u64();

            for (rotation_index, rotation) in rotations.iter().enumerate() {
                let outcome = self.play_game(game_index, rotation_index, base_seed, rotation)?;
                analytics.record_game(&outcome)?;
                rows_written += write_game_rows(
                    &mut writer,
                    &self.config,
                    game_index,
                    rotation_index,
                    base_seed,
                    &outcome,
                )?;
            }
        }

        writer.flush()?;

        let summary = analytics.finalize()?;
        summary.write_markdown(&self.outputs.summary_md)?;
        let plot_path = match summary.render_plot(&self.outputs.plots_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                eprintln!("WARN: {}", err);
                None
            }
        };

        let telemetry_dir = &self.outputs.dir;
        let telemetry_path = if self.logging_enabled {
            Some(telemetry_dir.join("telemetry.jsonl"))
        } else {
            None
        };

        let telemetry_outputs = if let Some(path) = telemetry_path.as_ref() {
            write_summary_outputs(path, telemetry_dir)?
        } else {
            None
        };

        if let Some(outputs) = telemetry_outputs.as_ref() {
            append_highlights_to_markdown(&self.outputs.summary_md, outputs)?;
        }

        Ok(RunSummary {
            games_played: self.config.games.count,
            rotations: rotations.len(),
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            plot_path,
            telemetry_path,
            telemetry_outputs,
        })
    }

    fn play_game(
        &self,
        game_index: usize,
        rotation_index: usize,
        base_seed: u64,
        rotation: &[usize],
    ) -> Result<GameOutcome, RunnerError> {
        let game_id = game_id(game_index, rotation_index);
        let players = rotation.len();
        let deal = Deal::with_seed(players, base_seed)?;
        let mut rng = StdRng::seed_from_u64(base_seed ^ POLICY_STREAM);
        let mut seats = build_seat_states(rotation, &self.agents, &deal)?;
        let turn_limit = self.config.games.max_rounds * players;
        let mut turns_played = 0usize;

        for turn in 0..turn_limit {
            if seats.iter().all(|seat| seat.knowledge.is_solution_certain()) {
                break;
            }

            let suggester_index = turn % players;
            let (suggester, suggestion) = {
                let seat = &mut seats[suggester_index];
                seat.metrics.suggestions += 1;
                (seat.seat, seat.policy.choose(&seat.knowledge, &mut rng)?)
            };
            let resolution = resolve(
                &deal,
                suggester,
                suggestion,
                self.config.games.reveal,
                &mut rng,
            )?;
            turns_played = turn + 1;

            for seat in seats.iter_mut() {
                let was_certain = seat.knowledge.is_solution_certain();
                let report = seat
                    .knowledge
                    .report_suggestion(resolution.report_for(seat.seat))
                    .map_err(|source| RunnerError::Engine {
                        game_id: game_id.clone(),
                        seat: seat.seat,
                        source,
                    })?;
                seat.metrics.record(&report);

                if was_certain {
                    continue;
                }
                if let Some(deduced) = seat.knowledge.solution() {
                    if deduced != deal.solution() {
                        return Err(RunnerError::UnsoundSolution {
                            game_id,
                            seat: seat.seat,
                            deduced,
                            actual: deal.solution(),
                        });
                    }
                    seat.certain_at = Some(turns_played);
                    if self.logging_enabled {
                        event!(
                            target: "cluedo_bench::certainty",
                            Level::INFO,
                            run_id = %self.config.run_id,
                            game_id = %game_id,
                            seat = %seat.seat,
                            agent = %seat.agent_name,
                            turn = turns_played,
                            events = seat.metrics.events
                        );
                    }
                }
            }

            if self.logging_enabled && tracing::enabled!(Level::DEBUG) {
                let refuter = resolution
                    .refuter
                    .map(|player| player.to_string())
                    .unwrap_or_else(|| "-".to_string());
                event!(
                    target: "cluedo_bench::turn",
                    Level::DEBUG,
                    run_id = %self.config.run_id,
                    game_id = %game_id,
                    turn = turns_played,
                    suggester = %suggester,
                    suggestion = %suggestion,
                    refuter = %refuter,
                    passers = resolution.passers.len()
                );
            }
        }

        let seating = seats
            .iter()
            .map(|seat| SeatSnapshot {
                seat: seat.seat.to_string(),
                agent: seat.agent_name.clone(),
            })
            .collect();

        let seat_results = seats
            .into_iter()
            .map(|seat| SeatResult {
                final_metrics: KnowledgeMetrics::from_knowledge(&seat.knowledge),
                agent_name: seat.agent_name,
                seat: seat.seat,
                certain_at: seat.certain_at,
                metrics: seat.metrics.finalize(),
            })
            .collect();

        Ok(GameOutcome {
            game_id,
            seating,
            seat_results,
            turns_played,
            turn_limit,
            solution: deal.solution(),
        })
    }
}

fn game_id(game_index: usize, rotation_index: usize) -> String {
    format!("G{game_index:05}_R{rotation_index:02}")
}

fn write_game_rows(
    writer: &mut BufWriter<File>,
    config: &BenchmarkConfig,
    game_index: usize,
    rotation_index: usize,
    base_seed: u64,
    outcome: &GameOutcome,
) -> Result<usize, RunnerError> {
    let mut rows_written = 0usize;
    for seat_result in &outcome.seat_results {
        let row = GameLogRow {
            run_id: config.run_id.clone(),
            game_id: outcome.game_id.clone(),
            game_index,
            rotation_index,
            game_seed: base_seed,
            players: outcome.seating.len(),
            seat: seat_result.seat.to_string(),
            agent: seat_result.agent_name.clone(),
            seating: outcome.seating.clone(),
            solved: seat_result.certain_at.is_some(),
            turns_to_certainty: seat_result.certain_at,
            turns_played: outcome.turns_played,
            suggestions: seat_result.metrics.suggestions,
            events: seat_result.metrics.events,
            avg_passes: seat_result.metrics.avg_passes,
            max_passes: seat_result.metrics.max_passes,
            cap_hits: seat_result.metrics.cap_hits,
            rule_firings: seat_result.metrics.rule_firings,
            constraints_left: seat_result.final_metrics.constraints,
            candidates_left: seat_result.final_metrics.candidates_per_category,
        };

        serde_json::to_writer(&mut *writer, &row)?;
        writer.write_all(b"\n")?;
        rows_written += 1;
    }

    Ok(rows_written)
}

fn build_seat_states(
    rotation: &[usize],
    agents: &[AgentBlueprint],
    deal: &Deal,
) -> Result<Vec<SeatState>, RunnerError> {
    let players = rotation.len();
    let mut seats = Vec::with_capacity(players);
    for (seat_idx, agent_idx) in rotation.iter().enumerate() {
        let seat = PlayerId::from_index(seat_idx)
            .ok_or(RunnerError::InvalidRotation {
                index: seat_idx,
                agent_index: *agent_idx,
            })?;
        let agent = agents
            .get(*agent_idx)
            .ok_or(RunnerError::InvalidRotation {
                index: seat_idx,
                agent_index: *agent_idx,
            })?;
        let mut knowledge = Knowledge::new(seat, players)?;
        knowledge.deal_initial_hand(&deal.hand_cards(seat)?)?;
        seats.push(SeatState {
            seat,
            agent_name: agent.name.clone(),
            policy: agent.spawn_policy(),
            knowledge,
            certain_at: None,
            metrics: DeductionMetrics::default(),
        });
    }
    Ok(seats)
}

struct SeatState {
    seat: PlayerId,
    agent_name: String,
    policy: Box<dyn SuggestionPolicy>,
    knowledge: Knowledge,
    certain_at: Option<usize>,
    metrics: DeductionMetrics,
}

pub struct GameOutcome {
    pub game_id: String,
    pub seating: Vec<SeatSnapshot>,
    pub seat_results: Vec<SeatResult>,
    pub turns_played: usize,
    /// Turn count charged to seats that never reach certainty.
    pub turn_limit: usize,
    pub solution: Solution,
}

#[derive(Clone, Serialize)]
pub struct SeatSnapshot {
    pub seat: String,
    pub agent: String,
}

pub struct SeatResult {
    pub agent_name: String,
    pub seat: PlayerId,
    pub certain_at: Option<usize>,
    pub metrics: DeductionSummary,
    pub final_metrics: KnowledgeMetrics,
}

#[derive(Default)]
struct DeductionMetrics {
    suggestions: usize,
    events: usize,
    total_passes: usize,
    max_passes: usize,
    cap_hits: usize,
    rule_firings: usize,
}

impl DeductionMetrics {
    fn record(&mut self, report: &FixedPointReport) {
        self.events += 1;
        self.total_passes += report.passes;
        self.max_passes = self.max_passes.max(report.passes);
        if !report.converged {
            self.cap_hits += 1;
        }
        self.rule_firings += report.rule_firings.total();
    }

    fn finalize(self) -> DeductionSummary {
        let avg_passes = if self.events == 0 {
            0.0
        } else {
            self.total_passes as f64 / self.events as f64
        };

        DeductionSummary {
            suggestions: self.suggestions,
            events: self.events,
            avg_passes,
            max_passes: self.max_passes,
            cap_hits: self.cap_hits,
            rule_firings: self.rule_firings,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeductionSummary {
    pub suggestions: usize,
    pub events: usize,
    pub avg_passes: f64,
    pub max_passes: usize,
    pub cap_hits: usize,
    pub rule_firings: usize,
}

#[derive(Serialize)]
struct GameLogRow {
    run_id: String,
    game_id: String,
    game_index: usize,
    rotation_index: usize,
    game_seed: u64,
    players: usize,
    seat: String,
    agent: String,
    seating: Vec<SeatSnapshot>,
    solved: bool,
    turns_to_certainty: Option<usize>,
    turns_played: usize,
    suggestions: usize,
    events: usize,
    avg_passes: f64,
    max_passes: usize,
    cap_hits: usize,
    rule_firings: usize,
    constraints_left: usize,
    candidates_left: [usize; 3],
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("game setup failed: {0}")]
    Setup(#[from] KnowledgeError),
    #[error("{seat} rejected an event in {game_id}: {source}")]
    Engine {
        game_id: String,
        seat: PlayerId,
        #[source]
        source: KnowledgeError,
    },
    #[error("{seat} deduced {deduced} in {game_id} but the solution is {actual}")]
    UnsoundSolution {
        game_id: String,
        seat: PlayerId,
        deduced: Solution,
        actual: Solution,
    },
    #[error("rotation seat {index} references invalid agent index {agent_index}")]
    InvalidRotation { index: usize, agent_index: usize },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("telemetry summarisation failed: {0}")]
    Telemetry(#[from] TelemetryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, AgentKind};

    fn agents(kinds: &[AgentKind]) -> Vec<AgentBlueprint> {
        let configs: Vec<AgentConfig> = kinds
            .iter()
            .enumerate()
            .map(|(idx, kind)| AgentConfig {
                name: format!("agent{idx}"),
                kind: kind.clone(),
                params: serde_yaml::Value::Mapping(Default::default()),
            })
            .collect();
        AgentBlueprint::from_configs(&configs).unwrap()
    }

    #[test]
    fn seat_states_receive_their_hands() {
        let deal = Deal::with_seed(3, 42).unwrap();
        let blueprints = agents(&[AgentKind::Uniform, AgentKind::Candidates, AgentKind::Uniform]);
        let seats = build_seat_states(&[1, 2, 0], &blueprints, &deal).unwrap();
        assert_eq!(seats.len(), 3);
        assert_eq!(seats[0].agent_name, "agent1");
        for seat in &seats {
            assert_eq!(seat.knowledge.my_cards(), deal.hand(seat.seat).unwrap());
            assert!(seat.knowledge.is_dealt());
        }
    }

    #[test]
    fn rotation_pointing_past_agents_is_rejected() {
        let deal = Deal::with_seed(2, 1).unwrap();
        let blueprints = agents(&[AgentKind::Uniform, AgentKind::Uniform]);
        assert!(matches!(
            build_seat_states(&[0, 5], &blueprints, &deal),
            Err(RunnerError::InvalidRotation { index: 1, agent_index: 5 })
        ));
    }

    #[test]
    fn deduction_metrics_average_passes() {
        let mut metrics = DeductionMetrics::default();
        let mut report = FixedPointReport {
            passes: 1,
            converged: true,
            rule_firings: Default::default(),
        };
        metrics.record(&report);
        report.passes = 3;
        report.converged = false;
        metrics.record(&report);
        let summary = metrics.finalize();
        assert_eq!(summary.events, 2);
        assert!((summary.avg_passes - 2.0).abs() < f64::EPSILON);
        assert_eq!(summary.max_passes, 3);
        assert_eq!(summary.cap_hits, 1);
    }

    #[test]
    fn game_ids_are_zero_padded() {
        assert_eq!(game_id(3, 1), "G00003_R01");
    }
}
