use cluedo_core::game::RevealChoice;
use cluedo_core::model::player::{MAX_PLAYERS, MIN_PLAYERS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;

const DEFAULT_MAX_ROUNDS: usize = 40;

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchmarkConfig {
    pub run_id: String,
    pub games: GamesConfig,
    pub agents: Vec<AgentConfig>,
    pub outputs: OutputsConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchmarkConfig {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ConfigError::Read {
            source,
            path: path.clone(),
        })?;
        let mut cfg: BenchmarkConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|source| ConfigError::Parse {
                source,
                path: path.clone(),
            })?;
        cfg.validate()
            .map_err(|source| ConfigError::Invalid { path, source })?;
        Ok(cfg)
    }

    /// Checks every block; call again after applying CLI overrides.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        check_name("run_id", &self.run_id)?;
        validate_agents(&mut self.agents)?;
        self.games.validate(self.agents.len())?;
        self.outputs.validate()?;
        if !self.agents.iter().any(|a| a.name == self.metrics.baseline) {
            return Err(invalid(
                "metrics.baseline",
                format!(
                    "baseline agent '{}' is not defined in agents list",
                    self.metrics.baseline
                ),
            ));
        }
        self.logging.validate()
    }

    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs::under(PathBuf::from(
            self.outputs.dir.replace("{run_id}", &self.run_id),
        ))
    }
}

/// How many games to play and how each one is run.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GamesConfig {
    pub seed: Option<u64>,
    pub count: usize,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Seat rotations played per deal; defaults to one per agent.
    #[serde(default)]
    pub rotations: Option<usize>,
    #[serde(default)]
    pub reveal: RevealChoice,
}

impl GamesConfig {
    fn validate(&self, agents: usize) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid("games.count", "at least one game is required"));
        }
        if self.max_rounds == 0 {
            return Err(invalid("games.max_rounds", "max_rounds must be at least 1"));
        }
        if let Some(rotations) = self.rotations
            && !(1..=agents).contains(&rotations)
        {
            return Err(invalid(
                "games.rotations",
                format!("rotations must be between 1 and {agents}"),
            ));
        }
        Ok(())
    }

    pub fn rotation_count(&self, agents: usize) -> usize {
        self.rotations.unwrap_or(agents)
    }
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

/// One seat's suggestion policy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Any triple avoiding the agent's own cards.
    Uniform,
    /// Prefers cards that are still solution candidates.
    Candidates,
}

/// Every artifact of a run lands under `dir`, which may use `{run_id}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub dir: String,
}

impl OutputsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.dir.trim().is_empty() {
            return Err(invalid("outputs.dir", "output directory must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsConfig {
    /// Agent every other agent is compared against.
    pub baseline: String,
}

/// Structured logging is off unless enabled.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.tracing_level.parse::<Level>().map(drop).map_err(|_| {
            invalid(
                "logging.tracing_level",
                format!("unknown level '{}'", self.tracing_level),
            )
        })
    }

    pub fn level(&self) -> Level {
        self.tracing_level.parse().unwrap_or(Level::INFO)
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn check_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid(
            field,
            "may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_agents(agents: &mut [AgentConfig]) -> Result<(), ValidationError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&agents.len()) {
        return Err(invalid(
            "agents",
            format!(
                "one agent per seat is required: expected {MIN_PLAYERS} to {MAX_PLAYERS}, found {}",
                agents.len()
            ),
        ));
    }

    let mut seen = HashSet::new();
    for (index, agent) in agents.iter_mut().enumerate() {
        check_name(&format!("agents[{index}].name"), &agent.name)?;
        if !seen.insert(agent.name.clone()) {
            return Err(invalid(
                "agents",
                format!("agent name '{}' defined more than once", agent.name),
            ));
        }
        if agent.params.is_null() {
            agent.params = serde_yaml::Value::Mapping(Default::default());
        }
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Concrete artifact paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    /// Also receives `telemetry.jsonl` and its summaries.
    pub dir: PathBuf,
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub plots_dir: PathBuf,
}

impl ResolvedOutputs {
    pub fn under(dir: PathBuf) -> Self {
        Self {
            jsonl: dir.join("games.jsonl"),
            summary_md: dir.join("summary.md"),
            plots_dir: dir.join("plots"),
            dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
run_id: "deduction_smoke"
games:
  seed: 123
  count: 16
agents:
  - name: "uniform"
    kind: "uniform"
  - name: "focused"
    kind: "candidates"
    params:
      explore: 0.1
  - name: "focused_2"
    kind: "candidates"
outputs:
  dir: "bench/out/{run_id}"
metrics:
  baseline: "uniform"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    fn field_of(yaml: &str) -> String {
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(yaml).expect("parse");
        match cfg.validate() {
            Err(ValidationError::InvalidField { field, .. }) => field,
            Ok(()) => panic!("config unexpectedly valid"),
        }
    }

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(BASIC_YAML).expect("parse yaml");
        cfg.validate().expect("validate");

        assert_eq!(cfg.games.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(cfg.games.rotation_count(cfg.agents.len()), 3);
        assert_eq!(cfg.games.reveal, RevealChoice::First);
        assert!(cfg.logging.enable_structured);
        assert_eq!(cfg.logging.level(), Level::DEBUG);
        assert!(cfg.agents[0].params.is_mapping());

        let outputs = cfg.resolved_outputs();
        assert_eq!(outputs.dir, PathBuf::from("bench/out/deduction_smoke"));
        assert_eq!(
            outputs.jsonl,
            PathBuf::from("bench/out/deduction_smoke/games.jsonl")
        );
        assert_eq!(
            outputs.plots_dir,
            PathBuf::from("bench/out/deduction_smoke/plots")
        );
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bench.yaml");
        std::fs::write(&path, BASIC_YAML).expect("write config");
        let cfg = BenchmarkConfig::from_path(&path).expect("load");
        assert_eq!(cfg.run_id, "deduction_smoke");

        let err = BenchmarkConfig::from_path(dir.path().join("missing.yaml"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn parses_reveal_choice() {
        let yaml = BASIC_YAML.replace("count: 16\n", "count: 16\n  reveal: \"random\"\n");
        let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.games.reveal, RevealChoice::Random);
    }

    #[test]
    fn rejects_unknown_baseline() {
        let yaml = BASIC_YAML.replace("baseline: \"uniform\"", "baseline: \"nobody\"");
        assert_eq!(field_of(&yaml), "metrics.baseline");
    }

    #[test]
    fn rejects_duplicate_agents() {
        let yaml = BASIC_YAML.replace("name: \"focused_2\"", "name: \"focused\"");
        assert_eq!(field_of(&yaml), "agents");
    }

    #[test]
    fn rejects_single_agent_table() {
        let yaml = BASIC_YAML.replace(
            "  - name: \"focused\"\n    kind: \"candidates\"\n    params:\n      explore: 0.1\n  - name: \"focused_2\"\n    kind: \"candidates\"\n",
            "",
        );
        assert_eq!(field_of(&yaml), "agents");
    }

    #[test]
    fn rejects_invalid_names() {
        let yaml = BASIC_YAML.replace("deduction_smoke", "deduction smoke");
        assert_eq!(field_of(&yaml), "run_id");
        let yaml = BASIC_YAML.replace("name: \"focused_2\"", "name: \"focused/2\"");
        assert_eq!(field_of(&yaml), "agents[2].name");
    }

    #[test]
    fn rejects_too_many_rotations() {
        let yaml = BASIC_YAML.replace("count: 16\n", "count: 16\n  rotations: 4\n");
        assert_eq!(field_of(&yaml), "games.rotations");
    }

    #[test]
    fn rejects_unknown_tracing_level() {
        let yaml = BASIC_YAML.replace("tracing_level: \"debug\"", "tracing_level: \"loud\"");
        assert_eq!(field_of(&yaml), "logging.tracing_level");
    }

    #[test]
    fn rejects_blank_output_dir() {
        let yaml = BASIC_YAML.replace("dir: \"bench/out/{run_id}\"", "dir: \"  \"");
        assert_eq!(field_of(&yaml), "outputs.dir");
    }
}
