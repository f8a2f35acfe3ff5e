use cluedo_core::error::KnowledgeError;
use cluedo_core::knowledge::{Knowledge, Suggestion};
use cluedo_core::model::card::Card;
use cluedo_core::model::card_set::CardSet;
use cluedo_core::model::category::Category;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::config::{AgentConfig, AgentKind};

/// Picks the next triple to suggest from what the seat currently knows.
pub trait SuggestionPolicy {
    fn choose(
        &mut self,
        knowledge: &Knowledge,
        rng: &mut StdRng,
    ) -> Result<Suggestion, KnowledgeError>;
}

/// Any card of each category the seat does not hold.
pub struct UniformPolicy;

impl SuggestionPolicy for UniformPolicy {
    fn choose(
        &mut self,
        knowledge: &Knowledge,
        rng: &mut StdRng,
    ) -> Result<Suggestion, KnowledgeError> {
        let unheld = CardSet::ALL.difference(knowledge.my_cards());
        triple_from(rng, |_| unheld)
    }
}

/// Probes cards that could still be the solution, falling back to any card
/// the seat does not hold once a category is exhausted.
pub struct CandidatePolicy {
    explore: f64,
}

impl CandidatePolicy {
    pub fn new(explore: f64) -> Self {
        Self { explore }
    }
}

impl SuggestionPolicy for CandidatePolicy {
    fn choose(
        &mut self,
        knowledge: &Knowledge,
        rng: &mut StdRng,
    ) -> Result<Suggestion, KnowledgeError> {
        let unheld = CardSet::ALL.difference(knowledge.my_cards());
        if self.explore > 0.0 && rng.gen_bool(self.explore) {
            return triple_from(rng, |_| unheld);
        }
        triple_from(rng, |category| {
            let candidates = knowledge.solution_candidates(category).difference(knowledge.my_cards());
            if candidates.is_empty() {
                unheld
            } else {
                candidates
            }
        })
    }
}

fn triple_from(
    rng: &mut StdRng,
    mut preferred: impl FnMut(Category) -> CardSet,
) -> Result<Suggestion, KnowledgeError> {
    let mut pick = |category: Category| pick_card(rng, preferred(category), category);
    let suspect = pick(Category::Suspect);
    let weapon = pick(Category::Weapon);
    let location = pick(Category::Location);
    Suggestion::new(suspect, weapon, location)
}

fn pick_card(rng: &mut StdRng, preferred: CardSet, category: Category) -> Card {
    let all = Card::of_category(category);
    let options: Vec<Card> = preferred
        .intersection(CardSet::of_category(category))
        .iter()
        .collect();
    options
        .choose(rng)
        .or_else(|| all.choose(rng))
        .copied()
        .unwrap_or(all[0])
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid parameter for agent '{name}': {message}")]
    InvalidParam { name: String, message: String },
}

/// Parsed agent definition that can spawn a fresh policy per game.
pub struct AgentBlueprint {
    pub name: String,
    implementation: AgentImplementation,
}

enum AgentImplementation {
    Uniform,
    Candidates(CandidateOptions),
}

impl AgentBlueprint {
    pub fn from_configs(configs: &[AgentConfig]) -> Result<Vec<Self>, AgentError> {
        configs.iter().map(Self::from_config).collect()
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let implementation = match config.kind {
            AgentKind::Uniform => AgentImplementation::Uniform,
            AgentKind::Candidates => AgentImplementation::Candidates(
                CandidateOptions::from_params(&config.name, &config.params)?,
            ),
        };

        Ok(Self {
            name: config.name.clone(),
            implementation,
        })
    }

    pub fn spawn_policy(&self) -> Box<dyn SuggestionPolicy> {
        match &self.implementation {
            AgentImplementation::Uniform => Box::new(UniformPolicy),
            AgentImplementation::Candidates(opts) => Box::new(CandidatePolicy::new(opts.explore)),
        }
    }
}

struct CandidateOptions {
    explore: f64,
}

impl CandidateOptions {
    fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, AgentError> {
        if params.is_null() {
            return Ok(Self { explore: 0.0 });
        }

        let mapping = params
            .as_mapping()
            .ok_or_else(|| AgentError::InvalidParam {
                name: name.to_string(),
                message: "expected mapping for candidates params".to_string(),
            })?;

        let explore_value = mapping
            .iter()
            .find_map(|(key, value)| (key.as_str() == Some("explore")).then_some(value));

        let explore = match explore_value {
            Some(value) => value.as_f64().ok_or_else(|| AgentError::InvalidParam {
                name: name.to_string(),
                message: "explore must be a number".to_string(),
            })?,
            None => 0.0,
        };

        if !(0.0..=1.0).contains(&explore) {
            return Err(AgentError::InvalidParam {
                name: name.to_string(),
                message: format!("explore must be within [0, 1], got {explore}"),
            });
        }

        Ok(Self { explore })
    }
}
