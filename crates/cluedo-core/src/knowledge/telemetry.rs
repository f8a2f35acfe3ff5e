use super::engine::Knowledge;
use crate::model::category::Category;
use crate::model::player::MAX_PLAYERS;
use serde::{Deserialize, Serialize};

/// Flat counters describing how much a viewer has pinned down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeMetrics {
    pub events: usize,
    pub constraints: usize,
    pub candidates_per_category: [usize; 3],
    pub known_per_seat: [usize; MAX_PLAYERS],
    pub lacks_per_seat: [usize; MAX_PLAYERS],
    pub unknown_cards: usize,
    pub certain: bool,
}

impl KnowledgeMetrics {
    pub fn from_knowledge(knowledge: &Knowledge) -> Self {
        let store = knowledge.store();
        let mut known_per_seat = [0; MAX_PLAYERS];
        let mut lacks_per_seat = [0; MAX_PLAYERS];

        for seat in store.table().seats() {
            known_per_seat[seat.index()] = store.has(seat).len();
            lacks_per_seat[seat.index()] = store.lacks(seat).len();
        }

        Self {
            events: knowledge.log().len(),
            constraints: knowledge.constraints().len(),
            candidates_per_category: Category::ALL.map(|category| store.possible(category).len()),
            known_per_seat,
            lacks_per_seat,
            unknown_cards: knowledge.unknown_cards().len(),
            certain: store.is_solution_certain(),
        }
    }

    /// Remaining candidate triples.
    pub fn solution_space(&self) -> usize {
        self.candidates_per_category.iter().product()
    }
}
