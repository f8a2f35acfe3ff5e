//! Read-only views over a [`Knowledge`] state.

use super::engine::Knowledge;
use super::record::{Solution, Suggestion};
use crate::error::KnowledgeError;
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::category::Category;
use crate::model::player::PlayerId;
use core::fmt;

impl Knowledge {
    /// Cards of `category` not yet eliminated as the solution.
    pub fn possible(&self, category: Category) -> CardSet {
        self.store().possible(category)
    }

    /// Per-category candidate sets in suspect, weapon, location order.
    pub fn possible_solutions(&self) -> [CardSet; 3] {
        Category::ALL.map(|category| self.possible(category))
    }

    pub fn is_solution_certain(&self) -> bool {
        self.store().is_solution_certain()
    }

    /// The deduced triple, once every category is down to one card.
    pub fn solution(&self) -> Option<Solution> {
        self.store().solution()
    }

    /// Cards of `category` with no proven holder that are still possible.
    pub fn solution_candidates(&self, category: Category) -> CardSet {
        self.possible(category).difference(self.store().held())
    }

    pub fn could_be_solution(&self, suggestion: &Suggestion) -> bool {
        suggestion
            .members()
            .into_iter()
            .all(|card| self.store().is_candidate(card))
    }

    /// Cards `player` might be holding: everything not proven lacking, minus
    /// the viewer's own hand. For the viewer this is just the hand.
    pub fn possible_holdings(&self, player: PlayerId) -> Result<CardSet, KnowledgeError> {
        let store = self.store();
        store.table().check(player)?;
        if player == store.viewer() {
            return Ok(store.my_cards());
        }
        Ok(CardSet::ALL
            .difference(store.lacks(player))
            .difference(store.my_cards()))
    }

    /// Cards whose holder is not proven yet.
    pub fn unknown_cards(&self) -> CardSet {
        CardSet::ALL.difference(self.store().held())
    }

    pub fn holder_of(&self, card: Card) -> Option<PlayerId> {
        self.store().holder_of(card)
    }

    pub fn my_cards(&self) -> CardSet {
        self.store().my_cards()
    }

    pub fn has(&self, player: PlayerId) -> Result<CardSet, KnowledgeError> {
        let store = self.store();
        store.table().check(player)?;
        Ok(store.has(player))
    }

    pub fn lacks(&self, player: PlayerId) -> Result<CardSet, KnowledgeError> {
        let store = self.store();
        store.table().check(player)?;
        Ok(store.lacks(player))
    }

    pub fn summary(&self) -> KnowledgeSummary {
        KnowledgeSummary {
            suspects: self.possible(Category::Suspect).len(),
            weapons: self.possible(Category::Weapon).len(),
            locations: self.possible(Category::Location).len(),
        }
    }
}

/// Candidate counts per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeSummary {
    pub suspects: usize,
    pub weapons: usize,
    pub locations: usize,
}

impl fmt::Display for KnowledgeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Possible: {} suspects, {} weapons, {} locations",
            self.suspects, self.weapons, self.locations
        )
    }
}

impl fmt::Display for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store();
        writeln!(f, "{} knowledge", store.viewer())?;
        writeln!(f, "  own cards: {}", store.my_cards())?;
        for category in Category::ALL {
            writeln!(f, "  possible {}: {}", category.plural(), store.possible(category))?;
        }
        if let Some(solution) = store.solution() {
            writeln!(f, "  solution: {solution}")?;
        }
        for seat in store.table().seats() {
            if seat != store.viewer() && !store.has(seat).is_empty() {
                writeln!(f, "  {seat} has: {}", store.has(seat))?;
            }
            if !store.lacks(seat).is_empty() {
                writeln!(f, "  {seat} lacks: {}", store.lacks(seat))?;
            }
            for constraint in self.constraints().for_player(seat) {
                writeln!(f, "  {seat} holds one of: {}", constraint.cards())?;
            }
        }
        write!(f, "  {}", self.summary())
    }
}
