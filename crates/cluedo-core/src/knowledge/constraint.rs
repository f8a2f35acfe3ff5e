//! Disjunctive "holds at least one of" facts left behind by hidden refutations.

use super::store::KnowledgeStore;
use crate::error::{InvariantViolation, KnowledgeError};
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::mem;

/// `player` holds at least one card of `cards`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    player: PlayerId,
    cards: CardSet,
}

impl Constraint {
    pub fn new(player: PlayerId, cards: CardSet) -> Self {
        Self { player, cards }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn cards(&self) -> CardSet {
        self.cards
    }

    pub fn is_satisfied(&self, store: &KnowledgeStore) -> bool {
        !store.has(self.player).is_disjoint(self.cards)
    }

    /// Cards the player could still be holding to satisfy this constraint.
    fn open_cards(&self, store: &KnowledgeStore) -> CardSet {
        let held_elsewhere = store.held().difference(store.has(self.player));
        self.cards
            .difference(store.lacks(self.player))
            .difference(held_elsewhere)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn for_player(&self, player: PlayerId) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(move |constraint| constraint.player == player)
    }

    /// Adds `constraint` unless it is already satisfied or already present.
    pub(crate) fn add(&mut self, constraint: Constraint, store: &KnowledgeStore) -> bool {
        if constraint.is_satisfied(store) || self.constraints.contains(&constraint) {
            return false;
        }
        self.constraints.push(constraint);
        true
    }

    /// One resolution sweep over every retained constraint.
    ///
    /// Ownership is declared only when exactly one non-candidate card is left
    /// open. A lone solution candidate never becomes a holding.
    pub(crate) fn resolve(&mut self, store: &mut KnowledgeStore) -> Result<bool, KnowledgeError> {
        let mut changed = false;
        let mut kept: Vec<Constraint> = Vec::with_capacity(self.constraints.len());

        for constraint in mem::take(&mut self.constraints) {
            if constraint.is_satisfied(store) {
                changed = true;
                continue;
            }
            let open = constraint.open_cards(store);
            if open.is_empty() {
                return Err(InvariantViolation::UnsatisfiableConstraint {
                    player: constraint.player,
                    cards: constraint.cards,
                }
                .into());
            }

            let non_candidates: CardSet = open
                .iter()
                .filter(|card: &Card| !store.is_candidate(*card))
                .collect();
            if let Some(card) = non_candidates.only() {
                store.mark_has(constraint.player, card)?;
                changed = true;
                continue;
            }

            let shrunk = Constraint::new(constraint.player, open);
            if shrunk != constraint {
                changed = true;
            }
            if !kept.contains(&shrunk) {
                kept.push(shrunk);
            }
        }

        self.constraints = kept;
        Ok(changed)
    }
}
