//! Certain ownership facts and solution candidates for one observing player.

use super::record::{Solution, Suggestion};
use crate::error::{InvariantViolation, KnowledgeError};
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::category::Category;
use crate::model::player::{MAX_PLAYERS, PlayerId, Table};
use std::array;

/// Per-player has/lacks facts plus the cards still possible as the solution.
///
/// Every mutator returns `Ok(true)` when it changed something and `Ok(false)`
/// when the fact was already known, so repeated calls are harmless. Facts that
/// contradict what is already proven are rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeStore {
    viewer: PlayerId,
    table: Table,
    my_cards: CardSet,
    has: [CardSet; MAX_PLAYERS],
    lacks: [CardSet; MAX_PLAYERS],
    possible: [CardSet; 3],
}

impl KnowledgeStore {
    pub fn new(viewer: PlayerId, table: Table) -> Result<Self, KnowledgeError> {
        table.check(viewer)?;
        Ok(Self {
            viewer,
            table,
            my_cards: CardSet::EMPTY,
            has: [CardSet::EMPTY; MAX_PLAYERS],
            lacks: [CardSet::EMPTY; MAX_PLAYERS],
            possible: array::from_fn(|index| {
                Category::from_index(index)
                    .map(CardSet::of_category)
                    .unwrap_or(CardSet::EMPTY)
            }),
        })
    }

    pub fn viewer(&self) -> PlayerId {
        self.viewer
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn my_cards(&self) -> CardSet {
        self.my_cards
    }

    pub fn has(&self, player: PlayerId) -> CardSet {
        self.has[player.index()]
    }

    pub fn lacks(&self, player: PlayerId) -> CardSet {
        self.lacks[player.index()]
    }

    pub fn possible(&self, category: Category) -> CardSet {
        self.possible[category.index()]
    }

    /// Union of the three per-category candidate sets.
    pub fn candidates(&self) -> CardSet {
        self.possible
            .iter()
            .fold(CardSet::EMPTY, |acc, set| acc.union(*set))
    }

    pub fn is_candidate(&self, card: Card) -> bool {
        self.possible(card.category()).contains(card)
    }

    /// Every card with a proven holder.
    pub fn held(&self) -> CardSet {
        self.table
            .seats()
            .fold(CardSet::EMPTY, |acc, seat| acc.union(self.has(seat)))
    }

    pub fn holder_of(&self, card: Card) -> Option<PlayerId> {
        self.table.seats().find(|seat| self.has(*seat).contains(card))
    }

    pub fn add_own_card(&mut self, card: Card) -> Result<bool, KnowledgeError> {
        let viewer = self.viewer;
        if self.my_cards.contains(card) {
            return Ok(false);
        }
        self.ensure_unowned_by_others(viewer, card)?;
        if self.lacks(viewer).contains(card) {
            return Err(InvariantViolation::HeldAndLacked {
                player: viewer,
                card,
            }
            .into());
        }
        self.eliminate_from_solution(card)?;
        self.my_cards.insert(card);
        self.has[viewer.index()].insert(card);
        Ok(true)
    }

    pub fn mark_has(&mut self, player: PlayerId, card: Card) -> Result<bool, KnowledgeError> {
        self.table.check(player)?;
        if self.has(player).contains(card) {
            return Ok(false);
        }
        if player == self.viewer {
            return Err(InvariantViolation::ViewerHandMismatch { card }.into());
        }
        if self.lacks(player).contains(card) {
            return Err(InvariantViolation::HeldAndLacked { player, card }.into());
        }
        self.ensure_unowned_by_others(player, card)?;
        self.eliminate_from_solution(card)?;
        self.has[player.index()].insert(card);
        self.lacks[player.index()].remove(card);
        Ok(true)
    }

    pub fn mark_lacks(&mut self, player: PlayerId, card: Card) -> Result<bool, KnowledgeError> {
        self.table.check(player)?;
        if self.has(player).contains(card) {
            return Err(InvariantViolation::HeldAndLacked { player, card }.into());
        }
        Ok(self.lacks[player.index()].insert(card))
    }

    pub fn mark_lacks_all(
        &mut self,
        player: PlayerId,
        cards: CardSet,
    ) -> Result<bool, KnowledgeError> {
        let mut changed = false;
        for card in cards.iter() {
            changed |= self.mark_lacks(player, card)?;
        }
        Ok(changed)
    }

    /// Removes `card` from its category's candidates. Refuses to empty a category.
    pub(crate) fn eliminate_from_solution(&mut self, card: Card) -> Result<bool, KnowledgeError> {
        let category = card.category();
        let slot = &mut self.possible[category.index()];
        if !slot.contains(card) {
            return Ok(false);
        }
        if slot.len() == 1 {
            return Err(InvariantViolation::EliminatedLastCandidate { card, category }.into());
        }
        Ok(slot.remove(card))
    }

    /// Forces every category down to the member of `solution`.
    pub fn collapse_to(&mut self, solution: Solution) -> Result<bool, KnowledgeError> {
        if let Some(existing) = self.solution() {
            if existing == solution {
                return Ok(false);
            }
            return Err(InvariantViolation::ConflictingSolution {
                proposed: solution,
                reason: "a different solution is already certain",
            }
            .into());
        }
        for card in solution.members() {
            if self.holder_of(card).is_some() {
                return Err(InvariantViolation::ConflictingSolution {
                    proposed: solution,
                    reason: "one of its cards has a proven holder",
                }
                .into());
            }
            if !self.is_candidate(card) {
                return Err(InvariantViolation::ConflictingSolution {
                    proposed: solution,
                    reason: "one of its cards was already eliminated",
                }
                .into());
            }
        }

        let mut changed = false;
        for category in Category::ALL {
            let keep = solution.card(category);
            for card in self.possible(category).iter() {
                if card != keep {
                    changed |= self.eliminate_from_solution(card)?;
                }
            }
        }
        Ok(changed)
    }

    pub fn is_solution_certain(&self) -> bool {
        self.possible.iter().all(|set| set.len() == 1)
    }

    pub fn solution(&self) -> Option<Solution> {
        let suspect = self.possible(Category::Suspect).only()?;
        let weapon = self.possible(Category::Weapon).only()?;
        let location = self.possible(Category::Location).only()?;
        Suggestion::new(suspect, weapon, location).ok()
    }

    /// Verifies the store-level invariants; used by tests and debug assertions.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = CardSet::EMPTY;
        for seat in self.table.seats() {
            let has = self.has(seat);
            if let Some(card) = has.intersection(self.lacks(seat)).iter().next() {
                return Err(InvariantViolation::HeldAndLacked { player: seat, card });
            }
            if let Some(card) = has.intersection(seen).iter().next() {
                let holder = self
                    .table
                    .seats()
                    .find(|other| *other != seat && self.has(*other).contains(card))
                    .unwrap_or(seat);
                return Err(InvariantViolation::DuplicateOwner {
                    card,
                    holder,
                    claimant: seat,
                });
            }
            seen = seen.union(has);
        }
        if let Some(card) = seen.intersection(self.candidates()).iter().next() {
            return Err(InvariantViolation::HeldCandidate { card });
        }
        for category in Category::ALL {
            if self.possible(category).is_empty() {
                let card = Card::of_category(category)[0];
                return Err(InvariantViolation::EliminatedLastCandidate { card, category });
            }
        }
        Ok(())
    }

    fn ensure_unowned_by_others(&self, claimant: PlayerId, card: Card) -> Result<(), KnowledgeError> {
        match self.holder_of(card) {
            Some(holder) if holder != claimant => Err(InvariantViolation::DuplicateOwner {
                card,
                holder,
                claimant,
            }
            .into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(number: usize) -> PlayerId {
        PlayerId::from_number(number).unwrap()
    }

    fn store() -> KnowledgeStore {
        KnowledgeStore::new(p(1), Table::new(3).unwrap()).unwrap()
    }

    #[test]
    fn starts_with_full_categories() {
        let store = store();
        assert_eq!(store.possible(Category::Suspect).len(), 6);
        assert_eq!(store.possible(Category::Weapon).len(), 6);
        assert_eq!(store.possible(Category::Location).len(), 9);
        assert!(!store.is_solution_certain());
        assert_eq!(store.solution(), None);
    }

    #[test]
    fn rejects_viewer_outside_table() {
        let err = KnowledgeStore::new(p(4), Table::new(3).unwrap()).unwrap_err();
        assert!(matches!(err, KnowledgeError::UnknownPlayer { .. }));
    }

    #[test]
    fn own_card_is_never_a_candidate() {
        let mut store = store();
        assert!(store.add_own_card(Card::MissScarlett).unwrap());
        assert!(!store.add_own_card(Card::MissScarlett).unwrap());
        assert!(store.my_cards().contains(Card::MissScarlett));
        assert!(store.has(p(1)).contains(Card::MissScarlett));
        assert!(!store.is_candidate(Card::MissScarlett));
    }

    #[test]
    fn mark_has_is_idempotent_and_eliminates_candidate() {
        let mut store = store();
        assert!(store.mark_has(p(2), Card::Rope).unwrap());
        let snapshot = store.clone();
        assert!(!store.mark_has(p(2), Card::Rope).unwrap());
        assert_eq!(store, snapshot);
        assert!(!store.is_candidate(Card::Rope));
        assert_eq!(store.holder_of(Card::Rope), Some(p(2)));
    }

    #[test]
    fn mark_lacks_is_idempotent() {
        let mut store = store();
        assert!(store.mark_lacks(p(3), Card::Hall).unwrap());
        let snapshot = store.clone();
        assert!(!store.mark_lacks(p(3), Card::Hall).unwrap());
        assert_eq!(store, snapshot);
        assert!(store.is_candidate(Card::Hall));
    }

    #[test]
    fn contradictory_facts_are_rejected_without_mutation() {
        let mut store = store();
        store.mark_has(p(2), Card::Rope).unwrap();
        store.mark_lacks(p(3), Card::Hall).unwrap();
        let snapshot = store.clone();

        assert!(matches!(
            store.mark_lacks(p(2), Card::Rope),
            Err(KnowledgeError::InvariantViolation(InvariantViolation::HeldAndLacked { .. }))
        ));
        assert!(matches!(
            store.mark_has(p(3), Card::Hall),
            Err(KnowledgeError::InvariantViolation(InvariantViolation::HeldAndLacked { .. }))
        ));
        assert!(matches!(
            store.mark_has(p(3), Card::Rope),
            Err(KnowledgeError::InvariantViolation(InvariantViolation::DuplicateOwner { .. }))
        ));
        assert!(matches!(
            store.mark_has(p(1), Card::Dagger),
            Err(KnowledgeError::InvariantViolation(InvariantViolation::ViewerHandMismatch { .. }))
        ));
        assert_eq!(store, snapshot);
    }

    #[test]
    fn collapse_sets_singletons_and_is_idempotent() {
        let mut store = store();
        let solution = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        assert!(store.collapse_to(solution).unwrap());
        assert!(store.is_solution_certain());
        assert_eq!(store.solution(), Some(solution));
        assert!(!store.collapse_to(solution).unwrap());
        store.check_invariants().unwrap();
    }

    #[test]
    fn collapse_to_a_different_solution_is_rejected() {
        let mut store = store();
        let solution = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        store.collapse_to(solution).unwrap();
        let other = Suggestion::new(Card::ProfessorPlum, Card::Dagger, Card::Hall).unwrap();
        assert!(matches!(
            store.collapse_to(other),
            Err(KnowledgeError::InvariantViolation(
                InvariantViolation::ConflictingSolution { .. }
            ))
        ));
        assert_eq!(store.solution(), Some(solution));
    }

    #[test]
    fn collapse_onto_held_card_is_rejected() {
        let mut store = store();
        store.mark_has(p(2), Card::Dagger).unwrap();
        let solution = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        assert!(store.collapse_to(solution).is_err());
        assert!(!store.is_solution_certain());
    }

    #[test]
    fn holding_the_last_candidate_is_rejected() {
        let mut store = store();
        let solution = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        store.collapse_to(solution).unwrap();
        assert!(matches!(
            store.mark_has(p(2), Card::Hall),
            Err(KnowledgeError::InvariantViolation(
                InvariantViolation::EliminatedLastCandidate { .. }
            ))
        ));
        assert!(store.has(p(2)).is_empty());
    }

    #[test]
    fn check_invariants_flags_a_held_candidate() {
        let mut store = store();
        store.check_invariants().unwrap();
        // Bypass mark_has so the candidate set is left untouched.
        store.has[p(2).index()].insert(Card::Rope);
        assert!(store.is_candidate(Card::Rope));
        assert_eq!(
            store.check_invariants(),
            Err(InvariantViolation::HeldCandidate { card: Card::Rope })
        );
    }
}
