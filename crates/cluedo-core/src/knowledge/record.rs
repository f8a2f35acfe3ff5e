//! Suggestion events and the append-only log that stores them.

use crate::error::{EventShapeError, KnowledgeError};
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::category::Category;
use crate::model::player::PlayerId;
use core::fmt;
use serde::{Deserialize, Serialize};

/// A (suspect, weapon, location) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Suggestion {
    suspect: Card,
    weapon: Card,
    location: Card,
}

/// The hidden triple. Same shape as a suggestion.
pub type Solution = Suggestion;

impl Suggestion {
    pub fn new(suspect: Card, weapon: Card, location: Card) -> Result<Self, KnowledgeError> {
        let suggestion = Self {
            suspect,
            weapon,
            location,
        };
        suggestion.validate()?;
        Ok(suggestion)
    }

    /// Re-checks the category of each slot; deserialized values skip `new`.
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        for (card, expected) in self.members().into_iter().zip(Category::ALL) {
            if card.category() != expected {
                return Err(EventShapeError::CategoryMismatch { card, expected }.into());
            }
        }
        Ok(())
    }

    pub const fn suspect(&self) -> Card {
        self.suspect
    }

    pub const fn weapon(&self) -> Card {
        self.weapon
    }

    pub const fn location(&self) -> Card {
        self.location
    }

    /// Card occupying the slot for `category`.
    pub const fn card(&self, category: Category) -> Card {
        match category {
            Category::Suspect => self.suspect,
            Category::Weapon => self.weapon,
            Category::Location => self.location,
        }
    }

    pub const fn members(&self) -> [Card; 3] {
        [self.suspect, self.weapon, self.location]
    }

    pub fn cards(&self) -> CardSet {
        self.members().into_iter().collect()
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.suspect, self.weapon, self.location)
    }
}

/// Which of the four ingestion paths an event takes for a given viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    OwnRefuted,
    OwnUnrefuted,
    OtherRefuted,
    OtherUnrefuted,
}

/// One observed suggestion and how it was resolved, as seen by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub suggester: PlayerId,
    pub suggestion: Suggestion,
    pub refuter: Option<PlayerId>,
    /// Present only when the viewer is entitled to see the shown card.
    pub revealed: Option<Card>,
    /// Players asked before the refuter (or everyone asked) who could not refute.
    pub passers: Vec<PlayerId>,
}

/// What a caller hands to [`Knowledge::report_suggestion`](super::Knowledge::report_suggestion).
pub type SuggestionReport = SuggestionRecord;

impl SuggestionRecord {
    pub fn refuted(
        suggester: PlayerId,
        suggestion: Suggestion,
        refuter: PlayerId,
        passers: Vec<PlayerId>,
    ) -> Self {
        Self {
            suggester,
            suggestion,
            refuter: Some(refuter),
            revealed: None,
            passers,
        }
    }

    pub fn unrefuted(suggester: PlayerId, suggestion: Suggestion, passers: Vec<PlayerId>) -> Self {
        Self {
            suggester,
            suggestion,
            refuter: None,
            revealed: None,
            passers,
        }
    }

    pub fn with_revealed(mut self, card: Card) -> Self {
        self.revealed = Some(card);
        self
    }

    pub fn shape(&self, viewer: PlayerId) -> EventShape {
        match (self.suggester == viewer, self.refuter.is_some()) {
            (true, true) => EventShape::OwnRefuted,
            (true, false) => EventShape::OwnUnrefuted,
            (false, true) => EventShape::OtherRefuted,
            (false, false) => EventShape::OtherUnrefuted,
        }
    }
}

/// Append-only history of every ingested suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    records: Vec<SuggestionRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, record: SuggestionRecord) {
        self.records.push(record);
    }

    /// Drops the newest entry when its event fails to apply.
    pub(crate) fn discard_last(&mut self) {
        self.records.pop();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SuggestionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &SuggestionRecord> {
        self.records.iter()
    }

    /// Entries nobody refuted; the only ones that can prove a solution.
    pub fn unrefuted(&self) -> impl Iterator<Item = &SuggestionRecord> {
        self.records.iter().filter(|record| record.refuter.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(number: usize) -> PlayerId {
        PlayerId::from_number(number).unwrap()
    }

    #[test]
    fn suggestion_rejects_misplaced_categories() {
        assert!(Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).is_ok());
        let err = Suggestion::new(Card::Dagger, Card::MrsWhite, Card::Hall).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::InvalidEventShape(EventShapeError::CategoryMismatch {
                card: Card::Dagger,
                expected: Category::Suspect,
            })
        ));
    }

    #[test]
    fn shape_depends_on_viewer_and_refuter() {
        let suggestion = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        let refuted = SuggestionRecord::refuted(p(1), suggestion, p(2), vec![]);
        let unrefuted = SuggestionRecord::unrefuted(p(1), suggestion, vec![p(2), p(3)]);
        assert_eq!(refuted.shape(p(1)), EventShape::OwnRefuted);
        assert_eq!(refuted.shape(p(3)), EventShape::OtherRefuted);
        assert_eq!(unrefuted.shape(p(1)), EventShape::OwnUnrefuted);
        assert_eq!(unrefuted.shape(p(2)), EventShape::OtherUnrefuted);
    }

    #[test]
    fn log_filters_unrefuted_entries() {
        let suggestion = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        let mut log = EventLog::new();
        log.append(SuggestionRecord::refuted(p(1), suggestion, p(2), vec![]));
        log.append(SuggestionRecord::unrefuted(p(2), suggestion, vec![p(3), p(1)]));
        assert_eq!(log.len(), 2);
        assert_eq!(log.unrefuted().count(), 1);
        log.discard_last();
        assert_eq!(log.unrefuted().count(), 0);
    }
}
