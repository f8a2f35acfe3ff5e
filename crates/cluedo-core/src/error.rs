//! Error taxonomy for knowledge ingestion.
//!
//! Every error is raised at the point an event is ingested and before any of
//! its facts are committed, so callers can reject the event and carry on with
//! the previous knowledge state.

use crate::knowledge::Suggestion;
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::category::Category;
use crate::model::player::PlayerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KnowledgeError {
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),
    #[error("invalid event: {0}")]
    InvalidEventShape(#[from] EventShapeError),
    #[error("unknown card '{name}'")]
    UnknownCard { name: String },
    #[error("unknown player {player} at a table of {players}")]
    UnknownPlayer { player: PlayerId, players: usize },
    #[error("unsupported player count {players} (expected 2 to 6)")]
    InvalidPlayerCount { players: usize },
    #[error("seat index {index} is outside the largest table")]
    InvalidSeat { index: usize },
}

/// Contradictory facts: the input disagrees with something already proven.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{player} would both hold and lack {card}")]
    HeldAndLacked { player: PlayerId, card: Card },
    #[error("{card} is already held by {holder}, cannot also belong to {claimant}")]
    DuplicateOwner {
        card: Card,
        holder: PlayerId,
        claimant: PlayerId,
    },
    #[error("event contradicts the viewer's own hand at {card}")]
    ViewerHandMismatch { card: Card },
    #[error("eliminating {card} would leave no {category} candidate")]
    EliminatedLastCandidate { card: Card, category: Category },
    #[error("cannot collapse solution to {proposed}: {reason}")]
    ConflictingSolution {
        proposed: Suggestion,
        reason: &'static str,
    },
    #[error("{player} must hold one of {cards} but every option is ruled out")]
    UnsatisfiableConstraint { player: PlayerId, cards: CardSet },
    #[error("{card} has no possible holder yet is not a solution candidate")]
    OrphanedCard { card: Card },
    #[error("{card} has a proven holder but is still a solution candidate")]
    HeldCandidate { card: Card },
}

/// Structural problems with a reported event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventShapeError {
    #[error("initial hand has not been dealt")]
    HandNotDealt,
    #[error("initial hand was already dealt")]
    HandAlreadyDealt,
    #[error("{card} is not a {expected}")]
    CategoryMismatch { card: Card, expected: Category },
    #[error("{player} cannot refute their own suggestion")]
    SelfRefutation { player: PlayerId },
    #[error("revealed card {card} reported without a refuter")]
    RevealedWithoutRefuter { card: Card },
    #[error("revealed card {card} is not part of the suggestion")]
    RevealedNotSuggested { card: Card },
    #[error("own suggestion was refuted but the revealed card is missing")]
    MissingRevealedCard,
    #[error("{player} cannot be listed as a passer: {reason}")]
    InvalidPasser {
        player: PlayerId,
        reason: &'static str,
    },
}
