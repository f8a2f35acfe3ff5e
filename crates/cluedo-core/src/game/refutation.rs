use super::deal::Deal;
use crate::error::{EventShapeError, KnowledgeError};
use crate::knowledge::record::{Suggestion, SuggestionRecord};
use crate::model::card::Card;
use crate::model::player::PlayerId;
use rand::Rng;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};

/// Which matching card a refuter shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealChoice {
    /// Lowest card in universe order.
    #[default]
    First,
    Random,
}

/// Full outcome of a suggestion, including the card only the suggester sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub suggester: PlayerId,
    pub suggestion: Suggestion,
    pub refuter: Option<PlayerId>,
    pub shown: Option<Card>,
    pub passers: Vec<PlayerId>,
}

impl Resolution {
    /// The report `viewer` is entitled to.
    pub fn report_for(&self, viewer: PlayerId) -> SuggestionRecord {
        let record = match self.refuter {
            Some(refuter) => SuggestionRecord::refuted(
                self.suggester,
                self.suggestion,
                refuter,
                self.passers.clone(),
            ),
            None => SuggestionRecord::unrefuted(self.suggester, self.suggestion, self.passers.clone()),
        };
        match self.shown {
            Some(card) if viewer == self.suggester => record.with_revealed(card),
            _ => record,
        }
    }
}

/// Asks players clockwise from the suggester's left; the first one holding any
/// of the three cards refutes.
pub fn resolve<R: Rng + ?Sized>(
    deal: &Deal,
    suggester: PlayerId,
    suggestion: Suggestion,
    choice: RevealChoice,
    rng: &mut R,
) -> Result<Resolution, KnowledgeError> {
    let table = deal.table();
    table.check(suggester)?;
    suggestion.validate()?;

    let mut passers = Vec::new();
    for seat in table.clockwise_from(suggester) {
        let matching = deal.hand(seat)?.intersection(suggestion.cards());
        if matching.is_empty() {
            passers.push(seat);
            continue;
        }
        let shown = match choice {
            RevealChoice::First => matching.iter().next(),
            RevealChoice::Random => matching.iter().choose(rng),
        }
        .ok_or(EventShapeError::MissingRevealedCard)?;
        return Ok(Resolution {
            suggester,
            suggestion,
            refuter: Some(seat),
            shown: Some(shown),
            passers,
        });
    }

    Ok(Resolution {
        suggester,
        suggestion,
        refuter: None,
        shown: None,
        passers,
    })
}
