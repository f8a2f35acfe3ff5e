use crate::error::KnowledgeError;
use crate::knowledge::record::{Solution, Suggestion};
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::category::Category;
use crate::model::deck::Deck;
use crate::model::player::{PlayerId, Table};

/// Ground truth of one game: the hidden triple and every player's hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    table: Table,
    solution: Solution,
    hands: Vec<CardSet>,
}

impl Deal {
    /// The first card of each category in deck order becomes the solution;
    /// the rest go round-robin starting with `P1`.
    pub fn from_deck(deck: &Deck, players: usize) -> Result<Self, KnowledgeError> {
        let table = Table::new(players)?;
        let pick = |category: Category| {
            deck.cards()
                .iter()
                .copied()
                .find(|card| card.category() == category)
                .unwrap_or(Card::of_category(category)[0])
        };
        let solution = Suggestion::new(
            pick(Category::Suspect),
            pick(Category::Weapon),
            pick(Category::Location),
        )?;

        let hidden = solution.cards();
        let mut hands = vec![CardSet::EMPTY; table.players()];
        let mut seat = 0;
        for card in deck.cards().iter().copied().filter(|card| !hidden.contains(*card)) {
            hands[seat].insert(card);
            seat = (seat + 1) % table.players();
        }

        Ok(Self {
            table,
            solution,
            hands,
        })
    }

    pub fn with_seed(players: usize, seed: u64) -> Result<Self, KnowledgeError> {
        Self::from_deck(&Deck::shuffled_with_seed(seed), players)
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn solution(&self) -> Solution {
        self.solution
    }

    pub fn hand(&self, player: PlayerId) -> Result<CardSet, KnowledgeError> {
        self.table.check(player)?;
        Ok(self.hands[player.index()])
    }

    /// Hand as a list, ready for [`Knowledge::deal_initial_hand`](crate::Knowledge::deal_initial_hand).
    pub fn hand_cards(&self, player: PlayerId) -> Result<Vec<Card>, KnowledgeError> {
        Ok(self.hand(player)?.iter().collect())
    }

    pub fn holder_of(&self, card: Card) -> Option<PlayerId> {
        self.table
            .seats()
            .find(|seat| self.hands[seat.index()].contains(card))
    }
}
