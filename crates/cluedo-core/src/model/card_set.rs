use crate::model::card::{CARD_COUNT, Card};
use crate::model::category::Category;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Bit-set of cards keyed by [`Card::to_id`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Card>", into = "Vec<Card>")]
pub struct CardSet(u32);

const FULL_MASK: u32 = (1 << CARD_COUNT) - 1;

impl CardSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(FULL_MASK);

    pub fn of_category(category: Category) -> Self {
        Card::of_category(category).iter().copied().collect()
    }

    pub const fn single(card: Card) -> Self {
        Self(1 << card.to_id())
    }

    pub const fn contains(self, card: Card) -> bool {
        self.0 & (1 << card.to_id()) != 0
    }

    /// Inserts `card`, returning `true` if it was not already present.
    pub fn insert(&mut self, card: Card) -> bool {
        let before = self.0;
        self.0 |= 1 << card.to_id();
        before != self.0
    }

    /// Removes `card`, returning `true` if it was present.
    pub fn remove(&mut self, card: Card) -> bool {
        let before = self.0;
        self.0 &= !(1 << card.to_id());
        before != self.0
    }

    pub const fn with(self, card: Card) -> Self {
        Self(self.0 | (1 << card.to_id()))
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn is_disjoint(self, other: Self) -> bool {
        self.0 & other.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The member of a one-card set.
    pub fn only(self) -> Option<Card> {
        if self.len() == 1 {
            Card::from_id(self.0.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Members in universe order.
    pub fn iter(self) -> impl Iterator<Item = Card> {
        Card::ALL.into_iter().filter(move |card| self.contains(*card))
    }
}

impl FromIterator<Card> for CardSet {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        let mut set = CardSet::EMPTY;
        for card in iter {
            set.insert(card);
        }
        set
    }
}

impl From<Vec<Card>> for CardSet {
    fn from(cards: Vec<Card>) -> Self {
        cards.into_iter().collect()
    }
}

impl From<CardSet> for Vec<Card> {
    fn from(set: CardSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for CardSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, card) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{card}")?;
        }
        f.write_str("}")
    }
}
