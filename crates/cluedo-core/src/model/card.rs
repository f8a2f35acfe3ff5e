use crate::error::KnowledgeError;
use crate::model::category::Category;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Number of cards in the universe.
pub const CARD_COUNT: usize = 21;

/// Every identifier in the game. The discriminant doubles as the card id used
/// by [`CardSet`](crate::model::card_set::CardSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Card {
    MissScarlett = 0,
    ColonelMustard = 1,
    MrsWhite = 2,
    ReverendGreen = 3,
    MrsPeacock = 4,
    ProfessorPlum = 5,
    Candlestick = 6,
    Dagger = 7,
    LeadPipe = 8,
    Revolver = 9,
    Rope = 10,
    Wrench = 11,
    Study = 12,
    Hall = 13,
    Lounge = 14,
    Library = 15,
    BilliardRoom = 16,
    DiningRoom = 17,
    Conservatory = 18,
    Ballroom = 19,
    Kitchen = 20,
}

impl Card {
    pub const ALL: [Card; CARD_COUNT] = [
        Card::MissScarlett,
        Card::ColonelMustard,
        Card::MrsWhite,
        Card::ReverendGreen,
        Card::MrsPeacock,
        Card::ProfessorPlum,
        Card::Candlestick,
        Card::Dagger,
        Card::LeadPipe,
        Card::Revolver,
        Card::Rope,
        Card::Wrench,
        Card::Study,
        Card::Hall,
        Card::Lounge,
        Card::Library,
        Card::BilliardRoom,
        Card::DiningRoom,
        Card::Conservatory,
        Card::Ballroom,
        Card::Kitchen,
    ];

    pub const SUSPECTS: [Card; 6] = [
        Card::MissScarlett,
        Card::ColonelMustard,
        Card::MrsWhite,
        Card::ReverendGreen,
        Card::MrsPeacock,
        Card::ProfessorPlum,
    ];

    pub const WEAPONS: [Card; 6] = [
        Card::Candlestick,
        Card::Dagger,
        Card::LeadPipe,
        Card::Revolver,
        Card::Rope,
        Card::Wrench,
    ];

    pub const LOCATIONS: [Card; 9] = [
        Card::Study,
        Card::Hall,
        Card::Lounge,
        Card::Library,
        Card::BilliardRoom,
        Card::DiningRoom,
        Card::Conservatory,
        Card::Ballroom,
        Card::Kitchen,
    ];

    pub const fn category(self) -> Category {
        match self as u8 {
            0..=5 => Category::Suspect,
            6..=11 => Category::Weapon,
            _ => Category::Location,
        }
    }

    pub const fn to_id(self) -> u8 {
        self as u8
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        if (id as usize) < CARD_COUNT {
            Some(Self::ALL[id as usize])
        } else {
            None
        }
    }

    /// All cards of `category`, in universe order.
    pub const fn of_category(category: Category) -> &'static [Card] {
        match category {
            Category::Suspect => &Self::SUSPECTS,
            Category::Weapon => &Self::WEAPONS,
            Category::Location => &Self::LOCATIONS,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Card::MissScarlett => "Miss Scarlett",
            Card::ColonelMustard => "Colonel Mustard",
            Card::MrsWhite => "Mrs. White",
            Card::ReverendGreen => "Reverend Green",
            Card::MrsPeacock => "Mrs. Peacock",
            Card::ProfessorPlum => "Professor Plum",
            Card::Candlestick => "Candlestick",
            Card::Dagger => "Dagger",
            Card::LeadPipe => "Lead Pipe",
            Card::Revolver => "Revolver",
            Card::Rope => "Rope",
            Card::Wrench => "Wrench",
            Card::Study => "Study",
            Card::Hall => "Hall",
            Card::Lounge => "Lounge",
            Card::Library => "Library",
            Card::BilliardRoom => "Billiard Room",
            Card::DiningRoom => "Dining Room",
            Card::Conservatory => "Conservatory",
            Card::Ballroom => "Ballroom",
            Card::Kitchen => "Kitchen",
        }
    }

    /// Compact label; suspects drop their title.
    pub const fn short_name(self) -> &'static str {
        match self {
            Card::MissScarlett => "Scarlett",
            Card::ColonelMustard => "Mustard",
            Card::MrsWhite => "White",
            Card::ReverendGreen => "Green",
            Card::MrsPeacock => "Peacock",
            Card::ProfessorPlum => "Plum",
            Card::BilliardRoom => "Billiard",
            Card::DiningRoom => "Dining",
            other => other.name(),
        }
    }
}

fn normalise(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for Card {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalise(s);
        if wanted.is_empty() {
            return Err(KnowledgeError::UnknownCard {
                name: s.to_string(),
            });
        }
        Card::ALL
            .iter()
            .copied()
            .find(|card| normalise(card.name()) == wanted || normalise(card.short_name()) == wanted)
            .ok_or_else(|| KnowledgeError::UnknownCard {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::{CARD_COUNT, Card};
    use crate::error::KnowledgeError;
    use crate::model::category::Category;

    #[test]
    fn categories_partition_the_universe() {
        let total: usize = Category::ALL
            .iter()
            .map(|category| Card::of_category(*category).len())
            .sum();
        assert_eq!(total, CARD_COUNT);
        for category in Category::ALL {
            for card in Card::of_category(category) {
                assert_eq!(card.category(), category);
            }
        }
    }

    #[test]
    fn id_roundtrip() {
        for (index, card) in Card::ALL.iter().enumerate() {
            assert_eq!(card.to_id() as usize, index);
            assert_eq!(Card::from_id(index as u8), Some(*card));
        }
        assert_eq!(Card::from_id(CARD_COUNT as u8), None);
    }

    #[test]
    fn parses_full_and_short_names() {
        assert_eq!("Miss Scarlett".parse::<Card>().unwrap(), Card::MissScarlett);
        assert_eq!("mustard".parse::<Card>().unwrap(), Card::ColonelMustard);
        assert_eq!("Mrs. White".parse::<Card>().unwrap(), Card::MrsWhite);
        assert_eq!("lead pipe".parse::<Card>().unwrap(), Card::LeadPipe);
        assert_eq!("Billiard".parse::<Card>().unwrap(), Card::BilliardRoom);
        assert_eq!("DINING ROOM".parse::<Card>().unwrap(), Card::DiningRoom);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "Mr. Boddy".parse::<Card>().unwrap_err();
        assert!(matches!(err, KnowledgeError::UnknownCard { name } if name == "Mr. Boddy"));
        assert!("".parse::<Card>().is_err());
    }
}
