use crate::error::KnowledgeError;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::iter;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

/// Seat at the table, zero-based internally and shown one-based (`P1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlayerId(u8);

impl PlayerId {
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < MAX_PLAYERS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Parses the one-based seat number players see at the table.
    pub const fn from_number(number: usize) -> Option<Self> {
        if number == 0 {
            None
        } else {
            Self::from_index(number - 1)
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn number(self) -> usize {
        self.0 as usize + 1
    }
}

impl TryFrom<u8> for PlayerId {
    type Error = KnowledgeError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        PlayerId::from_index(index as usize).ok_or(KnowledgeError::InvalidSeat {
            index: index as usize,
        })
    }
}

impl From<PlayerId> for u8 {
    fn from(player: PlayerId) -> Self {
        player.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.number())
    }
}

/// Player count of a table, validated to the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Table {
    players: u8,
}

impl Table {
    pub fn new(players: usize) -> Result<Self, KnowledgeError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
            return Err(KnowledgeError::InvalidPlayerCount { players });
        }
        Ok(Self {
            players: players as u8,
        })
    }

    pub const fn players(self) -> usize {
        self.players as usize
    }

    pub fn seats(self) -> impl Iterator<Item = PlayerId> {
        (0..self.players()).filter_map(PlayerId::from_index)
    }

    pub fn contains(self, player: PlayerId) -> bool {
        player.index() < self.players()
    }

    pub fn check(self, player: PlayerId) -> Result<PlayerId, KnowledgeError> {
        if self.contains(player) {
            Ok(player)
        } else {
            Err(KnowledgeError::UnknownPlayer {
                player,
                players: self.players(),
            })
        }
    }

    /// Seat to the left of `player`, wrapping at the end of the table.
    pub const fn left_of(self, player: PlayerId) -> PlayerId {
        PlayerId(((player.0 as usize + 1) % self.players()) as u8)
    }

    /// Players asked to refute a suggestion by `suggester`, in clockwise order.
    pub fn clockwise_from(self, suggester: PlayerId) -> impl Iterator<Item = PlayerId> {
        iter::successors(Some(self.left_of(suggester)), move |&seat| Some(self.left_of(seat)))
            .take(self.players() - 1)
    }
}

impl TryFrom<usize> for Table {
    type Error = KnowledgeError;

    fn try_from(players: usize) -> Result<Self, Self::Error> {
        Table::new(players)
    }
}

impl From<Table> for usize {
    fn from(table: Table) -> Self {
        table.players()
    }
}

#[cfg(test)]
mod tests {
    use super::{PlayerId, Table};
    use crate::error::KnowledgeError;

    fn p(number: usize) -> PlayerId {
        PlayerId::from_number(number).unwrap()
    }

    #[test]
    fn display_is_one_based() {
        assert_eq!(p(1).to_string(), "P1");
        assert_eq!(PlayerId::from_index(5).unwrap().to_string(), "P6");
        assert_eq!(PlayerId::from_number(0), None);
        assert_eq!(PlayerId::from_index(6), None);
    }

    #[test]
    fn left_of_wraps_around_table() {
        let table = Table::new(3).unwrap();
        assert_eq!(table.left_of(p(3)), p(1));
        assert_eq!(table.left_of(p(1)), p(2));
        assert_eq!(Table::new(6).unwrap().left_of(p(6)), p(1));
    }

    #[test]
    fn seat_deserialization_is_bounded() {
        let seat: PlayerId = serde_json::from_str("0").unwrap();
        assert_eq!(seat, p(1));
        assert_eq!(serde_json::to_string(&p(6)).unwrap(), "5");

        let err = serde_json::from_str::<PlayerId>("6").unwrap_err();
        assert!(err.to_string().contains("seat index 6"));
        assert!(serde_json::from_str::<PlayerId>("255").is_err());
    }

    #[test]
    fn clockwise_order_skips_suggester() {
        let table = Table::new(4).unwrap();
        let order: Vec<_> = table.clockwise_from(p(3)).collect();
        assert_eq!(order, vec![p(4), p(1), p(2)]);
    }

    #[test]
    fn rejects_unsupported_player_counts() {
        assert!(matches!(
            Table::new(1),
            Err(KnowledgeError::InvalidPlayerCount { players: 1 })
        ));
        assert!(Table::new(7).is_err());
        assert!(Table::new(6).is_ok());
    }

    #[test]
    fn check_rejects_seats_outside_table() {
        let table = Table::new(3).unwrap();
        assert!(table.check(p(3)).is_ok());
        assert!(matches!(
            table.check(p(4)),
            Err(KnowledgeError::UnknownPlayer { players: 3, .. })
        ));
    }
}
