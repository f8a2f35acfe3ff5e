use crate::knowledge::constraint::Constraint;
use crate::knowledge::engine::Knowledge;
use crate::knowledge::record::Solution;
use crate::model::card_set::CardSet;
use crate::model::category::Category;
use crate::model::player::PlayerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatFacts {
    pub player: PlayerId,
    pub has: CardSet,
    pub lacks: CardSet,
}

/// Diagnostic capture of a viewer's knowledge. There is no restore; replay the
/// log through [`Knowledge::rebuild`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeSnapshot {
    pub viewer: PlayerId,
    pub players: usize,
    pub my_cards: CardSet,
    pub possible_suspects: CardSet,
    pub possible_weapons: CardSet,
    pub possible_locations: CardSet,
    pub solution: Option<Solution>,
    pub seats: Vec<SeatFacts>,
    pub constraints: Vec<Constraint>,
    pub events: usize,
}

impl KnowledgeSnapshot {
    pub fn capture(knowledge: &Knowledge) -> Self {
        let store = knowledge.store();
        KnowledgeSnapshot {
            viewer: store.viewer(),
            players: store.table().players(),
            my_cards: store.my_cards(),
            possible_suspects: store.possible(Category::Suspect),
            possible_weapons: store.possible(Category::Weapon),
            possible_locations: store.possible(Category::Location),
            solution: store.solution(),
            seats: store
                .table()
                .seats()
                .map(|player| SeatFacts {
                    player,
                    has: store.has(player),
                    lacks: store.lacks(player),
                })
                .collect(),
            constraints: knowledge.constraints().iter().copied().collect(),
            events: knowledge.log().len(),
        }
    }

    pub fn to_json(knowledge: &Knowledge) -> serde_json::Result<String> {
        let snapshot = Self::capture(knowledge);
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::KnowledgeSnapshot;
    use crate::knowledge::Knowledge;
    use crate::knowledge::record::{Suggestion, SuggestionRecord};
    use crate::model::card::Card;
    use crate::model::player::PlayerId;

    fn p(number: usize) -> PlayerId {
        PlayerId::from_number(number).unwrap()
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut knowledge = Knowledge::new(p(1), 3).unwrap();
        knowledge.deal_initial_hand(&[Card::Study, Card::Rope]).unwrap();
        let json = KnowledgeSnapshot::to_json(&knowledge).unwrap();
        assert!(json.contains("\"viewer\": 0"));
        assert!(json.contains("\"players\": 3"));
        assert!(json.contains("\"solution\": null"));
        assert!(json.contains("\"Rope\""));
    }

    #[test]
    fn snapshot_reads_back_with_constraints() {
        let mut knowledge = Knowledge::new(p(1), 3).unwrap();
        knowledge.deal_initial_hand(&[Card::Study]).unwrap();
        let suggestion = Suggestion::new(Card::MrsWhite, Card::Dagger, Card::Hall).unwrap();
        knowledge
            .report_suggestion(SuggestionRecord::refuted(p(2), suggestion, p(3), vec![]))
            .unwrap();

        let json = KnowledgeSnapshot::to_json(&knowledge).unwrap();
        let snapshot = KnowledgeSnapshot::from_json(&json).unwrap();
        assert_eq!(snapshot, KnowledgeSnapshot::capture(&knowledge));
        assert_eq!(snapshot.constraints.len(), 1);
        assert_eq!(snapshot.constraints[0].player(), p(3));
        assert_eq!(snapshot.events, 1);
    }
}
