pub mod card;
pub mod card_set;
pub mod category;
pub mod deck;
pub mod player;
