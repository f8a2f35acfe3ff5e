//! Ground-truth helpers for driving engines through simulated games.

pub mod deal;
pub mod refutation;
pub mod serialization;

pub use deal::Deal;
pub use refutation::{Resolution, RevealChoice, resolve};
pub use serialization::KnowledgeSnapshot;
