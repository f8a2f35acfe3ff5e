//! Hard-fact knowledge of a single observing player.
//!
//! The [`Knowledge`] type owns the fact store, the disjunctive constraints left
//! by hidden refutations and the append-only event log. Every reported event is
//! followed by a fixed-point sweep of the inference rules in [`engine`].

pub mod constraint;
pub mod engine;
pub mod query;
pub mod record;
pub mod store;
pub mod telemetry;

pub use constraint::{Constraint, ConstraintSet};
pub use engine::{FixedPointReport, Knowledge, MAX_PASSES, Rule, RuleFirings};
pub use query::KnowledgeSummary;
pub use record::{EventLog, EventShape, Solution, Suggestion, SuggestionRecord, SuggestionReport};
pub use store::KnowledgeStore;
pub use telemetry::KnowledgeMetrics;
