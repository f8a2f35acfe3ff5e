//! Event ingestion and the fixed-point deduction driver.

use super::constraint::{Constraint, ConstraintSet};
use super::record::{EventLog, EventShape, SuggestionRecord};
use super::store::KnowledgeStore;
use crate::error::{EventShapeError, InvariantViolation, KnowledgeError};
use crate::model::card::Card;
use crate::model::card_set::CardSet;
use crate::model::player::{PlayerId, Table};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

/// Upper bound on rule sweeps per ingested event.
pub const MAX_PASSES: usize = 20;

const TARGET: &str = "cluedo_core::deduction";

/// Inference rules, in the order every pass applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    UnrefutedReplay,
    ConstraintResolution,
    UniqueHolder,
}

impl Rule {
    pub const ALL: [Rule; 3] = [
        Rule::UnrefutedReplay,
        Rule::ConstraintResolution,
        Rule::UniqueHolder,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Rule::UnrefutedReplay => "unrefuted_replay",
            Rule::ConstraintResolution => "constraint_resolution",
            Rule::UniqueHolder => "unique_holder",
        }
    }
}

/// How many passes each rule changed something in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFirings {
    pub unrefuted_replay: usize,
    pub constraint_resolution: usize,
    pub unique_holder: usize,
}

impl RuleFirings {
    fn record(&mut self, rule: Rule) {
        match rule {
            Rule::UnrefutedReplay => self.unrefuted_replay += 1,
            Rule::ConstraintResolution => self.constraint_resolution += 1,
            Rule::UniqueHolder => self.unique_holder += 1,
        }
    }

    pub fn get(&self, rule: Rule) -> usize {
        match rule {
            Rule::UnrefutedReplay => self.unrefuted_replay,
            Rule::ConstraintResolution => self.constraint_resolution,
            Rule::UniqueHolder => self.unique_holder,
        }
    }

    pub fn total(&self) -> usize {
        self.unrefuted_replay + self.constraint_resolution + self.unique_holder
    }
}

/// Outcome of one run of the fixed-point driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPointReport {
    pub passes: usize,
    /// `false` when the pass cap was reached while rules were still firing.
    pub converged: bool,
    pub rule_firings: RuleFirings,
}

/// Complete knowledge of one observing player.
#[derive(Debug, Clone)]
pub struct Knowledge {
    store: KnowledgeStore,
    constraints: ConstraintSet,
    log: EventLog,
    dealt: bool,
}

impl Knowledge {
    pub fn new(viewer: PlayerId, players: usize) -> Result<Self, KnowledgeError> {
        let table = Table::new(players)?;
        Ok(Self {
            store: KnowledgeStore::new(viewer, table)?,
            constraints: ConstraintSet::new(),
            log: EventLog::new(),
            dealt: false,
        })
    }

    /// Replays a recorded game from scratch.
    pub fn rebuild<I>(
        viewer: PlayerId,
        players: usize,
        hand: &[Card],
        records: I,
    ) -> Result<Self, KnowledgeError>
    where
        I: IntoIterator<Item = SuggestionRecord>,
    {
        let mut knowledge = Self::new(viewer, players)?;
        knowledge.deal_initial_hand(hand)?;
        for record in records {
            knowledge.report_suggestion(record)?;
        }
        Ok(knowledge)
    }

    pub fn viewer(&self) -> PlayerId {
        self.store.viewer()
    }

    pub fn table(&self) -> Table {
        self.store.table()
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn is_dealt(&self) -> bool {
        self.dealt
    }

    /// Records the viewer's hand. Accepted exactly once, before any suggestion.
    pub fn deal_initial_hand(&mut self, cards: &[Card]) -> Result<FixedPointReport, KnowledgeError> {
        if self.dealt {
            return Err(EventShapeError::HandAlreadyDealt.into());
        }
        let mut store = self.store.clone();
        let mut constraints = self.constraints.clone();
        for card in cards {
            store.add_own_card(*card)?;
        }
        let report = run_to_fixed_point(&mut store, &mut constraints, &self.log)?;
        self.store = store;
        self.constraints = constraints;
        self.dealt = true;
        event!(
            target: TARGET,
            Level::DEBUG,
            viewer = %self.viewer(),
            hand_size = self.store.my_cards().len(),
            "initial hand recorded"
        );
        Ok(report)
    }

    /// Ingests one suggestion outcome and re-derives everything it implies.
    ///
    /// Either the whole event is applied or none of it is: on error the log
    /// and every fact are left exactly as they were.
    pub fn report_suggestion(
        &mut self,
        record: SuggestionRecord,
    ) -> Result<FixedPointReport, KnowledgeError> {
        self.validate(&record)?;

        let mut store = self.store.clone();
        let mut constraints = self.constraints.clone();
        self.log.append(record.clone());

        let outcome = apply_record(&mut store, &mut constraints, &record)
            .and_then(|()| run_to_fixed_point(&mut store, &mut constraints, &self.log));

        match outcome {
            Ok(report) => {
                debug_assert!(store.check_invariants().is_ok());
                self.store = store;
                self.constraints = constraints;
                event!(
                    target: TARGET,
                    Level::DEBUG,
                    viewer = %self.viewer(),
                    suggester = %record.suggester,
                    suggestion = %record.suggestion,
                    shape = ?record.shape(self.viewer()),
                    passes = report.passes,
                    converged = report.converged,
                    certain = self.store.is_solution_certain(),
                    "suggestion ingested"
                );
                Ok(report)
            }
            Err(err) => {
                self.log.discard_last();
                event!(
                    target: TARGET,
                    Level::WARN,
                    viewer = %self.viewer(),
                    suggester = %record.suggester,
                    suggestion = %record.suggestion,
                    error = %err,
                    "suggestion rejected"
                );
                Err(err)
            }
        }
    }

    fn validate(&self, record: &SuggestionRecord) -> Result<(), KnowledgeError> {
        if !self.dealt {
            return Err(EventShapeError::HandNotDealt.into());
        }
        let table = self.table();
        record.suggestion.validate()?;
        table.check(record.suggester)?;
        if let Some(refuter) = record.refuter {
            table.check(refuter)?;
            if refuter == record.suggester {
                return Err(EventShapeError::SelfRefutation { player: refuter }.into());
            }
        }
        let mut listed = Vec::with_capacity(record.passers.len());
        for passer in &record.passers {
            let player = table.check(*passer)?;
            let reason = if player == record.suggester {
                Some("they made the suggestion")
            } else if Some(player) == record.refuter {
                Some("they refuted it")
            } else if listed.contains(&player) {
                Some("listed twice")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(EventShapeError::InvalidPasser { player, reason }.into());
            }
            listed.push(player);
        }

        if let Some(card) = record.revealed {
            if record.refuter.is_none() {
                return Err(EventShapeError::RevealedWithoutRefuter { card }.into());
            }
            if !record.suggestion.cards().contains(card) {
                return Err(EventShapeError::RevealedNotSuggested { card }.into());
            }
        }
        if record.shape(self.viewer()) == EventShape::OwnRefuted && record.revealed.is_none() {
            return Err(EventShapeError::MissingRevealedCard.into());
        }
        Ok(())
    }
}

/// Direct facts of one event, before any inference.
fn apply_record(
    store: &mut KnowledgeStore,
    constraints: &mut ConstraintSet,
    record: &SuggestionRecord,
) -> Result<(), KnowledgeError> {
    let viewer = store.viewer();
    let cards = record.suggestion.cards();

    for passer in &record.passers {
        if *passer == viewer {
            if let Some(card) = store.my_cards().intersection(cards).iter().next() {
                return Err(InvariantViolation::ViewerHandMismatch { card }.into());
            }
            continue;
        }
        store.mark_lacks_all(*passer, cards)?;
    }

    match (record.refuter, record.revealed) {
        (Some(refuter), revealed) if refuter == viewer => {
            let mine = store.my_cards().intersection(cards);
            if mine.is_empty() {
                return Err(InvariantViolation::ViewerHandMismatch {
                    card: record.suggestion.suspect(),
                }
                .into());
            }
            if let Some(card) = revealed.filter(|card| !mine.contains(*card)) {
                return Err(InvariantViolation::ViewerHandMismatch { card }.into());
            }
        }
        (Some(refuter), Some(card)) => {
            store.mark_has(refuter, card)?;
        }
        (Some(refuter), None) => {
            constraints.add(Constraint::new(refuter, cards), store);
        }
        (None, _) => {
            replay_unrefuted(store, record)?;
        }
    }
    Ok(())
}

/// Collapses onto an unrefuted suggestion once nobody can be holding its cards.
fn replay_unrefuted(store: &mut KnowledgeStore, record: &SuggestionRecord) -> Result<bool, KnowledgeError> {
    let cards = record.suggestion.cards();
    if !store.my_cards().is_disjoint(cards) {
        return Ok(false);
    }
    let suggester = record.suggester;
    let suggester_clear = suggester == store.viewer()
        || (cards.is_subset(store.lacks(suggester)) && store.has(suggester).is_disjoint(cards));
    if !suggester_clear {
        return Ok(false);
    }
    store.collapse_to(record.suggestion)
}

fn replay_log(store: &mut KnowledgeStore, log: &EventLog) -> Result<bool, KnowledgeError> {
    let mut changed = false;
    for record in log.unrefuted() {
        changed |= replay_unrefuted(store, record)?;
    }
    Ok(changed)
}

/// Declares the holder of a card when only one other player can still have it.
fn unique_holder(store: &mut KnowledgeStore) -> Result<bool, KnowledgeError> {
    let viewer = store.viewer();
    let table = store.table();
    let mut changed = false;

    for card in CardSet::ALL.difference(store.held()).iter() {
        let mut holders = table
            .seats()
            .filter(|seat| *seat != viewer && !store.lacks(*seat).contains(card));
        let first = holders.next();
        let more = holders.next().is_some();
        if store.is_candidate(card) {
            continue;
        }
        match (first, more) {
            (Some(holder), false) => changed |= store.mark_has(holder, card)?,
            (None, _) => return Err(InvariantViolation::OrphanedCard { card }.into()),
            _ => {}
        }
    }
    Ok(changed)
}

/// Applies every rule in order until a pass changes nothing or the cap is hit.
pub(crate) fn run_to_fixed_point(
    store: &mut KnowledgeStore,
    constraints: &mut ConstraintSet,
    log: &EventLog,
) -> Result<FixedPointReport, KnowledgeError> {
    run_with_cap(store, constraints, log, MAX_PASSES)
}

fn run_with_cap(
    store: &mut KnowledgeStore,
    constraints: &mut ConstraintSet,
    log: &EventLog,
    cap: usize,
) -> Result<FixedPointReport, KnowledgeError> {
    let mut rule_firings = RuleFirings::default();

    for pass in 1..=cap {
        let mut changed = false;
        for rule in Rule::ALL {
            let fired = match rule {
                Rule::UnrefutedReplay => replay_log(store, log)?,
                Rule::ConstraintResolution => constraints.resolve(store)?,
                Rule::UniqueHolder => unique_holder(store)?,
            };
            if fired {
                rule_firings.record(rule);
                changed = true;
                event!(
                    target: TARGET,
                    Level::DEBUG,
                    viewer = %store.viewer(),
                    pass,
                    rule = rule.name(),
                    "rule fired"
                );
            }
        }
        event!(
            target: TARGET,
            Level::TRACE,
            viewer = %store.viewer(),
            pass,
            changed,
            constraints = constraints.len(),
            "deduction pass"
        );
        if !changed {
            return Ok(FixedPointReport {
                passes: pass,
                converged: true,
                rule_firings,
            });
        }
    }

    event!(
        target: TARGET,
        Level::WARN,
        viewer = %store.viewer(),
        passes = cap,
        firings = rule_firings.total(),
        "deduction pass cap reached before convergence"
    );
    Ok(FixedPointReport {
        passes: cap,
        converged: false,
        rule_firings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::record::Suggestion;

    fn p(number: usize) -> PlayerId {
        PlayerId::from_number(number).unwrap()
    }

    fn triple(suspect: Card, weapon: Card, location: Card) -> Suggestion {
        Suggestion::new(suspect, weapon, location).unwrap()
    }

    fn dealt(viewer: usize, players: usize, hand: &[Card]) -> Knowledge {
        let mut knowledge = Knowledge::new(p(viewer), players).unwrap();
        knowledge.deal_initial_hand(hand).unwrap();
        knowledge
    }

    #[test]
    fn suggestions_before_the_deal_are_rejected() {
        let mut knowledge = Knowledge::new(p(1), 3).unwrap();
        let record = SuggestionRecord::unrefuted(
            p(1),
            triple(Card::MrsWhite, Card::Dagger, Card::Hall),
            vec![p(2), p(3)],
        );
        assert!(matches!(
            knowledge.report_suggestion(record),
            Err(KnowledgeError::InvalidEventShape(EventShapeError::HandNotDealt))
        ));
    }

    #[test]
    fn hand_is_dealt_only_once() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        assert!(matches!(
            knowledge.deal_initial_hand(&[Card::Hall]),
            Err(KnowledgeError::InvalidEventShape(EventShapeError::HandAlreadyDealt))
        ));
        assert!(knowledge.store().is_candidate(Card::Hall));
    }

    #[test]
    fn passers_exclude_suggester_and_refuter() {
        let mut knowledge = dealt(1, 4, &[Card::Study]);
        let suggestion = triple(Card::MrsWhite, Card::Dagger, Card::Hall);
        for passers in [vec![p(2)], vec![p(4)], vec![p(3), p(3)]] {
            let record = SuggestionRecord::refuted(p(2), suggestion, p(4), passers);
            let err = knowledge.report_suggestion(record).unwrap_err();
            assert!(matches!(
                err,
                KnowledgeError::InvalidEventShape(EventShapeError::InvalidPasser { .. })
            ));
        }
        assert!(knowledge.log().is_empty());

        let partial = SuggestionRecord::refuted(p(2), suggestion, p(4), vec![p(3)]);
        knowledge.report_suggestion(partial).unwrap();
        assert_eq!(knowledge.store().lacks(p(3)), suggestion.cards());
    }

    #[test]
    fn revealed_card_must_be_suggested() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        let record = SuggestionRecord::refuted(
            p(1),
            triple(Card::MrsWhite, Card::Dagger, Card::Hall),
            p(2),
            vec![],
        )
        .with_revealed(Card::Rope);
        assert!(matches!(
            knowledge.report_suggestion(record),
            Err(KnowledgeError::InvalidEventShape(
                EventShapeError::RevealedNotSuggested { card: Card::Rope }
            ))
        ));
    }

    #[test]
    fn own_refutation_needs_the_revealed_card() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        let record = SuggestionRecord::refuted(
            p(1),
            triple(Card::MrsWhite, Card::Dagger, Card::Hall),
            p(2),
            vec![],
        );
        assert!(matches!(
            knowledge.report_suggestion(record),
            Err(KnowledgeError::InvalidEventShape(EventShapeError::MissingRevealedCard))
        ));
    }

    #[test]
    fn hidden_refutation_leaves_a_constraint() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        let suggestion = triple(Card::MrsWhite, Card::Dagger, Card::Hall);
        knowledge
            .report_suggestion(SuggestionRecord::refuted(p(2), suggestion, p(3), vec![]))
            .unwrap();
        let constraints: Vec<_> = knowledge.constraints().iter().copied().collect();
        assert_eq!(constraints, vec![Constraint::new(p(3), suggestion.cards())]);
        assert_eq!(knowledge.log().len(), 1);
    }

    #[test]
    fn viewer_refuting_without_a_matching_card_is_rejected() {
        let mut knowledge = dealt(2, 3, &[Card::Study]);
        let record = SuggestionRecord::refuted(
            p(1),
            triple(Card::MrsWhite, Card::Dagger, Card::Hall),
            p(2),
            vec![],
        );
        let before = knowledge.store().clone();
        assert!(matches!(
            knowledge.report_suggestion(record),
            Err(KnowledgeError::InvariantViolation(
                InvariantViolation::ViewerHandMismatch { .. }
            ))
        ));
        assert_eq!(knowledge.store(), &before);
        assert!(knowledge.log().is_empty());
    }

    #[test]
    fn viewer_passing_while_holding_a_card_is_rejected() {
        let mut knowledge = dealt(2, 3, &[Card::Hall]);
        let record = SuggestionRecord::refuted(
            p(1),
            triple(Card::MrsWhite, Card::Dagger, Card::Hall),
            p(3),
            vec![p(2)],
        );
        assert!(knowledge.report_suggestion(record).is_err());
        assert!(knowledge.log().is_empty());
    }

    #[test]
    fn other_unrefuted_waits_for_suggester_to_be_cleared() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        let suggestion = triple(Card::MrsWhite, Card::Dagger, Card::Hall);
        knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(2), suggestion, vec![p(3), p(1)]))
            .unwrap();
        assert!(!knowledge.store().is_solution_certain());

        // P3 suggests the same triple; P2 passes, which clears P2 of all three.
        let report = knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(3), suggestion, vec![p(1), p(2)]))
            .unwrap();
        assert!(report.converged);
        assert_eq!(knowledge.store().solution(), Some(suggestion));
    }

    #[test]
    fn failed_ingestion_rolls_back_everything() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        let solution = triple(Card::MrsWhite, Card::Dagger, Card::Hall);
        knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(1), solution, vec![p(2), p(3)]))
            .unwrap();
        let store = knowledge.store().clone();
        let log_len = knowledge.log().len();

        let conflicting = triple(Card::ProfessorPlum, Card::Rope, Card::Kitchen);
        let err = knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(1), conflicting, vec![p(2), p(3)]))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::InvariantViolation(_)));
        assert_eq!(knowledge.store(), &store);
        assert_eq!(knowledge.log().len(), log_len);
        assert_eq!(knowledge.store().solution(), Some(solution));
    }

    #[test]
    fn unique_holder_is_declared_for_non_candidates() {
        let mut knowledge = dealt(1, 3, &[Card::Study]);
        let solution = triple(Card::MrsWhite, Card::Dagger, Card::Hall);
        knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(1), solution, vec![p(2), p(3)]))
            .unwrap();
        // P3 passes on a triple containing Rope, so only P2 can hold it.
        let rope = triple(Card::MrsWhite, Card::Rope, Card::Hall);
        let report = knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(2), rope, vec![p(3), p(1)]))
            .unwrap();
        assert!(report.rule_firings.unique_holder >= 1);
        assert!(knowledge.store().has(p(2)).contains(Card::Rope));
    }

    #[test]
    fn card_without_any_holder_is_rejected_and_rolled_back() {
        let mut knowledge = dealt(1, 3, &[Card::MissScarlett, Card::Study]);
        let solution = triple(Card::MrsWhite, Card::Dagger, Card::Hall);
        knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(1), solution, vec![p(2), p(3)]))
            .unwrap();
        let store = knowledge.store().clone();

        // Rope is no longer a candidate, and now neither opponent can hold it.
        let rope = triple(Card::MissScarlett, Card::Rope, Card::Hall);
        let err = knowledge
            .report_suggestion(SuggestionRecord::unrefuted(p(1), rope, vec![p(2), p(3)]))
            .unwrap_err();
        assert_eq!(
            err,
            KnowledgeError::InvariantViolation(InvariantViolation::OrphanedCard { card: Card::Rope })
        );
        assert_eq!(knowledge.log().len(), 1);
        assert_eq!(knowledge.store(), &store);
    }

    fn staged_collapse() -> (KnowledgeStore, ConstraintSet, EventLog) {
        let knowledge = dealt(1, 2, &[Card::MissScarlett, Card::Study]);
        let record = SuggestionRecord::unrefuted(
            p(1),
            triple(Card::MrsWhite, Card::Dagger, Card::Hall),
            vec![p(2)],
        );
        let mut store = knowledge.store().clone();
        let mut constraints = knowledge.constraints().clone();
        let mut log = knowledge.log().clone();
        log.append(record.clone());
        apply_record(&mut store, &mut constraints, &record).unwrap();
        (store, constraints, log)
    }

    #[test]
    fn pass_cap_reports_unconverged_run() {
        let (mut store, mut constraints, log) = staged_collapse();
        let report = run_with_cap(&mut store, &mut constraints, &log, 1).unwrap();
        assert_eq!(report.passes, 1);
        assert!(!report.converged);
        assert_eq!(report.rule_firings.unique_holder, 1);
        assert!(store.has(p(2)).contains(Card::Rope));
    }

    #[test]
    fn fixed_point_converges_within_the_cap() {
        let (mut store, mut constraints, log) = staged_collapse();
        let report = run_to_fixed_point(&mut store, &mut constraints, &log).unwrap();
        assert!(report.converged);
        assert_eq!(report.passes, 2);
        assert!(report.passes <= MAX_PASSES);
        assert_eq!(report.rule_firings.total(), 1);
    }

    #[test]
    fn rebuild_replays_the_same_state() {
        let hand = [Card::MissScarlett, Card::Candlestick, Card::Kitchen, Card::Study];
        let records = vec![
            SuggestionRecord::refuted(
                p(1),
                triple(Card::ColonelMustard, Card::Rope, Card::Library),
                p(2),
                vec![],
            )
            .with_revealed(Card::ColonelMustard),
            SuggestionRecord::refuted(
                p(2),
                triple(Card::MrsPeacock, Card::Wrench, Card::Lounge),
                p(1),
                vec![],
            ),
        ];
        let mut live = Knowledge::new(p(1), 3).unwrap();
        live.deal_initial_hand(&hand).unwrap();
        // P1 holds none of P2's triple, so the refutation above is bogus.
        assert!(live.report_suggestion(records[1].clone()).is_err());
        live.report_suggestion(records[0].clone()).unwrap();

        let rebuilt = Knowledge::rebuild(p(1), 3, &hand, records[..1].to_vec()).unwrap();
        assert_eq!(rebuilt.store(), live.store());
        assert_eq!(rebuilt.log(), live.log());
    }
}
