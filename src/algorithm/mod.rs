//! Strategy contract and registry for the scheduling algorithms.
//!
//! Every algorithm implements the typed [`Algorithm`] pipeline
//! (build → build_params → build_grade → handle → resolve). The object-safe
//! [`ScheduleStrategy`] wrapper, blanket-implemented over it, runs the whole
//! pipeline so the registry can hold the family behind one trait object.

pub mod arss;
pub mod asm_plus;
pub mod fsrs;
pub mod short_term;
pub mod sm2;
pub mod smc;
pub mod zhuzhu;

use std::collections::HashMap;
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};

use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, ReviewSample, StateDelta, TrainingOutcome};

pub use arss::Arss;
pub use asm_plus::AsmPlus;
pub use fsrs::Fsrs;
pub use short_term::ShortTerm;
pub use sm2::Sm2;
pub use smc::Smc;
pub use zhuzhu::Zhuzhu;

/// Stable algorithm identifiers, as stored on the user profile.
pub mod ids {
    pub const SM2: &str = "sm2";
    pub const ASM_PLUS: &str = "asmplus";
    pub const FSRS: &str = "fsrs";
    pub const FSRS_SHORT_TERM: &str = "fsrsst";
    pub const SHORT_TERM: &str = "st";
    pub const ARSS: &str = "arss";
    pub const SMC: &str = "smc";
    pub const SMZ: &str = "smz";
    pub const ZHUZHU: &str = "zhuzhu";
}

/// The typed scheduling pipeline.
///
/// `handle` is pure: it never errors for a valid grade, and malformed or
/// missing prior fields fall back to the algorithm's documented defaults in
/// `build` instead of failing here.
pub trait Algorithm: Send + Sync {
    /// Working representation of one item's memory state.
    type Card: Debug + PartialEq;
    /// Algorithm-relevant slice of the user profile.
    type Params: Debug;
    /// Discrete quality signal for one review.
    type Grade: Copy + Debug;

    fn id(&self) -> &str;

    /// Projects prior state into a card. Absent state, or state written by a
    /// different algorithm, yields a fresh default card.
    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> Self::Card;

    /// Extracts and validates user settings. Invalid configuration fails
    /// fast here or in `handle`, never silently substituted.
    fn build_params(&self, profile: &LearnerProfile) -> Result<Self::Params, ScheduleError>;

    /// Maps the review event to this algorithm's grade. Pure.
    fn build_grade(&self, event: &ReviewEvent) -> Self::Grade;

    fn handle(
        &self,
        grade: Self::Grade,
        card: Self::Card,
        params: &Self::Params,
        now: DateTime<Utc>,
    ) -> Result<Self::Card, ScheduleError>;

    /// Projects the card back into the fields this algorithm owns.
    fn resolve(&self, card: Self::Card) -> StateDelta;

    /// Whether this algorithm maintains population-level parameters.
    fn supports_training(&self) -> bool {
        false
    }

    /// Batch-trains user-level parameters from review history.
    fn train(
        &self,
        _history: &[ReviewSample],
        _initial_stability: f64,
    ) -> Result<TrainingOutcome, ScheduleError> {
        Err(ScheduleError::TrainingUnsupported(self.id().to_string()))
    }
}

/// Object-safe view over the pipeline, held by the registry.
pub trait ScheduleStrategy: Send + Sync {
    fn id(&self) -> &str;

    fn supports_training(&self) -> bool;

    /// Runs the full pipeline for one review and returns the delta.
    fn schedule(
        &self,
        prior: Option<&MemoryState>,
        event: &ReviewEvent,
        profile: &LearnerProfile,
        now: DateTime<Utc>,
    ) -> Result<StateDelta, ScheduleError>;

    fn train(
        &self,
        history: &[ReviewSample],
        initial_stability: f64,
    ) -> Result<TrainingOutcome, ScheduleError>;
}

impl std::fmt::Debug for dyn ScheduleStrategy + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleStrategy")
            .field("id", &self.id())
            .finish()
    }
}

impl<A: Algorithm> ScheduleStrategy for A {
    fn id(&self) -> &str {
        Algorithm::id(self)
    }

    fn supports_training(&self) -> bool {
        Algorithm::supports_training(self)
    }

    fn schedule(
        &self,
        prior: Option<&MemoryState>,
        event: &ReviewEvent,
        profile: &LearnerProfile,
        now: DateTime<Utc>,
    ) -> Result<StateDelta, ScheduleError> {
        let card = self.build(prior, now);
        let params = self.build_params(profile)?;
        let grade = self.build_grade(event);
        let card = self.handle(grade, card, &params, now)?;
        Ok(self.resolve(card))
    }

    fn train(
        &self,
        history: &[ReviewSample],
        initial_stability: f64,
    ) -> Result<TrainingOutcome, ScheduleError> {
        Algorithm::train(self, history, initial_stability)
    }
}

/// All scheduling strategies keyed by identifier.
///
/// Lookup of an unknown identifier is an error: a user profile pointing at a
/// removed or misspelled algorithm is a configuration bug, not something to
/// paper over with a default.
pub struct AlgorithmRegistry {
    strategies: HashMap<String, Box<dyn ScheduleStrategy>>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry with the full production family registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Sm2::new()));
        registry.register(Box::new(AsmPlus::new()));
        registry.register(Box::new(Fsrs::standard()));
        registry.register(Box::new(Fsrs::short_term()));
        registry.register(Box::new(ShortTerm::new()));
        registry.register(Box::new(Arss::new()));
        registry.register(Box::new(Smc::smc()));
        registry.register(Box::new(Smc::smz()));
        registry.register(Box::new(Zhuzhu::new()));
        registry
    }

    /// Registers a strategy under its own identifier, replacing any previous
    /// registration of the same identifier.
    pub fn register(&mut self, strategy: Box<dyn ScheduleStrategy>) {
        self.strategies.insert(strategy.id().to_string(), strategy);
    }

    pub fn get(&self, id: &str) -> Result<&dyn ScheduleStrategy, ScheduleError> {
        self.strategies
            .get(id)
            .map(Box::as_ref)
            .ok_or_else(|| ScheduleError::UnknownAlgorithm(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ScheduleStrategy> {
        self.strategies.values().map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const MS_PER_DAY: f64 = 86_400_000.0;

/// Ceiling shared by the uncapped-growth algorithms (100 years). Compounding
/// multipliers would otherwise overflow calendar arithmetic long before the
/// interval means anything.
pub(crate) const MAX_INTERVAL_DAYS: f64 = 36500.0;

/// Fractional days between two instants, negative when `later` precedes
/// `earlier`.
pub(crate) fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / MS_PER_DAY
}

pub(crate) fn duration_from_days(days: f64) -> Duration {
    Duration::milliseconds((days * MS_PER_DAY) as i64)
}

pub(crate) fn duration_from_minutes(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn registry_resolves_all_default_ids() {
        let registry = AlgorithmRegistry::with_defaults();
        for id in [
            ids::SM2,
            ids::ASM_PLUS,
            ids::FSRS,
            ids::FSRS_SHORT_TERM,
            ids::SHORT_TERM,
            ids::ARSS,
            ids::SMC,
            ids::SMZ,
            ids::ZHUZHU,
        ] {
            let strategy = registry.get(id).unwrap();
            assert_eq!(strategy.id(), id);
        }
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn unknown_algorithm_is_an_error() {
        let registry = AlgorithmRegistry::with_defaults();
        let err = registry.get("sm99").unwrap_err();
        assert!(matches!(err, ScheduleError::UnknownAlgorithm(id) if id == "sm99"));
    }

    #[test]
    fn only_arss_supports_training() {
        let registry = AlgorithmRegistry::with_defaults();
        let trainable: Vec<&str> = registry
            .iter()
            .filter(|s| s.supports_training())
            .map(|s| s.id())
            .collect();
        assert_eq!(trainable, vec![ids::ARSS]);
    }

    #[test]
    fn day_arithmetic_round_trips() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let t1 = t0 + duration_from_days(2.5);
        assert!((days_between(t1, t0) - 2.5).abs() < 1e-9);
        assert_eq!(duration_from_minutes(5.0), Duration::minutes(5));
    }
}
