//! FSRS strategies: the long-term scheduler and its short-term variant.
//!
//! Thin wrappers over the engine in [`crate::fsrs`]. Responsibilities here
//! are projection only: reconstructing the engine card from stored fields
//! (or a fresh card when the record was written by another algorithm),
//! deriving elapsed/scheduled days from timestamps, mapping hints to
//! ratings, and projecting the engine output back.

use chrono::{DateTime, Utc};

use crate::algorithm::{days_between, ids, Algorithm};
use crate::error::ScheduleError;
use crate::fsrs::{next_card, CardState, FsrsCard, FsrsParams, Rating};
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, StateDelta};

pub struct Fsrs {
    id: &'static str,
    enable_short_term: bool,
}

impl Fsrs {
    /// Long-term scheduler (`fsrs`).
    pub fn standard() -> Self {
        Self {
            id: ids::FSRS,
            enable_short_term: false,
        }
    }

    /// Short-term variant (`fsrsst`): same engine, intra-day learning steps
    /// switched on.
    pub fn short_term() -> Self {
        Self {
            id: ids::FSRS_SHORT_TERM,
            enable_short_term: true,
        }
    }
}

impl Algorithm for Fsrs {
    type Card = FsrsCard;
    type Params = FsrsParams;
    type Grade = Rating;

    fn id(&self) -> &str {
        self.id
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> FsrsCard {
        let Some(state) = prior else {
            return FsrsCard::new(now);
        };
        // Zero or absent stability means the record was written by another
        // algorithm; start the FSRS lifecycle from scratch.
        let stability = state.fsrs_stability.unwrap_or(0.0);
        if stability <= 0.0 {
            return FsrsCard::new(now);
        }
        let elapsed_days = state
            .last_remembered_at
            .map(|last| days_between(now, last).max(0.0))
            .unwrap_or(0.0);
        let scheduled_days = state
            .last_remembered_at
            .map(|last| days_between(state.next_remembered_at, last).max(0.0))
            .unwrap_or(0.0);
        FsrsCard {
            due: state.next_remembered_at,
            last_review: state.last_remembered_at,
            stability,
            difficulty: state.fsrs_difficulty.unwrap_or(0.0),
            elapsed_days,
            scheduled_days,
            reps: state.remembered_count,
            lapses: state.fsrs_lapses.unwrap_or(0),
            state: state
                .fsrs_state
                .map(CardState::from_repr)
                .unwrap_or(CardState::Review),
            learning_steps: state.fsrs_learning_steps.unwrap_or(0),
        }
    }

    fn build_params(&self, profile: &LearnerProfile) -> Result<FsrsParams, ScheduleError> {
        let retention = profile.target_retention_ratio();
        if retention <= 0.0 || retention >= 1.0 {
            return Err(ScheduleError::InvalidTargetRetention(retention));
        }
        Ok(FsrsParams {
            request_retention: retention,
            enable_fuzz: true,
            enable_short_term: self.enable_short_term,
            ..Default::default()
        })
    }

    fn build_grade(&self, event: &ReviewEvent) -> Rating {
        match event.hint_count {
            0 => Rating::Easy,
            1 => Rating::Good,
            2 => Rating::Hard,
            _ => Rating::Again,
        }
    }

    fn handle(
        &self,
        grade: Rating,
        card: FsrsCard,
        params: &FsrsParams,
        now: DateTime<Utc>,
    ) -> Result<FsrsCard, ScheduleError> {
        Ok(next_card(&card, grade, params, now))
    }

    fn resolve(&self, card: FsrsCard) -> StateDelta {
        StateDelta {
            fsrs_stability: Some(card.stability),
            fsrs_difficulty: Some(card.difficulty),
            next_remembered_at: Some(card.due),
            last_remembered_at: card.last_review,
            fsrs_lapses: Some(card.lapses),
            fsrs_state: Some(card.state.as_u8()),
            fsrs_learning_steps: Some(card.learning_steps),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn profile() -> LearnerProfile {
        LearnerProfile {
            algorithm: ids::FSRS.to_string(),
            target_retention: 90,
            active_level: 50,
            daily_budget_minutes: 30,
            stability: None,
        }
    }

    #[test]
    fn build_without_prior_state_is_an_empty_card() {
        let algo = Fsrs::standard();
        let a = algo.build(None, now());
        let b = algo.build(None, now());
        assert_eq!(a, b);
        assert_eq!(a.state, CardState::New);
        assert_eq!(a.reps, 0);
    }

    #[test]
    fn zero_stability_record_rebuilds_from_scratch() {
        // A record carried over from SM-2 has no FSRS fields.
        let mut state = MemoryState::fresh(now());
        state.remembered_count = 7;
        state.ease_factor = Some(2.1);
        let card = Fsrs::standard().build(Some(&state), now());
        assert_eq!(card.state, CardState::New);
        assert_eq!(card.reps, 0);
    }

    #[test]
    fn build_reconstructs_elapsed_and_scheduled_days() {
        let mut state = MemoryState::fresh(now() - Duration::days(20));
        state.remembered_count = 3;
        state.fsrs_stability = Some(6.0);
        state.fsrs_difficulty = Some(0.4);
        state.fsrs_state = Some(CardState::Review.as_u8());
        state.last_remembered_at = Some(now() - Duration::days(8));
        state.next_remembered_at = now() - Duration::days(2);
        let card = Fsrs::standard().build(Some(&state), now());
        assert!((card.elapsed_days - 8.0).abs() < 1e-9);
        assert!((card.scheduled_days - 6.0).abs() < 1e-9);
        assert_eq!(card.reps, 3);
    }

    #[test]
    fn grade_mapping_follows_hint_count() {
        let algo = Fsrs::standard();
        let grade = |hint_count| {
            algo.build_grade(&ReviewEvent {
                hint_count,
                thinking_time_ms: 0,
            })
        };
        assert_eq!(grade(0), Rating::Easy);
        assert_eq!(grade(1), Rating::Good);
        assert_eq!(grade(2), Rating::Hard);
        assert_eq!(grade(3), Rating::Again);
        assert_eq!(grade(9), Rating::Again);
    }

    #[test]
    fn params_reject_degenerate_retention() {
        let mut p = profile();
        p.target_retention = 0;
        assert!(matches!(
            Fsrs::standard().build_params(&p),
            Err(ScheduleError::InvalidTargetRetention(_))
        ));
        p.target_retention = 100;
        assert!(Fsrs::standard().build_params(&p).is_err());
    }

    #[test]
    fn short_term_variant_differs_only_by_flag() {
        let long = Fsrs::standard().build_params(&profile()).unwrap();
        let short = Fsrs::short_term().build_params(&profile()).unwrap();
        assert!(!long.enable_short_term);
        assert!(short.enable_short_term);
        assert_eq!(long.request_retention, short.request_retention);
        assert!(long.enable_fuzz && short.enable_fuzz);
    }

    #[test]
    fn resolve_projects_engine_fields() {
        let algo = Fsrs::standard();
        let params = algo.build_params(&profile()).unwrap();
        let card = algo.build(None, now());
        let card = algo.handle(Rating::Good, card, &params, now()).unwrap();
        let delta = algo.resolve(card.clone());
        assert_eq!(delta.fsrs_stability, Some(card.stability));
        assert_eq!(delta.next_remembered_at, Some(card.due));
        assert_eq!(delta.fsrs_state, Some(CardState::Review.as_u8()));
        assert!(delta.ease_factor.is_none());
    }
}
