//! ASM+: an SM-2 derivative with softer failure handling.
//!
//! Differences from classic SM-2: failures soft-reset the streak instead of
//! zeroing it, the very first interval adapts to recall quality, and mature
//! interval growth is damped by the learner's historical hint rate.

use chrono::{DateTime, Utc};

use crate::algorithm::{days_between, duration_from_days, ids, Algorithm};
use crate::algorithm::sm2::{DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR};
use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, StateDelta};

const MAX_INTERVAL_DAYS: f64 = 365.0;
const FAILURE_EF_PENALTY: f64 = 0.15;

#[derive(Debug, Clone, PartialEq)]
pub struct AsmPlusCard {
    pub ease_factor: f64,
    pub streak: u32,
    /// Reviews completed before this one.
    pub remembered_count: u32,
    /// Cumulative hints before this review.
    pub hint_count: u32,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

pub struct AsmPlus;

impl AsmPlus {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AsmPlus {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for AsmPlus {
    type Card = AsmPlusCard;
    type Params = ();
    /// Raw hint count; quality and the cumulative hint rate both derive
    /// from it in `handle`.
    type Grade = u32;

    fn id(&self) -> &str {
        ids::ASM_PLUS
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> AsmPlusCard {
        match prior {
            None => AsmPlusCard {
                ease_factor: DEFAULT_EASE_FACTOR,
                streak: 0,
                remembered_count: 0,
                hint_count: 0,
                due: now,
                last_review: None,
            },
            Some(state) => AsmPlusCard {
                ease_factor: state.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
                streak: state.success_streak.unwrap_or(0),
                remembered_count: state.remembered_count,
                hint_count: state.hint_count,
                due: state.next_remembered_at,
                last_review: state.last_remembered_at,
            },
        }
    }

    fn build_params(&self, _profile: &LearnerProfile) -> Result<(), ScheduleError> {
        Ok(())
    }

    fn build_grade(&self, event: &ReviewEvent) -> u32 {
        event.hint_count
    }

    fn handle(
        &self,
        hint_count: u32,
        card: AsmPlusCard,
        _params: &(),
        now: DateTime<Utc>,
    ) -> Result<AsmPlusCard, ScheduleError> {
        let mut next = card.clone();
        let quality = hint_count.min(5);

        // Hint rate over all reviews including this one.
        let reviews_after = card.remembered_count + 1;
        let hints_after = card.hint_count + hint_count;
        let avg_hint_rate = f64::from(hints_after) / f64::from(reviews_after);

        let interval_days = if quality >= 3 {
            // Soft reset: keep part of the streak, mild EF penalty.
            next.streak = card.streak.saturating_sub(2);
            next.ease_factor = (card.ease_factor - FAILURE_EF_PENALTY).max(MIN_EASE_FACTOR);
            1.0
        } else {
            next.streak = card.streak + 1;
            let interval = if card.remembered_count == 0 {
                // First exposure: better recall earns a longer start.
                f64::from((2 - quality).max(1))
            } else if next.streak == 1 {
                // First success after a failure.
                1.0
            } else if next.streak == 2 {
                f64::from(5 + (2 - quality))
            } else {
                let base = card
                    .last_review
                    .map(|last| days_between(now, last).max(0.0))
                    .unwrap_or(0.0);
                let stability_factor = 1.0 - 0.1 * avg_hint_rate;
                (base * card.ease_factor * stability_factor)
                    .round()
                    .clamp(1.0, MAX_INTERVAL_DAYS)
            };
            let q = f64::from(quality);
            next.ease_factor = (card.ease_factor + 0.1 - 0.1 * q).max(MIN_EASE_FACTOR);
            interval
        };

        next.remembered_count = reviews_after;
        next.hint_count = hints_after;
        next.last_review = Some(now);
        next.due = now + duration_from_days(interval_days);
        Ok(next)
    }

    fn resolve(&self, card: AsmPlusCard) -> StateDelta {
        StateDelta {
            ease_factor: Some(card.ease_factor),
            success_streak: Some(card.streak),
            next_remembered_at: Some(card.due),
            last_remembered_at: card.last_review,
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

    fn fresh_card() -> AsmPlusCard {
        AsmPlus::new().build(None, now())
    }

    #[test]
    fn first_perfect_review_gets_two_days() {
        let algo = AsmPlus::new();
        let next = algo.handle(0, fresh_card(), &(), now()).unwrap();
        assert_eq!(next.streak, 1);
        assert_eq!(next.due, now() + Duration::days(2));
        assert!((next.ease_factor - 2.6).abs() < 1e-9);
    }

    #[test]
    fn first_shaky_review_gets_one_day() {
        let algo = AsmPlus::new();
        let next = algo.handle(2, fresh_card(), &(), now()).unwrap();
        assert_eq!(next.due, now() + Duration::days(1));
    }

    #[test]
    fn failure_soft_resets_streak_and_penalizes_ef() {
        let algo = AsmPlus::new();
        let mut card = fresh_card();
        card.streak = 5;
        card.remembered_count = 5;
        let next = algo.handle(4, card, &(), now()).unwrap();
        assert_eq!(next.streak, 3);
        assert_eq!(next.due, now() + Duration::days(1));
        assert!((next.ease_factor - 2.35).abs() < 1e-9);
    }

    #[test]
    fn second_consecutive_success_uses_quality_offset() {
        let algo = AsmPlus::new();
        let mut card = fresh_card();
        card.streak = 1;
        card.remembered_count = 3;
        let next = algo.handle(0, card, &(), now()).unwrap();
        assert_eq!(next.streak, 2);
        assert_eq!(next.due, now() + Duration::days(7));
    }

    #[test]
    fn mature_interval_is_capped_at_one_year() {
        let algo = AsmPlus::new();
        let card = AsmPlusCard {
            ease_factor: 3.0,
            streak: 6,
            remembered_count: 10,
            hint_count: 0,
            due: now(),
            last_review: Some(now() - Duration::days(366)),
        };
        let next = algo.handle(0, card, &(), now()).unwrap();
        assert_eq!(next.due, now() + Duration::days(365));
    }

    #[test]
    fn hint_rate_slows_interval_growth() {
        let algo = AsmPlus::new();
        let clean = AsmPlusCard {
            ease_factor: 2.5,
            streak: 4,
            remembered_count: 10,
            hint_count: 0,
            due: now(),
            last_review: Some(now() - Duration::days(10)),
        };
        let hinty = AsmPlusCard {
            hint_count: 20,
            ..clean.clone()
        };
        let next_clean = algo.handle(0, clean, &(), now()).unwrap();
        let next_hinty = algo.handle(0, hinty, &(), now()).unwrap();
        assert!(next_hinty.due < next_clean.due);
    }

    #[test]
    fn ease_factor_floor_holds_under_repeated_failure() {
        let algo = AsmPlus::new();
        let mut card = fresh_card();
        for _ in 0..40 {
            card = algo.handle(5, card, &(), now()).unwrap();
            assert!(card.ease_factor >= MIN_EASE_FACTOR - 1e-12);
        }
        assert!((card.ease_factor - MIN_EASE_FACTOR).abs() < 1e-9);
        assert_eq!(card.streak, 0);
    }
}
