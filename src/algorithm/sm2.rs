//! Classic SM-2 scheduling.
//!
//! Ease factor and a consecutive-success counter drive the familiar
//! 1 day → 6 days → interval × EF ladder. Three or more hints in a review
//! count as a failure: the streak resets and the item comes back tomorrow.

use chrono::{DateTime, Utc};

use crate::algorithm::{days_between, duration_from_days, ids, Algorithm, MAX_INTERVAL_DAYS};
use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, StateDelta};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, PartialEq)]
pub struct Sm2Card {
    pub ease_factor: f64,
    pub streak: u32,
    /// Scheduled time of the review being handled now.
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
    /// Days the previous schedule spanned, the base for interval growth.
    pub prev_interval_days: f64,
}

pub struct Sm2;

impl Sm2 {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sm2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for Sm2 {
    type Card = Sm2Card;
    type Params = ();
    /// quality = min(hint count, 5); 0 is a perfect recall.
    type Grade = u32;

    fn id(&self) -> &str {
        ids::SM2
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> Sm2Card {
        match prior {
            None => Sm2Card {
                ease_factor: DEFAULT_EASE_FACTOR,
                streak: 0,
                due: now,
                last_review: None,
                prev_interval_days: 0.0,
            },
            Some(state) => Sm2Card {
                ease_factor: state.ease_factor.unwrap_or(DEFAULT_EASE_FACTOR),
                streak: state.success_streak.unwrap_or(0),
                due: state.next_remembered_at,
                last_review: state.last_remembered_at,
                prev_interval_days: state
                    .last_remembered_at
                    .map(|last| days_between(state.next_remembered_at, last).max(0.0))
                    .unwrap_or(0.0),
            },
        }
    }

    fn build_params(&self, _profile: &LearnerProfile) -> Result<(), ScheduleError> {
        Ok(())
    }

    fn build_grade(&self, event: &ReviewEvent) -> u32 {
        event.hint_count.min(5)
    }

    fn handle(
        &self,
        quality: u32,
        card: Sm2Card,
        _params: &(),
        now: DateTime<Utc>,
    ) -> Result<Sm2Card, ScheduleError> {
        let mut next = card.clone();

        let (interval_days, streak, ease_factor) = if quality >= 3 {
            // Failure: back to tomorrow, streak gone, EF untouched.
            (1.0, 0, card.ease_factor)
        } else {
            let streak = card.streak + 1;
            let interval = match streak {
                1 => 1.0,
                2 => 6.0,
                // Grown from the previous schedule with the pre-update EF.
                _ => (card.prev_interval_days * card.ease_factor)
                    .round()
                    .clamp(1.0, MAX_INTERVAL_DAYS),
            };
            let q = f64::from(quality);
            let ease = (card.ease_factor + 0.1 - q * (0.08 + q * 0.02)).max(MIN_EASE_FACTOR);
            (interval, streak, ease)
        };

        // The old due time becomes the review that just happened.
        next.last_review = Some(card.due);
        next.due = now + duration_from_days(interval_days);
        next.prev_interval_days = interval_days;
        next.streak = streak;
        next.ease_factor = ease_factor;
        Ok(next)
    }

    fn resolve(&self, card: Sm2Card) -> StateDelta {
        StateDelta {
            ease_factor: Some(card.ease_factor),
            success_streak: Some(card.streak),
            next_remembered_at: Some(card.due),
            last_remembered_at: card.last_review,
            ..Default::default()
        }
    }
}
