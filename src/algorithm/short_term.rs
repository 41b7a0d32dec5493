//! Short-term intensive burst scheduler.
//!
//! Cram-style scheduling for a 24-hour horizon (exam eve, interview prep).
//! A fixed minute ladder is climbed one rung per successful review; a
//! failure forces a retry in exactly five minutes without losing the rung.
//! Past the top of the ladder the item is graduated and parked days out.

use chrono::{DateTime, Utc};

use crate::algorithm::{duration_from_days, duration_from_minutes, ids, Algorithm};
use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, StateDelta};

/// Review offsets in minutes; index 0 is the initial exposure.
pub const STAGE_MINUTES: [f64; 6] = [0.0, 10.0, 30.0, 60.0, 180.0, 1440.0];
/// Retry delay after a failed recall.
pub const FAILURE_RETRY_MINUTES: f64 = 5.0;
/// Where graduated items are parked.
pub const GRADUATED_DAYS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ShortTermCard {
    /// Last rung reached on the ladder; `STAGE_MINUTES.len()` = graduated.
    pub stage: u32,
    pub streak: u32,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

impl ShortTermCard {
    pub fn is_graduated(&self) -> bool {
        self.stage as usize >= STAGE_MINUTES.len()
    }
}

pub struct ShortTerm;

impl ShortTerm {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShortTerm {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for ShortTerm {
    type Card = ShortTermCard;
    type Params = ();
    /// quality = min(hint count, 5); < 3 is a success.
    type Grade = u32;

    fn id(&self) -> &str {
        ids::SHORT_TERM
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> ShortTermCard {
        match prior {
            None => ShortTermCard {
                stage: 0,
                streak: 0,
                due: now,
                last_review: None,
            },
            Some(state) => ShortTermCard {
                stage: state.short_stage_index.unwrap_or(0),
                streak: state.success_streak.unwrap_or(0),
                due: state.next_remembered_at,
                last_review: state.last_remembered_at,
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
        card: ShortTermCard,
        _params: &(),
        now: DateTime<Utc>,
    ) -> Result<ShortTermCard, ScheduleError> {
        let mut next = card.clone();
        next.last_review = Some(now);

        if quality >= 3 {
            // Forced high-frequency exposure; rung progress is kept.
            next.streak = card.streak.saturating_sub(1);
            next.due = now + duration_from_minutes(FAILURE_RETRY_MINUTES);
            return Ok(next);
        }

        next.streak = card.streak + 1;
        let stage = (card.stage + 1).min(STAGE_MINUTES.len() as u32);
        next.stage = stage;
        next.due = if (stage as usize) < STAGE_MINUTES.len() {
            now + duration_from_minutes(STAGE_MINUTES[stage as usize])
        } else {
            now + duration_from_days(GRADUATED_DAYS)
        };
        Ok(next)
    }

    fn resolve(&self, card: ShortTermCard) -> StateDelta {
        StateDelta {
            short_stage_index: Some(card.stage),
            success_streak: Some(card.streak),
            next_remembered_at: Some(card.due),
            last_remembered_at: card.last_review,
            ..Default::default()
        }
    }
}
