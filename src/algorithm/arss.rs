//! ARSS: adaptive recall-sensitive scheduling.
//!
//! Lightweight two-level design: a periodic batch job fits one stability
//! value per user from their recent history (global fit), and each review
//! micro-adjusts the next interval around that stability (item-level
//! fine-tuning). Only the due time moves per review; streak and last-review
//! bookkeeping stay with their owners.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::algorithm::{ids, Algorithm, MAX_INTERVAL_DAYS};
use crate::error::ScheduleError;
use crate::model::{
    LearnerProfile, MemoryState, ReviewEvent, ReviewSample, StateDelta, TrainingOutcome,
};

/// Stability-growth weight per rating 0..=3 (fail → perfect).
const RATING_WEIGHTS: [f64; 4] = [0.4, 0.6, 1.0, 1.5];
/// Days covered by the generated memory curve.
const MEMORY_CURVE_DAYS: usize = 30;
pub const DEFAULT_STABILITY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ArssCard {
    pub streak: u32,
    pub due: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ArssParams {
    pub target_retention: f64,
    /// User-level stability from the last training pass, in days.
    pub current_stability: f64,
}

pub struct Arss;

impl Arss {
    pub fn new() -> Self {
        Self
    }

    /// Recall quality in [0, 1] from the hint count.
    fn quality(hint_count: u32) -> f64 {
        match hint_count {
            0 => 1.0,
            1 => 0.8,
            2 => 0.6,
            _ => 0.3,
        }
    }

    /// Rating 0..=3 used by training; 3 is a perfect recall.
    fn rating(hint_count: u32) -> usize {
        match hint_count {
            0 => 3,
            1 => 2,
            2 => 1,
            _ => 0,
        }
    }

    /// Recall-probability samples for t = 0..=days at stability `s`.
    fn memory_curve(s: f64, days: usize) -> Vec<f64> {
        let p = std::f64::consts::LN_2 / (9.0 * s);
        (0..=days).map(|t| (-p * t as f64).exp()).collect()
    }
}

impl Default for Arss {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for Arss {
    type Card = ArssCard;
    type Params = ArssParams;
    /// Raw hint count; `handle` derives quality from it.
    type Grade = u32;

    fn id(&self) -> &str {
        ids::ARSS
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> ArssCard {
        match prior {
            None => ArssCard {
                streak: 0,
                due: now,
            },
            Some(state) => ArssCard {
                streak: state.success_streak.unwrap_or(0),
                due: state.next_remembered_at,
            },
        }
    }

    fn build_params(&self, profile: &LearnerProfile) -> Result<ArssParams, ScheduleError> {
        Ok(ArssParams {
            target_retention: profile.target_retention_ratio(),
            current_stability: profile.stability.unwrap_or(DEFAULT_STABILITY),
        })
    }

    fn build_grade(&self, event: &ReviewEvent) -> u32 {
        event.hint_count
    }

    fn handle(
        &self,
        hint_count: u32,
        card: ArssCard,
        params: &ArssParams,
        now: DateTime<Utc>,
    ) -> Result<ArssCard, ScheduleError> {
        if params.target_retention <= 0.0 || params.target_retention >= 1.0 {
            return Err(ScheduleError::InvalidTargetRetention(params.target_retention));
        }

        let base_interval_days =
            9.0 * params.current_stability * (1.0 / params.target_retention - 1.0);

        let quality = Self::quality(hint_count);
        let confidence_bonus = (f64::from(card.streak) * 0.1).min(0.3);
        let raf = (0.6 + 0.7 * quality + confidence_bonus).clamp(0.5, 1.5);

        let days_to_add = (base_interval_days * raf)
            .round()
            .clamp(1.0, MAX_INTERVAL_DAYS);

        Ok(ArssCard {
            streak: card.streak,
            due: now + Duration::days(days_to_add as i64),
        })
    }

    fn resolve(&self, card: ArssCard) -> StateDelta {
        StateDelta {
            next_remembered_at: Some(card.due),
            ..Default::default()
        }
    }

    fn supports_training(&self) -> bool {
        true
    }

    /// Replays the user's recent history in chronological order, folding the
    /// simplified FSRS stability update over it, then samples the resulting
    /// forgetting curve.
    fn train(
        &self,
        history: &[ReviewSample],
        initial_stability: f64,
    ) -> Result<TrainingOutcome, ScheduleError> {
        if history.is_empty() {
            return Ok(TrainingOutcome {
                stability: initial_stability,
                memory_curve: Vec::new(),
            });
        }

        let mut sorted: Vec<ReviewSample> = history.to_vec();
        sorted.sort_by_key(|sample| sample.remembered_at);

        let mut stability = initial_stability;
        let mut last_event = sorted[0].created_at;

        for review in &sorted {
            let t = (review.remembered_at - last_event).num_milliseconds() as f64
                / (24.0 * 60.0 * 60.0 * 1000.0);
            if t <= 0.0 {
                continue;
            }

            let retrievability = 1.0 / (1.0 + t / (9.0 * stability));
            let rating = Self::rating(review.curr_hint_count);
            stability *= 1.0 + RATING_WEIGHTS[rating] * (1.0 - retrievability);
            last_event = review.remembered_at;
        }

        debug!(stability, reviews = sorted.len(), "arss training pass done");
        Ok(TrainingOutcome {
            stability,
            memory_curve: Self::memory_curve(stability, MEMORY_CURVE_DAYS),
        })
    }
}
