//! Zhuzhu: a hand-tuned multiplicative heuristic.
//!
//! No forgetting-curve model: a 5-minute base interval is extended by four
//! independent weighted terms, each scaled against a fixed 3-day reference
//! window. The constants are tuned from production data, not derived; they
//! are reproduced exactly and should not be "corrected" analytically.

use chrono::{DateTime, Utc};

use crate::algorithm::{duration_from_minutes, ids, Algorithm};
use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, StateDelta};

/// Starting interval, minutes.
const BASE_MINUTES: f64 = 5.0;
/// Reference window every factor is scaled against: 3 days in minutes.
const FIX_VALUE_MINUTES: f64 = 4320.0;
/// Upper clamp: one year in minutes.
const MAX_MINUTES: f64 = 525_600.0;

const WEIGHT_THINKING_TIME: f64 = 0.45;
const WEIGHT_ACTIVE_LEVEL: f64 = 0.20;
const WEIGHT_EXPERIENCE: f64 = 0.05;
const WEIGHT_GRADE: f64 = 0.30;

#[derive(Debug, Clone, PartialEq)]
pub struct ZhuzhuCard {
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
    /// Cumulative recall time before this review, milliseconds.
    pub thinking_time_ms: i64,
    pub remembered_count: u32,
}

#[derive(Debug, Clone)]
pub struct ZhuzhuParams {
    /// Engagement score on the 0-10 scale.
    pub active_level: f64,
    pub daily_budget_minutes: f64,
}

/// Grade 1 (fail) ..= 4 (perfect) plus the measured recall time the
/// thinking-time factor compares against the learner's average.
#[derive(Debug, Clone, Copy)]
pub struct ZhuzhuGrade {
    pub grade: u8,
    pub thinking_time_ms: i64,
}

pub struct Zhuzhu;

impl Zhuzhu {
    pub fn new() -> Self {
        Self
    }

    /// Ratio of this review's recall time to the historical average, raised
    /// to a negative power: faster-than-usual recall earns a longer
    /// interval. An instant recall (0 ms) blows the term up on purpose; the
    /// final clamp turns that into the maximum interval.
    fn thinking_time_factor(card: &ZhuzhuCard, curr_thinking_time_ms: i64) -> f64 {
        if card.remembered_count == 0 {
            return 1.0;
        }
        let avg = card.thinking_time_ms as f64 / f64::from(card.remembered_count);
        if avg <= 0.0 {
            return 1.0;
        }
        let ratio = curr_thinking_time_ms.max(0) as f64 / avg;
        ratio.powf(-0.7)
    }

    fn active_level_factor(active_level: f64) -> f64 {
        (1.0 + 0.15 * (0.4 * (active_level - 5.0)).tanh()).clamp(0.8, 1.2)
    }

    fn experience_factor(remembered_count: u32) -> f64 {
        if remembered_count == 0 {
            return 1.0;
        }
        1.0 + (f64::from(remembered_count) + 1.0).ln() * 0.25
    }

    fn grade_factor(grade: u8) -> f64 {
        match grade {
            1 => 0.5,
            2 => 0.85,
            3 => 1.15,
            4 => 1.9,
            _ => 1.0,
        }
    }
}

impl Default for Zhuzhu {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for Zhuzhu {
    type Card = ZhuzhuCard;
    type Params = ZhuzhuParams;
    type Grade = ZhuzhuGrade;

    fn id(&self) -> &str {
        ids::ZHUZHU
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> ZhuzhuCard {
        match prior {
            None => ZhuzhuCard {
                due: now,
                last_review: None,
                thinking_time_ms: 0,
                remembered_count: 0,
            },
            Some(state) => ZhuzhuCard {
                due: state.next_remembered_at,
                last_review: state.last_remembered_at,
                thinking_time_ms: state.thinking_time_ms,
                remembered_count: state.remembered_count,
            },
        }
    }

    fn build_params(&self, profile: &LearnerProfile) -> Result<ZhuzhuParams, ScheduleError> {
        Ok(ZhuzhuParams {
            active_level: f64::from(profile.active_level) / 10.0,
            daily_budget_minutes: f64::from(profile.daily_budget_minutes),
        })
    }

    fn build_grade(&self, event: &ReviewEvent) -> ZhuzhuGrade {
        let grade = match event.hint_count {
            0 => 4,
            1 => 3,
            2 => 2,
            _ => 1,
        };
        ZhuzhuGrade {
            grade,
            thinking_time_ms: event.thinking_time_ms,
        }
    }

    fn handle(
        &self,
        grade: ZhuzhuGrade,
        card: ZhuzhuCard,
        params: &ZhuzhuParams,
        now: DateTime<Utc>,
    ) -> Result<ZhuzhuCard, ScheduleError> {
        let mut interval_minutes = BASE_MINUTES;

        interval_minutes += WEIGHT_THINKING_TIME
            * FIX_VALUE_MINUTES
            * Self::thinking_time_factor(&card, grade.thinking_time_ms);
        interval_minutes +=
            WEIGHT_ACTIVE_LEVEL * FIX_VALUE_MINUTES * Self::active_level_factor(params.active_level);
        interval_minutes +=
            WEIGHT_EXPERIENCE * FIX_VALUE_MINUTES * Self::experience_factor(card.remembered_count);
        interval_minutes += WEIGHT_GRADE * FIX_VALUE_MINUTES * Self::grade_factor(grade.grade);

        let min_minutes = params.daily_budget_minutes / 2.0;
        let interval_minutes = interval_minutes.clamp(min_minutes.min(MAX_MINUTES), MAX_MINUTES);

        Ok(ZhuzhuCard {
            due: now + duration_from_minutes(interval_minutes),
            // The old due time was the review that just happened.
            last_review: Some(card.due),
            thinking_time_ms: card.thinking_time_ms,
            remembered_count: card.remembered_count + 1,
        })
    }

    fn resolve(&self, card: ZhuzhuCard) -> StateDelta {
        StateDelta {
            next_remembered_at: Some(card.due),
            last_remembered_at: card.last_review,
            ..Default::default()
        }
    }
}
