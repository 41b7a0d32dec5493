//! Core data model shared by every scheduling algorithm.
//!
//! `MemoryState` is the durable per-(user, item) record the storage layer
//! persists. Algorithms never mutate it directly: each review produces a
//! [`StateDelta`] that the scheduling service merges into a full new state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable memory record for one learning item of one user.
///
/// Algorithm-specific fields are optional: they stay `None` until the owning
/// algorithm has run at least once, and a strategy finding another strategy's
/// leftovers must fall back to its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Total completed reviews. Incremented by exactly one per scheduled
    /// review, centrally in [`SchedulingService`](crate::SchedulingService).
    pub remembered_count: u32,
    /// When the item is next due.
    pub next_remembered_at: DateTime<Utc>,
    /// Time of the previous review, if any.
    pub last_remembered_at: Option<DateTime<Utc>>,
    /// Hints used in the most recent review. 0 = perfect recall.
    pub curr_hint_count: u32,
    /// Cumulative hints across all reviews.
    pub hint_count: u32,
    /// Recall time of the most recent review, in milliseconds.
    /// 0 reads as instant recall.
    pub curr_thinking_time_ms: i64,
    /// Cumulative recall time, in milliseconds.
    pub thinking_time_ms: i64,
    /// First exposure time. Immutable.
    pub created_at: DateTime<Utc>,

    // SM-2 family
    pub ease_factor: Option<f64>,
    /// Consecutive successful reviews (reset/softened on failure).
    pub success_streak: Option<u32>,

    // Burst scheduler
    pub short_stage_index: Option<u32>,

    // Continuous stability/difficulty model
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,

    // FSRS family
    pub fsrs_stability: Option<f64>,
    pub fsrs_difficulty: Option<f64>,
    pub fsrs_lapses: Option<u32>,
    pub fsrs_state: Option<u8>,
    pub fsrs_learning_steps: Option<u32>,
}

impl MemoryState {
    /// Fresh record for an item added at `now`, before any review.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            remembered_count: 0,
            next_remembered_at: now,
            last_remembered_at: None,
            curr_hint_count: 0,
            hint_count: 0,
            curr_thinking_time_ms: 0,
            thinking_time_ms: 0,
            created_at: now,
            ease_factor: None,
            success_streak: None,
            short_stage_index: None,
            stability: None,
            difficulty: None,
            fsrs_stability: None,
            fsrs_difficulty: None,
            fsrs_lapses: None,
            fsrs_state: None,
            fsrs_learning_steps: None,
        }
    }

    /// Merges an algorithm's delta. Fields the algorithm did not touch keep
    /// their previous values.
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(v) = delta.next_remembered_at {
            self.next_remembered_at = v;
        }
        if let Some(v) = delta.last_remembered_at {
            self.last_remembered_at = Some(v);
        }
        if let Some(v) = delta.ease_factor {
            self.ease_factor = Some(v);
        }
        if let Some(v) = delta.success_streak {
            self.success_streak = Some(v);
        }
        if let Some(v) = delta.short_stage_index {
            self.short_stage_index = Some(v);
        }
        if let Some(v) = delta.stability {
            self.stability = Some(v);
        }
        if let Some(v) = delta.difficulty {
            self.difficulty = Some(v);
        }
        if let Some(v) = delta.fsrs_stability {
            self.fsrs_stability = Some(v);
        }
        if let Some(v) = delta.fsrs_difficulty {
            self.fsrs_difficulty = Some(v);
        }
        if let Some(v) = delta.fsrs_lapses {
            self.fsrs_lapses = Some(v);
        }
        if let Some(v) = delta.fsrs_state {
            self.fsrs_state = Some(v);
        }
        if let Some(v) = delta.fsrs_learning_steps {
            self.fsrs_learning_steps = Some(v);
        }
    }
}

/// The fields one review changed. Produced by a strategy's `resolve`, merged
/// by the service; a `None` means "not owned by this algorithm, leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub next_remembered_at: Option<DateTime<Utc>>,
    pub last_remembered_at: Option<DateTime<Utc>>,
    pub ease_factor: Option<f64>,
    pub success_streak: Option<u32>,
    pub short_stage_index: Option<u32>,
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    pub fsrs_stability: Option<f64>,
    pub fsrs_difficulty: Option<f64>,
    pub fsrs_lapses: Option<u32>,
    pub fsrs_state: Option<u8>,
    pub fsrs_learning_steps: Option<u32>,
}

/// One review as reported by the client layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    /// Hints used in this review. 0 = perfect recall.
    pub hint_count: u32,
    /// Time spent recalling, in milliseconds.
    pub thinking_time_ms: i64,
}

/// The slice of the user profile the engine consumes. Owned by the
/// user-profile store; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    /// Identifier of the configured scheduling algorithm.
    pub algorithm: String,
    /// Desired recall probability at the next review, percent (0-100).
    pub target_retention: u8,
    /// Engagement score, 0-100. 50 is neutral.
    pub active_level: u8,
    /// Daily study budget in minutes.
    pub daily_budget_minutes: u32,
    /// User-level memory stability trained by the batch job, in days.
    pub stability: Option<f64>,
}

impl LearnerProfile {
    /// Target retention as a probability.
    pub fn target_retention_ratio(&self) -> f64 {
        f64::from(self.target_retention) / 100.0
    }
}

/// Result of one population-training pass for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingOutcome {
    /// Updated user-level stability, in days.
    pub stability: f64,
    /// Recall-probability samples for t = 0..=30 days.
    pub memory_curve: Vec<f64>,
}

/// One historical review as fed to batch training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSample {
    /// When the review happened (the record's scheduled time at review).
    pub remembered_at: DateTime<Utc>,
    /// First exposure of the item.
    pub created_at: DateTime<Utc>,
    /// Hints used in that review.
    pub curr_hint_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn fresh_state_has_no_algorithm_fields() {
        let state = MemoryState::fresh(now());
        assert_eq!(state.remembered_count, 0);
        assert_eq!(state.next_remembered_at, now());
        assert!(state.last_remembered_at.is_none());
        assert!(state.ease_factor.is_none());
        assert!(state.stability.is_none());
        assert!(state.fsrs_stability.is_none());
    }

    #[test]
    fn apply_merges_only_touched_fields() {
        let mut state = MemoryState::fresh(now());
        state.ease_factor = Some(2.5);
        state.apply(StateDelta {
            stability: Some(3.0),
            ..Default::default()
        });
        assert_eq!(state.stability, Some(3.0));
        assert_eq!(state.ease_factor, Some(2.5));
    }

    #[test]
    fn memory_state_serde_round_trip() {
        let mut state = MemoryState::fresh(now());
        state.remembered_count = 4;
        state.ease_factor = Some(2.36);
        state.fsrs_state = Some(2);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("rememberedCount"));
        assert!(json.contains("easeFactor"));
        let back: MemoryState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
