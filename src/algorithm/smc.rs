//! SMC: continuous stability/difficulty model, SuperMemo-18 inspired.
//!
//! Tracks a per-item difficulty in [1, 99] and a stability in days. Bucketed
//! piecewise tables (indexed by the integer part of difficulty) supply the
//! initial stability, the Weibull decay exponent, and the stability-increase
//! multiplier per grade. A surprise factor rewards recall that beats the
//! model's expectation; an engagement multiplier bends everything toward the
//! learner's current activity.
//!
//! SMZ is the same engine registered under a second identifier, kept as a
//! divergence point for future tuning.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::algorithm::{days_between, duration_from_days, ids, Algorithm, MAX_INTERVAL_DAYS};
use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent, StateDelta};

pub const BUCKETS: usize = 100;
pub const DEFAULT_DIFFICULTY: f64 = 50.0;
/// Floor keeping a corrupted zero stability from producing a non-positive
/// interval.
const MIN_STABILITY: f64 = 0.01;

/// Difficulty tiers: 0-19 / 20-49 / 50-79 / 80-99.
///
/// Initial stability in days for a first exposure in each tier.
pub fn initial_stability(bucket: usize) -> f64 {
    match bucket {
        0..=19 => 1.0,
        20..=49 => 2.0,
        50..=79 => 4.0,
        _ => 6.0,
    }
}

/// Decay-shape exponent of the forgetting curve per tier.
pub fn decay_exponent(bucket: usize) -> f64 {
    match bucket {
        0..=19 => 0.45,
        20..=49 => 0.65,
        50..=79 => 0.85,
        _ => 1.1,
    }
}

/// Expected stability-growth multiplier for a successful review.
/// Easier buckets (higher index is harder) grow slower.
pub fn stability_increase(bucket: usize, grade: u32) -> f64 {
    const BASE: [f64; 6] = [0.0, 1.5, 2.8, 5.0, 9.0, 15.0];
    let grade = (grade as usize).min(5);
    BASE[grade] * (1.0 + (99 - bucket.min(99)) as f64 / 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmcCard {
    pub difficulty: f64,
    pub stability: f64,
    pub remembered_count: u32,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SmcParams {
    pub target_retention: f64,
    /// Engagement score on the 0-10 scale.
    pub active_level: f64,
}

pub struct Smc {
    id: &'static str,
}

impl Smc {
    pub fn smc() -> Self {
        Self { id: ids::SMC }
    }

    pub fn smz() -> Self {
        Self { id: ids::SMZ }
    }

    fn bucket(difficulty: f64) -> usize {
        (difficulty.floor() as isize).clamp(0, BUCKETS as isize - 1) as usize
    }

    /// Weibull-shaped recall probability. Edge rules: 1 at zero elapsed,
    /// 0 for invalid stability with positive elapsed.
    fn retrievability(days_elapsed: f64, stability: f64, p: f64) -> f64 {
        let days_elapsed = if days_elapsed.is_finite() {
            days_elapsed.max(0.0)
        } else {
            0.0
        };
        if !stability.is_finite() || stability <= 0.0 {
            return if days_elapsed == 0.0 { 1.0 } else { 0.0 };
        }
        let ratio = days_elapsed / stability;
        (-ratio.powf(p)).exp()
    }

    /// Engagement multiplier on a 0-10 activity score, neutral at 5.5.
    fn mood_multiplier(score: f64) -> f64 {
        (1.0 + 0.43 * (1.2 * (score - 5.5)).tanh()).clamp(0.68, 1.45)
    }
}

impl Algorithm for Smc {
    type Card = SmcCard;
    type Params = SmcParams;
    /// grade = clamp(5 - hint count, 0, 5); 5 is a perfect recall.
    type Grade = u32;

    fn id(&self) -> &str {
        self.id
    }

    fn build(&self, prior: Option<&MemoryState>, now: DateTime<Utc>) -> SmcCard {
        match prior {
            None => SmcCard {
                difficulty: DEFAULT_DIFFICULTY,
                stability: 0.0,
                remembered_count: 0,
                due: now,
                last_review: None,
            },
            Some(state) => SmcCard {
                difficulty: state.difficulty.unwrap_or(DEFAULT_DIFFICULTY).clamp(1.0, 99.0),
                stability: state.stability.unwrap_or(0.0),
                remembered_count: state.remembered_count,
                due: state.next_remembered_at,
                last_review: state.last_remembered_at,
            },
        }
    }

    fn build_params(&self, profile: &LearnerProfile) -> Result<SmcParams, ScheduleError> {
        let retention = profile.target_retention_ratio();
        if retention <= 0.0 || retention >= 1.0 {
            return Err(ScheduleError::InvalidTargetRetention(retention));
        }
        Ok(SmcParams {
            target_retention: retention,
            active_level: f64::from(profile.active_level) / 10.0,
        })
    }

    fn build_grade(&self, event: &ReviewEvent) -> u32 {
        5u32.saturating_sub(event.hint_count)
    }

    fn handle(
        &self,
        grade: u32,
        card: SmcCard,
        params: &SmcParams,
        now: DateTime<Utc>,
    ) -> Result<SmcCard, ScheduleError> {
        let mut difficulty = card.difficulty.clamp(1.0, 99.0);
        let bucket = Self::bucket(difficulty);
        let p = decay_exponent(bucket);

        let days_elapsed = card
            .last_review
            .map(|last| days_between(now, last).max(0.1))
            .unwrap_or(0.0);

        let actual_r = if card.remembered_count > 0 && card.last_review.is_some() {
            Self::retrievability(days_elapsed, card.stability, p)
        } else {
            0.0
        };

        // Difficulty drifts toward the observed forgetting; adaptation slows
        // once enough reviews have accumulated. Skipped on first exposure.
        if card.remembered_count > 0 {
            let w = if card.remembered_count > 30 { 0.06 } else { 0.12 };
            difficulty = (difficulty * (1.0 - w) + (1.0 - actual_r) * 100.0 * w).clamp(1.0, 99.0);
        }

        let mut new_stability = if card.remembered_count == 0 {
            // First exposure: a damped share of the bucket's initial value.
            let s = (initial_stability(bucket) * 0.7).max(0.5);
            debug!(stability = s, "smc first review");
            s
        } else if card.remembered_count == 1 {
            let multiplier = match grade {
                5 => 1.8,
                4 => 1.2,
                3 => 0.7,
                _ => 0.4,
            };
            let s = (initial_stability(bucket) * multiplier).max(1.0);
            debug!(stability = s, "smc second review");
            s
        } else if grade < 3 {
            // Failure: smooth decay, never a full reset.
            let s = card.stability * (0.9 - 0.8 * actual_r).clamp(0.3, 0.99);
            debug!(stability = s, "smc failed review");
            s
        } else {
            // Success: table growth scaled by how much the recall beat the
            // expectation from the previously scheduled interval.
            let expected_days = match card.last_review {
                Some(last) if card.due > last => days_between(card.due, last).max(0.1),
                _ => card.stability,
            };
            let expected_r = Self::retrievability(expected_days, card.stability, p);
            let delta_r = actual_r - expected_r;
            let surprise = if delta_r > 0.15 {
                1.0 + 2.0 * delta_r
            } else if delta_r > 0.05 {
                1.0 + 0.8 * delta_r
            } else if delta_r < -0.1 {
                (0.9 + delta_r).max(0.7)
            } else {
                1.0
            };
            let s = card.stability * stability_increase(bucket, grade).max(1.0) * surprise;
            debug!(stability = s, surprise, "smc successful review");
            s
        };

        new_stability = (new_stability * Self::mood_multiplier(params.active_level)).max(MIN_STABILITY);

        let interval_days = (new_stability * (-params.target_retention.ln()).powf(1.0 / p))
            .min(MAX_INTERVAL_DAYS);

        Ok(SmcCard {
            difficulty,
            stability: new_stability,
            remembered_count: card.remembered_count,
            due: now + duration_from_days(interval_days),
            last_review: Some(now),
        })
    }

    fn resolve(&self, card: SmcCard) -> StateDelta {
        StateDelta {
            difficulty: Some(card.difficulty),
            stability: Some(card.stability),
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

    fn params() -> SmcParams {
        SmcParams {
            target_retention: 0.9,
            active_level: 5.5,
        }
    }

    #[test]
    fn bucket_tiers_have_the_documented_boundaries() {
        assert_eq!(initial_stability(0), 1.0);
        assert_eq!(initial_stability(19), 1.0);
        assert_eq!(initial_stability(20), 2.0);
        assert_eq!(initial_stability(49), 2.0);
        assert_eq!(initial_stability(50), 4.0);
        assert_eq!(initial_stability(79), 4.0);
        assert_eq!(initial_stability(80), 6.0);
        assert_eq!(initial_stability(99), 6.0);

        assert_eq!(decay_exponent(19), 0.45);
        assert_eq!(decay_exponent(20), 0.65);
        assert_eq!(decay_exponent(50), 0.85);
        assert_eq!(decay_exponent(80), 1.1);
    }

    #[test]
    fn stability_increase_scales_with_bucket_and_grade() {
        // Bucket 0 doubles the base; bucket 99 leaves it as-is.
        assert!((stability_increase(0, 3) - 10.0).abs() < 1e-9);
        assert!((stability_increase(99, 3) - 5.0).abs() < 1e-9);
        assert_eq!(stability_increase(10, 0), 0.0);
        assert!(stability_increase(10, 5) > stability_increase(10, 4));
    }

    #[test]
    fn retrievability_edge_rules() {
        assert_eq!(Smc::retrievability(0.0, 0.0, 0.65), 1.0);
        assert_eq!(Smc::retrievability(3.0, 0.0, 0.65), 0.0);
        assert_eq!(Smc::retrievability(3.0, f64::NAN, 0.65), 0.0);
        let r = Smc::retrievability(2.0, 4.0, 0.65);
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn mood_multiplier_is_neutral_at_midpoint_and_clamped() {
        assert!((Smc::mood_multiplier(5.5) - 1.0).abs() < 1e-9);
        assert_eq!(Smc::mood_multiplier(0.0), 0.68);
        assert_eq!(Smc::mood_multiplier(10.0), 1.45);
    }

    #[test]
    fn grade_mapping_inverts_hint_count() {
        let algo = Smc::smc();
        let grade = |hint_count| {
            algo.build_grade(&ReviewEvent {
                hint_count,
                thinking_time_ms: 0,
            })
        };
        assert_eq!(grade(0), 5);
        assert_eq!(grade(2), 3);
        assert_eq!(grade(5), 0);
        assert_eq!(grade(9), 0);
    }

    #[test]
    fn first_review_uses_damped_initial_stability() {
        let algo = Smc::smc();
        let card = algo.build(None, now());
        let next = algo.handle(5, card, &params(), now()).unwrap();
        // Default difficulty 50 -> bucket 50 -> init 4.0 * 0.7 = 2.8.
        assert!((next.stability - 2.8).abs() < 1e-9);
        assert!((next.difficulty - DEFAULT_DIFFICULTY).abs() < 1e-9);
        assert!(next.due > now());
    }

    #[test]
    fn second_review_multiplier_depends_on_grade() {
        let algo = Smc::smc();
        let base = SmcCard {
            difficulty: 50.0,
            stability: 2.8,
            remembered_count: 1,
            due: now(),
            last_review: Some(now() - Duration::days(2)),
        };
        let perfect = algo.handle(5, base.clone(), &params(), now()).unwrap();
        let poor = algo.handle(2, base, &params(), now()).unwrap();
        assert!(perfect.stability > poor.stability);
        // Poor second review floors at 1 day.
        assert!(poor.stability >= 1.0 * 0.68);
    }

    #[test]
    fn failure_decays_stability_smoothly() {
        let algo = Smc::smc();
        let card = SmcCard {
            difficulty: 50.0,
            stability: 10.0,
            remembered_count: 5,
            due: now(),
            last_review: Some(now() - Duration::days(5)),
        };
        let next = algo.handle(1, card.clone(), &params(), now()).unwrap();
        assert!(next.stability < card.stability);
        // The decay multiplier never drops below 0.3 of the old stability
        // (before the mood multiplier).
        assert!(next.stability >= card.stability * 0.3 * 0.68 - 1e-9);
    }

    #[test]
    fn late_successful_recall_earns_a_surprise_reward() {
        let algo = Smc::smc();
        // Scheduled 2 days out but reviewed after 10: recall beat the model.
        let overdue = SmcCard {
            difficulty: 30.0,
            stability: 8.0,
            remembered_count: 4,
            due: now() - Duration::days(8),
            last_review: Some(now() - Duration::days(10)),
        };
        let on_time = SmcCard {
            due: now(),
            last_review: Some(now() - Duration::days(2)),
            ..overdue.clone()
        };
        let next_overdue = algo.handle(5, overdue, &params(), now()).unwrap();
        let next_on_time = algo.handle(5, on_time, &params(), now()).unwrap();
        assert!(next_overdue.stability < next_on_time.stability * 2.0);
        assert!(next_overdue.stability > 0.0 && next_on_time.stability > 0.0);
    }

    #[test]
    fn difficulty_stays_in_bounds_under_long_streaks() {
        let algo = Smc::smc();
        let mut card = algo.build(None, now());
        let mut t = now();
        for i in 0..200 {
            let grade = if i % 4 == 0 { 1 } else { 5 };
            card = algo.handle(grade, card, &params(), t).unwrap();
            assert!((1.0..=99.0).contains(&card.difficulty));
            card.remembered_count += 1;
            t = card.due;
        }
    }

    #[test]
    fn corrupted_zero_stability_still_schedules_forward() {
        let algo = Smc::smc();
        let card = SmcCard {
            difficulty: 50.0,
            stability: 0.0,
            remembered_count: 7,
            due: now(),
            last_review: Some(now() - Duration::days(3)),
        };
        let next = algo.handle(5, card, &params(), now()).unwrap();
        assert!(next.due > now());
        assert!(next.stability > 0.0);
    }

    #[test]
    fn smz_shares_the_engine_under_its_own_id() {
        let smc = Smc::smc();
        let smz = Smc::smz();
        assert_eq!(Algorithm::id(&smc), "smc");
        assert_eq!(Algorithm::id(&smz), "smz");
        let card = smz.build(None, now());
        let a = smc.handle(5, card.clone(), &params(), now()).unwrap();
        let b = smz.handle(5, card, &params(), now()).unwrap();
        assert_eq!(a, b);
    }
}
