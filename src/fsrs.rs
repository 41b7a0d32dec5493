//! FSRS scheduling engine (DSR model: difficulty, stability, retrievability).
//!
//! Card-based engine behind the `fsrs`/`fsrsst` strategies. The long-term
//! path schedules whole-day intervals from the power-law forgetting curve;
//! the short-term path adds an intra-day learning-step ladder. Fuzzing is
//! deterministic: the jitter is seeded from the card and the review instant,
//! so scheduling stays a pure function of its inputs.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;
const MINUTES_PER_DAY: f64 = 1440.0;

/// Intra-day steps for cards in `Learning`, minutes.
const LEARNING_STEPS_MIN: [f64; 2] = [1.0, 10.0];
/// Intra-day steps for cards in `Relearning`, minutes.
const RELEARNING_STEPS_MIN: [f64; 1] = [10.0];
/// A `Hard` answer holds the current step for this long.
const HARD_STEP_MIN: f64 = 5.0;

/// Interval bands and their fuzz amplitude.
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::MAX, 0.05),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsrsParams {
    /// Desired recall probability at the next review.
    pub request_retention: f64,
    pub maximum_interval_days: f64,
    pub enable_fuzz: bool,
    /// Switches on the intra-day learning-step ladder.
    pub enable_short_term: bool,
    pub w: [f64; 17],
}

impl Default for FsrsParams {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval_days: 36500.0,
            enable_fuzz: false,
            enable_short_term: false,
            w: [
                0.4, 0.6, 2.4, 5.8, // w0-w3: initial stability
                4.93, 0.94, 0.86, 0.01, 1.49, // w4-w8
                0.14, 0.94, 2.18, 0.05, 0.34, // w9-w13
                1.26, 0.29, 2.61, // w14-w16
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    New = 0,
    Learning = 1,
    Review = 2,
    Relearning = 3,
}

impl CardState {
    /// Decodes a persisted discriminant. Unknown values read as `Review`,
    /// the only state a long-lived record can reasonably be in.
    pub fn from_repr(value: u8) -> Self {
        match value {
            0 => Self::New,
            1 => Self::Learning,
            3 => Self::Relearning,
            _ => Self::Review,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FsrsCard {
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
    pub stability: f64,
    /// Internal difficulty scale 0.1..=1.0.
    pub difficulty: f64,
    pub elapsed_days: f64,
    pub scheduled_days: f64,
    pub reps: u32,
    pub lapses: u32,
    pub state: CardState,
    pub learning_steps: u32,
}

impl FsrsCard {
    /// Empty card for an item that has never been reviewed under FSRS.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            due: now,
            last_review: None,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            state: CardState::New,
            learning_steps: 0,
        }
    }
}

/// Current recall probability after `elapsed_days` at `stability`.
pub fn retrievability(stability: f64, elapsed_days: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    let safe_elapsed = elapsed_days.max(0.0);
    (1.0 + FACTOR * safe_elapsed / stability).powf(DECAY)
}

/// Advances a card by one review. Pure: same card, rating, params and
/// instant always yield the same result.
pub fn next_card(
    card: &FsrsCard,
    rating: Rating,
    params: &FsrsParams,
    now: DateTime<Utc>,
) -> FsrsCard {
    let mut next = card.clone();
    next.reps = card.reps + 1;
    next.last_review = Some(now);
    next.elapsed_days = card.elapsed_days.max(0.0);

    match card.state {
        CardState::New => {
            next.stability = initial_stability(&params.w, rating);
            next.difficulty = initial_difficulty(&params.w, rating);
            if rating == Rating::Again {
                next.lapses = card.lapses + 1;
            }
            if params.enable_short_term && rating != Rating::Easy {
                match rating {
                    Rating::Again => {
                        next.learning_steps = 0;
                        short_step(&mut next, CardState::Learning, LEARNING_STEPS_MIN[0], now);
                    }
                    Rating::Hard => {
                        next.learning_steps = 0;
                        short_step(&mut next, CardState::Learning, HARD_STEP_MIN, now);
                    }
                    _ => {
                        next.learning_steps = 1;
                        short_step(&mut next, CardState::Learning, LEARNING_STEPS_MIN[1], now);
                    }
                }
            } else {
                graduate(&mut next, params, now);
            }
        }
        CardState::Learning | CardState::Relearning if params.enable_short_term => {
            let r = retrievability(card.stability, card.elapsed_days);
            next.difficulty = next_difficulty(&params.w, card.difficulty, rating);
            match rating {
                Rating::Again => {
                    next.stability =
                        next_forget_stability(&params.w, card.difficulty, card.stability, r);
                    next.lapses = card.lapses + 1;
                    next.learning_steps = 0;
                    let first = match card.state {
                        CardState::Relearning => RELEARNING_STEPS_MIN[0],
                        _ => LEARNING_STEPS_MIN[0],
                    };
                    short_step(&mut next, card.state, first, now);
                }
                Rating::Hard => {
                    next.stability = next_recall_stability(
                        &params.w,
                        card.difficulty,
                        card.stability,
                        r,
                        rating,
                    );
                    short_step(&mut next, card.state, HARD_STEP_MIN, now);
                }
                Rating::Good => {
                    next.stability = next_recall_stability(
                        &params.w,
                        card.difficulty,
                        card.stability,
                        r,
                        rating,
                    );
                    let ladder: &[f64] = match card.state {
                        CardState::Relearning => &RELEARNING_STEPS_MIN,
                        _ => &LEARNING_STEPS_MIN,
                    };
                    let step = card.learning_steps as usize + 1;
                    if step < ladder.len() {
                        next.learning_steps = step as u32;
                        short_step(&mut next, card.state, ladder[step], now);
                    } else {
                        graduate(&mut next, params, now);
                    }
                }
                Rating::Easy => {
                    next.stability = next_recall_stability(
                        &params.w,
                        card.difficulty,
                        card.stability,
                        r,
                        rating,
                    );
                    graduate(&mut next, params, now);
                }
            }
        }
        // Review, plus any learning leftovers under a long-term profile.
        _ => {
            let r = retrievability(card.stability, card.elapsed_days);
            next.difficulty = next_difficulty(&params.w, card.difficulty, rating);
            if rating == Rating::Again {
                next.stability =
                    next_forget_stability(&params.w, card.difficulty, card.stability, r);
                next.lapses = card.lapses + 1;
                if params.enable_short_term {
                    next.learning_steps = 0;
                    short_step(&mut next, CardState::Relearning, RELEARNING_STEPS_MIN[0], now);
                } else {
                    graduate(&mut next, params, now);
                }
            } else {
                next.stability =
                    next_recall_stability(&params.w, card.difficulty, card.stability, r, rating);
                graduate(&mut next, params, now);
            }
        }
    }

    next
}

fn short_step(next: &mut FsrsCard, state: CardState, minutes: f64, now: DateTime<Utc>) {
    next.state = state;
    next.scheduled_days = minutes / MINUTES_PER_DAY;
    next.due = now + Duration::milliseconds((minutes * 60_000.0) as i64);
}

fn graduate(next: &mut FsrsCard, params: &FsrsParams, now: DateTime<Utc>) {
    next.state = CardState::Review;
    next.learning_steps = 0;
    let raw = next_interval(
        next.stability,
        params.request_retention,
        params.maximum_interval_days,
    );
    let days = if params.enable_fuzz {
        fuzzed_interval(raw, fuzz_seed(next, now), params.maximum_interval_days)
    } else {
        raw.round().max(1.0)
    };
    next.scheduled_days = days;
    next.due = now + Duration::days(days as i64);
}

fn initial_stability(w: &[f64; 17], rating: Rating) -> f64 {
    w[rating as usize - 1].max(0.1)
}

fn initial_difficulty(w: &[f64; 17], rating: Rating) -> f64 {
    let d = w[4] - (rating as i32 - 3) as f64 * w[5];
    d.clamp(1.0, 10.0) / 10.0
}

fn next_difficulty(w: &[f64; 17], d: f64, rating: Rating) -> f64 {
    let d_10 = d * 10.0;
    let delta = -(rating as i32 - 3) as f64;
    let d_new = d_10 + w[6] * delta;
    let d_mean = w[7] * (w[4] - 3.0 * w[5]) + (1.0 - w[7]) * d_new;
    (d_mean.clamp(1.0, 10.0)) / 10.0
}

fn next_recall_stability(w: &[f64; 17], d: f64, s: f64, r: f64, rating: Rating) -> f64 {
    let d_10 = d * 10.0;
    let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };

    let new_s = s
        * (1.0
            + w[8].exp()
                * (11.0 - d_10)
                * s.powf(-w[9])
                * ((1.0 - r) * w[10]).exp_m1()
                * hard_penalty
                * easy_bonus);
    new_s.max(0.1)
}

fn next_forget_stability(w: &[f64; 17], d: f64, s: f64, r: f64) -> f64 {
    let d_10 = d * 10.0;
    let new_s =
        w[11] * d_10.powf(-w[12]) * ((s + 1.0).powf(w[13]) - 1.0) * (1.0 - r).powf(w[14]).exp();
    new_s.clamp(0.1, s.max(0.1))
}

fn next_interval(stability: f64, desired_retention: f64, max_days: f64) -> f64 {
    let safe_retention = desired_retention.clamp(0.0001, 0.9999);
    let interval = stability / FACTOR * (safe_retention.powf(1.0 / DECAY) - 1.0);
    interval.clamp(1.0, max_days)
}

fn fuzz_seed(card: &FsrsCard, now: DateTime<Utc>) -> u64 {
    (u64::from(card.reps) << 32)
        ^ card.stability.to_bits()
        ^ now.timestamp_millis() as u64
}

fn fuzzed_interval(interval: f64, seed: u64, max_days: f64) -> f64 {
    if interval < 2.5 {
        return interval.round().max(1.0);
    }
    let mut delta = 1.0;
    for (start, end, factor) in FUZZ_RANGES {
        delta += factor * (interval.min(end) - start).max(0.0);
    }
    let max_ivl = (interval + delta).round().min(max_days).max(2.0);
    let min_ivl = (interval - delta).round().clamp(2.0, max_ivl);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.gen_range(min_ivl as i64..=max_ivl as i64) as f64
}
