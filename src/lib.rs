//! # recall-engine
//!
//! Spaced-repetition scheduling core for a language-learning backend: given
//! a learner's review history and per-user parameters, decide how
//! retrievable an item currently is, how its durable memory state changes
//! after a review, and when it should next be shown.
//!
//! The crate is a library with no transport or persistence of its own; the
//! HTTP layer supplies [`MemoryState`] and [`LearnerProfile`] values and
//! persists what comes back.
//!
//! ## Modules
//!
//! - [`model`] - the durable memory record and the engine's inputs/outputs
//! - [`algorithm`] - the strategy contract, the registry, and the family of
//!   interchangeable scheduling algorithms (SM-2, ASM+, FSRS, the
//!   short-term burst ladder, ARSS, SMC/SMZ, Zhuzhu)
//! - [`fsrs`] - the card-based FSRS engine behind the FSRS strategies
//! - [`service`] - per-review orchestration ([`SchedulingService`])
//! - [`training`] - paged population training and its periodic worker
//!
//! ## Scheduling one review
//!
//! ```rust
//! use chrono::Utc;
//! use recall_engine::{LearnerProfile, ReviewEvent, SchedulingService};
//!
//! let service = SchedulingService::with_defaults();
//! let profile = LearnerProfile {
//!     algorithm: "sm2".to_string(),
//!     target_retention: 90,
//!     active_level: 50,
//!     daily_budget_minutes: 30,
//!     stability: None,
//! };
//! let event = ReviewEvent { hint_count: 0, thinking_time_ms: 2300 };
//!
//! let state = service
//!     .schedule_review(None, &event, &profile, Utc::now())
//!     .unwrap();
//! assert_eq!(state.remembered_count, 1);
//! assert!(state.next_remembered_at > Utc::now());
//! ```

pub mod algorithm;
pub mod error;
pub mod fsrs;
pub mod model;
pub mod service;
pub mod training;

pub use algorithm::{ids, Algorithm, AlgorithmRegistry, ScheduleStrategy};
pub use error::ScheduleError;
pub use model::{
    LearnerProfile, MemoryState, ReviewEvent, ReviewSample, StateDelta, TrainingOutcome,
};
pub use service::SchedulingService;
pub use training::{
    train_population, TrainableUser, TrainingError, TrainingReport, TrainingStore, TrainingWorker,
    TrainingWorkerConfig,
};
