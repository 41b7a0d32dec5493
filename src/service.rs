//! Review orchestration.
//!
//! `SchedulingService` owns the one semantic operation the outer layers
//! call per review: resolve the user's algorithm, run its pipeline, and
//! merge the resulting delta into a full new `MemoryState` ready to
//! persist. Shared bookkeeping (review count, hint and thinking-time
//! accumulation) lives here so every algorithm gets it identically.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::algorithm::AlgorithmRegistry;
use crate::error::ScheduleError;
use crate::model::{LearnerProfile, MemoryState, ReviewEvent};

pub struct SchedulingService {
    registry: AlgorithmRegistry,
}

impl SchedulingService {
    pub fn new(registry: AlgorithmRegistry) -> Self {
        Self { registry }
    }

    /// Service over the full production algorithm family.
    pub fn with_defaults() -> Self {
        Self::new(AlgorithmRegistry::with_defaults())
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// Schedules one review: computes the item's new memory state and its
    /// next due time from the prior state, the review event, and the user's
    /// settings.
    ///
    /// Pure except for tracing; concurrent reviews of the same (user, item)
    /// must be serialized at the persistence boundary, since the read of
    /// `prior` and the write of the result are not atomic here.
    pub fn schedule_review(
        &self,
        prior: Option<&MemoryState>,
        event: &ReviewEvent,
        profile: &LearnerProfile,
        now: DateTime<Utc>,
    ) -> Result<MemoryState, ScheduleError> {
        let strategy = self.registry.get(&profile.algorithm)?;
        let delta = strategy.schedule(prior, event, profile, now)?;

        let mut state = match prior {
            Some(state) => state.clone(),
            None => MemoryState::fresh(now),
        };
        state.remembered_count += 1;
        state.curr_hint_count = event.hint_count;
        state.hint_count += event.hint_count;
        state.curr_thinking_time_ms = event.thinking_time_ms;
        state.thinking_time_ms += event.thinking_time_ms;
        state.apply(delta);

        debug!(
            algorithm = profile.algorithm.as_str(),
            remembered_count = state.remembered_count,
            next_due = %state.next_remembered_at,
            "review scheduled"
        );
        Ok(state)
    }
}

impl Default for SchedulingService {
    fn default() -> Self {
        Self::with_defaults()
    }
}
