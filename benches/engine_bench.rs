//! Benchmark suite for the scheduling engine.
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use recall_engine::{ids, LearnerProfile, ReviewEvent, SchedulingService};

fn profile(algorithm: &str) -> LearnerProfile {
    LearnerProfile {
        algorithm: algorithm.to_string(),
        target_retention: 90,
        active_level: 50,
        daily_budget_minutes: 30,
        stability: Some(1.5),
    }
}

fn bench_schedule_review(c: &mut Criterion) {
    let service = SchedulingService::with_defaults();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let event = ReviewEvent {
        hint_count: 1,
        thinking_time_ms: 2_000,
    };

    for id in [ids::SM2, ids::FSRS, ids::SMC, ids::ZHUZHU] {
        let p = profile(id);
        let prior = service.schedule_review(None, &event, &p, now).unwrap();
        let at = prior.next_remembered_at;
        c.bench_function(&format!("schedule_review/{id}"), |b| {
            b.iter(|| {
                service
                    .schedule_review(Some(&prior), &event, &p, at)
                    .unwrap()
            })
        });
    }
}

criterion_group!(benches, bench_schedule_review);
criterion_main!(benches);
