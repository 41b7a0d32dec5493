//! Population-level batch training.
//!
//! Algorithms that keep per-user parameters (currently ARSS) are retrained
//! from review history by a periodic job. The loop here is paged and
//! bounded; one user's failure is logged and skipped, never aborting the
//! rest of the batch. `TrainingWorker` wires the loop to a cron schedule
//! with a single-flight guard, so a slow pass is skipped over, not stacked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::algorithm::AlgorithmRegistry;
use crate::error::ScheduleError;
use crate::model::{ReviewSample, TrainingOutcome};

/// Most recent history records fed to one user's training pass.
pub const HISTORY_WINDOW: u64 = 200;
/// Users fetched per page of the training loop.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
/// Hourly, at the top of the hour.
pub const DEFAULT_SCHEDULE: &str = "0 0 * * * *";

pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A user whose configured algorithm supports training.
#[derive(Debug, Clone)]
pub struct TrainableUser {
    pub user_id: String,
    /// Stability from the previous training pass, if any.
    pub stability: Option<f64>,
}

/// Persistence collaborator for the batch trainer. Implemented by the
/// storage layer; the engine never touches a database directly.
#[async_trait]
pub trait TrainingStore: Send + Sync {
    /// One page of users configured for `algorithm_id`, stable ordering.
    async fn trainable_users(
        &self,
        algorithm_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TrainableUser>, StoreError>;

    /// Up to `limit` most recent review samples for the user.
    async fn recent_history(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<ReviewSample>, StoreError>;

    /// Persists the trained stability and memory curve onto the profile.
    async fn save_outcome(
        &self,
        user_id: &str,
        outcome: &TrainingOutcome,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

/// What one `train_population` run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingReport {
    pub trained_users: u64,
    pub failed_users: u64,
}

/// Retrains every user configured for `algorithm_id`, page by page.
///
/// An explicit bounded loop with offset paging; terminates on the first
/// empty page. Store failures for a single user are isolated: logged,
/// counted, and skipped.
pub async fn train_population(
    registry: &AlgorithmRegistry,
    store: &dyn TrainingStore,
    algorithm_id: &str,
    page_size: u64,
) -> Result<TrainingReport, TrainingError> {
    let strategy = registry.get(algorithm_id)?;
    if !strategy.supports_training() {
        return Err(ScheduleError::TrainingUnsupported(algorithm_id.to_string()).into());
    }
    let page_size = page_size.max(1);

    let mut report = TrainingReport::default();
    let mut offset = 0u64;
    loop {
        let users = store
            .trainable_users(algorithm_id, offset, page_size)
            .await
            .map_err(TrainingError::Store)?;
        if users.is_empty() {
            break;
        }
        offset += users.len() as u64;

        for user in &users {
            let result = train_single_user(strategy, store, user).await;
            match result {
                Ok(outcome) => {
                    debug!(
                        user_id = user.user_id.as_str(),
                        stability = outcome.stability,
                        curve_len = outcome.memory_curve.len(),
                        "memory curve trained"
                    );
                    report.trained_users += 1;
                }
                Err(err) => {
                    // One user never takes down the batch.
                    error!(
                        user_id = user.user_id.as_str(),
                        error = %err,
                        "training failed for user, continuing"
                    );
                    report.failed_users += 1;
                }
            }
        }
    }

    info!(
        algorithm = algorithm_id,
        trained = report.trained_users,
        failed = report.failed_users,
        "population training finished"
    );
    Ok(report)
}

async fn train_single_user(
    strategy: &dyn crate::algorithm::ScheduleStrategy,
    store: &dyn TrainingStore,
    user: &TrainableUser,
) -> Result<TrainingOutcome, TrainingError> {
    let history = store
        .recent_history(&user.user_id, HISTORY_WINDOW)
        .await
        .map_err(TrainingError::Store)?;
    let outcome = strategy.train(&history, user.stability.unwrap_or(1.0))?;
    store
        .save_outcome(&user.user_id, &outcome)
        .await
        .map_err(TrainingError::Store)?;
    Ok(outcome)
}

#[derive(Debug, Clone)]
pub struct TrainingWorkerConfig {
    /// Six-field cron expression.
    pub schedule: String,
    pub algorithm_id: String,
    pub page_size: u64,
}

impl Default for TrainingWorkerConfig {
    fn default() -> Self {
        Self {
            schedule: DEFAULT_SCHEDULE.to_string(),
            algorithm_id: crate::algorithm::ids::ARSS.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Periodic driver for [`train_population`].
///
/// Single worker, no leader election: deploy one instance with the worker
/// enabled. The `running` flag makes overlapping ticks skip instead of
/// piling up.
pub struct TrainingWorker {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
    config: TrainingWorkerConfig,
    registry: Arc<AlgorithmRegistry>,
    store: Arc<dyn TrainingStore>,
}

impl TrainingWorker {
    pub async fn new(
        config: TrainingWorkerConfig,
        registry: Arc<AlgorithmRegistry>,
        store: Arc<dyn TrainingStore>,
    ) -> Result<Self, TrainingError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            config,
            registry,
            store,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn start(&self) -> Result<(), TrainingError> {
        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let algorithm_id = self.config.algorithm_id.clone();
        let page_size = self.config.page_size;
        let shutdown_rx = self.shutdown_tx.subscribe();

        let job = Job::new_async(self.config.schedule.as_str(), move |_uuid, _lock| {
            let registry = Arc::clone(&registry);
            let store = Arc::clone(&store);
            let running = Arc::clone(&running);
            let algorithm_id = algorithm_id.clone();
            let mut rx = shutdown_rx.resubscribe();
            Box::pin(async move {
                if running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    warn!("previous training run still in progress, skipping tick");
                    return;
                }
                tokio::select! {
                    _ = rx.recv() => {},
                    result = train_population(&registry, store.as_ref(), &algorithm_id, page_size) => {
                        if let Err(e) = result {
                            error!(error = %e, "training worker error");
                        }
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
        })?;

        let scheduler = self.scheduler.lock().await;
        scheduler.add(job).await?;
        scheduler.start().await?;
        info!(
            schedule = self.config.schedule.as_str(),
            algorithm = self.config.algorithm_id.as_str(),
            "training worker started"
        );
        Ok(())
    }

    pub async fn stop(&self) {
        info!("stopping training worker...");
        let _ = self.shutdown_tx.send(());
        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "error shutting down training scheduler");
        }
    }
}
