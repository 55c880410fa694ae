//! Process-wide job registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

use rboard_models::{JobId, JobKind, JobRecord};

use crate::error::{JobsError, JobsResult};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// How long terminal jobs are retained for slow pollers
    pub retention: Duration,
    /// Interval between eviction sweeps
    pub sweep_interval: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl JobsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            retention: Duration::from_secs(
                std::env::var("JOB_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("JOB_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// In-memory job registry with timed eviction of terminal records.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    config: JobsConfig,
}

impl JobRegistry {
    pub fn new(config: JobsConfig) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(JobsConfig::from_env())
    }

    /// Insert a new processing job and return the handle that owns its
    /// transitions.
    pub async fn submit(self: &Arc<Self>, kind: JobKind) -> JobHandle {
        let record = JobRecord::new(kind);
        let id = record.id.clone();
        self.jobs.write().await.insert(id.clone(), record);
        info!("Submitted {} job {}", kind.as_str(), id);
        JobHandle {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Poll a job by id. Terminal jobs keep returning the same record until
    /// evicted; unknown ids are a NotFound condition.
    pub async fn poll(&self, id: &JobId) -> JobsResult<JobRecord> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobsError::not_found(id.as_str()))
    }

    /// Number of jobs currently tracked.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Number of non-terminal jobs.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| !j.state.is_terminal())
            .count()
    }

    /// Evict terminal jobs older than the retention window. Returns the
    /// number evicted. Eviction is unconditional time-based cleanup.
    pub async fn evict_expired(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.retention)
                .unwrap_or_else(|_| chrono::Duration::seconds(600));

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| match job.completed_at {
            Some(completed_at) if job.state.is_terminal() => completed_at > cutoff,
            _ => true,
        });
        before - jobs.len()
    }

    /// Run the eviction sweeper. Spawn as a background task; runs until the
    /// process exits.
    pub async fn run_sweeper(self: Arc<Self>) {
        info!(
            "Starting job sweeper (interval: {:?}, retention: {:?})",
            self.config.sweep_interval, self.config.retention
        );

        let mut ticker = interval(self.config.sweep_interval);
        loop {
            ticker.tick().await;
            let evicted = self.evict_expired().await;
            if evicted > 0 {
                info!("Evicted {} expired job records", evicted);
            }
        }
    }

    async fn transition<F>(&self, id: &JobId, apply: F)
    where
        F: FnOnce(&mut JobRecord) -> bool,
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(record) => {
                if !apply(record) {
                    warn!("Ignored duplicate terminal transition for job {}", id);
                }
            }
            None => warn!("Transition for evicted job {} dropped", id),
        }
    }
}

/// Owner handle for one job.
///
/// Not `Clone`, and terminal transitions consume it: the task that submitted
/// the job is the only writer, and exactly one terminal transition can
/// happen. The record-level state check is a second guard.
pub struct JobHandle {
    id: JobId,
    registry: Arc<JobRegistry>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Update progress on the live job.
    pub async fn progress(&self, progress: u8, message: impl Into<String>) {
        let message = message.into();
        debug!("Job {} progress {}: {}", self.id, progress, message);
        self.registry
            .transition(&self.id, |record| {
                if record.state.is_terminal() {
                    return false;
                }
                record.set_progress(progress, Some(message));
                true
            })
            .await;
    }

    /// Complete the job with a result payload.
    pub async fn complete(self, data: Option<serde_json::Value>) {
        info!("Job {} completed", self.id);
        self.registry
            .transition(&self.id, |record| record.complete(data))
            .await;
    }

    /// Fail the job with an error message.
    pub async fn fail(self, error: impl Into<String>) {
        let error = error.into();
        warn!("Job {} failed: {}", self.id, error);
        self.registry
            .transition(&self.id, |record| record.fail(error))
            .await;
    }
}
