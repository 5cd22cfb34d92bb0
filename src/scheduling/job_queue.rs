//! Job queue with deduplication and priority ordering

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{JobPriority, JobType, ScheduledJob};
use crate::errors::SchedulingError;

/// Fire-and-forget job submission seam
///
/// Initiators and the runner both schedule through this; submitting an
/// already-tracked job is not an error, it reports `false` and the caller
/// moves on.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Schedule a job for immediate execution; `false` means deduplicated
    async fn schedule(
        &self,
        job_type: JobType,
        priority: JobPriority,
    ) -> Result<bool, SchedulingError>;

    /// Schedule a job to become eligible after a delay
    async fn schedule_in(
        &self,
        job_type: JobType,
        priority: JobPriority,
        delay: Duration,
    ) -> Result<bool, SchedulingError>;
}

/// Category of job types for concurrency limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobTypeCategory {
    MigrationPass,
    EntityImport,
}

impl From<&JobType> for JobTypeCategory {
    fn from(job_type: &JobType) -> Self {
        match job_type {
            JobType::MigrationPass(_) => JobTypeCategory::MigrationPass,
            JobType::EntityImport(_) => JobTypeCategory::EntityImport,
        }
    }
}

/// Thread-safe job queue with deduplication and priority ordering
#[derive(Debug)]
pub struct JobQueue {
    /// Pending jobs ordered by priority and time (min-heap using Reverse)
    pending: Arc<RwLock<BinaryHeap<Reverse<ScheduledJob>>>>,
    /// Currently running jobs (job id -> job key)
    running: Arc<RwLock<HashMap<Uuid, String>>>,
    /// Active job keys, pending and running, for deduplication
    job_keys: Arc<RwLock<HashSet<String>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(BinaryHeap::new())),
            running: Arc::new(RwLock::new(HashMap::new())),
            job_keys: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Enqueue a job unless its key is already tracked
    ///
    /// Returns `Ok(true)` if enqueued, `Ok(false)` if a pending or running
    /// job already covers the same key.
    pub async fn enqueue(&self, job: ScheduledJob) -> Result<bool, SchedulingError> {
        let job_key = job.job_key();
        let mut job_keys = self.job_keys.write().await;

        if job_keys.contains(&job_key) {
            debug!("Skipping duplicate job '{job_key}'");
            return Ok(false);
        }

        job_keys.insert(job_key.clone());
        drop(job_keys);

        let mut pending = self.pending.write().await;
        pending.push(Reverse(job.clone()));

        info!(
            "Enqueued job '{}' (priority: {:?}, scheduled: {})",
            job_key,
            job.priority,
            job.scheduled_time.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(true)
    }

    /// Pop ready jobs respecting the global slot count and per-type limits
    ///
    /// Jobs that are not yet due, exceed the available slots, or would
    /// break a per-type limit go back into the heap untouched.
    pub async fn take_executable(
        &self,
        now: DateTime<Utc>,
        available_slots: usize,
        running_by_type: &HashMap<JobTypeCategory, usize>,
        type_limits: &HashMap<JobTypeCategory, usize>,
    ) -> Vec<ScheduledJob> {
        let mut pending = self.pending.write().await;
        let mut executable = Vec::new();
        let mut remaining = BinaryHeap::new();
        let mut type_counts = running_by_type.clone();

        while let Some(Reverse(job)) = pending.pop() {
            if job.is_ready(now) && executable.len() < available_slots {
                let category = JobTypeCategory::from(&job.job_type);
                let current = type_counts.get(&category).copied().unwrap_or(0);
                let limit = type_limits.get(&category).copied().unwrap_or(1);

                if current < limit {
                    *type_counts.entry(category).or_insert(0) += 1;
                    executable.push(job);
                } else {
                    remaining.push(Reverse(job));
                }
            } else {
                remaining.push(Reverse(job));
            }
        }
        *pending = remaining;

        if !executable.is_empty() {
            debug!("Retrieved {} executable jobs from queue", executable.len());
        }
        executable
    }

    /// Mark a job as running
    pub async fn mark_running(&self, job_id: Uuid, job_key: String) {
        let mut running = self.running.write().await;
        running.insert(job_id, job_key.clone());
        debug!("Marked job '{job_key}' as running");
    }

    /// Mark a job as completed and release its dedup key
    ///
    /// Must happen before any follow-up job with the same key is
    /// scheduled, otherwise the follow-up would be deduplicated away.
    pub async fn mark_completed(&self, job_id: Uuid) {
        let mut running = self.running.write().await;

        if let Some(job_key) = running.remove(&job_id) {
            drop(running);

            let mut job_keys = self.job_keys.write().await;
            job_keys.remove(&job_key);
            debug!("Job '{job_key}' completed and removed from tracking");
        } else {
            warn!("Attempted to mark unknown job {job_id} as completed");
        }
    }

    pub async fn running_count(&self) -> usize {
        self.running.read().await.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Running job keys, for per-type concurrency accounting
    pub async fn running_job_keys(&self) -> Vec<String> {
        self.running.read().await.values().cloned().collect()
    }

    /// Whether a job key is already tracked, pending or running
    pub async fn contains_job_key(&self, job_key: &str) -> bool {
        self.job_keys.read().await.contains(job_key)
    }

    /// Queue statistics snapshot
    pub async fn stats(&self) -> JobQueueStats {
        JobQueueStats {
            pending_jobs: self.pending.read().await.len(),
            running_jobs: self.running.read().await.len(),
            tracked_keys: self.job_keys.read().await.len(),
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobDispatcher for JobQueue {
    async fn schedule(
        &self,
        job_type: JobType,
        priority: JobPriority,
    ) -> Result<bool, SchedulingError> {
        self.enqueue(ScheduledJob::new(job_type, priority)).await
    }

    async fn schedule_in(
        &self,
        job_type: JobType,
        priority: JobPriority,
        delay: Duration,
    ) -> Result<bool, SchedulingError> {
        self.enqueue(ScheduledJob::new_scheduled(
            job_type,
            priority,
            Utc::now() + delay,
        ))
        .await
    }
}

/// Statistics about the job queue state
#[derive(Debug, Clone)]
pub struct JobQueueStats {
    pub pending_jobs: usize,
    pub running_jobs: usize,
    /// Should equal pending + running
    pub tracked_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn limits(passes: usize, imports: usize) -> HashMap<JobTypeCategory, usize> {
        HashMap::from([
            (JobTypeCategory::MigrationPass, passes),
            (JobTypeCategory::EntityImport, imports),
        ])
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_on_job_key() {
        let queue = JobQueue::new();
        let migration_id = Uuid::new_v4();

        let first = ScheduledJob::new(JobType::MigrationPass(migration_id), JobPriority::Normal);
        let duplicate = ScheduledJob::new(JobType::MigrationPass(migration_id), JobPriority::High);

        assert!(assert_ok!(queue.enqueue(first).await));
        assert!(!assert_ok!(queue.enqueue(duplicate).await));

        let stats = queue.stats().await;
        assert_eq!(stats.pending_jobs, 1);
        assert_eq!(stats.tracked_keys, 1);
    }

    #[tokio::test]
    async fn test_take_executable_orders_by_priority() {
        let queue = JobQueue::new();
        let now = Utc::now();

        let low = ScheduledJob::new_scheduled(
            JobType::EntityImport(Uuid::new_v4()),
            JobPriority::Low,
            now,
        );
        let critical = ScheduledJob::new_scheduled(
            JobType::EntityImport(Uuid::new_v4()),
            JobPriority::Critical,
            now,
        );
        let critical_id = critical.id;

        queue.enqueue(low).await.unwrap();
        queue.enqueue(critical).await.unwrap();

        let jobs = queue
            .take_executable(now, 10, &HashMap::new(), &limits(1, 10))
            .await;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, critical_id);
    }

    #[tokio::test]
    async fn test_future_jobs_stay_pending() {
        let queue = JobQueue::new();
        let now = Utc::now();

        let due = ScheduledJob::new_scheduled(
            JobType::EntityImport(Uuid::new_v4()),
            JobPriority::Normal,
            now - Duration::minutes(1),
        );
        let due_id = due.id;
        let future = ScheduledJob::new_scheduled(
            JobType::EntityImport(Uuid::new_v4()),
            JobPriority::Normal,
            now + Duration::minutes(10),
        );

        queue.enqueue(due).await.unwrap();
        queue.enqueue(future).await.unwrap();

        let jobs = queue
            .take_executable(now, 10, &HashMap::new(), &limits(1, 10))
            .await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, due_id);
        assert_eq!(queue.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_per_type_limit_holds_jobs_back() {
        let queue = JobQueue::new();
        let now = Utc::now();

        for _ in 0..3 {
            let job = ScheduledJob::new_scheduled(
                JobType::EntityImport(Uuid::new_v4()),
                JobPriority::Normal,
                now,
            );
            queue.enqueue(job).await.unwrap();
        }

        // One import already running, limit of two
        let running = HashMap::from([(JobTypeCategory::EntityImport, 1)]);
        let jobs = queue.take_executable(now, 10, &running, &limits(1, 2)).await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(queue.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_completed_job_releases_its_key_for_followups() {
        let queue = JobQueue::new();
        let migration_id = Uuid::new_v4();

        let job = ScheduledJob::new(JobType::MigrationPass(migration_id), JobPriority::Normal);
        let job_id = job.id;
        let job_key = job.job_key();

        queue.enqueue(job).await.unwrap();
        let taken = queue
            .take_executable(Utc::now(), 1, &HashMap::new(), &limits(1, 1))
            .await;
        assert_eq!(taken.len(), 1);

        queue.mark_running(job_id, job_key.clone()).await;
        assert!(queue.contains_job_key(&job_key).await);

        // A follow-up pass for the same migration is still deduplicated
        assert!(
            !queue
                .schedule(JobType::MigrationPass(migration_id), JobPriority::Normal)
                .await
                .unwrap()
        );

        queue.mark_completed(job_id).await;
        assert!(!queue.contains_job_key(&job_key).await);

        // After completion the follow-up goes through
        assert!(
            queue
                .schedule(JobType::MigrationPass(migration_id), JobPriority::Normal)
                .await
                .unwrap()
        );
    }
}
