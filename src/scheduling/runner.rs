//! Job runner service
//!
//! Polls the queue on a fixed tick, spawns ready jobs up to the global and
//! per-type concurrency limits, and turns each job's result into follow-up
//! jobs. Follow-ups are scheduled only after the finished job releases its
//! dedup key; scheduling them earlier would collapse a migration's next
//! pass into the one that just ran.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job_queue::{JobDispatcher, JobQueue, JobTypeCategory};
use super::types::{JobPriority, JobType, ScheduledJob};
use crate::config::TransferConfig;
use crate::errors::TransferResult;
use crate::importer::EntityImporter;
use crate::orchestrator::{MigrationOrchestrator, PassOutcome};

/// Executes queued jobs against the orchestrator and importer
pub struct JobRunner {
    queue: Arc<JobQueue>,
    orchestrator: MigrationOrchestrator,
    importer: EntityImporter,
    global_max_jobs: usize,
    type_limits: HashMap<JobTypeCategory, usize>,
    tick: Duration,
    recheck_delay: ChronoDuration,
}

impl JobRunner {
    pub fn new(
        queue: Arc<JobQueue>,
        orchestrator: MigrationOrchestrator,
        importer: EntityImporter,
        config: &TransferConfig,
    ) -> Self {
        // Passes are cheap and already deduplicated per migration, so a
        // single slot suffices; imports carry the real work.
        let type_limits = HashMap::from([
            (JobTypeCategory::MigrationPass, 1),
            (JobTypeCategory::EntityImport, config.entity_import_limit),
        ]);

        Self {
            queue,
            orchestrator,
            importer,
            global_max_jobs: config.global_max_jobs,
            type_limits,
            tick: Duration::from_secs(config.runner_tick_secs),
            recheck_delay: ChronoDuration::seconds(config.recheck_delay_secs as i64),
        }
    }

    /// Run the polling loop until cancelled
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            "Starting job runner (max concurrent: {}, tick: {}s)",
            self.global_max_jobs,
            self.tick.as_secs()
        );
        let mut tick = interval(self.tick);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.process_pending_jobs().await;
                }
                _ = cancellation_token.cancelled() => {
                    info!("Job runner received cancellation signal");
                    self.drain_running_jobs().await;
                    break;
                }
            }
        }

        info!("Job runner stopped");
    }

    /// Spawn every job that fits within the concurrency limits
    pub async fn process_pending_jobs(&self) {
        let running = self.queue.running_count().await;
        if running >= self.global_max_jobs {
            debug!("At maximum concurrent jobs ({})", self.global_max_jobs);
            return;
        }

        let running_by_type = Self::count_by_category(&self.queue.running_job_keys().await);
        let jobs = self
            .queue
            .take_executable(
                Utc::now(),
                self.global_max_jobs - running,
                &running_by_type,
                &self.type_limits,
            )
            .await;

        for job in jobs {
            self.spawn_job(job).await;
        }
    }

    async fn spawn_job(&self, job: ScheduledJob) {
        let job_key = job.job_key();
        let job_id = job.id;
        self.queue.mark_running(job_id, job_key.clone()).await;

        info!("Starting job '{}' (priority: {:?})", job_key, job.priority);

        let queue = self.queue.clone();
        let orchestrator = self.orchestrator.clone();
        let importer = self.importer.clone();
        let recheck_delay = self.recheck_delay;

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let result =
                Self::execute_job(&job, &queue, &orchestrator, &importer, recheck_delay).await;

            match result {
                Ok(()) => {
                    info!("Job '{}' completed in {:?}", job_key, started.elapsed());
                }
                Err(e) => {
                    error!("Job '{}' failed after {:?}: {}", job_key, started.elapsed(), e);
                    queue.mark_completed(job_id).await;
                }
            }
        });
    }

    /// Execute one job and schedule its follow-ups
    ///
    /// The job's dedup key is released before follow-ups are enqueued, so
    /// "another pass for this same migration" is accepted rather than
    /// collapsing into the pass that produced it.
    async fn execute_job(
        job: &ScheduledJob,
        queue: &Arc<JobQueue>,
        orchestrator: &MigrationOrchestrator,
        importer: &EntityImporter,
        recheck_delay: ChronoDuration,
    ) -> TransferResult<()> {
        match job.job_type {
            JobType::MigrationPass(migration_id) => {
                let outcome = orchestrator.run_pass(migration_id).await?;
                queue.mark_completed(job.id).await;

                match outcome {
                    PassOutcome::Dispatched(entity_ids) => {
                        for entity_id in entity_ids {
                            Self::schedule_followup(
                                queue,
                                JobType::EntityImport(entity_id),
                                JobPriority::Normal,
                            )
                            .await;
                        }
                        // Immediate next pass to pick up discoveries
                        Self::schedule_followup(
                            queue,
                            JobType::MigrationPass(migration_id),
                            JobPriority::Normal,
                        )
                        .await;
                    }
                    PassOutcome::Waiting => {
                        if let Err(e) = queue
                            .schedule_in(
                                JobType::MigrationPass(migration_id),
                                JobPriority::Normal,
                                recheck_delay,
                            )
                            .await
                        {
                            warn!("Failed to schedule re-check pass for migration {migration_id}: {e}");
                        }
                    }
                    PassOutcome::Finished | PassOutcome::MigrationMissing => {}
                }
                Ok(())
            }
            JobType::EntityImport(entity_id) => {
                let entity = importer.run(entity_id).await?;
                queue.mark_completed(job.id).await;

                // Fold the finished import back into scheduling without
                // waiting for the delayed re-check
                Self::schedule_followup(
                    queue,
                    JobType::MigrationPass(entity.migration_id),
                    JobPriority::Normal,
                )
                .await;
                Ok(())
            }
        }
    }

    async fn schedule_followup(queue: &Arc<JobQueue>, job_type: JobType, priority: JobPriority) {
        let job_key = job_type.job_key();
        if let Err(e) = queue.schedule(job_type, priority).await {
            warn!("Failed to schedule follow-up job '{job_key}': {e}");
        }
    }

    fn count_by_category(running_job_keys: &[String]) -> HashMap<JobTypeCategory, usize> {
        let mut counts = HashMap::new();
        for job_key in running_job_keys {
            let category = if job_key.starts_with("migration:") {
                JobTypeCategory::MigrationPass
            } else if job_key.starts_with("entity:") {
                JobTypeCategory::EntityImport
            } else {
                continue;
            };
            *counts.entry(category).or_insert(0) += 1;
        }
        counts
    }

    /// Wait for in-flight jobs to finish during shutdown, with a deadline
    async fn drain_running_jobs(&self) {
        const MAX_WAIT: Duration = Duration::from_secs(30);
        let started = std::time::Instant::now();
        let mut check = interval(Duration::from_millis(500));

        loop {
            let running = self.queue.running_count().await;
            if running == 0 {
                info!("All running jobs completed");
                break;
            }
            if started.elapsed() > MAX_WAIT {
                warn!(running, "Timeout waiting for jobs to complete, shutting down anyway");
                break;
            }
            debug!(running, "Waiting for running jobs to complete");
            check.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_by_category() {
        let keys = vec![
            format!("migration:{}", uuid::Uuid::new_v4()),
            format!("entity:{}", uuid::Uuid::new_v4()),
            format!("entity:{}", uuid::Uuid::new_v4()),
        ];

        let counts = JobRunner::count_by_category(&keys);
        assert_eq!(counts.get(&JobTypeCategory::MigrationPass), Some(&1));
        assert_eq!(counts.get(&JobTypeCategory::EntityImport), Some(&2));
    }

    #[test]
    fn test_category_from_job_type() {
        let pass = JobType::MigrationPass(uuid::Uuid::new_v4());
        let import = JobType::EntityImport(uuid::Uuid::new_v4());

        assert_eq!(JobTypeCategory::from(&pass), JobTypeCategory::MigrationPass);
        assert_eq!(JobTypeCategory::from(&import), JobTypeCategory::EntityImport);
    }
}
