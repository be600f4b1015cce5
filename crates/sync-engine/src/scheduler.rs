// crates/sync-engine/src/scheduler.rs
//! Keyed background scheduling of sync work
//!
//! Each job runs in its own tokio task. Keys are unique: enqueueing under a key
//! whose job is still alive keeps the existing job and drops the request.

use crate::error::{SyncError, SyncResult};
use crate::types::{Constraints, EnqueueResult, WorkInfo, WorkOutcome, WorkState};
use crate::worker::Worker;
use chrono::Utc;
use reparto_network::ConnectivityProbe;
use reparto_resilience::{with_retry, RetryPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shortest period accepted for periodic work
pub const MIN_PERIODIC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// How often a blocked job re-checks connectivity
const NETWORK_POLL: Duration = Duration::from_secs(30);

type SharedInfo = Arc<watch::Sender<WorkInfo>>;

struct Job {
    info: SharedInfo,
    handle: JoinHandle<()>,
}

impl Job {
    /// A one-time job that reached a final state no longer holds its key
    fn is_alive(&self) -> bool {
        !self.handle.is_finished() && !self.info.borrow().state.is_finished()
    }
}

#[derive(Debug, Clone, Copy)]
enum Schedule {
    Once,
    Every(Duration),
}

pub struct SyncScheduler {
    probe: Arc<dyn ConnectivityProbe>,
    policy: RetryPolicy,
    network_poll: Duration,
    jobs: Mutex<HashMap<String, Job>>,
    shut_down: AtomicBool,
}

impl SyncScheduler {
    pub fn new(probe: Arc<dyn ConnectivityProbe>, policy: RetryPolicy) -> SyncResult<Self> {
        policy.validate()?;
        Ok(Self {
            probe,
            policy,
            network_poll: NETWORK_POLL,
            jobs: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Sets how often a job blocked on connectivity re-checks it
    pub fn with_network_poll(mut self, poll: Duration) -> Self {
        self.network_poll = poll;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `worker` now and then every `interval`, unless `key` is taken
    pub fn enqueue_unique_periodic(
        &self,
        key: &str,
        interval: Duration,
        constraints: Constraints,
        worker: Arc<dyn Worker>,
    ) -> SyncResult<EnqueueResult> {
        let interval = if interval < MIN_PERIODIC_INTERVAL {
            log::warn!(
                "Interval {:?} for '{}' is below the minimum, using {:?}",
                interval,
                key,
                MIN_PERIODIC_INTERVAL
            );
            MIN_PERIODIC_INTERVAL
        } else {
            interval
        };
        self.enqueue(key, Schedule::Every(interval), constraints, worker)
    }

    /// Runs `worker` one time (with retries), unless `key` is taken
    pub fn enqueue_unique_once(
        &self,
        key: &str,
        constraints: Constraints,
        worker: Arc<dyn Worker>,
    ) -> SyncResult<EnqueueResult> {
        self.enqueue(key, Schedule::Once, constraints, worker)
    }

    /// Stops the job under `key`; returns whether one was alive
    pub fn cancel(&self, key: &str) -> SyncResult<bool> {
        let mut jobs = self.lock_jobs()?;
        match jobs.remove(key) {
            Some(job) => {
                let alive = job.is_alive();
                job.handle.abort();
                log::info!("Cancelled work '{}'", key);
                Ok(alive)
            }
            None => Ok(false),
        }
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Job::is_alive)
            .unwrap_or(false)
    }

    pub fn work_info(&self, key: &str) -> Option<WorkInfo> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(key).map(|job| read_info(&job.info))
    }

    /// Waits for a one-time job to reach a final state
    ///
    /// Returns the last known state if the job is cancelled meanwhile, and
    /// `None` for an unknown key.
    pub async fn wait(&self, key: &str) -> Option<WorkInfo> {
        let mut updates = {
            let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            jobs.get(key)?.info.subscribe()
        };

        let finished = updates
            .wait_for(|info| info.state.is_finished())
            .await
            .map(|info| info.clone());
        match finished {
            Ok(info) => Some(info),
            Err(_) => Some(updates.borrow().clone()),
        }
    }

    /// Aborts every job and rejects further work
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, job) in jobs.drain() {
            job.handle.abort();
            log::debug!("Stopped work '{}'", key);
        }
    }

    fn enqueue(
        &self,
        key: &str,
        schedule: Schedule,
        constraints: Constraints,
        worker: Arc<dyn Worker>,
    ) -> SyncResult<EnqueueResult> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SyncError::ShutDown);
        }

        let mut jobs = self.lock_jobs()?;
        if let Some(existing) = jobs.get(key) {
            if existing.is_alive() {
                let id = read_info(&existing.info).id;
                log::debug!("Work '{}' already scheduled as {}", key, id);
                return Ok(EnqueueResult::AlreadyScheduled(id));
            }
        }

        let periodic = matches!(schedule, Schedule::Every(_));
        let (sender, _) = watch::channel(WorkInfo::new(key, periodic));
        let info: SharedInfo = Arc::new(sender);
        let id = read_info(&info).id;

        let runner = Runner {
            key: key.to_string(),
            probe: self.probe.clone(),
            policy: self.policy.clone(),
            network_poll: self.network_poll,
            constraints,
            worker,
            info: info.clone(),
        };

        let handle = tokio::spawn(async move {
            match schedule {
                Schedule::Once => runner.cycle().await,
                Schedule::Every(interval) => loop {
                    runner.cycle().await;
                    update_info(&runner.info, |i| i.state = WorkState::Enqueued);
                    tokio::time::sleep(interval).await;
                },
            }
        });

        jobs.insert(key.to_string(), Job { info, handle });
        log::info!("Enqueued work '{}' ({:?}) as {}", key, schedule, id);
        Ok(EnqueueResult::Enqueued(id))
    }

    fn lock_jobs(&self) -> SyncResult<std::sync::MutexGuard<'_, HashMap<String, Job>>> {
        self.jobs
            .lock()
            .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("SyncScheduler")
            .field("policy", &self.policy)
            .field("jobs", &keys)
            .finish()
    }
}

/// Everything a job task needs, owned by the task
struct Runner {
    key: String,
    probe: Arc<dyn ConnectivityProbe>,
    policy: RetryPolicy,
    network_poll: Duration,
    constraints: Constraints,
    worker: Arc<dyn Worker>,
    info: SharedInfo,
}

impl Runner {
    /// Waits for constraints, then runs the worker until it stops asking to retry
    async fn cycle(&self) {
        if self.constraints.requires_network {
            self.wait_for_network().await;
        }

        let result = with_retry(&self.policy, |attempt| {
            let worker = self.worker.clone();
            let info = self.info.clone();
            async move {
                update_info(&info, |i| {
                    i.state = WorkState::Running;
                    i.run_attempt = attempt;
                    i.last_run_at = Some(Utc::now());
                });

                match worker.do_work(attempt).await {
                    WorkOutcome::Retry(reason) => {
                        update_info(&info, |i| {
                            i.state = WorkState::Retrying;
                            i.last_outcome = Some(WorkOutcome::Retry(reason.clone()));
                        });
                        Err(reason)
                    }
                    outcome => Ok(outcome),
                }
            }
        })
        .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Work '{}' gave up: {}", self.key, e);
                WorkOutcome::Failure(e.to_string())
            }
        };

        update_info(&self.info, |i| {
            i.state = if outcome.is_success() {
                WorkState::Succeeded
            } else {
                WorkState::Failed
            };
            i.cycles += 1;
            i.last_outcome = Some(outcome);
        });
    }

    async fn wait_for_network(&self) {
        let mut logged = false;
        while !self.probe.is_online().await {
            if !logged {
                log::info!("Work '{}' waiting for network", self.key);
                logged = true;
            }
            update_info(&self.info, |i| i.state = WorkState::Blocked);
            tokio::time::sleep(self.network_poll).await;
        }
    }
}

fn read_info(info: &SharedInfo) -> WorkInfo {
    info.borrow().clone()
}

fn update_info(info: &SharedInfo, f: impl FnOnce(&mut WorkInfo)) {
    info.send_modify(f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncReport;
    use async_trait::async_trait;
    use reparto_network::StaticProbe;
    use std::sync::atomic::AtomicUsize;

    /// Fails with `Retry` for the first `failures` runs
    struct Flaky {
        failures: usize,
        runs: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                runs: AtomicUsize::new(0),
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Worker for Flaky {
        async fn do_work(&self, attempt: usize) -> WorkOutcome {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.failures {
                if attempt < 3 {
                    WorkOutcome::Retry(format!("run {}", run))
                } else {
                    WorkOutcome::Failure(format!("run {}", run))
                }
            } else {
                WorkOutcome::Success(SyncReport::started())
            }
        }
    }

    fn scheduler(online: bool) -> (SyncScheduler, StaticProbe) {
        let probe = StaticProbe::new(online);
        let policy = RetryPolicy::with_retries(3, Duration::from_secs(30));
        let scheduler = SyncScheduler::new(Arc::new(probe.clone()), policy)
            .unwrap()
            .with_network_poll(Duration::from_secs(5));
        (scheduler, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_key_is_kept() {
        let (scheduler, _) = scheduler(true);
        let worker = Flaky::new(0);

        let first = scheduler
            .enqueue_unique_periodic(
                "sync",
                MIN_PERIODIC_INTERVAL,
                Constraints::network(),
                worker.clone(),
            )
            .unwrap();
        let second = scheduler
            .enqueue_unique_periodic(
                "sync",
                MIN_PERIODIC_INTERVAL,
                Constraints::network(),
                worker.clone(),
            )
            .unwrap();

        assert!(matches!(first, EnqueueResult::Enqueued(_)));
        assert_eq!(second, EnqueueResult::AlreadyScheduled(first.id()));
        assert!(scheduler.is_scheduled("sync"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs_every_interval() {
        let (scheduler, _) = scheduler(true);
        let worker = Flaky::new(0);
        scheduler
            .enqueue_unique_periodic(
                "sync",
                MIN_PERIODIC_INTERVAL,
                Constraints::default(),
                worker.clone(),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(worker.runs(), 1);

        tokio::time::sleep(MIN_PERIODIC_INTERVAL).await;
        assert_eq!(worker.runs(), 2);

        let info = scheduler.work_info("sync").unwrap();
        assert_eq!(info.cycles, 2);
        assert!(info.periodic);
        assert!(matches!(info.last_outcome, Some(WorkOutcome::Success(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_interval_is_clamped() {
        let (scheduler, _) = scheduler(true);
        let worker = Flaky::new(0);
        scheduler
            .enqueue_unique_periodic(
                "sync",
                Duration::from_secs(60),
                Constraints::default(),
                worker.clone(),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let (scheduler, _) = scheduler(true);
        let worker = Flaky::new(2);
        scheduler
            .enqueue_unique_once("now", Constraints::default(), worker.clone())
            .unwrap();

        let info = scheduler.wait("now").await.unwrap();
        assert_eq!(worker.runs(), 3);
        assert_eq!(info.run_attempt, 2);
        assert_eq!(info.state, WorkState::Succeeded);
        assert!(!scheduler.is_scheduled("now"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_retries() {
        let (scheduler, _) = scheduler(true);
        let worker = Flaky::new(10);
        scheduler
            .enqueue_unique_once("now", Constraints::default(), worker.clone())
            .unwrap();

        let info = scheduler.wait("now").await.unwrap();
        // first run plus three retries
        assert_eq!(worker.runs(), 4);
        assert_eq!(info.state, WorkState::Failed);
        assert!(matches!(info.last_outcome, Some(WorkOutcome::Failure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_network() {
        let (scheduler, probe) = scheduler(false);
        let worker = Flaky::new(0);
        scheduler
            .enqueue_unique_once("now", Constraints::network(), worker.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(worker.runs(), 0);
        assert_eq!(scheduler.work_info("now").unwrap().state, WorkState::Blocked);

        probe.set_online(true);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(worker.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_key_can_be_reused() {
        let (scheduler, _) = scheduler(true);
        let worker = Flaky::new(0);
        let first = scheduler
            .enqueue_unique_once("now", Constraints::default(), worker.clone())
            .unwrap();
        scheduler.wait("now").await.unwrap();

        let second = scheduler
            .enqueue_unique_once("now", Constraints::default(), worker.clone())
            .unwrap();
        assert!(matches!(second, EnqueueResult::Enqueued(_)));
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_shutdown() {
        let (scheduler, _) = scheduler(false);
        let worker = Flaky::new(0);
        scheduler
            .enqueue_unique_periodic(
                "sync",
                MIN_PERIODIC_INTERVAL,
                Constraints::network(),
                worker.clone(),
            )
            .unwrap();

        assert!(scheduler.cancel("sync").unwrap());
        assert!(!scheduler.is_scheduled("sync"));
        assert!(!scheduler.cancel("sync").unwrap());

        scheduler.shutdown();
        let rejected = scheduler.enqueue_unique_once("now", Constraints::default(), worker);
        assert!(matches!(rejected, Err(SyncError::ShutDown)));
    }
}
