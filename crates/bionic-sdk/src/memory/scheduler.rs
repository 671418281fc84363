//! CleanupScheduler - background decay sweeps
//!
//! Each job runs in its own tokio task and sweeps one tier through
//! [`MemorySystem::cleanup_tier`]. Runs inside a task are sequential, so a job
//! never overlaps itself, and missed ticks are skipped rather than replayed.
//!
//! Default jobs:
//! - `short_term_cleanup`: every 10 minutes
//! - `long_term_cleanup`: daily at 04:00 local time

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use bionic_core::utils::validate_job_id;
use bionic_core::{CleanupReport, MemoryTier};
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::system::MemorySystem;
use crate::config::SchedulerConfig;
use crate::SDKResult;

pub const SHORT_TERM_JOB: &str = "short_term_cleanup";
pub const LONG_TERM_JOB: &str = "long_term_cleanup";

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Interval(Duration),
    /// Once a day at a local wall-clock time.
    Daily { hour: u32, minute: u32 },
}

impl Trigger {
    pub fn describe(&self) -> String {
        match self {
            Trigger::Interval(period) => format!("every {}s", period.as_secs()),
            Trigger::Daily { hour, minute } => format!("daily at {:02}:{:02}", hour, minute),
        }
    }
}

/// Next occurrence of `hour:minute` strictly after `now`, in `now`'s zone.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let tz = now.timezone();
    let mut date = now.date_naive();
    // A DST gap can swallow the time on one day; look a little further
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(time)).earliest() {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// Public view of one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: String,
    pub tier: MemoryTier,
    pub trigger: String,
    pub paused: bool,
    pub next_run: Option<DateTime<Utc>>,
}

/// Public view of the scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

/// A registered job, whether or not its task is running
struct Job {
    tier: MemoryTier,
    trigger: Trigger,
    paused: Arc<AtomicBool>,
    /// Next run as epoch millis, 0 when unknown
    next_run_ms: Arc<AtomicI64>,
}

impl Job {
    fn new(tier: MemoryTier, trigger: Trigger) -> Self {
        Self {
            tier,
            trigger,
            paused: Arc::new(AtomicBool::new(false)),
            next_run_ms: Arc::new(AtomicI64::new(0)),
        }
    }
}

/// Background sweeper owning its memory system.
pub struct CleanupScheduler {
    memory: Arc<MemorySystem>,
    jobs: RwLock<BTreeMap<String, Job>>,
    /// Running tasks: job id -> abort handle
    tasks: RwLock<HashMap<String, tokio::task::AbortHandle>>,
    running: AtomicBool,
    /// Serializes start/stop and job registration
    operation_lock: Mutex<()>,
}

impl CleanupScheduler {
    /// Create a scheduler with the two default tier jobs registered.
    pub fn new(memory: Arc<MemorySystem>, config: &SchedulerConfig) -> Self {
        let mut jobs = BTreeMap::new();
        jobs.insert(
            SHORT_TERM_JOB.to_string(),
            Job::new(
                MemoryTier::ShortTerm,
                Trigger::Interval(Duration::from_secs(config.short_term_interval_secs.max(1))),
            ),
        );
        jobs.insert(
            LONG_TERM_JOB.to_string(),
            Job::new(
                MemoryTier::LongTerm,
                Trigger::Daily {
                    hour: config.long_term_hour,
                    minute: config.long_term_minute,
                },
            ),
        );

        Self {
            memory,
            jobs: RwLock::new(jobs),
            tasks: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            operation_lock: Mutex::new(()),
        }
    }

    pub fn memory(&self) -> &Arc<MemorySystem> {
        &self.memory
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn a task per registered job.
    pub async fn start(self: &Arc<Self>) {
        let _lock = self.operation_lock.lock().await;
        if self.is_running() {
            warn!("Cleanup scheduler already running");
            return;
        }

        let jobs = self.jobs.read().await;
        let mut tasks = self.tasks.write().await;
        for (id, job) in jobs.iter() {
            tasks.insert(id.clone(), self.spawn_job(id, job));
        }
        self.running.store(true, Ordering::SeqCst);
        info!(jobs = jobs.len(), "Cleanup scheduler started");
    }

    /// Abort every job task. Registered jobs are kept.
    pub async fn stop(&self) {
        let _lock = self.operation_lock.lock().await;
        if !self.is_running() {
            warn!("Cleanup scheduler is not running");
            return;
        }

        let mut tasks = self.tasks.write().await;
        for (id, handle) in tasks.drain() {
            handle.abort();
            info!(job_id = %id, "Stopped cleanup job");
        }
        for job in self.jobs.read().await.values() {
            job.next_run_ms.store(0, Ordering::SeqCst);
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Cleanup scheduler stopped");
    }

    /// Sweep both tiers right away.
    pub async fn run_cleanup_now(&self, user_id: Option<&str>) -> SDKResult<Vec<CleanupReport>> {
        info!(user_id = ?user_id, "Running immediate cleanup");
        let mut reports = Vec::with_capacity(2);
        for tier in [MemoryTier::ShortTerm, MemoryTier::LongTerm] {
            reports.push(self.memory.cleanup_tier(tier, user_id).await?);
        }
        Ok(reports)
    }

    /// Register an interval job, replacing any job with the same id.
    pub async fn add_custom_job(
        self: &Arc<Self>,
        id: &str,
        tier: MemoryTier,
        every: Duration,
    ) -> SDKResult<()> {
        validate_job_id(id).map_err(bionic_core::Error::from)?;
        if every.is_zero() {
            return Err(bionic_core::Error::InvalidInput("job interval must be positive".into()).into());
        }

        let _lock = self.operation_lock.lock().await;
        let job = Job::new(tier, Trigger::Interval(every));

        let mut tasks = self.tasks.write().await;
        if let Some(old) = tasks.remove(id) {
            old.abort();
        }
        if self.is_running() {
            tasks.insert(id.to_string(), self.spawn_job(id, &job));
        }
        self.jobs.write().await.insert(id.to_string(), job);

        info!(job_id = %id, tier = %tier, every_secs = every.as_secs_f64(), "Added cleanup job");
        Ok(())
    }

    /// Skip runs of a job until resumed.
    pub async fn pause_job(&self, id: &str) -> SDKResult<()> {
        self.set_paused(id, true).await?;
        info!(job_id = %id, "Paused cleanup job");
        Ok(())
    }

    pub async fn resume_job(&self, id: &str) -> SDKResult<()> {
        self.set_paused(id, false).await?;
        info!(job_id = %id, "Resumed cleanup job");
        Ok(())
    }

    async fn set_paused(&self, id: &str, paused: bool) -> SDKResult<()> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(id).ok_or_else(|| job_not_found(id))?;
        job.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    /// Unregister a job and abort its task.
    pub async fn remove_job(&self, id: &str) -> SDKResult<()> {
        let _lock = self.operation_lock.lock().await;
        self.jobs
            .write()
            .await
            .remove(id)
            .ok_or_else(|| job_not_found(id))?;
        if let Some(handle) = self.tasks.write().await.remove(id) {
            handle.abort();
        }
        info!(job_id = %id, "Removed cleanup job");
        Ok(())
    }

    pub async fn status(&self) -> SchedulerStatus {
        let running = self.is_running();
        let jobs = self
            .jobs
            .read()
            .await
            .iter()
            .map(|(id, job)| {
                let paused = job.paused.load(Ordering::SeqCst);
                let next_ms = job.next_run_ms.load(Ordering::SeqCst);
                JobStatus {
                    id: id.clone(),
                    tier: job.tier,
                    trigger: job.trigger.describe(),
                    paused,
                    next_run: (running && !paused && next_ms > 0)
                        .then(|| DateTime::from_timestamp_millis(next_ms))
                        .flatten(),
                }
            })
            .collect();
        SchedulerStatus { running, jobs }
    }

    fn spawn_job(&self, id: &str, job: &Job) -> tokio::task::AbortHandle {
        let memory = Arc::clone(&self.memory);
        let job_id = id.to_string();
        let tier = job.tier;
        let trigger = job.trigger;
        let paused = Arc::clone(&job.paused);
        let next_run_ms = Arc::clone(&job.next_run_ms);

        let handle = tokio::spawn(async move {
            match trigger {
                Trigger::Interval(period) => {
                    let mut ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        next_run_ms.store(
                            (Utc::now() + period_to_chrono(period)).timestamp_millis(),
                            Ordering::SeqCst,
                        );
                        ticker.tick().await;
                        if !paused.load(Ordering::SeqCst) {
                            sweep(&memory, &job_id, tier).await;
                        }
                    }
                }
                Trigger::Daily { hour, minute } => loop {
                    let now = Local::now();
                    let Some(next) = next_daily_run(&now, hour, minute) else {
                        error!(job_id = %job_id, hour, minute, "Invalid daily trigger, stopping job");
                        return;
                    };
                    next_run_ms.store(next.timestamp_millis(), Ordering::SeqCst);
                    sleep((next - now).to_std().unwrap_or_default()).await;
                    if !paused.load(Ordering::SeqCst) {
                        sweep(&memory, &job_id, tier).await;
                    }
                },
            }
        });

        info!(job_id = %id, tier = %job.tier, trigger = %job.trigger.describe(), "Scheduled cleanup job");
        handle.abort_handle()
    }
}

async fn sweep(memory: &MemorySystem, job_id: &str, tier: MemoryTier) {
    match memory.cleanup_tier(tier, None).await {
        Ok(report) => info!(
            job_id = %job_id,
            scanned = report.scanned,
            deleted = report.deleted(),
            "Scheduled cleanup finished"
        ),
        Err(e) => error!(job_id = %job_id, error = %e, "Scheduled cleanup failed"),
    }
}

fn period_to_chrono(period: Duration) -> chrono::Duration {
    chrono::Duration::from_std(period).unwrap_or(chrono::Duration::MAX)
}

fn job_not_found(id: &str) -> crate::SDKError {
    bionic_core::Error::JobNotFound(id.to_string()).into()
}
