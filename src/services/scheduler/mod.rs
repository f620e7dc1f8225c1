//! Cron-driven job scheduler with skip-on-overlap execution.
//!
//! Every registered job owns a running flag. A fire (scheduled or manual)
//! only executes the task if it can flip that flag from false to true, so a
//! job never has two invocations in flight and missed overlaps are dropped
//! rather than queued. Different jobs run independently of each other.

mod jobs;

pub use jobs::{
    register_default_jobs, JobOverride, SchedulerSettings, DAILY_CLEANUP, DAILY_INGESTION,
    HEALTH_CHECK, WEEKLY_INGESTION,
};

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use regex::{Captures, Regex};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::JobStatus;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error("job not found: {0}")]
    UnknownJob(String),

    #[error("job {0} is already running")]
    AlreadyRunning(String),

    #[error("job {name} failed: {message}")]
    TaskFailed { name: String, message: String },
}

/// Work executed when a job fires.
#[async_trait]
pub trait JobTask: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> JobTask for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self)().await
    }
}

static DOW_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(^|[,\-])(\d+)").unwrap());

/// Rewrite a cron expression into the seconds-first form the parser expects.
///
/// Five-field expressions get a leading `0` seconds field, and numeric
/// day-of-week values (0 or 7 = Sunday) become day names. Expressions with
/// six or seven fields are returned unchanged apart from whitespace.
pub fn normalize_expression(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }

    let dow = DOW_NUMBER.replace_all(fields[4], |caps: &Captures| {
        let day = match &caps[2] {
            "0" | "7" => "SUN",
            "1" => "MON",
            "2" => "TUE",
            "3" => "WED",
            "4" => "THU",
            "5" => "FRI",
            "6" => "SAT",
            other => other,
        };
        format!("{}{}", &caps[1], day)
    });

    format!("0 {} {}", fields[..4].join(" "), dow)
}

/// Parse a cron expression in either dialect.
pub fn parse_schedule(expr: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(&normalize_expression(expr)).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// State shared between a job's registry entry, its fire loop and any
/// invocation in flight. Survives re-registration under the same name.
#[derive(Default)]
struct JobRuntime {
    running: AtomicBool,
    enabled: AtomicBool,
    last_run: RwLock<Option<DateTime<Utc>>>,
    next_run: RwLock<Option<DateTime<Utc>>>,
}

struct Job {
    schedule: String,
    cron: Schedule,
    task: Arc<dyn JobTask>,
    runtime: Arc<JobRuntime>,
    handle: Option<JoinHandle<()>>,
}

impl Job {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    async fn disable(&mut self) {
        self.cancel();
        self.runtime.enabled.store(false, Ordering::Release);
        *self.runtime.next_run.write().await = None;
    }
}

/// Launch `task` once if the job is idle. Returns `None` when the fire was
/// skipped because a previous invocation is still running.
///
/// The invocation runs on a detached task that owns the running flag, so it
/// is released even when the caller stops waiting on the returned handle.
fn execute(
    name: &str,
    runtime: Arc<JobRuntime>,
    task: Arc<dyn JobTask>,
    cron: Schedule,
) -> Option<JoinHandle<Result<(), SchedulerError>>> {
    if runtime
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return None;
    }

    let name = name.to_string();
    Some(tokio::spawn(async move {
        *runtime.last_run.write().await = Some(Utc::now());
        info!(job = %name, "Starting job");

        // Inner task so a panicking job still releases the flag.
        let outcome = match tokio::spawn(async move { task.run().await }).await {
            Ok(Ok(())) => {
                info!(job = %name, "Completed job");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(job = %name, "Job failed: {:#}", e);
                Err(SchedulerError::TaskFailed {
                    name: name.clone(),
                    message: format!("{:#}", e),
                })
            }
            Err(e) => {
                error!(job = %name, "Job aborted: {}", e);
                Err(SchedulerError::TaskFailed {
                    name: name.clone(),
                    message: e.to_string(),
                })
            }
        };

        runtime.running.store(false, Ordering::Release);
        if runtime.enabled.load(Ordering::Acquire) {
            *runtime.next_run.write().await = cron.upcoming(Utc).next();
        }
        outcome
    }))
}

fn spawn_fire_loop(
    name: String,
    cron: Schedule,
    task: Arc<dyn JobTask>,
    runtime: Arc<JobRuntime>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut from = Utc::now();
        loop {
            let Some(next) = cron.after(&from).next() else {
                warn!(job = %name, "Schedule has no future fire times");
                break;
            };
            *runtime.next_run.write().await = Some(next);

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            from = next.max(Utc::now());

            if execute(&name, runtime.clone(), task.clone(), cron.clone()).is_none() {
                info!(job = %name, "Job is already running, skipping");
            }
        }
    })
}

/// Registry of named recurring jobs.
#[derive(Default)]
pub struct JobScheduler {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a job. Returns false if the schedule is invalid.
    pub async fn add_job(
        &self,
        name: &str,
        schedule: &str,
        task: Arc<dyn JobTask>,
        enabled: bool,
    ) -> bool {
        match self.try_add_job(name, schedule, task, enabled).await {
            Ok(()) => true,
            Err(e) => {
                error!(job = %name, "Failed to add job: {}", e);
                false
            }
        }
    }

    pub async fn try_add_job(
        &self,
        name: &str,
        schedule: &str,
        task: Arc<dyn JobTask>,
        enabled: bool,
    ) -> Result<(), SchedulerError> {
        let cron = parse_schedule(schedule)?;

        let mut jobs = self.jobs.write().await;
        // A replaced job keeps its runtime, so an invocation still in flight
        // holds the running flag for the new registration too.
        let runtime = match jobs.remove(name) {
            Some(mut previous) => {
                previous.disable().await;
                previous.runtime
            }
            None => Arc::new(JobRuntime::default()),
        };
        jobs.insert(
            name.to_string(),
            Job {
                schedule: schedule.to_string(),
                cron,
                task,
                runtime,
                handle: None,
            },
        );
        info!(job = %name, schedule = %schedule, "Added job");

        if enabled {
            Self::start_locked(&mut jobs, name).await?;
        }
        Ok(())
    }

    async fn start_locked(
        jobs: &mut HashMap<String, Job>,
        name: &str,
    ) -> Result<(), SchedulerError> {
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
        job.cancel();
        job.runtime.enabled.store(true, Ordering::Release);
        *job.runtime.next_run.write().await = job.cron.upcoming(Utc).next();
        job.handle = Some(spawn_fire_loop(
            name.to_string(),
            job.cron.clone(),
            job.task.clone(),
            job.runtime.clone(),
        ));
        info!(job = %name, "Started job");
        Ok(())
    }

    /// Bind the job to its schedule. Returns false for unknown jobs.
    pub async fn start_job(&self, name: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        match Self::start_locked(&mut jobs, name).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Cancel future fires. An invocation already in flight finishes normally.
    pub async fn stop_job(&self, name: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(name) {
            Some(job) => {
                job.disable().await;
                info!(job = %name, "Stopped job");
                true
            }
            None => {
                error!("Job not found: {}", name);
                false
            }
        }
    }

    /// Run a job once, outside its schedule.
    ///
    /// Returns false if the job is unknown, already running, or the task fails.
    pub async fn run_job(&self, name: &str) -> bool {
        match self.try_run_job(name).await {
            Ok(()) => true,
            Err(SchedulerError::AlreadyRunning(_)) => {
                info!(job = %name, "Job is already running");
                false
            }
            Err(SchedulerError::TaskFailed { .. }) => false,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    pub async fn try_run_job(&self, name: &str) -> Result<(), SchedulerError> {
        let (cron, task, runtime) = {
            let jobs = self.jobs.read().await;
            let job = jobs
                .get(name)
                .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
            (job.cron.clone(), job.task.clone(), job.runtime.clone())
        };

        debug!(job = %name, "Manually running job");
        let handle = execute(name, runtime, task, cron)
            .ok_or_else(|| SchedulerError::AlreadyRunning(name.to_string()))?;
        handle.await.map_err(|e| SchedulerError::TaskFailed {
            name: name.to_string(),
            message: e.to_string(),
        })?
    }

    /// Replace a job's schedule, restarting it only if it was enabled.
    pub async fn update_job_schedule(&self, name: &str, schedule: &str) -> bool {
        match self.try_update_job_schedule(name, schedule).await {
            Ok(()) => true,
            Err(e) => {
                error!(job = %name, "Failed to update schedule: {}", e);
                false
            }
        }
    }

    pub async fn try_update_job_schedule(
        &self,
        name: &str,
        schedule: &str,
    ) -> Result<(), SchedulerError> {
        let cron = parse_schedule(schedule)?;
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        let was_enabled = job.runtime.enabled.load(Ordering::Acquire);
        job.disable().await;
        job.schedule = schedule.to_string();
        job.cron = cron;
        info!(job = %name, schedule = %schedule, "Updated job schedule");

        if was_enabled {
            Self::start_locked(&mut jobs, name).await?;
        }
        Ok(())
    }

    /// Start every registered job. Returns how many were started.
    pub async fn start_all_jobs(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let names: Vec<String> = jobs.keys().cloned().collect();
        let mut started = 0;
        for name in &names {
            if Self::start_locked(&mut jobs, name).await.is_ok() {
                started += 1;
            }
        }
        started
    }

    /// Stop every registered job.
    pub async fn stop_all_jobs(&self) {
        let mut jobs = self.jobs.write().await;
        for job in jobs.values_mut() {
            job.disable().await;
        }
        info!("Stopped all jobs");
    }

    /// Status of every job, sorted by name.
    pub async fn job_statuses(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.read().await;
        let mut statuses = Vec::with_capacity(jobs.len());
        for (name, job) in jobs.iter() {
            statuses.push(Self::status_of(name, job).await);
        }
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub async fn job_status(&self, name: &str) -> Option<JobStatus> {
        let jobs = self.jobs.read().await;
        match jobs.get(name) {
            Some(job) => Some(Self::status_of(name, job).await),
            None => None,
        }
    }

    async fn status_of(name: &str, job: &Job) -> JobStatus {
        JobStatus {
            name: name.to_string(),
            schedule: job.schedule.clone(),
            enabled: job.runtime.enabled.load(Ordering::Acquire),
            is_running: job.runtime.running.load(Ordering::Acquire),
            last_run: *job.runtime.last_run.read().await,
            next_run: *job.runtime.next_run.read().await,
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values_mut() {
            job.cancel();
        }
    }
}
