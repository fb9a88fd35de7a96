//! Background execution of margin jobs.
//!
//! A [`MarginHost`] owns a FIFO queue and a fixed pool of worker threads.
//! [`MarginHost::submit`] returns a [`JobHandle`] right away; the worker
//! sends the [`JobReport`] back over a channel when the job finishes, fails,
//! or is cancelled.

mod job;
mod registry;

pub use job::{FailureKind, JobFailure, JobPayload, JobReport};

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use crate::config::HostConfig;
use crate::error::HostError;
use crate::pipeline::MarginPipeline;

use registry::{JobKey, JobRegistry};

struct QueuedJob {
    key: JobKey,
    payload: JobPayload,
    cancel: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    reply: Sender<JobReport>,
}

/// Runs margin jobs on background worker threads.
///
/// Jobs start in submission order. [`MarginHost::shutdown`], or dropping
/// the host, cancels whatever is still pending and joins the workers.
#[derive(Debug)]
pub struct MarginHost {
    queue: Option<Sender<QueuedJob>>,
    registry: Arc<Mutex<JobRegistry>>,
    workers: Vec<JoinHandle<()>>,
}

impl MarginHost {
    /// Starts a host with `config.workers` threads (at least one).
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        let (queue, rx) = mpsc::channel::<QueuedJob>();
        let rx = Arc::new(Mutex::new(rx));
        let registry = Arc::new(Mutex::new(JobRegistry::default()));

        let workers = (0..config.workers.max(1))
            .filter_map(|i| {
                let rx = Arc::clone(&rx);
                let registry = Arc::clone(&registry);
                thread::Builder::new()
                    .name(format!("margin-worker-{i}"))
                    .spawn(move || worker_loop(&rx, &registry))
                    .map_err(|err| warn!(worker = i, %err, "failed to spawn worker"))
                    .ok()
            })
            .collect();

        Self {
            queue: Some(queue),
            registry,
            workers,
        }
    }

    /// Queues a job and returns a handle to its report.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ShutDown`] once the host has been shut down or
    /// when no worker is left to take the job.
    pub fn submit(&self, payload: JobPayload) -> Result<JobHandle, HostError> {
        let queue = self.queue.as_ref().ok_or(HostError::ShutDown)?;
        let (reply, report) = mpsc::channel();
        let (key, cancel) = lock(&self.registry).insert(&payload.job_id);
        let started = Arc::new(AtomicBool::new(false));
        let job_id = payload.job_id.clone();

        let job = QueuedJob {
            key,
            payload,
            cancel: Arc::clone(&cancel),
            started: Arc::clone(&started),
            reply,
        };
        if queue.send(job).is_err() {
            warn!(job_id = %job_id, "no worker available, job rejected");
            lock(&self.registry).remove(key);
            return Err(HostError::ShutDown);
        }
        debug!(job_id = %job_id, "job queued");

        Ok(JobHandle {
            job_id,
            cancel,
            started,
            report,
        })
    }

    /// Cancels every pending job submitted under `job_id`.
    ///
    /// Returns `true` if at least one job was flagged. Queued jobs are
    /// skipped; a running job stops at its next stage boundary.
    pub fn cancel(&self, job_id: &str) -> bool {
        let count = lock(&self.registry).cancel(job_id);
        if count > 0 {
            info!(job_id, count, "cancellation requested");
        }
        count > 0
    }

    /// Number of submitted jobs that have not reported yet.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Cancels pending jobs, closes the queue and joins the workers.
    ///
    /// Every outstanding handle still receives its report. Later calls to
    /// [`submit`](Self::submit) fail with [`HostError::ShutDown`].
    pub fn shutdown(&mut self) {
        if self.queue.is_none() {
            return;
        }
        lock(&self.registry).cancel_all();
        self.queue = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("margin worker exited abnormally");
            }
        }
        info!("margin host shut down");
    }
}

impl Default for MarginHost {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl Drop for MarginHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Caller's side of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    cancel: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    report: Receiver<JobReport>,
}

impl JobHandle {
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Whether a worker has picked the job up and begun running it.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Requests cancellation of this job only.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Blocks until the job reports.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Disconnected`] if the report can no longer
    /// arrive, for instance because it was already taken by
    /// [`try_report`](Self::try_report).
    pub fn wait(self) -> Result<JobReport, HostError> {
        self.report.recv().map_err(|_| HostError::Disconnected)
    }

    /// Blocks for at most `timeout`; `Ok(None)` means the job is still going.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Disconnected`] if the report can no longer arrive.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<JobReport>, HostError> {
        match self.report.recv_timeout(timeout) {
            Ok(report) => Ok(Some(report)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(HostError::Disconnected),
        }
    }

    /// Returns the report if it is ready, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Disconnected`] if the report can no longer arrive.
    pub fn try_report(&self) -> Result<Option<JobReport>, HostError> {
        match self.report.try_recv() {
            Ok(report) => Ok(Some(report)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HostError::Disconnected),
        }
    }
}

fn worker_loop(queue: &Mutex<Receiver<QueuedJob>>, registry: &Mutex<JobRegistry>) {
    loop {
        // The guard is released before the job runs so other workers can pull.
        let next = lock(queue).recv();
        let Ok(job) = next else {
            break;
        };
        let QueuedJob {
            key,
            payload,
            cancel,
            started,
            reply,
        } = job;

        let report = run_job(&payload, &cancel, &started);
        lock(registry).remove(key);
        if reply.send(report).is_err() {
            debug!(job_id = %payload.job_id, "job handle dropped before the report");
        }
    }
}

fn run_job(payload: &JobPayload, cancel: &AtomicBool, started: &AtomicBool) -> JobReport {
    let span = info_span!("job", job_id = %payload.job_id);
    let _enter = span.enter();

    if cancel.load(Ordering::Acquire) {
        info!("skipping cancelled job");
        return JobReport {
            job_id: payload.job_id.clone(),
            result: Err(JobFailure::cancelled()),
        };
    }

    started.store(true, Ordering::Release);
    info!(contours = payload.contours.len(), "job started");
    let clock = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        MarginPipeline::new(&payload.contours, payload.operation, payload.config)
            .with_cancel_flag(cancel)
            .execute()
    }));
    let elapsed_ms = clock.elapsed().as_secs_f64() * 1e3;

    let result = match outcome {
        Ok(Ok(contours)) => {
            info!(elapsed_ms, contours = contours.len(), "job finished");
            Ok(contours)
        }
        Ok(Err(err)) => {
            let failure = JobFailure::from(err);
            if failure.kind == FailureKind::Cancelled {
                info!(elapsed_ms, "job cancelled");
            } else {
                warn!(elapsed_ms, kind = ?failure.kind, message = %failure.message, "job failed");
            }
            Err(failure)
        }
        Err(cause) => {
            let message = cause
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            warn!(elapsed_ms, %message, "job panicked");
            Err(JobFailure::panicked(&message))
        }
    };

    JobReport {
        job_id: payload.job_id.clone(),
        result,
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
