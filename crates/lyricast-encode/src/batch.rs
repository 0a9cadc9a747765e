//! Batch export.
//!
//! A [`BatchExport`] holds a queue of export jobs and runs them one after
//! another through fresh [`ExportPump`]s over a shared launcher. Job events
//! are forwarded tagged with the job id, and every job ends with exactly one
//! terminal event, including jobs cancelled before they started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use lyricast_core::{ExportConfig, Project};
use parking_lot::Mutex;

use crate::error::ExportError;
use crate::process::EncoderLauncher;
use crate::producer::FrameProducer;
use crate::pump::{ExportEvent, ExportHandle, ExportPump};
use crate::settings::ExportSettings;

const FORWARD_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub id: String,
    pub status: JobStatus,
    pub percent: f64,
    pub error: Option<String>,
    pub started: Option<Instant>,
    pub finished: Option<Instant>,
}

impl JobReport {
    fn pending(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Pending,
            percent: 0.0,
            error: None,
            started: None,
            finished: None,
        }
    }

    /// Wall time from start to finish, once the job has run.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.finished?.saturating_duration_since(self.started?))
    }
}

/// Counts over the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatus {
    pub processing: bool,
    pub total_jobs: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub active: usize,
    pub pending: usize,
    /// Mean of the job percentages.
    pub percent: f64,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

impl BatchStatus {
    /// Every job completed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.completed == self.total_jobs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total_jobs: usize },
    /// An event of one job's export.
    Job { id: String, event: ExportEvent },
    /// Sent after each job finishes.
    Progress(BatchStatus),
    Finished(BatchStatus),
}

struct BatchState {
    jobs: Vec<JobReport>,
    processing: bool,
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl BatchState {
    fn status(&self) -> BatchStatus {
        let count = |status: JobStatus| self.jobs.iter().filter(|j| j.status == status).count();
        let total_jobs = self.jobs.len();
        let percent = if total_jobs == 0 {
            0.0
        } else {
            self.jobs.iter().map(|j| j.percent).sum::<f64>() / total_jobs as f64
        };
        let elapsed = match (self.started, self.finished) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };
        let eta = (self.processing && percent > 0.0)
            .then(|| elapsed.mul_f64((100.0 - percent).max(0.0) / percent));
        BatchStatus {
            processing: self.processing,
            total_jobs,
            completed: count(JobStatus::Completed),
            failed: count(JobStatus::Failed),
            cancelled: count(JobStatus::Cancelled),
            active: count(JobStatus::Running),
            pending: count(JobStatus::Pending),
            percent,
            elapsed,
            eta,
        }
    }
}

struct Shared {
    state: Mutex<BatchState>,
    cancelled: AtomicBool,
    active: Mutex<Option<ExportHandle>>,
}

/// Cancels a batch and reads its status from any thread.
#[derive(Clone)]
pub struct BatchHandle {
    shared: Arc<Shared>,
}

impl BatchHandle {
    /// Cancel the running job and every pending one. Safe to call repeatedly.
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("batch cancellation requested");
        }
        if let Some(handle) = self.shared.active.lock().as_ref() {
            handle.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> BatchStatus {
        self.shared.state.lock().status()
    }

    pub fn job_status(&self, id: &str) -> Option<JobReport> {
        self.shared.state.lock().jobs.iter().find(|j| j.id == id).cloned()
    }
}

struct BatchJob {
    project: Project,
    settings: ExportSettings,
    producer: Box<dyn FrameProducer + Send>,
}

/// Sequential queue of exports sharing one encoder launcher.
pub struct BatchExport {
    config: ExportConfig,
    launcher: Arc<dyn EncoderLauncher>,
    // index-aligned with `shared.state.jobs`
    jobs: Vec<BatchJob>,
    shared: Arc<Shared>,
    events_tx: Sender<BatchEvent>,
    events_rx: Receiver<BatchEvent>,
}

impl BatchExport {
    pub fn new(config: ExportConfig, launcher: Arc<dyn EncoderLauncher>) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            launcher,
            jobs: Vec::new(),
            shared: Arc::new(Shared {
                state: Mutex::new(BatchState {
                    jobs: Vec::new(),
                    processing: false,
                    started: None,
                    finished: None,
                }),
                cancelled: AtomicBool::new(false),
                active: Mutex::new(None),
            }),
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> BatchHandle {
        BatchHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn events(&self) -> Receiver<BatchEvent> {
        self.events_rx.clone()
    }

    pub fn cancel(&self) {
        self.handle().cancel();
    }

    pub fn status(&self) -> BatchStatus {
        self.handle().status()
    }

    pub fn job_status(&self, id: &str) -> Option<JobReport> {
        self.handle().job_status(id)
    }

    /// Queue an export. Ids must be unique within the batch.
    pub fn add_job(
        &mut self,
        id: impl Into<String>,
        project: Project,
        settings: ExportSettings,
        producer: Box<dyn FrameProducer + Send>,
    ) -> Result<(), ExportError> {
        let id = id.into();
        let mut state = self.shared.state.lock();
        if state.jobs.iter().any(|j| j.id == id) {
            return Err(ExportError::DuplicateJob(id));
        }
        tracing::debug!(job = %id, output = %settings.output_path.display(), "batch job added");
        state.jobs.push(JobReport::pending(&id));
        self.jobs.push(BatchJob {
            project,
            settings,
            producer,
        });
        Ok(())
    }

    /// Drop finished jobs, keeping pending ones. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let mut state = self.shared.state.lock();
        let before = state.jobs.len();
        let keep: Vec<bool> = state.jobs.iter().map(|j| !j.status.is_finished()).collect();
        state.jobs.retain(|j| !j.status.is_finished());
        let mut flags = keep.iter();
        self.jobs.retain(|_| flags.next().copied().unwrap_or(true));
        let removed = before - state.jobs.len();
        tracing::debug!(removed, remaining = state.jobs.len(), "cleared finished batch jobs");
        removed
    }

    /// Run every pending job in order. Returns the final status; individual
    /// failures are reported per job and do not stop the batch.
    pub fn run(&mut self) -> Result<BatchStatus, ExportError> {
        let pending: Vec<usize> = {
            let mut state = self.shared.state.lock();
            let pending: Vec<usize> = (0..state.jobs.len())
                .filter(|&i| state.jobs[i].status == JobStatus::Pending)
                .collect();
            if pending.is_empty() {
                return Err(ExportError::InvalidState {
                    action: "start a batch",
                    actual: "empty",
                });
            }
            state.processing = true;
            state.started = Some(Instant::now());
            state.finished = None;
            pending
        };
        self.shared.cancelled.store(false, Ordering::SeqCst);
        tracing::info!(jobs = pending.len(), "batch started");
        self.emit(BatchEvent::Started {
            total_jobs: pending.len(),
        });

        for index in pending {
            if self.shared.cancelled.load(Ordering::SeqCst) {
                self.cancel_pending(index);
                continue;
            }
            self.run_job(index);
            let status = self.status();
            self.emit(BatchEvent::Progress(status));
        }

        let status = {
            let mut state = self.shared.state.lock();
            state.processing = false;
            state.finished = Some(Instant::now());
            state.status()
        };
        tracing::info!(
            completed = status.completed,
            failed = status.failed,
            cancelled = status.cancelled,
            elapsed_ms = status.elapsed.as_millis() as u64,
            "batch finished"
        );
        self.emit(BatchEvent::Finished(status.clone()));
        Ok(status)
    }

    fn emit(&self, event: BatchEvent) {
        let _ = self.events_tx.send(event);
    }

    fn cancel_pending(&self, index: usize) {
        let id = {
            let mut state = self.shared.state.lock();
            let report = &mut state.jobs[index];
            report.status = JobStatus::Cancelled;
            report.finished = Some(Instant::now());
            report.error = Some(ExportError::Cancelled.to_string());
            report.id.clone()
        };
        tracing::debug!(job = %id, "pending batch job cancelled");
        self.emit(BatchEvent::Job {
            id,
            event: ExportEvent::failed(&ExportError::Cancelled, None),
        });
    }

    fn run_job(&mut self, index: usize) {
        let id = {
            let mut state = self.shared.state.lock();
            let report = &mut state.jobs[index];
            report.status = JobStatus::Running;
            report.started = Some(Instant::now());
            report.id.clone()
        };
        tracing::info!(job = %id, "batch job started");

        let mut pump = ExportPump::new(self.config.clone(), self.launcher.clone());
        let job = &mut self.jobs[index];
        if let Err(e) = pump.setup(&job.project, job.settings.clone()) {
            // setup errors carry no pump event of their own
            self.emit(BatchEvent::Job {
                id: id.clone(),
                event: ExportEvent::failed(&e, None),
            });
            self.finish_job(index, &id, Err(e));
            return;
        }

        *self.shared.active.lock() = Some(pump.handle());
        if self.shared.cancelled.load(Ordering::SeqCst) {
            pump.cancel();
        }

        let events = pump.events();
        let run_done = AtomicBool::new(false);
        let (shared, tx) = (&self.shared, &self.events_tx);
        let producer = &mut *job.producer;
        let result = std::thread::scope(|scope| {
            scope.spawn(|| forward(&events, &id, index, shared, tx, &run_done));
            let result = pump.run(producer);
            run_done.store(true, Ordering::Release);
            result
        });
        *self.shared.active.lock() = None;
        self.finish_job(index, &id, result.map(|_| ()));
    }

    fn finish_job(&self, index: usize, id: &str, result: Result<(), ExportError>) {
        let mut state = self.shared.state.lock();
        let report = &mut state.jobs[index];
        report.finished = Some(Instant::now());
        match result {
            Ok(()) => {
                report.status = JobStatus::Completed;
                report.percent = 100.0;
                tracing::info!(job = %id, "batch job completed");
            }
            Err(ExportError::Cancelled) => {
                report.status = JobStatus::Cancelled;
                report.error = Some(ExportError::Cancelled.to_string());
                tracing::info!(job = %id, "batch job cancelled");
            }
            Err(e) => {
                report.status = JobStatus::Failed;
                report.error = Some(e.to_string());
                tracing::warn!(job = %id, "batch job failed: {}", e);
            }
        }
    }
}

/// Relay one job's events until its terminal event.
fn forward(
    events: &Receiver<ExportEvent>,
    id: &str,
    index: usize,
    shared: &Shared,
    tx: &Sender<BatchEvent>,
    run_done: &AtomicBool,
) {
    loop {
        match events.recv_timeout(FORWARD_POLL) {
            Ok(event) => {
                if let ExportEvent::Progress(p) = &event {
                    shared.state.lock().jobs[index].percent = p.percent;
                }
                let terminal = event.is_terminal();
                let _ = tx.send(BatchEvent::Job {
                    id: id.to_string(),
                    event,
                });
                if terminal {
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) if run_done.load(Ordering::Acquire) => return,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
