//! Export frame pump.
//!
//! ```text
//! Idle -> Configuring -> Running -> Completing -> Idle
//!                                \-> Cancelling -> Idle
//! ```
//!
//! [`ExportPump::setup`] validates settings against the encoder's
//! capabilities. [`ExportPump::run`] then starts the encoder, a frame writer
//! thread draining a bounded queue into its stdin and a monitor thread
//! parsing its stderr, and produces frames in index order on the calling
//! thread. Every run ends with exactly one terminal [`ExportEvent`].

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use lyricast_core::{Backpressure, ExportConfig, Project};
use parking_lot::Mutex;

use crate::command::{build_command, display_command};
use crate::error::{classify_stderr, ErrorCategory, ExportError};
use crate::process::{EncoderLauncher, EncoderProcess};
use crate::producer::{raw_frame, FrameProducer};
use crate::progress::{spawn_monitor, EncoderStats, MonitorState, ProgressSnapshot, RenderCounters};
use crate::settings::{validate, ExportSettings};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MONITOR_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Configuring,
    Running,
    Cancelling,
    Completing,
}

impl ExportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportState::Idle => "idle",
            ExportState::Configuring => "configuring",
            ExportState::Running => "running",
            ExportState::Cancelling => "cancelling",
            ExportState::Completing => "completing",
        }
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Started {
        total_frames: u64,
        command: Vec<String>,
    },
    Progress(ProgressSnapshot),
    Completed {
        output_path: PathBuf,
        progress: ProgressSnapshot,
    },
    Failed {
        message: String,
        category: ErrorCategory,
        remediation: String,
        progress: Option<ProgressSnapshot>,
    },
}

impl ExportEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportEvent::Completed { .. } | ExportEvent::Failed { .. })
    }

    pub fn failed(error: &ExportError, progress: Option<ProgressSnapshot>) -> Self {
        ExportEvent::Failed {
            message: error.to_string(),
            category: error.category(),
            remediation: error.remediation(),
            progress,
        }
    }
}

/// Cancels an export and observes its state from any thread.
#[derive(Debug, Clone)]
pub struct ExportHandle {
    cancelled: Arc<AtomicBool>,
    state: Arc<Mutex<ExportState>>,
}

impl ExportHandle {
    /// Request cancellation. Safe to call repeatedly, and a no-op once the
    /// export has finished.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!(state = %self.state(), "export cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock()
    }
}

enum WriterMessage {
    Frame { index: u64, data: Vec<u8> },
    Finish,
}

enum Enqueue {
    Queued,
    Dropped,
    Cancelled,
    Closed,
}

struct Job {
    settings: ExportSettings,
    command: Vec<String>,
    total_frames: u64,
}

/// Drives an export from frame production to encoder exit.
pub struct ExportPump {
    config: ExportConfig,
    launcher: Arc<dyn EncoderLauncher>,
    handle: ExportHandle,
    job: Option<Job>,
    events_tx: Sender<ExportEvent>,
    events_rx: Receiver<ExportEvent>,
}

impl ExportPump {
    pub fn new(config: ExportConfig, launcher: Arc<dyn EncoderLauncher>) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            launcher,
            handle: ExportHandle {
                cancelled: Arc::new(AtomicBool::new(false)),
                state: Arc::new(Mutex::new(ExportState::Idle)),
            },
            job: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ExportState {
        self.handle.state()
    }

    pub fn handle(&self) -> ExportHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Progress and terminal events of every run.
    pub fn events(&self) -> Receiver<ExportEvent> {
        self.events_rx.clone()
    }

    /// The argv prepared by the last successful [`setup`](Self::setup).
    pub fn command(&self) -> Option<&[String]> {
        self.job.as_ref().map(|j| j.command.as_slice())
    }

    pub fn total_frames(&self) -> Option<u64> {
        self.job.as_ref().map(|j| j.total_frames)
    }

    fn set_state(&self, state: ExportState) {
        let mut current = self.handle.state.lock();
        let from = *current;
        tracing::debug!(from = %from, to = %state, "export state");
        *current = state;
    }

    fn emit(&self, event: ExportEvent) {
        // The pump owns a receiver, so the channel never disconnects.
        let _ = self.events_tx.send(event);
    }

    /// Validate settings for `project` and prepare the encoder command.
    /// On error the pump stays idle and nothing is started.
    pub fn setup(&mut self, project: &Project, settings: ExportSettings) -> Result<(), ExportError> {
        let state = self.state();
        if state != ExportState::Idle {
            return Err(ExportError::InvalidState {
                action: "set up an export",
                actual: state.as_str(),
            });
        }
        self.set_state(ExportState::Configuring);

        let caps = self.launcher.probe();
        if !caps.available {
            self.set_state(ExportState::Idle);
            let reason = caps.error.unwrap_or_else(|| "FFmpeg not found".to_string());
            tracing::error!("export setup failed: {}", reason);
            return Err(ExportError::FfmpegUnavailable(reason));
        }
        let errors = validate(&settings, &caps);
        if !errors.is_empty() {
            self.set_state(ExportState::Idle);
            let err = ExportError::InvalidSettings(errors);
            tracing::error!("export setup failed: {}", err);
            return Err(err);
        }

        let total_frames = project.total_frames(settings.fps);
        let command = build_command(&settings, project);
        tracing::info!(
            output = %settings.output_path.display(),
            size = %format!("{}x{}", settings.width, settings.height),
            fps = settings.fps,
            total_frames,
            "export configured"
        );
        tracing::debug!("ffmpeg command: {}", display_command(&command));
        self.handle.cancelled.store(false, Ordering::SeqCst);
        self.job = Some(Job {
            settings,
            command,
            total_frames,
        });
        Ok(())
    }

    /// Run a configured export to completion, failure or cancellation.
    pub fn run(&mut self, producer: &mut dyn FrameProducer) -> Result<PathBuf, ExportError> {
        let state = self.state();
        let job = match (state, self.job.take()) {
            (ExportState::Configuring, Some(job)) => job,
            _ => {
                return Err(ExportError::InvalidState {
                    action: "start an export",
                    actual: state.as_str(),
                })
            }
        };

        self.set_state(ExportState::Running);
        let mut session = match Session::start(self.launcher.as_ref(), &job, &self.config, &self.handle) {
            Ok(session) => session,
            Err(e) => {
                self.set_state(ExportState::Idle);
                tracing::error!("export failed to start: {}", e);
                self.emit_failure(&e, None);
                return Err(e);
            }
        };
        self.emit(ExportEvent::Started {
            total_frames: job.total_frames,
            command: job.command.clone(),
        });

        let mut counters = RenderCounters::new(job.total_frames);
        let pumped = self.pump_frames(&mut session, &job, producer, &mut counters);

        let result = match pumped {
            Ok(()) => {
                self.set_state(ExportState::Completing);
                session.complete(&self.config)
            }
            Err(ExportError::Cancelled) => {
                self.set_state(ExportState::Cancelling);
                session.abort(&self.config);
                Err(ExportError::Cancelled)
            }
            Err(e) => {
                self.set_state(ExportState::Cancelling);
                Err(session.collect_failure(e, &self.config))
            }
        };

        let progress = counters.snapshot(&session.frames_written, session.stats());
        self.set_state(ExportState::Idle);
        match result {
            Ok(()) => {
                let output = job.settings.output_path.clone();
                tracing::info!(
                    output = %output.display(),
                    frames = progress.frames_written,
                    drops = progress.frame_drops,
                    elapsed_ms = progress.elapsed.as_millis() as u64,
                    "export completed"
                );
                self.emit(ExportEvent::Completed {
                    output_path: output.clone(),
                    progress,
                });
                Ok(output)
            }
            Err(e) => {
                if matches!(e, ExportError::Cancelled) {
                    tracing::info!(frames = progress.frames_written, "export cancelled");
                } else {
                    tracing::error!("export failed: {}", e);
                }
                self.emit_failure(&e, Some(progress));
                Err(e)
            }
        }
    }

    fn emit_failure(&self, error: &ExportError, progress: Option<ProgressSnapshot>) {
        self.emit(ExportEvent::failed(error, progress));
    }

    fn pump_frames(
        &self,
        session: &mut Session,
        job: &Job,
        producer: &mut dyn FrameProducer,
        counters: &mut RenderCounters,
    ) -> Result<(), ExportError> {
        let (width, height, fps) = (job.settings.width, job.settings.height, job.settings.fps);
        let every = self.config.progress_every_frames.max(1);

        while !counters.is_done() {
            if self.handle.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            if session.pipe_broken() {
                return Err(ExportError::BrokenPipe(format!(
                    "write failed after {} frames",
                    session.frames_written.load(Ordering::Acquire)
                )));
            }

            let index = counters.current_frame;
            let timestamp = index as f64 / fps;
            counters.current_frame += 1;

            let fallbacks = producer.fallbacks();
            let produced = producer.produce(index, timestamp);
            let degraded = producer.fallbacks() > fallbacks;
            let data = match produced {
                Ok(frame) => {
                    let (fw, fh) = (frame.width, frame.height);
                    let raw = raw_frame(frame, width, height);
                    if raw.is_none() {
                        tracing::warn!(index, "frame is {}x{}, expected {}x{}; dropped", fw, fh, width, height);
                    }
                    raw
                }
                Err(e) => {
                    tracing::warn!(index, "frame production failed, dropped: {}", e);
                    None
                }
            };

            match data {
                None => counters.frame_drops += 1,
                Some(data) => match self.enqueue(session, index, data) {
                    Enqueue::Queued if degraded => {
                        counters.frame_drops += 1;
                        tracing::debug!(index, drops = counters.frame_drops, "fallback frame written");
                    }
                    Enqueue::Queued => {}
                    Enqueue::Dropped => {
                        counters.frame_drops += 1;
                        tracing::debug!(index, drops = counters.frame_drops, "frame queue full, dropped");
                    }
                    Enqueue::Cancelled => return Err(ExportError::Cancelled),
                    Enqueue::Closed => {
                        return Err(ExportError::BrokenPipe(format!(
                            "frame writer stopped at frame {}",
                            index
                        )))
                    }
                },
            }

            if counters.current_frame % every == 0 || counters.is_done() {
                self.emit(ExportEvent::Progress(
                    counters.snapshot(&session.frames_written, session.stats()),
                ));
            }
        }
        Ok(())
    }

    fn enqueue(&self, session: &Session, index: u64, data: Vec<u8>) -> Enqueue {
        let Some(queue) = session.queue.as_ref() else {
            return Enqueue::Closed;
        };
        let mut message = WriterMessage::Frame { index, data };
        match self.config.backpressure {
            Backpressure::Drop => {
                let timeout = Duration::from_millis(self.config.enqueue_timeout_ms);
                match queue.send_timeout(message, timeout) {
                    Ok(()) => Enqueue::Queued,
                    Err(SendTimeoutError::Timeout(_)) => Enqueue::Dropped,
                    Err(SendTimeoutError::Disconnected(_)) => Enqueue::Closed,
                }
            }
            Backpressure::Block => {
                let poll = Duration::from_millis(self.config.writer_poll_ms.max(1));
                loop {
                    match queue.send_timeout(message, poll) {
                        Ok(()) => return Enqueue::Queued,
                        Err(SendTimeoutError::Timeout(m)) => {
                            if self.handle.is_cancelled() {
                                return Enqueue::Cancelled;
                            }
                            if session.pipe_broken() {
                                return Enqueue::Closed;
                            }
                            message = m;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => return Enqueue::Closed,
                    }
                }
            }
        }
    }
}

/// Outcome of the writer thread.
type WriterResult = Result<(), std::io::Error>;

/// Encoder process and worker threads of one run. Teardown takes each
/// resource out of its slot, so it runs at most once per resource.
struct Session {
    process: Option<Box<dyn EncoderProcess>>,
    queue: Option<Sender<WriterMessage>>,
    writer: Option<JoinHandle<WriterResult>>,
    monitor: Option<JoinHandle<()>>,
    monitor_state: Arc<Mutex<MonitorState>>,
    frames_written: Arc<AtomicU64>,
    broken: Arc<AtomicBool>,
}

impl Session {
    fn start(
        launcher: &dyn EncoderLauncher,
        job: &Job,
        config: &ExportConfig,
        handle: &ExportHandle,
    ) -> Result<Self, ExportError> {
        let mut process = launcher.launch(&job.command)?;
        let mut session = Session {
            process: None,
            queue: None,
            writer: None,
            monitor: None,
            monitor_state: Arc::new(Mutex::new(MonitorState::default())),
            frames_written: Arc::new(AtomicU64::new(0)),
            broken: Arc::new(AtomicBool::new(false)),
        };

        let stdin = process.take_stdin();
        let stderr = process.take_stderr();
        session.process = Some(process);

        let Some(stdin) = stdin else {
            return Err(ExportError::Resource("encoder stdin is not available".into()));
        };
        if let Some(stderr) = stderr {
            let monitor = spawn_monitor(stderr, session.monitor_state.clone())
                .map_err(|e| ExportError::Resource(format!("cannot start progress monitor: {}", e)))?;
            session.monitor = Some(monitor);
        }

        let (tx, rx) = crossbeam_channel::bounded(config.queue_capacity.max(1));
        let writer = FrameWriter {
            rx,
            stdin,
            frames_written: session.frames_written.clone(),
            broken: session.broken.clone(),
            cancelled: handle.cancelled.clone(),
            poll: Duration::from_millis(config.writer_poll_ms.max(1)),
        };
        let writer = std::thread::Builder::new()
            .name("lyricast-writer".into())
            .spawn(move || writer.run())
            .map_err(|e| ExportError::Resource(format!("cannot start frame writer: {}", e)))?;
        session.writer = Some(writer);
        session.queue = Some(tx);
        Ok(session)
    }

    fn pipe_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    fn stats(&self) -> EncoderStats {
        self.monitor_state.lock().stats.clone()
    }

    fn stderr_text(&self) -> String {
        self.monitor_state.lock().stderr_text()
    }

    /// Close the queue, asking the writer to flush what it holds.
    fn close_queue(&mut self) {
        if let Some(queue) = self.queue.take() {
            let _ = queue.try_send(WriterMessage::Finish);
        }
    }

    fn join_writer(&mut self, timeout: Duration) -> Option<WriterResult> {
        let handle = self.writer.take()?;
        match join_within(handle, timeout) {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_)) => Some(Err(std::io::Error::other("frame writer panicked"))),
            Err(handle) => {
                tracing::warn!("frame writer did not stop within {:?}", timeout);
                self.writer = Some(handle);
                None
            }
        }
    }

    fn join_monitor(&mut self) {
        if let Some(handle) = self.monitor.take() {
            if let Err(handle) = join_within(handle, MONITOR_JOIN_TIMEOUT) {
                tracing::warn!("progress monitor did not stop");
                self.monitor = Some(handle);
            }
        }
    }

    fn wait_exit(&mut self, timeout: Duration) -> Option<i32> {
        let process = self.process.as_mut()?;
        let deadline = Instant::now() + timeout;
        loop {
            match process.try_wait() {
                Ok(Some(code)) => return Some(code),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("cannot poll encoder: {}", e);
                    return None;
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self, wait: Duration) -> Option<i32> {
        let process = self.process.as_mut()?;
        if let Err(e) = process.kill() {
            tracing::warn!("cannot kill encoder: {}", e);
        }
        let code = self.wait_exit(wait);
        if code.is_none() {
            tracing::warn!("encoder still running after kill");
        }
        code
    }

    /// Normal completion: flush queued frames, close stdin and wait for the
    /// encoder to exit.
    fn complete(&mut self, config: &ExportConfig) -> Result<(), ExportError> {
        let join_timeout = Duration::from_secs(config.writer_join_timeout_secs);
        if let Some(queue) = self.queue.take() {
            if queue.send_timeout(WriterMessage::Finish, join_timeout).is_err() {
                tracing::warn!("frame writer stopped before the finish marker");
            }
        }
        let writer = self.join_writer(join_timeout);

        let code = match self.wait_exit(Duration::from_secs(config.exit_wait_timeout_secs)) {
            Some(code) => code,
            None => {
                self.kill(Duration::from_secs(config.kill_wait_secs));
                self.join_monitor();
                return Err(ExportError::Timeout(format!(
                    "FFmpeg did not exit within {} s",
                    config.exit_wait_timeout_secs
                )));
            }
        };
        self.join_monitor();
        self.process = None;

        if code != 0 {
            return Err(self.process_error(code));
        }
        match writer {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(ExportError::BrokenPipe(e.to_string())),
            None => Err(ExportError::Timeout("frame writer did not finish".into())),
        }
    }

    /// Cancellation: stop the writer, give the encoder a grace period to
    /// exit after its stdin closes, then kill it.
    fn abort(&mut self, config: &ExportConfig) {
        let grace = Duration::from_secs(config.terminate_grace_secs);
        self.close_queue();
        self.join_writer(grace);
        if self.wait_exit(grace).is_none() {
            self.kill(Duration::from_secs(config.kill_wait_secs));
        }
        // A writer stuck on a full pipe unblocks once the process is gone.
        self.join_writer(Duration::from_secs(config.kill_wait_secs));
        self.join_monitor();
        self.process = None;
    }

    /// Teardown after a mid-run failure. A non-zero exit is reported with its
    /// classified stderr in place of the original error.
    fn collect_failure(&mut self, error: ExportError, config: &ExportConfig) -> ExportError {
        let grace = Duration::from_secs(config.terminate_grace_secs);
        self.close_queue();
        self.join_writer(grace);
        let code = self.wait_exit(grace);
        if code.is_none() {
            self.kill(Duration::from_secs(config.kill_wait_secs));
        }
        self.join_writer(Duration::from_secs(config.kill_wait_secs));
        self.join_monitor();
        self.process = None;
        match code {
            Some(code) if code != 0 => self.process_error(code),
            _ => error,
        }
    }

    fn process_error(&self, code: i32) -> ExportError {
        let stderr = self.stderr_text();
        let (category, detail) = classify_stderr(&stderr);
        ExportError::Process {
            category,
            detail,
            exit_code: Some(code),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.process.is_some() || self.writer.is_some() {
            self.close_queue();
            self.kill(Duration::from_millis(500));
            self.join_writer(Duration::from_millis(500));
            self.join_monitor();
        }
    }
}

struct FrameWriter {
    rx: Receiver<WriterMessage>,
    stdin: Box<dyn Write + Send>,
    frames_written: Arc<AtomicU64>,
    broken: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    poll: Duration,
}

impl FrameWriter {
    /// Drain the queue into stdin. Returning drops stdin, which closes the
    /// encoder's input.
    fn run(mut self) -> WriterResult {
        let mut last_index: Option<u64> = None;
        loop {
            match self.rx.recv_timeout(self.poll) {
                Ok(WriterMessage::Frame { index, data }) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    debug_assert!(last_index.map_or(true, |last| index > last));
                    if let Err(e) = self.stdin.write_all(&data) {
                        self.broken.store(true, Ordering::Release);
                        tracing::error!(index, "writing frame to encoder failed: {}", e);
                        return Err(e);
                    }
                    last_index = Some(index);
                    self.frames_written.fetch_add(1, Ordering::AcqRel);
                }
                Ok(WriterMessage::Finish) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }
        if let Err(e) = self.stdin.flush() {
            self.broken.store(true, Ordering::Release);
            return Err(e);
        }
        Ok(())
    }
}

/// Join a thread, giving up after `timeout`. The handle comes back if the
/// thread is still running.
fn join_within<T>(
    handle: JoinHandle<T>,
    timeout: Duration,
) -> Result<std::thread::Result<T>, JoinHandle<T>> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(handle);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Ok(handle.join())
}
