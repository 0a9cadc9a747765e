//! Encoder subprocess seam.
//!
//! The export pump talks to FFmpeg only through [`EncoderLauncher`] and
//! [`EncoderProcess`]. [`FfmpegLauncher`] spawns the real binary;
//! [`MemoryLauncher`] is an in-memory double that records what would have
//! been written and replays scripted stderr, so exports can be exercised
//! without FFmpeg installed.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::capabilities::{Capabilities, CapabilityProbe};
use crate::error::ExportError;

/// Exit code reported for processes ended by a signal.
pub const SIGNAL_EXIT: i32 = -1;

/// Starts encoder processes.
pub trait EncoderLauncher: Send + Sync {
    /// What the encoder supports.
    fn probe(&self) -> Capabilities;

    /// Start an encoder. `args[0]` is the program name and is replaced by the
    /// launcher's own binary.
    fn launch(&self, args: &[String]) -> Result<Box<dyn EncoderProcess>, ExportError>;
}

/// A running encoder.
pub trait EncoderProcess: Send {
    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>>;
    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;
    /// Exit code once exited. Signals map to [`SIGNAL_EXIT`].
    fn try_wait(&mut self) -> io::Result<Option<i32>>;
    fn kill(&mut self) -> io::Result<()>;
}

/// Launches the FFmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    ffmpeg_path: PathBuf,
    probe_timeout: Duration,
}

impl FfmpegLauncher {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, probe_timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            probe_timeout,
        }
    }

    pub fn from_config(config: &lyricast_core::ExportConfig) -> Self {
        Self::new(
            &config.ffmpeg_path,
            Duration::from_secs(config.probe_timeout_secs),
        )
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

impl EncoderLauncher for FfmpegLauncher {
    fn probe(&self) -> Capabilities {
        CapabilityProbe::new(&self.ffmpeg_path, self.probe_timeout).check()
    }

    fn launch(&self, args: &[String]) -> Result<Box<dyn EncoderProcess>, ExportError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(args.iter().skip(1))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExportError::Spawn)?;
        tracing::info!(pid = child.id(), "ffmpeg started");
        Ok(Box::new(FfmpegProcess { child }))
    }
}

struct FfmpegProcess {
    child: Child,
}

impl EncoderProcess for FfmpegProcess {
    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
        self.child
            .stdin
            .take()
            .map(|s| Box::new(s) as Box<dyn Write + Send>)
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(SIGNAL_EXIT)))
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
struct Script {
    capabilities: Capabilities,
    stderr: String,
    exit_code: i32,
    write_delay: Duration,
    fail_after_bytes: Option<usize>,
    spawn_error: Option<String>,
    hang: bool,
}

#[derive(Debug, Default)]
struct Shared {
    launches: Mutex<Vec<Vec<String>>>,
    written: Mutex<Vec<u8>>,
    writes: Mutex<u64>,
    stdin_closed: AtomicBool,
    broken: AtomicBool,
    killed: AtomicBool,
}

/// In-memory encoder double.
///
/// Every launch shares one recording: written bytes, argv and the kill flag.
/// The fake process exits with the scripted code once its stdin is closed or
/// its pipe breaks, unless told to hang.
#[derive(Debug, Clone)]
pub struct MemoryLauncher {
    script: Script,
    shared: Arc<Shared>,
}

impl Default for MemoryLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLauncher {
    pub fn new() -> Self {
        Self {
            script: Script {
                capabilities: Capabilities::full(),
                stderr: String::new(),
                exit_code: 0,
                write_delay: Duration::ZERO,
                fail_after_bytes: None,
                spawn_error: None,
                hang: false,
            },
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.script.capabilities = caps;
        self
    }

    /// Stderr the process prints.
    pub fn with_stderr(mut self, text: impl Into<String>) -> Self {
        self.script.stderr = text.into();
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.script.exit_code = code;
        self
    }

    /// Delay applied to every stdin write, to simulate a slow encoder.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.script.write_delay = delay;
        self
    }

    /// Break the pipe once this many bytes have been accepted.
    pub fn fail_after_bytes(mut self, bytes: usize) -> Self {
        self.script.fail_after_bytes = Some(bytes);
        self
    }

    pub fn fail_to_spawn(mut self, message: impl Into<String>) -> Self {
        self.script.spawn_error = Some(message.into());
        self
    }

    /// Never exit on its own.
    pub fn hang(mut self) -> Self {
        self.script.hang = true;
        self
    }

    pub fn launches(&self) -> Vec<Vec<String>> {
        self.shared.launches.lock().clone()
    }

    pub fn written(&self) -> Vec<u8> {
        self.shared.written.lock().clone()
    }

    /// Number of `write` calls that reached the process.
    pub fn write_calls(&self) -> u64 {
        *self.shared.writes.lock()
    }

    pub fn was_killed(&self) -> bool {
        self.shared.killed.load(Ordering::SeqCst)
    }
}

impl EncoderLauncher for MemoryLauncher {
    fn probe(&self) -> Capabilities {
        self.script.capabilities.clone()
    }

    fn launch(&self, args: &[String]) -> Result<Box<dyn EncoderProcess>, ExportError> {
        if let Some(message) = &self.script.spawn_error {
            return Err(ExportError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                message.clone(),
            )));
        }
        self.shared.launches.lock().push(args.to_vec());
        self.shared.stdin_closed.store(false, Ordering::SeqCst);
        self.shared.broken.store(false, Ordering::SeqCst);
        self.shared.killed.store(false, Ordering::SeqCst);
        self.shared.written.lock().clear();
        Ok(Box::new(MemoryProcess {
            script: self.script.clone(),
            shared: self.shared.clone(),
            stdin_taken: false,
            stderr_taken: false,
        }))
    }
}

struct MemoryProcess {
    script: Script,
    shared: Arc<Shared>,
    stdin_taken: bool,
    stderr_taken: bool,
}

impl EncoderProcess for MemoryProcess {
    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
        if std::mem::replace(&mut self.stdin_taken, true) {
            return None;
        }
        Some(Box::new(MemoryStdin {
            shared: self.shared.clone(),
            delay: self.script.write_delay,
            limit: self.script.fail_after_bytes,
        }))
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        if std::mem::replace(&mut self.stderr_taken, true) {
            return None;
        }
        Some(Box::new(Cursor::new(self.script.stderr.clone().into_bytes())))
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        if self.shared.killed.load(Ordering::SeqCst) {
            return Ok(Some(SIGNAL_EXIT));
        }
        let input_done = self.shared.stdin_closed.load(Ordering::SeqCst)
            || self.shared.broken.load(Ordering::SeqCst);
        if input_done && !self.script.hang {
            Ok(Some(self.script.exit_code))
        } else {
            Ok(None)
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.shared.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryStdin {
    shared: Arc<Shared>,
    delay: Duration,
    limit: Option<usize>,
}

impl Write for MemoryStdin {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.shared.broken.load(Ordering::SeqCst) || self.shared.killed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let mut written = self.shared.written.lock();
        if let Some(limit) = self.limit {
            if written.len() + buf.len() > limit {
                self.shared.broken.store(true, Ordering::SeqCst);
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"));
            }
        }
        written.extend_from_slice(buf);
        *self.shared.writes.lock() += 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryStdin {
    fn drop(&mut self) {
        self.shared.stdin_closed.store(true, Ordering::SeqCst);
    }
}
