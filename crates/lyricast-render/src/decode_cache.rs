//! Decode-ahead cache for video backgrounds.
//!
//! A dedicated decoder thread streams frames from one FFmpeg process into a
//! window of frames around the playhead. The render side never blocks: it
//! takes the exact frame when it is ready, otherwise the newest earlier one.
//! Seeking outside the window restarts the stream at the new position.

use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lyricast_core::{FrameBuffer, LyricastError, LyricastResult, PreviewConfig};

use crate::video_decoder::stream_args;

/// Sequential source of decoded frames.
pub trait FrameStream: Send {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> LyricastResult<Option<FrameBuffer>>;
}

/// Opens a stream positioned at a frame index.
pub trait StreamOpener: Send + Sync {
    fn open(&self, start_index: u64) -> LyricastResult<Box<dyn FrameStream>>;
}

/// Streams a video file through `ffmpeg ... -f rawvideo -pix_fmt rgba -`.
#[derive(Debug, Clone)]
pub struct FfmpegStreamOpener {
    pub ffmpeg_path: PathBuf,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl StreamOpener for FfmpegStreamOpener {
    fn open(&self, start_index: u64) -> LyricastResult<Box<dyn FrameStream>> {
        if !self.path.exists() {
            return Err(LyricastError::asset(
                format!("video file not found: {}", self.path.display()),
                &self.path,
            ));
        }
        let start = start_index as f64 / self.fps;
        let mut child = Command::new(&self.ffmpeg_path)
            .args(stream_args(&self.path, start, self.width, self.height, self.fps))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                LyricastError::Encode(format!(
                    "failed to start {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LyricastError::Encode("ffmpeg stdout not captured".into()))?;
        tracing::debug!(path = %self.path.display(), start, "video decode stream opened");
        Ok(Box::new(FfmpegFrameStream {
            child,
            stdout,
            width: self.width,
            height: self.height,
        }))
    }
}

struct FfmpegFrameStream {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
}

impl FrameStream for FfmpegFrameStream {
    fn next_frame(&mut self) -> LyricastResult<Option<FrameBuffer>> {
        let mut data = vec![0u8; self.width as usize * self.height as usize * 4];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(FrameBuffer::from_rgba(self.width, self.height, data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct CacheState {
    frames: BTreeMap<u64, Arc<FrameBuffer>>,
    requested: u64,
    /// Index the decoder produces next.
    decoded_next: u64,
    restart_at: Option<u64>,
    exhausted: bool,
    shutdown: bool,
}

impl CacheState {
    fn latest_at_or_before(&self, index: u64) -> Option<Arc<FrameBuffer>> {
        self.frames.range(..=index).next_back().map(|(_, f)| f.clone())
    }

    fn evict_behind(&mut self, keep_behind: u64) {
        let floor = self.requested.saturating_sub(keep_behind);
        self.frames = self.frames.split_off(&floor);
    }
}

struct Shared {
    state: Mutex<CacheState>,
    wake: Condvar,
}

pub struct DecodeAheadCache {
    shared: Arc<Shared>,
    ahead: u64,
    keep_behind: u64,
    handle: Option<JoinHandle<()>>,
}

impl DecodeAheadCache {
    /// Start the decoder thread at frame 0.
    pub fn start(opener: Arc<dyn StreamOpener>, config: &PreviewConfig) -> LyricastResult<Self> {
        let ahead = config.decode_ahead_frames.max(1) as u64;
        let keep_behind = config.decode_keep_behind as u64;
        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState {
                frames: BTreeMap::new(),
                requested: 0,
                decoded_next: 0,
                restart_at: None,
                exhausted: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let worker = shared.clone();
        let handle = std::thread::Builder::new()
            .name("lyricast-decode".into())
            .spawn(move || decode_loop(worker, opener, ahead, keep_behind))?;
        Ok(Self {
            shared,
            ahead,
            keep_behind,
            handle: Some(handle),
        })
    }

    /// Frame `index` if decoded, else the newest earlier frame. Never blocks
    /// on decoding.
    pub fn frame_at(&self, index: u64) -> Option<Arc<FrameBuffer>> {
        let mut st = self.shared.state.lock();
        self.request(&mut st, index);
        st.latest_at_or_before(index)
    }

    /// Like [`frame_at`](Self::frame_at) but waits up to `timeout` for the
    /// exact frame.
    pub fn wait_frame(&self, index: u64, timeout: Duration) -> Option<Arc<FrameBuffer>> {
        let deadline = Instant::now() + timeout;
        let mut st = self.shared.state.lock();
        self.request(&mut st, index);
        loop {
            if let Some(frame) = st.frames.get(&index) {
                return Some(frame.clone());
            }
            let past_end = st.exhausted && st.restart_at.is_none() && st.decoded_next <= index;
            if past_end || self.shared.wake.wait_until(&mut st, deadline).timed_out() {
                return st.latest_at_or_before(index);
            }
        }
    }

    pub fn cached_frames(&self) -> usize {
        self.shared.state.lock().frames.len()
    }

    fn request(&self, st: &mut CacheState, index: u64) {
        st.requested = index;
        let missing = !st.frames.contains_key(&index);
        let behind = index < st.decoded_next;
        let far_ahead = index > st.decoded_next + self.ahead && !st.exhausted;
        if missing && (behind || far_ahead) {
            tracing::debug!(from = st.decoded_next, to = index, "video decode seek");
            st.frames.clear();
            st.decoded_next = index;
            st.exhausted = false;
            st.restart_at = Some(index);
        } else {
            st.evict_behind(self.keep_behind);
        }
        self.shared.wake.notify_all();
    }

    /// Stop the decoder thread and wait for it.
    pub fn shutdown(mut self) {
        self.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn signal_shutdown(&self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();
    }
}

impl Drop for DecodeAheadCache {
    fn drop(&mut self) {
        // the thread exits on its own once its current read returns
        self.signal_shutdown();
    }
}

fn decode_loop(shared: Arc<Shared>, opener: Arc<dyn StreamOpener>, ahead: u64, keep_behind: u64) {
    let mut stream: Option<Box<dyn FrameStream>> = None;
    let mut next = 0u64;

    loop {
        {
            let mut st = shared.state.lock();
            loop {
                if st.shutdown {
                    return;
                }
                if let Some(at) = st.restart_at.take() {
                    stream = None;
                    next = at;
                }
                if !st.exhausted && next < st.requested + ahead {
                    break;
                }
                shared.wake.wait(&mut st);
            }
        }

        if stream.is_none() {
            match opener.open(next) {
                Ok(s) => stream = Some(s),
                Err(e) => {
                    tracing::warn!("video background unavailable: {}", e);
                    mark_exhausted(&shared);
                    continue;
                }
            }
        }

        let result = match stream.as_mut() {
            Some(s) => s.next_frame(),
            None => continue,
        };
        match result {
            Ok(Some(frame)) => {
                let mut st = shared.state.lock();
                if st.restart_at.is_none() {
                    st.frames.insert(next, Arc::new(frame));
                    next += 1;
                    st.decoded_next = next;
                    st.evict_behind(keep_behind);
                }
                shared.wake.notify_all();
            }
            Ok(None) => {
                tracing::debug!(frames = next, "video decode stream ended");
                stream = None;
                mark_exhausted(&shared);
            }
            Err(e) => {
                tracing::warn!("video decode failed at frame {}: {}", next, e);
                stream = None;
                mark_exhausted(&shared);
            }
        }
    }
}

fn mark_exhausted(shared: &Shared) {
    let mut st = shared.state.lock();
    if st.restart_at.is_none() {
        st.exhausted = true;
    }
    shared.wake.notify_all();
}
