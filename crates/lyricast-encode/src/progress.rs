//! Export progress.
//!
//! Progress is split by owner. [`RenderCounters`] belong to the thread that
//! produces frames, [`EncoderStats`] are written only by the stderr monitor
//! thread behind a mutex, and the writer thread bumps an atomic frame count.
//! [`ProgressSnapshot`] merges the three for display.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Lines of non-progress stderr kept for error classification.
pub const STDERR_TAIL_LINES: usize = 64;

/// Statistics FFmpeg reports through `-progress pipe:2`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncoderStats {
    pub fps: f64,
    /// As reported, e.g. `2048.3kbits/s`.
    pub bitrate: String,
    pub total_size: u64,
    /// Encoded media time in seconds.
    pub out_time_secs: f64,
    /// Encoding speed relative to real time.
    pub speed: f64,
    /// FFmpeg printed `progress=end`.
    pub finished: bool,
}

fn number_or_zero(value: &str) -> f64 {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Apply one `key=value` progress line. Returns false for lines that are not
/// progress output.
pub fn parse_progress_line(line: &str, stats: &mut EncoderStats) -> bool {
    let Some((key, value)) = line.trim().split_once('=') else {
        return false;
    };
    let value = value.trim();
    match key.trim() {
        "fps" => stats.fps = number_or_zero(value),
        "bitrate" => stats.bitrate = value.to_string(),
        "total_size" => stats.total_size = value.parse().unwrap_or(0),
        // Microseconds despite the name.
        "out_time_ms" => stats.out_time_secs = number_or_zero(value) / 1_000_000.0,
        "speed" => stats.speed = number_or_zero(value.trim_end_matches('x')),
        "progress" => stats.finished = value == "end",
        "frame" | "out_time_us" | "out_time" | "dup_frames" | "drop_frames" | "stream_0_0_q" => {}
        _ => return false,
    }
    true
}

/// State written by the monitor thread.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub stats: EncoderStats,
    pub tail: VecDeque<String>,
}

impl MonitorState {
    pub fn ingest(&mut self, line: &str) {
        if parse_progress_line(line, &mut self.stats) {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        tracing::debug!(target: "ffmpeg", "{}", line);
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    pub fn stderr_text(&self) -> String {
        self.tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Read FFmpeg stderr line by line until it closes.
pub fn spawn_monitor(
    stderr: Box<dyn Read + Send>,
    state: Arc<Mutex<MonitorState>>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("lyricast-monitor".into())
        .spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                match line {
                    Ok(line) => state.lock().ingest(&line),
                    Err(e) => {
                        tracing::debug!("stderr monitor stopped: {}", e);
                        break;
                    }
                }
            }
        })
}

/// Frame counters owned by the producing thread.
#[derive(Debug, Clone)]
pub struct RenderCounters {
    pub current_frame: u64,
    pub total_frames: u64,
    pub frame_drops: u64,
    pub started: Instant,
}

impl RenderCounters {
    pub fn new(total_frames: u64) -> Self {
        Self {
            current_frame: 0,
            total_frames,
            frame_drops: 0,
            started: Instant::now(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.current_frame >= self.total_frames
    }

    pub fn snapshot(&self, frames_written: &AtomicU64, encoder: EncoderStats) -> ProgressSnapshot {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let render_fps = if secs > 0.0 {
            self.current_frame as f64 / secs
        } else {
            0.0
        };
        let remaining = self.total_frames.saturating_sub(self.current_frame);
        let eta = (render_fps > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / render_fps));
        let percent = if self.total_frames == 0 {
            100.0
        } else {
            (self.current_frame as f64 / self.total_frames as f64 * 100.0).min(100.0)
        };
        ProgressSnapshot {
            current_frame: self.current_frame,
            total_frames: self.total_frames,
            frames_written: frames_written.load(Ordering::Acquire),
            frame_drops: self.frame_drops,
            elapsed,
            render_fps,
            eta,
            percent,
            encoder,
        }
    }
}

/// Point-in-time view of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub current_frame: u64,
    pub total_frames: u64,
    pub frames_written: u64,
    pub frame_drops: u64,
    pub elapsed: Duration,
    pub render_fps: f64,
    pub eta: Option<Duration>,
    pub percent: f64,
    pub encoder: EncoderStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_block() {
        let block = "frame=120\nfps=29.5\nbitrate=2048.3kbits/s\ntotal_size=1048576\nout_time_ms=4000000\nspeed=1.25x\nprogress=continue\n";
        let mut stats = EncoderStats::default();
        for line in block.lines() {
            assert!(parse_progress_line(line, &mut stats), "{}", line);
        }
        assert_eq!(stats.fps, 29.5);
        assert_eq!(stats.bitrate, "2048.3kbits/s");
        assert_eq!(stats.total_size, 1_048_576);
        assert_eq!(stats.out_time_secs, 4.0);
        assert_eq!(stats.speed, 1.25);
        assert!(!stats.finished);
        assert!(parse_progress_line("progress=end", &mut stats));
        assert!(stats.finished);
    }

    #[test]
    fn test_not_available_values_are_zero() {
        let mut stats = EncoderStats {
            fps: 10.0,
            speed: 2.0,
            ..EncoderStats::default()
        };
        parse_progress_line("fps=N/A", &mut stats);
        parse_progress_line("speed=N/A", &mut stats);
        assert_eq!(stats.fps, 0.0);
        assert_eq!(stats.speed, 0.0);
    }

    #[test]
    fn test_diagnostics_go_to_tail() {
        let mut state = MonitorState::default();
        state.ingest("fps=30");
        state.ingest("[libx264 @ 0x5555] using cpu capabilities: none!");
        state.ingest("");
        state.ingest("out.mp4: Permission denied");
        assert_eq!(state.tail.len(), 2);
        assert!(state.stderr_text().ends_with("Permission denied"));
        for i in 0..200 {
            state.ingest(&format!("line {}", i));
        }
        assert_eq!(state.tail.len(), STDERR_TAIL_LINES);
        assert_eq!(state.tail.back().map(String::as_str), Some("line 199"));
    }

    #[test]
    fn test_snapshot_percent_and_eta() {
        let mut counters = RenderCounters::new(200);
        counters.started = Instant::now() - Duration::from_secs(2);
        counters.current_frame = 50;
        counters.frame_drops = 3;
        let written = AtomicU64::new(47);
        let snap = counters.snapshot(&written, EncoderStats::default());
        assert_eq!(snap.percent, 25.0);
        assert_eq!(snap.frames_written, 47);
        assert!(snap.render_fps > 20.0 && snap.render_fps <= 25.0);
        let eta = snap.eta.unwrap().as_secs_f64();
        assert!(eta > 5.0 && eta < 7.0, "{}", eta);
    }

    #[test]
    fn test_empty_export_is_complete() {
        let counters = RenderCounters::new(0);
        assert!(counters.is_done());
        assert_eq!(counters.snapshot(&AtomicU64::new(0), EncoderStats::default()).percent, 100.0);
    }

    #[test]
    fn test_monitor_thread_reads_until_eof() {
        let state = Arc::new(Mutex::new(MonitorState::default()));
        let input: &'static [u8] = b"speed=3x\nUnknown encoder 'libx265'\n";
        let handle = spawn_monitor(Box::new(input), state.clone()).unwrap();
        handle.join().unwrap();
        let state = state.lock();
        assert_eq!(state.stats.speed, 3.0);
        assert_eq!(state.stderr_text(), "Unknown encoder 'libx265'");
    }
}
