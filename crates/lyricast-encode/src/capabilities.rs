//! FFmpeg capability probing.
//!
//! Runs `ffmpeg -version`, `-codecs` and `-formats` and scans the output for a
//! fixed allow-list of codecs and containers. This is substring matching, not
//! a parser for FFmpeg's tables.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Codec names recognized in `ffmpeg -codecs` output.
pub const KNOWN_CODECS: &[&str] = &["libx264", "libx265", "aac"];

/// Container names recognized in `ffmpeg -formats` output.
pub const KNOWN_FORMATS: &[&str] = &["mp4", "mkv", "avi"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub available: bool,
    pub version: Option<String>,
    pub codecs: Vec<String>,
    pub formats: Vec<String>,
    pub error: Option<String>,
}

impl Capabilities {
    /// Capabilities of an FFmpeg that supports everything on the allow-lists.
    pub fn full() -> Self {
        Self {
            available: true,
            version: None,
            codecs: KNOWN_CODECS.iter().map(|s| s.to_string()).collect(),
            formats: KNOWN_FORMATS.iter().map(|s| s.to_string()).collect(),
            error: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn supports_codec(&self, codec: &str) -> bool {
        self.codecs.iter().any(|c| c == codec)
    }

    pub fn supports_format(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f == format)
    }
}

/// Version token following `ffmpeg version`.
pub fn parse_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix("ffmpeg version ")?;
        rest.split_whitespace().next().map(str::to_string)
    })
}

/// Allow-listed codecs mentioned in `ffmpeg -codecs` output. `aac` only
/// counts on lines that also advertise an encoder.
pub fn parse_codecs(output: &str) -> Vec<String> {
    let mut codecs: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !codecs.iter().any(|c| c == name) {
            codecs.push(name.to_string());
        }
    };
    for line in output.lines() {
        if line.contains("libx264") {
            push("libx264");
        }
        if line.contains("libx265") {
            push("libx265");
        }
        if has_word(line, "aac") && line.contains("encoder") {
            push("aac");
        }
    }
    codecs
}

/// Allow-listed containers that FFmpeg can mux, from `ffmpeg -formats`.
///
/// Rows look like ` DE matroska,webm   Matroska / WebM`; the second flag
/// column is `E` when muxing is supported. `matroska` maps to `mkv`.
pub fn parse_formats(output: &str) -> Vec<String> {
    let mut formats: Vec<String> = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(flags), Some(names)) = (parts.next(), parts.next()) else {
            continue;
        };
        let can_mux = flags.len() <= 3 && flags.chars().all(|c| "DE.d".contains(c)) && flags.contains('E');
        if !can_mux {
            continue;
        }
        for name in names.split(',') {
            let name = if name == "matroska" { "mkv" } else { name };
            if KNOWN_FORMATS.contains(&name) && !formats.iter().any(|f| f == name) {
                formats.push(name.to_string());
            }
        }
    }
    formats
}

fn has_word(line: &str, word: &str) -> bool {
    line.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|w| w == word)
}

/// Run a command, killing it once `timeout` elapses.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> std::io::Result<Option<Output>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let mut stdout = child.stdout.take();
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(out) = stdout.as_mut() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let stdout = reader.join().unwrap_or_default();
    Ok(status.map(|status| Output {
        status,
        stdout,
        stderr: Vec::new(),
    }))
}

/// Probes an FFmpeg binary.
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl CapabilityProbe {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Run FFmpeg with `args` and return its stdout, or a user-facing reason.
    fn run(&self, args: &[&str]) -> Result<String, String> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(args);
        match run_with_timeout(&mut command, self.timeout) {
            Ok(Some(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Some(output)) => Err(format!(
                "FFmpeg returned error code {}",
                output.status.code().unwrap_or(-1)
            )),
            Ok(None) => Err("FFmpeg command timed out".to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err("FFmpeg not found in system PATH".to_string())
            }
            Err(e) => Err(format!("error checking FFmpeg: {}", e)),
        }
    }

    pub fn check(&self) -> Capabilities {
        let version_output = match self.run(&["-version"]) {
            Ok(out) => out,
            Err(reason) => return Capabilities::unavailable(reason),
        };

        let mut caps = Capabilities {
            available: true,
            version: parse_version(&version_output),
            ..Capabilities::default()
        };
        match self.run(&["-hide_banner", "-codecs"]) {
            Ok(out) => caps.codecs = parse_codecs(&out),
            Err(e) => tracing::warn!("codec listing failed: {}", e),
        }
        match self.run(&["-hide_banner", "-formats"]) {
            Ok(out) => caps.formats = parse_formats(&out),
            Err(e) => tracing::warn!("format listing failed: {}", e),
        }
        tracing::debug!(
            version = caps.version.as_deref().unwrap_or("unknown"),
            codecs = ?caps.codecs,
            formats = ?caps.formats,
            "ffmpeg capabilities"
        );
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODECS: &str = "\
Codecs:
 D..... = Decoding supported
 .E.... = Encoding supported
 -------
 DEV.LS h264                 H.264 / AVC / MPEG-4 AVC (decoders: h264 h264_v4l2m2m ) (encoders: libx264 libx264rgb h264_v4l2m2m )
 DEV.L. hevc                 H.265 / HEVC (decoders: hevc ) (encoders: libx265 )
 DEA.L. aac                  AAC (Advanced Audio Coding) (decoders: aac aac_fixed ) (encoders: aac )
 D.A.L. aac_latm             AAC LATM (Advanced Audio Coding LATM syntax)
";

    const FORMATS: &str = "\
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
 D  aac             raw ADTS AAC (Advanced Audio Coding)
 DE avi             AVI (Audio Video Interleaved)
 DE matroska,webm   Matroska / WebM
 D  mov,mp4,m4a,3gp,3g2,mj2 QuickTime / MOV
  E mp4             MP4 (MPEG-4 Part 14)
";

    #[test]
    fn test_parse_version() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc";
        assert_eq!(parse_version(out).as_deref(), Some("6.1.1-3ubuntu5"));
        assert_eq!(parse_version("nothing here"), None);
    }

    #[test]
    fn test_parse_codecs() {
        assert_eq!(parse_codecs(CODECS), vec!["libx264", "libx265", "aac"]);
        assert!(parse_codecs(" D.A.L. aac_latm   AAC LATM").is_empty());
    }

    #[test]
    fn test_parse_formats_requires_muxer() {
        let formats = parse_formats(FORMATS);
        assert_eq!(formats, vec!["avi", "mkv", "mp4"]);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let caps = CapabilityProbe::new("/nonexistent/ffmpeg", Duration::from_secs(1)).check();
        assert!(!caps.available);
        assert_eq!(caps.error.as_deref(), Some("FFmpeg not found in system PATH"));
        assert!(caps.codecs.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_binary_reports_exit_code() {
        let probe = CapabilityProbe::new("false", Duration::from_secs(5));
        let caps = probe.check();
        assert!(!caps.available);
        assert_eq!(caps.error.as_deref(), Some("FFmpeg returned error code 1"));
        assert_eq!(probe.run(&["-hide_banner", "-codecs"]).unwrap_err(), caps.error.unwrap());
    }

    #[test]
    fn test_full_supports_allow_list() {
        let caps = Capabilities::full();
        assert!(caps.supports_codec("libx265"));
        assert!(caps.supports_format("mkv"));
        assert!(!caps.supports_codec("libvpx"));
    }
}
