//! FFmpeg argument construction.

use lyricast_core::Project;

use crate::settings::ExportSettings;

/// Build the FFmpeg invocation for an export. The first element is the
/// program name `ffmpeg`; launchers substitute their configured binary.
///
/// Raw RGBA frames are read from stdin at the configured size and rate. The
/// project's audio file, if any, is muxed in as a second input. CRF rate
/// control replaces bitrate, maxrate and bufsize when set.
pub fn build_command(settings: &ExportSettings, project: &Project) -> Vec<String> {
    let mut args: Vec<String> = Vec::with_capacity(48);
    let mut push = |parts: &[&str]| args.extend(parts.iter().map(|s| s.to_string()));

    push(&["ffmpeg", "-y"]);
    push(&[
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
        &format!("{}x{}", settings.width, settings.height),
        "-r",
        &settings.fps.to_string(),
        "-i",
        "-",
    ]);

    if let Some(audio) = &project.audio_file {
        push(&[
            "-i",
            &audio.path.to_string_lossy(),
            "-c:a",
            &settings.audio_codec,
            "-b:a",
            &format!("{}k", settings.audio_bitrate),
            "-ar",
            &settings.audio_sample_rate.to_string(),
            "-ac",
            &settings.audio_channels.to_string(),
        ]);
    }

    push(&["-c:v", &settings.codec]);
    match settings.crf {
        Some(crf) => push(&["-crf", &crf.to_string()]),
        None => {
            push(&["-b:v", &format!("{}k", settings.bitrate)]);
            if let Some(max) = settings.max_bitrate {
                push(&["-maxrate", &format!("{}k", max)]);
            }
            if let Some(buf) = settings.buffer_size {
                push(&["-bufsize", &format!("{}k", buf)]);
            }
        }
    }

    push(&[
        "-preset",
        &settings.preset,
        "-profile:v",
        &settings.profile,
        "-level",
        &settings.level,
        "-pix_fmt",
        &settings.pixel_format,
    ]);

    match settings.container_format.as_str() {
        "mp4" => push(&["-movflags", "+faststart", "-f", "mp4"]),
        "mkv" => push(&["-f", "matroska"]),
        "avi" => push(&["-f", "avi"]),
        _ => {}
    }

    push(&["-progress", "pipe:2"]);
    args.push(settings.output_path.to_string_lossy().into_owned());
    args
}

/// Render an argv as a single shell-like line for logs.
pub fn display_command(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("\"{}\"", a)
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricast_core::{AudioSource, SubtitleTrack};
    use std::path::PathBuf;

    fn project(audio: bool) -> Project {
        let mut p = Project::new("song", SubtitleTrack::default());
        if audio {
            p.audio_file = Some(AudioSource {
                path: PathBuf::from("/music/song.mp3"),
                duration: Some(180.0),
            });
        }
        p
    }

    fn window<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let i = args.iter().position(|a| a == flag)?;
        args.get(i + 1).map(String::as_str)
    }

    #[test]
    fn test_raw_input_header() {
        let args = build_command(&ExportSettings::new("out.mp4"), &project(false));
        let head: Vec<&str> = args.iter().take(12).map(String::as_str).collect();
        assert_eq!(
            head,
            ["ffmpeg", "-y", "-f", "rawvideo", "-pix_fmt", "rgba", "-s", "1920x1080", "-r", "30", "-i", "-"]
        );
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
        let n = args.len();
        assert_eq!(&args[n - 3..n - 1], ["-progress", "pipe:2"]);
    }

    #[test]
    fn test_bitrate_rate_control() {
        let mut s = ExportSettings::new("out.mp4");
        s.max_bitrate = Some(10000);
        s.buffer_size = Some(16000);
        let args = build_command(&s, &project(false));
        assert_eq!(window(&args, "-b:v"), Some("8000k"));
        assert_eq!(window(&args, "-maxrate"), Some("10000k"));
        assert_eq!(window(&args, "-bufsize"), Some("16000k"));
        assert!(!args.iter().any(|a| a == "-crf"));
        assert_eq!(window(&args, "-movflags"), Some("+faststart"));
    }

    #[test]
    fn test_crf_replaces_bitrate() {
        let mut s = ExportSettings::new("out.mkv");
        s.crf = Some(18);
        s.max_bitrate = Some(10000);
        s.container_format = "mkv".into();
        let args = build_command(&s, &project(false));
        assert_eq!(window(&args, "-crf"), Some("18"));
        assert!(!args.iter().any(|a| a == "-b:v" || a == "-maxrate"));
        assert_eq!(window(&args, "-f").unwrap(), "rawvideo");
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "matroska"));
        assert!(!args.iter().any(|a| a == "-movflags"));
    }

    #[test]
    fn test_audio_input_is_muxed() {
        let args = build_command(&ExportSettings::new("out.mp4"), &project(true));
        let inputs: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(inputs, ["-", "/music/song.mp3"]);
        assert_eq!(window(&args, "-b:a"), Some("128k"));
        assert_eq!(window(&args, "-ar"), Some("44100"));
        assert_eq!(window(&args, "-ac"), Some("2"));
    }

    #[test]
    fn test_fractional_fps() {
        let mut s = ExportSettings::new("out.mp4");
        s.fps = 29.97;
        let args = build_command(&s, &project(false));
        assert_eq!(window(&args, "-r"), Some("29.97"));
    }

    #[test]
    fn test_display_quotes_spaces() {
        let args = vec!["ffmpeg".to_string(), "my song.mp4".to_string()];
        assert_eq!(display_command(&args), "ffmpeg \"my song.mp4\"");
    }
}
