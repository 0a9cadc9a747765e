use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lyricast_core::{FrameBuffer, LyricastConfig, LyricastResult, Project};
use lyricast_encode::{
    format_options, quality_presets, CapabilityProbe, ExportEvent, ExportPump, ExportSettings,
    FfmpegLauncher, FrameProducer,
};
use lyricast_fx::{generate, presets, EffectStack};
use lyricast_render::{FrameRenderer, VideoMode};

#[derive(Parser)]
#[command(
    name = "lyricast",
    version,
    about = "Lyricast: karaoke video rendering and export",
    long_about = "Lyricast renders timed lyrics with layered text effects over a color, image or video\nbackground and encodes the result with FFmpeg."
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = LyricastConfig::FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version and engine information
    Info,

    /// Check FFmpeg and report supported codecs and containers
    Doctor,

    /// Print the GLSL generated for an effect preset or effect configuration
    Shader {
        /// Built-in preset name (karaoke_classic, neon_style, ...)
        #[arg(long, conflicts_with = "effects")]
        preset: Option<String>,

        /// Effect configuration JSON exported from an effect stack
        #[arg(long)]
        effects: Option<PathBuf>,

        /// Write vertex.glsl and fragment.glsl here instead of printing
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Render one frame of a project to PNG
    Frame {
        /// Project JSON file
        #[arg()]
        project: PathBuf,

        /// Timestamp in seconds
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,

        #[arg(long, default_value_t = 1280)]
        width: u32,

        #[arg(long, default_value_t = 720)]
        height: u32,

        #[arg(long, conflicts_with = "effects")]
        preset: Option<String>,

        #[arg(long)]
        effects: Option<PathBuf>,
    },

    /// Export a project to a video file
    Export {
        /// Project JSON file
        #[arg()]
        project: PathBuf,

        /// Output video path
        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,

        /// Quality preset, e.g. "HD (1080p)"
        #[arg(short, long)]
        quality: Option<String>,

        /// Container/codec option, e.g. "MKV (H.264)"
        #[arg(short, long)]
        format: Option<String>,

        /// Constant rate factor (0-51); overrides bitrate
        #[arg(long)]
        crf: Option<i32>,

        #[arg(long, conflicts_with = "effects")]
        preset: Option<String>,

        #[arg(long)]
        effects: Option<PathBuf>,
    },

    /// Write a default lyricast.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Info => cmd_info(&cli.config),
        Commands::Doctor => cmd_doctor(&cli.config),
        Commands::Shader {
            preset,
            effects,
            out_dir,
        } => cmd_shader(preset, effects, out_dir),
        Commands::Frame {
            project,
            time,
            output,
            width,
            height,
            preset,
            effects,
        } => cmd_frame(&cli.config, &project, time, &output, (width, height), preset, effects),
        Commands::Export {
            project,
            output,
            quality,
            format,
            crf,
            preset,
            effects,
        } => cmd_export(&cli.config, &project, output, quality, format, crf, preset, effects),
        Commands::InitConfig { force } => cmd_init_config(&cli.config, force),
    }
}

fn load_config(path: &Path) -> Result<LyricastConfig> {
    LyricastConfig::load_or_default(path)
        .with_context(|| format!("failed to load config: {}", path.display()))
}

fn load_project(path: &Path) -> Result<Project> {
    Project::load_json(path).with_context(|| format!("failed to load project: {}", path.display()))
}

fn effect_stack(preset: Option<String>, effects: Option<PathBuf>) -> Result<EffectStack> {
    let mut stack = EffectStack::new();
    if let Some(name) = preset {
        stack.apply_preset(&name).with_context(|| {
            format!("unknown preset '{}' (available: {})", name, presets::names().join(", "))
        })?;
    } else if let Some(path) = effects {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read effects: {}", path.display()))?;
        let count = stack
            .import_configuration(&json)
            .with_context(|| format!("failed to import effects: {}", path.display()))?;
        tracing::debug!(count, "effects imported");
    }
    Ok(stack)
}

fn cmd_info(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let launcher = FfmpegLauncher::from_config(&config.export);
    println!("🎤 Lyricast");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("   Renderer:  CPU compositor, GLSL generator for GPU previews");
    println!("   Encoder:   FFmpeg ({})", launcher.ffmpeg_path().display());
    println!("   Presets:   {}", presets::names().join(", "));
    println!(
        "   Config:    {}",
        if config_path.exists() {
            config_path.display().to_string()
        } else {
            "(defaults)".to_string()
        }
    );
    Ok(())
}

fn cmd_doctor(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let probe = CapabilityProbe::new(
        &config.export.ffmpeg_path,
        Duration::from_secs(config.export.probe_timeout_secs),
    );
    println!("🩺 Lyricast Doctor");
    println!("   FFmpeg path: {}", probe.ffmpeg_path().display());

    let caps = probe.check();
    if !caps.available {
        println!("   FFmpeg: NOT FOUND ✗");
        if let Some(e) = &caps.error {
            println!("   - {}", e);
        }
        println!("   Install FFmpeg (https://ffmpeg.org/download.html) or set export.ffmpeg_path.");
        return Ok(());
    }

    println!(
        "   FFmpeg: {} ✓",
        caps.version.as_deref().unwrap_or("unknown version")
    );
    println!("   Codecs:  {}", caps.codecs.join(", "));
    println!("   Formats: {}", caps.formats.join(", "));
    println!();
    for option in format_options() {
        let ok = caps.supports_codec(option.codec) && caps.supports_format(option.container);
        println!(
            "   {} {:<12} {}",
            if ok { "✓" } else { "✗" },
            option.name,
            option.description
        );
    }
    Ok(())
}

fn cmd_shader(preset: Option<String>, effects: Option<PathBuf>, out_dir: Option<PathBuf>) -> Result<()> {
    let stack = effect_stack(preset, effects)?;
    let shader = generate(&stack.active_layers());

    match out_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            std::fs::write(dir.join("vertex.glsl"), &shader.vertex)?;
            std::fs::write(dir.join("fragment.glsl"), &shader.fragment)?;
            println!("   ✓ Wrote shaders to {}", dir.display());
        }
        None => {
            println!("// vertex shader");
            println!("{}", shader.vertex);
            println!("// fragment shader");
            println!("{}", shader.fragment);
        }
    }
    println!("// fingerprint {}", shader.fingerprint().to_hex());
    Ok(())
}

fn cmd_frame(
    config_path: &Path,
    project_path: &Path,
    time: f64,
    output: &Path,
    (width, height): (u32, u32),
    preset: Option<String>,
    effects: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let project = load_project(project_path)?;
    let mut renderer = FrameRenderer::new(width, height, 30.0, config)?
        .with_effects(effect_stack(preset, effects)?)
        .with_video_mode(VideoMode::Extract);

    let start = Instant::now();
    let frame = renderer.render(time, &project);
    save_png(frame, output)?;
    println!(
        "   ✓ Rendered {:.2}s of '{}' in {:.1}ms → {}",
        time,
        project.name,
        start.elapsed().as_secs_f64() * 1000.0,
        output.display()
    );
    for line in renderer.last_rendered() {
        println!("     \"{}\" at ({}, {})", line.text, line.x, line.y);
    }
    Ok(())
}

fn save_png(frame: FrameBuffer, path: &Path) -> Result<()> {
    let (w, h) = (frame.width, frame.height);
    let image = image::RgbaImage::from_raw(w, h, frame.to_rgba8().into_bytes())
        .context("frame buffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Feeds an export from the frame renderer.
struct RenderProducer<'a> {
    renderer: FrameRenderer,
    project: &'a Project,
}

impl FrameProducer for RenderProducer<'_> {
    fn produce(&mut self, _index: u64, timestamp: f64) -> LyricastResult<FrameBuffer> {
        Ok(self.renderer.render(timestamp, self.project))
    }

    fn fallbacks(&self) -> u64 {
        self.renderer.drop_count()
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_export(
    config_path: &Path,
    project_path: &Path,
    output: PathBuf,
    quality: Option<String>,
    format: Option<String>,
    crf: Option<i32>,
    preset: Option<String>,
    effects: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let project = load_project(project_path)?;

    let mut settings = ExportSettings::new(&output);
    if let Some(name) = quality {
        settings = settings.with_quality_preset(&name).with_context(|| {
            let names: Vec<&str> = quality_presets().iter().map(|p| p.name).collect();
            format!("unknown quality '{}' (available: {})", name, names.join(", "))
        })?;
    }
    if let Some(name) = format {
        let option = format_options()
            .into_iter()
            .find(|f| f.name == name)
            .with_context(|| format!("unknown format '{}'", name))?;
        settings.apply_format(&option);
    }
    if crf.is_some() {
        settings.crf = crf;
    }

    let launcher = Arc::new(FfmpegLauncher::from_config(&config.export));
    let mut pump = ExportPump::new(config.export.clone(), launcher);
    if let Err(e) = pump.setup(&project, settings.clone()) {
        anyhow::bail!("{}\n   hint: {}", e, e.remediation());
    }

    let renderer = FrameRenderer::new(settings.width, settings.height, settings.fps, config)?
        .with_effects(effect_stack(preset, effects)?);
    let mut producer = RenderProducer {
        renderer,
        project: &project,
    };

    println!(
        "▶ Exporting '{}' → {} ({}x{} @ {} fps, {} frames)",
        project.name,
        output.display(),
        settings.width,
        settings.height,
        settings.fps,
        pump.total_frames().unwrap_or(0)
    );

    let events = pump.events();
    let reporter = std::thread::spawn(move || {
        let mut last_report = Instant::now() - Duration::from_secs(1);
        while let Ok(event) = events.recv() {
            match event {
                ExportEvent::Progress(p) if last_report.elapsed() >= Duration::from_secs(1) => {
                    last_report = Instant::now();
                    tracing::info!(
                        "{:5.1}% frame {}/{} | {:.1} fps render | {:.2}x encode | eta {}s | {} dropped",
                        p.percent,
                        p.current_frame,
                        p.total_frames,
                        p.render_fps,
                        p.encoder.speed,
                        p.eta.map(|d| d.as_secs()).unwrap_or(0),
                        p.frame_drops
                    );
                }
                event if event.is_terminal() => break,
                _ => {}
            }
        }
    });

    let result = pump.run(&mut producer);
    let _ = reporter.join();

    match result {
        Ok(path) => {
            println!("   ✓ Exported {}", path.display());
            let fallbacks = producer.renderer.drop_count();
            if fallbacks > 0 {
                println!("   ⚠ {} frames used the fallback background", fallbacks);
            }
            Ok(())
        }
        Err(e) => anyhow::bail!("{}\n   hint: {}", e, e.remediation()),
    }
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    LyricastConfig::default()
        .save_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("   ✓ Wrote {}", path.display());
    Ok(())
}
