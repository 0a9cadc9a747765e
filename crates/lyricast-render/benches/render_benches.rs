use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use lyricast_core::{LyricastConfig, Project, SubtitleLine, SubtitleTrack, WordTiming};
use lyricast_fx::EffectStack;
use lyricast_render::blur::gaussian_blur;
use lyricast_render::text::rasterize_line;
use lyricast_render::{BoxRasterizer, FontLibrary, FrameRenderer};

fn karaoke_project() -> Project {
    let line = SubtitleLine::new(0.0, 4.0, "Never gonna give you up").with_words(vec![
        WordTiming::new("Never", 0.0, 0.5),
        WordTiming::new("gonna", 0.5, 1.0),
        WordTiming::new("give", 1.0, 1.5),
        WordTiming::new("you", 1.5, 2.0),
        WordTiming::new("up", 2.0, 3.0),
    ]);
    Project::new("bench", SubtitleTrack::new(vec![line]))
}

fn renderer(preset: Option<&str>) -> FrameRenderer {
    let mut stack = EffectStack::new();
    if let Some(name) = preset {
        stack.apply_preset(name).unwrap();
    }
    FrameRenderer::new(1280, 720, 30.0, LyricastConfig::default())
        .unwrap()
        .with_fonts(FontLibrary::with_fallback(Arc::new(BoxRasterizer)))
        .with_effects(stack)
}

fn bench_render_pipeline(c: &mut Criterion) {
    let project = karaoke_project();
    let mut group = c.benchmark_group("lyricast_render_pipeline");
    group.sample_size(10);

    for (label, preset) in [
        ("plain_120_frames", None),
        ("karaoke_classic_120_frames", Some("karaoke_classic")),
        ("gaming_fire_120_frames", Some("gaming_fire")),
    ] {
        group.bench_function(label, |b| {
            let mut r = renderer(preset);
            b.iter(|| {
                for i in 0..120 {
                    let _frame = r.render(i as f64 / 30.0, &project);
                }
            });
        });
    }
    group.finish();
}

fn bench_blur(c: &mut Criterion) {
    let text = rasterize_line(&BoxRasterizer, "Never gonna give you up", 64.0).unwrap();
    c.bench_function("gaussian_blur_r8", |b| {
        b.iter(|| gaussian_blur(&text.mask, 8.0));
    });
}

criterion_group!(benches, bench_render_pipeline, bench_blur);
criterion_main!(benches);
