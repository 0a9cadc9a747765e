use std::sync::Arc;

use lyricast_core::hash::hash_frame;
use lyricast_core::{LyricastConfig, Project, SubtitleLine, SubtitleTrack};
use lyricast_fx::{param_map, EffectStack, EffectType};
use lyricast_render::{visible_subtitles, BoxRasterizer, FontLibrary, FrameRenderer};

fn renderer(width: u32, height: u32) -> FrameRenderer {
    FrameRenderer::new(width, height, 30.0, LyricastConfig::default())
        .expect("valid renderer")
        .with_fonts(FontLibrary::with_fallback(Arc::new(BoxRasterizer)))
}

fn ab_project() -> Project {
    Project::new(
        "ab",
        SubtitleTrack::new(vec![
            SubtitleLine::new(0.0, 5.0, "A"),
            SubtitleLine::new(5.0, 10.0, "B"),
        ]),
    )
}

fn shown_at(r: &mut FrameRenderer, project: &Project, t: f64) -> Vec<String> {
    r.render(t, project);
    r.last_rendered().iter().map(|s| s.text.clone()).collect()
}

#[test]
fn test_ab_project_renders_every_frame() {
    let project = ab_project();
    let mut r = renderer(160, 90);
    let total = project.total_frames(30.0);
    assert_eq!(total, 300);
    for i in 0..total {
        r.render(i as f64 / 30.0, &project);
    }
    assert_eq!(r.frames_rendered(), 300);
    assert_eq!(r.drop_count(), 0);
}

#[test]
fn test_ab_project_visibility() {
    let project = ab_project();
    let mut r = renderer(160, 90);
    assert_eq!(shown_at(&mut r, &project, 2.5), vec!["A"]);
    assert_eq!(shown_at(&mut r, &project, 7.5), vec!["B"]);
    assert_eq!(shown_at(&mut r, &project, 5.0), vec!["B"]);
    assert_eq!(shown_at(&mut r, &project, 10.0), vec!["B"]);
    assert!(shown_at(&mut r, &project, 10.5).is_empty());

    let at_boundary: Vec<&str> = visible_subtitles(&project, 5.0)
        .iter()
        .map(|l| l.text.as_str())
        .collect();
    assert_eq!(at_boundary, vec!["B"]);
}

#[test]
fn test_effect_order_changes_frame() {
    let project = ab_project();

    let mut glow_first = EffectStack::new();
    glow_first.add(EffectType::Glow, param_map! {});
    glow_first.add(EffectType::Outline, param_map! {});

    let mut outline_first = EffectStack::new();
    outline_first.add(EffectType::Outline, param_map! {});
    outline_first.add(EffectType::Glow, param_map! {});

    let a = renderer(640, 360).with_effects(glow_first).render(2.5, &project);
    let b = renderer(640, 360).with_effects(outline_first).render(2.5, &project);
    assert_ne!(hash_frame(&a), hash_frame(&b));
}

#[test]
fn test_rendering_is_deterministic() {
    let project = ab_project();
    let mut stack = EffectStack::new();
    stack.apply_preset("karaoke_classic").unwrap();

    let a = renderer(640, 360).with_effects(stack.clone()).render(1.0, &project);
    let b = renderer(640, 360).with_effects(stack).render(1.0, &project);
    assert_eq!(hash_frame(&a), hash_frame(&b));

    let plain = renderer(640, 360).render(1.0, &project);
    assert_ne!(hash_frame(&a), hash_frame(&plain));
}

#[test]
fn test_every_effect_type_renders() {
    let project = ab_project();
    for effect in EffectType::ALL {
        let mut stack = EffectStack::new();
        stack.add(effect, param_map! {});
        let mut r = renderer(320, 180).with_effects(stack);
        let frame = r.render(1.0, &project);
        assert_eq!((frame.width, frame.height), (320, 180), "{}", effect);
        assert_eq!(r.drop_count(), 0, "{}", effect);
    }
}
