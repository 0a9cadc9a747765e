//! Subtitle data consumed by the renderer.
//!
//! Lines, karaoke word timings and ASS styles come from the editor/parser.
//! The renderer only reads them; nothing here is mutated during a render pass.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{LyricastError, LyricastResult};

/// Timing of one sung word inside a karaoke line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            start_time,
            end_time,
        }
    }

    pub fn validate(&self) -> LyricastResult<()> {
        if self.start_time < 0.0 {
            return Err(LyricastError::invalid(format!(
                "word '{}' starts before zero ({})",
                self.word, self.start_time
            )));
        }
        if self.end_time <= self.start_time {
            return Err(LyricastError::invalid(format!(
                "word '{}' must end after it starts ({} <= {})",
                self.word, self.end_time, self.start_time
            )));
        }
        Ok(())
    }

    /// Highlight state of this word at `t`.
    pub fn state_at(&self, t: f64) -> WordState {
        if t >= self.end_time {
            WordState::Sung
        } else if t >= self.start_time {
            let span = self.end_time - self.start_time;
            let progress = if span > 0.0 {
                ((t - self.start_time) / span) as f32
            } else {
                1.0
            };
            WordState::Active(progress.clamp(0.0, 1.0))
        } else {
            WordState::Unsung
        }
    }
}

/// Karaoke highlight state of a word at a given timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WordState {
    Unsung,
    /// Currently being sung; carries the fraction of the word elapsed.
    Active(f32),
    Sung,
}

impl WordState {
    /// Blend factor from the unsung color (0.0) to the sung color (1.0).
    pub fn highlight(&self) -> f32 {
        match self {
            WordState::Unsung => 0.0,
            WordState::Active(p) => *p,
            WordState::Sung => 1.0,
        }
    }
}

/// One timed subtitle line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleLine {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default = "default_style_name")]
    pub style: String,
    #[serde(default)]
    pub word_timings: Vec<WordTiming>,
}

fn default_style_name() -> String {
    SubtitleStyle::DEFAULT_NAME.to_string()
}

impl SubtitleLine {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
            style: default_style_name(),
            word_timings: Vec::new(),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_words(mut self, words: Vec<WordTiming>) -> Self {
        self.word_timings = words;
        self
    }

    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Closed-interval visibility test.
    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time
    }

    pub fn has_karaoke(&self) -> bool {
        !self.word_timings.is_empty()
    }

    /// Fraction of the line elapsed at `t`, clamped to [0, 1].
    pub fn progress_ratio(&self, t: f64) -> f64 {
        let d = self.duration();
        if d <= 0.0 {
            return if t >= self.start_time { 1.0 } else { 0.0 };
        }
        ((t - self.start_time) / d).clamp(0.0, 1.0)
    }

    /// Highlight state for every timed word, in order.
    pub fn word_states(&self, t: f64) -> Vec<WordState> {
        self.word_timings.iter().map(|w| w.state_at(t)).collect()
    }

    /// Words being sung right now.
    pub fn active_words(&self, t: f64) -> Vec<&WordTiming> {
        self.word_timings
            .iter()
            .filter(|w| matches!(w.state_at(t), WordState::Active(_)))
            .collect()
    }

    pub fn validate(&self) -> LyricastResult<()> {
        if self.start_time < 0.0 || self.end_time < self.start_time {
            return Err(LyricastError::invalid(format!(
                "line '{}' has invalid timing {}..{}",
                self.text, self.start_time, self.end_time
            )));
        }
        for word in &self.word_timings {
            word.validate()?;
        }
        Ok(())
    }
}

/// ASS-style text styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: f32,
    /// Fill color; also the "sung" karaoke color.
    pub primary_color: Color,
    /// Karaoke color for words not yet sung.
    pub secondary_color: Color,
    pub outline_color: Color,
    pub back_color: Color,
    pub bold: bool,
    pub italic: bool,
    pub outline: f32,
    pub shadow: f32,
    /// Numpad layout: 1-3 bottom, 4-6 middle, 7-9 top; left/center/right within a row.
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl SubtitleStyle {
    pub const DEFAULT_NAME: &'static str = "Default";

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            font_name: "Arial".to_string(),
            font_size: 20.0,
            primary_color: Color::WHITE,
            secondary_color: Color::RED,
            outline_color: Color::BLACK,
            back_color: Color::rgba(0.0, 0.0, 0.0, 127.0 / 255.0),
            bold: false,
            italic: false,
            outline: 2.0,
            shadow: 0.0,
            alignment: 2,
            margin_l: 10,
            margin_r: 10,
            margin_v: 10,
        }
    }
}

/// The subtitle file a project consumes: lines plus named styles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub lines: Vec<SubtitleLine>,
    #[serde(default)]
    pub styles: Vec<SubtitleStyle>,
}

impl SubtitleTrack {
    pub fn new(lines: Vec<SubtitleLine>) -> Self {
        Self {
            lines,
            styles: Vec::new(),
        }
    }

    /// Style lookup: exact name, then "Default", then the built-in default.
    pub fn style(&self, name: &str) -> std::borrow::Cow<'_, SubtitleStyle> {
        self.styles
            .iter()
            .find(|s| s.name == name)
            .or_else(|| {
                self.styles
                    .iter()
                    .find(|s| s.name == SubtitleStyle::DEFAULT_NAME)
            })
            .map(std::borrow::Cow::Borrowed)
            .unwrap_or_else(|| std::borrow::Cow::Owned(SubtitleStyle::default()))
    }

    /// Lines visible at `t`.
    ///
    /// Visibility is a closed interval on both ends. When one line ends exactly
    /// where the next begins, only the line starting at `t` is returned.
    pub fn visible_lines(&self, t: f64) -> Vec<&SubtitleLine> {
        let candidates: Vec<&SubtitleLine> =
            self.lines.iter().filter(|l| l.contains(t)).collect();
        let starts_here = candidates.iter().any(|l| l.start_time == t);
        if !starts_here {
            return candidates;
        }
        candidates
            .into_iter()
            .filter(|l| !(l.end_time == t && l.start_time < t))
            .collect()
    }

    /// End of the last line, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.lines
            .iter()
            .map(|l| l.end_time)
            .fold(None, |acc, e| Some(acc.map_or(e, |a: f64| a.max(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_track() -> SubtitleTrack {
        SubtitleTrack::new(vec![
            SubtitleLine::new(0.0, 5.0, "A"),
            SubtitleLine::new(5.0, 10.0, "B"),
        ])
    }

    fn texts(lines: Vec<&SubtitleLine>) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_visible_inside_interval() {
        let track = ab_track();
        assert_eq!(texts(track.visible_lines(2.5)), vec!["A"]);
        assert_eq!(texts(track.visible_lines(7.5)), vec!["B"]);
    }

    #[test]
    fn test_visible_shared_boundary_prefers_starting_line() {
        let track = ab_track();
        assert_eq!(texts(track.visible_lines(5.0)), vec!["B"]);
    }

    #[test]
    fn test_visible_closed_ends() {
        let track = ab_track();
        assert_eq!(texts(track.visible_lines(0.0)), vec!["A"]);
        assert_eq!(texts(track.visible_lines(10.0)), vec!["B"]);
        assert!(track.visible_lines(10.01).is_empty());
    }

    #[test]
    fn test_word_states() {
        let line = SubtitleLine::new(0.0, 3.0, "la la la").with_words(vec![
            WordTiming::new("la", 0.0, 1.0),
            WordTiming::new("la", 1.0, 2.0),
            WordTiming::new("la", 2.0, 3.0),
        ]);
        let states = line.word_states(1.5);
        assert_eq!(states[0], WordState::Sung);
        assert_eq!(states[1], WordState::Active(0.5));
        assert_eq!(states[2], WordState::Unsung);
        assert_eq!(line.active_words(1.5).len(), 1);
        // a word is fully sung exactly at its end time
        assert_eq!(line.word_states(2.0)[1], WordState::Sung);
    }

    #[test]
    fn test_progress_ratio() {
        let line = SubtitleLine::new(2.0, 4.0, "x");
        assert_eq!(line.progress_ratio(1.0), 0.0);
        assert!((line.progress_ratio(3.0) - 0.5).abs() < 1e-9);
        assert_eq!(line.progress_ratio(9.0), 1.0);
    }

    #[test]
    fn test_word_timing_validation() {
        assert!(WordTiming::new("a", 0.0, 1.0).validate().is_ok());
        assert!(WordTiming::new("a", -1.0, 1.0).validate().is_err());
        assert!(WordTiming::new("a", 1.0, 1.0).validate().is_err());
        let line = SubtitleLine::new(0.0, 1.0, "a").with_words(vec![WordTiming::new("a", 0.5, 0.2)]);
        assert!(line.validate().is_err());
    }

    #[test]
    fn test_style_lookup_fallbacks() {
        let mut track = ab_track();
        assert_eq!(track.style("Chorus").name, "Default");
        assert_eq!(track.style("Chorus").font_name, "Arial");

        let mut default = SubtitleStyle::default();
        default.font_size = 42.0;
        track.styles.push(default);
        track.styles.push(SubtitleStyle::named("Chorus"));
        assert_eq!(track.style("Chorus").name, "Chorus");
        assert_eq!(track.style("Verse").font_size, 42.0);
    }

    #[test]
    fn test_line_deserializes_with_defaults() {
        let line: SubtitleLine =
            serde_json::from_str(r#"{"start_time":1.0,"end_time":2.0,"text":"hi"}"#).unwrap();
        assert_eq!(line.style, "Default");
        assert!(!line.has_karaoke());
    }

    #[test]
    fn test_track_end_time() {
        assert_eq!(ab_track().end_time(), Some(10.0));
        assert_eq!(SubtitleTrack::default().end_time(), None);
    }
}
