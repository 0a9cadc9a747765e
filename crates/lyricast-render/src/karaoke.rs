//! Per-character fill colors for karaoke highlighting.

use lyricast_core::{Color, SubtitleLine, SubtitleStyle, WordState};

/// Fill color of every character of `line.text` at time `t`.
///
/// Lines without word timings use the style's primary color. With timings,
/// unsung words use the secondary color, sung words the primary, and the
/// active word blends between them by its progress. Characters between words
/// follow the word before them.
pub fn char_colors(line: &SubtitleLine, style: &SubtitleStyle, t: f64) -> Vec<Color> {
    let chars: Vec<char> = line.text.chars().collect();
    if !line.has_karaoke() {
        return vec![style.primary_color; chars.len()];
    }

    let states = line.word_states(t);
    let mut colors = vec![style.secondary_color; chars.len()];
    let mut cursor = 0usize;
    let mut last_end = 0usize;
    let mut last_color = style.secondary_color;

    for (word, state) in line.word_timings.iter().zip(states) {
        let color = highlight_color(style, state);
        let word_chars: Vec<char> = word.word.chars().collect();
        let Some(start) = find_chars(&chars, &word_chars, cursor) else {
            continue;
        };
        let end = start + word_chars.len();
        colors[last_end..start].fill(last_color);
        colors[start..end].fill(color);
        cursor = end;
        last_end = end;
        last_color = color;
    }
    colors[last_end..].fill(last_color);
    colors
}

fn highlight_color(style: &SubtitleStyle, state: WordState) -> Color {
    style
        .secondary_color
        .lerp(&style.primary_color, state.highlight())
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
