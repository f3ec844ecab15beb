/// Text measurement: character counts, display widths, caption wrapping,
/// and the script-contamination check for localized tracks.

/// Number of characters that are spoken: all whitespace removed.
pub fn clean_char_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Display width of one character: 2 for East-Asian wide glyphs, 1 otherwise.
pub fn char_width(c: char) -> usize {
    let cp = c as u32;
    let wide = matches!(cp,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x1F300..=0x1F64F
        | 0x1F900..=0x1F9FF
        | 0x20000..=0x2FFFD
        | 0x30000..=0x3FFFD
    );
    if wide {
        2
    } else {
        1
    }
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Wrap a caption to at most two lines.
///
/// Text wider than `max_width` is split at the space closest to the middle
/// of its display width. Without a usable space the text stays on one line;
/// words are never cut.
pub fn wrap_caption(text: &str, max_width: usize) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let total = display_width(&text);
    if total <= max_width {
        return text;
    }

    let half = total as f64 / 2.0;
    let mut best: Option<(usize, f64)> = None;
    let mut width = 0usize;
    for (idx, c) in text.char_indices() {
        if c == ' ' && idx > 0 && idx + 1 < text.len() {
            let distance = (width as f64 - half).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        width += char_width(c);
    }

    match best {
        Some((idx, _)) => format!("{}\n{}", &text[..idx], &text[idx + 1..]),
        None => text,
    }
}

/// Writing systems recognized by the contamination check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Hangul,
    Kana,
    Han,
    Cyrillic,
}

impl Script {
    pub fn of(c: char) -> Option<Script> {
        if !c.is_alphabetic() {
            return None;
        }
        let cp = c as u32;
        match cp {
            0x0041..=0x024F => Some(Self::Latin),
            0x0400..=0x04FF => Some(Self::Cyrillic),
            0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7A3 => Some(Self::Hangul),
            0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Some(Self::Kana),
            0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Some(Self::Han),
            _ => None,
        }
    }

    /// Scripts a track in `lang` is expected to be written in.
    pub fn expected_for(lang: &str) -> &'static [Script] {
        let base = lang.split(['-', '_']).next().unwrap_or(lang);
        match base.to_ascii_lowercase().as_str() {
            "ko" => &[Self::Hangul, Self::Han],
            "ja" => &[Self::Kana, Self::Han],
            "zh" => &[Self::Han],
            "ru" | "uk" | "bg" | "sr" => &[Self::Cyrillic],
            _ => &[Self::Latin],
        }
    }
}

/// Share of recognized letters written in a script foreign to `lang`.
///
/// A purely mechanical localization check: an English track still carrying
/// Hangul scores above zero. Text with no recognized letters scores zero.
pub fn script_contamination_ratio(text: &str, lang: &str) -> f64 {
    let expected = Script::expected_for(lang);
    let mut known = 0usize;
    let mut foreign = 0usize;
    for script in text.chars().filter_map(Script::of) {
        known += 1;
        if !expected.contains(&script) {
            foreign += 1;
        }
    }
    if known == 0 {
        0.0
    } else {
        foreign as f64 / known as f64
    }
}
