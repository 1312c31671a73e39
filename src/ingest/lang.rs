// src/ingest/lang.rs
//! Script heuristic deciding whether an item needs translation.

/// Below this share of CJK characters a text is treated as foreign.
pub const CJK_RATIO_THRESHOLD: f32 = 0.10;

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'     // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}'   // Extension A
        | '\u{F900}'..='\u{FAFF}'   // Compatibility Ideographs
        | '\u{20000}'..='\u{2A6DF}' // Extension B
    )
}

/// Share of non-whitespace characters that are CJK ideographs.
pub fn cjk_ratio(text: &str) -> f32 {
    let mut total = 0usize;
    let mut cjk = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_cjk(c) {
            cjk += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    cjk as f32 / total as f32
}

/// Empty text never needs translation.
pub fn needs_translation(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    cjk_ratio(text) < CJK_RATIO_THRESHOLD
}
