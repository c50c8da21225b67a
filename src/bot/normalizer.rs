// src/bot/normalizer.rs - Canonical form of text before any check runs

use unicode_normalization::UnicodeNormalization;

/// Canonicalise raw text: lowercase, fold `ё` to `е` (precomposed or not),
/// turn line breaks into spaces, recompose. Idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut folded = String::with_capacity(lowered.len());
    let mut after_ie = false;

    for c in lowered.nfd() {
        // diaeresis anywhere in the mark cluster of "е"
        if c == '\u{0308}' && after_ie {
            continue;
        }
        if !is_combining_mark(c) {
            after_ie = c == 'е';
        }
        folded.push(match c {
            '\r' | '\n' => ' ',
            other => other,
        });
    }

    folded.nfc().collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Form used for substring lookups: normalized and with all spaces removed
pub fn compact(text: &str) -> String {
    normalize(text).chars().filter(|c| *c != ' ').collect()
}
