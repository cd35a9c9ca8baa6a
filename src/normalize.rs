//! Canonical form for item names before any duplicate comparison.
//!
//! Trim, full-width Latin/digits to half-width, lower-case. Idempotent:
//! `normalize(normalize(s)) == normalize(s)`. Internal whitespace is kept
//! as-is (not collapsed) so that distinct multi-word names stay distinct.

/// Map one full-width form character (U+FF01..U+FF5E) onto its ASCII
/// counterpart; the ideographic space becomes a plain space.
fn to_half_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        '\u{3000}' => ' ',
        _ => c,
    }
}

/// Canonicalize a display string for comparison.
pub fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(to_half_width)
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}
