//! Display helpers for table cells.

/// Default cell width used by [`truncate_display`] callers.
pub const DEFAULT_DISPLAY_WIDTH: usize = 30;

const ELLIPSIS: &str = "...";

/// Shorten `s` to at most `max` characters followed by `...`.
///
/// Strings that fit are returned unchanged.
#[must_use]
pub fn truncate_display(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &s[..cut]),
        None => s.to_string(),
    }
}

/// Join the lines of `s` into one line.
#[must_use]
pub fn single_line(s: &str) -> String {
    s.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" ")
}
