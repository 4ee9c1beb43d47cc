//! Case-insensitive word matching shared by the fetcher and the matcher.

/// True when `needle` occurs in `haystack` with no letter or digit directly
/// on either side. Case-insensitive. An empty needle never matches.
///
/// `"MIT"` matches `"MIT Sloan"` but not `"Smith College"`.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    find_word(&haystack, &needle).is_some()
}

/// Byte offset of the first word-bounded occurrence of `needle` in
/// `haystack`. Both must already be lower-cased.
pub fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .match_indices(needle)
        .map(|(start, _)| start)
        .find(|&start| {
            let before = haystack[..start].chars().next_back();
            let after = haystack[start + needle.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
}

/// JEL-style code match: `"C"` and `"C1"` both match the line
/// `"C1 Econometric Methods"`; other terms fall back to `contains_word`.
pub fn matches_code_line(line: &str, term: &str) -> bool {
    let term = term.trim();
    let looks_like_code = term.len() <= 3
        && term.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && term.chars().skip(1).all(|c| c.is_ascii_digit());
    if looks_like_code {
        if let Some(code) = line.split_whitespace().next() {
            if code.to_ascii_uppercase().starts_with(&term.to_ascii_uppercase()) {
                return true;
            }
        }
    }
    contains_word(line, term)
}
