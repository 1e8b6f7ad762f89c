//! Snippet extraction around the first verbatim query match.

const ELLIPSIS: &str = "...";

/// Builds a short excerpt of `text` for display next to a search hit.
///
/// Texts no longer than `max_chars` are returned whole. Otherwise the window
/// starts `max_chars / 3` characters before the first case-insensitive
/// occurrence of the full query (falling back to its individual terms), or at
/// the start of the text when nothing matches. Works on characters, not bytes.
pub fn snippet(text: &str, query: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let folded: Vec<char> = chars.iter().map(|ch| fold(*ch)).collect();
    let Some(position) = find_query(&folded, query) else {
        let mut out: String = chars[..max_chars].iter().collect();
        out.push_str(ELLIPSIS);
        return out;
    };

    let start = position.saturating_sub(max_chars / 3);
    let end = (start + max_chars).min(chars.len());
    let mut out = String::with_capacity((end - start) * 2 + 2 * ELLIPSIS.len());
    if start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

fn find_query(haystack: &[char], query: &str) -> Option<usize> {
    let whole = query.trim();
    if whole.is_empty() {
        return None;
    }
    let mut needles = vec![whole];
    needles.extend(whole.split_whitespace().filter(|term| term.chars().count() > 1));
    needles.into_iter().find_map(|needle| {
        let needle: Vec<char> = needle.chars().map(fold).collect();
        find_chars(haystack, &needle)
    })
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}
