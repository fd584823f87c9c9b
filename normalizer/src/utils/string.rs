//! String and attribute-path helpers

/// Check if `text` starts with `prefix` (case-insensitive, ASCII only).
/// Zero-allocation alternative to `text.to_lowercase().starts_with(prefix)`.
#[inline]
pub fn starts_with_ascii_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Truncate text to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// True for path segments that are list indices (`0`, `12`, ...).
#[inline]
pub fn is_index_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Join a child segment onto a dotted path.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        let mut path = String::with_capacity(parent.len() + 1 + child.len());
        path.push_str(parent);
        path.push('.');
        path.push_str(child);
        path
    }
}

/// Drop list-index segments from a dotted path.
///
/// `choices.0.message.content` and the flat OTel key
/// `gen_ai.prompt.0.content` both reduce to their index-free form.
pub fn schema_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('.').filter(|s| !is_index_segment(s)) {
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}

/// Dotted suffixes of a path, longest first: `a.b.c`, `b.c`, `c`.
pub fn path_suffixes(path: &str) -> impl Iterator<Item = &str> {
    std::iter::once(path)
        .filter(|p| !p.is_empty())
        .chain(path.match_indices('.').map(move |(idx, _)| &path[idx + 1..]))
        .filter(|s| !s.is_empty())
}
/// Dotted prefixes of a path, shortest first: `a`, `a.b`, `a.b.c`.
pub fn path_prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('.')
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
        .filter(|p| !p.is_empty())
}
