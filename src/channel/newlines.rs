// src/channel/newlines.rs

//! Newline normalisation shared by the channel buffers and the buffered
//! output accessors.

/// Normalise line terminators to `\n`.
///
/// A run of `\r` characters, optionally followed by one `\n`, becomes a
/// single `\n`. So `\r\n`, a bare `\r`, and `\r\r\n` all yield one break.
pub fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\r' {
            out.push(c);
            continue;
        }
        while chars.peek() == Some(&'\r') {
            chars.next();
        }
        if chars.peek() == Some(&'\n') {
            chars.next();
        }
        out.push('\n');
    }
    out
}

/// Locate the first line terminator in `text`.
///
/// Returns `(content_len, consumed)`: the length of the line content before
/// the terminator and the number of bytes the terminator sequence spans
/// including that content. A trailing run of `\r` is only treated as a
/// terminator when `at_end` is set, since the next chunk may start with the
/// `\n` that completes it.
pub(crate) fn first_line_break(text: &str, at_end: bool) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'\r' || b == b'\n')?;
    if bytes[start] == b'\n' {
        return Some((start, start + 1));
    }

    let mut end = start;
    while end < bytes.len() && bytes[end] == b'\r' {
        end += 1;
    }
    if end == bytes.len() {
        return at_end.then_some((start, end));
    }
    if bytes[end] == b'\n' {
        end += 1;
    }
    Some((start, end))
}
