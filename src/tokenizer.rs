//! Splits a raw command line into argument tokens, honoring backslash
//! escaping and double-quote grouping.
//!
//! Mirrors the original shell's hand-rolled `strsplit()`: a delimiter run
//! separates tokens, `\` escapes the one character following it (the
//! backslash itself is dropped), and `"` toggles a quoted mode that
//! suppresses delimiter recognition. Quoted mode is NOT reset at the end of
//! a token — once toggled on it persists across the rest of the line, so a
//! lone unmatched `"` silently swallows every delimiter until end of input.
//! This is the source's actual behavior (flagged as possibly unintentional
//! upstream) and is preserved here rather than "fixed", per the decision
//! recorded in DESIGN.md.

use crate::error::Fatal;

/// Splits `line` into non-empty tokens using any character in `delims` as a
/// separator.
///
/// `delims` must not contain `"` or `\`; using one of those as a delimiter
/// is a programming error, reported as [`Fatal::IllegalDelimiter`].
pub fn tokenize(line: &str, delims: &str) -> Result<Vec<String>, Fatal> {
    if delims.contains('"') || delims.contains('\\') {
        return Err(Fatal::IllegalDelimiter);
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut escaped = false;

    for c in line.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            in_token = true;
            continue;
        }

        if c == '\\' {
            escaped = true;
            in_token = true;
            continue;
        }

        if c == '"' {
            quoted = !quoted;
            in_token = true;
            continue;
        }

        if !quoted && delims.contains(c) {
            if in_token {
                tokens.push(std::mem::take(&mut current));
                in_token = false;
            }
            continue;
        }

        current.push(c);
        in_token = true;
    }

    // A trailing unconsumed backslash contributes nothing further; an
    // unterminated quote simply closes at end of input (both accepted, not
    // an error — see module docs).
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Default delimiter set used by the shell loop: whitespace and the bell
/// character, matching the original's `" \t\v\r\n\a"`.
pub const DEFAULT_DELIMS: &str = " \t\x0b\r\n\x07";

/// Applies the background-suffix rule to an already-tokenized line.
///
/// If the final token is exactly `"&"`, it is dropped. If it merely ends in
/// `&`, the trailing `&` is stripped from that token. Either way the line is
/// marked background; otherwise it runs in the foreground.
pub fn split_background(mut tokens: Vec<String>) -> (Vec<String>, bool) {
    match tokens.last() {
        Some(last) if last == "&" => {
            tokens.pop();
            (tokens, true)
        }
        Some(last) if last.ends_with('&') => {
            let trimmed = last[..last.len() - 1].to_string();
            let idx = tokens.len() - 1;
            tokens[idx] = trimmed;
            (tokens, true)
        }
        _ => (tokens, false),
    }
}
