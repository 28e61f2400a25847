//! Glob matching for policy conditions
//!
//! Two wildcard forms are supported:
//!
//! - `*` matches any run of characters that does not contain `/`
//! - `**` matches any run of characters, `/` included. When it is the last token of the
//!   pattern it swallows the rest of the value, and a `/` directly after it is optional,
//!   so `refs/**/main` also matches `refs/main`.
//!
//! Every other character matches itself.
//!
//! Matching backtracks over every viable split point, so pathological patterns with many
//! adjacent wildcards are exponential in the worst case. Patterns come from the policy
//! configuration, which is trusted input; token claims are only ever used as the value.

const SEPARATOR: u8 = b'/';

/// Check whether `value` matches the glob `pattern`
pub fn is_match(pattern: &str, value: &str) -> bool {
    match_bytes(pattern.as_bytes(), value.as_bytes())
}

/// Check whether `value` matches at least one of `patterns`
///
/// An empty pattern list never matches.
pub fn is_match_any<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| is_match(pattern.as_ref(), value))
}

fn match_bytes(pattern: &[u8], value: &[u8]) -> bool {
    let mut pi = 0;
    let mut vi = 0;

    loop {
        if pi >= pattern.len() {
            return vi >= value.len();
        }

        if pattern[pi..].starts_with(b"**") {
            pi += 2;

            if pi >= pattern.len() {
                return true;
            }

            // `**/` may match zero segments
            if pattern[pi] == SEPARATOR {
                pi += 1;
            }

            let rest = &pattern[pi..];
            return (vi..=value.len()).any(|start| match_bytes(rest, &value[start..]));
        }

        if pattern[pi] == b'*' {
            pi += 1;
            let rest = &pattern[pi..];

            // Literal text between this `*` and the next separator in the pattern
            let suffix_len = position_of_separator(rest).unwrap_or(rest.len());
            // `*` never crosses a separator in the value
            let window_end = position_of_separator(&value[vi..]).map(|offset| vi + offset);

            if suffix_len == 0 {
                return match window_end {
                    Some(end) => match_bytes(rest, &value[end..]),
                    None => match_bytes(rest, b""),
                };
            }

            let search_end = window_end.unwrap_or(value.len());
            return (vi..=search_end).any(|start| match_bytes(rest, &value[start..]));
        }

        if vi >= value.len() {
            let rest = &pattern[pi..];
            return rest == b"*" || rest == b"**" || rest.is_empty();
        }

        if pattern[pi] != value[vi] {
            return false;
        }

        pi += 1;
        vi += 1;
    }
}

fn position_of_separator(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&byte| byte == SEPARATOR)
}
