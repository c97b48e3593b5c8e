//! URL pattern matching for waits and expectations.

use regex::Regex;

/// Whether `url` satisfies a `wait_for` URL pattern.
///
/// A pattern containing `*` is a glob over the whole URL: `**` matches any
/// characters, `*` any characters except `/`. A plain pattern matches when the
/// URL equals it or ends with it, so a bare path like `/statistics` works.
#[must_use]
pub fn url_matches(url: &str, pattern: &str) -> bool {
    if pattern.contains('*') {
        glob_to_regex(pattern).is_some_and(|re| re.is_match(url))
    } else {
        url == pattern || url.ends_with(pattern)
    }
}

/// Whether `current` satisfies a `url_is` expectation.
///
/// A leading `**` and a trailing `*` are trimmed; an empty remainder always
/// passes, otherwise `current` must end with it.
#[must_use]
pub fn url_suffix_matches(current: &str, expected: &str) -> bool {
    let suffix = expected_suffix(expected);
    suffix.is_empty() || current.ends_with(suffix)
}

/// `expected` with its glob markers trimmed
#[must_use]
pub fn expected_suffix(expected: &str) -> &str {
    let trimmed = expected.strip_prefix("**").unwrap_or(expected);
    trimmed.strip_suffix('*').unwrap_or(trimmed)
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}
