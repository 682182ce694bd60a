//! Glob patterns over `/`-separated paths
//!
//! Supported syntax:
//! - `*` matches any run of characters inside one path segment
//! - `?` matches a single character other than `/`
//! - `[...]` matches one character of the class, `[!...]` negates it
//! - `**` as a whole segment matches any number of directories, including none

use crate::store::StoreError;
use regex::Regex;

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, StoreError> {
        let source = translate(pattern);
        let regex = Regex::new(&source).map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Whether the pattern contains any wildcard at all
    pub fn is_literal(&self) -> bool {
        !has_wildcards(&self.pattern)
    }

    /// Leading segments without wildcards; every match lives below this
    pub fn literal_prefix(&self) -> &str {
        let mut end: usize = 0;
        for segment in self.pattern.split('/') {
            if has_wildcards(segment) {
                return &self.pattern[..end.saturating_sub(1)];
            }
            end += segment.len() + 1;
        }
        &self.pattern
    }
}

/// Whether `s` contains glob metacharacters
pub fn has_wildcards(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn translate(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split('/').collect();
    let last = segments.len() - 1;
    let mut regex = String::from("^");

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if i == last {
                regex.push_str(".*");
            } else {
                // zero or more whole directories, each with its separator
                regex.push_str("(?:[^/]+/)*");
            }
            continue;
        }
        translate_segment(segment, &mut regex);
        if i != last {
            regex.push('/');
        }
    }

    regex.push('$');
    regex
}

fn translate_segment(segment: &str, regex: &mut String) {
    let chars: Vec<char> = segment.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&chars[i + 1..end], regex);
                    i = end;
                }
                None => regex.push_str(r"\["),
            },
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
        i += 1;
    }
}

/// Index of the `]` closing the class opened at `start`
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    // a leading ']' is a member, not the terminator
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    (i..chars.len()).find(|&j| chars[j] == ']')
}

fn push_class(body: &[char], regex: &mut String) {
    regex.push('[');
    let mut members = body;
    if let Some(('!' | '^', rest)) = body.split_first() {
        regex.push('^');
        members = rest;
    }
    for &c in members {
        match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push(']');
}
