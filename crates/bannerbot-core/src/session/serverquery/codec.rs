//! ServerQuery line format
//!
//! A line is a `|`-separated list of records, each a space-separated list of
//! `key=value` tokens. Values are escaped so they never contain a space,
//! a pipe or a line break.

use crate::session::{Record, ServerEvent};

/// Escape a value for use in a command
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            ' ' => out.push_str("\\s"),
            '|' => out.push_str("\\p"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`]
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('s') => out.push(' '),
            Some('p') => out.push('|'),
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{b}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Build a command line from a name and its parameters
pub fn command(name: &str, params: &[(&str, &str)]) -> String {
    let mut line = name.to_string();
    for (key, value) in params {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&escape(value));
    }
    line
}

/// Parse one record. Tokens without `=` (flags) map to an empty value.
pub fn parse_record(text: &str) -> Record {
    text.split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape(value)),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

/// Parse a data line into its records
pub fn parse_records(line: &str) -> Vec<Record> {
    line.split('|')
        .filter(|part| !part.trim().is_empty())
        .map(parse_record)
        .collect()
}

/// Parse a `notify...` line. Returns `None` for anything else.
pub fn parse_notification(line: &str) -> Option<ServerEvent> {
    let rest = line.strip_prefix("notify")?;
    let (name, fields) = match rest.split_once(' ') {
        Some((name, fields)) => (name, parse_record(fields)),
        None => (rest, Record::new()),
    };
    if name.is_empty() {
        return None;
    }
    Some(ServerEvent::new(name, fields))
}

/// Status of an `error id=.. msg=..` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Error id, 0 on success
    pub code: u32,
    /// Error message
    pub message: String,
}

/// Parse the status line that terminates every reply
pub fn parse_status(line: &str) -> Option<Status> {
    let rest = line.strip_prefix("error ")?;
    let record = parse_record(rest);
    let code = record.get("id")?.parse().ok()?;
    let message = record.get("msg").cloned().unwrap_or_default();
    Some(Status { code, message })
}
