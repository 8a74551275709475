//! Token escaping
//!
//! Measurements escape commas and spaces. Tag keys, tag values and field
//! keys additionally escape `=`. String field values are double-quoted with
//! `"` and `\` escaped.

/// Position of a token within a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Measurement,
    TagKey,
    TagValue,
    FieldKey,
}

impl Role {
    fn delimiters(self) -> &'static [char] {
        match self {
            Role::Measurement => &[',', ' '],
            Role::TagKey | Role::TagValue | Role::FieldKey => &[',', '=', ' '],
        }
    }
}

/// Escape a raw string for the given role
pub fn escape(raw: &str, role: Role) -> String {
    let delimiters = role.delimiters();
    let mut out = String::with_capacity(raw.len() + 4);

    for c in raw.chars() {
        if delimiters.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }

    out
}

/// Reverse [`escape`]. Backslashes not followed by a delimiter of the role are kept.
pub fn unescape(escaped: &str, role: Role) -> String {
    let delimiters = role.delimiters();
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if delimiters.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}

/// Quote a string field value
pub fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Reverse [`quote`]. Returns `None` when the token is not a quoted string.
pub fn unquote(token: &str) -> Option<String> {
    let inner = token.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }

    Some(out)
}
