//! Structural SQL text supplied by callers.
//!
//! Select lists, join conditions, GROUP BY / ORDER BY expressions and
//! predicate left-hand sides are structure, not data, so they are spliced into
//! the statement text. A [`Fragment`] is such text after it has been checked
//! for anything that could end the statement, open a comment or start a
//! literal. Values never travel inside a fragment; they are bound parameters.

use crate::error::{GateError, GateResult};
use std::fmt;

const FORBIDDEN_CHARS: &[char] = &[';', '\0', '\'', '"', '`', '\\', '$'];
const FORBIDDEN_SEQS: &[&str] = &["--", "/*", "*/"];

/// Validated structural SQL text (column expression, ON condition, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    /// Validate `text` as a fragment.
    ///
    /// Leading/trailing whitespace is trimmed. Parentheses must balance.
    pub fn parse(text: &str) -> GateResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GateError::validation("SQL fragment cannot be empty"));
        }
        if let Some(c) = text.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(GateError::validation(format!(
                "SQL fragment '{text}' contains forbidden character {c:?}"
            )));
        }
        if let Some(seq) = FORBIDDEN_SEQS.iter().find(|seq| text.contains(*seq)) {
            return Err(GateError::validation(format!(
                "SQL fragment '{text}' contains forbidden sequence '{seq}'"
            )));
        }

        let mut depth: i32 = 0;
        for c in text.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(GateError::validation(format!(
                "SQL fragment '{text}' has unbalanced parentheses"
            )));
        }

        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_expressions() {
        for ok in [
            "id",
            "u.id = o.user_id",
            "COUNT(o.id) AS order_count",
            "users.*",
            "LOWER(email)",
            "created_at DESC",
        ] {
            assert_eq!(Fragment::parse(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(Fragment::parse("  name  ").unwrap().as_str(), "name");
    }

    #[test]
    fn rejects_terminators_comments_and_literals() {
        for bad in [
            "",
            "   ",
            "id; DROP TABLE users",
            "id -- comment",
            "id /* x */",
            "name = 'x'",
            "\"quoted\"",
            "a\\b",
            "id = $1",
        ] {
            assert!(Fragment::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        assert!(Fragment::parse("COUNT(id").is_err());
        assert!(Fragment::parse("id)").is_err());
        assert!(Fragment::parse(")(").is_err());
    }
}
