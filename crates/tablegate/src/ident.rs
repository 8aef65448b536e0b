//! Validated SQL identifiers.
//!
//! [`Ident`] is a schema/table/column name that is safe to splice into SQL text.
//! Identifiers cannot be bound as parameters, so every table or written column
//! name passes through [`Ident::parse`] before it reaches a statement.
//!
//! - Unquoted parts match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow anything except NUL; `"` is escaped as `""`
//!
//! [`TableRef`] adds an optional alias on top (`users u`, `users AS u`).

use crate::error::{GateError, GateResult};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// One dot-separated part of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Unquoted(String),
    Quoted(String),
}

/// A SQL identifier such as `users`, `public.users` or `"Users"."Id"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier, supporting dotted and quoted forms.
    pub fn parse(s: &str) -> GateResult<Self> {
        if s.is_empty() {
            return Err(GateError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(GateError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();
        loop {
            let part = if chars.peek() == Some(&'"') {
                chars.next();
                parse_quoted(&mut chars)?
            } else {
                parse_unquoted(&mut chars)?
            };
            parts.push(part);

            match chars.next() {
                None => break,
                Some('.') if chars.peek().is_none() => {
                    return Err(GateError::validation(format!(
                        "Trailing '.' in identifier '{s}'"
                    )));
                }
                Some('.') => {}
                Some(c) => {
                    return Err(GateError::validation(format!(
                        "Unexpected '{c}' in identifier '{s}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// The identifier parts, outermost first.
    pub fn parts(&self) -> &[IdentPart] {
        &self.parts
    }

    /// The last part without quoting (the bare column/table name).
    pub fn name(&self) -> &str {
        match self.parts.last() {
            Some(IdentPart::Unquoted(s)) | Some(IdentPart::Quoted(s)) => s,
            None => "",
        }
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    out.push_str(&s.replace('"', "\"\""));
                    out.push('"');
                }
            }
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> GateResult<IdentPart> {
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('"') if chars.peek() == Some(&'"') => {
                chars.next();
                name.push('"');
            }
            Some('"') => break,
            Some(c) => name.push(c),
            None => return Err(GateError::validation("Unclosed quoted identifier")),
        }
    }
    if name.is_empty() {
        return Err(GateError::validation("Empty quoted identifier"));
    }
    Ok(IdentPart::Quoted(name))
}

fn parse_unquoted(chars: &mut Peekable<Chars<'_>>) -> GateResult<IdentPart> {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c == '.' {
            break;
        }
        let ok = if name.is_empty() {
            c == '_' || c.is_ascii_alphabetic()
        } else {
            c == '_' || c == '$' || c.is_ascii_alphanumeric()
        };
        if !ok {
            return Err(GateError::validation(format!(
                "Invalid character in identifier: '{c}'"
            )));
        }
        name.push(c);
        chars.next();
    }
    if name.is_empty() {
        return Err(GateError::validation("Empty identifier segment"));
    }
    Ok(IdentPart::Unquoted(name))
}

/// A table reference with an optional alias, as used in FROM and JOIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: Ident,
    pub alias: Option<Ident>,
}

impl TableRef {
    /// Parse `table`, `table alias` or `table AS alias`.
    pub fn parse(s: &str) -> GateResult<Self> {
        let words = split_unquoted_whitespace(s);
        let (table, alias) = match words.as_slice() {
            [table] => (*table, None),
            [table, alias] => (*table, Some(*alias)),
            [table, kw, alias] if kw.eq_ignore_ascii_case("as") => (*table, Some(*alias)),
            _ => {
                return Err(GateError::validation(format!(
                    "Invalid table reference: '{s}'"
                )));
            }
        };

        let alias = alias.map(Ident::parse).transpose()?;
        if let Some(a) = &alias {
            if a.parts().len() != 1 {
                return Err(GateError::validation(format!(
                    "Table alias cannot be qualified: '{a}'"
                )));
            }
        }

        Ok(Self {
            table: Ident::parse(table)?,
            alias,
        })
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        self.table.write_sql(out);
        if let Some(alias) = &self.alias {
            out.push(' ');
            alias.write_sql(out);
        }
    }
}

/// Split on whitespace outside double quotes, so `"My Table" t` is two words.
fn split_unquoted_whitespace(s: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = None;
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        if c == '"' {
            quoted = !quoted;
        }
        if c.is_whitespace() && !quoted {
            if let Some(from) = start.take() {
                words.push(&s[from..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(from) = start {
        words.push(&s[from..]);
    }
    words
}
