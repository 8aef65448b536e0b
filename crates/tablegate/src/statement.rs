//! Parameter-safe statement assembly.
//!
//! [`Sql`] stores text pieces and parameter slots separately and numbers the
//! `$1, $2, ...` placeholders only when rendering, so fragments can be built
//! independently and spliced together in any order.

use crate::fragment::Fragment;
use crate::ident::{Ident, TableRef};
use crate::value::Value;

#[derive(Debug, Clone)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A statement under construction.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

impl Sql {
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, SqlPart::Raw(s) if s.is_empty()))
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    fn push_with(&mut self, write: impl FnOnce(&mut String)) -> &mut Self {
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => write(last),
            _ => {
                let mut s = String::new();
                write(&mut s);
                self.parts.push(SqlPart::Raw(s));
            }
        }
        self
    }

    /// Append a placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders.
    pub fn push_bind_list<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(v);
        }
        self
    }

    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        self.push_with(|out| ident.write_sql(out))
    }

    pub fn push_table(&mut self, table: &TableRef) -> &mut Self {
        self.push_with(|out| table.write_sql(out))
    }

    pub fn push_fragment(&mut self, fragment: &Fragment) -> &mut Self {
        self.push(fragment.as_str())
    }

    /// Append another builder, renumbering its placeholders after ours.
    pub fn push_sql(&mut self, other: Sql) -> &mut Self {
        for part in other.parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.extend(other.params);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    out.push('$');
                    out.push_str(&idx.to_string());
                }
            }
        }
        out
    }

    pub fn build(self) -> Statement {
        Statement {
            sql: self.to_sql(),
            params: self.params,
        }
    }
}

/// Rendered SQL text plus its bound parameters, ready for an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_placeholders_in_order() {
        let mut q = Sql::new("SELECT * FROM users WHERE a = ");
        q.push_bind(1i32).push(" AND b = ").push_bind("x");

        let stmt = q.build();
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE a = $1 AND b = $2");
        assert_eq!(stmt.params, vec![Value::Int(1), Value::from("x")]);
    }

    #[test]
    fn composed_fragments_are_renumbered() {
        let mut w = Sql::empty();
        w.push("id = ").push_bind(42i64);

        let mut q = Sql::new("SELECT * FROM users WHERE status = ");
        q.push_bind("active").push(" AND ").push_sql(w);

        assert_eq!(
            q.to_sql(),
            "SELECT * FROM users WHERE status = $1 AND id = $2"
        );
        assert_eq!(q.param_count(), 2);
    }

    #[test]
    fn bind_list_renders_commas() {
        let mut q = Sql::new("id IN (");
        q.push_bind_list(vec![1i64, 2, 3]).push(")");
        assert_eq!(q.to_sql(), "id IN ($1, $2, $3)");
    }

    #[test]
    fn identifiers_are_written_inline() {
        let mut q = Sql::new("SELECT * FROM ");
        q.push_ident(&Ident::parse(r#"public."Users""#).unwrap());
        assert_eq!(q.to_sql(), r#"SELECT * FROM public."Users""#);
        assert_eq!(q.param_count(), 0);
    }

    #[test]
    fn empty_detection() {
        assert!(Sql::empty().is_empty());
        assert!(Sql::new("").is_empty());
        let mut q = Sql::empty();
        q.push_bind(1i32);
        assert!(!q.is_empty());
    }
}
