//! Declarative query descriptions.
//!
//! A [`QuerySpec`] is plain data: table and column names are kept as the
//! caller wrote them and only validated when the spec is compiled. Specs can be
//! assembled with the consuming builder methods or deserialized from JSON:
//!
//! ```ignore
//! let spec: QuerySpec = serde_json::from_value(json!({
//!     "table": "users u",
//!     "columns": ["u.id", "u.name"],
//!     "joins": [{"joinTable": "orders o", "joinOn": "o.user_id = u.id", "joinType": "left"}],
//!     "filter": {"u.status": "active", "u.age >=": 18},
//!     "like": {"u.lastname": "smi"},
//!     "orderBy": "u.name ASC",
//!     "limit": 20,
//!     "resultShape": "all"
//! }))?;
//! ```

use crate::error::GateError;
use crate::value::Value;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Whether a read returns every matched row or at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    #[default]
    All,
    Single,
}

/// Comparison operator of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    // Longest first so that suffix matching never takes `=` out of `>=`.
    const SUFFIXES: [(&'static str, CmpOp); 7] = [
        ("!=", CmpOp::Ne),
        ("<>", CmpOp::Ne),
        (">=", CmpOp::Gte),
        ("<=", CmpOp::Lte),
        ("=", CmpOp::Eq),
        (">", CmpOp::Gt),
        ("<", CmpOp::Lt),
    ];

    pub fn as_sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }
}

impl FromStr for CmpOp {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CmpOp::SUFFIXES
            .iter()
            .find(|(sym, _)| *sym == s.trim())
            .map(|(_, op)| *op)
            .ok_or_else(|| GateError::validation(format!("Unknown comparison operator '{s}'")))
    }
}

/// `column op value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: CmpOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Build a predicate from a filter key that may carry its operator:
    /// `"status"` means equality, `"age >="` / `"age>="` compare.
    pub fn from_key(key: &str, value: impl Into<Value>) -> Self {
        let key = key.trim();
        let (column, op) = CmpOp::SUFFIXES
            .iter()
            .find_map(|(sym, op)| key.strip_suffix(sym).map(|col| (col.trim_end(), *op)))
            .unwrap_or((key, CmpOp::Eq));
        Self::new(column, op, value)
    }
}

/// An ordered list of predicates.
///
/// How the predicates are combined (AND, OR) depends on which slot of the
/// spec the filter is placed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Vec<Predicate>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: Predicate) -> &mut Self {
        self.0.push(predicate);
        self
    }

    /// Add a predicate from a (possibly operator-suffixed) key.
    pub fn and(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.push(Predicate::from_key(key, value));
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, CmpOp::Eq, value)
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, CmpOp::Ne, value)
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, CmpOp::Gt, value)
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, CmpOp::Gte, value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, CmpOp::Lt, value)
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, CmpOp::Lte, value)
    }

    fn with(mut self, column: &str, op: CmpOp, value: impl Into<Value>) -> Self {
        self.0.push(Predicate::new(column, op, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.0.iter()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Filter(
            iter.into_iter()
                .map(|(k, v)| Predicate::from_key(k.as_ref(), v))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs: Vec<(String, Value)> = deserialize_pairs(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// `column IN (values...)`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InList {
    pub column: String,
    pub values: Vec<Value>,
}

impl InList {
    pub fn new<I>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Which side(s) of a LIKE pattern receive a `%` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wildcard {
    #[default]
    Both,
    Before,
    After,
    None,
}

impl Wildcard {
    /// Escape LIKE metacharacters in `text` and add the wildcards.
    pub fn apply(self, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len() + 2);
        if matches!(self, Wildcard::Both | Wildcard::Before) {
            escaped.push('%');
        }
        for c in text.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        if matches!(self, Wildcard::Both | Wildcard::After) {
            escaped.push('%');
        }
        escaped
    }
}

/// A substring match on one column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LikeTerm {
    pub column: String,
    pub pattern: String,
    #[serde(default)]
    pub side: Wildcard,
}

impl LikeTerm {
    pub fn new(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            pattern: pattern.into(),
            side: Wildcard::Both,
        }
    }

    pub fn side(mut self, side: Wildcard) -> Self {
        self.side = side;
        self
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum JoinKind {
    /// Bare `JOIN` (inner join semantics).
    #[default]
    Plain,
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Plain => "JOIN",
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
        }
    }
}

impl FromStr for JoinKind {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        match normalized.as_str() {
            "" => Ok(JoinKind::Plain),
            "inner" => Ok(JoinKind::Inner),
            "left" | "left outer" => Ok(JoinKind::Left),
            "right" | "right outer" => Ok(JoinKind::Right),
            "full" | "outer" | "full outer" => Ok(JoinKind::Full),
            _ => Err(GateError::validation(format!("Unknown join type '{s}'"))),
        }
    }
}

impl TryFrom<String> for JoinKind {
    type Error = GateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One JOIN entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Join {
    pub join_table: String,
    pub join_on: String,
    #[serde(default)]
    pub join_type: JoinKind,
}

/// Structured description of a read against one primary table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    /// Projected column expressions; empty selects `*`.
    #[serde(default, deserialize_with = "one_or_many")]
    pub columns: Vec<String>,
    /// Primary table, optionally aliased.
    pub table: String,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub or_filter: Filter,
    #[serde(default)]
    pub where_in: Vec<InList>,
    #[serde(default)]
    pub where_not_in: Vec<InList>,
    /// Always wildcarded on both sides.
    #[serde(default, deserialize_with = "like_terms")]
    pub like: Vec<LikeTerm>,
    #[serde(default, deserialize_with = "like_terms")]
    pub or_like: Vec<LikeTerm>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub or_having: Filter,
    #[serde(default, deserialize_with = "one_or_many")]
    pub order_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub result_shape: ResultShape,
}

impl QuerySpec {
    /// Start a spec that selects every column of every row of `table`.
    pub fn new(table: &str) -> Self {
        Self {
            columns: Vec::new(),
            table: table.to_string(),
            joins: Vec::new(),
            filter: Filter::new(),
            or_filter: Filter::new(),
            where_in: Vec::new(),
            where_not_in: Vec::new(),
            like: Vec::new(),
            or_like: Vec::new(),
            group_by: Vec::new(),
            or_having: Filter::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            result_shape: ResultShape::All,
        }
    }

    // ==================== Projection & joins ====================

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn join(mut self, table: &str, on: &str, kind: JoinKind) -> Self {
        self.joins.push(Join {
            join_table: table.to_string(),
            join_on: on.to_string(),
            join_type: kind,
        });
        self
    }

    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.join(table, on, JoinKind::Inner)
    }

    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join(table, on, JoinKind::Left)
    }

    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.join(table, on, JoinKind::Right)
    }

    pub fn full_join(self, table: &str, on: &str) -> Self {
        self.join(table, on, JoinKind::Full)
    }

    // ==================== Predicates ====================

    /// AND a predicate onto the base filter (`"col"` or `"col op"` key).
    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filter.push(Predicate::from_key(key, value));
        self
    }

    /// OR a predicate onto the WHERE chain.
    pub fn or_filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.or_filter.push(Predicate::from_key(key, value));
        self
    }

    pub fn where_in<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_in.push(InList::new(column, values));
        self
    }

    pub fn where_not_in<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_not_in.push(InList::new(column, values));
        self
    }

    /// Substring match, `%pattern%`.
    pub fn like(mut self, column: &str, pattern: &str) -> Self {
        self.like.push(LikeTerm::new(column, pattern));
        self
    }

    pub fn or_like(mut self, column: &str, pattern: &str) -> Self {
        self.or_like.push(LikeTerm::new(column, pattern));
        self
    }

    pub fn or_like_side(mut self, column: &str, pattern: &str, side: Wildcard) -> Self {
        self.or_like.push(LikeTerm::new(column, pattern).side(side));
        self
    }

    // ==================== Grouping, ordering, paging ====================

    pub fn group_by(mut self, expr: &str) -> Self {
        self.group_by.push(expr.to_string());
        self
    }

    pub fn or_having(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.or_having.push(Predicate::from_key(key, value));
        self
    }

    /// Add an ORDER BY term such as `"created_at DESC"`.
    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_by.push(clause.to_string());
        self
    }

    pub fn order_by_asc(self, column: &str) -> Self {
        let clause = format!("{column} ASC");
        self.order_by(&clause)
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        let clause = format!("{column} DESC");
        self.order_by(&clause)
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn shape(mut self, shape: ResultShape) -> Self {
        self.result_shape = shape;
        self
    }

    /// Return at most one row.
    pub fn single(self) -> Self {
        self.shape(ResultShape::Single)
    }
}

/// The predicate subset used by count, update, delete and field lookup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub filter: Filter,
    pub where_in: Vec<InList>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filter.push(Predicate::from_key(key, value));
        self
    }

    pub fn where_in<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.where_in.push(InList::new(column, values));
        self
    }

    /// `true` when no predicate at all has been supplied.
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty() && self.where_in.is_empty()
    }
}

impl From<Filter> for FilterSpec {
    fn from(filter: Filter) -> Self {
        Self {
            filter,
            where_in: Vec::new(),
        }
    }
}

// ==================== serde helpers ====================

/// Deserialize a map into its entries, keeping document order.
fn deserialize_pairs<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of column keys to values")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((k, v)) = map.next_entry::<String, V>()? {
                out.push((k, v));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(PairsVisitor(PhantomData))
}

/// `{"column": "pattern"}` or a list of full [`LikeTerm`] objects.
fn like_terms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<LikeTerm>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Terms(Vec<LikeTerm>),
        Map(#[serde(deserialize_with = "deserialize_pairs")] Vec<(String, String)>),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Terms(terms) => terms,
        Repr::Map(pairs) => pairs
            .into_iter()
            .map(|(column, pattern)| LikeTerm::new(column, pattern))
            .collect(),
    })
}

/// A single string or a list of strings.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::One(s) => vec![s],
        Repr::Many(v) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keys_carry_operators() {
        let p = Predicate::from_key("age >=", 18i32);
        assert_eq!((p.column.as_str(), p.op), ("age", CmpOp::Gte));

        let p = Predicate::from_key("name!=", "Joe");
        assert_eq!((p.column.as_str(), p.op), ("name", CmpOp::Ne));

        let p = Predicate::from_key("name <>", "Joe");
        assert_eq!(p.op, CmpOp::Ne);

        let p = Predicate::from_key(" status ", "active");
        assert_eq!((p.column.as_str(), p.op), ("status", CmpOp::Eq));
    }

    #[test]
    fn wildcard_escapes_metacharacters() {
        assert_eq!(Wildcard::Both.apply("smi"), "%smi%");
        assert_eq!(Wildcard::After.apply("50%_off"), "50\\%\\_off%");
        assert_eq!(Wildcard::Before.apply("a\\b"), "%a\\\\b");
        assert_eq!(Wildcard::None.apply("x"), "x");
    }

    #[test]
    fn join_kind_parsing() {
        assert_eq!("".parse::<JoinKind>().unwrap(), JoinKind::Plain);
        assert_eq!("LEFT".parse::<JoinKind>().unwrap(), JoinKind::Left);
        assert_eq!("left  outer".parse::<JoinKind>().unwrap(), JoinKind::Left);
        assert_eq!("outer".parse::<JoinKind>().unwrap(), JoinKind::Full);
        assert!("sideways".parse::<JoinKind>().is_err());
    }

    #[test]
    fn filter_spec_emptiness() {
        assert!(FilterSpec::new().is_empty());
        assert!(!FilterSpec::new().filter("id", 1i64).is_empty());
        assert!(!FilterSpec::new().where_in("id", [1i64, 2]).is_empty());
    }

    #[test]
    fn deserializes_full_spec() {
        let spec: QuerySpec = serde_json::from_value(serde_json::json!({
            "table": "users u",
            "columns": "u.id, u.name",
            "joins": [{"joinTable": "orders o", "joinOn": "o.user_id = u.id", "joinType": "left"}],
            "filter": {"u.status": "active", "u.age >=": 18},
            "orFilter": {"u.role": "admin"},
            "whereIn": [{"column": "u.id", "values": [1, 2, 3]}],
            "like": {"u.lastname": "smi"},
            "orLike": [{"column": "u.email", "pattern": "@example", "side": "before"}],
            "groupBy": ["u.id", "u.name"],
            "orHaving": {"COUNT(o.id) >": 2},
            "orderBy": "u.name ASC",
            "limit": 10,
            "offset": 20,
            "resultShape": "single"
        }))
        .unwrap();

        assert_eq!(spec.columns, vec!["u.id, u.name"]);
        assert_eq!(spec.joins[0].join_type, JoinKind::Left);
        assert_eq!(spec.filter.len(), 2);
        let second = spec.filter.iter().nth(1).unwrap();
        assert_eq!((second.column.as_str(), second.op), ("u.age", CmpOp::Gte));
        assert_eq!(second.value, Value::Int(18));
        assert_eq!(spec.where_in[0].values.len(), 3);
        assert_eq!(spec.like, vec![LikeTerm::new("u.lastname", "smi")]);
        assert_eq!(spec.or_like[0].side, Wildcard::Before);
        assert_eq!(spec.group_by.len(), 2);
        assert_eq!(spec.order_by, vec!["u.name ASC"]);
        assert_eq!((spec.limit, spec.offset), (Some(10), Some(20)));
        assert_eq!(spec.result_shape, ResultShape::Single);
    }

    #[test]
    fn filter_keeps_document_order() {
        let expected = ["zeta", "alpha", "mid >"];
        let from_value: QuerySpec = serde_json::from_value(serde_json::json!({
            "table": "t",
            "filter": {"zeta": 1, "alpha": 2, "mid >": 3}
        }))
        .unwrap();
        let from_str: QuerySpec =
            serde_json::from_str(r#"{"table": "t", "filter": {"zeta": 1, "alpha": 2, "mid >": 3}}"#)
                .unwrap();
        for spec in [from_value, from_str] {
            let keys: Vec<String> = spec
                .filter
                .iter()
                .map(|p| match p.op {
                    CmpOp::Eq => p.column.clone(),
                    op => format!("{} {}", p.column, op.as_sql()),
                })
                .collect();
            assert_eq!(keys, expected);
        }
    }

    #[test]
    fn table_only_spec_deserializes_with_defaults() {
        let spec: QuerySpec = serde_json::from_str(r#"{"table": "users"}"#).unwrap();
        assert_eq!(spec, QuerySpec::new("users"));
    }

    #[test]
    fn missing_table_is_rejected() {
        assert!(serde_json::from_str::<QuerySpec>(r#"{"columns": ["id"]}"#).is_err());
    }
}
