//! QuerySpec and record-operation compilation.
//!
//! Every optional piece of a spec becomes a [`Clause`] tagged with its
//! [`ClauseKind`]. Clauses are stable-sorted by kind and rendered section by
//! section, so a spec with any subset of pieces always yields SQL in the
//! canonical order:
//!
//! ```text
//! SELECT .. FROM .. JOIN .. WHERE (filter, or_filter, IN, NOT IN, LIKE, OR LIKE)
//! GROUP BY .. HAVING .. ORDER BY .. LIMIT .. OFFSET ..
//! ```
//!
//! The WHERE section is one flat chain: each term carries its own connector and
//! the connector of the first term is dropped.

use crate::config::{GatewayConfig, OrPolicy};
use crate::error::{GateError, GateResult};
use crate::fragment::Fragment;
use crate::ident::{Ident, TableRef};
use crate::query_spec::{CmpOp, FilterSpec, InList, LikeTerm, Predicate, QuerySpec};
use crate::record::Record;
use crate::statement::{Sql, Statement};
use crate::value::Value;


/// Position of a clause in the rendered statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClauseKind {
    Select,
    From,
    Join,
    Where,
    OrWhere,
    WhereIn,
    WhereNotIn,
    Like,
    OrLike,
    GroupBy,
    OrHaving,
    OrderBy,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
}

impl ClauseKind {
    fn section(self) -> Section {
        match self {
            ClauseKind::Select => Section::Select,
            ClauseKind::From => Section::From,
            ClauseKind::Join => Section::Join,
            ClauseKind::Where
            | ClauseKind::OrWhere
            | ClauseKind::WhereIn
            | ClauseKind::WhereNotIn
            | ClauseKind::Like
            | ClauseKind::OrLike => Section::Where,
            ClauseKind::GroupBy => Section::GroupBy,
            ClauseKind::OrHaving => Section::Having,
            ClauseKind::OrderBy => Section::OrderBy,
            ClauseKind::Limit => Section::Limit,
        }
    }

    fn connector(self) -> Connector {
        match self {
            ClauseKind::OrWhere | ClauseKind::OrLike | ClauseKind::OrHaving => Connector::Or,
            _ => Connector::And,
        }
    }
}

impl Section {
    fn opener(self) -> &'static str {
        match self {
            Section::Select => "SELECT ",
            Section::From => "FROM ",
            Section::Where => "WHERE ",
            Section::GroupBy => "GROUP BY ",
            Section::Having => "HAVING ",
            Section::OrderBy => "ORDER BY ",
            Section::Join | Section::Limit => "",
        }
    }

    fn separator(self, connector: Connector) -> &'static str {
        match (self, connector) {
            (Section::Where, Connector::And) => " AND ",
            (Section::Where | Section::Having, Connector::Or) => " OR ",
            (Section::Having, Connector::And) => " AND ",
            (Section::Join | Section::Limit, _) => " ",
            _ => ", ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

/// One rendered piece of a statement.
#[derive(Debug, Clone)]
pub(crate) struct Clause {
    pub(crate) kind: ClauseKind,
    body: Sql,
}

impl Clause {
    fn new(kind: ClauseKind, body: Sql) -> Self {
        Self { kind, body }
    }

    fn raw(kind: ClauseKind, sql: &str) -> Self {
        Self::new(kind, Sql::new(sql))
    }
}

/// Sort clauses into canonical order and render them.
fn render(mut clauses: Vec<Clause>, config: &GatewayConfig) -> GateResult<Sql> {
    clauses.sort_by_key(|c| c.kind);

    let mut out = Sql::empty();
    let mut current: Option<Section> = None;
    for clause in clauses {
        let section = clause.kind.section();
        let connector = clause.kind.connector();
        if current == Some(section) {
            out.push(section.separator(connector));
        } else {
            if section == Section::Where && connector == Connector::Or {
                leading_or(clause.kind, config)?;
            }
            if current.is_some() {
                out.push(" ");
            }
            out.push(section.opener());
            current = Some(section);
        }
        out.push_sql(clause.body);
    }
    Ok(out)
}

fn leading_or(kind: ClauseKind, config: &GatewayConfig) -> GateResult<()> {
    match config.or_policy {
        OrPolicy::Strict => Err(GateError::validation(format!(
            "{kind:?} term cannot open the WHERE clause; add an AND filter before it"
        ))),
        OrPolicy::Permissive => {
            tracing::warn!(
                target: "tablegate",
                kind = ?kind,
                "OR term opens the WHERE clause; its connector is dropped"
            );
            Ok(())
        }
    }
}

// ==================== Clause builders ====================

fn fragment_sql(text: &str) -> GateResult<Sql> {
    let mut sql = Sql::empty();
    sql.push_fragment(&Fragment::parse(text)?);
    Ok(sql)
}

// Operator words a filter key must not end with; the operator is added here.
const KEY_KEYWORDS: [&str; 10] = [
    "IS", "NOT", "NULL", "LIKE", "ILIKE", "IN", "BETWEEN", "SIMILAR", "AND", "OR",
];

fn predicate_sql(predicate: &Predicate) -> GateResult<Sql> {
    let last_word = predicate.column.split_whitespace().next_back().unwrap_or("");
    if KEY_KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(last_word)) {
        return Err(GateError::validation(format!(
            "Filter key '{}' ends with operator '{last_word}'; use a comparison suffix \
             or a null value instead",
            predicate.column
        )));
    }
    let mut sql = fragment_sql(&predicate.column)?;
    if predicate.value.is_null() {
        match predicate.op {
            CmpOp::Eq => sql.push(" IS NULL"),
            CmpOp::Ne => sql.push(" IS NOT NULL"),
            op => {
                return Err(GateError::validation(format!(
                    "Cannot compare '{}' {} NULL",
                    predicate.column,
                    op.as_sql()
                )));
            }
        };
    } else {
        sql.push(" ")
            .push(predicate.op.as_sql())
            .push(" ")
            .push_bind(predicate.value.clone());
    }
    Ok(sql)
}

fn in_list_sql(list: &InList, negated: bool) -> GateResult<Sql> {
    let column = Fragment::parse(&list.column)?;
    if list.values.is_empty() {
        return Ok(Sql::new(if negated { "1=1" } else { "1=0" }));
    }
    let mut sql = Sql::empty();
    sql.push_fragment(&column)
        .push(if negated { " NOT IN (" } else { " IN (" })
        .push_bind_list(list.values.iter().cloned())
        .push(")");
    Ok(sql)
}

fn like_sql(term: &LikeTerm, config: &GatewayConfig) -> GateResult<Sql> {
    let mut sql = fragment_sql(&term.column)?;
    sql.push(" ")
        .push(config.like_case.keyword())
        .push(" ")
        .push_bind(term.side.apply(&term.pattern));
    Ok(sql)
}

fn table_sql(table: &str) -> GateResult<Sql> {
    let mut sql = Sql::empty();
    sql.push_table(&TableRef::parse(table)?);
    Ok(sql)
}

fn limit_sql(limit: Option<i64>, offset: Option<i64>) -> GateResult<Option<Sql>> {
    for (name, n) in [("LIMIT", limit), ("OFFSET", offset)] {
        if let Some(n) = n.filter(|n| *n < 0) {
            return Err(GateError::validation(format!(
                "{name} must not be negative, got {n}"
            )));
        }
    }

    // Zero is an empty fragment: `limit: 0` means no limit.
    let (limit, offset) = (limit.filter(|n| *n > 0), offset.filter(|n| *n > 0));
    let mut sql = Sql::empty();
    if let Some(n) = limit {
        sql.push("LIMIT ").push_bind(n);
    }
    if let Some(n) = offset {
        if limit.is_some() {
            sql.push(" ");
        }
        sql.push("OFFSET ").push_bind(n);
    }
    Ok((!sql.is_empty()).then_some(sql))
}

/// WHERE / WHERE IN clauses of a [`FilterSpec`].
fn filter_clauses(filter: &FilterSpec) -> GateResult<Vec<Clause>> {
    let mut clauses = Vec::with_capacity(filter.filter.len() + filter.where_in.len());
    for p in &filter.filter {
        clauses.push(Clause::new(ClauseKind::Where, predicate_sql(p)?));
    }
    for list in &filter.where_in {
        clauses.push(Clause::new(ClauseKind::WhereIn, in_list_sql(list, false)?));
    }
    Ok(clauses)
}

/// Build the clause list of a read, in no particular order.
pub(crate) fn plan_select(spec: &QuerySpec, config: &GatewayConfig) -> GateResult<Vec<Clause>> {
    let mut clauses = Vec::new();

    if spec.columns.is_empty() {
        clauses.push(Clause::raw(ClauseKind::Select, "*"));
    }
    for col in &spec.columns {
        clauses.push(Clause::new(ClauseKind::Select, fragment_sql(col)?));
    }

    clauses.push(Clause::new(ClauseKind::From, table_sql(&spec.table)?));

    for join in &spec.joins {
        let mut sql = Sql::new(join.join_type.as_sql());
        sql.push(" ")
            .push_table(&TableRef::parse(&join.join_table)?)
            .push(" ON ")
            .push_fragment(&Fragment::parse(&join.join_on)?);
        clauses.push(Clause::new(ClauseKind::Join, sql));
    }

    for p in &spec.filter {
        clauses.push(Clause::new(ClauseKind::Where, predicate_sql(p)?));
    }
    for p in &spec.or_filter {
        clauses.push(Clause::new(ClauseKind::OrWhere, predicate_sql(p)?));
    }
    for list in &spec.where_in {
        clauses.push(Clause::new(ClauseKind::WhereIn, in_list_sql(list, false)?));
    }
    for list in &spec.where_not_in {
        clauses.push(Clause::new(ClauseKind::WhereNotIn, in_list_sql(list, true)?));
    }
    for term in &spec.like {
        // `like` is always a both-sided substring match.
        let term = LikeTerm::new(term.column.clone(), term.pattern.clone());
        clauses.push(Clause::new(ClauseKind::Like, like_sql(&term, config)?));
    }
    for term in &spec.or_like {
        clauses.push(Clause::new(ClauseKind::OrLike, like_sql(term, config)?));
    }

    for expr in &spec.group_by {
        clauses.push(Clause::new(ClauseKind::GroupBy, fragment_sql(expr)?));
    }
    for p in &spec.or_having {
        clauses.push(Clause::new(ClauseKind::OrHaving, predicate_sql(p)?));
    }
    for expr in &spec.order_by {
        clauses.push(Clause::new(ClauseKind::OrderBy, fragment_sql(expr)?));
    }
    if let Some(sql) = limit_sql(spec.limit, spec.offset)? {
        clauses.push(Clause::new(ClauseKind::Limit, sql));
    }

    Ok(clauses)
}

// ==================== Statements ====================

/// Compile a read.
pub fn select(spec: &QuerySpec, config: &GatewayConfig) -> GateResult<Statement> {
    Ok(render(plan_select(spec, config)?, config)?.build())
}

/// `SELECT COUNT(*) FROM table [WHERE ...]`
pub fn count(table: &str, filter: &FilterSpec, config: &GatewayConfig) -> GateResult<Statement> {
    let mut clauses = vec![
        Clause::raw(ClauseKind::Select, "COUNT(*)"),
        Clause::new(ClauseKind::From, table_sql(table)?),
    ];
    clauses.extend(filter_clauses(filter)?);
    Ok(render(clauses, config)?.build())
}

/// `SELECT field FROM table WHERE ... LIMIT 1`
pub fn lookup(
    field: &str,
    table: &str,
    filter: &FilterSpec,
    config: &GatewayConfig,
) -> GateResult<Statement> {
    let mut clauses = vec![
        Clause::new(ClauseKind::Select, fragment_sql(field)?),
        Clause::new(ClauseKind::From, table_sql(table)?),
        Clause::raw(ClauseKind::Limit, "LIMIT 1"),
    ];
    clauses.extend(filter_clauses(filter)?);
    Ok(render(clauses, config)?.build())
}

fn insert_sql(
    table: &str,
    values: &Record,
    identifier: Option<&str>,
    config: &GatewayConfig,
) -> GateResult<Sql> {
    let table = Ident::parse(table)?;
    let generated = match identifier {
        Some(col) if !values.contains(col) => {
            Some((Ident::parse(col)?, config.uuid_strategy.expr()?))
        }
        Some(col) => {
            tracing::debug!(
                target: "tablegate",
                table = %table,
                column = col,
                "identifier value supplied by caller; not generating one"
            );
            None
        }
        None => None,
    };

    let mut sql = Sql::new("INSERT INTO ");
    sql.push_ident(&table);

    if values.is_empty() && generated.is_none() {
        sql.push(" DEFAULT VALUES");
        return Ok(sql);
    }

    let columns = values
        .columns()
        .map(Ident::parse)
        .collect::<GateResult<Vec<_>>>()?;

    sql.push(" (");
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(col);
    }
    if let Some((col, _)) = &generated {
        if !columns.is_empty() {
            sql.push(", ");
        }
        sql.push_ident(col);
    }

    sql.push(") VALUES (");
    sql.push_bind_list(values.iter().map(|(_, v)| v.clone()));
    if let Some((_, expr)) = &generated {
        if !columns.is_empty() {
            sql.push(", ");
        }
        sql.push(expr);
    }
    sql.push(")");
    Ok(sql)
}

/// `INSERT INTO table (...) VALUES (...)`
///
/// When `identifier` names a column that `values` does not supply, that column
/// is filled by the configured [`UuidStrategy`](crate::UuidStrategy).
pub fn insert(
    table: &str,
    values: &Record,
    identifier: Option<&str>,
    config: &GatewayConfig,
) -> GateResult<Statement> {
    Ok(insert_sql(table, values, identifier, config)?.build())
}

/// [`insert`] followed by `RETURNING identifier`.
pub fn insert_returning(
    table: &str,
    values: &Record,
    identifier: &str,
    config: &GatewayConfig,
) -> GateResult<Statement> {
    let returning = Ident::parse(identifier)?;
    let mut sql = insert_sql(table, values, Some(identifier), config)?;
    sql.push(" RETURNING ").push_ident(&returning);
    Ok(sql.build())
}

fn require_filter(op: &str, filter: &FilterSpec) -> GateResult<()> {
    if filter.is_empty() {
        return Err(GateError::validation(format!(
            "{op} requires at least one filter predicate"
        )));
    }
    Ok(())
}

/// `UPDATE table SET ... WHERE ...`; refuses an empty filter.
pub fn update(
    table: &str,
    values: &Record,
    filter: &FilterSpec,
    config: &GatewayConfig,
) -> GateResult<Statement> {
    let table = Ident::parse(table)?;
    if values.is_empty() {
        return Err(GateError::validation(format!(
            "UPDATE {table} has no values to set"
        )));
    }
    require_filter("UPDATE", filter)?;

    let mut sql = Sql::new("UPDATE ");
    sql.push_ident(&table).push(" SET ");
    for (i, (col, value)) in values.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(&Ident::parse(col)?)
            .push(" = ")
            .push_bind(value.clone());
    }
    sql.push(" ").push_sql(render(filter_clauses(filter)?, config)?);
    Ok(sql.build())
}

/// `DELETE FROM table WHERE ...`; refuses an empty filter.
pub fn delete(table: &str, filter: &FilterSpec, config: &GatewayConfig) -> GateResult<Statement> {
    let table = Ident::parse(table)?;
    require_filter("DELETE", filter)?;

    let mut sql = Sql::new("DELETE FROM ");
    sql.push_ident(&table)
        .push(" ")
        .push_sql(render(filter_clauses(filter)?, config)?);
    Ok(sql.build())
}

/// Ordered, non-dropped column names of `table`.
pub(crate) fn column_names(table: &Ident) -> Statement {
    let mut sql = Sql::new(
        "SELECT a.attname::text AS column_name \
         FROM pg_catalog.pg_attribute a \
         WHERE a.attrelid = to_regclass(",
    );
    sql.push_bind(Value::Text(table.to_sql()))
        .push("::text) AND a.attnum > 0 AND NOT a.attisdropped ORDER BY a.attnum");
    sql.build()
}
