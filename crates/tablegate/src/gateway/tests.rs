use super::*;
use crate::config::OrPolicy;
use crate::statement::Statement;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Records every statement and replies from a script.
#[derive(Default)]
struct MockExecutor {
    statements: Mutex<Vec<Statement>>,
    rows: Mutex<VecDeque<Vec<Record>>>,
    affected: u64,
    columns: Option<Vec<String>>,
}

impl MockExecutor {
    fn new() -> Self {
        Self::default()
    }

    fn returning(rows: Vec<Record>) -> Self {
        let mock = Self::new();
        mock.rows.lock().unwrap().push_back(rows);
        mock
    }

    fn affecting(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            ..Self::default()
        }
    }

    fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    fn last_sql(&self) -> String {
        self.statements().last().map(|s| s.sql.clone()).unwrap_or_default()
    }
}

impl Executor for MockExecutor {
    async fn fetch(&self, stmt: &Statement) -> GateResult<Vec<Record>> {
        self.statements.lock().unwrap().push(stmt.clone());
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, stmt: &Statement) -> GateResult<u64> {
        self.statements.lock().unwrap().push(stmt.clone());
        Ok(self.affected)
    }

    async fn column_names(&self, table: &Ident) -> GateResult<Vec<String>> {
        self.columns
            .clone()
            .ok_or_else(|| GateError::schema(table.to_string(), "unknown table"))
    }
}

fn user(name: &str, status: &str) -> Record {
    Record::new().with("name", name).with("status", status)
}

#[tokio::test]
async fn read_all_returns_every_row() {
    let conn = MockExecutor::returning(vec![user("a", "active"), user("b", "active")]);
    let result = Gateway::new()
        .read(&conn, &QuerySpec::new("users").filter("status", "active"))
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(conn.last_sql(), "SELECT * FROM users WHERE status = $1");
    assert_eq!(conn.statements().len(), 1);
}

#[tokio::test]
async fn read_shapes_are_distinguishable_when_empty() {
    let gw = Gateway::new();

    let all = gw.read(&MockExecutor::new(), &QuerySpec::new("users")).await.unwrap();
    assert_eq!(all, ReadResult::Rows(vec![]));

    let single = gw
        .read(&MockExecutor::new(), &QuerySpec::new("users").single())
        .await
        .unwrap();
    assert_eq!(single, ReadResult::Single(None));
    assert_ne!(all, single);
}

#[tokio::test]
async fn read_single_takes_first_row() {
    let conn = MockExecutor::returning(vec![user("a", "x"), user("b", "y")]);
    let result = Gateway::new()
        .read(&conn, &QuerySpec::new("users").single())
        .await
        .unwrap();
    assert_eq!(result, ReadResult::Single(Some(user("a", "x"))));
    assert_eq!(result.into_first().unwrap().get("name"), Some(&Value::from("a")));
}

#[tokio::test]
async fn read_rejects_invalid_spec_before_executing() {
    let conn = MockExecutor::new();
    let err = Gateway::new()
        .read(&conn, &QuerySpec::new("users; DROP TABLE users"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn strict_or_policy_applies_to_reads() {
    let gw = Gateway::with_config(GatewayConfig::new().or_policy(OrPolicy::Strict));
    let conn = MockExecutor::new();
    assert!(gw
        .read(&conn, &QuerySpec::new("users").or_filter("role", "admin"))
        .await
        .is_err());
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn update_with_empty_filter_never_executes() {
    let conn = MockExecutor::affecting(10);
    let changed = Gateway::new()
        .update(&conn, "users", &Record::new().with("status", "x"), &FilterSpec::new())
        .await
        .unwrap();
    assert!(!changed);
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn delete_with_empty_filter_never_executes() {
    let conn = MockExecutor::affecting(10);
    let deleted = Gateway::new()
        .delete(&conn, "users", &FilterSpec::new())
        .await
        .unwrap();
    assert!(!deleted);
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn update_reports_affected_rows() {
    let gw = Gateway::new();
    let filter = FilterSpec::new().filter("id", 1i64);
    let values = Record::new().with("status", "inactive");

    assert!(gw.update(&MockExecutor::affecting(1), "users", &values, &filter).await.unwrap());
    assert!(!gw.update(&MockExecutor::affecting(0), "users", &values, &filter).await.unwrap());

    let err = gw
        .update(&MockExecutor::new(), "users", &Record::new(), &filter)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn delete_reports_affected_rows() {
    let conn = MockExecutor::affecting(2);
    let deleted = Gateway::new()
        .delete(&conn, "users", &FilterSpec::new().where_in("id", [1i64, 2]))
        .await
        .unwrap();
    assert!(deleted);
    assert_eq!(conn.last_sql(), "DELETE FROM users WHERE id IN ($1, $2)");
}

#[tokio::test]
async fn insert_is_true_only_for_one_row() {
    let gw = Gateway::new();
    let values = Record::new().with("name", "Alice");

    let conn = MockExecutor::affecting(1);
    assert!(gw.insert(&conn, "users", &values, Some("uuid")).await.unwrap());
    assert_eq!(
        conn.last_sql(),
        "INSERT INTO users (name, uuid) VALUES ($1, gen_random_uuid())"
    );

    assert!(!gw.insert(&MockExecutor::affecting(0), "users", &values, None).await.unwrap());
}

#[tokio::test]
async fn insert_returning_yields_identifier() {
    let id = uuid::Uuid::new_v4();
    let conn = MockExecutor::returning(vec![Record::new().with("uuid", id)]);
    let got = Gateway::new()
        .insert_returning(&conn, "users", &Record::new().with("name", "Alice"), "uuid")
        .await
        .unwrap();
    assert_eq!(got, Some(Value::Uuid(id)));
    assert!(conn.last_sql().ends_with("RETURNING uuid"));
}

#[tokio::test]
async fn lookup_field_returns_first_value() {
    let conn = MockExecutor::returning(vec![Record::new().with("uuid", "abc")]);
    let filter = FilterSpec::new().filter("name", "Alice");
    let got = Gateway::new()
        .lookup_field(&conn, "uuid", "users", &filter)
        .await
        .unwrap();
    assert_eq!(got, Some(Value::from("abc")));
    assert_eq!(conn.last_sql(), "SELECT uuid FROM users WHERE name = $1 LIMIT 1");

    let none = Gateway::new()
        .lookup_field(&MockExecutor::new(), "uuid", "users", &filter)
        .await
        .unwrap();
    assert_eq!(none, None);
}

#[tokio::test]
async fn count_reads_the_scalar() {
    let conn = MockExecutor::returning(vec![Record::new().with("count", 3i64)]);
    let n = Gateway::new()
        .count(&conn, "users", &FilterSpec::new().filter("status", "active"))
        .await
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!(conn.last_sql(), "SELECT COUNT(*) FROM users WHERE status = $1");
    assert_eq!(conn.statements()[0].params, vec![Value::from("active")]);
}

#[tokio::test]
async fn count_without_a_row_is_a_decode_error() {
    let err = Gateway::new()
        .count(&MockExecutor::new(), "users", &FilterSpec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::Decode { .. }));
}

#[tokio::test]
async fn entity_defaults_seed_nulls() {
    let conn = MockExecutor::with_columns(&["id", "uuid", "name"]);
    let defaults = Gateway::new().entity_defaults(&conn, "users").await.unwrap();
    assert_eq!(defaults.columns().collect::<Vec<_>>(), vec!["id", "uuid", "name"]);
    assert!(defaults.iter().all(|(_, v)| v.is_null()));

    let err = Gateway::new()
        .entity_defaults(&MockExecutor::new(), "missing")
        .await
        .unwrap_err();
    assert!(err.is_schema());
}

#[tokio::test]
async fn column_names_validates_table() {
    let conn = MockExecutor::with_columns(&["id"]);
    assert!(Gateway::new().column_names(&conn, "bad table name x").await.unwrap_err().is_validation());
}
