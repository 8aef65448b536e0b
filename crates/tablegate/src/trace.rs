//! SQL tracing for executed statements.

use crate::statement::Statement;
use std::borrow::Cow;
use tracing::Level;

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> Cow<'_, str> {
    match max {
        Some(max) if sql.len() > max => Cow::Owned(format!("{}...", truncate_sql_bytes(sql, max))),
        _ => Cow::Borrowed(sql),
    }
}

/// Emit one `tablegate.sql` event for a statement about to run.
pub(crate) fn log_statement(
    level: Level,
    max_sql_length: Option<usize>,
    op: &str,
    stmt: &Statement,
) {
    /// Dispatch a tracing event at a runtime-determined level.
    macro_rules! emit_at_level {
        ($level:expr, $($field:tt)*) => {
            match $level {
                Level::ERROR => tracing::error!($($field)*),
                Level::WARN  => tracing::warn!($($field)*),
                Level::INFO  => tracing::info!($($field)*),
                Level::DEBUG => tracing::debug!($($field)*),
                Level::TRACE => tracing::trace!($($field)*),
            }
        };
    }

    let sql = truncate_sql(&stmt.sql, max_sql_length);
    emit_at_level!(
        level,
        target: "tablegate.sql",
        op,
        param_count = stmt.params.len(),
        sql = %sql,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate_sql_bytes("aé", 2), "a");
    }

    #[test]
    fn truncate_marks_cut_sql() {
        assert_eq!(truncate_sql("SELECT * FROM users", Some(8)), "SELECT *...");
        assert_eq!(truncate_sql("SELECT 1", Some(8)), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", None), "SELECT 1");
    }
}
