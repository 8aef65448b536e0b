//! Gateway and executor configuration.

use crate::error::GateResult;
use crate::fragment::Fragment;
use std::time::Duration;
use tracing::Level;

/// SQL expression used to fill the identifier column on insert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UuidStrategy {
    /// `gen_random_uuid()` (built in since PostgreSQL 13).
    #[default]
    GenRandomUuid,
    /// `uuid_generate_v4()` from the `uuid-ossp` extension.
    UuidGenerateV4,
    /// 32 hex characters without dashes, for text identifier columns.
    Compact,
    /// Any other expression; validated as a fragment when compiled.
    Custom(String),
}

impl UuidStrategy {
    pub(crate) fn expr(&self) -> GateResult<String> {
        Ok(match self {
            UuidStrategy::GenRandomUuid => "gen_random_uuid()".to_string(),
            UuidStrategy::UuidGenerateV4 => "uuid_generate_v4()".to_string(),
            UuidStrategy::Compact => "replace(gen_random_uuid()::text, '-', '')".to_string(),
            UuidStrategy::Custom(expr) => Fragment::parse(expr)?.as_str().to_string(),
        })
    }
}

/// Case sensitivity of LIKE terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeCase {
    /// `ILIKE`
    #[default]
    Insensitive,
    /// `LIKE`
    Sensitive,
}

impl LikeCase {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            LikeCase::Insensitive => "ILIKE",
            LikeCase::Sensitive => "LIKE",
        }
    }
}

/// What to do when an OR term would open the WHERE chain.
///
/// With nothing before it, the OR connector has nothing to attach to and is
/// dropped, so the term behaves like an AND term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrPolicy {
    /// Drop the leading connector and log a warning.
    #[default]
    Permissive,
    /// Reject the query with a validation error.
    Strict,
}

/// Configuration for [`Gateway`](crate::Gateway).
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub uuid_strategy: UuidStrategy,
    pub like_case: LikeCase,
    pub or_policy: OrPolicy,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid_strategy(mut self, strategy: UuidStrategy) -> Self {
        self.uuid_strategy = strategy;
        self
    }

    pub fn like_case(mut self, case: LikeCase) -> Self {
        self.like_case = case;
        self
    }

    /// Case-sensitive `LIKE` instead of `ILIKE`.
    pub fn case_sensitive_like(self) -> Self {
        self.like_case(LikeCase::Sensitive)
    }

    pub fn or_policy(mut self, policy: OrPolicy) -> Self {
        self.or_policy = policy;
        self
    }

    /// Reject specs whose WHERE chain would start with an OR term.
    pub fn strict_or(self) -> Self {
        self.or_policy(OrPolicy::Strict)
    }
}

/// Configuration for [`PgExecutor`](crate::PgExecutor).
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Per-statement timeout.
    pub query_timeout: Option<Duration>,
    /// Level of the `tablegate.sql` event emitted for each statement.
    pub log_level: Level,
    /// Truncate logged SQL (in bytes). `None` logs it whole.
    pub max_sql_length: Option<usize>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            log_level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl ExecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set query timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.query_timeout = Some(duration);
        self
    }

    pub fn log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_expressions() {
        assert_eq!(UuidStrategy::default().expr().unwrap(), "gen_random_uuid()");
        assert_eq!(
            UuidStrategy::UuidGenerateV4.expr().unwrap(),
            "uuid_generate_v4()"
        );
        assert_eq!(
            UuidStrategy::Custom(" gen_ulid() ".into()).expr().unwrap(),
            "gen_ulid()"
        );
        assert!(
            UuidStrategy::Custom("gen_random_uuid(); DROP TABLE users".into())
                .expr()
                .is_err()
        );
    }

    #[test]
    fn builders_override_defaults() {
        let cfg = GatewayConfig::new().case_sensitive_like().strict_or();
        assert_eq!(cfg.like_case.keyword(), "LIKE");
        assert_eq!(cfg.or_policy, OrPolicy::Strict);
        assert_eq!(cfg.uuid_strategy, UuidStrategy::GenRandomUuid);

        let exec = ExecConfig::new()
            .timeout(Duration::from_secs(5))
            .no_truncate();
        assert_eq!(exec.query_timeout, Some(Duration::from_secs(5)));
        assert_eq!(exec.max_sql_length, None);
        assert_eq!(exec.log_level, Level::DEBUG);
    }
}
