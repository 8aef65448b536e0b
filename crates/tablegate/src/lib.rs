//! # tablegate
//!
//! A generic PostgreSQL table gateway: describe a read as data, get rows back.
//!
//! ## Features
//!
//! - **Declarative reads**: a [`QuerySpec`] (columns, joins, filters, LIKE,
//!   grouping, ordering, paging) compiles to one parameterized statement with
//!   clauses in a fixed, SQL-legal order, whatever subset is present
//! - **Generic CRUD**: insert / update / delete / count on any table by name
//! - **Generated identifiers**: insert can ask the database for a UUID
//! - **Safe defaults**: values are always bound parameters, names are
//!   validated, update and delete refuse to run without a filter
//! - **Transaction-friendly**: pass a transaction anywhere a [`GenericClient`]
//!   is expected
//!
//! ## Example
//!
//! ```ignore
//! use tablegate::{FilterSpec, Gateway, PgExecutor, QuerySpec, Record};
//!
//! let gw = Gateway::new();
//! let conn = PgExecutor::new(client);
//!
//! gw.insert(&conn, "users", &Record::new().with("name", "Alice"), Some("uuid"))
//!     .await?;
//!
//! let rows = gw
//!     .read(
//!         &conn,
//!         &QuerySpec::new("users u")
//!             .select(&["u.id", "u.name"])
//!             .left_join("orders o", "o.user_id = u.id")
//!             .filter("u.status", "active")
//!             .like("u.lastname", "smi")
//!             .order_by_desc("u.id")
//!             .limit(20),
//!     )
//!     .await?
//!     .into_rows();
//!
//! let removed = gw
//!     .delete(&conn, "users", &FilterSpec::new().filter("name", "Alice"))
//!     .await?;
//! ```

pub mod client;
pub mod compile;
pub mod config;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod gateway;
pub mod ident;
pub mod query_spec;
pub mod record;
pub mod statement;
pub mod value;

mod trace;

pub use client::GenericClient;
pub use compile::ClauseKind;
pub use config::{ExecConfig, GatewayConfig, LikeCase, OrPolicy, UuidStrategy};
pub use error::{GateError, GateResult};
pub use executor::{Executor, PgExecutor};
pub use fragment::Fragment;
pub use gateway::{Gateway, ReadResult};
pub use ident::{Ident, IdentPart, TableRef};
pub use query_spec::{
    CmpOp, Filter, FilterSpec, InList, Join, JoinKind, LikeTerm, Predicate, QuerySpec,
    ResultShape, Wildcard,
};
pub use record::Record;
pub use statement::{Sql, Statement};
pub use value::Value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
