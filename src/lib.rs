//! Declarative SQL statement binding over `tokio-postgres` and `rusqlite`.
//!
//! Statements are declared once as templates with two substitution forms,
//! parameterized `#{dotted.path}` references that become driver placeholders
//! and raw `!{dotted.path}` references spliced as literal text, then called
//! like functions. The binder supplies pooled connections, scopes nested
//! calls into one transaction, and maps result rows into the shape each
//! binding declares.
//!
//! ```rust,no_run
//! use sql_binder::prelude::*;
//!
//! # async fn demo(pool: DatabasePool) -> Result<(), SqlBinderError> {
//! let binder = Binder::new();
//! binder.set_pool(pool)?;
//!
//! let insert = Execute::new(
//!     "INSERT INTO users (name, email) VALUES (#{user.name}, #{user.email})",
//!     &["user"],
//! )?;
//! let count_by_name = QueryOne::<i64>::new(
//!     "SELECT count(*) FROM users WHERE name = #{name}",
//!     &["name"],
//! )?;
//!
//! let (b, ins) = (&binder, &insert);
//! binder
//!     .transaction(|_tx| async move {
//!         let user = serde_json::json!({"name": "alice", "email": "a@example.com"});
//!         ins.call(b, &[&user]).await?;
//!         Ok(())
//!     })
//!     .await?;
//!
//! let n = count_by_name.call(&binder, &[&"alice"]).await?;
//! assert_eq!(n, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod binder;
pub mod binding;
pub mod blocking;
pub mod connection;
pub mod error;
pub mod mapper;
pub mod migrate;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod scope;
pub mod template;
pub mod types;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use args::{BindArg, BindEnv};
pub use binder::Binder;
pub use binding::{Execute, QueryAll, QueryOne, QueryStream};
pub use blocking::BlockingBinder;
pub use connection::DbConnection;
pub use error::SqlBinderError;
pub use mapper::{FromRow, RowStream, column};
pub use migrate::{Migration, Migrator};
pub use pool::DatabasePool;
pub use results::{ResultSet, Row};
pub use scope::TxConnection;
pub use template::{PlaceholderStyle, Template};
pub use types::{DatabaseType, SqlValue};
