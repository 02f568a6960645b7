//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types to make it easier to
//! get started with the library.

pub use crate::args::{BindArg, BindEnv};
pub use crate::binder::Binder;
pub use crate::binding::{Execute, QueryAll, QueryOne, QueryStream};
pub use crate::blocking::{BlockingBinder, BlockingTxConnection};
pub use crate::error::SqlBinderError;
pub use crate::mapper::{FromRow, RowStream, column};
pub use crate::migrate::{Migration, MigrationStatus, Migrator, RevisionRecord, UpgradeReport};
pub use crate::pool::DatabasePool;
pub use crate::results::{ResultSet, Row};
pub use crate::scope::TxConnection;
pub use crate::template::{PlaceholderStyle, Template};
pub use crate::types::{DatabaseType, SqlValue};
