//! Typed data-access layer for a GMAO (computerized maintenance management)
//! application backed by SQLite.
//!
//! The model covers companies (`Entreprise`), their users and permissions,
//! managed sites (`Objet`), floor sectors (`Secteur`), placed assets
//! (`Article`), maintenance tasks, file attachments, and the auth tables
//! (`Account`, `Session`, `VerificationToken`).
//!
//! ```no_run
//! use gmao_data::{Client, ClientOptions};
//! use gmao_data::entities::{UserCreate, UserWhereUnique};
//!
//! # async fn run() -> gmao_data::Result<()> {
//! let client = Client::connect(ClientOptions::new("sqlite://gmao.db")).await?;
//! let user = client
//!     .users()
//!     .create(&UserCreate::new("Ada", "ada@example.com", "hash", 1), None)
//!     .await?;
//! let again = client
//!     .users()
//!     .find_unique(&UserWhereUnique::Email(user.email.clone()), None)
//!     .await?;
//! assert!(again.is_some());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod orm;
pub mod schema;

pub use client::{BatchOp, Client, Repository};
pub use entities::{ShapeType, TaskStatus, TaskType, UserRole};
pub use config::{
    ClientOptions, ErrorFormat, IsolationLevel, LogDefinition, LogEmit, LogLevel,
    TransactionOptions,
};
pub use error::{DataError, ErrorCode, Result};
pub use events::{LogEvent, QueryEvent};
pub use orm::{
    AggregateArgs, AggregateResult, CountResult, CountSelect, FindManyArgs, GroupByArgs,
    GroupByRow, NullsOrder, OrderBy, SortOrder, SqlValue, ToMany,
};
pub use schema::SchemaSyncResult;
