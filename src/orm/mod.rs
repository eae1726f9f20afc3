//! The hand-written ORM layer.
//!
//! Entities implement the metadata traits in [`traits`] by hand; everything
//! else is generic: [`builder`] renders parameterized SQL, [`ops`] is the
//! operation family shared by all entities, [`include`] shapes relations
//! and [`projection`] applies scalar field selection.

pub mod builder;
pub mod codec;
pub mod conn;
pub mod filters;
pub mod include;
pub mod ops;
pub mod projection;
pub mod traits;
pub mod update;

pub use builder::EntityQuery;
pub use conn::Conn;
pub use filters::{
    BoolFilter, DateTimeFilter, DecimalFilter, EnumFilter, EnumValue, IntFilter, StringFilter,
};
pub use include::{IncludeLoader, NoInclude, ToMany};
pub use ops::{
    AggregateArgs, AggregateFunc, AggregateResult, CmpOp, CountResult, CountSelect, FindManyArgs,
    GroupByArgs, GroupByRow, HavingExpr,
};
pub use traits::{
    ColumnDef, CreateInput, DatabaseEntity, DatabaseFilter, DatabaseSchema, FieldSet, FromSqlRow,
    IndexDef, NullsOrder, OrderBy, SortOrder, SqlValue, UniqueWhere, UpdateInput,
};
pub use update::{DecimalUpdate, IntUpdate};
