//! Global and local attributes of a process.
//!
//! Global attributes live in database tables shared across process
//! executions, one row per execution selected by primary key at start time.
//! Local attributes belong to a single execution.
//!
//! ## Module Structure
//!
//! - `schema` - Schema types, override policies, and registration checks
//! - `loading` - Load requests derived from a state's selected policy
//! - `runtime` - The [`Persistence`] view handed to `execute`
//!
//! ## Loading
//!
//! A state loads attributes with the override policy it names in
//! [`AsyncStateOptions::persistence_policy_name`](crate::AsyncStateOptions::persistence_policy_name),
//! or with the schema defaults. The resulting load requests travel in the
//! state's configuration, and the server loads and locks the attributes
//! before calling `execute`.

mod loading;
mod runtime;
mod schema;

pub use runtime::Persistence;
pub use schema::{
    DbColumnDef, DbTableSchema, GlobalAttributeDef, GlobalAttributesSchema, LocalAttributeDef,
    LocalAttributeLoadingPolicy, LocalAttributeLoadingType, LocalAttributesSchema,
    NamedPersistencePolicy, PersistenceSchema, SchemaIndex, TableLoadingPolicy,
};
