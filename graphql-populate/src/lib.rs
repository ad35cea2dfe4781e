//! Compiles GraphQL field selections into nested populate-with-projection
//! fetch plans for a document-relational store.
//!
//! The embedding query engine hands [`Registry::populate`] the selection set
//! of the field it is currently resolving, the fragment definitions of the
//! query document, and the concrete runtime type name. The compiler
//! classifies every selected field against the registered entity schemas and
//! emits, per referenced entity, the dotted relation path to populate, the
//! minimal field projection to select, and the nested populations to run
//! underneath. The compiler never performs I/O: executing the plan is the
//! storage loader's job, parsing and validating the query is the engine's.
//!
//! ```
//! use apollo_compiler::ast;
//! use graphql_populate::{EntitySchema, Fragments, ReferenceDescriptor, Registry};
//!
//! let registry = Registry::new();
//! registry.register("Author", EntitySchema::new().scalar("name"));
//! registry.register(
//!     "Post",
//!     EntitySchema::new()
//!         .scalar("title")
//!         .reference("author", ReferenceDescriptor::single("Author")),
//! );
//!
//! let document = ast::Document::parse("{ title author { name } }", "post.graphql")
//!     .expect("parses");
//! let operation = match &document.definitions[0] {
//!     ast::Definition::OperationDefinition(operation) => operation,
//!     _ => unreachable!(),
//! };
//!
//! let plan = registry
//!     .populate(&operation.selection_set, &Fragments::default(), "Post", "Post")
//!     .expect("compiles");
//! assert_eq!(plan[0].path, "author");
//! assert_eq!(plan[0].select, ["id", "name"]);
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

mod error;
mod fragments;
mod plan;
mod registry;
mod schema;
mod selection;

pub use crate::error::PopulateError;
pub use crate::fragments::Fragments;
pub use crate::plan::FetchPlanEntry;
pub use crate::registry::Registry;
pub use crate::schema::Cardinality;
pub use crate::schema::EntityModel;
pub use crate::schema::EntitySchema;
pub use crate::schema::FieldKind;
pub use crate::schema::FieldSet;
pub use crate::schema::ReferenceDescriptor;
pub use crate::schema::ReferenceTarget;

/// Identifier field of every stored entity, first in every projection.
pub const ID_FIELD: &str = "id";

/// Discriminator field telling a polymorphic entity's concrete subtypes
/// apart, projected whenever a target is polymorphic.
pub const DISCRIMINATOR_FIELD: &str = "__t";

/// GraphQL introspection meta-field. Answered by the query engine from the
/// resolved type, so it never reaches a projection.
pub const TYPENAME_FIELD: &str = "__typename";
