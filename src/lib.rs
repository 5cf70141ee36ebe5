//! # gel-auth — Gel adapter for auth frameworks
//!
//! Translates the generic create / find / update / delete / count calls an
//! auth framework makes into EdgeQL, and its logical schema into Gel SDL.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use gel_auth::prelude::*;
//!
//! let adapter = GelAdapter::new(client, AdapterConfig::new("auth"));
//!
//! let user = adapter
//!     .find_one(&schema, "user", &[Where::eq("email", "a@b.com")], None)
//!     .await?;
//! // with module auth select user { id, email, name } filter .email = <str>$filter_email limit 1
//! ```
//!
//! ## Layers
//!
//! | Module        | Role                                                    |
//! |---------------|---------------------------------------------------------|
//! | `schema`      | Logical schema, field lookup, cast types                |
//! | `transpiler`  | Filter, shape and assignment fragments with parameters  |
//! | `engine`      | One entry point per operation, submitted via a client   |
//! | `sdl`         | Module / type / enum / index declarations               |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod schema;
pub mod sdl;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{AdapterConfig, IndexSpec};
    pub use crate::engine::{DryRunClient, FindMany, GelAdapter, GelClient};
    pub use crate::error::*;
    pub use crate::schema::{FieldAttribute, FieldType, Model, OnDelete, Reference, Schema};
    pub use crate::sdl::SchemaFile;
    pub use crate::transpiler::ToEdgeql;
}

/// Parse a compact filter expression into conditions.
///
/// # Example
///
/// ```
/// use gel_auth::parse_filter;
///
/// let conditions = parse_filter("email=a@b.com | name~ada").unwrap();
/// assert_eq!(conditions.len(), 2);
/// assert_eq!(conditions[1].field, "name");
/// ```
pub fn parse_filter(input: &str) -> Result<Vec<ast::Where>, error::GelError> {
    parser::parse(input)
}
