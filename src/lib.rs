//! Form-schema adapter: HTML constraints and typed submissions from one schema.
//!
//! - [`get_constraint`] turns a [`Schema`] into native validation attributes
//!   per field path.
//! - [`parse_with_schema`] nests a submitted [`form::FormData`], coerces the
//!   raw text to the types the schema expects and validates it, yielding a
//!   [`form::Submission`] with either the typed value or messages per field.
//! - [`enable_type_coercion`] is the coercing rewrite both rely on.
pub mod coercion;
pub mod constraint;
pub mod error;
pub mod form;
pub mod ir;
pub mod lower;
pub mod parse;
pub mod path;
pub mod path_de;
pub mod resolution;
pub mod schema;
pub mod value;

pub use coercion::enable_type_coercion;
pub use constraint::{get_constraint, Constraint};
pub use error::{ConstraintError, DefinitionError, Error};
pub use parse::{parse_with_schema, ParseOptions, SchemaSource};
pub use resolution::Resolution;
pub use schema::{Config, Schema};
pub use value::Value;
