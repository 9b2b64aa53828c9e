//! Declarative schema tree.
//!
//! A [`Schema`] is an immutable node: a [`Kind`] (which fixes the children it
//! holds), a refinement pipeline of [`Action`]s that run after the base type
//! check, an `expects` label for diagnostics, and an async flag that is
//! derived from the children and the pipeline at construction time.
//!
//! Trees are built with the free constructor functions (`object`, `string`,
//! `optional`, ...) and never mutated afterwards; the walkers in
//! [`crate::constraint`] and [`crate::coercion`] always build new values.
pub mod action;
#[cfg(test)]
pub(crate) mod arbitrary;
pub mod exec;
pub mod issue;

use indexmap::IndexMap;

use crate::value::Value;

pub use action::{Action, ActionKind};
pub use exec::{safe_parse, safe_parse_async, Config, Outcome};
pub use issue::{Issue, IssueKind, PathItem};

// ------------------------------- Model ----------------------------------- //

#[derive(Clone, Debug)]
pub enum Kind {
    /// Accepts anything. Coerced leaves use it as their permissive base.
    Unknown,
    String,
    Number,
    Boolean,
    Date,
    BigInt,
    File,
    Blob,
    Literal(Value),
    Enum(Vec<Value>),
    Undefined,

    Array { item: Box<Schema> },
    Tuple { items: Vec<Schema> },
    TupleWithRest { items: Vec<Schema>, rest: Box<Schema> },
    Object { entries: IndexMap<String, Schema> },
    ObjectWithRest { entries: IndexMap<String, Schema>, rest: Box<Schema> },

    Optional { wrapped: Box<Schema> },
    Nullable { wrapped: Box<Schema> },
    Nullish { wrapped: Box<Schema> },
    NonOptional { wrapped: Box<Schema> },
    NonNullable { wrapped: Box<Schema> },
    NonNullish { wrapped: Box<Schema> },

    Union { options: Vec<Schema> },
    Intersect { options: Vec<Schema> },
    /// Union of object schemas told apart by the literal at `key`.
    Variant { key: String, options: Vec<Schema> },
}

#[derive(Clone, Debug)]
pub struct Schema {
    kind: Kind,
    pipe: Vec<Action>,
    expects: String,
    message: Option<String>,
    is_async: bool,
}

impl Kind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Kind::Unknown => "unknown",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Date => "date",
            Kind::BigInt => "bigint",
            Kind::File => "file",
            Kind::Blob => "blob",
            Kind::Literal(_) => "literal",
            Kind::Enum(_) => "enum",
            Kind::Undefined => "undefined",
            Kind::Array { .. } => "array",
            Kind::Tuple { .. } => "tuple",
            Kind::TupleWithRest { .. } => "tuple_with_rest",
            Kind::Object { .. } => "object",
            Kind::ObjectWithRest { .. } => "object_with_rest",
            Kind::Optional { .. } => "optional",
            Kind::Nullable { .. } => "nullable",
            Kind::Nullish { .. } => "nullish",
            Kind::NonOptional { .. } => "non_optional",
            Kind::NonNullable { .. } => "non_nullable",
            Kind::NonNullish { .. } => "non_nullish",
            Kind::Union { .. } => "union",
            Kind::Intersect { .. } => "intersect",
            Kind::Variant { .. } => "variant",
        }
    }

    /// Direct child nodes, in declaration order.
    pub fn children(&self) -> Vec<&Schema> {
        match self {
            Kind::Array { item } => vec![item.as_ref()],
            Kind::Tuple { items } => items.iter().collect(),
            Kind::TupleWithRest { items, rest } => {
                items.iter().chain(std::iter::once(rest.as_ref())).collect()
            }
            Kind::Object { entries } => entries.values().collect(),
            Kind::ObjectWithRest { entries, rest } => {
                entries.values().chain(std::iter::once(rest.as_ref())).collect()
            }
            Kind::Optional { wrapped }
            | Kind::Nullable { wrapped }
            | Kind::Nullish { wrapped }
            | Kind::NonOptional { wrapped }
            | Kind::NonNullable { wrapped }
            | Kind::NonNullish { wrapped } => vec![wrapped.as_ref()],
            Kind::Union { options }
            | Kind::Intersect { options }
            | Kind::Variant { options, .. } => options.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// The same modifier around a different child. `None` for non-modifiers.
    pub fn rewrap(&self, wrapped: Schema) -> Option<Kind> {
        let wrapped = Box::new(wrapped);
        Some(match self {
            Kind::Optional { .. } => Kind::Optional { wrapped },
            Kind::Nullable { .. } => Kind::Nullable { wrapped },
            Kind::Nullish { .. } => Kind::Nullish { wrapped },
            Kind::NonOptional { .. } => Kind::NonOptional { wrapped },
            Kind::NonNullable { .. } => Kind::NonNullable { wrapped },
            Kind::NonNullish { .. } => Kind::NonNullish { wrapped },
            _ => return None,
        })
    }

    fn default_expects(&self) -> String {
        match self {
            Kind::Unknown => "unknown".into(),
            Kind::String => "string".into(),
            Kind::Number => "number".into(),
            Kind::Boolean => "boolean".into(),
            Kind::Date => "Date".into(),
            Kind::BigInt => "bigint".into(),
            Kind::File => "File".into(),
            Kind::Blob => "Blob".into(),
            Kind::Undefined => "undefined".into(),
            Kind::Literal(v) => v.received(),
            Kind::Enum(options) => join_expects(options.iter().map(Value::received), "|"),
            Kind::Array { .. } | Kind::Tuple { .. } | Kind::TupleWithRest { .. } => "Array".into(),
            Kind::Object { .. } | Kind::ObjectWithRest { .. } | Kind::Variant { .. } => {
                "Object".into()
            }
            Kind::Optional { wrapped } => format!("({} | undefined)", wrapped.expects()),
            Kind::Nullable { wrapped } => format!("({} | null)", wrapped.expects()),
            Kind::Nullish { wrapped } => format!("({} | null | undefined)", wrapped.expects()),
            Kind::NonOptional { .. } => "!undefined".into(),
            Kind::NonNullable { .. } => "!null".into(),
            Kind::NonNullish { .. } => "(!null & !undefined)".into(),
            Kind::Union { options } => join_expects(options.iter().map(|o| o.expects.clone()), "|"),
            Kind::Intersect { options } => {
                join_expects(options.iter().map(|o| o.expects.clone()), "&")
            }
        }
    }
}

fn join_expects(parts: impl Iterator<Item = String>, separator: &str) -> String {
    let parts: Vec<String> = parts.collect();
    match parts.len() {
        0 => "never".to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(&format!(" {separator} "))),
    }
}

impl Schema {
    pub fn new(kind: Kind) -> Self {
        let expects = kind.default_expects();
        let is_async = kind.children().iter().any(|c| c.is_async);
        Self {
            kind,
            pipe: Vec::new(),
            expects,
            message: None,
            is_async,
        }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Refinements that run after the base type check, in order.
    pub fn pipe(&self) -> &[Action] {
        &self.pipe
    }

    pub fn expects(&self) -> &str {
        &self.expects
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Append refinement steps.
    pub fn with_pipe(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.pipe.extend(actions);
        self.is_async = self.is_async || self.pipe.iter().any(Action::is_async);
        self
    }

    /// Custom message for issues raised by the base type check.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_expects(mut self, expects: impl Into<String>) -> Self {
        self.expects = expects.into();
        self
    }

    /// A copy with a different kind, keeping pipe, message and label.
    pub fn rebuild(&self, kind: Kind) -> Schema {
        Schema::new(kind)
            .with_expects(self.expects.clone())
            .with_message_opt(self.message.clone())
            .with_pipe(self.pipe.iter().cloned())
    }

    fn with_message_opt(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

// ---------------------------- Constructors -------------------------------- //

pub fn unknown() -> Schema {
    Schema::new(Kind::Unknown)
}

pub fn string() -> Schema {
    Schema::new(Kind::String)
}

pub fn number() -> Schema {
    Schema::new(Kind::Number)
}

pub fn boolean() -> Schema {
    Schema::new(Kind::Boolean)
}

pub fn date() -> Schema {
    Schema::new(Kind::Date)
}

pub fn bigint() -> Schema {
    Schema::new(Kind::BigInt)
}

pub fn file() -> Schema {
    Schema::new(Kind::File)
}

pub fn blob() -> Schema {
    Schema::new(Kind::Blob)
}

pub fn undefined() -> Schema {
    Schema::new(Kind::Undefined)
}

pub fn literal(value: impl Into<Value>) -> Schema {
    Schema::new(Kind::Literal(value.into()))
}

pub fn enum_<I, V>(options: I) -> Schema
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Schema::new(Kind::Enum(options.into_iter().map(Into::into).collect()))
}

pub fn array(item: Schema) -> Schema {
    Schema::new(Kind::Array { item: Box::new(item) })
}

pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Kind::Tuple { items: items.into_iter().collect() })
}

pub fn tuple_with_rest(items: impl IntoIterator<Item = Schema>, rest: Schema) -> Schema {
    Schema::new(Kind::TupleWithRest {
        items: items.into_iter().collect(),
        rest: Box::new(rest),
    })
}

pub fn object<I, K>(entries: I) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    Schema::new(Kind::Object {
        entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    })
}

pub fn object_with_rest<I, K>(entries: I, rest: Schema) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    Schema::new(Kind::ObjectWithRest {
        entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        rest: Box::new(rest),
    })
}

pub fn optional(wrapped: Schema) -> Schema {
    Schema::new(Kind::Optional { wrapped: Box::new(wrapped) })
}

pub fn nullable(wrapped: Schema) -> Schema {
    Schema::new(Kind::Nullable { wrapped: Box::new(wrapped) })
}

pub fn nullish(wrapped: Schema) -> Schema {
    Schema::new(Kind::Nullish { wrapped: Box::new(wrapped) })
}

pub fn non_optional(wrapped: Schema) -> Schema {
    Schema::new(Kind::NonOptional { wrapped: Box::new(wrapped) })
}

pub fn non_nullable(wrapped: Schema) -> Schema {
    Schema::new(Kind::NonNullable { wrapped: Box::new(wrapped) })
}

pub fn non_nullish(wrapped: Schema) -> Schema {
    Schema::new(Kind::NonNullish { wrapped: Box::new(wrapped) })
}

pub fn union(options: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Kind::Union { options: options.into_iter().collect() })
}

pub fn intersect(options: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Kind::Intersect { options: options.into_iter().collect() })
}

pub fn variant(key: impl Into<String>, options: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Kind::Variant {
        key: key.into(),
        options: options.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    #[test]
    fn expects_labels() {
        assert_eq!(string().expects(), "string");
        assert_eq!(optional(number()).expects(), "(number | undefined)");
        assert_eq!(enum_(["a", "b"]).expects(), "(\"a\" | \"b\")");
        assert_eq!(literal("x").expects(), "\"x\"");
        assert_eq!(union([string(), number()]).expects(), "(string | number)");
    }

    #[test]
    fn async_propagates_upward() {
        let check = action::check_async(|v: Value| async move { v.as_str().is_some() }.boxed());
        let leaf = string().with_pipe([check]);
        assert!(leaf.is_async());

        let tree = object([("a", string()), ("b", optional(array(leaf)))]);
        assert!(tree.is_async());
        assert!(!object([("a", string())]).is_async());
    }

    #[test]
    fn rebuild_keeps_pipe_and_label() {
        let node = array(string()).with_pipe([action::min_length(1)]).with_expects("tags");
        let rebuilt = node.rebuild(Kind::Array { item: Box::new(number()) });
        assert_eq!(rebuilt.pipe().len(), 1);
        assert_eq!(rebuilt.expects(), "tags");
        assert_eq!(rebuilt.type_name(), "array");
    }
}
