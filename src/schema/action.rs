use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use regex::Regex;

use super::Schema;
use crate::coercion::Coercion;
use crate::value::{format_number, Value};

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type AsyncPredicate = Arc<dyn Fn(Value) -> BoxFuture<'static, bool> + Send + Sync>;
pub type Transformer = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type AsyncTransformer = Arc<dyn Fn(Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// One step of a refinement pipeline.
#[derive(Clone)]
pub struct Action {
    kind: ActionKind,
    message: Option<String>,
}

#[derive(Clone)]
pub enum ActionKind {
    MinLength(usize),
    MaxLength(usize),
    Length(usize),
    MinValue(f64),
    MaxValue(f64),
    Regex(Regex),
    Email,
    Check(Predicate),
    CheckAsync(AsyncPredicate),
    Transform(Transformer),
    TransformAsync(AsyncTransformer),
    /// Raw form value → typed value, see [`crate::coercion`].
    Coerce(Coercion),
    /// A whole schema run as a pipeline step.
    Schema(Box<Schema>),
}

/// How the pipeline treats a step once earlier steps reported issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Validation,
    Transformation,
    Schema,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ActionKind::MinLength(_) => "min_length",
            ActionKind::MaxLength(_) => "max_length",
            ActionKind::Length(_) => "length",
            ActionKind::MinValue(_) => "min_value",
            ActionKind::MaxValue(_) => "max_value",
            ActionKind::Regex(_) => "regex",
            ActionKind::Email => "email",
            ActionKind::Check(_) => "check",
            ActionKind::CheckAsync(_) => "check",
            ActionKind::Transform(_) => "transform",
            ActionKind::TransformAsync(_) => "transform",
            ActionKind::Coerce(_) => "transform",
            ActionKind::Schema(schema) => schema.type_name(),
        }
    }

    pub fn category(&self) -> Category {
        match &self.kind {
            ActionKind::Transform(_) | ActionKind::TransformAsync(_) | ActionKind::Coerce(_) => {
                Category::Transformation
            }
            ActionKind::Schema(_) => Category::Schema,
            _ => Category::Validation,
        }
    }

    /// The requirement payload of validation steps, if they carry one.
    pub fn requirement(&self) -> Option<Value> {
        match &self.kind {
            ActionKind::MinLength(n) | ActionKind::MaxLength(n) | ActionKind::Length(n) => {
                Some(Value::Number(*n as f64))
            }
            ActionKind::MinValue(n) | ActionKind::MaxValue(n) => Some(Value::Number(*n)),
            ActionKind::Regex(rx) => Some(Value::String(rx.as_str().to_string())),
            _ => None,
        }
    }

    pub fn is_async(&self) -> bool {
        match &self.kind {
            ActionKind::CheckAsync(_) | ActionKind::TransformAsync(_) => true,
            ActionKind::Schema(schema) => schema.is_async(),
            _ => false,
        }
    }

    /// Label and expectation used in the default issue message.
    pub(crate) fn describe(&self) -> (&'static str, Option<String>) {
        match &self.kind {
            ActionKind::MinLength(n) => ("length", Some(format!(">={n}"))),
            ActionKind::MaxLength(n) => ("length", Some(format!("<={n}"))),
            ActionKind::Length(n) => ("length", Some(n.to_string())),
            ActionKind::MinValue(n) => ("value", Some(format!(">={}", format_number(*n)))),
            ActionKind::MaxValue(n) => ("value", Some(format!("<={}", format_number(*n)))),
            ActionKind::Regex(rx) => ("format", Some(format!("/{}/", rx.as_str()))),
            ActionKind::Email => ("email", None),
            _ => ("input", None),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Action");
        out.field("type", &self.type_name());
        match &self.kind {
            ActionKind::Coerce(coercion) => {
                out.field("coercion", coercion);
            }
            ActionKind::Schema(schema) => {
                out.field("schema", schema);
            }
            _ => {
                if let Some(requirement) = self.requirement() {
                    out.field("requirement", &requirement);
                }
            }
        }
        out.field("message", &self.message).finish()
    }
}

// ---------------------------- Constructors -------------------------------- //

pub fn min_length(requirement: usize) -> Action {
    Action::new(ActionKind::MinLength(requirement))
}

pub fn max_length(requirement: usize) -> Action {
    Action::new(ActionKind::MaxLength(requirement))
}

pub fn length(requirement: usize) -> Action {
    Action::new(ActionKind::Length(requirement))
}

pub fn min_value(requirement: f64) -> Action {
    Action::new(ActionKind::MinValue(requirement))
}

pub fn max_value(requirement: f64) -> Action {
    Action::new(ActionKind::MaxValue(requirement))
}

pub fn regex(requirement: Regex) -> Action {
    Action::new(ActionKind::Regex(requirement))
}

pub fn email() -> Action {
    Action::new(ActionKind::Email)
}

pub fn check<F>(predicate: F) -> Action
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Action::new(ActionKind::Check(Arc::new(predicate)))
}

pub fn check_async<F>(predicate: F) -> Action
where
    F: Fn(Value) -> BoxFuture<'static, bool> + Send + Sync + 'static,
{
    Action::new(ActionKind::CheckAsync(Arc::new(predicate)))
}

pub fn transform<F>(f: F) -> Action
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    Action::new(ActionKind::Transform(Arc::new(f)))
}

pub fn transform_async<F>(f: F) -> Action
where
    F: Fn(Value) -> BoxFuture<'static, Value> + Send + Sync + 'static,
{
    Action::new(ActionKind::TransformAsync(Arc::new(f)))
}

pub fn coerce(coercion: Coercion) -> Action {
    Action::new(ActionKind::Coerce(coercion))
}

pub fn schema(schema: Schema) -> Action {
    Action::new(ActionKind::Schema(Box::new(schema)))
}
