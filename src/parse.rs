use std::fmt;
use std::sync::Arc;

use futures_util::FutureExt;
use indexmap::IndexMap;
use tracing::debug;

use crate::coercion::enable_type_coercion;
use crate::error::{BoxError, Error};
use crate::form::{self, FormData, ResolveResult, Submission};
use crate::path::format_paths;
use crate::resolution::Resolution;
use crate::schema::{safe_parse, safe_parse_async, Config, Outcome, Schema};

pub type SchemaFactory = Arc<dyn Fn(Option<&str>) -> Result<Schema, BoxError> + Send + Sync>;

/// Where the schema for a submission comes from.
#[derive(Clone)]
pub enum SchemaSource {
    Fixed(Schema),
    /// Picked per submission from the submitted intent.
    ByIntent(SchemaFactory),
}

impl SchemaSource {
    pub fn by_intent<F>(factory: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<Schema, BoxError> + Send + Sync + 'static,
    {
        SchemaSource::ByIntent(Arc::new(factory))
    }

    pub fn resolve(&self, intent: Option<&str>) -> Result<Schema, Error> {
        match self {
            SchemaSource::Fixed(schema) => Ok(schema.clone()),
            SchemaSource::ByIntent(factory) => {
                factory(intent).map_err(|source| Error::SchemaFactory {
                    intent: intent.map(str::to_string),
                    source,
                })
            }
        }
    }
}

impl From<Schema> for SchemaSource {
    fn from(schema: Schema) -> Self {
        SchemaSource::Fixed(schema)
    }
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Fixed(schema) => f.debug_tuple("Fixed").field(schema).finish(),
            SchemaSource::ByIntent(_) => f.write_str("ByIntent(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub schema: SchemaSource,
    /// Engine options, forwarded as is.
    pub info: Option<Config>,
}

impl ParseOptions {
    pub fn new(schema: impl Into<SchemaSource>) -> Self {
        Self { schema: schema.into(), info: None }
    }

    pub fn with_info(mut self, info: Config) -> Self {
        self.info = Some(info);
        self
    }
}

/// Validate a form submission against a schema, coercing the raw text first.
///
/// Returns [`Resolution::Pending`] when the coerced schema has async steps;
/// otherwise the submission is ready immediately.
pub fn parse_with_schema(
    form: &FormData,
    options: ParseOptions,
) -> Result<Resolution<Submission>, Error> {
    form::parse::<Error, _>(form, move |payload, intent| {
        let schema = enable_type_coercion(&options.schema.resolve(intent)?);
        let config = options.info.unwrap_or_default();
        debug!(intent = ?intent, is_async = schema.is_async(), "resolving submission");

        if schema.is_async() {
            let pending = safe_parse_async(schema, payload, config).map(resolve_result);
            return Ok(Resolution::Pending(pending.boxed()));
        }
        let outcome = safe_parse(&schema, payload, &config)?;
        Ok(Resolution::Ready(resolve_result(outcome)))
    })
}

/// Translate an engine outcome into field-keyed messages.
///
/// Issues without a path (raised against the whole payload) are keyed by
/// their input rendered as text.
pub fn resolve_result(outcome: Outcome) -> ResolveResult {
    match outcome {
        Outcome::Success(value) => ResolveResult::Value(value),
        Outcome::Failure(issues) => {
            let mut error: IndexMap<String, Vec<String>> = IndexMap::new();
            for issue in issues {
                let name = match issue.path_keys() {
                    Some(keys) => format_paths(&keys),
                    None => issue.input.to_key(),
                };
                error.entry(name).or_default().push(issue.message);
            }
            debug!(fields = error.len(), "submission rejected");
            ResolveResult::Error(error)
        }
    }
}
