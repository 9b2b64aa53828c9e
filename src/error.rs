use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConstraintError {
    /// The root resolved to a bare leaf, so there is no field to attach hints to.
    #[error("Unsupported schema")]
    UnsupportedSchema,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("schema contains async steps; use safe_parse_async")]
    AsyncSchema,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to resolve schema for intent {intent:?}")]
    SchemaFactory {
        intent: Option<String>,
        #[source]
        source: BoxError,
    },
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("no schema registered for intent {0:?}")]
    UnknownIntent(Option<String>),
    #[error("payload must be a JSON object of field names")]
    PayloadShape,
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },
    #[error("invalid regex at {path}: {source}")]
    Regex {
        path: String,
        #[source]
        source: regex::Error,
    },
    #[error("literal at {path} must be a string, number or boolean")]
    Literal { path: String },
    #[error("enum at {path} must list strings or numbers")]
    EnumOption { path: String },
}
