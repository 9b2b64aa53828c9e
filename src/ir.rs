// Serializable schema definitions. No closures here: checks and transforms
// need code, so only the declarative steps can be written down.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaDef {
    #[serde(flatten)]
    pub node: NodeDef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipe: Vec<ActionDef>,
    /// Replaces the default type-issue message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDef {
    Unknown,
    String,
    Number,
    Boolean,
    Date,
    Bigint,
    File,
    Blob,
    Undefined,
    Literal { literal: serde_json::Value },
    Enum { options: Vec<serde_json::Value> },

    Array { item: Box<SchemaDef> },
    Tuple { items: Vec<SchemaDef> },
    TupleWithRest { items: Vec<SchemaDef>, rest: Box<SchemaDef> },
    Object { entries: IndexMap<String, SchemaDef> },
    ObjectWithRest { entries: IndexMap<String, SchemaDef>, rest: Box<SchemaDef> },

    Optional { wrapped: Box<SchemaDef> },
    Nullable { wrapped: Box<SchemaDef> },
    Nullish { wrapped: Box<SchemaDef> },
    NonOptional { wrapped: Box<SchemaDef> },
    NonNullable { wrapped: Box<SchemaDef> },
    NonNullish { wrapped: Box<SchemaDef> },

    Union { options: Vec<SchemaDef> },
    Intersect { options: Vec<SchemaDef> },
    Variant { key: String, options: Vec<SchemaDef> },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionDef {
    #[serde(flatten)]
    pub kind: ActionKindDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKindDef {
    MinLength { requirement: usize },
    MaxLength { requirement: usize },
    Length { requirement: usize },
    MinValue { requirement: f64 },
    MaxValue { requirement: f64 },
    Regex { requirement: String },
    Email,
}

/// Schemas keyed by the `__intent__` a submission carries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntentTable {
    pub intents: IndexMap<String, SchemaDef>,
    /// Used when the intent is missing or not listed.
    #[serde(default)]
    pub default: Option<SchemaDef>,
}

/// Contents of a schema file: one schema, or one per intent.
#[derive(Debug, Clone)]
pub enum SchemaFile {
    Single(SchemaDef),
    ByIntent(IntentTable),
}
