use indexmap::IndexMap;
use regex::Regex;

use crate::error::{BoxError, DefinitionError, Error};
use crate::ir::{ActionDef, ActionKindDef, NodeDef, SchemaDef, SchemaFile};
use crate::parse::SchemaSource;
use crate::path_de::{from_str_with_path, from_value_with_path};
use crate::schema::{self, action, Action, Schema};
use crate::value::Value;

/// Read a schema file. A top-level `intents` member selects the intent-table form.
pub fn load_schema_file(src: &str) -> Result<SchemaFile, DefinitionError> {
    let raw: serde_json::Value = from_str_with_path(src)?;
    if raw.get("intents").is_some() {
        Ok(SchemaFile::ByIntent(from_value_with_path(raw)?))
    } else {
        Ok(SchemaFile::Single(from_value_with_path(raw)?))
    }
}

pub fn lower_to_schema(def: &SchemaDef) -> Result<Schema, DefinitionError> {
    lower(def, "$")
}

pub fn lower_schema_file(file: &SchemaFile) -> Result<SchemaSource, DefinitionError> {
    let table = match file {
        SchemaFile::Single(def) => return Ok(SchemaSource::Fixed(lower_to_schema(def)?)),
        SchemaFile::ByIntent(table) => table,
    };
    let intents = table
        .intents
        .iter()
        .map(|(intent, def)| Ok((intent.clone(), lower(def, &format!("$.intents.{intent}"))?)))
        .collect::<Result<IndexMap<String, Schema>, DefinitionError>>()?;
    let default = table
        .default
        .as_ref()
        .map(|def| lower(def, "$.default"))
        .transpose()?;

    Ok(SchemaSource::by_intent(move |intent| {
        intent
            .and_then(|name| intents.get(name))
            .or(default.as_ref())
            .cloned()
            .ok_or_else(|| BoxError::from(Error::UnknownIntent(intent.map(str::to_string))))
    }))
}

fn lower(def: &SchemaDef, path: &str) -> Result<Schema, DefinitionError> {
    let node = match &def.node {
        NodeDef::Unknown => schema::unknown(),
        NodeDef::String => schema::string(),
        NodeDef::Number => schema::number(),
        NodeDef::Boolean => schema::boolean(),
        NodeDef::Date => schema::date(),
        NodeDef::Bigint => schema::bigint(),
        NodeDef::File => schema::file(),
        NodeDef::Blob => schema::blob(),
        NodeDef::Undefined => schema::undefined(),
        NodeDef::Literal { literal } => schema::literal(literal_value(literal, path)?),
        NodeDef::Enum { options } => schema::enum_(
            options
                .iter()
                .map(|option| enum_option(option, path))
                .collect::<Result<Vec<_>, _>>()?,
        ),

        NodeDef::Array { item } => schema::array(lower(item, &format!("{path}.item"))?),
        NodeDef::Tuple { items } => schema::tuple(lower_all(items, &format!("{path}.items"))?),
        NodeDef::TupleWithRest { items, rest } => schema::tuple_with_rest(
            lower_all(items, &format!("{path}.items"))?,
            lower(rest, &format!("{path}.rest"))?,
        ),
        NodeDef::Object { entries } => schema::object(lower_entries(entries, path)?),
        NodeDef::ObjectWithRest { entries, rest } => schema::object_with_rest(
            lower_entries(entries, path)?,
            lower(rest, &format!("{path}.rest"))?,
        ),

        NodeDef::Optional { wrapped } => schema::optional(lower_wrapped(wrapped, path)?),
        NodeDef::Nullable { wrapped } => schema::nullable(lower_wrapped(wrapped, path)?),
        NodeDef::Nullish { wrapped } => schema::nullish(lower_wrapped(wrapped, path)?),
        NodeDef::NonOptional { wrapped } => schema::non_optional(lower_wrapped(wrapped, path)?),
        NodeDef::NonNullable { wrapped } => schema::non_nullable(lower_wrapped(wrapped, path)?),
        NodeDef::NonNullish { wrapped } => schema::non_nullish(lower_wrapped(wrapped, path)?),

        NodeDef::Union { options } => {
            schema::union(lower_all(options, &format!("{path}.options"))?)
        }
        NodeDef::Intersect { options } => {
            schema::intersect(lower_all(options, &format!("{path}.options"))?)
        }
        NodeDef::Variant { key, options } => {
            schema::variant(key.clone(), lower_all(options, &format!("{path}.options"))?)
        }
    };

    let pipe = def
        .pipe
        .iter()
        .enumerate()
        .map(|(i, step)| lower_action(step, &format!("{path}.pipe[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    let node = node.with_pipe(pipe);
    Ok(match &def.message {
        Some(message) => node.with_message(message.clone()),
        None => node,
    })
}

fn lower_all(defs: &[SchemaDef], path: &str) -> Result<Vec<Schema>, DefinitionError> {
    defs.iter()
        .enumerate()
        .map(|(i, def)| lower(def, &format!("{path}[{i}]")))
        .collect()
}

fn lower_entries(
    entries: &IndexMap<String, SchemaDef>,
    path: &str,
) -> Result<Vec<(String, Schema)>, DefinitionError> {
    entries
        .iter()
        .map(|(key, def)| Ok((key.clone(), lower(def, &format!("{path}.entries.{key}"))?)))
        .collect()
}

fn lower_wrapped(wrapped: &SchemaDef, path: &str) -> Result<Schema, DefinitionError> {
    lower(wrapped, &format!("{path}.wrapped"))
}

fn lower_action(def: &ActionDef, path: &str) -> Result<Action, DefinitionError> {
    let step = match &def.kind {
        ActionKindDef::MinLength { requirement } => action::min_length(*requirement),
        ActionKindDef::MaxLength { requirement } => action::max_length(*requirement),
        ActionKindDef::Length { requirement } => action::length(*requirement),
        ActionKindDef::MinValue { requirement } => action::min_value(*requirement),
        ActionKindDef::MaxValue { requirement } => action::max_value(*requirement),
        ActionKindDef::Regex { requirement } => {
            let rx = Regex::new(requirement).map_err(|source| DefinitionError::Regex {
                path: path.to_string(),
                source,
            })?;
            action::regex(rx)
        }
        ActionKindDef::Email => action::email(),
    };
    Ok(match &def.message {
        Some(message) => step.with_message(message.clone()),
        None => step,
    })
}

fn literal_value(literal: &serde_json::Value, path: &str) -> Result<Value, DefinitionError> {
    match literal {
        serde_json::Value::String(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::Bool(_) => Ok(Value::from(literal.clone())),
        _ => Err(DefinitionError::Literal { path: path.to_string() }),
    }
}

fn enum_option(option: &serde_json::Value, path: &str) -> Result<Value, DefinitionError> {
    match option {
        serde_json::Value::String(_) | serde_json::Value::Number(_) => {
            Ok(Value::from(option.clone()))
        }
        _ => Err(DefinitionError::EnumOption { path: path.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::get_constraint;
    use crate::schema::{safe_parse, Config, Outcome};
    use serde_json::json;

    const SIGNUP: &str = r#"{
        "type": "object",
        "entries": {
            "email": {"type": "string", "pipe": [{"type": "email", "message": "Enter an email"}]},
            "password": {"type": "string", "pipe": [{"type": "min_length", "requirement": 8}]},
            "plan": {"type": "enum", "options": ["free", "pro"]},
            "age": {
                "type": "optional",
                "wrapped": {"type": "number", "pipe": [{"type": "min_value", "requirement": 13}]}
            }
        }
    }"#;

    fn single(src: &str) -> Schema {
        match load_schema_file(src).unwrap() {
            SchemaFile::Single(def) => lower_to_schema(&def).unwrap(),
            SchemaFile::ByIntent(_) => panic!("expected a single schema"),
        }
    }

    #[test]
    fn lowers_object_definitions() {
        let schema = single(SIGNUP);
        let constraints = serde_json::to_value(get_constraint(&schema).unwrap()).unwrap();
        assert_eq!(
            constraints,
            json!({
                "email": {"required": true},
                "password": {"required": true, "minLength": 8},
                "plan": {"required": true, "pattern": "free|pro"},
                "age": {"required": false, "min": 13},
            })
        );

        let outcome = safe_parse(
            &schema,
            Value::from(json!({"email": "nope", "password": "longenough", "plan": "pro"})),
            &Config::default(),
        )
        .unwrap();
        let Outcome::Failure(issues) = outcome else { panic!("expected failure") };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Enter an email");
    }

    #[test]
    fn intent_tables_pick_by_intent() {
        let src = r#"{
            "intents": {
                "publish": {"type": "object", "entries": {"body": {"type": "string"}}}
            },
            "default": {"type": "object", "entries": {}}
        }"#;
        let source = lower_schema_file(&load_schema_file(src).unwrap()).unwrap();
        assert_eq!(source.resolve(Some("publish")).unwrap().type_name(), "object");
        assert!(source.resolve(Some("draft")).is_ok());

        let src = r#"{"intents": {"publish": {"type": "string"}}}"#;
        let source = lower_schema_file(&load_schema_file(src).unwrap()).unwrap();
        let err = source.resolve(None).unwrap_err();
        assert!(matches!(err, Error::SchemaFactory { intent: None, .. }));
    }

    #[test]
    fn bad_definitions_report_where() {
        let err = load_schema_file(r#"{"type": "object", "entries": {"a": {"type": "strng"}}}"#)
            .unwrap_err();
        assert!(matches!(err, DefinitionError::Parse { .. }));

        let def = json!({"type": "object", "entries": {
            "code": {"type": "string", "pipe": [{"type": "regex", "requirement": "("}]}
        }});
        let def: SchemaDef = from_value_with_path(def).unwrap();
        let err = lower_to_schema(&def).unwrap_err();
        let DefinitionError::Regex { path, .. } = err else { panic!("expected a regex error") };
        assert_eq!(path, "$.entries.code.pipe[0]");

        let def: SchemaDef =
            from_value_with_path(json!({"type": "literal", "literal": [1]})).unwrap();
        assert!(matches!(lower_to_schema(&def), Err(DefinitionError::Literal { .. })));
    }
}
