//! Derive native HTML validation attributes from a schema.
//!
//! The walk visits each node once with the field name it renders under and
//! fills one [`Constraint`] per name. Alternatives (unions, variants) are
//! derived separately and then narrowed to what holds for every option.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::ConstraintError;
use crate::path::{join_any_index, join_index, join_name};
use crate::schema::{ActionKind, Kind, Schema};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_number")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_number")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_number")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

fn serialize_number<S: Serializer>(n: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match n {
        Some(n) => Value::Number(*n).serialize(serializer),
        None => serializer.serialize_none(),
    }
}

impl Constraint {
    fn required() -> Self {
        Self { required: Some(true), ..Self::default() }
    }

    /// Fields defined and equal on both sides.
    fn common(&self, other: &Constraint) -> Constraint {
        fn same<T: PartialEq + Clone>(a: &Option<T>, b: &Option<T>) -> Option<T> {
            match (a, b) {
                (Some(a), Some(b)) if a == b => Some(a.clone()),
                _ => None,
            }
        }
        Constraint {
            required: same(&self.required, &other.required),
            min_length: same(&self.min_length, &other.min_length),
            max_length: same(&self.max_length, &other.max_length),
            min: same(&self.min, &other.min),
            max: same(&self.max, &other.max),
            step: same(&self.step, &other.step),
            multiple: same(&self.multiple, &other.multiple),
            pattern: same(&self.pattern, &other.pattern),
        }
    }

    fn relaxed(mut self) -> Self {
        self.required = Some(false);
        self
    }
}

type Constraints = IndexMap<String, Constraint>;

pub fn get_constraint(schema: &Schema) -> Result<Constraints, ConstraintError> {
    let mut data = Constraints::new();
    update(schema, &mut data, "")?;
    debug!(fields = data.len(), "derived constraints");
    Ok(data)
}

fn update(schema: &Schema, data: &mut Constraints, name: &str) -> Result<(), ConstraintError> {
    if !name.is_empty() && !data.contains_key(name) {
        data.insert(name.to_string(), Constraint::required());
    }

    match schema.kind() {
        Kind::Object { entries } => {
            for (key, entry) in entries {
                update(entry, data, &join_name(name, key))?;
            }
        }
        Kind::Intersect { options } => {
            for option in options {
                let mut fresh = Constraints::new();
                update(option, &mut fresh, name)?;
                merge_into(data, fresh, name);
            }
        }
        Kind::Union { options } | Kind::Variant { options, .. } => {
            let derived = options
                .iter()
                .map(|option| {
                    let mut fresh = Constraints::new();
                    update(option, &mut fresh, name)?;
                    Ok(fresh)
                })
                .collect::<Result<Vec<_>, ConstraintError>>()?;
            let narrowed = derived.into_iter().reduce(narrow).unwrap_or_default();
            merge_into(data, narrowed, name);
        }
        _ if name.is_empty() => return Err(ConstraintError::UnsupportedSchema),
        Kind::Array { item } => {
            current(data, name).multiple = Some(true);
            update(item, data, &join_any_index(name))?;
        }
        Kind::Tuple { items } => {
            for (index, item) in items.iter().enumerate() {
                update(item, data, &join_index(name, index))?;
            }
        }
        Kind::String => {
            let constraint = current(data, name);
            if let Some(n) = find_requirement(schema, |kind| match kind {
                ActionKind::MinLength(n) => Some(*n),
                _ => None,
            }) {
                constraint.min_length = Some(n);
            }
            if let Some(n) = find_requirement(schema, |kind| match kind {
                ActionKind::MaxLength(n) => Some(*n),
                _ => None,
            }) {
                constraint.max_length = Some(n);
            }
        }
        Kind::Number => {
            let constraint = current(data, name);
            if let Some(n) = find_requirement(schema, |kind| match kind {
                ActionKind::MinValue(n) => Some(*n),
                _ => None,
            }) {
                constraint.min = Some(n);
            }
            if let Some(n) = find_requirement(schema, |kind| match kind {
                ActionKind::MaxValue(n) => Some(*n),
                _ => None,
            }) {
                constraint.max = Some(n);
            }
        }
        Kind::Enum(options) => {
            let pattern = options.iter().map(escape_option).collect::<Vec<_>>().join("|");
            current(data, name).pattern = Some(pattern);
        }
        Kind::Optional { wrapped } | Kind::Nullish { wrapped } => {
            current(data, name).required = Some(false);
            update(wrapped, data, name)?;
        }
        _ => {}
    }
    Ok(())
}

fn current<'a>(data: &'a mut Constraints, name: &str) -> &'a mut Constraint {
    data.entry(name.to_string()).or_insert_with(Constraint::required)
}

fn find_requirement<T>(schema: &Schema, pick: impl Fn(&ActionKind) -> Option<T>) -> Option<T> {
    schema.pipe().iter().find_map(|action| pick(action.kind()))
}

/// Pairwise reduction of the maps derived for two alternatives.
fn narrow(prev: Constraints, next: Constraints) -> Constraints {
    let mut out = Constraints::with_capacity(prev.len().max(next.len()));
    for (name, constraint) in &prev {
        let merged = match next.get(name) {
            Some(other) => constraint.common(other),
            None => constraint.clone().relaxed(),
        };
        out.insert(name.clone(), merged);
    }
    for (name, constraint) in next {
        if !prev.contains_key(&name) {
            out.insert(name, constraint.relaxed());
        }
    }
    out
}

/// Later entries win, except that a field already marked optional stays optional.
fn merge_into(data: &mut Constraints, fresh: Constraints, name: &str) {
    let relaxed = data
        .get(name)
        .is_some_and(|constraint| constraint.required == Some(false));
    for (key, mut constraint) in fresh {
        if relaxed && key == name {
            constraint.required = Some(false);
        }
        data.insert(key, constraint);
    }
}

fn escape_option(option: &Value) -> String {
    let Value::String(text) = option else {
        return option.to_key();
    };
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' | '\\' | '{' | '}' | '(' | ')' | '[' | ']' | '^' | '$' | '+' | '*' | '?' | '.' => {
                out.push('\\');
                out.push(c);
            }
            '-' => out.push_str("\\x2d"),
            _ => out.push(c),
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schema::action::min_length;
    use crate::schema::arbitrary::{form_schema, schema_tree};
    use crate::schema::{enum_, object, string, union};
    use proptest::prelude::*;
    use regex::Regex;

    proptest! {
        #[test]
        fn derivation_leaves_the_tree_untouched(schema in form_schema()) {
            let before = format!("{schema:?}");
            let derived = get_constraint(&schema);
            prop_assert!(derived.is_ok(), "{:?}", derived.err());
            prop_assert_eq!(format!("{schema:?}"), before);
        }

        #[test]
        fn every_root_field_gets_a_record(schema in form_schema()) {
            let derived = get_constraint(&schema).unwrap();
            let Kind::Object { entries } = schema.kind() else { unreachable!() };
            for key in entries.keys() {
                prop_assert!(derived.contains_key(key), "{key}");
            }
        }

        #[test]
        fn plain_string_fields_are_required(name in "[a-z][a-z0-9_]{0,8}") {
            let derived = get_constraint(&object([(name.clone(), string())])).unwrap();
            prop_assert_eq!(derived.len(), 1);
            prop_assert_eq!(&derived[&name], &Constraint::required());
        }

        #[test]
        fn min_length_is_carried(name in "[a-z]{1,8}", n in 0usize..1000) {
            let schema = object([(name.clone(), string().with_pipe([min_length(n)]))]);
            let derived = get_constraint(&schema).unwrap();
            prop_assert_eq!(derived[&name].min_length, Some(n));
        }

        #[test]
        fn enum_pattern_matches_exactly_its_options(
            options in prop::collection::vec("[a-c|.()*+?^${}\\[\\]\\\\-]{1,4}", 1..5),
            candidate in "[a-c|.()*+?^${}\\[\\]\\\\-]{0,4}",
        ) {
            let schema = object([("pick", enum_(options.clone()))]);
            let pattern = get_constraint(&schema).unwrap()["pick"].pattern.clone().unwrap();
            let rx = Regex::new(&format!("^(?:{pattern})$")).unwrap();
            for option in &options {
                prop_assert!(rx.is_match(option), "{pattern} should match {option:?}");
            }
            prop_assert_eq!(rx.is_match(&candidate), options.contains(&candidate));
        }

        #[test]
        fn fields_missing_from_an_option_are_optional(
            field in "[a-z]{1,6}",
            other in "[A-Z]{1,6}",
            body in schema_tree(),
        ) {
            let schema = union([object([(field.clone(), body)]), object([(other, string())])]);
            let derived = get_constraint(&schema).unwrap();
            prop_assert_eq!(derived[&field].required, Some(false));
        }
    }
}
