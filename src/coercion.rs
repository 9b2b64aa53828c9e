//! Rewrites a schema so raw form values are converted before validation.
//!
//! Every leaf `T` becomes `unknown() |> coerce(rule) |> schema(T)`: the
//! permissive base accepts whatever the form produced, the coercion step
//! turns text into the type `T` expects, and `T` itself (with its own
//! pipeline) then validates the result. Containers are rebuilt around their
//! coerced children and keep their own pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::trace;

use crate::schema::action::{self, Action, ActionKind};
use crate::schema::{Kind, Schema};
use crate::value::Value;

/// Conversion applied to a raw form value. Plain data, so coerced schemas
/// stay inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Text stays text.
    Text,
    Number,
    /// A checked box submits `"on"`, which becomes `true`.
    Boolean,
    Date,
    BigInt,
    /// Blank file inputs become absent.
    File,
}

impl Coercion {
    pub fn apply(self, value: Value) -> Value {
        if self == Coercion::File {
            return match value {
                Value::File(file) if file.is_empty_selection() => Value::Undefined,
                other => other,
            };
        }
        let text = match value {
            Value::String(text) => text,
            other => return other,
        };
        if text.is_empty() {
            return Value::Undefined;
        }
        match self {
            Coercion::Text | Coercion::File => Value::String(text),
            Coercion::Number => parse_number(&text).map(Value::Number).unwrap_or_default(),
            Coercion::Boolean => {
                if text == "on" {
                    Value::Bool(true)
                } else {
                    Value::String(text)
                }
            }
            Coercion::Date => match parse_date(&text) {
                Some(date) => Value::Date(date),
                None => Value::String(text),
            },
            Coercion::BigInt => text
                .trim()
                .parse::<i128>()
                .map(Value::BigInt)
                .unwrap_or_default(),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let n: f64 = text.trim().parse().ok()?;
    n.is_finite().then_some(n)
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    // what `<input type="datetime-local">` and `type="date"` submit
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Wrap `node` so its input is coerced first. The result keeps `node`'s
/// label and is async exactly when `node` is.
pub fn coerce_leaf(node: &Schema, coercion: Coercion) -> Schema {
    trace!(kind = node.type_name(), ?coercion, "coercing leaf");
    Schema::new(Kind::Unknown)
        .with_expects(node.expects())
        .with_pipe([action::coerce(coercion), action::schema(node.clone())])
}

/// Build the coercing counterpart of `schema`. The input is left untouched.
pub fn enable_type_coercion(schema: &Schema) -> Schema {
    match schema.kind() {
        Kind::String | Kind::Literal(_) | Kind::Enum(_) | Kind::Undefined => {
            coerce_leaf(schema, Coercion::Text)
        }
        Kind::Number => coerce_leaf(schema, Coercion::Number),
        Kind::Boolean => coerce_leaf(schema, Coercion::Boolean),
        Kind::Date => coerce_leaf(schema, Coercion::Date),
        Kind::BigInt => coerce_leaf(schema, Coercion::BigInt),
        Kind::File | Kind::Blob => coerce_leaf(schema, Coercion::File),

        Kind::Array { item } => schema.rebuild(Kind::Array {
            item: Box::new(enable_type_coercion(item)),
        }),
        Kind::Tuple { items } => schema.rebuild(Kind::Tuple { items: coerce_all(items) }),
        Kind::TupleWithRest { items, rest } => schema.rebuild(Kind::TupleWithRest {
            items: coerce_all(items),
            rest: Box::new(enable_type_coercion(rest)),
        }),
        Kind::Object { entries } => schema.rebuild(Kind::Object {
            entries: entries
                .iter()
                .map(|(key, entry)| (key.clone(), enable_type_coercion(entry)))
                .collect(),
        }),
        Kind::ObjectWithRest { entries, rest } => schema.rebuild(Kind::ObjectWithRest {
            entries: entries
                .iter()
                .map(|(key, entry)| (key.clone(), enable_type_coercion(entry)))
                .collect(),
            rest: Box::new(enable_type_coercion(rest)),
        }),
        Kind::Union { options } => schema.rebuild(Kind::Union { options: coerce_all(options) }),
        Kind::Intersect { options } => {
            schema.rebuild(Kind::Intersect { options: coerce_all(options) })
        }
        Kind::Variant { key, options } => schema.rebuild(Kind::Variant {
            key: key.clone(),
            options: coerce_all(options),
        }),

        Kind::Optional { wrapped }
        | Kind::Nullable { wrapped }
        | Kind::Nullish { wrapped }
        | Kind::NonOptional { wrapped }
        | Kind::NonNullable { wrapped }
        | Kind::NonNullish { wrapped } => {
            let inner = enable_type_coercion(wrapped);
            // coerce before the modifier sees the value, so "" counts as missing
            if let Some(step) = leaf_coercion(&inner) {
                return Schema::new(Kind::Unknown)
                    .with_expects(schema.expects())
                    .with_pipe([step.clone(), action::schema(schema.clone())]);
            }
            match schema.kind().rewrap(inner) {
                Some(kind) => schema.rebuild(kind),
                None => coerce_leaf(schema, Coercion::Text),
            }
        }

        Kind::Unknown => coerce_leaf(schema, Coercion::Text),
    }
}

fn coerce_all(options: &[Schema]) -> Vec<Schema> {
    options.iter().map(enable_type_coercion).collect()
}

/// The coercion step of a node built by [`coerce_leaf`].
fn leaf_coercion(node: &Schema) -> Option<&Action> {
    if !matches!(node.kind(), Kind::Unknown) {
        return None;
    }
    match node.pipe() {
        [step, nested] if matches!(step.kind(), ActionKind::Coerce(_))
            && matches!(nested.kind(), ActionKind::Schema(_)) =>
        {
            Some(step)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::action::{check_async, min_length, min_value};
    use crate::schema::{
        array, bigint, boolean, date, file, number, object, optional, safe_parse, string, Config,
        Outcome,
    };
    use crate::value::FileValue;
    use futures_util::FutureExt;
    use serde_json::json;

    fn run(schema: &Schema, input: Value) -> Outcome {
        safe_parse(&enable_type_coercion(schema), input, &Config::default()).unwrap()
    }

    #[test]
    fn empty_text_is_absent_for_every_rule() {
        for rule in [
            Coercion::Text,
            Coercion::Number,
            Coercion::Boolean,
            Coercion::Date,
            Coercion::BigInt,
        ] {
            assert_eq!(rule.apply(Value::from("")), Value::Undefined, "{rule:?}");
        }
        let blank = Value::File(FileValue::new("", "application/octet-stream", 0));
        assert_eq!(Coercion::File.apply(blank), Value::Undefined);
        assert_eq!(Coercion::File.apply(Value::from("")), Value::from(""));
    }

    #[test]
    fn non_text_passes_through() {
        assert_eq!(Coercion::Number.apply(Value::Number(3.0)), Value::Number(3.0));
        assert_eq!(Coercion::Text.apply(Value::Null), Value::Null);
    }

    #[test]
    fn number_rule() {
        assert_eq!(Coercion::Number.apply(Value::from(" 42 ")), Value::Number(42.0));
        assert_eq!(Coercion::Number.apply(Value::from("1.5e2")), Value::Number(150.0));
        assert_eq!(Coercion::Number.apply(Value::from("abc")), Value::Undefined);
        assert_eq!(Coercion::Number.apply(Value::from("inf")), Value::Undefined);
    }

    #[test]
    fn boolean_rule() {
        assert_eq!(Coercion::Boolean.apply(Value::from("on")), Value::Bool(true));
        assert_eq!(Coercion::Boolean.apply(Value::from("yes")), Value::from("yes"));
    }

    #[test]
    fn date_and_bigint_rules() {
        let Value::Date(d) = Coercion::Date.apply(Value::from("2024-03-01")) else {
            panic!("expected a date")
        };
        assert_eq!(d.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        let Value::Date(d) = Coercion::Date.apply(Value::from("2024-03-01T10:30")) else {
            panic!("expected a date")
        };
        assert_eq!(d.to_rfc3339(), "2024-03-01T10:30:00+00:00");
        assert_eq!(Coercion::Date.apply(Value::from("soon")), Value::from("soon"));

        assert_eq!(Coercion::BigInt.apply(Value::from("12")), Value::BigInt(12));
        assert_eq!(Coercion::BigInt.apply(Value::from("1.2")), Value::Undefined);
    }

    #[test]
    fn input_schema_is_not_modified() {
        let schema = object([("name", string().with_pipe([min_length(2)]))]);
        let coerced = enable_type_coercion(&schema);
        let Kind::Object { entries } = schema.kind() else { panic!() };
        assert_eq!(entries["name"].type_name(), "string");
        assert_eq!(entries["name"].pipe().len(), 1);

        let Kind::Object { entries } = coerced.kind() else { panic!() };
        assert_eq!(entries["name"].type_name(), "unknown");
        assert_eq!(entries["name"].expects(), "string");
    }

    #[test]
    fn modifiers_reuse_the_leaf_coercion() {
        let coerced = enable_type_coercion(&optional(number()));
        assert_eq!(coerced.type_name(), "unknown");
        assert!(matches!(coerced.pipe()[0].kind(), ActionKind::Coerce(Coercion::Number)));
        let ActionKind::Schema(inner) = coerced.pipe()[1].kind() else { panic!() };
        assert_eq!(inner.type_name(), "optional");

        let coerced = enable_type_coercion(&optional(array(string())));
        assert_eq!(coerced.type_name(), "optional");
    }

    #[test]
    fn container_pipes_are_kept() {
        let schema = array(number()).with_pipe([min_length(1)]);
        let coerced = enable_type_coercion(&schema);
        assert_eq!(coerced.type_name(), "array");
        assert_eq!(coerced.pipe().len(), 1);
    }

    #[test]
    fn async_follows_the_leaves() {
        let slow = check_async(|_| async { true }.boxed());
        let schema = object([("a", string()), ("b", string().with_pipe([slow]))]);
        assert!(enable_type_coercion(&schema).is_async());
        assert!(!enable_type_coercion(&object([("a", string())])).is_async());
    }

    #[test]
    fn coerced_object_validates_form_text() {
        let schema = object([
            ("age", number().with_pipe([min_value(0.0)])),
            ("subscribe", optional(boolean())),
            ("born", optional(date())),
            ("id", bigint()),
            ("avatar", optional(file())),
        ]);
        let input = Value::from(json!({
            "age": "31",
            "subscribe": "on",
            "born": "",
            "id": "9007199254740993",
        }));
        let Outcome::Success(value) = run(&schema, input) else { panic!("expected success") };
        assert_eq!(value.get("age"), &Value::Number(31.0));
        assert_eq!(value.get("subscribe"), &Value::Bool(true));
        assert!(value.get("born").is_undefined());
        assert_eq!(value.get("id"), &Value::BigInt(9007199254740993));
    }

    #[test]
    fn empty_required_field_reads_as_missing() {
        let input = Value::from(json!({"age": ""}));
        let Outcome::Failure(issues) = run(&object([("age", number())]), input) else {
            panic!("expected failure")
        };
        assert_eq!(issues[0].message, "Invalid type: Expected number but received undefined");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schema::arbitrary::{form_schema, text_leaf};
    use crate::schema::{number, object, optional, safe_parse, Config, Outcome};
    use proptest::prelude::*;
    use serde_json::json;

    fn run(schema: &Schema, input: Value) -> Outcome {
        safe_parse(&enable_type_coercion(schema), input, &Config::default()).unwrap()
    }

    proptest! {
        #[test]
        fn coercion_leaves_the_tree_untouched(schema in form_schema()) {
            let before = format!("{schema:?}");
            let coerced = enable_type_coercion(&schema);
            prop_assert_eq!(format!("{schema:?}"), before);
            prop_assert_eq!(coerced.is_async(), schema.is_async());
        }

        #[test]
        fn empty_text_is_absent_for_every_text_leaf(leaf in text_leaf()) {
            let outcome = run(&optional(leaf.clone()), Value::from(""));
            prop_assert!(matches!(outcome, Outcome::Success(Value::Undefined)), "{outcome:?}");

            let input = Value::from(json!({"f": ""}));
            let Outcome::Failure(issues) = run(&object([("f", leaf)]), input) else {
                return Err(TestCaseError::fail("empty required field passed"));
            };
            for issue in &issues {
                prop_assert_eq!(issue.received.as_str(), "undefined");
            }
        }

        #[test]
        fn non_numeric_text_is_absent(text in "[a-zA-Z !#%&,;:_]{1,12}") {
            prop_assert_eq!(Coercion::Number.apply(Value::from(text.as_str())), Value::Undefined);
            let outcome = run(&optional(number()), Value::from(text));
            prop_assert!(matches!(outcome, Outcome::Success(Value::Undefined)), "{outcome:?}");
        }
    }
}
