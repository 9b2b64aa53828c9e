//! Validation engine: runs a [`Schema`] against a [`Value`].
//!
//! There is one implementation, written as an async walk. Schemas without
//! async steps never suspend, so [`safe_parse`] drives the same future to
//! completion with a single poll.
//!
//! Pipeline rules:
//! - the base kind check yields a typed value or a type issue;
//! - validation steps only look at typed values and only add issues;
//! - transformations and nested schemas stop the pipeline (untyped) as soon
//!   as any issue exists;
//! - `abort_pipe_early` stops a pipeline at its first issue, `abort_early`
//!   additionally stops containers at the first issue.
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::action::{Action, ActionKind, Category};
use super::issue::{default_message, Issue, IssueKind, PathItem};
use super::{Kind, Schema};
use crate::error::ExecError;
use crate::path::PathKey;
use crate::value::Value;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\w+-]+(?:\.[\w+-]+)*@[\da-z]+(?:[.-][\da-z]+)*\.[a-z]{2,}$")
        .expect("email pattern compiles")
});

/// Engine options, forwarded verbatim from callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub abort_early: bool,
    pub abort_pipe_early: bool,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(Vec<Issue>),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Validate synchronously. Fails when the schema holds async steps.
pub fn safe_parse(schema: &Schema, input: Value, config: &Config) -> Result<Outcome, ExecError> {
    if schema.is_async() {
        return Err(ExecError::AsyncSchema);
    }
    run(schema, input, Vec::new(), config)
        .now_or_never()
        .map(Dataset::into_outcome)
        .ok_or(ExecError::AsyncSchema)
}

/// Validate, awaiting async checks and transforms. Owns its inputs so the
/// future can outlive the caller's stack frame.
pub fn safe_parse_async(
    schema: Schema,
    input: Value,
    config: Config,
) -> impl Future<Output = Outcome> + Send + 'static {
    async move { run(&schema, input, Vec::new(), &config).await.into_outcome() }
}

// ------------------------------ Dataset ---------------------------------- //

struct Dataset {
    value: Value,
    typed: bool,
    issues: Vec<Issue>,
}

impl Dataset {
    fn typed(value: Value) -> Self {
        Self { value, typed: true, issues: Vec::new() }
    }

    fn is_valid(&self) -> bool {
        self.typed && self.issues.is_empty()
    }

    /// Fold a child result into this container and hand back the child's value.
    fn merge_child(&mut self, child: Dataset) -> Value {
        self.typed &= child.typed;
        self.issues.extend(child.issues);
        child.value
    }

    fn should_abort(&self, config: &Config) -> bool {
        config.abort_early && !self.issues.is_empty()
    }

    fn into_outcome(self) -> Outcome {
        if self.issues.is_empty() {
            Outcome::Success(self.value)
        } else {
            Outcome::Failure(self.issues)
        }
    }
}

// ------------------------------- Walk ------------------------------------ //

fn run<'a>(
    schema: &'a Schema,
    input: Value,
    path: Vec<PathKey>,
    config: &'a Config,
) -> BoxFuture<'a, Dataset> {
    async move {
        let dataset = run_kind(schema, input, &path, config).await;
        run_pipe(schema, dataset, &path, config).await
    }
    .boxed()
}

async fn run_kind(schema: &Schema, input: Value, path: &[PathKey], config: &Config) -> Dataset {
    match schema.kind() {
        Kind::Array { item } => {
            let items = match input {
                Value::Array(items) => items,
                other => return type_failure(schema, other, path, config),
            };
            let mut dataset = Dataset::typed(Value::Undefined);
            let mut output = Vec::with_capacity(items.len());
            for (index, value) in items.into_iter().enumerate() {
                let child = run(item, value, child_path(path, index), config).await;
                output.push(dataset.merge_child(child));
                if dataset.should_abort(config) {
                    break;
                }
            }
            dataset.value = Value::Array(output);
            dataset
        }

        Kind::Tuple { items } | Kind::TupleWithRest { items, .. } => {
            let values = match input {
                Value::Array(values) => values,
                other => return type_failure(schema, other, path, config),
            };
            let rest = match schema.kind() {
                Kind::TupleWithRest { rest, .. } => Some(rest.as_ref()),
                _ => None,
            };
            let mut values = values.into_iter();
            let mut dataset = Dataset::typed(Value::Undefined);
            let mut output = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let value = values.next().unwrap_or_default();
                let child = run(item, value, child_path(path, index), config).await;
                output.push(dataset.merge_child(child));
                if dataset.should_abort(config) {
                    break;
                }
            }
            if let Some(rest) = rest {
                for (offset, value) in values.enumerate() {
                    if dataset.should_abort(config) {
                        break;
                    }
                    let index = items.len() + offset;
                    let child = run(rest, value, child_path(path, index), config).await;
                    output.push(dataset.merge_child(child));
                }
            }
            dataset.value = Value::Array(output);
            dataset
        }

        Kind::Object { entries } | Kind::ObjectWithRest { entries, .. } => {
            let mut members = match input {
                Value::Object(members) => members,
                other => return type_failure(schema, other, path, config),
            };
            let rest = match schema.kind() {
                Kind::ObjectWithRest { rest, .. } => Some(rest.as_ref()),
                _ => None,
            };
            let mut dataset = Dataset::typed(Value::Undefined);
            let mut output = IndexMap::with_capacity(entries.len());
            for (key, entry) in entries {
                let present = members.contains_key(key);
                let value = members.shift_remove(key).unwrap_or_default();
                let child = run(entry, value, child_path(path, key.as_str()), config).await;
                let value = dataset.merge_child(child);
                if present || !value.is_undefined() {
                    output.insert(key.clone(), value);
                }
                if dataset.should_abort(config) {
                    break;
                }
            }
            // unknown keys are stripped unless a rest schema claims them
            if let Some(rest) = rest {
                for (key, value) in members {
                    if dataset.should_abort(config) {
                        break;
                    }
                    let child = run(rest, value, child_path(path, key.as_str()), config).await;
                    let value = dataset.merge_child(child);
                    output.insert(key, value);
                }
            }
            dataset.value = Value::Object(output);
            dataset
        }

        Kind::Optional { wrapped } => match input {
            Value::Undefined => Dataset::typed(input),
            other => run(wrapped, other, path.to_vec(), config).await,
        },
        Kind::Nullable { wrapped } => match input {
            Value::Null => Dataset::typed(input),
            other => run(wrapped, other, path.to_vec(), config).await,
        },
        Kind::Nullish { wrapped } => match input {
            Value::Undefined | Value::Null => Dataset::typed(input),
            other => run(wrapped, other, path.to_vec(), config).await,
        },
        Kind::NonOptional { wrapped } => match input {
            Value::Undefined => type_failure(schema, input, path, config),
            other => run(wrapped, other, path.to_vec(), config).await,
        },
        Kind::NonNullable { wrapped } => match input {
            Value::Null => type_failure(schema, input, path, config),
            other => run(wrapped, other, path.to_vec(), config).await,
        },
        Kind::NonNullish { wrapped } => match input {
            Value::Undefined | Value::Null => type_failure(schema, input, path, config),
            other => run(wrapped, other, path.to_vec(), config).await,
        },

        Kind::Union { options } => {
            let mut typed = Vec::new();
            let mut untyped = Vec::new();
            for option in options {
                let child = run(option, input.clone(), path.to_vec(), config).await;
                if child.is_valid() {
                    return child;
                }
                if child.typed {
                    typed.push(child);
                } else {
                    untyped.push(child);
                }
            }
            if typed.len() == 1 || (typed.is_empty() && untyped.len() == 1) {
                if let Some(only) = typed.pop().or_else(|| untyped.pop()) {
                    return only;
                }
            }
            let nested = if typed.is_empty() { untyped } else { typed };
            let nested: Vec<Issue> = nested.into_iter().flat_map(|d| d.issues).collect();
            let mut dataset = type_failure(schema, input, path, config);
            if let Some(issue) = dataset.issues.first_mut() {
                issue.issues = Some(nested);
            }
            dataset
        }

        Kind::Variant { key, options } => {
            if !matches!(input, Value::Object(_)) {
                return type_failure(schema, input, path, config);
            }
            let discriminator = input.get(key).clone();
            let mut expected = Vec::new();
            for option in options {
                let matched = match discriminator_of(option, key) {
                    Some(entry) => {
                        expected.push(entry.expects().to_string());
                        run(entry, discriminator.clone(), child_path(path, key.as_str()), config)
                            .await
                            .is_valid()
                    }
                    None => run(option, input.clone(), path.to_vec(), config).await.is_valid(),
                };
                if matched {
                    return run(option, input, path.to_vec(), config).await;
                }
            }
            let expected = expected.join(" | ");
            let received = discriminator.received();
            let message = schema
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| default_message("type", Some(&expected), &received));
            Dataset {
                value: input,
                typed: false,
                issues: vec![Issue {
                    kind: IssueKind::Schema,
                    type_: schema.type_name(),
                    input: discriminator,
                    expected: Some(expected),
                    received,
                    message,
                    path: issue_path(&child_path(path, key.as_str())),
                    lang: config.lang.clone(),
                    issues: None,
                }],
            }
        }

        Kind::Intersect { options } => {
            if options.is_empty() {
                return Dataset::typed(input);
            }
            let mut dataset = Dataset::typed(Value::Undefined);
            let mut outputs = Vec::with_capacity(options.len());
            for option in options {
                let child = run(option, input.clone(), path.to_vec(), config).await;
                outputs.push(dataset.merge_child(child));
                if dataset.should_abort(config) {
                    break;
                }
            }
            if !dataset.is_valid() {
                dataset.value = input;
                return dataset;
            }
            let merged = outputs
                .into_iter()
                .map(Some)
                .reduce(|acc, next| merge_outputs(acc?, next?));
            match merged.flatten() {
                Some(value) => Dataset::typed(value),
                None => type_failure(schema, input, path, config),
            }
        }

        kind => {
            if accepts(kind, &input) {
                Dataset::typed(input)
            } else {
                type_failure(schema, input, path, config)
            }
        }
    }
}

async fn run_pipe(
    schema: &Schema,
    mut dataset: Dataset,
    path: &[PathKey],
    config: &Config,
) -> Dataset {
    for action in schema.pipe() {
        let has_issues = !dataset.issues.is_empty();
        if has_issues && action.category() != Category::Validation {
            dataset.typed = false;
            break;
        }
        if has_issues && (config.abort_early || config.abort_pipe_early) {
            break;
        }
        match action.kind() {
            ActionKind::Coerce(coercion) => {
                dataset.value = coercion.apply(std::mem::take(&mut dataset.value));
            }
            ActionKind::Transform(f) => {
                dataset.value = f(std::mem::take(&mut dataset.value));
            }
            ActionKind::TransformAsync(f) => {
                dataset.value = f(std::mem::take(&mut dataset.value)).await;
            }
            ActionKind::Schema(nested) => {
                let value = std::mem::take(&mut dataset.value);
                let child = run(nested, value, path.to_vec(), config).await;
                dataset.typed = child.typed;
                dataset.value = child.value;
                dataset.issues.extend(child.issues);
            }
            ActionKind::CheckAsync(predicate) => {
                if dataset.typed && !predicate(dataset.value.clone()).await {
                    dataset.issues.push(action_issue(action, &dataset.value, path, config));
                }
            }
            kind => {
                if dataset.typed && !passes(kind, &dataset.value) {
                    dataset.issues.push(action_issue(action, &dataset.value, path, config));
                }
            }
        }
    }
    dataset
}

// ------------------------------ Checks ----------------------------------- //

fn accepts(kind: &Kind, value: &Value) -> bool {
    match kind {
        Kind::Unknown => true,
        Kind::String => matches!(value, Value::String(_)),
        Kind::Number => matches!(value, Value::Number(n) if !n.is_nan()),
        Kind::Boolean => matches!(value, Value::Bool(_)),
        Kind::Date => matches!(value, Value::Date(_)),
        Kind::BigInt => matches!(value, Value::BigInt(_)),
        Kind::File | Kind::Blob => matches!(value, Value::File(_)),
        Kind::Undefined => value.is_undefined(),
        Kind::Literal(literal) => value == literal,
        Kind::Enum(options) => options.contains(value),
        _ => false,
    }
}

fn passes(kind: &ActionKind, value: &Value) -> bool {
    match kind {
        ActionKind::MinLength(n) => value.length().is_none_or(|len| len >= *n),
        ActionKind::MaxLength(n) => value.length().is_none_or(|len| len <= *n),
        ActionKind::Length(n) => value.length().is_none_or(|len| len == *n),
        ActionKind::MinValue(n) => value.magnitude().is_none_or(|m| m >= *n),
        ActionKind::MaxValue(n) => value.magnitude().is_none_or(|m| m <= *n),
        ActionKind::Regex(rx) => value.as_str().is_none_or(|s| rx.is_match(s)),
        ActionKind::Email => value.as_str().is_none_or(|s| EMAIL_REGEX.is_match(s)),
        ActionKind::Check(predicate) => predicate(value),
        _ => true,
    }
}

/// The schema that tells a variant option apart, if the option is object-shaped.
fn discriminator_of<'a>(option: &'a Schema, key: &str) -> Option<&'a Schema> {
    match option.kind() {
        Kind::Object { entries } | Kind::ObjectWithRest { entries, .. } => entries.get(key),
        _ => None,
    }
}

fn merge_outputs(left: Value, right: Value) -> Option<Value> {
    match (left, right) {
        (Value::Object(mut left), Value::Object(right)) => {
            for (key, value) in right {
                let merged = match left.get(&key).cloned() {
                    Some(existing) => merge_outputs(existing, value)?,
                    None => value,
                };
                left.insert(key, merged);
            }
            Some(Value::Object(left))
        }
        (Value::Array(left), Value::Array(right)) if left.len() == right.len() => left
            .into_iter()
            .zip(right)
            .map(|(l, r)| merge_outputs(l, r))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        (left, right) if left == right => Some(left),
        _ => None,
    }
}

// ------------------------------ Issues ----------------------------------- //

fn child_path(path: &[PathKey], key: impl Into<PathKey>) -> Vec<PathKey> {
    let mut out = path.to_vec();
    out.push(key.into());
    out
}

fn issue_path(path: &[PathKey]) -> Option<Vec<PathItem>> {
    if path.is_empty() {
        None
    } else {
        Some(path.iter().cloned().map(|key| PathItem { key }).collect())
    }
}

fn type_failure(schema: &Schema, input: Value, path: &[PathKey], config: &Config) -> Dataset {
    let expected = schema.expects().to_string();
    let received = input.received();
    let message = schema
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| default_message("type", Some(&expected), &received));
    let issue = Issue {
        kind: IssueKind::Schema,
        type_: schema.type_name(),
        input: input.clone(),
        expected: Some(expected),
        received,
        message,
        path: issue_path(path),
        lang: config.lang.clone(),
        issues: None,
    };
    Dataset { value: input, typed: false, issues: vec![issue] }
}

fn action_issue(action: &Action, value: &Value, path: &[PathKey], config: &Config) -> Issue {
    let (label, expected) = action.describe();
    let received = match action.kind() {
        ActionKind::MinLength(_) | ActionKind::MaxLength(_) | ActionKind::Length(_) => value
            .length()
            .map(|len| len.to_string())
            .unwrap_or_else(|| value.received()),
        _ => value.received(),
    };
    let message = action
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| default_message(label, expected.as_deref(), &received));
    Issue {
        kind: IssueKind::Validation,
        type_: action.type_name(),
        input: value.clone(),
        expected,
        received,
        message,
        path: issue_path(path),
        lang: config.lang.clone(),
        issues: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::action::{check, check_async, email, min_length, min_value, transform};
    use crate::schema::{
        array, intersect, literal, number, object, optional, string, union, variant,
    };
    use serde_json::json;

    fn parse(schema: &Schema, input: serde_json::Value) -> Outcome {
        safe_parse(schema, Value::from(input), &Config::default()).unwrap()
    }

    fn messages(outcome: Outcome) -> Vec<String> {
        match outcome {
            Outcome::Failure(issues) => issues.into_iter().map(|i| i.message).collect(),
            Outcome::Success(v) => panic!("expected failure, got {v:?}"),
        }
    }

    #[test]
    fn type_issue_message() {
        let out = messages(parse(&string(), json!(12)));
        assert_eq!(out, vec!["Invalid type: Expected string but received 12"]);
    }

    #[test]
    fn object_issues_carry_paths_and_strip_unknown_keys() {
        let schema = object([("name", string()), ("tags", array(string()))]);
        let outcome = parse(&schema, json!({"name": "a", "tags": ["x", 1], "extra": true}));
        let Outcome::Failure(issues) = outcome else { panic!("expected failure") };
        assert_eq!(issues.len(), 1);
        let keys = issues[0].path_keys().unwrap();
        assert_eq!(crate::path::format_paths(&keys), "tags[1]");

        let outcome = parse(&schema, json!({"name": "a", "tags": [], "extra": true}));
        let Outcome::Success(value) = outcome else { panic!("expected success") };
        assert_eq!(serde_json::to_value(value).unwrap(), json!({"name": "a", "tags": []}));
    }

    #[test]
    fn pipe_reports_every_failed_check_unless_aborting() {
        let schema = string().with_pipe([min_length(5), email()]);
        let out = messages(parse(&schema, json!("ab")));
        assert_eq!(
            out,
            vec![
                "Invalid length: Expected >=5 but received 2",
                "Invalid email: Received \"ab\"",
            ]
        );

        let config = Config { abort_pipe_early: true, ..Config::default() };
        let outcome = safe_parse(&schema, Value::from("ab"), &config).unwrap();
        assert_eq!(messages(outcome).len(), 1);
    }

    #[test]
    fn transform_stops_after_issues() {
        let double = transform(|v| Value::Number(v.as_f64().unwrap_or(0.0) * 2.0));
        let schema = number().with_pipe([min_value(10.0), double]);
        assert!(!parse(&schema, json!(6)).is_success());
        assert_eq!(parse(&schema, json!(12)), Outcome::Success(Value::Number(24.0)));
    }

    #[test]
    fn custom_messages_win() {
        let schema = object([(
            "age",
            number()
                .with_message("Age is required")
                .with_pipe([min_value(18.0).with_message("Too young")]),
        )]);
        assert_eq!(messages(parse(&schema, json!({}))), vec!["Age is required"]);
        assert_eq!(messages(parse(&schema, json!({"age": 16}))), vec!["Too young"]);
    }

    #[test]
    fn optional_members_are_omitted_from_output() {
        let schema = object([("a", optional(string())), ("b", string())]);
        let Outcome::Success(value) = parse(&schema, json!({"b": "x"})) else { panic!() };
        assert_eq!(serde_json::to_value(value).unwrap(), json!({"b": "x"}));
    }

    #[test]
    fn union_picks_first_valid_option() {
        let schema = union([number(), string()]);
        assert_eq!(parse(&schema, json!("x")), Outcome::Success(Value::from("x")));
        let out = messages(parse(&schema, json!(true)));
        assert_eq!(out, vec!["Invalid type: Expected (number | string) but received true"]);
    }

    #[test]
    fn variant_selects_by_discriminator() {
        let schema = variant(
            "kind",
            [
                object([("kind", literal("email")), ("address", string())]),
                object([("kind", literal("phone")), ("number", string())]),
            ],
        );
        let outcome = parse(&schema, json!({"kind": "phone"}));
        let Outcome::Failure(issues) = outcome else { panic!() };
        assert_eq!(crate::path::format_paths(&issues[0].path_keys().unwrap()), "number");

        let Outcome::Failure(issues) = parse(&schema, json!({"kind": "fax"})) else { panic!() };
        assert_eq!(
            issues[0].message,
            "Invalid type: Expected \"email\" | \"phone\" but received \"fax\""
        );
        assert_eq!(crate::path::format_paths(&issues[0].path_keys().unwrap()), "kind");
    }

    #[test]
    fn intersect_merges_object_outputs() {
        let schema = intersect([object([("a", string())]), object([("b", number())])]);
        let Outcome::Success(value) = parse(&schema, json!({"a": "x", "b": 1, "c": 2})) else {
            panic!()
        };
        assert_eq!(serde_json::to_value(value).unwrap(), json!({"a": "x", "b": 1}));
    }

    #[test]
    fn root_check_issue_has_no_path() {
        let schema = object([("a", string()), ("b", string())])
            .with_pipe([check(|v| v.get("a") == v.get("b")).with_message("must match")]);
        let Outcome::Failure(issues) = parse(&schema, json!({"a": "x", "b": "y"})) else {
            panic!()
        };
        assert!(issues[0].path.is_none());
        assert_eq!(issues[0].message, "must match");
    }

    #[test]
    fn sync_parse_refuses_async_schema() {
        let schema = string().with_pipe([check_async(|_| async { true }.boxed())]);
        assert!(matches!(
            safe_parse(&schema, Value::from("x"), &Config::default()),
            Err(ExecError::AsyncSchema)
        ));
    }

    #[tokio::test]
    async fn async_checks_are_awaited() {
        let taken = check_async(|v: Value| {
            async move {
                tokio::task::yield_now().await;
                v.as_str() != Some("admin")
            }
            .boxed()
        })
        .with_message("Username taken");
        let schema = object([("username", string().with_pipe([taken]))]);
        let outcome = safe_parse_async(
            schema.clone(),
            Value::from(json!({"username": "admin"})),
            Config::default(),
        )
        .await;
        let Outcome::Failure(issues) = outcome else { panic!() };
        assert_eq!(issues[0].message, "Username taken");

        let input = Value::from(json!({"username": "ada"}));
        let outcome = safe_parse_async(schema, input, Config::default()).await;
        assert!(outcome.is_success());
    }
}
