//! Form submissions: the raw multi-valued field list, and the parser that
//! nests it into a payload, hands it to a resolver and wraps the outcome.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::path::{join_index, join_name, parse_path, PathKey};
use crate::resolution::Resolution;
use crate::value::{FileValue, Value};

/// Reserved field carrying the submitter's intent (which button was pressed).
pub const INTENT: &str = "__intent__";

/// Furthest a field index may point past the end of its list.
const MAX_INDEX_GAP: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    File(FileValue),
}

impl From<&str> for FormValue {
    fn from(s: &str) -> Self {
        FormValue::Text(s.to_string())
    }
}

impl From<String> for FormValue {
    fn from(s: String) -> Self {
        FormValue::Text(s)
    }
}

impl From<FileValue> for FormValue {
    fn from(file: FileValue) -> Self {
        FormValue::File(file)
    }
}

impl From<FormValue> for Value {
    fn from(value: FormValue) -> Self {
        match value {
            FormValue::Text(text) => Value::String(text),
            FormValue::File(file) => Value::File(file),
        }
    }
}

/// Ordered, multi-valued field list, as a browser submits it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<FormValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_urlencoded(input: &str) -> Self {
        let mut form = Self::new();
        for (name, value) in url::form_urlencoded::parse(input.trim().as_bytes()) {
            form.append(name.into_owned(), value.into_owned());
        }
        form
    }

    /// Flatten a JSON object into fields the way a browser would name them:
    /// nested objects use `a.b`, arrays of objects `a[0].b`, scalar arrays
    /// repeat the name. `true` submits `"on"`; `false` and `null` submit
    /// nothing. Objects shaped `{name, type, size}` are file selections.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, Error> {
        let serde_json::Value::Object(members) = json else {
            return Err(Error::PayloadShape);
        };
        let mut form = Self::new();
        for (name, value) in members {
            form.append_json(name, value);
        }
        Ok(form)
    }

    fn append_json(&mut self, name: &str, value: &serde_json::Value) {
        use serde_json::Value as Json;
        match value {
            Json::Null | Json::Bool(false) => {}
            Json::Bool(true) => self.append(name, "on"),
            Json::Number(n) => self.append(name, n.to_string()),
            Json::String(s) => self.append(name, s.as_str()),
            Json::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Json::Object(_) | Json::Array(_) => {
                            self.append_json(&join_index(name, index), item)
                        }
                        scalar => self.append_json(name, scalar),
                    }
                }
            }
            Json::Object(members) => match file_selection(members) {
                Some(file) => self.append(name, file),
                None => {
                    for (key, member) in members {
                        self.append_json(&join_name(name, key), member);
                    }
                }
            },
        }
    }
}

fn file_selection(members: &serde_json::Map<String, serde_json::Value>) -> Option<FileValue> {
    if members.len() != 3 {
        return None;
    }
    let name = members.get("name")?.as_str()?;
    let content_type = members.get("type")?.as_str()?;
    let size = members.get("size")?.as_u64()?;
    Some(FileValue::new(name, content_type, size))
}

// ------------------------------ Submission ------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// What a resolver decides about a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveResult {
    Value(Value),
    /// Messages per field path, in the order they were raised.
    Error(IndexMap<String, Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub status: Status,
    pub intent: Option<String>,
    /// The nested raw payload, before coercion.
    pub payload: Value,
    /// Submitted field names, in order of first appearance.
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IndexMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    /// Drop the submitted values so the form renders empty.
    pub reset_form: bool,
    /// Errors for the form as a whole, reported under the empty name.
    pub form_errors: Vec<String>,
    pub field_errors: IndexMap<String, Vec<String>>,
    /// Fields never echoed back (passwords and the like).
    pub hide_fields: Vec<String>,
}

/// What the client re-renders the form from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReply {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub initial_value: Option<Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub error: IndexMap<String, Vec<String>>,
}

impl Submission {
    fn new(
        intent: Option<String>,
        payload: Value,
        fields: Vec<String>,
        result: ResolveResult,
    ) -> Self {
        let (status, value, error) = match result {
            ResolveResult::Value(value) => (Status::Success, Some(value), None),
            ResolveResult::Error(error) => (Status::Error, None, Some(error)),
        };
        Self { status, intent, payload, fields, value, error }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn reply(&self, options: ReplyOptions) -> SubmissionReply {
        let mut error = self.error.clone().unwrap_or_default();
        if !options.form_errors.is_empty() {
            error.entry(String::new()).or_default().extend(options.form_errors);
        }
        for (name, messages) in options.field_errors {
            error.entry(name).or_default().extend(messages);
        }

        let initial_value = if options.reset_form {
            None
        } else {
            let mut payload = self.payload.clone();
            for name in &options.hide_fields {
                hide(&mut payload, &parse_path(name));
            }
            Some(payload)
        };

        SubmissionReply {
            status: if error.is_empty() { Status::Success } else { Status::Error },
            intent: self.intent.clone(),
            initial_value,
            error,
        }
    }
}

// ------------------------------- Parser ---------------------------------- //

/// Nest the fields into a payload, resolve it, and wrap the outcome.
///
/// `resolve` receives the payload (without the intent field) and the intent.
/// Its error is passed through untouched.
pub fn parse<E, F>(form: &FormData, resolve: F) -> Result<Resolution<Submission>, E>
where
    F: FnOnce(Value, Option<&str>) -> Result<Resolution<ResolveResult>, E>,
{
    let intent = match form.get(INTENT) {
        Some(FormValue::Text(intent)) => Some(intent.clone()),
        _ => None,
    };

    let mut payload = Value::Object(IndexMap::new());
    let mut fields: Vec<String> = Vec::new();
    for (name, value) in form.entries().filter(|(name, _)| *name != INTENT) {
        let keys = parse_path(name);
        if keys.is_empty() {
            continue;
        }
        if !fields.iter().any(|f| f == name) {
            fields.push(name.to_string());
        }
        // names that cannot nest stay whole, like unparseable brackets do
        let keys = if can_nest(&payload, &keys) {
            keys
        } else {
            debug!(name, "keeping field name unnested");
            vec![PathKey::Name(name.to_string())]
        };
        set_value(&mut payload, &keys, Value::from(value.clone()));
    }

    let resolution = resolve(payload.clone(), intent.as_deref())?;
    Ok(resolution.map(move |result| Submission::new(intent, payload, fields, result)))
}

/// Whether `keys` can be placed under `target` without replacing a value
/// that is already there.
fn can_nest(target: &Value, keys: &[PathKey]) -> bool {
    let Some((head, rest)) = keys.split_first() else {
        return true;
    };
    match (head, target) {
        (_, Value::Undefined) => keys.iter().all(|key| match key {
            PathKey::Index(index) => *index <= MAX_INDEX_GAP,
            PathKey::Name(_) => true,
        }),
        (PathKey::Name(name), Value::Object(members)) => {
            can_nest(members.get(name).unwrap_or(&Value::Undefined), rest)
        }
        (PathKey::Index(index), Value::Array(items)) => {
            *index <= items.len().saturating_add(MAX_INDEX_GAP)
                && can_nest(items.get(*index).unwrap_or(&Value::Undefined), rest)
        }
        _ => false,
    }
}

/// Place `value` at `keys`. Only absent slots become containers; callers
/// check the shape with [`can_nest`] first.
fn set_value(target: &mut Value, keys: &[PathKey], value: Value) {
    let Some((head, rest)) = keys.split_first() else {
        append(target, value);
        return;
    };
    match head {
        PathKey::Name(name) => {
            if target.is_undefined() {
                *target = Value::Object(IndexMap::new());
            }
            if let Value::Object(members) = target {
                set_value(members.entry(name.clone()).or_default(), rest, value);
            }
        }
        PathKey::Index(index) => {
            if target.is_undefined() {
                *target = Value::Array(Vec::new());
            }
            if let Value::Array(items) = target {
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Undefined);
                }
                set_value(&mut items[*index], rest, value);
            }
        }
    }
}

/// A repeated name turns the slot into a list.
fn append(slot: &mut Value, value: Value) {
    match slot {
        Value::Undefined => *slot = value,
        Value::Array(items) => items.push(value),
        _ => {
            let first = std::mem::take(slot);
            *slot = Value::Array(vec![first, value]);
        }
    }
}

fn hide(target: &mut Value, keys: &[PathKey]) {
    match (target, keys) {
        (Value::Object(members), [PathKey::Name(name)]) => {
            if let Some(slot) = members.get_mut(name) {
                *slot = Value::Undefined;
            }
        }
        (Value::Array(items), [PathKey::Index(index)]) => {
            if let Some(slot) = items.get_mut(*index) {
                *slot = Value::Undefined;
            }
        }
        (Value::Object(members), [PathKey::Name(name), rest @ ..]) => {
            if let Some(slot) = members.get_mut(name) {
                hide(slot, rest);
            }
        }
        (Value::Array(items), [PathKey::Index(index), rest @ ..]) => {
            if let Some(slot) = items.get_mut(*index) {
                hide(slot, rest);
            }
        }
        _ => {}
    }
}
