use serde::Serialize;

use crate::path::PathKey;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Schema,
    Validation,
    Transformation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathItem {
    pub key: PathKey,
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub input: Value,
    pub expected: Option<String>,
    pub received: String,
    pub message: String,
    /// `None` for issues raised against the root value.
    pub path: Option<Vec<PathItem>>,
    pub lang: Option<String>,
    /// Issues of the individual options, for union failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Issue>>,
}

impl Issue {
    pub fn path_keys(&self) -> Option<Vec<PathKey>> {
        self.path
            .as_ref()
            .map(|items| items.iter().map(|item| item.key.clone()).collect())
    }
}

/// `Invalid {label}: Expected {expected} but received {received}`
pub(crate) fn default_message(label: &str, expected: Option<&str>, received: &str) -> String {
    match expected {
        Some(expected) => format!("Invalid {label}: Expected {expected} but received {received}"),
        None => format!("Invalid {label}: Received {received}"),
    }
}
