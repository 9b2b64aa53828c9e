//! Field path convention shared by constraint derivation, error keys and
//! payload nesting: names join with `.`, indices render as `[i]`.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Name(name) => f.write_str(name),
            PathKey::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathKey {
    fn from(s: &str) -> Self {
        PathKey::Name(s.to_string())
    }
}

impl From<usize> for PathKey {
    fn from(i: usize) -> Self {
        PathKey::Index(i)
    }
}

/// `["addresses", 0, "city"]` → `addresses[0].city`
pub fn format_paths(keys: &[PathKey]) -> String {
    keys.iter().fold(String::new(), |name, key| match key {
        PathKey::Index(i) => join_index(&name, *i),
        PathKey::Name(key) => join_name(&name, key),
    })
}

pub fn join_name(name: &str, key: &str) -> String {
    if name.is_empty() || key.is_empty() {
        format!("{name}{key}")
    } else {
        format!("{name}.{key}")
    }
}

pub fn join_index(name: &str, index: usize) -> String {
    format!("{name}[{index}]")
}

/// Any member of a list, as used by constraint paths (`tags[]`).
pub fn join_any_index(name: &str) -> String {
    format!("{name}[]")
}

/// Inverse of [`format_paths`]. Unparseable brackets are kept as part of the name.
pub fn parse_path(name: &str) -> Vec<PathKey> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    out.push(PathKey::Name(std::mem::take(&mut current)));
                }
            }
            '[' => {
                let mut digits = String::new();
                let mut closed = false;
                while let Some(&d) = chars.peek() {
                    chars.next();
                    if d == ']' {
                        closed = true;
                        break;
                    }
                    digits.push(d);
                }
                match (closed, digits.parse::<usize>()) {
                    (true, Ok(i)) => {
                        if !current.is_empty() {
                            out.push(PathKey::Name(std::mem::take(&mut current)));
                        }
                        out.push(PathKey::Index(i));
                    }
                    _ => {
                        current.push('[');
                        current.push_str(&digits);
                        if closed {
                            current.push(']');
                        }
                    }
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(PathKey::Name(current));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_mixed_paths() {
        let keys = vec![PathKey::from("addresses"), PathKey::from(0), PathKey::from("city")];
        assert_eq!(format_paths(&keys), "addresses[0].city");
        assert_eq!(format_paths(&[PathKey::from(2)]), "[2]");
        assert_eq!(format_paths(&[]), "");
    }

    #[test]
    fn incremental_joins_match_format() {
        let name = join_name("", "addresses");
        let name = join_index(&name, 0);
        let name = join_name(&name, "city");
        assert_eq!(name, "addresses[0].city");
        assert_eq!(join_any_index("tags"), "tags[]");
    }

    #[test]
    fn parse_inverts_format() {
        let keys = parse_path("addresses[0].city");
        assert_eq!(keys, vec![PathKey::from("addresses"), PathKey::from(0), PathKey::from("city")]);
        assert_eq!(format_paths(&keys), "addresses[0].city");
    }

    #[test]
    fn parse_keeps_odd_brackets_in_name() {
        assert_eq!(parse_path("tags[]"), vec![PathKey::from("tags[]")]);
        assert_eq!(parse_path("a[x].b"), vec![PathKey::from("a[x]"), PathKey::from("b")]);
    }
}
