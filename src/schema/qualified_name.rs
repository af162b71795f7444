use std::fmt;

use serde::Serialize;

/// A dotted identifier as written in the query, e.g. `a.col1` or `sys.tables`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QualifiedName {
    pub parts: Vec<String>,
}

impl QualifiedName {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// Split a dotted string into its parts. Empty segments are dropped.
    pub fn of(text: &str) -> Self {
        Self {
            parts: text.split('.')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn first(&self) -> &str {
        self.parts.first().map(String::as_str).unwrap_or("")
    }

    pub fn last(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Parts after the first one.
    pub fn rest(&self) -> &[String] {
        if self.parts.is_empty() { &[] } else { &self.parts[1..] }
    }

    pub fn eq_ignore_case(&self, other: &QualifiedName) -> bool {
        self.parts.len() == other.parts.len()
            && self.parts.iter().zip(&other.parts).all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        QualifiedName::of(value)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedName({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_splits_on_dots_and_trims() {
        let name = QualifiedName::of("a. col1 .field");
        assert_eq!(name.parts, vec!["a", "col1", "field"]);
        assert_eq!(name.first(), "a");
        assert_eq!(name.last(), "field");
        assert_eq!(name.rest(), &["col1".to_string(), "field".to_string()]);
    }

    #[test]
    fn eq_ignore_case_compares_all_parts() {
        assert!(QualifiedName::of("A.Col1").eq_ignore_case(&QualifiedName::of("a.col1")));
        assert!(!QualifiedName::of("a.col1").eq_ignore_case(&QualifiedName::of("a")));
    }
}
