use std::fmt;

use serde::Serialize;

use crate::schema::TableSourceId;

pub const ASTERISK: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnReferenceKind {
    /// A concrete column of the source
    Regular,
    /// Placeholder for "all columns of the source", used while the column set is unknown
    Asterisk,
}

/// A column name scoped to a table source.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnReference {
    pub source: TableSourceId,
    pub name: String,
    pub kind: ColumnReferenceKind,
}

impl ColumnReference {
    pub fn regular(source: TableSourceId, name: impl Into<String>) -> Self {
        Self { source, name: name.into(), kind: ColumnReferenceKind::Regular }
    }

    pub fn asterisk(source: TableSourceId) -> Self {
        Self { source, name: ASTERISK.to_string(), kind: ColumnReferenceKind::Asterisk }
    }

    pub fn is_asterisk(&self) -> bool {
        self.kind == ColumnReferenceKind::Asterisk
    }

    /// Same column addressed through another source (derived tables re-own their input columns).
    pub fn with_source(&self, source: TableSourceId) -> Self {
        Self { source, name: self.name.clone(), kind: self.kind }
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.name)
    }
}

impl fmt::Debug for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnReference({})", self)
    }
}
