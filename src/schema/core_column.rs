use serde::Serialize;

use crate::schema::{ColumnKey, ColumnReference, ResolvedType, TableSourceId, ASTERISK};

/// One slot of a schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreColumn {
    /// display name
    pub name: String,
    pub ty: ResolvedType,
    /// owning column, `None` for computed columns
    pub column_reference: Option<ColumnReference>,
    /// carries a value between passes, never part of the user visible output
    pub internal: bool,
}

impl CoreColumn {
    pub fn new(name: impl Into<String>, ty: ResolvedType, column_reference: ColumnReference) -> Self {
        Self { name: name.into(), ty, column_reference: Some(column_reference), internal: false }
    }

    pub fn computed(name: impl Into<String>, ty: ResolvedType) -> Self {
        Self { name: name.into(), ty, column_reference: None, internal: false }
    }

    pub fn internal(name: impl Into<String>, ty: ResolvedType) -> Self {
        Self { name: name.into(), ty, column_reference: None, internal: true }
    }

    /// The single placeholder column of a schema-less source.
    pub fn asterisk(source: TableSourceId) -> Self {
        Self {
            name: ASTERISK.to_string(),
            ty: ResolvedType::any(),
            column_reference: Some(ColumnReference::asterisk(source)),
            internal: false,
        }
    }

    pub fn is_asterisk(&self) -> bool {
        self.column_reference.as_ref().is_some_and(ColumnReference::is_asterisk)
    }

    pub fn key(&self) -> ColumnKey {
        ColumnKey::of(self)
    }

    pub fn source(&self) -> Option<TableSourceId> {
        self.column_reference.as_ref().map(|reference| reference.source)
    }
}
