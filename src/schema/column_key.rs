use serde::Serialize;

use crate::schema::{ColumnReference, CoreColumn, TableSourceId};

/// Identity of a column slot between passes.
///
/// Columns that trace back to a table source are identified by their
/// reference; computed columns only by their output name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnKey {
    Reference(ColumnReference),
    Name(String),
}

impl ColumnKey {
    pub fn of(column: &CoreColumn) -> Self {
        match &column.column_reference {
            Some(reference) => ColumnKey::Reference(reference.clone()),
            None => ColumnKey::Name(column.name.clone()),
        }
    }

    pub fn source(&self) -> Option<TableSourceId> {
        match self {
            ColumnKey::Reference(reference) => Some(reference.source),
            ColumnKey::Name(_) => None,
        }
    }

    pub fn reference(&self) -> Option<&ColumnReference> {
        match self {
            ColumnKey::Reference(reference) => Some(reference),
            ColumnKey::Name(_) => None,
        }
    }
}
