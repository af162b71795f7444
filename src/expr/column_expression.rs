use std::fmt;

use serde::Serialize;

use crate::schema::{ColumnKey, ColumnReference, CoreColumn, ResolvedType};

/// How the runtime reaches a column inside its input tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnAccess {
    /// Not yet assigned, only valid before ordinal resolution
    #[default]
    Unresolved,
    /// `ordinal` within the tuple; `tuple_ordinal` is the slot holding a nested
    /// (populated) tuple when the column is not a direct slot
    Ordinal { frame: Option<usize>, tuple_ordinal: Option<usize>, ordinal: usize },
    /// Column of a schema-less source, looked up by name in the slot `tuple_ordinal`
    Named { frame: Option<usize>, tuple_ordinal: usize },
}

impl ColumnAccess {
    /// Correlation tuple an outer reference is read from: 0 is the nearest
    /// enclosing one, 1 the one enclosing it, and so on. `None` reads the
    /// tuple of the evaluating node.
    pub fn frame(&self) -> Option<usize> {
        match self {
            ColumnAccess::Unresolved => None,
            ColumnAccess::Ordinal { frame, .. } | ColumnAccess::Named { frame, .. } => *frame,
        }
    }
}

/// A bound column reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnExpression {
    pub name: String,
    pub column_reference: Option<ColumnReference>,
    pub ty: ResolvedType,
    /// Read from an enclosing scope, i.e. the column is a correlation input
    pub outer_reference: bool,
    pub access: ColumnAccess,
}

impl ColumnExpression {
    pub fn new(name: impl Into<String>, column_reference: Option<ColumnReference>, ty: ResolvedType) -> Self {
        Self {
            name: name.into(),
            column_reference,
            ty,
            outer_reference: false,
            access: ColumnAccess::Unresolved,
        }
    }

    /// Reference to a schema column.
    pub fn of(column: &CoreColumn) -> Self {
        Self::new(column.name.clone(), column.column_reference.clone(), column.ty.clone())
    }

    pub fn outer(mut self) -> Self {
        self.outer_reference = true;
        self
    }

    pub fn key(&self) -> ColumnKey {
        match &self.column_reference {
            Some(reference) => ColumnKey::Reference(reference.clone()),
            None => ColumnKey::Name(self.name.clone()),
        }
    }

    pub fn is_asterisk(&self) -> bool {
        self.column_reference.as_ref().is_some_and(ColumnReference::is_asterisk)
    }
}

impl fmt::Display for ColumnExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column_reference {
            Some(reference) => write!(f, "{}", reference)?,
            None => write!(f, "{}", self.name)?,
        }
        if self.outer_reference {
            write!(f, " (outer)")?;
        }
        match self.access {
            ColumnAccess::Unresolved => return Ok(()),
            ColumnAccess::Ordinal { tuple_ordinal: Some(tuple), ordinal, .. } => write!(f, "@{}.{}", tuple, ordinal)?,
            ColumnAccess::Ordinal { tuple_ordinal: None, ordinal, .. } => write!(f, "@{}", ordinal)?,
            ColumnAccess::Named { tuple_ordinal, .. } => write!(f, "@{}.?", tuple_ordinal)?,
        }
        match self.access.frame() {
            Some(frame) => write!(f, "^{}", frame),
            None => Ok(()),
        }
    }
}
