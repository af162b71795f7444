use std::{fmt, hash::{Hash, Hasher}};

use serde::Serialize;

use crate::schema::QualifiedName;

/// Identity of one FROM clause contributor, unique per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableSourceId(pub usize);

impl fmt::Display for TableSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TableSourceKind {
    Table,
    SubQuery,
    ExpressionScan,
    TableFunction,
}

/// A table source as it entered the plan. Created once, never mutated;
/// column references point back to it through its `id`.
///
/// Equality and hashing only look at the id.
#[derive(Debug, Clone, Serialize)]
pub struct TableSourceReference {
    pub id: TableSourceId,
    pub kind: TableSourceKind,
    pub catalog_alias: Option<String>,
    pub name: QualifiedName,
    pub alias: Option<String>,
}

impl TableSourceReference {
    pub fn new(
        id: TableSourceId,
        kind: TableSourceKind,
        catalog_alias: Option<String>,
        name: QualifiedName,
        alias: Option<String>,
    ) -> Self {
        Self { id, kind, catalog_alias, name, alias }
    }

    /// Name the source is addressed by: its alias, or the last part of its name.
    pub fn visible_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.last(),
        }
    }

    pub fn matches_alias(&self, qualifier: &str) -> bool {
        !qualifier.is_empty() && self.visible_name().eq_ignore_ascii_case(qualifier)
    }
}

impl PartialEq for TableSourceReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TableSourceReference {}

impl Hash for TableSourceReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TableSourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog_alias) = &self.catalog_alias {
            write!(f, "{}#", catalog_alias)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", alias)?;
        }
        write!(f, " ({})", self.id)
    }
}
