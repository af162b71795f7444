use std::fmt;

use serde::Serialize;

use crate::schema::{ColumnKey, ColumnReference, CoreColumn, TableSourceId};

/// Where a column lives inside a runtime tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLocation {
    /// Slot of the tuple itself
    Direct(usize),
    /// Slot of a nested tuple carried by a table/object typed column
    Nested { tuple: usize, ordinal: usize },
    /// Named lookup inside the asterisk slot of a schema-less source
    Dynamic { tuple: usize },
}

impl ColumnLocation {
    pub fn tuple_ordinal(&self) -> usize {
        match self {
            ColumnLocation::Direct(ordinal) => *ordinal,
            ColumnLocation::Nested { tuple, .. } | ColumnLocation::Dynamic { tuple } => *tuple,
        }
    }
}

/// Ordered sequence of columns produced by a plan node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub columns: Vec<CoreColumn>,
}

impl Schema {
    pub fn new(columns: Vec<CoreColumn>) -> Self {
        Self { columns }
    }

    /// Schema of a schema-less source: one asterisk placeholder.
    pub fn asterisk(source: TableSourceId) -> Self {
        Self { columns: vec![CoreColumn::asterisk(source)] }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CoreColumn> {
        self.columns.iter()
    }

    pub fn get(&self, ordinal: usize) -> Option<&CoreColumn> {
        self.columns.get(ordinal)
    }

    pub fn concat(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }

    /// Columns a user can see: everything that is not internal.
    pub fn visible(&self) -> impl Iterator<Item = &CoreColumn> {
        self.columns.iter().filter(|column| !column.internal)
    }

    pub fn keys(&self) -> Vec<ColumnKey> {
        self.columns.iter().map(CoreColumn::key).collect()
    }

    /// Distinct sources contributing to this schema, in column order.
    pub fn sources(&self) -> Vec<TableSourceId> {
        let mut sources = Vec::new();
        for source in self.columns.iter().filter_map(CoreColumn::source) {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }

    pub fn has_asterisk(&self) -> bool {
        self.columns.iter().any(CoreColumn::is_asterisk)
    }

    /// Case-insensitive lookup of regular, non internal columns.
    pub fn find_by_name(&self, name: &str) -> Vec<usize> {
        self.columns.iter()
            .enumerate()
            .filter(|(_, column)| !column.internal && !column.is_asterisk() && column.name.eq_ignore_ascii_case(name))
            .map(|(index, _)| index)
            .collect()
    }

    /// First slot carrying exactly this key.
    pub fn position_of(&self, key: &ColumnKey) -> Option<usize> {
        self.columns.iter().position(|column| match (key, &column.column_reference) {
            (ColumnKey::Reference(reference), Some(owned)) => reference == owned,
            (ColumnKey::Name(name), None) => &column.name == name,
            _ => false,
        })
    }

    /// Position of the asterisk slot of `source`, if it is schema-less here.
    pub fn asterisk_of(&self, source: TableSourceId) -> Option<usize> {
        let asterisk = ColumnReference::asterisk(source);
        self.columns.iter().position(|column| column.column_reference.as_ref() == Some(&asterisk))
    }

    /// Find where the column identified by `key` lives in a tuple of this schema.
    ///
    /// Direct slots win over nested tuples, which win over the dynamic asterisk
    /// slot of the owning source.
    pub fn locate(&self, key: &ColumnKey) -> Option<ColumnLocation> {
        if let Some(ordinal) = self.position_of(key) {
            return Some(ColumnLocation::Direct(ordinal));
        }
        let reference = key.reference()?;
        for (tuple, column) in self.columns.iter().enumerate() {
            if let Some(nested) = column.ty.nested_schema()
                && let Some(ordinal) = nested.position_of(key)
            {
                return Some(ColumnLocation::Nested { tuple, ordinal });
            }
        }
        if reference.is_asterisk() {
            return None;
        }
        self.asterisk_of(reference.source).map(|tuple| ColumnLocation::Dynamic { tuple })
    }

    pub fn provides(&self, key: &ColumnKey) -> bool {
        self.locate(key).is_some()
    }

    /// Re-own every column under `source`, as a derived table does with its input.
    pub fn with_source(&self, source: TableSourceId) -> Schema {
        Schema {
            columns: self.columns.iter().map(|column| {
                let reference = match &column.column_reference {
                    Some(reference) if reference.is_asterisk() => ColumnReference::asterisk(source),
                    _ => ColumnReference::regular(source, column.name.clone()),
                };
                CoreColumn {
                    name: column.name.clone(),
                    ty: column.ty.clone(),
                    column_reference: Some(reference),
                    internal: column.internal,
                }
            }).collect(),
        }
    }

    /// Same columns without any owning reference.
    pub fn detached(&self) -> Schema {
        Schema {
            columns: self.columns.iter().map(|column| CoreColumn {
                column_reference: None,
                ..column.clone()
            }).collect(),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.columns.iter()
            .map(|column| format!("{}: {}{}", column.name, column.ty, if column.internal { " (internal)" } else { "" }))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}", text)
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a CoreColumn;
    type IntoIter = std::slice::Iter<'a, CoreColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::ResolvedType;

    use super::*;

    fn column(source: usize, name: &str) -> CoreColumn {
        CoreColumn::new(name, ResolvedType::int(), ColumnReference::regular(TableSourceId(source), name))
    }

    #[test]
    fn locate_prefers_direct_slots() {
        let schema = Schema::new(vec![column(0, "col1"), column(0, "col2")]);
        let key = ColumnKey::Reference(ColumnReference::regular(TableSourceId(0), "col2"));
        assert_eq!(schema.locate(&key), Some(ColumnLocation::Direct(1)));
    }

    #[test]
    fn locate_finds_nested_tuple_columns() {
        let nested = Schema::new(vec![column(1, "col1"), column(1, "col3")]);
        let schema = Schema::new(vec![
            column(0, "col1"),
            CoreColumn::computed("b", ResolvedType::Table(nested)),
        ]);
        let key = ColumnKey::Reference(ColumnReference::regular(TableSourceId(1), "col3"));
        assert_eq!(schema.locate(&key), Some(ColumnLocation::Nested { tuple: 1, ordinal: 1 }));
    }

    #[test]
    fn locate_falls_back_to_asterisk_slot() {
        let schema = Schema::new(vec![column(0, "col1"), CoreColumn::asterisk(TableSourceId(2))]);
        let key = ColumnKey::Reference(ColumnReference::regular(TableSourceId(2), "anything"));
        assert_eq!(schema.locate(&key), Some(ColumnLocation::Dynamic { tuple: 1 }));

        let unknown = ColumnKey::Reference(ColumnReference::regular(TableSourceId(3), "col1"));
        assert_eq!(schema.locate(&unknown), None);
    }

    #[test]
    fn find_by_name_skips_internal_and_asterisk() {
        let schema = Schema::new(vec![
            column(0, "col1"),
            CoreColumn::internal("__expr0", ResolvedType::int()),
            CoreColumn::asterisk(TableSourceId(1)),
            column(2, "COL1"),
        ]);
        assert_eq!(schema.find_by_name("col1"), vec![0, 3]);
        assert!(schema.find_by_name("__expr0").is_empty());
    }

    #[test]
    fn with_source_reowns_columns() {
        let schema = Schema::new(vec![column(0, "col1"), CoreColumn::asterisk(TableSourceId(0))]);
        let derived = schema.with_source(TableSourceId(5));
        assert_eq!(derived.sources(), vec![TableSourceId(5)]);
        assert!(derived.columns[1].is_asterisk());
    }
}
