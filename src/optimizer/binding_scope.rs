use crate::{
    optimizer::{BindingErrorKind, PlanError},
    plan::LogicalPlan,
    schema::{ColumnKey, ColumnReference, CoreColumn, QualifiedName, ResolvedType, Schema, TableSourceReference},
};

/// Columns and table sources visible at one level of name lookup.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub schema: Schema,
    pub sources: Vec<TableSourceReference>,
}

/// Outcome of looking a name up in one scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeMatch {
    /// Bound column and the number of name parts it consumed
    Column(CoreColumn, usize),
    /// The qualifier names a source here but the source has no such column
    AliasWithoutColumn,
    None,
}

/// Sources whose aliases are addressable above `plan`.
pub fn visible_sources(plan: &LogicalPlan) -> Vec<TableSourceReference> {
    match plan {
        LogicalPlan::TableScan { source, .. }
        | LogicalPlan::TableFunctionScan { source, .. }
        | LogicalPlan::ExpressionScan { source, .. }
        | LogicalPlan::SubQuery { source, .. } => vec![source.clone()],
        LogicalPlan::Join { left, right, .. } => {
            let mut sources = visible_sources(left);
            sources.extend(visible_sources(right));
            sources
        }
        LogicalPlan::Filter { input, .. }
        | LogicalPlan::Projection { input, .. }
        | LogicalPlan::Aggregate { input, .. }
        | LogicalPlan::Sort { input, .. }
        | LogicalPlan::Limit { input, .. }
        | LogicalPlan::AssertRowCount { input, .. } => visible_sources(input),
        LogicalPlan::ConstantScan { .. }
        | LogicalPlan::Concatenation { .. }
        | LogicalPlan::OperatorFunctionScan { .. } => vec![],
    }
}

impl Scope {
    pub fn of(plan: &LogicalPlan) -> Self {
        Self { schema: plan.schema(), sources: visible_sources(plan) }
    }

    pub fn concat(&self, other: &Scope) -> Scope {
        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());
        Scope { schema: self.schema.concat(&other.schema), sources }
    }

    /// Single source addressed by `qualifier`; more than one is ambiguous.
    pub fn source_by_alias(&self, qualifier: &str) -> Result<Option<&TableSourceReference>, PlanError> {
        let mut found: Option<&TableSourceReference> = None;
        for source in self.sources.iter().filter(|source| source.matches_alias(qualifier)) {
            match found {
                Some(existing) if existing.id != source.id => {
                    return Err(PlanError::binding(
                        BindingErrorKind::AmbiguousAlias,
                        format!("Ambiguous alias: {}", qualifier),
                    ));
                }
                _ => found = Some(source),
            }
        }
        Ok(found)
    }

    fn column_of_source(schema: &Schema, source: &TableSourceReference, name: &str) -> Option<CoreColumn> {
        let owned = |column: &&CoreColumn| {
            !column.internal && column.column_reference.as_ref().is_some_and(|reference| {
                reference.source == source.id && !reference.is_asterisk() && reference.name.eq_ignore_ascii_case(name)
            })
        };
        if let Some(column) = schema.iter().find(owned) {
            return Some(column.clone());
        }
        if schema.asterisk_of(source.id).is_some() {
            return Some(CoreColumn::new(name, ResolvedType::any(), ColumnReference::regular(source.id, name)));
        }
        // nested tuples of populated joins
        schema.iter()
            .filter_map(|column| column.ty.nested_schema())
            .find_map(|nested| Self::column_of_source(nested, source, name))
    }

    /// Look `name` up: source alias first, then regular columns by name, then
    /// the asterisk slot of a single schema-less source.
    pub fn lookup(&self, name: &QualifiedName) -> Result<ScopeMatch, PlanError> {
        if name.len() > 1
            && let Some(source) = self.source_by_alias(name.first())?
        {
            return Ok(match Self::column_of_source(&self.schema, source, &name.parts[1]) {
                Some(column) => ScopeMatch::Column(column, 2),
                None => ScopeMatch::AliasWithoutColumn,
            });
        }

        let first = name.first();
        let mut keys: Vec<ColumnKey> = Vec::new();
        let mut matched: Option<&CoreColumn> = None;
        for index in self.schema.find_by_name(first) {
            let column = &self.schema.columns[index];
            let key = column.key();
            if !keys.contains(&key) {
                keys.push(key);
                matched.get_or_insert(column);
            }
        }
        if keys.len() > 1 {
            return Err(PlanError::binding(BindingErrorKind::AmbiguousColumn, format!("Ambiguous column: {}", first)));
        }
        if let Some(column) = matched {
            return Ok(ScopeMatch::Column(column.clone(), 1));
        }

        let schema_less = self.schema.iter()
            .filter(|column| column.is_asterisk() && !column.internal)
            .filter_map(CoreColumn::source)
            .fold(Vec::new(), |mut sources, source| {
                if !sources.contains(&source) { sources.push(source); }
                sources
            });
        match schema_less.as_slice() {
            [] => Ok(ScopeMatch::None),
            [source] => Ok(ScopeMatch::Column(
                CoreColumn::new(first, ResolvedType::any(), ColumnReference::regular(*source, first)),
                1,
            )),
            _ => Err(PlanError::binding(
                BindingErrorKind::AmbiguousColumn,
                format!("Ambiguous column: {}, it could belong to any of the schema-less sources", first),
            )),
        }
    }
}

/// One step of the scope chain.
///
/// The top frame holds the scopes of the expression being resolved; lower
/// frames are enclosing scopes. `found` collects columns read across the
/// boundary right above this frame.
#[derive(Debug, Default)]
pub struct Frame {
    pub levels: Vec<Scope>,
    pub found: Vec<CoreColumn>,
}

impl Frame {
    pub fn new(levels: Vec<Scope>) -> Self {
        Self { levels, found: Vec::new() }
    }

    pub fn record(&mut self, column: &CoreColumn) {
        let key = column.key();
        if !self.found.iter().any(|existing| existing.key() == key) {
            self.found.push(column.clone());
        }
    }
}

/// Union of two outer reference sets, keeping first occurrences.
pub fn merge_outer_references(mut existing: Vec<CoreColumn>, found: Vec<CoreColumn>) -> Vec<CoreColumn> {
    for column in found {
        let key = column.key();
        if !existing.iter().any(|current| current.key() == key) {
            existing.push(column);
        }
    }
    existing
}

#[cfg(test)]
mod tests {
    use crate::schema::{TableSourceId, TableSourceKind};

    use super::*;

    fn source(id: usize, name: &str, alias: &str) -> TableSourceReference {
        TableSourceReference::new(TableSourceId(id), TableSourceKind::Table, None, QualifiedName::of(name), Some(alias.into()))
    }

    fn scope() -> Scope {
        let a = source(0, "tableA", "a");
        let b = source(1, "tableB", "b");
        let column = |source: &TableSourceReference, name: &str| {
            CoreColumn::new(name, ResolvedType::int(), ColumnReference::regular(source.id, name))
        };
        Scope {
            schema: Schema::new(vec![column(&a, "col1"), column(&a, "col2"), column(&b, "col1"), column(&b, "col3")]),
            sources: vec![a, b],
        }
    }

    #[test]
    fn alias_binds_to_its_source() {
        let found = scope().lookup(&QualifiedName::of("b.col1")).unwrap();
        let ScopeMatch::Column(column, consumed) = found else { panic!("expected a column") };
        assert_eq!(column.source(), Some(TableSourceId(1)));
        assert_eq!(consumed, 2);
        assert_eq!(scope().lookup(&QualifiedName::of("b.col2")).unwrap(), ScopeMatch::AliasWithoutColumn);
    }

    #[test]
    fn unqualified_name_in_two_sources_is_ambiguous() {
        let error = scope().lookup(&QualifiedName::of("col1")).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::AmbiguousColumn));
        assert!(matches!(scope().lookup(&QualifiedName::of("col3")).unwrap(), ScopeMatch::Column(_, 1)));
    }

    #[test]
    fn single_schema_less_source_binds_anything() {
        let c = source(2, "tableX", "x");
        let scope = Scope { schema: Schema::asterisk(c.id), sources: vec![c] };
        let ScopeMatch::Column(column, _) = scope.lookup(&QualifiedName::of("whatever")).unwrap() else {
            panic!("expected a column")
        };
        assert_eq!(column.column_reference, Some(ColumnReference::regular(TableSourceId(2), "whatever")));
        assert!(column.ty.is_any());
    }
}
