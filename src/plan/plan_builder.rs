use crate::{
    expr::{Expression, ForClause, FunctionCallExpression},
    plan::{JoinType, LogicalPlan, ProjectionItem, SortItem},
    schema::{QualifiedName, TableSourceId, TableSourceKind, TableSourceReference},
};

/// Builds raw, unresolved plans and hands out unique source ids.
///
/// Plays the part of the parser: tables carry no schema, columns are plain
/// qualified names.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    next_source_id: usize,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn source(&mut self, kind: TableSourceKind, catalog_alias: Option<&str>, name: QualifiedName, alias: Option<&str>) -> TableSourceReference {
        let id = TableSourceId(self.next_source_id);
        self.next_source_id += 1;
        TableSourceReference::new(id, kind, catalog_alias.map(str::to_string), name, alias.map(str::to_string))
    }

    pub fn table(&mut self, name: &str, alias: Option<&str>) -> LogicalPlan {
        let source = self.source(TableSourceKind::Table, None, QualifiedName::of(name), alias);
        LogicalPlan::TableScan { source, schema: None, columns: None }
    }

    pub fn table_in(&mut self, catalog_alias: &str, name: &str, alias: Option<&str>) -> LogicalPlan {
        let source = self.source(TableSourceKind::Table, Some(catalog_alias), QualifiedName::of(name), alias);
        LogicalPlan::TableScan { source, schema: None, columns: None }
    }

    pub fn table_function(&mut self, name: &str, args: Vec<Expression>, alias: Option<&str>) -> LogicalPlan {
        let source = self.source(TableSourceKind::TableFunction, None, QualifiedName::of(name), alias);
        let function = FunctionCallExpression::new(name, args);
        LogicalPlan::TableFunctionScan { source, function, schema: None }
    }

    /// Scan of a table/array valued expression, e.g. `a.items i` in an apply join.
    pub fn expression_scan(&mut self, expression: Expression, alias: &str) -> LogicalPlan {
        let source = self.source(TableSourceKind::ExpressionScan, None, QualifiedName::of(&expression.to_string()), Some(alias));
        LogicalPlan::ExpressionScan { source, expression, schema: None }
    }

    /// Derived table `(input) alias`.
    pub fn sub_query(&mut self, input: LogicalPlan, alias: &str) -> LogicalPlan {
        let source = self.source(TableSourceKind::SubQuery, None, QualifiedName::of(alias), Some(alias));
        LogicalPlan::SubQuery { input: Box::new(input), source }
    }

    /// Input of a select without FROM.
    pub fn no_table() -> LogicalPlan {
        LogicalPlan::ConstantScan { columns: Vec::new(), rows: vec![Vec::new()] }
    }

    pub fn values(columns: &[&str], rows: Vec<Vec<Expression>>) -> LogicalPlan {
        LogicalPlan::ConstantScan { columns: columns.iter().map(|name| name.to_string()).collect(), rows }
    }
}

/// Fluent construction of parent nodes.
impl LogicalPlan {
    pub fn filter(self, predicate: Expression) -> LogicalPlan {
        LogicalPlan::Filter { input: Box::new(self), predicate }
    }

    pub fn project(self, items: Vec<ProjectionItem>) -> LogicalPlan {
        LogicalPlan::Projection { input: Box::new(self), items }
    }

    pub fn aggregate(self, group_by: Vec<Expression>, items: Vec<ProjectionItem>) -> LogicalPlan {
        LogicalPlan::Aggregate { input: Box::new(self), group_by, items }
    }

    pub fn sort(self, items: Vec<SortItem>) -> LogicalPlan {
        LogicalPlan::Sort { input: Box::new(self), items }
    }

    pub fn limit(self, limit: Option<Expression>, offset: Option<Expression>) -> LogicalPlan {
        LogicalPlan::Limit { input: Box::new(self), limit, offset }
    }

    pub fn join(self, right: LogicalPlan, join_type: JoinType, condition: Option<Expression>) -> LogicalPlan {
        LogicalPlan::Join {
            left: Box::new(self),
            right: Box::new(right),
            join_type,
            condition,
            populate: None,
            outer_references: Vec::new(),
        }
    }

    /// Join nesting the right rows into one table column named `alias`.
    pub fn populate_join(self, right: LogicalPlan, join_type: JoinType, condition: Option<Expression>, alias: &str) -> LogicalPlan {
        LogicalPlan::Join {
            left: Box::new(self),
            right: Box::new(right),
            join_type,
            condition,
            populate: Some(alias.to_string()),
            outer_references: Vec::new(),
        }
    }

    pub fn for_clause(self, for_clause: ForClause, column: String) -> LogicalPlan {
        LogicalPlan::OperatorFunctionScan { input: Box::new(self), for_clause, column }
    }

    pub fn assert_max_rows(self, max_rows: usize) -> LogicalPlan {
        LogicalPlan::AssertRowCount { input: Box::new(self), max_rows }
    }

    pub fn concatenate(inputs: Vec<LogicalPlan>) -> LogicalPlan {
        LogicalPlan::Concatenation { inputs }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{eq, name};

    use super::*;

    #[test]
    fn builder_allocates_unique_source_ids() {
        let mut builder = PlanBuilder::new();
        let a = builder.table("tableA", Some("a"));
        let b = builder.table("tableB", Some("b"));
        let ids = [a.source().map(|s| s.id), b.source().map(|s| s.id)];
        assert_eq!(ids, [Some(TableSourceId(0)), Some(TableSourceId(1))]);

        let plan = a.join(b, JoinType::Inner, Some(eq(name("a.col1"), name("b.col1"))));
        assert_eq!(plan.children().len(), 2);
    }

    #[test]
    fn no_table_is_single_empty_row() {
        assert!(PlanBuilder::no_table().is_single_empty_row());
        assert_eq!(PlanBuilder::no_table().schema().len(), 0);
    }
}
