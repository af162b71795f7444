use std::sync::Arc;

use crate::{
    catalog::{CatalogRegistry, MemoryCatalog},
    optimizer::{run_pass, ColumnResolver, ExecutionContext, Optimizer, PlanError, SchemaResolver},
    plan::LogicalPlan,
    schema::{CoreColumn, ResolvedType, Schema},
};

pub fn create_catalog() -> MemoryCatalog {
    let item = Schema::new(vec![
        CoreColumn::computed("sku", ResolvedType::string()),
        CoreColumn::computed("qty", ResolvedType::int()),
    ]);
    MemoryCatalog::new("db")
        .with_table("tableA", &[
            ("col1", ResolvedType::int()),
            ("col2", ResolvedType::string()),
            ("col3", ResolvedType::int()),
        ])
        .with_table("tableB", &[
            ("col1", ResolvedType::int()),
            ("col2", ResolvedType::int()),
            ("col3", ResolvedType::int()),
        ])
        .with_table("tableC", &[
            ("col1", ResolvedType::int()),
            ("col2", ResolvedType::int()),
        ])
        .with_table("orders", &[
            ("id", ResolvedType::int()),
            ("tags", ResolvedType::array(ResolvedType::string())),
            ("items", ResolvedType::array(ResolvedType::Object(item))),
        ])
        .with_schema_less_table("events")
        .with_schema_less_table("logs")
}

pub fn create_context() -> ExecutionContext {
    ExecutionContext::new(CatalogRegistry::new("db", Arc::new(create_catalog())))
}

/// Schema and column resolution only.
pub fn resolve(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
    let plan = run_pass(&SchemaResolver, ctx, plan)?;
    run_pass(&ColumnResolver, ctx, plan)
}

pub fn optimize(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
    Optimizer::new().optimize(ctx, plan)
}

/// Nodes of `plan` matching `predicate`, pre-order.
pub fn find_nodes<'a>(plan: &'a LogicalPlan, predicate: impl Fn(&LogicalPlan) -> bool) -> Vec<&'a LogicalPlan> {
    let mut found = Vec::new();
    plan.visit(&mut |node| {
        if predicate(node) {
            found.push(node);
        }
    });
    found
}

/// Visible output columns as `name: type`.
pub fn visible_columns(plan: &LogicalPlan) -> Vec<String> {
    plan.schema().visible().map(|column| format!("{}: {}", column.name, column.ty)).collect()
}
