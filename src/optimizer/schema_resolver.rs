use tracing::{debug, trace};

use crate::{
    catalog::TableSchema,
    expr::{Expression, FunctionCallExpression},
    optimizer::{BindingErrorKind, ExecutionContext, LogicalPlanOptimizer, PlanError},
    plan::LogicalPlan,
    schema::TableSourceReference,
};

pub struct SchemaResolverContext<'a> {
    pub ctx: &'a ExecutionContext,
}

/// Binds table and table function sources to schemas and function calls to
/// descriptors.
///
/// Sources without a static schema become schema-less: a single asterisk
/// column. Expression scans are typed later by column resolution.
pub struct SchemaResolver;

impl LogicalPlanOptimizer for SchemaResolver {
    type Context<'a> = SchemaResolverContext<'a>;

    fn name(&self) -> &'static str {
        "SchemaResolver"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        SchemaResolverContext { ctx }
    }

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::resolve_plan(context.ctx, plan)
    }
}

impl SchemaResolver {
    pub fn resolve_plan(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        plan.transform_up(&mut |node| {
            let node = node.map_expressions(|expression| Self::resolve_expression(ctx, expression))?;
            Self::resolve_node(ctx, node)
        })
    }

    fn catalog_alias<'s>(ctx: &'s ExecutionContext, source: &'s TableSourceReference) -> &'s str {
        source.catalog_alias.as_deref().unwrap_or_else(|| ctx.default_catalog_alias())
    }

    fn resolve_node(ctx: &ExecutionContext, node: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        match node {
            LogicalPlan::TableScan { source, schema: None, columns } => {
                let alias = Self::catalog_alias(ctx, &source);
                let table_schema = ctx.registry.get(alias)?.table_schema(ctx, alias, &source.name)?;
                if table_schema.is_dynamic() {
                    debug!(table = %source.name, "table has no static schema");
                }
                let schema = table_schema.to_schema(source.id);
                trace!(table = %source.name, schema = %schema, "bound table");
                Ok(LogicalPlan::TableScan { source, schema: Some(schema), columns })
            }
            LogicalPlan::TableFunctionScan { source, mut function, schema: None } => {
                let descriptor = ctx.registry
                    .resolve_table_function(function.catalog_alias.as_deref(), &function.name, function.args.len())
                    .map_err(|error| error.at(function.location))?;
                let schema = descriptor.table_schema.clone().unwrap_or(TableSchema::Dynamic).to_schema(source.id);
                function.descriptor = Some(descriptor);
                Ok(LogicalPlan::TableFunctionScan { source, function, schema: Some(schema) })
            }
            other => Ok(other),
        }
    }

    /// Bind every function call and resolve sub-query plans.
    pub fn resolve_expression(ctx: &ExecutionContext, expression: Expression) -> Result<Expression, PlanError> {
        expression.transform_up(&mut |node| match node {
            Expression::Function(function) if function.descriptor.is_none() => {
                Self::resolve_function(ctx, function).map(Expression::Function)
            }
            Expression::SubQuery(mut sub_query) => {
                sub_query.plan = Box::new(Self::resolve_plan(ctx, *sub_query.plan)?);
                Ok(Expression::SubQuery(sub_query))
            }
            other => Ok(other),
        })
    }

    fn resolve_function(ctx: &ExecutionContext, mut function: FunctionCallExpression) -> Result<FunctionCallExpression, PlanError> {
        let descriptor = ctx.registry
            .resolve_scalar_function(function.catalog_alias.as_deref(), &function.name, function.args.len())
            .map_err(|error| error.at(function.location))?;
        function.descriptor = Some(descriptor);
        if function.is_aggregate() && function.args.iter().any(Expression::contains_aggregate) {
            return Err(PlanError::binding(
                BindingErrorKind::NestedAggregate,
                format!("Cannot aggregate an expression containing an aggregate: {}", function),
            ).at(function.location));
        }
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        catalog::{CatalogRegistry, MemoryCatalog},
        expr::{call, lit, name, sub_query},
        optimizer::{fixtures::create_context, run_pass},
        plan::{PlanBuilder, ProjectionItem},
        schema::{ColumnReference, ResolvedType, Schema, TableSourceId},
    };

    use super::*;

    fn bind(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        run_pass(&SchemaResolver, ctx, plan)
    }

    fn first_function(plan: &LogicalPlan) -> &FunctionCallExpression {
        match plan {
            LogicalPlan::Projection { items, .. } => match &items[0].expression {
                Expression::Function(function) => function,
                other => panic!("expected a function, got {}", other),
            },
            other => panic!("expected a projection, got {}", other.label()),
        }
    }

    #[test]
    fn table_binds_catalog_columns() {
        let ctx = create_context();
        let plan = bind(&ctx, PlanBuilder::new().table("tableA", Some("a"))).unwrap();
        let columns: Vec<_> = plan.schema().iter().map(|column| column.column_reference.clone()).collect();
        assert_eq!(columns, vec![
            Some(ColumnReference::regular(TableSourceId(0), "col1")),
            Some(ColumnReference::regular(TableSourceId(0), "col2")),
            Some(ColumnReference::regular(TableSourceId(0), "col3")),
        ]);
    }

    #[test]
    fn table_without_static_schema_is_one_asterisk_column() {
        let ctx = create_context();
        let plan = bind(&ctx, PlanBuilder::new().table("events", Some("e"))).unwrap();
        assert_eq!(plan.schema(), Schema::asterisk(TableSourceId(0)));
    }

    #[test]
    fn unknown_table_fails_in_strict_catalog() {
        let ctx = ExecutionContext::new(CatalogRegistry::new("db", Arc::new(MemoryCatalog::new("db").strict())));
        let error = bind(&ctx, PlanBuilder::new().table("missing", None)).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::UnknownTable));
        assert_eq!(error.message(), "Table missing does not exist in catalog: db");

        let error = bind(&ctx, PlanBuilder::new().table_in("other", "tableA", None)).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::UnknownCatalog));
    }

    #[test]
    fn table_function_takes_descriptor_schema() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table_function("range", vec![lit(1), lit(10)], Some("r"));
        let plan = bind(&ctx, plan).unwrap();
        let LogicalPlan::TableFunctionScan { function, schema, .. } = &plan else { panic!("expected a table function scan") };
        assert_eq!(function.descriptor.as_ref().map(|descriptor| descriptor.name.as_str()), Some("range"));
        let schema = schema.clone().unwrap_or_default();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.columns[0].name, "Value");
        assert_eq!(schema.columns[0].ty, ResolvedType::int());
        assert_eq!(schema.columns[0].column_reference, Some(ColumnReference::regular(TableSourceId(0), "Value")));

        let plan = PlanBuilder::new().table_function("range", vec![lit(1), lit(2), lit(3)], None);
        assert_eq!(bind(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::FunctionArity));
    }

    #[test]
    fn function_calls_get_descriptors() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableB", Some("b")).project(vec![call("abs", vec![name("b.col1")]).into()]);
        let plan = builder.table("tableA", Some("a"))
            .project(vec![call("upper", vec![name("a.col2")]).into(), ProjectionItem::aliased(sub_query(inner), "s")]);
        let plan = bind(&ctx, plan).unwrap();
        assert!(first_function(&plan).descriptor.is_some());

        let LogicalPlan::Projection { items, .. } = &plan else { unreachable!() };
        let Expression::SubQuery(sub_query) = &items[1].expression else { panic!("expected a sub-query") };
        assert!(first_function(&sub_query.plan).descriptor.is_some());
    }

    #[test]
    fn unknown_function_and_wrong_arity_fail() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table("tableA", Some("a")).project(vec![call("nope", vec![name("a.col1")]).into()]);
        let error = bind(&ctx, plan).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::UnknownFunction));
        assert_eq!(error.message(), "No function found named: nope in catalog: db");

        let plan = PlanBuilder::new().table("tableA", Some("a")).project(vec![call("upper", vec![]).into()]);
        assert_eq!(bind(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::FunctionArity));
    }

    #[test]
    fn aggregate_inside_aggregate_is_rejected() {
        let ctx = create_context();
        let nested = call("max", vec![call("min", vec![name("col1")])]);
        let plan = PlanBuilder::new().table("tableB", None).aggregate(vec![], vec![nested.into()]);
        assert_eq!(bind(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::NestedAggregate));

        let plan = PlanBuilder::new().table("tableB", None)
            .aggregate(vec![], vec![call("max", vec![call("abs", vec![name("col1")])]).into()]);
        assert!(bind(&ctx, plan).is_ok());
    }
}
