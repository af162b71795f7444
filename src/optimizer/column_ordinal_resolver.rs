use tracing::trace;

use crate::{
    expr::{ColumnAccess, ColumnExpression, Expression},
    optimizer::{ExecutionContext, LogicalPlanOptimizer, PlanError},
    plan::LogicalPlan,
    schema::{ColumnLocation, Schema},
};

pub struct ColumnOrdinalResolverContext<'a> {
    pub ctx: &'a ExecutionContext,
}

/// Last pass: every column expression learns where its value sits in the
/// tuple it is evaluated against.
///
/// Expressions of a node read its input tuple; a join condition reads the
/// left tuple followed by the right one. Outer references read a correlation
/// tuple (the left side of an apply join or the input of the node owning a
/// sub-query expression); their access records how many correlation tuples
/// out it is, counting from the nearest.
pub struct ColumnOrdinalResolver;

impl LogicalPlanOptimizer for ColumnOrdinalResolver {
    type Context<'a> = ColumnOrdinalResolverContext<'a>;

    fn name(&self) -> &'static str {
        "ColumnOrdinalResolver"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        ColumnOrdinalResolverContext { ctx }
    }

    fn optimize(&self, _context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::resolve_plan(plan, &[])
    }
}

impl ColumnOrdinalResolver {
    /// `frames` are the correlation tuples visible to `plan`, outermost first.
    pub fn resolve_plan(plan: LogicalPlan, frames: &[Schema]) -> Result<LogicalPlan, PlanError> {
        let plan = match plan {
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => {
                let left = Self::resolve_plan(*left, frames)?;
                let right = if join_type.is_apply() {
                    Self::resolve_plan(*right, &Self::push_frame(frames, left.schema()))?
                } else {
                    Self::resolve_plan(*right, frames)?
                };
                LogicalPlan::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type,
                    condition,
                    populate,
                    outer_references,
                }
            }
            other => other.map_children(|child| Self::resolve_plan(child, frames))?,
        };

        let tuple = match &plan {
            LogicalPlan::Join { left, right, .. } => left.schema().concat(&right.schema()),
            other => other.input().map(LogicalPlan::schema).unwrap_or_default(),
        };
        let label = plan.label();
        plan.map_expressions(|expression| Self::resolve_expression(expression, &tuple, frames, &label))
    }

    fn push_frame(frames: &[Schema], schema: Schema) -> Vec<Schema> {
        let mut frames = frames.to_vec();
        frames.push(schema);
        frames
    }

    fn resolve_expression(expression: Expression, tuple: &Schema, frames: &[Schema], label: &str) -> Result<Expression, PlanError> {
        expression.transform_up(&mut |node| -> Result<Expression, PlanError> {
            match node {
                Expression::Column(column) => Ok(Expression::Column(Self::resolve_column(column, tuple, frames, label)?)),
                Expression::SubQuery(mut sub_query) => {
                    let frames = Self::push_frame(frames, tuple.clone());
                    sub_query.plan = Box::new(Self::resolve_plan(*sub_query.plan, &frames)?);
                    Ok(Expression::SubQuery(sub_query))
                }
                other => Ok(other),
            }
        })
    }

    fn resolve_column(mut column: ColumnExpression, tuple: &Schema, frames: &[Schema], label: &str) -> Result<ColumnExpression, PlanError> {
        let key = column.key();
        let found = if column.outer_reference {
            frames.iter()
                .rev()
                .enumerate()
                .find_map(|(depth, frame)| frame.locate(&key).map(|location| (Some(depth), location)))
        } else {
            tuple.locate(&key).map(|location| (None, location))
        };
        let Some((frame, location)) = found else {
            return Err(PlanError::internal(format!("column {} is not produced for {}", column, label)));
        };
        column.access = match location {
            ColumnLocation::Direct(ordinal) => ColumnAccess::Ordinal { frame, tuple_ordinal: None, ordinal },
            ColumnLocation::Nested { tuple, ordinal } => ColumnAccess::Ordinal { frame, tuple_ordinal: Some(tuple), ordinal },
            ColumnLocation::Dynamic { tuple } => ColumnAccess::Named { frame, tuple_ordinal: tuple },
        };
        trace!(column = %column, "resolved column ordinal");
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        expr::{and, eq, gt, lit, name, sub_query},
        optimizer::{
            fixtures::{create_context, optimize, resolve},
            run_pass,
        },
        plan::{JoinType, PlanBuilder, ProjectionItem},
        schema::{ColumnReference, ResolvedType, TableSourceId},
    };

    use super::*;

    fn resolve_ordinals(ctx: &ExecutionContext, plan: LogicalPlan) -> LogicalPlan {
        let plan = resolve(ctx, plan).unwrap();
        run_pass(&ColumnOrdinalResolver, ctx, plan).unwrap()
    }

    fn expressions_of(plan: &LogicalPlan) -> Vec<String> {
        plan.expressions().into_iter().map(ToString::to_string).collect()
    }

    /// Every column of `plan`, including those of sub-query plans.
    fn all_columns(plan: &LogicalPlan) -> Vec<ColumnExpression> {
        let mut columns = Vec::new();
        plan.visit(&mut |node| {
            for expression in node.expressions() {
                columns.extend(expression.columns().into_iter().cloned());
                expression.visit(&mut |inner| {
                    if let Expression::SubQuery(sub_query) = inner {
                        columns.extend(all_columns(&sub_query.plan));
                    }
                });
            }
        });
        columns
    }

    fn join_plan(builder: &mut PlanBuilder) -> LogicalPlan {
        builder.table("tableA", Some("a"))
            .join(builder.table("tableB", Some("b")), JoinType::Inner, Some(eq(name("a.col3"), name("b.col3"))))
            .project(vec![name("a.col1").into(), name("b.col2").into()])
    }

    #[test]
    fn join_condition_reads_left_then_right() {
        let ctx = create_context();
        let plan = resolve_ordinals(&ctx, join_plan(&mut PlanBuilder::new()));
        assert_eq!(expressions_of(&plan), vec!["#0.col1@0", "#1.col2@4"]);
        assert_eq!(expressions_of(plan.input().unwrap()), vec!["#0.col3@2 = #1.col3@5"]);
    }

    #[test]
    fn ordinals_follow_narrowed_scans() {
        let ctx = create_context();
        let plan = optimize(&ctx, join_plan(&mut PlanBuilder::new())).unwrap();
        assert_eq!(expressions_of(&plan), vec!["#0.col1@0", "#1.col2@2"]);
        assert_eq!(expressions_of(plan.input().unwrap()), vec!["#0.col3@1 = #1.col3@3"]);
    }

    #[test]
    fn populated_columns_address_the_nested_tuple() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let plan = builder.table("tableA", Some("a"))
            .populate_join(builder.table("tableB", Some("b")), JoinType::Left, Some(eq(name("a.col1"), name("b.col1"))), "bs")
            .filter(gt(name("b.col2"), lit(1)))
            .project(vec![name("a.col1").into()]);
        let plan = resolve_ordinals(&ctx, plan);
        assert_eq!(expressions_of(plan.input().unwrap()), vec!["#1.col2@3.1 > 1"]);
    }

    #[test]
    fn schema_less_columns_are_named() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table("events", Some("e")).project(vec![name("e.name").into()]);
        let plan = resolve_ordinals(&ctx, plan);
        assert_eq!(expressions_of(&plan), vec!["#0.name@0.?"]);
    }

    #[test]
    fn every_column_is_addressed_after_optimization() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableB", Some("b"))
            .filter(eq(name("b.col2"), name("a.col2")))
            .project(vec![name("b.col1").into()]);
        let plan = builder.table("tableA", Some("a"))
            .filter(gt(name("a.col3"), lit(0)))
            .project(vec![name("a.col1").into(), ProjectionItem::aliased(sub_query(inner), "s")]);
        let plan = optimize(&ctx, plan).unwrap();

        let columns = all_columns(&plan);
        assert!(!columns.is_empty());
        assert!(columns.iter().all(|column| column.access != ColumnAccess::Unresolved));
        let outer: Vec<String> = columns.iter().filter(|column| column.outer_reference).map(ToString::to_string).collect();
        assert_eq!(outer, vec!["#1.col2 (outer)@1^0"]);
    }

    #[test]
    fn outer_references_name_their_correlation_tuple() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let innermost = builder.table("tableC", Some("c"))
            .filter(and(eq(name("c.col1"), name("a.col1")), eq(name("c.col2"), name("b.col2"))))
            .project(vec![name("c.col2").into()]);
        let middle = builder.table("tableB", Some("b")).project(vec![ProjectionItem::aliased(sub_query(innermost), "m")]);
        let plan = builder.table("tableA", Some("a")).project(vec![ProjectionItem::aliased(sub_query(middle), "v")]);
        let plan = optimize(&ctx, plan).unwrap();

        let outer: Vec<(String, ColumnAccess)> = all_columns(&plan).into_iter()
            .filter(|column| column.outer_reference)
            .map(|column| (column.name.clone(), column.access))
            .collect();
        assert_eq!(outer, vec![
            ("col1".to_string(), ColumnAccess::Ordinal { frame: Some(1), tuple_ordinal: None, ordinal: 0 }),
            ("col2".to_string(), ColumnAccess::Ordinal { frame: Some(0), tuple_ordinal: None, ordinal: 0 }),
        ]);
    }

    #[test]
    fn missing_column_is_an_internal_error() {
        let ctx = create_context();
        let stray = ColumnExpression::new("col1", Some(ColumnReference::regular(TableSourceId(9), "col1")), ResolvedType::int());
        let plan = PlanBuilder::no_table().project(vec![Expression::Column(stray).into()]);
        let error = run_pass(&ColumnOrdinalResolver, &ctx, plan).unwrap_err();
        assert!(error.is_internal());
    }
}
