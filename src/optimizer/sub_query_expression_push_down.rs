use tracing::debug;

use crate::{
    expr::{ColumnExpression, Expression, SubQueryExpression},
    optimizer::{BindingErrorKind, ExecutionContext, LogicalPlanOptimizer, PlanError},
    plan::{JoinType, LogicalPlan, PlanBuilder, ProjectionItem},
    schema::CoreColumn,
};

pub struct SubQueryExpressionPushDownContext<'a> {
    pub ctx: &'a ExecutionContext,
}

/// Turns sub-queries used as select items into joins.
///
/// - non-correlated scalar: `input INNER JOIN (one row LEFT JOIN assert(plan, 1))`
/// - correlated scalar: `input OUTER APPLY assert(plan, 1)`
/// - FOR clause: the plan folded by an operator function scan, joined with
///   LEFT JOIN, or OUTER APPLY when correlated
///
/// Sub-queries are joined in select list order, each one to the result of
/// the previous join.
pub struct SubQueryExpressionPushDown;

impl LogicalPlanOptimizer for SubQueryExpressionPushDown {
    type Context<'a> = SubQueryExpressionPushDownContext<'a>;

    fn name(&self) -> &'static str {
        "SubQueryExpressionPushDown"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        SubQueryExpressionPushDownContext { ctx }
    }

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::push_down(context.ctx, plan)
    }
}

impl SubQueryExpressionPushDown {
    pub fn push_down(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        plan.transform_up(&mut |node| match node {
            LogicalPlan::Projection { input, items } => Self::push_down_items(ctx, *input, items),
            other => other.map_sub_queries(&mut |plan| Self::push_down(ctx, plan)),
        })
    }

    fn push_down_items(ctx: &ExecutionContext, input: LogicalPlan, items: Vec<ProjectionItem>) -> Result<LogicalPlan, PlanError> {
        let mut input = input;
        let mut rewritten = Vec::with_capacity(items.len());
        for item in items {
            if !item.expression.contains_sub_query() {
                rewritten.push(item);
                continue;
            }
            let name = item.name();
            let expression = item.expression.transform_up(&mut |node| -> Result<Expression, PlanError> {
                let Expression::SubQuery(sub_query) = node else {
                    return Ok(node);
                };
                let (joined, value) = Self::join_sub_query(ctx, Self::take(&mut input), Self::flatten(sub_query))?;
                input = joined;
                Ok(value)
            })?;
            rewritten.push(ProjectionItem { expression, alias: item.alias.or(Some(name)), internal: item.internal });
        }
        Ok(input.project(rewritten))
    }

    fn take(plan: &mut LogicalPlan) -> LogicalPlan {
        std::mem::replace(plan, PlanBuilder::no_table())
    }

    /// `(select (select ...))`: the outer sub-query only re-exposes the
    /// inner one, which takes its place.
    fn flatten(sub_query: SubQueryExpression) -> SubQueryExpression {
        if sub_query.for_clause.is_some() {
            return sub_query;
        }
        let inner = match sub_query.plan.as_ref() {
            LogicalPlan::Projection { input, items }
                if input.is_single_empty_row() && items.len() == 1 && !items[0].internal =>
            {
                match &items[0].expression {
                    Expression::SubQuery(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
            _ => None,
        };
        match inner {
            Some(inner) => {
                debug!("flattened nested sub-query expression");
                Self::flatten(inner)
            }
            None => sub_query,
        }
    }

    /// Join `sub_query` to `input`; returns the join and the expression that
    /// reads the sub-query value from it.
    fn join_sub_query(ctx: &ExecutionContext, input: LogicalPlan, sub_query: SubQueryExpression) -> Result<(LogicalPlan, Expression), PlanError> {
        let plan = Self::push_down(ctx, *sub_query.plan)?;
        let correlated = !sub_query.outer_references.is_empty();

        if let Some(for_clause) = sub_query.for_clause {
            let name = ctx.next_internal_name();
            let ty = for_clause.result_type(&plan.schema());
            let scan = plan.for_clause(for_clause, name.clone());
            let join_type = if correlated { JoinType::OuterApply } else { JoinType::Left };
            debug!(column = %name, %join_type, "pushed down sub-query with output clause");
            let joined = Self::join(input, scan, join_type, sub_query.outer_references);
            return Ok((joined, Expression::Column(ColumnExpression::new(name, None, ty))));
        }

        let schema = plan.schema();
        let values: Vec<_> = schema.visible().filter(|column| !column.is_asterisk()).collect();
        let [value] = values.as_slice() else {
            return Err(PlanError::binding(
                BindingErrorKind::SubQueryColumnCount,
                format!("Sub-query used as a value must return exactly one column, got {}", values.len()),
            ).at(sub_query.location));
        };

        // computed values get a name nothing else in the outer plan can carry
        let (plan, value) = if value.column_reference.is_some() {
            (plan, ColumnExpression::of(value))
        } else {
            let name = ctx.next_internal_name();
            let ty = value.ty.clone();
            let item = ProjectionItem::internal(Expression::Column(ColumnExpression::of(value)), name.clone());
            (plan.project(vec![item]), ColumnExpression::new(name, None, ty))
        };

        let asserted = plan.assert_max_rows(1);
        let joined = if correlated {
            debug!(value = %value, "decorrelated sub-query into outer apply");
            Self::join(input, asserted, JoinType::OuterApply, sub_query.outer_references)
        } else {
            debug!(value = %value, "joined non-correlated sub-query");
            let single_row = PlanBuilder::no_table().join(asserted, JoinType::Left, None);
            input.join(single_row, JoinType::Inner, None)
        };
        Ok((joined, Expression::Column(value)))
    }

    fn join(left: LogicalPlan, right: LogicalPlan, join_type: JoinType, outer_references: Vec<CoreColumn>) -> LogicalPlan {
        LogicalPlan::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            condition: None,
            populate: None,
            outer_references,
        }
    }
}
