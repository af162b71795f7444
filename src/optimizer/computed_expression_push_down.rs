use tracing::debug;

use crate::{
    expr::{ColumnExpression, Expression, Literal},
    optimizer::{BindingErrorKind, ExecutionContext, LogicalPlanOptimizer, PlanError},
    plan::{items_schema, LogicalPlan, ProjectionItem, SortItem},
    schema::CoreColumn,
};

pub struct ComputedExpressionPushDownContext<'a> {
    pub ctx: &'a ExecutionContext,
}

/// Moves computed ORDER BY and HAVING expressions into the projection or
/// aggregate below them as internal columns, and computed aggregate inputs
/// into a projection below the aggregate.
///
/// Afterwards sorts and HAVING filters only read output columns, and
/// aggregate calls and group keys only read input columns.
pub struct ComputedExpressionPushDown;

impl LogicalPlanOptimizer for ComputedExpressionPushDown {
    type Context<'a> = ComputedExpressionPushDownContext<'a>;

    fn name(&self) -> &'static str {
        "ComputedExpressionPushDown"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        ComputedExpressionPushDownContext { ctx }
    }

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::push_down(context.ctx, plan)
    }
}

/// The projection or aggregate a sort or HAVING filter reads from.
struct OutputNode {
    input: Box<LogicalPlan>,
    /// `Some` for aggregates
    group_by: Option<Vec<Expression>>,
    items: Vec<ProjectionItem>,
}

impl OutputNode {
    fn take(plan: LogicalPlan) -> Result<Self, LogicalPlan> {
        match plan {
            LogicalPlan::Projection { input, items } => Ok(Self { input, group_by: None, items }),
            LogicalPlan::Aggregate { input, group_by, items } => Ok(Self { input, group_by: Some(group_by), items }),
            other => Err(other),
        }
    }

    fn into_plan(self) -> LogicalPlan {
        match self.group_by {
            Some(group_by) => LogicalPlan::Aggregate { input: self.input, group_by, items: self.items },
            None => LogicalPlan::Projection { input: self.input, items: self.items },
        }
    }
}

impl ComputedExpressionPushDown {
    pub fn push_down(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        plan.transform_up(&mut |node| {
            let node = node.map_sub_queries(&mut |plan| Self::push_down(ctx, plan))?;
            match node {
                LogicalPlan::Aggregate { .. } => Self::hoist_aggregate_inputs(ctx, node),
                LogicalPlan::Filter { input, predicate } if matches!(input.as_ref(), LogicalPlan::Aggregate { .. }) => {
                    Self::rewrite_having(ctx, *input, predicate)
                }
                LogicalPlan::Sort { input, items } => Self::rewrite_sort(ctx, *input, items),
                other => Ok(other),
            }
        })
    }

    fn rewrite_having(ctx: &ExecutionContext, aggregate: LogicalPlan, predicate: Expression) -> Result<LogicalPlan, PlanError> {
        let mut node = match OutputNode::take(aggregate) {
            Ok(node) => node,
            Err(plan) => return Ok(plan.filter(predicate)),
        };
        let predicate = Self::rewrite_output_expression(ctx, &mut node, predicate)?;
        let aggregate = Self::hoist_aggregate_inputs(ctx, node.into_plan())?;
        Ok(aggregate.filter(predicate))
    }

    fn rewrite_sort(ctx: &ExecutionContext, input: LogicalPlan, items: Vec<SortItem>) -> Result<LogicalPlan, PlanError> {
        // HAVING filters sit between the sort and its aggregate
        let mut filters = Vec::new();
        let mut current = input;
        let output = loop {
            match current {
                LogicalPlan::Filter { input, predicate } => {
                    filters.push(predicate);
                    current = *input;
                }
                other => break other,
            }
        };

        let (output, items) = match OutputNode::take(output) {
            Ok(mut node) => {
                let items = items.into_iter()
                    .map(|item| Ok(SortItem {
                        expression: Self::rewrite_sort_key(ctx, &mut node, item.expression)?,
                        order: item.order,
                    }))
                    .collect::<Result<Vec<_>, PlanError>>()?;
                (Self::hoist_aggregate_inputs(ctx, node.into_plan())?, items)
            }
            Err(plan) => (plan, items),
        };
        let input = filters.into_iter().rev().fold(output, LogicalPlan::filter);
        Ok(input.sort(items))
    }

    fn rewrite_sort_key(ctx: &ExecutionContext, node: &mut OutputNode, expression: Expression) -> Result<Expression, PlanError> {
        if let Expression::Literal(Literal::Int(position)) = expression {
            return Self::order_by_position(ctx, node, position);
        }
        if expression.is_constant() {
            return Err(PlanError::binding(
                BindingErrorKind::OrderByConstant,
                format!("Cannot order by constant expression {}, only by select list positions", expression),
            ));
        }
        Self::rewrite_output_expression(ctx, node, expression)
    }

    fn order_by_position(ctx: &ExecutionContext, node: &mut OutputNode, position: i64) -> Result<Expression, PlanError> {
        let index = match usize::try_from(position) {
            Ok(position) if (1..=node.items.len()).contains(&position) => position - 1,
            _ => {
                return Err(PlanError::binding(
                    BindingErrorKind::OrderByPositionOutOfRange,
                    format!("ORDER BY position {} is not in the select list", position),
                ));
            }
        };
        if node.items[..=index].iter().any(ProjectionItem::is_asterisk) {
            return Err(PlanError::binding(
                BindingErrorKind::OrderByPositionAsterisk,
                format!("ORDER BY position {} cannot be resolved, it is at or after an asterisk", position),
            ));
        }
        Ok(Self::reference_item(ctx, &mut node.items, index))
    }

    /// Rewrite `expression` so it only reads columns of `node`'s output,
    /// adding internal items when needed.
    fn rewrite_output_expression(ctx: &ExecutionContext, node: &mut OutputNode, expression: Expression) -> Result<Expression, PlanError> {
        if let Some(index) = node.items.iter().position(|item| item.expression == expression) {
            return Ok(Self::reference_item(ctx, &mut node.items, index));
        }
        let schema = items_schema(&node.items);
        if let Expression::Column(column) = &expression
            && schema.provides(&column.key())
        {
            return Ok(expression);
        }

        match &node.group_by {
            Some(group_by) => {
                let hoist = expression.as_column().is_some()
                    || group_by.contains(&expression)
                    || matches!(&expression, Expression::Function(function) if function.is_aggregate());
                if hoist {
                    Ok(Self::add_internal(ctx, &mut node.items, expression))
                } else if expression.is_constant() {
                    Ok(expression)
                } else {
                    expression.map_children(|child| Self::rewrite_output_expression(ctx, node, child))
                }
            }
            None => {
                // aliases of this projection are not visible to its own items
                let inlined = expression.transform_up(&mut |child| Ok::<_, PlanError>(match child {
                    Expression::Column(column) if column.column_reference.is_none() => {
                        match schema.position_of(&column.key()) {
                            Some(index) => node.items[index].expression.clone(),
                            None => Expression::Column(column),
                        }
                    }
                    other => other,
                }))?;
                Ok(Self::add_internal(ctx, &mut node.items, inlined))
            }
        }
    }

    fn column_of(column: &CoreColumn) -> Expression {
        Expression::Column(ColumnExpression::of(column))
    }

    /// Reference to the output column of `items[index]`. Items whose column
    /// cannot be addressed uniquely get an internal copy.
    fn reference_item(ctx: &ExecutionContext, items: &mut Vec<ProjectionItem>, index: usize) -> Expression {
        let schema = items_schema(items);
        let column = &schema.columns[index];
        let key = column.key();
        let unique = !column.name.is_empty()
            && schema.iter().enumerate().all(|(other, candidate)| other == index || candidate.key() != key);
        if unique {
            return Self::column_of(column);
        }
        let expression = items[index].expression.clone();
        Self::add_internal(ctx, items, expression)
    }

    fn add_internal(ctx: &ExecutionContext, items: &mut Vec<ProjectionItem>, expression: Expression) -> Expression {
        let name = ctx.next_internal_name();
        debug!(expression = %expression, name = %name, "hoisted computed expression");
        items.push(ProjectionItem::internal(expression, name));
        let schema = items_schema(items);
        match schema.columns.last() {
            Some(column) => Self::column_of(column),
            None => Expression::Literal(Literal::Null),
        }
    }

    /// Move computed group keys and aggregate arguments into a projection
    /// below the aggregate.
    fn hoist_aggregate_inputs(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        let LogicalPlan::Aggregate { input, group_by, items } = plan else {
            return Ok(plan);
        };
        let mut hoisted: Vec<ProjectionItem> = Vec::new();
        let mut group_keys: Vec<(Expression, Expression)> = Vec::new();
        let group_by = group_by.into_iter()
            .map(|expression| {
                let column = Self::hoist_input(ctx, &mut hoisted, expression.clone());
                if column != expression {
                    group_keys.push((expression, column.clone()));
                }
                column
            })
            .collect::<Vec<_>>();
        let items = items.into_iter()
            .map(|item| {
                let name = item.name();
                let expression = Self::hoist_item(ctx, &mut hoisted, &group_keys, item.expression.clone())?;
                if expression == item.expression {
                    return Ok(item);
                }
                Ok(ProjectionItem { expression, alias: item.alias.or(Some(name)), internal: item.internal })
            })
            .collect::<Result<Vec<_>, PlanError>>()?;
        if hoisted.is_empty() {
            return Ok(LogicalPlan::Aggregate { input, group_by, items });
        }

        let input = match *input {
            LogicalPlan::Projection { input, items: mut projected } if Self::is_pass_through(&projected) => {
                projected.extend(hoisted);
                LogicalPlan::Projection { input, items: projected }
            }
            other => {
                let mut projected: Vec<ProjectionItem> = other.schema().iter()
                    .map(|column| ProjectionItem { expression: Self::column_of(column), alias: None, internal: column.internal })
                    .collect();
                projected.extend(hoisted);
                other.project(projected)
            }
        };
        Ok(input.aggregate(group_by, items))
    }

    /// Shape of a projection built by this pass: plain columns and internal items.
    fn is_pass_through(items: &[ProjectionItem]) -> bool {
        items.iter().all(|item| item.internal || (item.alias.is_none() && item.expression.as_column().is_some()))
    }

    fn hoist_input(ctx: &ExecutionContext, hoisted: &mut Vec<ProjectionItem>, expression: Expression) -> Expression {
        let computed = !matches!(expression, Expression::Column(_) | Expression::Asterisk { .. } | Expression::Lambda { .. })
            && !expression.is_constant();
        if !computed {
            return expression;
        }
        let ty = expression.data_type();
        let name = match hoisted.iter().find(|item| item.expression == expression) {
            Some(item) => item.name(),
            None => {
                let name = ctx.next_internal_name();
                debug!(expression = %expression, name = %name, "hoisted aggregate input");
                hoisted.push(ProjectionItem::internal(expression, name.clone()));
                name
            }
        };
        Expression::Column(ColumnExpression::new(name, None, ty))
    }

    fn hoist_item(
        ctx: &ExecutionContext,
        hoisted: &mut Vec<ProjectionItem>,
        group_keys: &[(Expression, Expression)],
        expression: Expression,
    ) -> Result<Expression, PlanError> {
        if let Some((_, column)) = group_keys.iter().find(|(key, _)| *key == expression) {
            return Ok(column.clone());
        }
        match expression {
            Expression::Function(mut function) if function.is_aggregate() => {
                function.args = std::mem::take(&mut function.args)
                    .into_iter()
                    .map(|arg| Self::hoist_input(ctx, hoisted, arg))
                    .collect();
                Ok(Expression::Function(function))
            }
            Expression::SubQuery(_) => Ok(expression),
            other => other.map_children(|child| Self::hoist_item(ctx, hoisted, group_keys, child)),
        }
    }
}
