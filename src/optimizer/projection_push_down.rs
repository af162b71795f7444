use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::{
    expr::Expression,
    optimizer::{ExecutionContext, LogicalPlanOptimizer, PlanError},
    plan::{items_schema, LogicalPlan, ProjectionItem},
    schema::{ColumnKey, ColumnReference, CoreColumn, ResolvedType, Schema, TableSourceId, TableSourceReference},
};

pub struct ProjectionPushDownContext<'a> {
    pub ctx: &'a ExecutionContext,
}

/// Narrows every scan and inner projection to the columns read above it and
/// splices out derived tables that only forward their input.
pub struct ProjectionPushDown;

impl LogicalPlanOptimizer for ProjectionPushDown {
    type Context<'a> = ProjectionPushDownContext<'a>;

    fn name(&self) -> &'static str {
        "ProjectionPushDown"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        ProjectionPushDownContext { ctx }
    }

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::push_down(context.ctx, plan)
    }
}

/// Keys a node must produce for its consumers.
type Required = IndexSet<ColumnKey>;

/// A spliced out derived table: its source and the schema it forwarded.
struct Eliminated {
    source: TableSourceId,
    forwarded: Schema,
}

impl ProjectionPushDown {
    pub fn push_down(ctx: &ExecutionContext, mut plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        for round in 0..ctx.config.max_projection_push_down_iterations.max(1) {
            plan = Self::prune_root(plan)?;
            let mut eliminated = Vec::new();
            plan = Self::eliminate_sub_queries(plan, &mut eliminated)?;
            if eliminated.is_empty() {
                return Ok(plan);
            }
            debug!(round, count = eliminated.len(), "eliminated forwarding sub-queries");
            plan = Self::rebase(plan, &eliminated)?;
        }
        Ok(plan)
    }

    /// Prune a plan whose whole output is consumed.
    fn prune_root(plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        let required = plan.schema().keys().into_iter().collect();
        Self::prune(plan, &required)
    }

    fn keys_of<'a>(expressions: impl IntoIterator<Item = &'a Expression>) -> Required {
        expressions.into_iter().flat_map(Expression::column_keys).collect()
    }

    fn prune(plan: LogicalPlan, required: &Required) -> Result<LogicalPlan, PlanError> {
        let plan = plan.map_sub_queries(&mut Self::prune_root)?;
        match plan {
            LogicalPlan::TableScan { source, schema: Some(schema), columns } => Ok(Self::narrow_scan(source, schema, columns, required)),
            LogicalPlan::SubQuery { input, source } => {
                let input_schema = input.schema();
                let owned = input_schema.with_source(source.id);
                let reads_dynamic = required.iter().any(|key| key.source() == Some(source.id));
                let needed = input_schema.iter()
                    .zip(owned.iter())
                    .filter(|(_, column)| required.contains(&column.key()) || (column.is_asterisk() && reads_dynamic))
                    .map(|(inner, _)| inner.key())
                    .collect();
                let input = Self::prune(*input, &needed)?;
                Ok(LogicalPlan::SubQuery { input: Box::new(input), source })
            }
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => {
                let mut needed = required.clone();
                needed.extend(Self::keys_of(condition.iter()));
                needed.extend(outer_references.iter().map(CoreColumn::key));
                if let Some(alias) = &populate
                    && required.contains(&ColumnKey::Name(alias.clone()))
                {
                    needed.extend(right.schema().keys());
                }
                let (left_schema, right_schema) = (left.schema(), right.schema());
                let left_needed = needed.iter().filter(|key| left_schema.provides(key)).cloned().collect();
                let right_needed = needed.iter().filter(|key| right_schema.provides(key)).cloned().collect();
                Ok(LogicalPlan::Join {
                    left: Box::new(Self::prune(*left, &left_needed)?),
                    right: Box::new(Self::prune(*right, &right_needed)?),
                    join_type,
                    condition,
                    populate,
                    outer_references,
                })
            }
            LogicalPlan::Projection { input, items } => {
                let items = Self::narrow_items(items, required);
                let needed = Self::keys_of(items.iter().map(|item| &item.expression));
                Ok(LogicalPlan::Projection { input: Box::new(Self::prune(*input, &needed)?), items })
            }
            LogicalPlan::Concatenation { inputs } => Ok(LogicalPlan::Concatenation {
                inputs: inputs.into_iter().map(Self::prune_root).collect::<Result<_, _>>()?,
            }),
            LogicalPlan::OperatorFunctionScan { input, for_clause, column } => Ok(LogicalPlan::OperatorFunctionScan {
                input: Box::new(Self::prune_root(*input)?),
                for_clause,
                column,
            }),
            other => {
                let mut needed = required.clone();
                needed.extend(Self::keys_of(other.expressions()));
                other.map_children(|child| Self::prune(child, &needed))
            }
        }
    }

    /// Request only the required columns from the source. Catalog order is
    /// kept for static schemas; a schema-less source gets the names read
    /// above it unless its asterisk slot is consumed as a whole.
    fn narrow_scan(source: TableSourceReference, schema: Schema, columns: Option<Vec<String>>, required: &Required) -> LogicalPlan {
        let asterisk = ColumnKey::Reference(ColumnReference::asterisk(source.id));
        let schema = if !schema.has_asterisk() {
            Schema::new(schema.columns.into_iter().filter(|column| required.contains(&column.key())).collect())
        } else if !required.contains(&asterisk) {
            let names: IndexSet<&str> = required.iter()
                .filter_map(ColumnKey::reference)
                .filter(|reference| reference.source == source.id && !reference.is_asterisk())
                .map(|reference| reference.name.as_str())
                .collect();
            Schema::new(names.into_iter()
                .map(|name| CoreColumn::new(name, ResolvedType::any(), ColumnReference::regular(source.id, name)))
                .collect())
        } else {
            return LogicalPlan::TableScan { source, schema: Some(schema), columns };
        };
        let columns: Vec<String> = schema.iter().map(|column| column.name.clone()).collect();
        trace!(source = %source, columns = ?columns, "narrowed scan");
        LogicalPlan::TableScan { source, schema: Some(schema), columns: Some(columns) }
    }

    /// Drop the items nobody reads. A plain column owns its reference only on
    /// its first occurrence, so that occurrence stays while a later duplicate does.
    fn narrow_items(items: Vec<ProjectionItem>, required: &Required) -> Vec<ProjectionItem> {
        let schema = items_schema(&items);
        let mut keep: Vec<bool> = schema.iter().map(|column| required.contains(&column.key())).collect();
        for index in (0..items.len()).rev() {
            if keep[index] {
                continue;
            }
            let Some(reference) = Self::plain_reference(&items[index]) else { continue };
            let duplicated = items.iter()
                .zip(&keep)
                .skip(index + 1)
                .any(|(other, kept)| *kept && Self::plain_reference(other) == Some(reference));
            keep[index] = duplicated;
        }
        items.into_iter().zip(keep).filter_map(|(item, kept)| kept.then_some(item)).collect()
    }

    fn plain_reference(item: &ProjectionItem) -> Option<&ColumnReference> {
        match &item.expression {
            Expression::Column(column) if !column.outer_reference => column.column_reference.as_ref(),
            _ => None,
        }
    }

    /// Projection that re-emits exactly the referenced columns of its input.
    fn forwards_input(items: &[ProjectionItem], input: &LogicalPlan) -> bool {
        let input_schema = input.schema();
        items.len() == input_schema.len()
            && items.iter().zip(input_schema.iter()).all(|(item, column)| {
                column.column_reference.is_some()
                    && Self::plain_reference(item) == column.column_reference.as_ref()
                    && item.name() == column.name
                    && item.internal == column.internal
            })
    }

    fn eliminate_sub_queries(plan: LogicalPlan, eliminated: &mut Vec<Eliminated>) -> Result<LogicalPlan, PlanError> {
        plan.transform_up(&mut |node| -> Result<LogicalPlan, PlanError> {
            let node = node.map_sub_queries(&mut |plan| Self::eliminate_sub_queries(plan, eliminated))?;
            match node {
                LogicalPlan::SubQuery { input, source } => match *input {
                    LogicalPlan::Projection { input: inner, items } if Self::forwards_input(&items, &inner) => {
                        debug!(source = %source, "spliced out derived table");
                        eliminated.push(Eliminated { source: source.id, forwarded: inner.schema() });
                        Ok(*inner)
                    }
                    input => Ok(LogicalPlan::SubQuery { input: Box::new(input), source }),
                },
                other => Ok(other),
            }
        })
    }

    /// Follow `reference` through the spliced out sources down to the column
    /// that now produces it.
    fn rebase_reference(reference: &ColumnReference, eliminated: &[Eliminated]) -> ColumnReference {
        let mut current = reference.clone();
        while let Some(entry) = eliminated.iter().find(|entry| entry.source == current.source) {
            let asterisk = entry.forwarded.iter().find(|column| column.is_asterisk());
            let target = if current.is_asterisk() {
                asterisk.and_then(|column| column.column_reference.clone())
            } else {
                match entry.forwarded.iter().find(|column| !column.is_asterisk() && column.name == current.name) {
                    Some(column) => column.column_reference.clone(),
                    None => asterisk
                        .and_then(|column| column.source())
                        .map(|source| ColumnReference::regular(source, current.name.clone())),
                }
            };
            match target {
                Some(target) => current = target,
                None => break,
            }
        }
        current
    }

    fn rebase_column(mut column: CoreColumn, eliminated: &[Eliminated]) -> CoreColumn {
        if let Some(reference) = &column.column_reference {
            column.column_reference = Some(Self::rebase_reference(reference, eliminated));
        }
        column
    }

    fn rebase(plan: LogicalPlan, eliminated: &[Eliminated]) -> Result<LogicalPlan, PlanError> {
        plan.transform_up(&mut |node| {
            let node = match node {
                LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => LogicalPlan::Join {
                    left,
                    right,
                    join_type,
                    condition,
                    populate,
                    outer_references: outer_references.into_iter().map(|column| Self::rebase_column(column, eliminated)).collect(),
                },
                other => other,
            };
            node.map_expressions(|expression| Self::rebase_expression(expression, eliminated))
        })
    }

    fn rebase_expression(expression: Expression, eliminated: &[Eliminated]) -> Result<Expression, PlanError> {
        expression.transform_up(&mut |node| -> Result<Expression, PlanError> {
            match node {
                Expression::Column(mut column) => {
                    if let Some(reference) = &column.column_reference {
                        column.column_reference = Some(Self::rebase_reference(reference, eliminated));
                    }
                    Ok(Expression::Column(column))
                }
                Expression::SubQuery(mut sub_query) => {
                    sub_query.plan = Box::new(Self::rebase(*sub_query.plan, eliminated)?);
                    sub_query.outer_references = sub_query.outer_references
                        .into_iter()
                        .map(|column| Self::rebase_column(column, eliminated))
                        .collect();
                    Ok(Expression::SubQuery(sub_query))
                }
                other => Ok(other),
            }
        })
    }
}
