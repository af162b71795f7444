use tracing::debug;

use crate::{
    expr::{BinaryOp, Expression, ExpressionFolder, Literal},
    optimizer::{ExecutionContext, LogicalPlanOptimizer, PlanError},
    plan::{JoinType, LogicalPlan},
    schema::{CoreColumn, Schema},
};

pub struct PredicatePushDownContext<'a> {
    pub ctx: &'a ExecutionContext,
}

/// Moves filter conjuncts as close to the scans as join semantics allow.
///
/// Through INNER joins (and CROSS APPLY) single-side conjuncts go below their
/// side and equalities across both sides become join conditions. Through
/// LEFT joins (and OUTER APPLY) only conjuncts on the preserved left side go
/// down; anything reading the nullable side must see the joined nulls.
pub struct PredicatePushDown;

impl LogicalPlanOptimizer for PredicatePushDown {
    type Context<'a> = PredicatePushDownContext<'a>;

    fn name(&self) -> &'static str {
        "PredicatePushDown"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        PredicatePushDownContext { ctx }
    }

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::push_down(context.ctx, plan)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Neither,
    Left,
    Right,
    Both,
}

/// A join taken apart while its predicates are redistributed.
struct JoinParts {
    left: LogicalPlan,
    right: LogicalPlan,
    join_type: JoinType,
    condition: Option<Expression>,
    populate: Option<String>,
    outer_references: Vec<CoreColumn>,
}

impl JoinParts {
    fn is_inner(&self) -> bool {
        matches!(self.join_type, JoinType::Inner | JoinType::CrossApply)
    }
}

impl PredicatePushDown {
    pub fn push_down(ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        match plan {
            LogicalPlan::Filter { input, predicate } => {
                let conjuncts = Self::conjuncts(ctx, predicate)?;
                Self::push_conjuncts(ctx, *input, conjuncts)
            }
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => {
                let parts = JoinParts { left: *left, right: *right, join_type, condition, populate, outer_references };
                Self::push_into_join(ctx, parts, Vec::new())
            }
            other => other
                .map_sub_queries(&mut |plan| Self::push_down(ctx, plan))?
                .map_children(|child| Self::push_down(ctx, child)),
        }
    }

    /// Split into AND operands, folding literal sub-expressions; always-true
    /// operands are dropped.
    fn conjuncts(ctx: &ExecutionContext, predicate: Expression) -> Result<Vec<Expression>, PlanError> {
        let predicate = predicate.map_sub_query_plans(&mut |plan| Self::push_down(ctx, plan))?;
        Ok(predicate.split_conjuncts()
            .into_iter()
            .map(|conjunct| if ctx.config.fold_constants { ExpressionFolder::fold(conjunct) } else { conjunct })
            .filter(|conjunct| conjunct.as_literal() != Some(&Literal::Bool(true)))
            .collect())
    }

    /// Place `conjuncts`, which filter the output of `input`, as deep as possible.
    fn push_conjuncts(ctx: &ExecutionContext, input: LogicalPlan, mut conjuncts: Vec<Expression>) -> Result<LogicalPlan, PlanError> {
        match input {
            LogicalPlan::Filter { input, predicate } => {
                conjuncts.extend(Self::conjuncts(ctx, predicate)?);
                Self::push_conjuncts(ctx, *input, conjuncts)
            }
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => {
                let parts = JoinParts { left: *left, right: *right, join_type, condition, populate, outer_references };
                Self::push_into_join(ctx, parts, conjuncts)
            }
            LogicalPlan::Sort { input, items } if !conjuncts.is_empty() => {
                Self::push_conjuncts(ctx, *input, conjuncts)?
                    .sort(items)
                    .map_sub_queries(&mut |plan| Self::push_down(ctx, plan))
            }
            other => {
                let plan = Self::push_down(ctx, other)?;
                Ok(Self::filter(plan, conjuncts))
            }
        }
    }

    fn filter(plan: LogicalPlan, conjuncts: Vec<Expression>) -> LogicalPlan {
        match Expression::conjunction(conjuncts) {
            Some(predicate) => plan.filter(predicate),
            None => plan,
        }
    }

    fn side_of(conjunct: &Expression, left: &Schema, right: &Schema) -> Side {
        let (mut on_left, mut on_right) = (false, false);
        for key in conjunct.column_keys() {
            if left.provides(&key) {
                on_left = true;
            } else if right.provides(&key) {
                on_right = true;
            }
        }
        match (on_left, on_right) {
            (false, false) => Side::Neither,
            (true, false) => Side::Left,
            (false, true) => Side::Right,
            (true, true) => Side::Both,
        }
    }

    fn is_equi_condition(conjunct: &Expression) -> bool {
        matches!(conjunct, Expression::Binary { op: BinaryOp::Equal, .. })
    }

    /// Distribute the join condition and the `above` conjuncts filtering the
    /// join output between the two inputs, the condition and a filter on top.
    fn push_into_join(ctx: &ExecutionContext, parts: JoinParts, above: Vec<Expression>) -> Result<LogicalPlan, PlanError> {
        let left_schema = parts.left.schema();
        let right_schema = parts.right.schema();
        let nested = parts.populate.is_some();
        let inner = parts.is_inner();
        let (mut to_left, mut to_right, mut condition, mut kept) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());

        for conjunct in above {
            if conjunct.contains_sub_query() {
                kept.push(conjunct);
                continue;
            }
            match Self::side_of(&conjunct, &left_schema, &right_schema) {
                Side::Left => to_left.push(conjunct),
                Side::Right if inner && !nested => to_right.push(conjunct),
                Side::Both if inner && !nested && Self::is_equi_condition(&conjunct) => {
                    debug!(predicate = %conjunct, "merged predicate into join condition");
                    condition.push(conjunct);
                }
                _ => kept.push(conjunct),
            }
        }

        let on = match parts.condition {
            Some(condition) => Self::conjuncts(ctx, condition)?,
            None => Vec::new(),
        };
        for conjunct in on {
            if conjunct.contains_sub_query() {
                condition.push(conjunct);
                continue;
            }
            match Self::side_of(&conjunct, &left_schema, &right_schema) {
                Side::Left if inner && !nested => to_left.push(conjunct),
                Side::Right if !nested && (inner || !conjunct.contains_null_test()) => to_right.push(conjunct),
                _ => condition.push(conjunct),
            }
        }

        if !to_left.is_empty() || !to_right.is_empty() {
            debug!(join = %parts.join_type, left = to_left.len(), right = to_right.len(), "pushed predicates below join");
        }
        let left = Self::push_conjuncts(ctx, parts.left, to_left)?;
        let right = Self::push_conjuncts(ctx, parts.right, to_right)?;
        let join = LogicalPlan::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type: parts.join_type,
            condition: Expression::conjunction(condition),
            populate: parts.populate,
            outer_references: parts.outer_references,
        };
        Ok(Self::filter(join, kept))
    }
}
