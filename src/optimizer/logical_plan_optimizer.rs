use tracing::{debug, debug_span, info_span, trace};

use crate::{
    optimizer::{
        ColumnOrdinalResolver, ColumnResolver, ComputedExpressionPushDown, ExecutionContext, PlanError,
        PredicatePushDown, ProjectionPushDown, SchemaResolver, SubQueryExpressionPushDown,
    },
    plan::LogicalPlan,
};

/// One optimizer pass: a pure `(Context, Plan) -> Plan` transformation.
pub trait LogicalPlanOptimizer {
    /// Per invocation state of the pass.
    type Context<'a>;

    fn name(&self) -> &'static str;

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a>;

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError>;
}

/// Run a single pass with a fresh context.
pub fn run_pass<P: LogicalPlanOptimizer>(pass: &P, ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
    let span = debug_span!("pass", name = pass.name());
    let _guard = span.enter();
    let mut context = pass.create_context(ctx);
    let plan = pass.optimize(&mut context, plan)?;
    trace!(plan = %plan.explain(), "pass finished");
    Ok(plan)
}

/// The fixed pass pipeline.
#[derive(Debug, Default)]
pub struct Optimizer {}

impl Optimizer {
    pub fn new() -> Self {
        Optimizer {}
    }

    /// Turn a raw plan into a fully resolved, ordinal addressed plan.
    pub fn optimize(&self, ctx: &ExecutionContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        let span = info_span!("optimize", query_id = %ctx.query_id);
        let _guard = span.enter();

        let plan = run_pass(&SchemaResolver, ctx, plan)?;
        let plan = run_pass(&ColumnResolver, ctx, plan)?;
        let plan = run_pass(&ComputedExpressionPushDown, ctx, plan)?;
        let plan = run_pass(&SubQueryExpressionPushDown, ctx, plan)?;
        let plan = if ctx.config.predicate_push_down {
            run_pass(&PredicatePushDown, ctx, plan)?
        } else {
            debug!("predicate push down disabled");
            plan
        };
        let plan = if ctx.config.projection_push_down {
            run_pass(&ProjectionPushDown, ctx, plan)?
        } else {
            debug!("projection push down disabled");
            plan
        };
        run_pass(&ColumnOrdinalResolver, ctx, plan)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        expr::{add, and, asterisk, call, eq, gt, lit, name, sub_query, Expression},
        optimizer::{
            fixtures::{create_context, find_nodes, optimize, resolve, visible_columns},
            OptimizerConfig,
        },
        plan::{JoinType, PlanBuilder, SortItem},
    };

    use super::*;

    fn join_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        builder.table("tableA", Some("a"))
            .join(builder.table("tableB", Some("b")), JoinType::Inner, Some(eq(name("a.col3"), name("b.col3"))))
            .filter(and(and(gt(name("a.col1"), name("b.col1")), eq(name("a.col2"), lit("test"))), gt(name("b.col2"), lit(100))))
            .project(vec![asterisk().into()])
    }

    fn aggregate_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        builder.table("tableB", None)
            .aggregate(
                vec![name("col1"), name("col3")],
                vec![name("col1").into(), call("max", vec![name("col2")]).into()],
            )
            .sort(vec![SortItem::asc(call("min", vec![add(name("col1"), name("col2"))]))])
    }

    fn correlated_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        let inner = builder.table("tableB", Some("b"))
            .filter(eq(name("b.col2"), name("a.col2")))
            .project(vec![name("b.col1").into()]);
        builder.table("tableA", Some("a")).project(vec![sub_query(inner).into()])
    }

    fn derived_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        let inner = builder.table("tableB", Some("b")).project(vec![asterisk().into()]);
        builder.sub_query(inner, "x").project(vec![asterisk().into()])
    }

    fn schema_less_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        builder.table("events", Some("e"))
            .filter(gt(name("e.ts"), lit(1)))
            .project(vec![name("e.name").into()])
    }

    fn apply_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        let items = builder.expression_scan(name("o.items"), "i");
        builder.table("orders", Some("o"))
            .join(items, JoinType::CrossApply, None)
            .filter(gt(name("i.qty"), lit(1)))
            .project(vec![name("o.id").into(), name("i.sku").into()])
    }

    fn table_function_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        builder.table_function("range", vec![lit(1), lit(5)], Some("r"))
            .filter(gt(name("r.Value"), lit(2)))
            .project(vec![name("Value").into()])
    }

    fn values_scenario(_builder: &mut PlanBuilder) -> LogicalPlan {
        PlanBuilder::values(&["id", "label"], vec![vec![lit(1), lit("x")], vec![lit(2), lit("y")]])
            .project(vec![name("label").into()])
            .limit(Some(lit(1)), Some(lit(1)))
    }

    fn concatenation_scenario(builder: &mut PlanBuilder) -> LogicalPlan {
        let first = builder.table("tableA", Some("a")).project(vec![name("a.col1").into()]);
        let second = builder.table("tableB", Some("b")).project(vec![name("b.col1").into()]);
        LogicalPlan::concatenate(vec![first, second]).project(vec![name("col1").into()])
    }

    fn expressions_of(plan: &LogicalPlan) -> Vec<String> {
        plan.expressions().into_iter().map(ToString::to_string).collect()
    }

    fn predicate(plan: &LogicalPlan) -> String {
        match plan {
            LogicalPlan::Filter { predicate, .. } => predicate.to_string(),
            other => panic!("expected a filter, got {}", other.label()),
        }
    }

    #[test]
    fn join_predicates_land_next_to_their_scans() {
        let ctx = create_context();
        let plan = optimize(&ctx, join_scenario(&mut PlanBuilder::new())).unwrap();

        let filter = plan.input().unwrap();
        assert_eq!(predicate(filter), "#0.col1@0 > #1.col1@3");
        let LogicalPlan::Join { left, right, condition, .. } = filter.input().unwrap() else { panic!("expected a join") };
        assert_eq!(condition.as_ref().map(ToString::to_string).as_deref(), Some("#0.col3@2 = #1.col3@5"));
        assert_eq!(predicate(left), "#0.col2@1 = 'test'");
        assert_eq!(predicate(right), "#1.col2@1 > 100");
    }

    #[test]
    fn order_by_aggregate_feeds_from_hoisted_projection() {
        let ctx = create_context();
        let plan = optimize(&ctx, aggregate_scenario(&mut PlanBuilder::new())).unwrap();

        let LogicalPlan::Aggregate { items, input, .. } = plan.input().unwrap() else { panic!("expected an aggregate") };
        assert!(items.last().is_some_and(|item| item.internal));
        let LogicalPlan::Projection { items: hoisted, .. } = input.as_ref() else { panic!("expected a projection") };
        assert!(hoisted.iter().any(|item| item.internal && matches!(item.expression, Expression::Binary { .. })));
    }

    #[test]
    fn correlated_sub_query_becomes_asserted_apply() {
        let ctx = create_context();
        let plan = optimize(&ctx, correlated_scenario(&mut PlanBuilder::new())).unwrap();

        let applies = find_nodes(&plan, |node| matches!(node, LogicalPlan::Join { join_type: JoinType::OuterApply, .. }));
        assert_eq!(applies.len(), 1);
        let asserts = find_nodes(&plan, |node| matches!(node, LogicalPlan::AssertRowCount { max_rows: 1, .. }));
        assert_eq!(asserts.len(), 1);
        assert_eq!(find_nodes(asserts[0], |node| matches!(node, LogicalPlan::Filter { .. })).len(), 1);
    }

    #[test]
    fn forwarding_derived_table_disappears() {
        let ctx = create_context();
        let plan = optimize(&ctx, derived_scenario(&mut PlanBuilder::new())).unwrap();
        assert!(find_nodes(&plan, |node| matches!(node, LogicalPlan::SubQuery { .. })).is_empty());
        assert!(matches!(plan.input(), Some(LogicalPlan::TableScan { .. })));
    }

    #[test]
    fn visible_output_survives_the_pipeline() {
        let scenarios: Vec<fn(&mut PlanBuilder) -> LogicalPlan> = vec![
            join_scenario,
            aggregate_scenario,
            correlated_scenario,
            derived_scenario,
            schema_less_scenario,
            apply_scenario,
            table_function_scenario,
            values_scenario,
            concatenation_scenario,
        ];
        for scenario in scenarios {
            let raw = scenario(&mut PlanBuilder::new());
            let resolved = resolve(&create_context(), raw.clone()).unwrap();
            let optimized = optimize(&create_context(), raw).unwrap();
            assert_eq!(visible_columns(&optimized), visible_columns(&resolved), "{}", resolved.explain());
        }
    }

    #[test]
    fn table_function_columns_get_ordinals() {
        let ctx = create_context();
        let plan = optimize(&ctx, table_function_scenario(&mut PlanBuilder::new())).unwrap();
        assert_eq!(visible_columns(&plan), vec!["Value: int"]);
        assert_eq!(expressions_of(&plan), vec!["#0.Value@0"]);
        let filter = plan.input().unwrap();
        assert_eq!(predicate(filter), "#0.Value@0 > 2");
        assert!(matches!(filter.input(), Some(LogicalPlan::TableFunctionScan { .. })));
        assert_eq!(expressions_of(filter.input().unwrap()), vec!["1", "5"]);
    }

    #[test]
    fn constant_rows_are_addressed_by_position() {
        let ctx = create_context();
        let plan = optimize(&ctx, values_scenario(&mut PlanBuilder::new())).unwrap();
        assert_eq!(visible_columns(&plan), vec!["label: string"]);
        let LogicalPlan::Limit { input, limit, offset } = &plan else { panic!("expected a limit, got {}", plan.label()) };
        assert_eq!(limit.as_ref().map(ToString::to_string).as_deref(), Some("1"));
        assert_eq!(offset.as_ref().map(ToString::to_string).as_deref(), Some("1"));
        assert_eq!(expressions_of(input), vec!["label@1"]);
        let Some(LogicalPlan::ConstantScan { rows, .. }) = input.input() else { panic!("expected constant rows") };
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn concatenated_inputs_are_narrowed_one_by_one() {
        let ctx = create_context();
        let plan = optimize(&ctx, concatenation_scenario(&mut PlanBuilder::new())).unwrap();
        assert_eq!(visible_columns(&plan), vec!["col1: int"]);
        assert_eq!(expressions_of(&plan), vec!["col1@0"]);

        let Some(LogicalPlan::Concatenation { inputs }) = plan.input() else { panic!("expected a concatenation") };
        let items: Vec<Vec<String>> = inputs.iter().map(expressions_of).collect();
        assert_eq!(items, vec![vec!["#0.col1@0".to_string()], vec!["#1.col1@0".to_string()]]);
        let scans: Vec<Option<Vec<String>>> = find_nodes(&plan, |node| matches!(node, LogicalPlan::TableScan { .. }))
            .into_iter()
            .map(|node| match node {
                LogicalPlan::TableScan { columns, .. } => columns.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(scans, vec![Some(vec!["col1".to_string()]), Some(vec!["col1".to_string()])]);
    }

    #[test]
    fn disabled_push_downs_keep_the_resolved_shape() {
        let ctx = create_context().with_config(OptimizerConfig::resolution_only());
        let plan = optimize(&ctx, join_scenario(&mut PlanBuilder::new())).unwrap();
        let filter = plan.input().unwrap();
        assert_eq!(predicate(filter), "((#0.col1@0 > #1.col1@3) and (#0.col2@1 = 'test')) and (#1.col2@4 > 100)");
        assert!(matches!(filter.input(), Some(LogicalPlan::Join { .. })));
    }
}
