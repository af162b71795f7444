use tracing::trace;

use crate::{
    expr::{ColumnExpression, Expression, FunctionCallExpression, Location},
    optimizer::{
        lookup_lambda, merge_outer_references, visible_sources, BindingErrorKind, ExecutionContext, Frame,
        LambdaScope, LogicalPlanOptimizer, PlanError, Scope, ScopeMatch,
    },
    plan::{LogicalPlan, ProjectionItem},
    schema::{CoreColumn, QualifiedName, ResolvedType, Schema, TableSourceId, TableSourceReference},
};

pub struct ColumnResolverContext<'a> {
    pub ctx: &'a ExecutionContext,
    /// Enclosing scopes, innermost last
    frames: Vec<Frame>,
}

/// Binds every qualified name and asterisk to a column of a visible schema.
///
/// Lookup order: lambda identifiers, the scopes of the current node, then the
/// enclosing scopes outward. Columns found in an enclosing scope are outer
/// references and are recorded on the sub-query expression or apply join that
/// crosses into that scope.
pub struct ColumnResolver;

impl LogicalPlanOptimizer for ColumnResolver {
    type Context<'a> = ColumnResolverContext<'a>;

    fn name(&self) -> &'static str {
        "ColumnResolver"
    }

    fn create_context<'a>(&self, ctx: &'a ExecutionContext) -> Self::Context<'a> {
        ColumnResolverContext { ctx, frames: Vec::new() }
    }

    fn optimize(&self, context: &mut Self::Context<'_>, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        Self::resolve_plan(context, plan)
    }
}

impl ColumnResolver {
    pub fn resolve_plan(context: &mut ColumnResolverContext, plan: LogicalPlan) -> Result<LogicalPlan, PlanError> {
        match plan {
            LogicalPlan::TableScan { .. } => Ok(plan),
            LogicalPlan::TableFunctionScan { source, function, schema } => {
                let function = Self::resolve_arguments(context, &[Scope::default()], function, None)?;
                Ok(LogicalPlan::TableFunctionScan { source, function, schema })
            }
            LogicalPlan::ExpressionScan { source, expression, schema } => {
                let expression = Self::resolve_expression(context, &[Scope::default()], expression, None)?;
                let schema = match schema {
                    Some(schema) => schema,
                    None => Self::expression_scan_schema(&source, &expression)?,
                };
                Ok(LogicalPlan::ExpressionScan { source, expression, schema: Some(schema) })
            }
            LogicalPlan::ConstantScan { columns, rows } => {
                let levels = [Scope::default()];
                let rows = rows.into_iter()
                    .map(|row| row.into_iter()
                        .map(|expression| Self::resolve_expression(context, &levels, expression, None))
                        .collect::<Result<Vec<_>, _>>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LogicalPlan::ConstantScan { columns, rows })
            }
            LogicalPlan::SubQuery { input, source } => {
                let input = Self::resolve_plan(context, *input)?;
                Self::check_column_names(&source, &input.schema())?;
                Ok(LogicalPlan::SubQuery { input: Box::new(input), source })
            }
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => {
                let left = Self::resolve_plan(context, *left)?;
                let (right, outer_references) = if join_type.is_apply() {
                    let (right, found) = Self::within_frame(context, vec![Scope::of(&left)], |context| {
                        Self::resolve_plan(context, *right)
                    })?;
                    (right, merge_outer_references(outer_references, found))
                } else {
                    (Self::resolve_plan(context, *right)?, outer_references)
                };
                Self::check_duplicate_aliases(&left, &right)?;
                let levels = [Scope::of(&left).concat(&Scope::of(&right))];
                let condition = condition
                    .map(|condition| Self::resolve_expression(context, &levels, condition, None))
                    .transpose()?;
                Ok(LogicalPlan::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type,
                    condition,
                    populate,
                    outer_references,
                })
            }
            LogicalPlan::Filter { input, predicate } => {
                let input = Self::resolve_plan(context, *input)?;
                let levels = Self::output_levels(&input);
                let predicate = Self::resolve_expression(context, &levels, predicate, None)?;
                Ok(LogicalPlan::Filter { input: Box::new(input), predicate })
            }
            LogicalPlan::Projection { input, items } => {
                let input = Self::resolve_plan(context, *input)?;
                let levels = [Scope::of(&input)];
                let items = Self::resolve_items(context, &levels, items)?;
                Ok(LogicalPlan::Projection { input: Box::new(input), items })
            }
            LogicalPlan::Aggregate { input, group_by, items } => {
                let input = Self::resolve_plan(context, *input)?;
                let levels = [Scope::of(&input)];
                let group_by = group_by.into_iter()
                    .map(|expression| Self::resolve_expression(context, &levels, expression, None))
                    .collect::<Result<Vec<_>, _>>()?;
                let items = Self::resolve_items(context, &levels, items)?;
                Ok(LogicalPlan::Aggregate { input: Box::new(input), group_by, items })
            }
            LogicalPlan::Sort { input, items } => {
                let input = Self::resolve_plan(context, *input)?;
                let levels = Self::output_levels(&input);
                let items = items.into_iter()
                    .map(|mut item| {
                        item.expression = Self::resolve_expression(context, &levels, item.expression, None)?;
                        Ok(item)
                    })
                    .collect::<Result<Vec<_>, PlanError>>()?;
                Ok(LogicalPlan::Sort { input: Box::new(input), items })
            }
            LogicalPlan::Limit { input, limit, offset } => {
                let input = Self::resolve_plan(context, *input)?;
                let levels = [Scope::default()];
                let limit = limit.map(|limit| Self::resolve_expression(context, &levels, limit, None)).transpose()?;
                let offset = offset.map(|offset| Self::resolve_expression(context, &levels, offset, None)).transpose()?;
                Ok(LogicalPlan::Limit { input: Box::new(input), limit, offset })
            }
            other => other.map_children(|child| Self::resolve_plan(context, child)),
        }
    }

    /// Scopes seen by a filter or sort: the output of the input node, then the
    /// input of a projection or aggregate so non-projected columns still bind.
    fn output_levels(input: &LogicalPlan) -> Vec<Scope> {
        let mut levels = vec![Scope::of(input)];
        if let LogicalPlan::Projection { input: inner, .. } | LogicalPlan::Aggregate { input: inner, .. } = input {
            levels.push(Scope::of(inner));
        }
        levels
    }

    /// Run `f` with `levels` pushed as the innermost enclosing scope; returns
    /// the columns read from it or from scopes further out.
    fn within_frame<T, F>(context: &mut ColumnResolverContext, levels: Vec<Scope>, f: F) -> Result<(T, Vec<CoreColumn>), PlanError>
    where
        F: FnOnce(&mut ColumnResolverContext) -> Result<T, PlanError>,
    {
        context.frames.push(Frame::new(levels));
        let result = f(context);
        let frame = context.frames.pop().unwrap_or_default();
        Ok((result?, frame.found))
    }

    fn check_duplicate_aliases(left: &LogicalPlan, right: &LogicalPlan) -> Result<(), PlanError> {
        let left_sources = visible_sources(left);
        for source in visible_sources(right) {
            if left_sources.iter().any(|existing| existing.matches_alias(source.visible_name())) {
                return Err(PlanError::binding(
                    BindingErrorKind::DuplicateAlias,
                    format!("Alias {} is defined multiple times", source.visible_name()),
                ));
            }
        }
        Ok(())
    }

    /// Output columns of a derived table are addressed by name only, so every
    /// visible one needs a distinct name.
    fn check_column_names(source: &TableSourceReference, schema: &Schema) -> Result<(), PlanError> {
        let mut seen: Vec<&str> = Vec::new();
        for (index, column) in schema.visible().enumerate() {
            if column.name.is_empty() {
                return Err(PlanError::binding(
                    BindingErrorKind::MissingColumnName,
                    format!("Missing column name for column {} of {}", index + 1, source.visible_name()),
                ));
            }
            if seen.iter().any(|name| name.eq_ignore_ascii_case(&column.name)) {
                return Err(PlanError::binding(
                    BindingErrorKind::DuplicateColumnName,
                    format!("Column {} is specified multiple times for {}", column.name, source.visible_name()),
                ));
            }
            seen.push(&column.name);
        }
        Ok(())
    }

    fn expression_scan_schema(source: &TableSourceReference, expression: &Expression) -> Result<Schema, PlanError> {
        let ty = expression.data_type();
        let rows = match &ty {
            ResolvedType::Table(schema) => Some(schema),
            ResolvedType::Array(element) => match element.as_ref() {
                ResolvedType::Object(schema) | ResolvedType::Table(schema) => Some(schema),
                element if element.is_any() => None,
                _ => return Err(Self::unsupported_expression_scan(expression, &ty)),
            },
            ty if ty.is_any() => None,
            _ => return Err(Self::unsupported_expression_scan(expression, &ty)),
        };
        Ok(match rows {
            Some(schema) => schema.with_source(source.id),
            None => Schema::asterisk(source.id),
        })
    }

    fn unsupported_expression_scan(expression: &Expression, ty: &ResolvedType) -> PlanError {
        PlanError::binding(
            BindingErrorKind::UnsupportedExpressionScan,
            format!("Cannot scan expression {} of type {}, expected a table or an array of objects", expression, ty),
        )
    }

    fn resolve_items(context: &mut ColumnResolverContext, levels: &[Scope], items: Vec<ProjectionItem>) -> Result<Vec<ProjectionItem>, PlanError> {
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            match item.expression {
                Expression::Asterisk { qualifier, location } => {
                    let columns = Self::expand_asterisk(&levels[0], qualifier.as_ref(), location)?;
                    resolved.extend(columns.iter().map(|column| ProjectionItem::new(Expression::Column(ColumnExpression::of(column)))));
                }
                expression => {
                    let expression = Self::resolve_expression(context, levels, expression, None)?;
                    resolved.push(ProjectionItem { expression, ..item });
                }
            }
        }
        Ok(resolved)
    }

    /// Columns behind `*` or `alias.*`, in schema order. Populated joins stay
    /// a single table column, schema-less sources their asterisk column.
    fn expand_asterisk(scope: &Scope, qualifier: Option<&QualifiedName>, location: Option<Location>) -> Result<Vec<CoreColumn>, PlanError> {
        let Some(qualifier) = qualifier else {
            return Ok(scope.schema.visible().cloned().collect());
        };
        let source = scope.source_by_alias(qualifier.last())
            .map_err(|error| error.at(location))?
            .ok_or_else(|| PlanError::binding(
                BindingErrorKind::UnboundAlias,
                format!("Alias {} could not be bound", qualifier),
            ).at(location))?;
        Ok(Self::columns_of_source(&scope.schema, source.id))
    }

    fn columns_of_source(schema: &Schema, source: TableSourceId) -> Vec<CoreColumn> {
        let direct: Vec<CoreColumn> = schema.visible()
            .filter(|column| column.source() == Some(source))
            .cloned()
            .collect();
        if !direct.is_empty() {
            return direct;
        }
        schema.iter()
            .filter_map(|column| column.ty.nested_schema())
            .map(|nested| Self::columns_of_source(nested, source))
            .find(|columns| !columns.is_empty())
            .unwrap_or_default()
    }

    pub fn resolve_expression(
        context: &mut ColumnResolverContext,
        levels: &[Scope],
        expression: Expression,
        lambdas: Option<&LambdaScope<'_>>,
    ) -> Result<Expression, PlanError> {
        match expression {
            Expression::QualifiedName { name, location } => {
                Self::resolve_name(context, levels, &name, lambdas).map_err(|error| error.at(location))
            }
            Expression::Asterisk { location, .. } => Err(PlanError::binding(
                BindingErrorKind::InvalidExpression,
                "An asterisk is only allowed in a select list or in count(*)",
            ).at(location)),
            Expression::Lambda { parameter, .. } => Err(PlanError::binding(
                BindingErrorKind::InvalidExpression,
                format!("Lambda {} -> ... is only allowed as a function argument", parameter),
            )),
            Expression::Function(function) => {
                Self::resolve_arguments(context, levels, function, lambdas).map(Expression::Function)
            }
            Expression::SubQuery(mut sub_query) => {
                let plan = *sub_query.plan;
                let (plan, found) = Self::within_frame(context, levels.to_vec(), |context| Self::resolve_plan(context, plan))?;
                sub_query.plan = Box::new(plan);
                sub_query.outer_references = merge_outer_references(sub_query.outer_references, found);
                Ok(Expression::SubQuery(sub_query))
            }
            other => other.map_children(|child| Self::resolve_expression(context, levels, child, lambdas)),
        }
    }

    /// Resolve call arguments. Lambda arguments are resolved last, with their
    /// parameter typed by the elements of the argument they are bound to.
    fn resolve_arguments(
        context: &mut ColumnResolverContext,
        levels: &[Scope],
        mut function: FunctionCallExpression,
        lambdas: Option<&LambdaScope<'_>>,
    ) -> Result<FunctionCallExpression, PlanError> {
        if function.is_count_star() {
            return Ok(function);
        }
        let args = std::mem::take(&mut function.args);
        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            resolved.push(match arg {
                lambda @ Expression::Lambda { .. } => lambda,
                arg => Self::resolve_expression(context, levels, arg, lambdas)?,
            });
        }

        for index in 0..resolved.len() {
            let Expression::Lambda { parameter, body } = &resolved[index] else {
                continue;
            };
            let bound = function.descriptor.as_ref()
                .and_then(|descriptor| descriptor.lambda_binding(index))
                .and_then(|bound| resolved.get(bound))
                .ok_or_else(|| PlanError::binding(
                    BindingErrorKind::InvalidExpression,
                    format!("Function {} does not accept a lambda as argument {}", function.name, index + 1),
                ).at(function.location))?;
            if lookup_lambda(lambdas, parameter).is_some() {
                return Err(PlanError::binding(
                    BindingErrorKind::LambdaShadowing,
                    format!("Lambda identifier {} is already defined", parameter),
                ).at(function.location));
            }
            let ty = bound.data_type().element_type();
            let parameter = parameter.clone();
            let body = (**body).clone();
            let scope = LambdaScope::new(&parameter, &ty, lambdas);
            let body = Self::resolve_expression(context, levels, body, Some(&scope))?;
            resolved[index] = Expression::Lambda { parameter, body: Box::new(body) };
        }

        function.args = resolved;
        Ok(function)
    }

    fn resolve_name(
        context: &mut ColumnResolverContext,
        levels: &[Scope],
        name: &QualifiedName,
        lambdas: Option<&LambdaScope<'_>>,
    ) -> Result<Expression, PlanError> {
        if let Some(ty) = lookup_lambda(lambdas, name.first()) {
            let variable = Expression::LambdaVariable { name: name.first().to_string(), ty: ty.clone() };
            return Ok(Self::dereference(variable, &name.parts[1..]));
        }

        for scope in levels {
            if let ScopeMatch::Column(column, consumed) = scope.lookup(name)? {
                trace!(name = %name, column = ?column.column_reference, "bound column");
                let expression = Expression::Column(ColumnExpression::of(&column));
                return Ok(Self::dereference(expression, &name.parts[consumed..]));
            }
        }

        for depth in (0..context.frames.len()).rev() {
            let mut found = None;
            for scope in &context.frames[depth].levels {
                if let ScopeMatch::Column(column, consumed) = scope.lookup(name)? {
                    found = Some((column, consumed));
                    break;
                }
            }
            if let Some((column, consumed)) = found {
                trace!(name = %name, column = ?column.column_reference, depth, "bound outer reference");
                for frame in &mut context.frames[depth..] {
                    frame.record(&column);
                }
                let expression = Expression::Column(ColumnExpression::of(&column).outer());
                return Ok(Self::dereference(expression, &name.parts[consumed..]));
            }
        }

        Err(PlanError::binding(BindingErrorKind::UnboundQualifier, format!("{} cannot be bound", name)))
    }

    /// Remaining name parts become field accesses.
    fn dereference(base: Expression, fields: &[String]) -> Expression {
        fields.iter().fold(base, |expression, field| {
            let ty = expression.data_type().nested_schema()
                .and_then(|schema| schema.find_by_name(field).first().and_then(|index| schema.get(*index)))
                .map(|column| column.ty.clone())
                .unwrap_or_else(ResolvedType::any);
            Expression::Dereference { expression: Box::new(expression), field: field.clone(), ty }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        expr::{asterisk, call, count_star, eq, gt, lambda, lit, name, qualified_asterisk, sub_query, ForClause},
        optimizer::fixtures::{create_context, find_nodes, resolve, visible_columns},
        plan::{JoinType, PlanBuilder, SortItem},
        schema::ColumnReference,
    };

    use super::*;

    fn projected(plan: &LogicalPlan) -> Vec<&Expression> {
        match plan {
            LogicalPlan::Projection { items, .. } => items.iter().map(|item| &item.expression).collect(),
            other => panic!("expected a projection, got {}", other.label()),
        }
    }

    #[test]
    fn asterisk_expands_every_visible_column() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let plan = builder.table("tableA", Some("a"))
            .join(builder.table("tableC", Some("c")), JoinType::Inner, Some(eq(name("a.col1"), name("c.col1"))))
            .project(vec![asterisk().into()]);
        let plan = resolve(&ctx, plan).unwrap();
        assert_eq!(visible_columns(&plan), vec!["col1: int", "col2: string", "col3: int", "col1: int", "col2: int"]);
    }

    #[test]
    fn qualified_asterisk_expands_one_source() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let plan = builder.table("tableA", Some("a"))
            .join(builder.table("tableC", Some("c")), JoinType::Inner, None)
            .project(vec![qualified_asterisk("c").into()]);
        let plan = resolve(&ctx, plan).unwrap();
        let sources: Vec<_> = plan.schema().iter().map(|column| column.source()).collect();
        assert_eq!(sources, vec![Some(TableSourceId(1)), Some(TableSourceId(1))]);
    }

    #[test]
    fn unknown_qualifier_of_asterisk_fails() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableB", Some("b")).project(vec![asterisk().into()]);
        let derived = builder.sub_query(inner, "x");
        let plan = builder.table("tableA", Some("a"))
            .join(derived, JoinType::Inner, Some(eq(name("x.col2"), name("a.col2"))))
            .project(vec![qualified_asterisk("c").into()]);
        let error = resolve(&ctx, plan).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::UnboundAlias));
        assert_eq!(error.message(), "Alias c could not be bound");
    }

    #[test]
    fn unqualified_column_in_two_sources_is_ambiguous() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let plan = builder.table("tableA", Some("a"))
            .join(builder.table("tableB", Some("b")), JoinType::Inner, None)
            .project(vec![name("col1").into()]);
        let error = resolve(&ctx, plan).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::AmbiguousColumn));
    }

    #[test]
    fn unknown_name_cannot_be_bound() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table("tableA", Some("a")).project(vec![name("a.nope").into()]);
        let error = resolve(&ctx, plan).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::UnboundQualifier));
        assert_eq!(error.message(), "a.nope cannot be bound");
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let plan = builder.table("tableA", Some("x"))
            .join(builder.table("tableB", Some("X")), JoinType::Inner, None)
            .project(vec![asterisk().into()]);
        let error = resolve(&ctx, plan).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::DuplicateAlias));
    }

    #[test]
    fn schema_less_source_binds_any_name() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table("events", Some("e")).project(vec![name("e.kind").into(), name("payload").into()]);
        let plan = resolve(&ctx, plan).unwrap();
        let columns: Vec<_> = projected(&plan).iter().filter_map(|expression| expression.as_column()).collect();
        assert_eq!(columns[0].column_reference, Some(ColumnReference::regular(TableSourceId(0), "kind")));
        assert_eq!(columns[1].column_reference, Some(ColumnReference::regular(TableSourceId(0), "payload")));
        assert!(columns.iter().all(|column| column.ty.is_any()));
    }

    #[test]
    fn two_schema_less_sources_make_names_ambiguous() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let plan = builder.table("events", Some("e"))
            .join(builder.table("logs", Some("l")), JoinType::Inner, None)
            .project(vec![name("payload").into()]);
        assert_eq!(resolve(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::AmbiguousColumn));
    }

    #[test]
    fn correlated_sub_query_records_outer_reference() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableB", Some("b"))
            .filter(eq(name("b.col2"), name("a.col3")))
            .project(vec![name("b.col1").into()]);
        let plan = builder.table("tableA", Some("a")).project(vec![sub_query(inner).into()]);
        let plan = resolve(&ctx, plan).unwrap();

        let Expression::SubQuery(sub_query) = projected(&plan)[0] else { panic!("expected a sub-query") };
        assert!(sub_query.is_correlated());
        assert_eq!(sub_query.outer_references[0].column_reference, Some(ColumnReference::regular(TableSourceId(1), "col3")));

        let filters = find_nodes(&sub_query.plan, |node| matches!(node, LogicalPlan::Filter { .. }));
        let LogicalPlan::Filter { predicate, .. } = filters[0] else { unreachable!() };
        let outer: Vec<_> = predicate.columns().into_iter().filter(|column| column.outer_reference).collect();
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].name, "col3");
    }

    #[test]
    fn current_scope_wins_over_outer_scope() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        // col1 exists in both scopes, col2 is only in the schema-less inner source
        let inner = builder.table("events", Some("e"))
            .project(vec![name("col1").into()]);
        let plan = builder.table("tableA", Some("a")).project(vec![sub_query(inner).into()]);
        let plan = resolve(&ctx, plan).unwrap();
        let Expression::SubQuery(sub_query) = projected(&plan)[0] else { panic!("expected a sub-query") };
        assert!(!sub_query.is_correlated());
        let column = projected(&sub_query.plan)[0].as_column().cloned().unwrap();
        assert_eq!(column.column_reference, Some(ColumnReference::regular(TableSourceId(0), "col1")));
    }

    #[test]
    fn outer_non_asterisk_column_beats_nothing_in_current_scope() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = PlanBuilder::no_table().project(vec![name("col2").into()]);
        let plan = builder.table("tableA", Some("a")).project(vec![sub_query(inner).into()]);
        let plan = resolve(&ctx, plan).unwrap();
        let Expression::SubQuery(sub_query) = projected(&plan)[0] else { panic!("expected a sub-query") };
        assert_eq!(sub_query.outer_references.len(), 1);
        assert_eq!(sub_query.data_type(), ResolvedType::string());
    }

    #[test]
    fn nested_sub_queries_chain_outer_references() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let innermost = builder.table("tableC", Some("c"))
            .filter(eq(name("c.col1"), name("a.col1")))
            .project(vec![name("c.col2").into()]);
        let middle = builder.table("tableB", Some("b")).project(vec![sub_query(innermost).into()]);
        let plan = builder.table("tableA", Some("a")).project(vec![ProjectionItem::aliased(sub_query(middle), "v")]);
        let plan = resolve(&ctx, plan).unwrap();

        let Expression::SubQuery(middle) = projected(&plan)[0] else { panic!("expected a sub-query") };
        assert_eq!(middle.outer_references.len(), 1);
        let Expression::SubQuery(innermost) = projected(&middle.plan)[0] else { panic!("expected a sub-query") };
        assert_eq!(innermost.outer_references, middle.outer_references);
    }

    #[test]
    fn apply_join_right_side_reads_left_side() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let items = builder.expression_scan(name("o.items"), "i");
        let plan = builder.table("orders", Some("o"))
            .join(items, JoinType::CrossApply, None)
            .project(vec![name("o.id").into(), name("i.sku").into()]);
        let plan = resolve(&ctx, plan).unwrap();

        assert_eq!(visible_columns(&plan), vec!["id: int", "sku: string"]);
        let joins = find_nodes(&plan, |node| matches!(node, LogicalPlan::Join { .. }));
        let LogicalPlan::Join { outer_references, .. } = joins[0] else { unreachable!() };
        assert_eq!(outer_references.len(), 1);
        assert_eq!(outer_references[0].name, "items");
    }

    #[test]
    fn expression_scan_of_scalar_is_rejected() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let scan = builder.expression_scan(name("o.id"), "i");
        let plan = builder.table("orders", Some("o")).join(scan, JoinType::CrossApply, None).project(vec![asterisk().into()]);
        assert_eq!(resolve(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::UnsupportedExpressionScan));
    }

    #[test]
    fn lambda_parameter_takes_element_type() {
        let ctx = create_context();
        let mapped = call("map", vec![name("o.tags"), lambda("t", call("upper", vec![name("t")]))]);
        let filtered = call("filter", vec![name("o.items"), lambda("x", gt(name("x.qty"), lit(1)))]);
        let plan = PlanBuilder::new().table("orders", Some("o"))
            .project(vec![ProjectionItem::aliased(mapped, "upper_tags"), ProjectionItem::aliased(filtered, "big")]);
        let plan = resolve(&ctx, plan).unwrap();
        assert_eq!(visible_columns(&plan)[0], "upper_tags: array<string>");
        let qty = format!("{}", projected(&plan)[1]);
        assert_eq!(qty, "filter(#0.items, x -> x.qty > 1)");
    }

    #[test]
    fn lambda_shadowing_is_rejected() {
        let ctx = create_context();
        let inner = call("any", vec![name("x.tags"), lambda("x", eq(name("x"), lit("a")))]);
        let outer = call("filter", vec![name("o.items"), lambda("x", inner)]);
        let plan = PlanBuilder::new().table("orders", Some("o")).project(vec![ProjectionItem::aliased(outer, "f")]);
        assert_eq!(resolve(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::LambdaShadowing));
    }

    #[test]
    fn derived_table_needs_column_names() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let input = builder.table("tableA", Some("a")).project(vec![call("upper", vec![name("col2")]).into()]);
        let plan = builder.sub_query(input, "x").project(vec![asterisk().into()]);
        assert_eq!(resolve(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::MissingColumnName));
    }

    #[test]
    fn derived_table_rejects_repeated_column_names() {
        let ctx = create_context();
        let derived = |builder: &mut PlanBuilder| {
            let inner = builder.table("tableA", Some("a"))
                .join(builder.table("tableB", Some("b")), JoinType::Inner, Some(eq(name("a.col3"), name("b.col3"))))
                .project(vec![name("a.col1").into(), name("b.col1").into()]);
            builder.sub_query(inner, "x")
        };

        let mut builder = PlanBuilder::new();
        let plan = derived(&mut builder).project(vec![asterisk().into()]);
        let error = resolve(&ctx, plan).unwrap_err();
        assert_eq!(error.kind(), Some(BindingErrorKind::DuplicateColumnName));
        assert_eq!(error.message(), "Column col1 is specified multiple times for x");

        let mut builder = PlanBuilder::new();
        let plan = derived(&mut builder).project(vec![name("col1").into()]);
        assert_eq!(resolve(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::DuplicateColumnName));

        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableA", Some("a"))
            .join(builder.table("tableB", Some("b")), JoinType::Inner, Some(eq(name("a.col3"), name("b.col3"))))
            .project(vec![name("a.col1").into(), ProjectionItem::aliased(name("b.col1"), "b_col1")]);
        let plan = builder.sub_query(inner, "x").project(vec![asterisk().into()]);
        assert_eq!(visible_columns(&resolve(&ctx, plan).unwrap()), vec!["col1: int", "b_col1: int"]);
    }

    #[test]
    fn sort_binds_output_alias_before_input_column() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table("tableA", Some("a"))
            .project(vec![ProjectionItem::aliased(name("col3"), "col1")])
            .sort(vec![SortItem::asc(name("col1"))]);
        let plan = resolve(&ctx, plan).unwrap();
        let LogicalPlan::Sort { items, .. } = &plan else { panic!("expected a sort") };
        let column = items[0].expression.as_column().cloned().unwrap();
        assert_eq!(column.column_reference, Some(ColumnReference::regular(TableSourceId(0), "col3")));
    }

    #[test]
    fn asterisk_outside_select_list_is_rejected() {
        let ctx = create_context();
        let plan = PlanBuilder::new().table("tableA", Some("a"))
            .filter(eq(asterisk(), lit(1)))
            .project(vec![count_star().into()]);
        assert_eq!(resolve(&ctx, plan).unwrap_err().kind(), Some(BindingErrorKind::InvalidExpression));
    }

    #[test]
    fn for_clause_sub_query_resolves() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableB", Some("b")).filter(eq(name("b.col1"), name("a.col1"))).project(vec![asterisk().into()]);
        let plan = builder.table("tableA", Some("a"))
            .project(vec![ProjectionItem::aliased(crate::expr::sub_query_for(inner, ForClause::ObjectArray), "bs")]);
        let plan = resolve(&ctx, plan).unwrap();
        assert_eq!(visible_columns(&plan), vec!["bs: array<object<col1: int, col2: int, col3: int>>"]);
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let ctx = create_context();
        let mut builder = PlanBuilder::new();
        let inner = builder.table("tableB", Some("b"))
            .filter(eq(name("b.col2"), name("a.col1")))
            .project(vec![name("b.col1").into()]);
        let plan = builder.table("tableA", Some("a"))
            .project(vec![asterisk().into(), ProjectionItem::aliased(sub_query(inner), "s")]);
        let once = resolve(&ctx, plan).unwrap();
        let twice = crate::optimizer::run_pass(&ColumnResolver, &ctx, once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
