use serde::Serialize;

use crate::{
    expr::{Expression, ForClause, FunctionCallExpression},
    plan::{JoinType, ProjectionItem, SortItem},
    schema::{ColumnReference, CoreColumn, ResolvedType, Schema, TableSourceReference},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LogicalPlan {
    /// Read a catalog table. `schema` is bound by schema resolution; `columns`
    /// is the explicit column list requested once projection push down ran.
    TableScan {
        source: TableSourceReference,
        schema: Option<Schema>,
        columns: Option<Vec<String>>,
    },

    TableFunctionScan {
        source: TableSourceReference,
        function: FunctionCallExpression,
        schema: Option<Schema>,
    },

    /// Iterate the rows of a table/array valued expression, e.g. `a.items i`.
    ExpressionScan {
        source: TableSourceReference,
        expression: Expression,
        schema: Option<Schema>,
    },

    /// Literal rows. One row and no columns is the input of a FROM-less select.
    ConstantScan {
        columns: Vec<String>,
        rows: Vec<Vec<Expression>>,
    },

    /// Derived table: the input's columns re-owned by `source`.
    SubQuery {
        input: Box<LogicalPlan>,
        source: TableSourceReference,
    },

    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: Option<Expression>,
        /// Nest right rows into a single table column with this name
        populate: Option<String>,
        /// Left side columns read by the right side
        outer_references: Vec<CoreColumn>,
    },

    Filter {
        input: Box<LogicalPlan>,
        predicate: Expression,
    },

    Projection {
        input: Box<LogicalPlan>,
        items: Vec<ProjectionItem>,
    },

    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<Expression>,
        items: Vec<ProjectionItem>,
    },

    Sort {
        input: Box<LogicalPlan>,
        items: Vec<SortItem>,
    },

    Limit {
        input: Box<LogicalPlan>,
        limit: Option<Expression>,
        offset: Option<Expression>,
    },

    /// UNION ALL of inputs with the same shape
    Concatenation {
        inputs: Vec<LogicalPlan>,
    },

    /// Folds all rows of the input into one value column (FOR clause).
    OperatorFunctionScan {
        input: Box<LogicalPlan>,
        for_clause: ForClause,
        column: String,
    },

    /// Fails at execution when the input yields more than `max_rows` rows.
    AssertRowCount {
        input: Box<LogicalPlan>,
        max_rows: usize,
    },
}

/// Output schema of a list of projection items.
///
/// A plain column keeps its reference (first occurrence only) so consumers
/// can still address it by key; everything else is a computed column.
pub fn items_schema(items: &[ProjectionItem]) -> Schema {
    let mut seen: Vec<ColumnReference> = Vec::new();
    let columns = items.iter().map(|item| {
        let reference = match &item.expression {
            Expression::Column(column) if !column.outer_reference => {
                column.column_reference.clone().filter(|reference| !seen.contains(reference))
            }
            _ => None,
        };
        if let Some(reference) = &reference {
            seen.push(reference.clone());
        }
        CoreColumn {
            name: item.name(),
            ty: item.expression.data_type(),
            column_reference: reference,
            internal: item.internal,
        }
    }).collect();
    Schema::new(columns)
}

impl LogicalPlan {
    pub fn schema(&self) -> Schema {
        match self {
            LogicalPlan::TableScan { schema, .. }
            | LogicalPlan::TableFunctionScan { schema, .. }
            | LogicalPlan::ExpressionScan { schema, .. } => schema.clone().unwrap_or_default(),
            LogicalPlan::ConstantScan { columns, rows } => Schema::new(
                columns.iter().enumerate().map(|(index, name)| {
                    let ty = rows.first()
                        .and_then(|row| row.get(index))
                        .map(Expression::data_type)
                        .unwrap_or_else(ResolvedType::any);
                    CoreColumn::computed(name.clone(), ty)
                }).collect(),
            ),
            LogicalPlan::SubQuery { input, source } => input.schema().with_source(source.id),
            LogicalPlan::Join { left, right, populate, .. } => match populate {
                Some(alias) => {
                    let nested = CoreColumn::computed(alias.clone(), ResolvedType::Table(right.schema()));
                    left.schema().concat(&Schema::new(vec![nested]))
                }
                None => left.schema().concat(&right.schema()),
            },
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::AssertRowCount { input, .. } => input.schema(),
            LogicalPlan::Projection { items, .. } | LogicalPlan::Aggregate { items, .. } => items_schema(items),
            LogicalPlan::Concatenation { inputs } => inputs.first()
                .map(|input| input.schema().detached())
                .unwrap_or_default(),
            LogicalPlan::OperatorFunctionScan { input, for_clause, column } => Schema::new(vec![
                CoreColumn::computed(column.clone(), for_clause.result_type(&input.schema())),
            ]),
        }
    }

    /// Table source introduced by this node, if any.
    pub fn source(&self) -> Option<&TableSourceReference> {
        match self {
            LogicalPlan::TableScan { source, .. }
            | LogicalPlan::TableFunctionScan { source, .. }
            | LogicalPlan::ExpressionScan { source, .. }
            | LogicalPlan::SubQuery { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::TableScan { .. }
            | LogicalPlan::TableFunctionScan { .. }
            | LogicalPlan::ExpressionScan { .. }
            | LogicalPlan::ConstantScan { .. } => vec![],
            LogicalPlan::SubQuery { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Projection { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::OperatorFunctionScan { input, .. }
            | LogicalPlan::AssertRowCount { input, .. } => vec![input.as_ref()],
            LogicalPlan::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            LogicalPlan::Concatenation { inputs } => inputs.iter().collect(),
        }
    }

    /// Rebuild this node with every child replaced by `f(child)`.
    pub fn map_children<E, F>(self, mut f: F) -> Result<LogicalPlan, E>
    where
        F: FnMut(LogicalPlan) -> Result<LogicalPlan, E>,
    {
        let boxed = |plan: Box<LogicalPlan>, f: &mut F| -> Result<Box<LogicalPlan>, E> {
            Ok(Box::new(f(*plan)?))
        };
        Ok(match self {
            LogicalPlan::SubQuery { input, source } => LogicalPlan::SubQuery { input: boxed(input, &mut f)?, source },
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter { input: boxed(input, &mut f)?, predicate },
            LogicalPlan::Projection { input, items } => LogicalPlan::Projection { input: boxed(input, &mut f)?, items },
            LogicalPlan::Aggregate { input, group_by, items } => {
                LogicalPlan::Aggregate { input: boxed(input, &mut f)?, group_by, items }
            }
            LogicalPlan::Sort { input, items } => LogicalPlan::Sort { input: boxed(input, &mut f)?, items },
            LogicalPlan::Limit { input, limit, offset } => LogicalPlan::Limit { input: boxed(input, &mut f)?, limit, offset },
            LogicalPlan::OperatorFunctionScan { input, for_clause, column } => {
                LogicalPlan::OperatorFunctionScan { input: boxed(input, &mut f)?, for_clause, column }
            }
            LogicalPlan::AssertRowCount { input, max_rows } => {
                LogicalPlan::AssertRowCount { input: boxed(input, &mut f)?, max_rows }
            }
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => {
                let left = boxed(left, &mut f)?;
                let right = boxed(right, &mut f)?;
                LogicalPlan::Join { left, right, join_type, condition, populate, outer_references }
            }
            LogicalPlan::Concatenation { inputs } => LogicalPlan::Concatenation {
                inputs: inputs.into_iter().map(&mut f).collect::<Result<Vec<_>, _>>()?,
            },
            leaf => leaf,
        })
    }

    /// Rewrite the expressions owned by this node (not its children).
    pub fn map_expressions<E, F>(self, mut f: F) -> Result<LogicalPlan, E>
    where
        F: FnMut(Expression) -> Result<Expression, E>,
    {
        let items = |items: Vec<ProjectionItem>, f: &mut F| -> Result<Vec<ProjectionItem>, E> {
            items.into_iter()
                .map(|item| Ok::<_, E>(ProjectionItem { expression: f(item.expression)?, ..item }))
                .collect()
        };
        Ok(match self {
            LogicalPlan::TableFunctionScan { source, mut function, schema } => {
                function.args = std::mem::take(&mut function.args).into_iter().map(&mut f).collect::<Result<_, _>>()?;
                LogicalPlan::TableFunctionScan { source, function, schema }
            }
            LogicalPlan::ExpressionScan { source, expression, schema } => {
                LogicalPlan::ExpressionScan { source, expression: f(expression)?, schema }
            }
            LogicalPlan::ConstantScan { columns, rows } => LogicalPlan::ConstantScan {
                columns,
                rows: rows.into_iter()
                    .map(|row| row.into_iter().map(&mut f).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<_, _>>()?,
            },
            LogicalPlan::Join { left, right, join_type, condition, populate, outer_references } => LogicalPlan::Join {
                left,
                right,
                join_type,
                condition: condition.map(&mut f).transpose()?,
                populate,
                outer_references,
            },
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter { input, predicate: f(predicate)? },
            LogicalPlan::Projection { input, items: projection } => {
                LogicalPlan::Projection { input, items: items(projection, &mut f)? }
            }
            LogicalPlan::Aggregate { input, group_by, items: aggregate } => LogicalPlan::Aggregate {
                input,
                group_by: group_by.into_iter().map(&mut f).collect::<Result<_, _>>()?,
                items: items(aggregate, &mut f)?,
            },
            LogicalPlan::Sort { input, items: sort } => LogicalPlan::Sort {
                input,
                items: sort.into_iter()
                    .map(|item| Ok::<_, E>(SortItem { expression: f(item.expression)?, order: item.order }))
                    .collect::<Result<_, E>>()?,
            },
            LogicalPlan::Limit { input, limit, offset } => LogicalPlan::Limit {
                input,
                limit: limit.map(&mut f).transpose()?,
                offset: offset.map(&mut f).transpose()?,
            },
            other => other,
        })
    }

    /// Rewrite the plans of sub-query expressions owned by this node.
    pub fn map_sub_queries<E, F>(self, f: &mut F) -> Result<LogicalPlan, E>
    where
        F: FnMut(LogicalPlan) -> Result<LogicalPlan, E>,
    {
        self.map_expressions(|expression| expression.map_sub_query_plans(f))
    }

    /// Expressions owned by this node.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            LogicalPlan::TableFunctionScan { function, .. } => function.args.iter().collect(),
            LogicalPlan::ExpressionScan { expression, .. } => vec![expression],
            LogicalPlan::ConstantScan { rows, .. } => rows.iter().flatten().collect(),
            LogicalPlan::Join { condition, .. } => condition.iter().collect(),
            LogicalPlan::Filter { predicate, .. } => vec![predicate],
            LogicalPlan::Projection { items, .. } => items.iter().map(|item| &item.expression).collect(),
            LogicalPlan::Aggregate { group_by, items, .. } => {
                group_by.iter().chain(items.iter().map(|item| &item.expression)).collect()
            }
            LogicalPlan::Sort { items, .. } => items.iter().map(|item| &item.expression).collect(),
            LogicalPlan::Limit { limit, offset, .. } => limit.iter().chain(offset.iter()).collect(),
            _ => vec![],
        }
    }

    /// Post-order plan rewrite.
    pub fn transform_up<E, F>(self, f: &mut F) -> Result<LogicalPlan, E>
    where
        F: FnMut(LogicalPlan) -> Result<LogicalPlan, E>,
    {
        let rebuilt = self.map_children(|child| child.transform_up(f))?;
        f(rebuilt)
    }

    /// Pre-order walk over this plan, not entering sub-query expressions.
    pub fn visit<'a, F: FnMut(&'a LogicalPlan)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    pub fn input(&self) -> Option<&LogicalPlan> {
        match self.children().as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    pub fn is_single_empty_row(&self) -> bool {
        matches!(self, LogicalPlan::ConstantScan { columns, rows } if columns.is_empty() && rows.len() == 1)
    }
}
