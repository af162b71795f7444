use std::fmt;

use serde::Serialize;

use crate::{
    expr::{BinaryOp, ColumnExpression, FunctionCallExpression, Literal, Location, SubQueryExpression, UnaryOp},
    plan::LogicalPlan,
    schema::{ColumnKey, QualifiedName, ResolvedType},
};

/// Expression tree shared by every plan node.
///
/// Raw plans carry `QualifiedName` and `Asterisk` leaves; column resolution
/// replaces them with `Column`, `Dereference` and `LambdaVariable`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    Literal(Literal),

    /// Unresolved dotted name, e.g. `a.col1` or `col1.field`
    QualifiedName { name: QualifiedName, location: Option<Location> },

    /// `*` or `alias.*`; only valid as a select item or as `count(*)`
    Asterisk { qualifier: Option<QualifiedName>, location: Option<Location> },

    Column(ColumnExpression),

    /// Field access on an object or schema-less value
    Dereference { expression: Box<Expression>, field: String, ty: ResolvedType },

    /// Identifier bound by an enclosing lambda
    LambdaVariable { name: String, ty: ResolvedType },

    Lambda { parameter: String, body: Box<Expression> },

    Unary { op: UnaryOp, expression: Box<Expression> },

    Binary { op: BinaryOp, left: Box<Expression>, right: Box<Expression> },

    IsNull { expression: Box<Expression>, negated: bool },

    Like { expression: Box<Expression>, pattern: Box<Expression>, negated: bool },

    InList { expression: Box<Expression>, list: Vec<Expression>, negated: bool },

    Function(FunctionCallExpression),

    SubQuery(SubQueryExpression),
}

impl Expression {
    pub fn data_type(&self) -> ResolvedType {
        match self {
            Expression::Literal(literal) => literal.data_type(),
            Expression::QualifiedName { .. } | Expression::Asterisk { .. } => ResolvedType::any(),
            Expression::Column(column) => column.ty.clone(),
            Expression::Dereference { ty, .. } | Expression::LambdaVariable { ty, .. } => ty.clone(),
            Expression::Lambda { body, .. } => body.data_type(),
            Expression::Unary { op: UnaryOp::Not, .. } => ResolvedType::boolean(),
            Expression::Unary { op: UnaryOp::Negate, expression } => expression.data_type(),
            Expression::Binary { op, left, right } => {
                if op.is_arithmetic() {
                    ResolvedType::promote(&left.data_type(), &right.data_type())
                } else {
                    ResolvedType::boolean()
                }
            }
            Expression::IsNull { .. } | Expression::Like { .. } | Expression::InList { .. } => ResolvedType::boolean(),
            Expression::Function(function) => function.data_type(),
            Expression::SubQuery(sub_query) => sub_query.data_type(),
        }
    }

    /// Direct child expressions. Sub-query plans are a separate scope and not included.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_)
            | Expression::QualifiedName { .. }
            | Expression::Asterisk { .. }
            | Expression::Column(_)
            | Expression::LambdaVariable { .. }
            | Expression::SubQuery(_) => vec![],
            Expression::Dereference { expression, .. }
            | Expression::Unary { expression, .. }
            | Expression::IsNull { expression, .. } => vec![expression.as_ref()],
            Expression::Lambda { body, .. } => vec![body.as_ref()],
            Expression::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Like { expression, pattern, .. } => vec![expression.as_ref(), pattern.as_ref()],
            Expression::InList { expression, list, .. } => {
                let mut children = vec![expression.as_ref()];
                children.extend(list.iter());
                children
            }
            Expression::Function(function) => function.args.iter().collect(),
        }
    }

    /// Rebuild this node with every direct child replaced by `f(child)`.
    pub fn map_children<E, F>(self, mut f: F) -> Result<Expression, E>
    where
        F: FnMut(Expression) -> Result<Expression, E>,
    {
        let boxed = |expression: Box<Expression>, f: &mut F| -> Result<Box<Expression>, E> {
            Ok(Box::new(f(*expression)?))
        };
        Ok(match self {
            Expression::Dereference { expression, field, ty } => {
                Expression::Dereference { expression: boxed(expression, &mut f)?, field, ty }
            }
            Expression::Lambda { parameter, body } => {
                Expression::Lambda { parameter, body: boxed(body, &mut f)? }
            }
            Expression::Unary { op, expression } => {
                Expression::Unary { op, expression: boxed(expression, &mut f)? }
            }
            Expression::Binary { op, left, right } => {
                let left = boxed(left, &mut f)?;
                let right = boxed(right, &mut f)?;
                Expression::Binary { op, left, right }
            }
            Expression::IsNull { expression, negated } => {
                Expression::IsNull { expression: boxed(expression, &mut f)?, negated }
            }
            Expression::Like { expression, pattern, negated } => {
                let expression = boxed(expression, &mut f)?;
                let pattern = boxed(pattern, &mut f)?;
                Expression::Like { expression, pattern, negated }
            }
            Expression::InList { expression, list, negated } => {
                let expression = boxed(expression, &mut f)?;
                let list = list.into_iter().map(&mut f).collect::<Result<Vec<_>, _>>()?;
                Expression::InList { expression, list, negated }
            }
            Expression::Function(mut function) => {
                function.args = std::mem::take(&mut function.args)
                    .into_iter()
                    .map(&mut f)
                    .collect::<Result<Vec<_>, _>>()?;
                Expression::Function(function)
            }
            leaf => leaf,
        })
    }

    /// Post-order rewrite: children first, then `f` on the rebuilt node.
    pub fn transform_up<E, F>(self, f: &mut F) -> Result<Expression, E>
    where
        F: FnMut(Expression) -> Result<Expression, E>,
    {
        let rebuilt = self.map_children(|child| child.transform_up(f))?;
        f(rebuilt)
    }

    /// Rewrite the plans of every sub-query expression in this tree.
    pub fn map_sub_query_plans<E, F>(self, f: &mut F) -> Result<Expression, E>
    where
        F: FnMut(LogicalPlan) -> Result<LogicalPlan, E>,
    {
        self.transform_up(&mut |node| match node {
            Expression::SubQuery(mut sub_query) => {
                sub_query.plan = Box::new(f(*sub_query.plan)?);
                Ok(Expression::SubQuery(sub_query))
            }
            other => Ok(other),
        })
    }

    /// Pre-order walk; does not enter sub-query plans.
    pub fn visit<'a, F: FnMut(&'a Expression)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    pub fn any<F: Fn(&Expression) -> bool>(&self, predicate: F) -> bool {
        let mut found = false;
        self.visit(&mut |expression| found = found || predicate(expression));
        found
    }

    pub fn columns(&self) -> Vec<&ColumnExpression> {
        let mut columns = Vec::new();
        self.visit(&mut |expression| {
            if let Expression::Column(column) = expression {
                columns.push(column);
            }
        });
        columns
    }

    /// Every column this expression reads, including the correlation inputs
    /// of nested sub-queries.
    pub fn column_keys(&self) -> Vec<ColumnKey> {
        let mut keys = Vec::new();
        self.visit(&mut |expression| match expression {
            Expression::Column(column) => keys.push(column.key()),
            Expression::SubQuery(sub_query) => {
                keys.extend(sub_query.outer_references.iter().map(|column| column.key()));
            }
            _ => {}
        });
        keys
    }

    pub fn contains_aggregate(&self) -> bool {
        self.any(|expression| matches!(expression, Expression::Function(function) if function.is_aggregate()))
    }

    pub fn contains_sub_query(&self) -> bool {
        self.any(|expression| matches!(expression, Expression::SubQuery(_)))
    }

    pub fn contains_null_test(&self) -> bool {
        self.any(|expression| matches!(expression, Expression::IsNull { .. }))
    }

    /// Built from literals and operators only.
    pub fn is_constant(&self) -> bool {
        !self.any(|expression| matches!(expression,
            Expression::QualifiedName { .. }
            | Expression::Asterisk { .. }
            | Expression::Column(_)
            | Expression::Dereference { .. }
            | Expression::LambdaVariable { .. }
            | Expression::Lambda { .. }
            | Expression::SubQuery(_)
        ) || matches!(expression, Expression::Function(function) if function.is_aggregate()))
    }

    pub fn as_column(&self) -> Option<&ColumnExpression> {
        match self {
            Expression::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expression::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Top-level AND operands, flattened.
    pub fn split_conjuncts(self) -> Vec<Expression> {
        match self {
            Expression::Binary { op: BinaryOp::And, left, right } => {
                let mut conjuncts = left.split_conjuncts();
                conjuncts.extend(right.split_conjuncts());
                conjuncts
            }
            other => vec![other],
        }
    }

    /// AND together `conjuncts`; `None` when there are none.
    pub fn conjunction(conjuncts: Vec<Expression>) -> Option<Expression> {
        conjuncts.into_iter().reduce(|left, right| Expression::Binary {
            op: BinaryOp::And,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Column name this expression gets when projected without an alias.
    /// Empty for computed expressions.
    pub fn output_name(&self) -> String {
        match self {
            Expression::Column(column) => column.name.clone(),
            Expression::QualifiedName { name, .. } => name.last().to_string(),
            Expression::Dereference { field, .. } => field.clone(),
            Expression::SubQuery(sub_query) => sub_query.output_name(),
            _ => String::new(),
        }
    }
}

fn fmt_operand(f: &mut fmt::Formatter<'_>, expression: &Expression) -> fmt::Result {
    match expression {
        Expression::Binary { .. } => write!(f, "({})", expression),
        _ => write!(f, "{}", expression),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::QualifiedName { name, .. } => write!(f, "{}", name),
            Expression::Asterisk { qualifier: Some(qualifier), .. } => write!(f, "{}.*", qualifier),
            Expression::Asterisk { qualifier: None, .. } => write!(f, "*"),
            Expression::Column(column) => write!(f, "{}", column),
            Expression::Dereference { expression, field, .. } => write!(f, "{}.{}", expression, field),
            Expression::LambdaVariable { name, .. } => write!(f, "{}", name),
            Expression::Lambda { parameter, body } => write!(f, "{} -> {}", parameter, body),
            Expression::Unary { op, expression } => {
                write!(f, "{}", op)?;
                fmt_operand(f, expression)
            }
            Expression::Binary { op, left, right } => {
                fmt_operand(f, left)?;
                write!(f, " {} ", op)?;
                fmt_operand(f, right)
            }
            Expression::IsNull { expression, negated } => {
                write!(f, "{} is {}null", expression, if *negated { "not " } else { "" })
            }
            Expression::Like { expression, pattern, negated } => {
                write!(f, "{} {}like {}", expression, if *negated { "not " } else { "" }, pattern)
            }
            Expression::InList { expression, list, negated } => {
                let items = list.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "{} {}in ({})", expression, if *negated { "not " } else { "" }, items)
            }
            Expression::Function(function) => write!(f, "{}", function),
            Expression::SubQuery(sub_query) => write!(f, "{}", sub_query),
        }
    }
}
