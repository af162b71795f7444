use crate::{
    expr::{BinaryOp, Expression, ForClause, FunctionCallExpression, Literal, SubQueryExpression, UnaryOp},
    plan::LogicalPlan,
    schema::QualifiedName,
};

impl From<i64> for Literal {
    fn from(value: i64) -> Self { Literal::Int(value) }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self { Literal::Int(value as i64) }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self { Literal::float(value).unwrap_or(Literal::Null) }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self { Literal::Bool(value) }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self { Literal::String(value.to_string()) }
}

impl From<String> for Literal {
    fn from(value: String) -> Self { Literal::String(value) }
}

pub fn lit(value: impl Into<Literal>) -> Expression {
    Expression::Literal(value.into())
}

pub fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

/// Unresolved dotted name.
pub fn name(text: &str) -> Expression {
    Expression::QualifiedName { name: QualifiedName::of(text), location: None }
}

pub fn asterisk() -> Expression {
    Expression::Asterisk { qualifier: None, location: None }
}

pub fn qualified_asterisk(qualifier: &str) -> Expression {
    Expression::Asterisk { qualifier: Some(QualifiedName::of(qualifier)), location: None }
}

pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary { op, left: Box::new(left), right: Box::new(right) }
}

pub fn eq(left: Expression, right: Expression) -> Expression { binary(BinaryOp::Equal, left, right) }
pub fn ne(left: Expression, right: Expression) -> Expression { binary(BinaryOp::NotEqual, left, right) }
pub fn gt(left: Expression, right: Expression) -> Expression { binary(BinaryOp::Greater, left, right) }
pub fn ge(left: Expression, right: Expression) -> Expression { binary(BinaryOp::GreaterEqual, left, right) }
pub fn lt(left: Expression, right: Expression) -> Expression { binary(BinaryOp::Less, left, right) }
pub fn le(left: Expression, right: Expression) -> Expression { binary(BinaryOp::LessEqual, left, right) }
pub fn and(left: Expression, right: Expression) -> Expression { binary(BinaryOp::And, left, right) }
pub fn or(left: Expression, right: Expression) -> Expression { binary(BinaryOp::Or, left, right) }
pub fn add(left: Expression, right: Expression) -> Expression { binary(BinaryOp::Add, left, right) }

pub fn not(expression: Expression) -> Expression {
    Expression::Unary { op: UnaryOp::Not, expression: Box::new(expression) }
}

pub fn is_null(expression: Expression) -> Expression {
    Expression::IsNull { expression: Box::new(expression), negated: false }
}

pub fn is_not_null(expression: Expression) -> Expression {
    Expression::IsNull { expression: Box::new(expression), negated: true }
}

pub fn call(function: &str, args: Vec<Expression>) -> Expression {
    Expression::Function(FunctionCallExpression::new(function, args))
}

pub fn count_star() -> Expression {
    call("count", vec![asterisk()])
}

pub fn lambda(parameter: &str, body: Expression) -> Expression {
    Expression::Lambda { parameter: parameter.to_string(), body: Box::new(body) }
}

pub fn sub_query(plan: LogicalPlan) -> Expression {
    Expression::SubQuery(SubQueryExpression::new(plan))
}

pub fn sub_query_for(plan: LogicalPlan, for_clause: ForClause) -> Expression {
    let mut sub_query = SubQueryExpression::new(plan);
    sub_query.for_clause = Some(for_clause);
    Expression::SubQuery(sub_query)
}
