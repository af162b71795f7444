use std::{cmp::Ordering, convert::Infallible};

use crate::expr::{BinaryOp, Expression, Literal, Truth, UnaryOp};

/// Constant folding over literal operands.
///
/// Predicates fold to three-valued boolean literals (`null` for unknown);
/// arithmetic folds when it cannot overflow.
pub struct ExpressionFolder;

impl ExpressionFolder {
    pub fn fold(expression: Expression) -> Expression {
        let folded = expression.transform_up(&mut |node| Ok::<_, Infallible>(Self::fold_node(node)));
        match folded {
            Ok(expression) => expression,
            Err(never) => match never {},
        }
    }

    fn literal(expression: &Expression) -> Option<&Literal> {
        expression.as_literal()
    }

    fn truth(expression: &Expression) -> Option<Truth> {
        Self::literal(expression).and_then(Truth::of)
    }

    fn fold_node(node: Expression) -> Expression {
        match node {
            Expression::Unary { op: UnaryOp::Not, expression } => match Self::truth(&expression) {
                Some(truth) => Expression::Literal(truth.not().into_literal()),
                None => Expression::Unary { op: UnaryOp::Not, expression },
            },
            Expression::Unary { op: UnaryOp::Negate, expression } => match Self::literal(&expression) {
                Some(Literal::Int(value)) if value.checked_neg().is_some() => Expression::Literal(Literal::Int(-value)),
                Some(Literal::Float(value)) => Expression::Literal(Literal::Float(-*value)),
                Some(Literal::Null) => Expression::Literal(Literal::Null),
                _ => Expression::Unary { op: UnaryOp::Negate, expression },
            },

            Expression::Binary { op: BinaryOp::And, left, right } => {
                match (Self::truth(&left), Self::truth(&right)) {
                    (Some(a), Some(b)) => Expression::Literal(a.and(b).into_literal()),
                    (Some(Truth::False), _) | (_, Some(Truth::False)) => Expression::Literal(Literal::Bool(false)),
                    (Some(Truth::True), _) => *right,
                    (_, Some(Truth::True)) => *left,
                    _ => Expression::Binary { op: BinaryOp::And, left, right },
                }
            }
            Expression::Binary { op: BinaryOp::Or, left, right } => {
                match (Self::truth(&left), Self::truth(&right)) {
                    (Some(a), Some(b)) => Expression::Literal(a.or(b).into_literal()),
                    (Some(Truth::True), _) | (_, Some(Truth::True)) => Expression::Literal(Literal::Bool(true)),
                    (Some(Truth::False), _) => *right,
                    (_, Some(Truth::False)) => *left,
                    _ => Expression::Binary { op: BinaryOp::Or, left, right },
                }
            }
            Expression::Binary { op, left, right } => {
                let folded = match (Self::literal(&left), Self::literal(&right)) {
                    (Some(l), Some(r)) if op.is_comparison() => Some(Self::eval_compare(l, op, r).into_literal()),
                    (Some(l), Some(r)) if op.is_arithmetic() => Self::eval_arithmetic(l, op, r),
                    _ => None,
                };
                match folded {
                    Some(literal) => Expression::Literal(literal),
                    None => Expression::Binary { op, left, right },
                }
            }

            Expression::IsNull { expression, negated } => match Self::literal(&expression) {
                Some(literal) => {
                    let truth = if literal.is_null() { Truth::True } else { Truth::False };
                    Expression::Literal(if negated { truth.not() } else { truth }.into_literal())
                }
                None => Expression::IsNull { expression, negated },
            },

            Expression::Like { expression, pattern, negated } => {
                match (Self::literal(&expression), Self::literal(&pattern)) {
                    (Some(Literal::String(value)), Some(Literal::String(like))) => {
                        let truth = Self::eval_like(value, like);
                        Expression::Literal(if negated { truth.not() } else { truth }.into_literal())
                    }
                    (Some(Literal::Null), _) | (_, Some(Literal::Null)) => Expression::Literal(Literal::Null),
                    _ => Expression::Like { expression, pattern, negated },
                }
            }

            Expression::InList { expression, list, negated } => {
                let all_literals = list.iter().all(|item| Self::literal(item).is_some());
                match Self::literal(&expression) {
                    Some(value) if all_literals => {
                        // NULL in the list and no match is unknown
                        let mut has_null = false;
                        let mut found = false;
                        for item in list.iter().filter_map(Self::literal) {
                            if item.is_null() { has_null = true; }
                            else if Self::literal_equal(value, item) { found = true; break; }
                        }
                        let truth = if value.is_null() {
                            Truth::Unknown
                        } else if found {
                            Truth::True
                        } else if has_null {
                            Truth::Unknown
                        } else {
                            Truth::False
                        };
                        Expression::Literal(if negated { truth.not() } else { truth }.into_literal())
                    }
                    _ => Expression::InList { expression, list, negated },
                }
            }

            other => other,
        }
    }

    #[inline]
    fn float_eq(a: f64, b: f64) -> bool {
        let diff = (a - b).abs();
        let eps = 1e-9_f64.max(1e-9_f64 * a.abs()).max(1e-9_f64 * b.abs());
        diff <= eps
    }

    pub fn literal_equal(a: &Literal, b: &Literal) -> bool {
        match (a, b) {
            (Literal::Null, Literal::Null) => true,
            (Literal::Bool(x), Literal::Bool(y)) => x == y,
            (Literal::Int(x), Literal::Int(y)) => x == y,
            (Literal::String(x), Literal::String(y)) => x == y,
            (x, y) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => Self::float_eq(x, y),
                _ => false,
            },
        }
    }

    fn ordering(l: &Literal, r: &Literal) -> Option<Ordering> {
        match (l, r) {
            (Literal::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
            (Literal::String(a), Literal::String(b)) => Some(a.cmp(b)),
            (Literal::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
            _ => {
                let (a, b) = (l.as_f64()?, r.as_f64()?);
                if Self::float_eq(a, b) { Some(Ordering::Equal) } else { a.partial_cmp(&b) }
            }
        }
    }

    /// Compare two literals. NULL on either side is unknown, incompatible kinds are false.
    pub fn eval_compare(l: &Literal, op: BinaryOp, r: &Literal) -> Truth {
        if l.is_null() || r.is_null() {
            return Truth::Unknown;
        }
        let Some(ordering) = Self::ordering(l, r) else {
            return Truth::False;
        };
        let result = match op {
            BinaryOp::Equal => ordering == Ordering::Equal,
            BinaryOp::NotEqual => ordering != Ordering::Equal,
            BinaryOp::Less => ordering == Ordering::Less,
            BinaryOp::LessEqual => ordering != Ordering::Greater,
            BinaryOp::Greater => ordering == Ordering::Greater,
            BinaryOp::GreaterEqual => ordering != Ordering::Less,
            _ => return Truth::Unknown,
        };
        if result { Truth::True } else { Truth::False }
    }

    fn eval_arithmetic(l: &Literal, op: BinaryOp, r: &Literal) -> Option<Literal> {
        if l.is_null() || r.is_null() {
            return Some(Literal::Null);
        }
        if let (Literal::Int(a), Literal::Int(b)) = (l, r) {
            let value = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::Divide => a.checked_div(*b),
                BinaryOp::Modulo => a.checked_rem(*b),
                _ => None,
            };
            return value.map(Literal::Int);
        }
        let (a, b) = (l.as_f64()?, r.as_f64()?);
        let value = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide if b != 0.0 => a / b,
            BinaryOp::Modulo if b != 0.0 => a % b,
            _ => return None,
        };
        Literal::float(value)
    }

    /// SQL LIKE: `%` any run, `_` one character, everything else literal.
    /// Wildcards match line breaks too.
    pub fn eval_like(value: &str, pattern: &str) -> Truth {
        let mut regex = String::from("(?s)^");
        let mut buffer = [0u8; 4];
        for ch in pattern.chars() {
            match ch {
                '%' => regex.push_str(".*"),
                '_' => regex.push('.'),
                c => regex.push_str(&regex::escape(c.encode_utf8(&mut buffer))),
            }
        }
        regex.push('$');
        match regex::Regex::new(&regex) {
            Ok(re) if re.is_match(value) => Truth::True,
            Ok(_) => Truth::False,
            Err(_) => Truth::Unknown,
        }
    }
}
