use std::fmt;

use crate::expr::Literal;

/// Three-valued logic outcome of a folded predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn not(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }

    /// FALSE dominates, then UNKNOWN.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Truth::True, Truth::True) => Truth::True,
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    /// TRUE dominates, then UNKNOWN.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Truth::False, Truth::False) => Truth::False,
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    /// Read a literal as a predicate outcome. NULL is unknown.
    pub fn of(literal: &Literal) -> Option<Self> {
        match literal {
            Literal::Bool(true) => Some(Truth::True),
            Literal::Bool(false) => Some(Truth::False),
            Literal::Null => Some(Truth::Unknown),
            _ => None,
        }
    }

    pub fn into_literal(self) -> Literal {
        match self {
            Truth::True => Literal::Bool(true),
            Truth::False => Literal::Bool(false),
            Truth::Unknown => Literal::Null,
        }
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truth::True => write!(f, "true"),
            Truth::False => write!(f, "false"),
            Truth::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_propagates_like_sql() {
        assert_eq!(Truth::Unknown.and(Truth::False), Truth::False);
        assert_eq!(Truth::Unknown.and(Truth::True), Truth::Unknown);
        assert_eq!(Truth::Unknown.or(Truth::True), Truth::True);
        assert_eq!(Truth::Unknown.not(), Truth::Unknown);
    }

    #[test]
    fn literals_map_to_truth() {
        assert_eq!(Truth::of(&Literal::Null), Some(Truth::Unknown));
        assert_eq!(Truth::of(&Literal::Int(1)), None);
        assert_eq!(Truth::False.into_literal(), Literal::Bool(false));
    }
}
