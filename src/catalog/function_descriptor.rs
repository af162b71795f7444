use std::fmt;

use serde::Serialize;

use crate::{catalog::TableSchema, schema::ResolvedType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
    Table,
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// How the result type of a call is derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReturnType {
    Fixed(ResolvedType),
    /// Type of the argument at this index
    Argument(usize),
    /// Array of the body type of the lambda at this index
    ArrayOfLambda(usize),
    Any,
}

/// Lambda argument and the argument whose elements its parameter iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LambdaBinding {
    pub lambda_arg: usize,
    pub bound_arg: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub kind: FunctionKind,
    pub arity: Arity,
    pub return_type: ReturnType,
    pub lambda_bindings: Vec<LambdaBinding>,
    /// Output of a table function
    pub table_schema: Option<TableSchema>,
}

impl FunctionDescriptor {
    pub fn scalar(name: &str, arity: Arity, return_type: ReturnType) -> Self {
        Self {
            name: name.to_string(),
            kind: FunctionKind::Scalar,
            arity,
            return_type,
            lambda_bindings: Vec::new(),
            table_schema: None,
        }
    }

    pub fn aggregate(name: &str, arity: Arity, return_type: ReturnType) -> Self {
        Self { kind: FunctionKind::Aggregate, ..Self::scalar(name, arity, return_type) }
    }

    pub fn table(name: &str, arity: Arity, table_schema: TableSchema) -> Self {
        Self {
            kind: FunctionKind::Table,
            table_schema: Some(table_schema),
            ..Self::scalar(name, arity, ReturnType::Any)
        }
    }

    pub fn with_lambda(mut self, lambda_arg: usize, bound_arg: usize) -> Self {
        self.lambda_bindings.push(LambdaBinding { lambda_arg, bound_arg });
        self
    }

    /// Argument whose elements the lambda at `lambda_arg` iterates.
    pub fn lambda_binding(&self, lambda_arg: usize) -> Option<usize> {
        self.lambda_bindings.iter()
            .find(|binding| binding.lambda_arg == lambda_arg)
            .map(|binding| binding.bound_arg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_bounds() {
        assert!(Arity::Exact(1).accepts(1));
        assert!(!Arity::Exact(1).accepts(2));
        assert!(Arity::Range(1, 2).accepts(2));
        assert!(!Arity::Range(1, 2).accepts(0));
        assert!(Arity::AtLeast(1).accepts(7));
    }

    #[test]
    fn lambda_binding_lookup() {
        let map = FunctionDescriptor::scalar("map", Arity::Exact(2), ReturnType::ArrayOfLambda(1)).with_lambda(1, 0);
        assert_eq!(map.lambda_binding(1), Some(0));
        assert_eq!(map.lambda_binding(0), None);
    }
}
