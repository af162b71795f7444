use ordered_float::NotNan;
use serde::Serialize;
use std::fmt::{self, Display};

use crate::schema::ResolvedType;

#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(NotNan<f64>),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn float(value: f64) -> Option<Self> {
        NotNan::new(value).ok().map(Literal::Float)
    }

    pub fn data_type(&self) -> ResolvedType {
        match self {
            Literal::String(_) => ResolvedType::string(),
            Literal::Int(_) => ResolvedType::long(),
            Literal::Float(_) => ResolvedType::double(),
            Literal::Bool(_) => ResolvedType::boolean(),
            Literal::Null => ResolvedType::any(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(value) => Some(*value as f64),
            Literal::Float(value) => Some(value.into_inner()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(n) => write!(f, "{}", n.into_inner()),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(_) => write!(f, "String({})", self),
            Literal::Int(_) => write!(f, "Int({})", self),
            Literal::Float(_) => write!(f, "Float({})", self),
            Literal::Bool(_) => write!(f, "Bool({})", self),
            Literal::Null => write!(f, "Null"),
        }
    }
}
