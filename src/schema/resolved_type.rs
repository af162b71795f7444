use std::fmt;

use serde::Serialize;

use crate::schema::Schema;

/// Scalar kinds a column or expression can carry.
///
/// `Any` is used for values whose type is only known at runtime, e.g. columns
/// of schema-less sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Int,
    Long,
    Float,
    Double,
    Boolean,
    String,
    Any,
}

impl PrimitiveType {
    pub fn is_numeric(self) -> bool {
        matches!(self, PrimitiveType::Int | PrimitiveType::Long | PrimitiveType::Float | PrimitiveType::Double)
    }

    fn numeric_rank(self) -> u8 {
        match self {
            PrimitiveType::Int => 1,
            PrimitiveType::Long => 2,
            PrimitiveType::Float => 3,
            PrimitiveType::Double => 4,
            _ => 0,
        }
    }

    /// Promote two primitives to a common representative for arithmetic.
    ///
    /// Numeric types widen to the larger of both. A string operand turns the
    /// result into a string (concatenation). Everything else becomes `Any`.
    pub fn promote(a: PrimitiveType, b: PrimitiveType) -> PrimitiveType {
        use PrimitiveType::*;
        if a == b { return a; }
        match (a, b) {
            (x, y) if x.is_numeric() && y.is_numeric() => {
                if x.numeric_rank() >= y.numeric_rank() { x } else { y }
            }
            (String, _) | (_, String) => String,
            _ => Any,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::String => "string",
            PrimitiveType::Any => "any",
        };
        write!(f, "{}", text)
    }
}

/// Type of a resolved column or expression.
///
/// Table and object types let a single column carry a nested, tuple producing
/// schema (populated joins, sub query columns, object values).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResolvedType {
    Primitive(PrimitiveType),
    Array(Box<ResolvedType>),
    Table(Schema),
    Object(Schema),
}

impl ResolvedType {
    pub fn any() -> Self { ResolvedType::Primitive(PrimitiveType::Any) }
    pub fn int() -> Self { ResolvedType::Primitive(PrimitiveType::Int) }
    pub fn long() -> Self { ResolvedType::Primitive(PrimitiveType::Long) }
    pub fn float() -> Self { ResolvedType::Primitive(PrimitiveType::Float) }
    pub fn double() -> Self { ResolvedType::Primitive(PrimitiveType::Double) }
    pub fn boolean() -> Self { ResolvedType::Primitive(PrimitiveType::Boolean) }
    pub fn string() -> Self { ResolvedType::Primitive(PrimitiveType::String) }

    pub fn array(element: ResolvedType) -> Self {
        ResolvedType::Array(Box::new(element))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, ResolvedType::Primitive(PrimitiveType::Any))
    }

    /// Schema carried by table and object types.
    pub fn nested_schema(&self) -> Option<&Schema> {
        match self {
            ResolvedType::Table(schema) | ResolvedType::Object(schema) => Some(schema),
            _ => None,
        }
    }

    /// Type of one element when iterating this value: the element of an array,
    /// one row (object) of a table, `Any` otherwise.
    pub fn element_type(&self) -> ResolvedType {
        match self {
            ResolvedType::Array(element) => (**element).clone(),
            ResolvedType::Table(schema) => ResolvedType::Object(schema.clone()),
            _ => ResolvedType::any(),
        }
    }

    /// Common type of two operands of an arithmetic expression.
    pub fn promote(a: &ResolvedType, b: &ResolvedType) -> ResolvedType {
        match (a, b) {
            (ResolvedType::Primitive(x), ResolvedType::Primitive(y)) => {
                ResolvedType::Primitive(PrimitiveType::promote(*x, *y))
            }
            (x, y) if x == y => x.clone(),
            _ => ResolvedType::any(),
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Primitive(primitive) => write!(f, "{}", primitive),
            ResolvedType::Array(element) => write!(f, "array<{}>", element),
            ResolvedType::Table(schema) => write!(f, "table<{}>", schema),
            ResolvedType::Object(schema) => write!(f, "object<{}>", schema),
        }
    }
}
