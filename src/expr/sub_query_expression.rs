use std::fmt;

use serde::Serialize;

use crate::{
    expr::Location,
    plan::LogicalPlan,
    schema::{CoreColumn, ResolvedType, Schema},
};

/// Output clause turning a sub-query's rows into one structured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ForClause {
    /// First row as an object
    Object,
    /// Values of the single column as an array
    Array,
    /// All rows as an array of objects
    ObjectArray,
}

/// A sub-query used as a value inside an expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubQueryExpression {
    pub plan: Box<LogicalPlan>,
    pub for_clause: Option<ForClause>,
    /// Columns of enclosing scopes read by `plan`, set by column resolution
    pub outer_references: Vec<CoreColumn>,
    pub location: Option<Location>,
}

impl SubQueryExpression {
    pub fn new(plan: LogicalPlan) -> Self {
        Self { plan: Box::new(plan), for_clause: None, outer_references: Vec::new(), location: None }
    }

    pub fn is_correlated(&self) -> bool {
        !self.outer_references.is_empty()
    }

    /// Columns a scalar context can read from the sub-query.
    pub fn value_columns(&self) -> Vec<CoreColumn> {
        self.plan.schema().visible().filter(|column| !column.is_asterisk()).cloned().collect()
    }

    pub fn data_type(&self) -> ResolvedType {
        let schema = self.plan.schema();
        match self.for_clause {
            None => match self.value_columns().as_slice() {
                [single] => single.ty.clone(),
                _ => ResolvedType::any(),
            },
            Some(for_clause) => for_clause.result_type(&schema),
        }
    }

    /// Display name of the value; the name of the single produced column.
    pub fn output_name(&self) -> String {
        match self.value_columns().as_slice() {
            [single] if self.for_clause.is_none() => single.name.clone(),
            _ => String::new(),
        }
    }
}

impl ForClause {
    /// Type of the single value built from rows of `schema`.
    pub fn result_type(&self, schema: &Schema) -> ResolvedType {
        let visible = Schema::new(schema.visible().cloned().collect());
        match self {
            ForClause::Object => ResolvedType::Object(visible),
            ForClause::Array => ResolvedType::array(
                visible.columns.first().map(|column| column.ty.clone()).unwrap_or_else(ResolvedType::any),
            ),
            ForClause::ObjectArray => ResolvedType::array(ResolvedType::Object(visible)),
        }
    }
}

impl fmt::Display for ForClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForClause::Object => write!(f, "for object"),
            ForClause::Array => write!(f, "for array"),
            ForClause::ObjectArray => write!(f, "for object_array"),
        }
    }
}

impl fmt::Display for SubQueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(subquery")?;
        if let Some(for_clause) = self.for_clause {
            write!(f, " {}", for_clause)?;
        }
        if !self.outer_references.is_empty() {
            let names = self.outer_references.iter().map(|column| column.name.as_str()).collect::<Vec<_>>().join(", ");
            write!(f, " outer: {}", names)?;
        }
        write!(f, ")")
    }
}
