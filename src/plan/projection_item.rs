use std::fmt;

use serde::Serialize;

use crate::expr::Expression;

/// One output column of a projection or aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionItem {
    pub expression: Expression,
    pub alias: Option<String>,
    /// Generated by the optimizer, not part of the user visible output
    pub internal: bool,
}

impl ProjectionItem {
    pub fn new(expression: Expression) -> Self {
        Self { expression, alias: None, internal: false }
    }

    pub fn aliased(expression: Expression, alias: &str) -> Self {
        Self { expression, alias: Some(alias.to_string()), internal: false }
    }

    pub fn internal(expression: Expression, name: String) -> Self {
        Self { expression, alias: Some(name), internal: true }
    }

    /// Output column name: the alias, or the name derived from the expression.
    pub fn name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expression.output_name(),
        }
    }

    pub fn is_asterisk(&self) -> bool {
        match &self.expression {
            Expression::Asterisk { .. } => true,
            Expression::Column(column) => column.is_asterisk(),
            _ => false,
        }
    }
}

impl From<Expression> for ProjectionItem {
    fn from(expression: Expression) -> Self {
        ProjectionItem::new(expression)
    }
}

impl fmt::Display for ProjectionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        if self.internal {
            write!(f, " (internal)")?;
        }
        Ok(())
    }
}
