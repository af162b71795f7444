use std::fmt;

use crate::expr::Location;

/// User facing binding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingErrorKind {
    UnboundQualifier,
    UnboundAlias,
    AmbiguousColumn,
    AmbiguousAlias,
    DuplicateAlias,
    UnknownFunction,
    FunctionArity,
    UnknownCatalog,
    UnknownTable,
    UnsupportedExpressionScan,
    OrderByPositionOutOfRange,
    OrderByPositionAsterisk,
    OrderByConstant,
    MissingColumnName,
    DuplicateColumnName,
    NestedAggregate,
    SubQueryColumnCount,
    LambdaShadowing,
    InvalidExpression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingError {
    pub kind: BindingErrorKind,
    pub message: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Defect in the query
    Binding(BindingError),
    /// Defect in the optimizer; a pass found a plan it should never see
    Internal(String),
}

impl PlanError {
    pub fn binding(kind: BindingErrorKind, message: impl Into<String>) -> Self {
        PlanError::Binding(BindingError { kind, message: message.into(), location: None })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PlanError::Internal(message.into())
    }

    /// Attach a location unless one is already set.
    pub fn at(self, location: Option<Location>) -> Self {
        match self {
            PlanError::Binding(mut error) if error.location.is_none() => {
                error.location = location;
                PlanError::Binding(error)
            }
            other => other,
        }
    }

    pub fn kind(&self) -> Option<BindingErrorKind> {
        match self {
            PlanError::Binding(error) => Some(error.kind),
            PlanError::Internal(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PlanError::Binding(error) => &error.message,
            PlanError::Internal(message) => message,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, PlanError::Internal(_))
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}", self.message, location),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Binding(error) => write!(f, "{}", error),
            PlanError::Internal(message) => write!(f, "internal optimizer error: {}", message),
        }
    }
}

impl std::error::Error for BindingError {}

impl std::error::Error for PlanError {}

impl From<BindingError> for PlanError {
    fn from(error: BindingError) -> Self {
        PlanError::Binding(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let error = PlanError::binding(BindingErrorKind::UnboundQualifier, "col9 cannot be bound")
            .at(Some(Location::new(1, 8)))
            .at(Some(Location::new(2, 2)));
        assert_eq!(error.to_string(), "col9 cannot be bound at line 1, column 8");
        assert_eq!(error.kind(), Some(BindingErrorKind::UnboundQualifier));
    }

    #[test]
    fn internal_errors_have_no_kind() {
        let error = PlanError::internal("column #1.col1 not found");
        assert!(error.is_internal());
        assert_eq!(error.kind(), None);
        assert_eq!(error.to_string(), "internal optimizer error: column #1.col1 not found");
    }
}
