use std::fmt;

use serde::Serialize;

use crate::{
    catalog::{FunctionDescriptor, FunctionKind, ReturnType},
    expr::{Expression, Location},
    schema::ResolvedType,
};

/// Call of a scalar, aggregate or table function.
///
/// `descriptor` is filled in by schema resolution; before that the call is only a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCallExpression {
    pub catalog_alias: Option<String>,
    pub name: String,
    pub args: Vec<Expression>,
    pub distinct: bool,
    pub descriptor: Option<FunctionDescriptor>,
    pub location: Option<Location>,
}

impl FunctionCallExpression {
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            catalog_alias: None,
            name: name.into(),
            args,
            distinct: false,
            descriptor: None,
            location: None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.descriptor.as_ref().is_some_and(|descriptor| descriptor.kind == FunctionKind::Aggregate)
    }

    /// `count(*)` style call whose only argument is an asterisk.
    pub fn is_count_star(&self) -> bool {
        self.args.len() == 1 && matches!(self.args[0], Expression::Asterisk { .. })
    }

    pub fn data_type(&self) -> ResolvedType {
        let Some(descriptor) = &self.descriptor else {
            return ResolvedType::any();
        };
        match &descriptor.return_type {
            ReturnType::Fixed(ty) => ty.clone(),
            ReturnType::Argument(index) => self.args.get(*index)
                .map(Expression::data_type)
                .unwrap_or_else(ResolvedType::any),
            ReturnType::ArrayOfLambda(index) => match self.args.get(*index) {
                Some(Expression::Lambda { body, .. }) => ResolvedType::array(body.data_type()),
                _ => ResolvedType::array(ResolvedType::any()),
            },
            ReturnType::Any => ResolvedType::any(),
        }
    }
}

impl fmt::Display for FunctionCallExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog_alias) = &self.catalog_alias {
            write!(f, "{}#", catalog_alias)?;
        }
        let args = self.args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        write!(f, "{}({}{})", self.name, if self.distinct { "distinct " } else { "" }, args)
    }
}
