use serde::Serialize;

use crate::{
    catalog::{FunctionDescriptor, FunctionKind},
    optimizer::{BindingErrorKind, ExecutionContext, PlanError},
    schema::{CoreColumn, ColumnReference, QualifiedName, ResolvedType, Schema, TableSourceId},
};

/// Column set a catalog reports for a table or table function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TableSchema {
    Static(Vec<(String, ResolvedType)>),
    /// Columns only known at runtime
    Dynamic,
}

impl TableSchema {
    pub fn of(columns: &[(&str, ResolvedType)]) -> Self {
        TableSchema::Static(columns.iter().map(|(name, ty)| (name.to_string(), ty.clone())).collect())
    }

    /// Schema of a source reading this table.
    pub fn to_schema(&self, source: TableSourceId) -> Schema {
        match self {
            TableSchema::Static(columns) => Schema::new(
                columns.iter()
                    .map(|(name, ty)| CoreColumn::new(name.clone(), ty.clone(), ColumnReference::regular(source, name.clone())))
                    .collect(),
            ),
            TableSchema::Dynamic => Schema::asterisk(source),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, TableSchema::Dynamic)
    }
}

/// Metadata source for tables and functions.
pub trait Catalog: Send + Sync {
    fn name(&self) -> &str;

    fn table_schema(&self, ctx: &ExecutionContext, catalog_alias: &str, table: &QualifiedName) -> Result<TableSchema, PlanError>;

    fn scalar_function(&self, _name: &str) -> Option<FunctionDescriptor> {
        None
    }

    fn table_function(&self, _name: &str) -> Option<FunctionDescriptor> {
        None
    }

    /// Scalar or aggregate function accepting `arg_count` arguments.
    fn resolve_scalar_function(&self, name: &str, arg_count: usize) -> Result<FunctionDescriptor, PlanError> {
        let descriptor = self.scalar_function(name)
            .filter(|descriptor| descriptor.kind != FunctionKind::Table)
            .ok_or_else(|| unknown_function(self.name(), name))?;
        check_arity(descriptor, arg_count)
    }

    fn resolve_table_function(&self, name: &str, arg_count: usize) -> Result<FunctionDescriptor, PlanError> {
        let descriptor = self.table_function(name)
            .filter(|descriptor| descriptor.kind == FunctionKind::Table)
            .ok_or_else(|| unknown_function(self.name(), name))?;
        check_arity(descriptor, arg_count)
    }
}

pub(crate) fn unknown_function(catalog: &str, name: &str) -> PlanError {
    PlanError::binding(BindingErrorKind::UnknownFunction, format!("No function found named: {} in catalog: {}", name, catalog))
}

pub(crate) fn check_arity(descriptor: FunctionDescriptor, arg_count: usize) -> Result<FunctionDescriptor, PlanError> {
    if descriptor.arity.accepts(arg_count) {
        Ok(descriptor)
    } else {
        Err(PlanError::binding(
            BindingErrorKind::FunctionArity,
            format!("Function {} expects {} argument(s) but got {}", descriptor.name, descriptor.arity, arg_count),
        ))
    }
}
