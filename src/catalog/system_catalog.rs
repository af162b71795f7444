use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::{
    catalog::{Arity, Catalog, FunctionDescriptor, ReturnType, TableSchema},
    optimizer::{BindingErrorKind, ExecutionContext, PlanError},
    schema::{QualifiedName, ResolvedType},
};

pub const SYSTEM_CATALOG_ALIAS: &str = "sys";

static SCALAR_FUNCTIONS: Lazy<IndexMap<String, FunctionDescriptor>> = Lazy::new(|| {
    use Arity::*;
    use ReturnType::*;
    let string = || Fixed(ResolvedType::string());
    let functions = [
        FunctionDescriptor::aggregate("count", Exact(1), Fixed(ResolvedType::long())),
        FunctionDescriptor::aggregate("sum", Exact(1), Argument(0)),
        FunctionDescriptor::aggregate("avg", Exact(1), Fixed(ResolvedType::double())),
        FunctionDescriptor::aggregate("min", Exact(1), Argument(0)),
        FunctionDescriptor::aggregate("max", Exact(1), Argument(0)),
        FunctionDescriptor::scalar("upper", Exact(1), string()),
        FunctionDescriptor::scalar("lower", Exact(1), string()),
        FunctionDescriptor::scalar("trim", Exact(1), string()),
        FunctionDescriptor::scalar("length", Exact(1), Fixed(ResolvedType::int())),
        FunctionDescriptor::scalar("concat", AtLeast(1), string()),
        FunctionDescriptor::scalar("coalesce", AtLeast(1), Argument(0)),
        FunctionDescriptor::scalar("isnull", Exact(2), Argument(0)),
        FunctionDescriptor::scalar("abs", Exact(1), Argument(0)),
        FunctionDescriptor::scalar("map", Exact(2), ArrayOfLambda(1)).with_lambda(1, 0),
        FunctionDescriptor::scalar("filter", Exact(2), Argument(0)).with_lambda(1, 0),
        FunctionDescriptor::scalar("any", Exact(2), Fixed(ResolvedType::boolean())).with_lambda(1, 0),
    ];
    functions.into_iter().map(|descriptor| (descriptor.name.clone(), descriptor)).collect()
});

static TABLE_FUNCTIONS: Lazy<IndexMap<String, FunctionDescriptor>> = Lazy::new(|| {
    let range = FunctionDescriptor::table("range", Arity::Range(1, 2), TableSchema::of(&[("Value", ResolvedType::int())]));
    IndexMap::from([(range.name.clone(), range)])
});

/// Built-in functions. Has no tables.
pub struct SystemCatalog;

impl Catalog for SystemCatalog {
    fn name(&self) -> &str {
        SYSTEM_CATALOG_ALIAS
    }

    fn table_schema(&self, _ctx: &ExecutionContext, _catalog_alias: &str, table: &QualifiedName) -> Result<TableSchema, PlanError> {
        Err(PlanError::binding(BindingErrorKind::UnknownTable, format!("Table {} does not exist in catalog: {}", table, SYSTEM_CATALOG_ALIAS)))
    }

    fn scalar_function(&self, name: &str) -> Option<FunctionDescriptor> {
        SCALAR_FUNCTIONS.get(name.to_ascii_lowercase().as_str()).cloned()
    }

    fn table_function(&self, name: &str) -> Option<FunctionDescriptor> {
        TABLE_FUNCTIONS.get(name.to_ascii_lowercase().as_str()).cloned()
    }
}
