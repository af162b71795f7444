use indexmap::IndexMap;

use crate::{
    catalog::{Catalog, FunctionDescriptor, FunctionKind, TableSchema},
    optimizer::{BindingErrorKind, ExecutionContext, PlanError},
    schema::{QualifiedName, ResolvedType},
};

/// In-memory table and function registry.
///
/// Unknown tables are schema-less unless the catalog is `strict`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    name: String,
    tables: IndexMap<String, TableSchema>,
    functions: IndexMap<String, FunctionDescriptor>,
    strict: bool,
}

impl MemoryCatalog {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub fn with_table(mut self, name: &str, columns: &[(&str, ResolvedType)]) -> Self {
        self.tables.insert(name.to_ascii_lowercase(), TableSchema::of(columns));
        self
    }

    pub fn with_schema_less_table(mut self, name: &str) -> Self {
        self.tables.insert(name.to_ascii_lowercase(), TableSchema::Dynamic);
        self
    }

    pub fn with_function(mut self, descriptor: FunctionDescriptor) -> Self {
        self.functions.insert(descriptor.name.to_ascii_lowercase(), descriptor);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn function(&self, name: &str, table: bool) -> Option<FunctionDescriptor> {
        self.functions.get(&name.to_ascii_lowercase())
            .filter(|descriptor| (descriptor.kind == FunctionKind::Table) == table)
            .cloned()
    }
}

impl Catalog for MemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn table_schema(&self, _ctx: &ExecutionContext, catalog_alias: &str, table: &QualifiedName) -> Result<TableSchema, PlanError> {
        let key = table.to_string().to_ascii_lowercase();
        match self.tables.get(&key) {
            Some(schema) => Ok(schema.clone()),
            None if self.strict => Err(PlanError::binding(
                BindingErrorKind::UnknownTable,
                format!("Table {} does not exist in catalog: {}", table, catalog_alias),
            )),
            None => Ok(TableSchema::Dynamic),
        }
    }

    fn scalar_function(&self, name: &str) -> Option<FunctionDescriptor> {
        self.function(name, false)
    }

    fn table_function(&self, name: &str) -> Option<FunctionDescriptor> {
        self.function(name, true)
    }
}
