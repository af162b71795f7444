use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    catalog::{check_arity, unknown_function, Catalog, FunctionDescriptor, SystemCatalog, SYSTEM_CATALOG_ALIAS},
    optimizer::{BindingErrorKind, PlanError},
};

/// Catalogs visible to a session, keyed by alias.
///
/// The built-in `sys` catalog is always registered. Unqualified function names
/// are looked up in the default catalog first, then in `sys`.
#[derive(Clone)]
pub struct CatalogRegistry {
    catalogs: IndexMap<String, Arc<dyn Catalog>>,
    default_alias: String,
}

impl CatalogRegistry {
    pub fn new(default_alias: &str, default_catalog: Arc<dyn Catalog>) -> Self {
        let mut registry = Self::system_only();
        registry.default_alias = default_alias.to_ascii_lowercase();
        registry.register(default_alias, default_catalog);
        registry
    }

    /// Registry with only `sys`, which is then also the default.
    pub fn system_only() -> Self {
        let mut catalogs: IndexMap<String, Arc<dyn Catalog>> = IndexMap::new();
        catalogs.insert(SYSTEM_CATALOG_ALIAS.to_string(), Arc::new(SystemCatalog));
        Self { catalogs, default_alias: SYSTEM_CATALOG_ALIAS.to_string() }
    }

    pub fn register(&mut self, alias: &str, catalog: Arc<dyn Catalog>) {
        self.catalogs.insert(alias.to_ascii_lowercase(), catalog);
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }

    pub fn get(&self, alias: &str) -> Result<&Arc<dyn Catalog>, PlanError> {
        self.catalogs.get(&alias.to_ascii_lowercase()).ok_or_else(|| {
            PlanError::binding(BindingErrorKind::UnknownCatalog, format!("No catalog found with alias: {}", alias))
        })
    }

    pub fn default_catalog(&self) -> Result<&Arc<dyn Catalog>, PlanError> {
        self.get(&self.default_alias)
    }

    pub fn resolve_scalar_function(&self, catalog_alias: Option<&str>, name: &str, arg_count: usize) -> Result<FunctionDescriptor, PlanError> {
        if let Some(alias) = catalog_alias {
            return self.get(alias)?.resolve_scalar_function(name, arg_count);
        }
        let found = self.default_catalog()?.scalar_function(name)
            .or_else(|| self.catalogs.get(SYSTEM_CATALOG_ALIAS).and_then(|sys| sys.scalar_function(name)));
        match found {
            Some(descriptor) => check_arity(descriptor, arg_count),
            None => Err(unknown_function(&self.default_alias, name)),
        }
    }

    pub fn resolve_table_function(&self, catalog_alias: Option<&str>, name: &str, arg_count: usize) -> Result<FunctionDescriptor, PlanError> {
        if let Some(alias) = catalog_alias {
            return self.get(alias)?.resolve_table_function(name, arg_count);
        }
        let found = self.default_catalog()?.table_function(name)
            .or_else(|| self.catalogs.get(SYSTEM_CATALOG_ALIAS).and_then(|sys| sys.table_function(name)));
        match found {
            Some(descriptor) => check_arity(descriptor, arg_count),
            None => Err(unknown_function(&self.default_alias, name)),
        }
    }
}

impl fmt::Debug for CatalogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogRegistry")
            .field("catalogs", &self.catalogs.keys().collect::<Vec<_>>())
            .field("default_alias", &self.default_alias)
            .finish()
    }
}
