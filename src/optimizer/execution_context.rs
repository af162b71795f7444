use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

use crate::{catalog::CatalogRegistry, optimizer::OptimizerConfig};

/// Session scoped state shared by every pass of one query compilation.
#[derive(Debug)]
pub struct ExecutionContext {
    pub registry: CatalogRegistry,
    pub config: OptimizerConfig,
    pub query_id: Uuid,
    alias_counter: AtomicUsize,
}

impl ExecutionContext {
    pub fn new(registry: CatalogRegistry) -> Self {
        Self {
            registry,
            config: OptimizerConfig::default(),
            query_id: Uuid::new_v4(),
            alias_counter: AtomicUsize::new(0),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_catalog_alias(&self) -> &str {
        self.registry.default_alias()
    }

    /// Fresh internal column name, unique within this context.
    pub fn next_internal_name(&self) -> String {
        let n = self.alias_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.config.internal_column_prefix, n)
    }
}
