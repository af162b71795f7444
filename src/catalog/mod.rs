pub mod function_descriptor;
pub use function_descriptor::*;

pub mod provider;
pub use provider::*;

pub mod catalog_registry;
pub use catalog_registry::*;

pub mod system_catalog;
pub use system_catalog::*;

pub mod memory_catalog;
pub use memory_catalog::*;
