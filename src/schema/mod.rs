pub mod qualified_name;
pub use qualified_name::*;

pub mod resolved_type;
pub use resolved_type::*;

pub mod table_source_reference;
pub use table_source_reference::*;

pub mod column_reference;
pub use column_reference::*;

pub mod column_key;
pub use column_key::*;

pub mod core_column;
pub use core_column::*;

pub mod core_schema;
pub use core_schema::*;
