pub mod join_type;
pub use join_type::*;

pub mod projection_item;
pub use projection_item::*;

pub mod sort_item;
pub use sort_item::*;

pub mod logical_plan;
pub use logical_plan::*;

pub mod plan_builder;
pub use plan_builder::*;

pub mod explain;
