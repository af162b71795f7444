pub mod schema;

pub mod expr;

pub mod plan;

pub mod catalog;

pub mod optimizer;
pub use optimizer::{ExecutionContext, Optimizer, OptimizerConfig, PlanError};
