pub mod plan_error;
pub use plan_error::*;

pub mod config;
pub use config::*;

pub mod execution_context;
pub use execution_context::*;

pub mod logical_plan_optimizer;
pub use logical_plan_optimizer::*;

pub mod lambda_scope;
pub use lambda_scope::*;

pub mod binding_scope;
pub use binding_scope::*;

pub mod schema_resolver;
pub use schema_resolver::*;

pub mod column_resolver;
pub use column_resolver::*;

pub mod computed_expression_push_down;
pub use computed_expression_push_down::*;

pub mod sub_query_expression_push_down;
pub use sub_query_expression_push_down::*;

pub mod predicate_push_down;
pub use predicate_push_down::*;

pub mod projection_push_down;
pub use projection_push_down::*;

pub mod column_ordinal_resolver;
pub use column_ordinal_resolver::*;

#[cfg(test)]
pub mod fixtures;
