pub mod location;
pub use location::*;

pub mod literal;
pub use literal::*;

pub mod truth;
pub use truth::*;

pub mod operators;
pub use operators::*;

pub mod column_expression;
pub use column_expression::*;

pub mod function_call;
pub use function_call::*;

pub mod sub_query_expression;
pub use sub_query_expression::*;

pub mod expression;
pub use expression::*;

pub mod folder;
pub use folder::*;

pub mod builders;
pub use builders::*;
