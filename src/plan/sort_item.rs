use std::fmt;

use serde::Serialize;

use crate::expr::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortItem {
    pub expression: Expression,
    pub order: SortOrder,
}

impl SortItem {
    pub fn asc(expression: Expression) -> Self {
        Self { expression, order: SortOrder::Asc }
    }

    pub fn desc(expression: Expression) -> Self {
        Self { expression, order: SortOrder::Desc }
    }
}

impl fmt::Display for SortItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Asc => write!(f, "{} ASC", self.expression),
            SortOrder::Desc => write!(f, "{} DESC", self.expression),
        }
    }
}
