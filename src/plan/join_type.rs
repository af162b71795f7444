use std::fmt;

use serde::Serialize;

/// Join flavors. The apply variants are correlation boundaries: their right
/// side may read columns of the left side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JoinType {
    Inner,
    Left,
    CrossApply,
    OuterApply,
}

impl JoinType {
    pub fn is_apply(self) -> bool {
        matches!(self, JoinType::CrossApply | JoinType::OuterApply)
    }

    /// Right side can produce nulls for unmatched left rows.
    pub fn is_outer(self) -> bool {
        matches!(self, JoinType::Left | JoinType::OuterApply)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::CrossApply => "CROSS APPLY",
            JoinType::OuterApply => "OUTER APPLY",
        };
        write!(f, "{}", text)
    }
}
