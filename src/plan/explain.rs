use std::fmt::{self, Write};

use crate::{expr::Expression, plan::LogicalPlan};

fn join_list<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl LogicalPlan {
    /// One line description of this node.
    pub fn label(&self) -> String {
        match self {
            LogicalPlan::TableScan { source, columns, schema } => {
                let mut text = format!("Scan: {}", source);
                match columns {
                    Some(columns) => { let _ = write!(text, " [{}]", columns.join(", ")); }
                    None if schema.as_ref().is_some_and(|schema| schema.has_asterisk()) => text.push_str(" [*]"),
                    None => {}
                }
                text
            }
            LogicalPlan::TableFunctionScan { source, function, .. } => format!("Function scan: {} {}", function, source),
            LogicalPlan::ExpressionScan { source, expression, .. } => format!("Expression scan: {} {}", expression, source),
            LogicalPlan::ConstantScan { columns, rows } => format!("Constant scan: [{}] rows: {}", columns.join(", "), rows.len()),
            LogicalPlan::SubQuery { source, .. } => format!("Sub query: {}", source),
            LogicalPlan::Join { join_type, condition, populate, outer_references, .. } => {
                let mut text = format!("{}", join_type);
                if let Some(condition) = condition {
                    let _ = write!(text, " ON {}", condition);
                }
                if let Some(alias) = populate {
                    let _ = write!(text, " POPULATE {}", alias);
                }
                if !outer_references.is_empty() {
                    let names = outer_references.iter().map(|column| column.name.as_str()).collect::<Vec<_>>();
                    let _ = write!(text, " outer: [{}]", names.join(", "));
                }
                text
            }
            LogicalPlan::Filter { predicate, .. } => format!("Filter: {}", predicate),
            LogicalPlan::Projection { items, .. } => format!("Projection: {}", join_list(items)),
            LogicalPlan::Aggregate { group_by, items, .. } => {
                format!("Aggregate: group by [{}] {}", join_list(group_by), join_list(items))
            }
            LogicalPlan::Sort { items, .. } => format!("Sort: {}", join_list(items)),
            LogicalPlan::Limit { limit, offset, .. } => {
                let show = |value: &Option<Expression>| value.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string());
                format!("Limit: {} offset {}", show(limit), show(offset))
            }
            LogicalPlan::Concatenation { inputs } => format!("Concatenation: {} inputs", inputs.len()),
            LogicalPlan::OperatorFunctionScan { for_clause, column, .. } => format!("Operator function scan: {} AS {}", for_clause, column),
            LogicalPlan::AssertRowCount { max_rows, .. } => format!("Assert row count: <= {}", max_rows),
        }
    }

    /// Indented text tree, two spaces per level.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), self.label());
        for child in self.children() {
            child.explain_into(out, depth + 1);
        }
    }

    pub fn explain_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}
