use serde::{Deserialize, Serialize};

/// Switches and limits of the optimizer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub predicate_push_down: bool,
    pub projection_push_down: bool,
    pub fold_constants: bool,
    /// Upper bound of sub-query elimination rounds in projection push down
    pub max_projection_push_down_iterations: usize,
    /// Prefix of generated internal column names
    pub internal_column_prefix: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            predicate_push_down: true,
            projection_push_down: true,
            fold_constants: true,
            max_projection_push_down_iterations: 16,
            internal_column_prefix: "__expr".to_string(),
        }
    }
}

impl OptimizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding and ordinal resolution only, no push downs.
    pub fn resolution_only() -> Self {
        Self {
            predicate_push_down: false,
            projection_push_down: false,
            ..Self::default()
        }
    }

    pub fn without_constant_folding(mut self) -> Self {
        self.fold_constants = false;
        self
    }

    /// Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_keeps_defaults_for_missing_keys() {
        let config = OptimizerConfig::from_json(r#"{ "projection_push_down": false, "internal_column_prefix": "__c" }"#).unwrap();
        assert!(!config.projection_push_down);
        assert!(config.predicate_push_down);
        assert_eq!(config.max_projection_push_down_iterations, 16);
        assert_eq!(config.internal_column_prefix, "__c");
    }

    #[test]
    fn from_json_rejects_wrong_types() {
        assert!(OptimizerConfig::from_json(r#"{ "fold_constants": "yes" }"#).is_err());
    }
}
