//! Core error types

use thiserror::Error;

/// A single schema violation found during validation
///
/// Violations are collected per validation pass so a user sees every
/// problem of one class in a single run instead of fixing them one by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Dotted path of the offending field (e.g. `secrets.openaiApiKey`)
    pub field: String,

    /// Human-readable reason
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Configuration failed schema validation
    #[error("configuration is invalid ({} violation(s)):\n{}", .violations.len(), format_violations(.violations))]
    Schema { violations: Vec<SchemaViolation> },

    /// A ValueSource names a key absent from both partitions
    ///
    /// Validation already checks reference closure; hitting this in the
    /// builder means a defect upstream, not bad user input.
    #[error("unresolved reference: env '{env}' in workload '{workload}' points at missing {partition} key '{key}'{}", suggestion_hint(.suggestion))]
    UnresolvedReference {
        workload: String,
        env: String,
        partition: &'static str,
        key: String,
        suggestion: Option<String>,
    },

    /// Two descriptors would disagree on a value they must share
    #[error("cross-reference conflict: {message}")]
    CrossReferenceConflict { message: String },

    #[error("failed to parse configuration YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to serialize: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build a schema error from collected violations
    pub fn schema(violations: Vec<SchemaViolation>) -> Self {
        Self::Schema { violations }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::CrossReferenceConflict {
            message: message.into(),
        }
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_violation() {
        let err = CoreError::schema(vec![
            SchemaViolation::new("frontend.containerPort", "must be in range 1-65535"),
            SchemaViolation::new("secrets.openaiApiKey", "required secret is missing"),
        ]);

        let msg = err.to_string();
        assert!(msg.contains("2 violation(s)"));
        assert!(msg.contains("frontend.containerPort"));
        assert!(msg.contains("secrets.openaiApiKey"));
    }

    #[test]
    fn test_unresolved_reference_suggestion() {
        let err = CoreError::UnresolvedReference {
            workload: "backend".to_string(),
            env: "DATABASE_URL".to_string(),
            partition: "secret",
            key: "databaseUrll".to_string(),
            suggestion: Some("databaseUrl".to_string()),
        };

        assert!(err.to_string().contains("did you mean 'databaseUrl'?"));
    }
}
