//! Configuration schema validation
//!
//! Validation runs in ordered passes. Each pass collects *all* violations
//! of its class before failing, so a user sees every problem of one kind
//! in a single run; passes themselves short-circuit (there is no point
//! range-checking a section that does not exist).
//!
//! Pass order:
//! 1. workload fields: names, image, ranges, exposure, probes, env shape
//! 2. required secrets present with non-empty values
//! 3. partition disjointness (no key in both `config` and `secrets`)
//! 4. reference closure: every env reference resolves into a partition

use regex::Regex;
use std::sync::OnceLock;

use crate::config::{ExposureKind, ReleaseConfiguration, ValueSource, WorkloadSpec};
use crate::error::{CoreError, Result, SchemaViolation};

/// Maximum Levenshtein distance for "did you mean" suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// DNS-1123 label: what workload and service names must look like
fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"))
}

/// Whether a string is a valid DNS-1123 label (release, workload and
/// service names all share this rule)
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Fixed schema rules beyond what the types express
#[derive(Debug, Clone, Default)]
pub struct SchemaRules {
    /// Secret keys that must be present with non-empty values even when
    /// nothing references them yet
    pub required_secrets: Vec<String>,

    /// Config keys that must be present
    pub required_config: Vec<String>,
}

impl SchemaRules {
    pub fn with_required_secrets<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_secrets: keys.into_iter().map(Into::into).collect(),
            required_config: Vec::new(),
        }
    }
}

/// Validates a typed `ReleaseConfiguration` against the fixed schema
///
/// Pure: no side effects, same input always produces the same report.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    rules: SchemaRules,
}

impl SchemaValidator {
    pub fn new(rules: SchemaRules) -> Self {
        Self { rules }
    }

    /// Run all validation passes
    pub fn validate(&self, config: &ReleaseConfiguration) -> Result<()> {
        let passes: [fn(&Self, &ReleaseConfiguration) -> Vec<SchemaViolation>; 4] = [
            Self::check_workload_fields,
            Self::check_required_secrets,
            Self::check_partition_disjointness,
            Self::check_reference_closure,
        ];

        for pass in passes {
            let violations = pass(self, config);
            if !violations.is_empty() {
                return Err(CoreError::schema(violations));
            }
        }

        Ok(())
    }

    fn check_workload_fields(&self, config: &ReleaseConfiguration) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        for (section, workload) in [("frontend", &config.frontend), ("backend", &config.backend)] {
            check_workload(section, workload, &mut violations);
        }
        violations
    }

    fn check_required_secrets(&self, config: &ReleaseConfiguration) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();

        for key in &self.rules.required_secrets {
            match config.secrets.get(key) {
                None => violations.push(SchemaViolation::new(
                    format!("secrets.{}", key),
                    "required secret is missing",
                )),
                Some(v) if v.is_empty() => violations.push(SchemaViolation::new(
                    format!("secrets.{}", key),
                    "required secret has an empty value",
                )),
                _ => {}
            }
        }
        for key in &self.rules.required_config {
            if !config.config.contains_key(key) {
                violations.push(SchemaViolation::new(
                    format!("config.{}", key),
                    "required config key is missing",
                ));
            }
        }

        // A referenced secret that is present but empty is as good as
        // missing for the workload that needs it.
        for workload in config.workloads() {
            for env in &workload.env {
                if let ValueSource::SecretKey(key) = &env.source {
                    if config.secrets.get(key).is_some_and(|v| v.is_empty()) {
                        violations.push(SchemaViolation::new(
                            format!("secrets.{}", key),
                            format!("referenced by env '{}' but empty", env.name),
                        ));
                    }
                }
            }
        }

        violations
    }

    fn check_partition_disjointness(&self, config: &ReleaseConfiguration) -> Vec<SchemaViolation> {
        config
            .secrets
            .keys()
            .filter(|key| config.config.contains_key(*key))
            .map(|key| {
                SchemaViolation::new(
                    format!("secrets.{}", key),
                    "key exists in both 'config' and 'secrets'",
                )
            })
            .collect()
    }

    fn check_reference_closure(&self, config: &ReleaseConfiguration) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();

        for (section, workload) in [("frontend", &config.frontend), ("backend", &config.backend)] {
            for env in &workload.env {
                let (partition, key, known): (&str, &str, Vec<&String>) = match &env.source {
                    ValueSource::Literal(_) => continue,
                    ValueSource::ConfigKey(key) => {
                        ("config", key, config.config.keys().collect())
                    }
                    ValueSource::SecretKey(key) => {
                        ("secrets", key, config.secrets.keys().collect())
                    }
                };

                // Keys derived by the resolver (service URLs) are injected
                // into the config partition later; they resolve by
                // construction.
                if partition == "config" && is_derived_key(config, key) {
                    continue;
                }

                if !known.iter().any(|k| k.as_str() == key) {
                    let mut reason = format!(
                        "env '{}' in {} references a key absent from '{}'",
                        env.name, section, partition
                    );
                    if let Some(suggestion) = suggest(key, &known) {
                        reason.push_str(&format!(" (did you mean '{}'?)", suggestion));
                    }
                    violations.push(SchemaViolation::new(
                        format!("{}.{}", partition, key),
                        reason,
                    ));
                }
            }
        }

        violations
    }
}

/// Config keys the cross-reference resolver materializes itself
pub fn derived_config_keys(config: &ReleaseConfiguration) -> Vec<String> {
    config
        .workloads()
        .iter()
        .map(|w| format!("{}Url", w.name))
        .collect()
}

fn is_derived_key(config: &ReleaseConfiguration, key: &str) -> bool {
    derived_config_keys(config).iter().any(|k| k == key)
}

fn check_workload(section: &str, workload: &WorkloadSpec, violations: &mut Vec<SchemaViolation>) {
    let field = |name: &str| format!("{}.{}", section, name);

    if workload.name.is_empty() {
        violations.push(SchemaViolation::new(field("name"), "name must not be empty"));
    } else if !name_pattern().is_match(&workload.name) {
        violations.push(SchemaViolation::new(
            field("name"),
            format!("'{}' is not a valid DNS-1123 label", workload.name),
        ));
    }

    if workload.image.repository.is_empty() {
        violations.push(SchemaViolation::new(
            field("image.repository"),
            "image repository must not be empty",
        ));
    }
    if workload.image.tag.is_empty() {
        violations.push(SchemaViolation::new(
            field("image.tag"),
            "image tag must not be empty",
        ));
    }

    if workload.replica_count < 0 {
        violations.push(SchemaViolation::new(
            field("replicaCount"),
            format!("must be >= 0, got {}", workload.replica_count),
        ));
    }

    if !port_in_range(workload.container_port) {
        violations.push(SchemaViolation::new(
            field("containerPort"),
            format!("must be in range 1-65535, got {}", workload.container_port),
        ));
    }

    if let Some(expose) = &workload.expose {
        if let Some(port) = expose.port {
            if !port_in_range(port) {
                violations.push(SchemaViolation::new(
                    field("expose.port"),
                    format!("must be in range 1-65535, got {}", port),
                ));
            }
        }
        match (expose.kind, expose.external_port) {
            (ExposureKind::External, None) => violations.push(SchemaViolation::new(
                field("expose.externalPort"),
                "externally reachable services must declare externalPort",
            )),
            (_, Some(port)) if !port_in_range(port) => violations.push(SchemaViolation::new(
                field("expose.externalPort"),
                format!("must be in range 1-65535, got {}", port),
            )),
            _ => {}
        }
    }

    for probe in [&workload.probes.liveness, &workload.probes.readiness]
        .into_iter()
        .flatten()
    {
        if probe.failure_threshold == 0 {
            violations.push(SchemaViolation::new(
                field("probes.failureThreshold"),
                "failure threshold must be >= 1",
            ));
        }
        if let Some(port) = probe.port {
            if !port_in_range(port) {
                violations.push(SchemaViolation::new(
                    field("probes.port"),
                    format!("must be in range 1-65535, got {}", port),
                ));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    for env in &workload.env {
        if env.name.is_empty() {
            violations.push(SchemaViolation::new(
                field("env.name"),
                "environment variable name must not be empty",
            ));
        }
        if !seen.insert(env.name.as_str()) {
            violations.push(SchemaViolation::new(
                field(&format!("env.{}", env.name)),
                "duplicate environment variable",
            ));
        }
    }
}

fn port_in_range(port: i64) -> bool {
    (1..=65535).contains(&port)
}

/// Closest known key within the suggestion distance, if any
fn suggest(input: &str, known: &[&String]) -> Option<String> {
    known
        .iter()
        .map(|k| (strsim::levenshtein(input, k), *k))
        .filter(|(d, _)| *d <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(d, _)| *d)
        .map(|(_, k)| k.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures;

    fn validator() -> SchemaValidator {
        SchemaValidator::new(SchemaRules::with_required_secrets(["openaiApiKey"]))
    }

    #[test]
    fn test_valid_configuration_passes() {
        validator().validate(&fixtures::two_tier()).unwrap();
    }

    #[test]
    fn test_missing_required_secret_named_exactly() {
        let mut cfg = fixtures::two_tier();
        cfg.secrets.shift_remove("openaiApiKey");
        // Drop the env reference too, so only the required-secret pass fires.
        cfg.backend.env.retain(|e| e.name != "OPENAI_API_KEY");

        let err = validator().validate(&cfg).unwrap_err();
        let CoreError::Schema { violations } = err else {
            panic!("expected schema error");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "secrets.openaiApiKey");
    }

    #[test]
    fn test_field_violations_batched() {
        let mut cfg = fixtures::two_tier();
        cfg.frontend.container_port = 0;
        cfg.backend.replica_count = -1;
        cfg.backend.name = "Not_Valid".to_string();

        let err = validator().validate(&cfg).unwrap_err();
        let CoreError::Schema { violations } = err else {
            panic!("expected schema error");
        };
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"frontend.containerPort"));
        assert!(fields.contains(&"backend.replicaCount"));
        assert!(fields.contains(&"backend.name"));
    }

    #[test]
    fn test_key_in_both_partitions_rejected() {
        let mut cfg = fixtures::two_tier();
        cfg.config
            .insert("databaseUrl".to_string(), "not-a-secret".to_string());

        let err = validator().validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("both 'config' and 'secrets'"));
    }

    #[test]
    fn test_dangling_reference_gets_suggestion() {
        let mut cfg = fixtures::two_tier();
        cfg.backend.env[0].source = ValueSource::SecretKey("databaseUri".to_string());

        let err = validator().validate(&cfg).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("secrets.databaseUri"));
        assert!(msg.contains("did you mean 'databaseUrl'?"));
    }

    #[test]
    fn test_external_exposure_requires_external_port() {
        let mut cfg = fixtures::two_tier();
        cfg.frontend.expose.as_mut().unwrap().external_port = None;

        let err = validator().validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("frontend.expose.externalPort"));
    }

    #[test]
    fn test_derived_url_keys_resolve_by_construction() {
        // frontendUrl/backendUrl are injected by the resolver and must not
        // trip the closure check even though they are absent from `config`.
        let cfg = fixtures::two_tier();
        assert!(!cfg.config.contains_key("backendUrl"));
        validator().validate(&cfg).unwrap();
    }

    #[test]
    fn test_empty_referenced_secret_rejected() {
        let mut cfg = fixtures::two_tier();
        cfg.secrets.insert("databaseUrl".to_string(), String::new());

        let err = validator().validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("referenced by env 'DATABASE_URL' but empty"));
    }

    #[test]
    fn test_scale_to_zero_is_valid() {
        let mut cfg = fixtures::two_tier();
        cfg.frontend.replica_count = 0;
        validator().validate(&cfg).unwrap();
    }
}
