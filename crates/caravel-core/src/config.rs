//! Typed release configuration
//!
//! The raw YAML document an operator supplies is deserialized into
//! `ReleaseConfiguration` exactly once, at the boundary. Nothing past that
//! boundary works with untyped mappings.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, Result, SchemaViolation};

/// The root input: everything needed to render one release
///
/// Owned exclusively by the caller; descriptors are re-rendered from it,
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseConfiguration {
    /// Frontend tier workload
    pub frontend: WorkloadSpec,

    /// Backend tier workload
    pub backend: WorkloadSpec,

    /// Non-sensitive key/value configuration
    #[serde(default)]
    pub config: IndexMap<String, String>,

    /// Sensitive key/value configuration
    #[serde(default)]
    pub secrets: IndexMap<String, String>,
}

impl ReleaseConfiguration {
    /// Load a configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from a YAML string
    ///
    /// Missing top-level sections are reported together as schema
    /// violations rather than as a single serde error, so an operator sees
    /// every structural problem in one pass.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        let mut violations = Vec::new();
        for section in ["frontend", "backend"] {
            match raw.get(section) {
                None => violations.push(SchemaViolation::new(
                    section,
                    "required section is missing",
                )),
                Some(v) if !v.is_mapping() => violations.push(SchemaViolation::new(
                    section,
                    "section must be a mapping",
                )),
                _ => {}
            }
        }
        for section in ["config", "secrets"] {
            if let Some(v) = raw.get(section) {
                if !v.is_mapping() && !v.is_null() {
                    violations.push(SchemaViolation::new(section, "section must be a mapping"));
                }
            }
        }
        if !violations.is_empty() {
            return Err(CoreError::schema(violations));
        }

        // A section header with nothing under it (`config:`) parses as
        // null; treat it as an empty mapping.
        if let serde_yaml::Value::Mapping(map) = &mut raw {
            for section in ["config", "secrets"] {
                if map.get(section).is_some_and(serde_yaml::Value::is_null) {
                    map.insert(section.into(), serde_yaml::Mapping::new().into());
                }
            }
        }

        Ok(serde_yaml::from_value(raw)?)
    }

    /// Workloads in declaration order (frontend first)
    ///
    /// Every consumer that iterates workloads goes through this so apply
    /// ordering stays deterministic.
    pub fn workloads(&self) -> [&WorkloadSpec; 2] {
        [&self.frontend, &self.backend]
    }
}

/// One deployable tier of the release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Workload name; also the name of its service and deployment
    pub name: String,

    /// Container image
    pub image: ImageSpec,

    /// Desired replica count (0 is valid: scale-to-zero)
    #[serde(default = "default_replicas")]
    pub replica_count: i64,

    /// Port the container listens on
    pub container_port: i64,

    /// CPU/memory requests and limits
    #[serde(default)]
    pub resources: ResourceLimits,

    /// Environment bindings, in declaration order
    #[serde(default)]
    pub env: Vec<EnvVar>,

    /// Liveness/readiness probe contract
    #[serde(default)]
    pub probes: ProbeConfig,

    /// Service exposure; `None` means no service is rendered
    #[serde(default)]
    pub expose: Option<ExposureSpec>,
}

fn default_replicas() -> i64 {
    1
}

/// Container image reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Image repository (e.g. `ghcr.io/acme/frontend`)
    pub repository: String,

    /// Image tag
    pub tag: String,

    #[serde(default)]
    pub pull_policy: PullPolicy,
}

impl ImageSpec {
    /// Full image reference, formatted in exactly one place
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Image pull policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PullPolicy {
    #[default]
    IfNotPresent,
    Always,
    Never,
}

impl std::fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IfNotPresent => write!(f, "IfNotPresent"),
            Self::Always => write!(f, "Always"),
            Self::Never => write!(f, "Never"),
        }
    }
}

/// Resource requests and limits for a workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            cpu_limit: "500m".to_string(),
            memory_request: "128Mi".to_string(),
            memory_limit: "256Mi".to_string(),
        }
    }
}

/// A single environment binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Environment variable name (e.g. `DATABASE_URL`)
    pub name: String,

    /// Where the value comes from
    #[serde(flatten)]
    pub source: ValueSource,
}

/// A typed reference indicating where a configuration value lives
///
/// Resolving a source never requires knowing which storage backend holds
/// the value; the partition tag and key are enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    /// Inline literal value
    Literal(String),

    /// Reference into the non-secret partition
    ConfigKey(String),

    /// Reference into the secret partition
    SecretKey(String),
}

impl ValueSource {
    /// Partition name for error messages, if this is a reference
    pub fn partition(&self) -> Option<&'static str> {
        match self {
            Self::Literal(_) => None,
            Self::ConfigKey(_) => Some("config"),
            Self::SecretKey(_) => Some("secret"),
        }
    }
}

/// Probe contract for a workload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Gates instance replacement
    #[serde(default)]
    pub liveness: Option<ProbeSpec>,

    /// Gates traffic admission
    #[serde(default)]
    pub readiness: Option<ProbeSpec>,
}

/// A single liveness or readiness probe specification
///
/// Caravel only declares the contract; the external supervisor runs the
/// probes and reports outcomes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    /// HTTP path to probe
    #[serde(default = "default_probe_path")]
    pub path: String,

    /// Port to probe; defaults to the workload's container port
    #[serde(default)]
    pub port: Option<i64>,

    /// Delay before the first probe fires
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Interval between probes
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,

    /// Consecutive failures before the probe outcome takes effect
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            port: None,
            initial_delay: default_initial_delay(),
            period: default_period(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_probe_path() -> String {
    "/health".to_string()
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_period() -> Duration {
    Duration::from_secs(10)
}

fn default_failure_threshold() -> u32 {
    3
}

/// How a workload's service is reachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureSpec {
    #[serde(default)]
    pub kind: ExposureKind,

    /// Service port; defaults to the container port
    #[serde(default)]
    pub port: Option<i64>,

    /// Externally reachable port; required when `kind` is `External`,
    /// unique across the whole release
    #[serde(default)]
    pub external_port: Option<i64>,
}

/// Internal-only vs. externally reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureKind {
    #[default]
    Internal,
    External,
}

impl std::fmt::Display for ExposureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::External => write!(f, "external"),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Two-tier configuration mirroring the reference deployment:
    /// frontend on 3000 exposed externally on 30080, backend on 8000
    /// internal-only, backend env wired to the secret partition.
    pub fn two_tier() -> ReleaseConfiguration {
        ReleaseConfiguration::from_yaml(two_tier_yaml()).unwrap()
    }

    pub fn two_tier_yaml() -> &'static str {
        r#"
frontend:
  name: frontend
  image:
    repository: ghcr.io/acme/todo-frontend
    tag: "1.4.2"
  replicaCount: 2
  containerPort: 3000
  env:
    - name: BACKEND_URL
      configKey: backendUrl
  probes:
    readiness:
      path: /
      period: 5s
  expose:
    kind: external
    externalPort: 30080
backend:
  name: backend
  image:
    repository: ghcr.io/acme/todo-backend
    tag: "1.4.2"
  containerPort: 8000
  env:
    - name: DATABASE_URL
      secretKey: databaseUrl
    - name: OPENAI_API_KEY
      secretKey: openaiApiKey
    - name: FRONTEND_URL
      configKey: frontendUrl
    - name: LOG_LEVEL
      literal: info
  probes:
    liveness:
      path: /health
      initialDelay: 10s
      failureThreshold: 3
    readiness:
      path: /health
  expose:
    kind: internal
config:
  appEnv: production
secrets:
  databaseUrl: postgres://todo:hunter2@db:5432/todo
  openaiApiKey: sk-test-123
"#
    }
}
