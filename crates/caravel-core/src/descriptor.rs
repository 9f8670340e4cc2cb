//! Resource descriptors
//!
//! A `ResourceDescriptor` is the unit the orchestrator consumes: a
//! structured description of one infrastructure object, carrying a stable
//! identity (kind + name) used for apply ordering, diffing, and idempotent
//! re-application.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{ExposureKind, ProbeConfig, PullPolicy, ResourceLimits};
use crate::error::Result;
use crate::partition::{ConfigPartition, SecretPartition, REDACTED};

/// Kinds of infrastructure objects this engine renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    ConfigMap,
    Secret,
    Deployment,
    Service,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
        };
        write!(f, "{}", s)
    }
}

/// Stable identity of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// One rendered infrastructure object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResourceDescriptor {
    ConfigMap(ConfigMapDescriptor),
    Secret(SecretDescriptor),
    Deployment(DeploymentDescriptor),
    Service(ServiceDescriptor),
}

impl ResourceDescriptor {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::ConfigMap(d) => ResourceId::new(ResourceKind::ConfigMap, &d.name),
            Self::Secret(d) => ResourceId::new(ResourceKind::Secret, &d.name),
            Self::Deployment(d) => ResourceId::new(ResourceKind::Deployment, &d.name),
            Self::Service(d) => ResourceId::new(ResourceKind::Service, &d.name),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ConfigMap(d) => &d.name,
            Self::Secret(d) => &d.name,
            Self::Deployment(d) => &d.name,
            Self::Service(d) => &d.name,
        }
    }

    /// Full wire serialization, as handed to the orchestrator
    ///
    /// Contains secret values in cleartext for `Secret` descriptors; use
    /// [`ResourceDescriptor::to_redacted_yaml`] for anything user-facing.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Display serialization: identical to [`to_yaml`](Self::to_yaml)
    /// except secret values are replaced by a redaction marker
    pub fn to_redacted_yaml(&self) -> Result<String> {
        match self {
            Self::Secret(d) => {
                let redacted = Self::Secret(SecretDescriptor {
                    name: d.name.clone(),
                    data: d.data.redacted_clone(),
                });
                Ok(serde_yaml::to_string(&redacted)?)
            }
            other => other.to_yaml(),
        }
    }

    /// Content hash over the canonical JSON form
    ///
    /// Identical configuration always yields identical hashes, which is
    /// what makes no-op detection during upgrade reliable.
    pub fn content_hash(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&json);
        Ok(hex::encode(digest))
    }
}

/// ConfigPartition rendered as a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapDescriptor {
    pub name: String,
    pub data: ConfigPartition,
}

/// SecretPartition rendered as a resource
///
/// `Debug` goes through [`SecretData`], which redacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretDescriptor {
    pub name: String,
    pub data: SecretData,
}

/// Secret payload wrapper
///
/// Serializes with real values (the orchestrator needs them); debugs and
/// displays with key names only.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretData(SecretPartition);

impl SecretData {
    pub fn new(partition: SecretPartition) -> Self {
        Self(partition)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys()
    }

    pub fn reveal(&self, key: &str) -> Option<&str> {
        self.0.reveal(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn redacted_clone(&self) -> SecretData {
        SecretData(SecretPartition::from_entries(self.0.redacted()))
    }
}

impl std::fmt::Debug for SecretData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A workload rendered as a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDescriptor {
    pub name: String,

    /// Selector labels, shared verbatim with the owning service
    pub labels: IndexMap<String, String>,

    /// Full image reference (`repository:tag`)
    pub image: String,

    pub pull_policy: PullPolicy,

    pub replicas: i64,

    pub container_port: i64,

    pub resources: ResourceLimits,

    /// Env bindings; references stay references, they are never inlined
    pub env: Vec<EnvBinding>,

    /// Probe contract the supervisor must honor
    pub probes: ProbeConfig,
}

/// A resolved environment binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvBinding {
    pub name: String,
    #[serde(flatten)]
    pub value: BoundValue,
}

/// Where a binding's value materializes at run time
///
/// Secret and config references carry the owning resource name plus the
/// key; the value itself stays in its partition descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundValue {
    Literal(String),
    ConfigMapRef { resource: String, key: String },
    SecretRef { resource: String, key: String },
}

/// A workload's service rendered as a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub name: String,

    /// Must equal the owning deployment's labels
    pub selector: IndexMap<String, String>,

    pub exposure: ExposureKind,

    pub port: i64,

    pub target_port: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_port: Option<i64>,
}
