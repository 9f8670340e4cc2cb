//! Caravel Core - Configuration model for the deployment topology engine
//!
//! This crate provides the foundational types used throughout Caravel:
//! - `ReleaseConfiguration`: the typed root input, validated once at the boundary
//! - `SchemaValidator`: batch-reporting schema validation
//! - `ConfigPartition` / `SecretPartition`: the secret/non-secret split
//! - `ResolvedTopology`: the single cross-reference resolution pass
//! - `ResourceDescriptor`: structured infrastructure objects ready for apply

pub mod config;
pub mod descriptor;
pub mod error;
pub mod partition;
pub mod resolve;
pub mod validate;

pub use config::{
    EnvVar, ExposureKind, ExposureSpec, ImageSpec, ProbeConfig, ProbeSpec, PullPolicy,
    ReleaseConfiguration, ResourceLimits, ValueSource, WorkloadSpec,
};
pub use descriptor::{
    BoundValue, ConfigMapDescriptor, DeploymentDescriptor, EnvBinding, ResourceDescriptor,
    ResourceId, ResourceKind, SecretData, SecretDescriptor, ServiceDescriptor,
};
pub use error::{CoreError, Result, SchemaViolation};
pub use partition::{partition, ConfigPartition, SecretPartition, REDACTED};
pub use resolve::{
    resolve, resolve_with_host, ResolvedTopology, ResolvedWorkload, APP_LABEL,
    DEFAULT_EXTERNAL_HOST,
};
pub use validate::{is_valid_name, SchemaRules, SchemaValidator};
