//! End-to-end rendering pipeline.
//!
//! `render` is the single entry point everything above this crate uses:
//! validate the configuration, partition config from secrets, resolve the
//! service topology, build descriptors and sort them into apply order.
//! Each stage either passes a fully-checked value to the next or fails
//! with the stage's own error; nothing downstream re-validates.

use tracing::debug;

use caravel_core::{
    is_valid_name, resolve_with_host, CoreError, ReleaseConfiguration, ResolvedTopology,
    ResourceDescriptor, SchemaRules, SchemaValidator, SchemaViolation, DEFAULT_EXTERNAL_HOST,
};

use crate::builder::DescriptorBuilder;
use crate::error::Result;
use crate::graph::{plan, ApplyPlan};

/// Knobs for a render run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Hostname substituted into externally-exposed workload URLs.
    pub external_host: String,

    /// Extra schema rules layered on top of the built-in checks.
    pub rules: SchemaRules,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            external_host: DEFAULT_EXTERNAL_HOST.to_string(),
            rules: SchemaRules::default(),
        }
    }
}

/// A fully rendered release: descriptors in apply order plus the resolved
/// topology they were built from.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    plan: ApplyPlan,
    topology: ResolvedTopology,
}

impl RenderOutput {
    /// Descriptors in the order they must be applied.
    pub fn descriptors(&self) -> &[ResourceDescriptor] {
        self.plan.descriptors()
    }

    pub fn into_descriptors(self) -> Vec<ResourceDescriptor> {
        self.plan.into_descriptors()
    }

    pub fn plan(&self) -> &ApplyPlan {
        &self.plan
    }

    pub fn topology(&self) -> &ResolvedTopology {
        &self.topology
    }

    /// All descriptors as one multi-document YAML stream with secret
    /// values redacted. This is the only YAML form meant for display.
    pub fn to_multidoc_yaml(&self) -> Result<String> {
        let mut docs = Vec::with_capacity(self.plan.len());
        for descriptor in self.plan.descriptors() {
            docs.push(descriptor.to_redacted_yaml()?);
        }
        Ok(docs.join("---\n"))
    }
}

/// Render a release configuration into an apply-ordered descriptor set.
pub fn render(
    release_name: &str,
    config: &ReleaseConfiguration,
    options: &RenderOptions,
) -> Result<RenderOutput> {
    if !is_valid_name(release_name) {
        return Err(CoreError::schema(vec![SchemaViolation::new(
            "releaseName",
            format!(
                "'{release_name}' is not a valid DNS-1123 label (lowercase alphanumerics and '-', max 63 chars)"
            ),
        )])
        .into());
    }

    SchemaValidator::new(options.rules.clone()).validate(config)?;

    let (mut config_partition, secret_partition) = caravel_core::partition(config)?;
    let topology = resolve_with_host(config, &options.external_host)?;
    for (key, value) in &topology.derived_config {
        config_partition.insert(key.clone(), value.clone());
    }

    let descriptors = DescriptorBuilder::new(
        release_name,
        config,
        &topology,
        config_partition,
        secret_partition,
    )
    .build()?;

    let plan = plan(descriptors)?;
    debug!(
        release = release_name,
        resources = plan.len(),
        "rendered release"
    );

    Ok(RenderOutput { plan, topology })
}
