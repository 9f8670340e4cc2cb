//! Resource descriptor building
//!
//! Takes a validated configuration plus the resolver's output and produces
//! one descriptor per infrastructure resource. The builder is
//! deterministic: identical input always yields byte-identical descriptor
//! sequences, which is what makes idempotent re-apply and upgrade diffing
//! possible.

use caravel_core::{
    BoundValue, ConfigMapDescriptor, ConfigPartition, CoreError, DeploymentDescriptor, EnvBinding,
    ReleaseConfiguration, ResolvedTopology, ResourceDescriptor, SecretData, SecretDescriptor,
    SecretPartition, ServiceDescriptor, ValueSource, WorkloadSpec,
};

use crate::error::Result;

/// Builds descriptors for one release
pub struct DescriptorBuilder<'a> {
    release_name: &'a str,
    config: &'a ReleaseConfiguration,
    topology: &'a ResolvedTopology,
    config_partition: ConfigPartition,
    secret_partition: SecretPartition,
}

impl<'a> DescriptorBuilder<'a> {
    /// Create a builder
    ///
    /// `config_partition` must already contain the resolver's derived
    /// entries; the pipeline merges them before constructing the builder.
    pub fn new(
        release_name: &'a str,
        config: &'a ReleaseConfiguration,
        topology: &'a ResolvedTopology,
        config_partition: ConfigPartition,
        secret_partition: SecretPartition,
    ) -> Self {
        Self {
            release_name,
            config,
            topology,
            config_partition,
            secret_partition,
        }
    }

    /// Name of the release's config map resource
    pub fn config_map_name(&self) -> String {
        format!("{}-config", self.release_name)
    }

    /// Name of the release's secret resource
    pub fn secret_name(&self) -> String {
        format!("{}-secrets", self.release_name)
    }

    /// Build all descriptors in declaration order
    ///
    /// Emission order here is not the apply order; the apply planner sorts
    /// the result against the dependency graph.
    pub fn build(self) -> Result<Vec<ResourceDescriptor>> {
        let mut descriptors = Vec::with_capacity(2 + self.config.workloads().len() * 2);

        descriptors.push(ResourceDescriptor::ConfigMap(ConfigMapDescriptor {
            name: self.config_map_name(),
            data: self.config_partition.clone(),
        }));
        descriptors.push(ResourceDescriptor::Secret(SecretDescriptor {
            name: self.secret_name(),
            data: SecretData::new(self.secret_partition.clone()),
        }));

        for workload in self.config.workloads() {
            descriptors.push(ResourceDescriptor::Deployment(
                self.build_deployment(workload)?,
            ));
            if let Some(service) = self.build_service(workload) {
                descriptors.push(ResourceDescriptor::Service(service));
            }
        }

        Ok(descriptors)
    }

    fn build_deployment(&self, workload: &WorkloadSpec) -> Result<DeploymentDescriptor> {
        let resolved = self.topology.workload(&workload.name).ok_or_else(|| {
            CoreError::conflict(format!(
                "workload '{}' missing from resolved topology",
                workload.name
            ))
        })?;

        let env = workload
            .env
            .iter()
            .map(|var| {
                Ok(EnvBinding {
                    name: var.name.clone(),
                    value: self.bind_value(&workload.name, &var.name, &var.source)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DeploymentDescriptor {
            name: workload.name.clone(),
            labels: resolved.labels.clone(),
            image: workload.image.reference(),
            pull_policy: workload.image.pull_policy,
            replicas: workload.replica_count,
            container_port: workload.container_port,
            resources: workload.resources.clone(),
            env,
            probes: workload.probes.clone(),
        })
    }

    fn build_service(&self, workload: &WorkloadSpec) -> Option<ServiceDescriptor> {
        workload.expose.as_ref()?;
        let resolved = self.topology.workload(&workload.name)?;

        Some(ServiceDescriptor {
            name: resolved.service_name.clone(),
            selector: resolved.labels.clone(),
            exposure: resolved.exposure?,
            port: resolved.port,
            target_port: resolved.target_port,
            external_port: resolved.external_port,
        })
    }

    /// Turn a `ValueSource` into a binding, re-checking the reference
    ///
    /// Validation already guarantees closure; the re-check is a safety net
    /// for builder defects, hence the hard `UnresolvedReference` error.
    fn bind_value(
        &self,
        workload: &str,
        env_name: &str,
        source: &ValueSource,
    ) -> Result<BoundValue> {
        match source {
            ValueSource::Literal(value) => Ok(BoundValue::Literal(value.clone())),
            ValueSource::ConfigKey(key) => {
                if !self.config_partition.contains_key(key) {
                    return Err(self.unresolved(workload, env_name, source, key).into());
                }
                Ok(BoundValue::ConfigMapRef {
                    resource: self.config_map_name(),
                    key: key.clone(),
                })
            }
            ValueSource::SecretKey(key) => {
                if !self.secret_partition.contains_key(key) {
                    return Err(self.unresolved(workload, env_name, source, key).into());
                }
                Ok(BoundValue::SecretRef {
                    resource: self.secret_name(),
                    key: key.clone(),
                })
            }
        }
    }

    fn unresolved(
        &self,
        workload: &str,
        env_name: &str,
        source: &ValueSource,
        key: &str,
    ) -> CoreError {
        let known: Vec<String> = match source {
            ValueSource::SecretKey(_) => self.secret_partition.keys().map(String::from).collect(),
            _ => self.config_partition.keys().map(String::from).collect(),
        };
        let suggestion = known
            .iter()
            .map(|k| (strsim::levenshtein(key, k), k))
            .filter(|(d, _)| *d <= 3)
            .min_by_key(|(d, _)| *d)
            .map(|(_, k)| k.clone());

        CoreError::UnresolvedReference {
            workload: workload.to_string(),
            env: env_name.to_string(),
            partition: source.partition().unwrap_or("config"),
            key: key.to_string(),
            suggestion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{two_tier_config, TWO_TIER_YAML};
    use caravel_core::resolve;

    struct Prepared {
        config: ReleaseConfiguration,
        topology: ResolvedTopology,
        config_partition: ConfigPartition,
        secret_partition: SecretPartition,
    }

    fn prepared() -> Prepared {
        let config = two_tier_config();
        let (mut config_partition, secret_partition) =
            caravel_core::partition(&config).unwrap();
        let topology = resolve(&config).unwrap();
        for (key, value) in &topology.derived_config {
            config_partition.insert(key.clone(), value.clone());
        }
        Prepared {
            config,
            topology,
            config_partition,
            secret_partition,
        }
    }

    fn build(p: &Prepared) -> Vec<ResourceDescriptor> {
        DescriptorBuilder::new(
            "demo",
            &p.config,
            &p.topology,
            p.config_partition.clone(),
            p.secret_partition.clone(),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn test_build_emits_all_descriptors_in_declaration_order() {
        let p = prepared();
        let ids: Vec<String> = build(&p).iter().map(|d| d.id().to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "ConfigMap/demo-config",
                "Secret/demo-secrets",
                "Deployment/frontend",
                "Service/frontend",
                "Deployment/backend",
                "Service/backend",
            ]
        );
    }

    #[test]
    fn test_secret_env_binds_as_reference_not_literal() {
        let p = prepared();
        let descriptors = build(&p);
        let backend = descriptors
            .iter()
            .find_map(|d| match d {
                ResourceDescriptor::Deployment(dep) if dep.name == "backend" => Some(dep),
                _ => None,
            })
            .unwrap();

        let db = backend
            .env
            .iter()
            .find(|e| e.name == "DATABASE_URL")
            .unwrap();
        assert_eq!(
            db.value,
            BoundValue::SecretRef {
                resource: "demo-secrets".to_string(),
                key: "databaseUrl".to_string(),
            }
        );
        // The raw value must not appear anywhere in the binding.
        let dump = format!("{:?}", backend.env);
        assert!(!dump.contains("hunter2"));
    }

    #[test]
    fn test_config_env_binds_against_config_map() {
        let p = prepared();
        let descriptors = build(&p);
        let frontend = descriptors
            .iter()
            .find_map(|d| match d {
                ResourceDescriptor::Deployment(dep) if dep.name == "frontend" => Some(dep),
                _ => None,
            })
            .unwrap();

        let backend_url = frontend
            .env
            .iter()
            .find(|e| e.name == "BACKEND_URL")
            .unwrap();
        assert_eq!(
            backend_url.value,
            BoundValue::ConfigMapRef {
                resource: "demo-config".to_string(),
                key: "backendUrl".to_string(),
            }
        );
    }

    #[test]
    fn test_unresolved_secret_reference_is_reported_with_suggestion() {
        let yaml = TWO_TIER_YAML.replace("secretKey: databaseUrl", "secretKey: databaseUri");
        let config = ReleaseConfiguration::from_yaml(&yaml).unwrap();
        let (mut config_partition, secret_partition) = caravel_core::partition(&config).unwrap();
        let topology = resolve(&config).unwrap();
        for (key, value) in &topology.derived_config {
            config_partition.insert(key.clone(), value.clone());
        }

        let err = DescriptorBuilder::new("demo", &config, &topology, config_partition, secret_partition)
            .build()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("databaseUri"), "{message}");
        assert!(message.contains("databaseUrl"), "{message}");
    }

    #[test]
    fn test_workload_without_exposure_gets_no_service() {
        let yaml = TWO_TIER_YAML.replace(
            "  expose:\n    kind: internal\n",
            "",
        );
        let config = ReleaseConfiguration::from_yaml(&yaml).unwrap();
        let (mut config_partition, secret_partition) = caravel_core::partition(&config).unwrap();
        let topology = resolve(&config).unwrap();
        for (key, value) in &topology.derived_config {
            config_partition.insert(key.clone(), value.clone());
        }

        let descriptors = DescriptorBuilder::new(
            "demo",
            &config,
            &topology,
            config_partition,
            secret_partition,
        )
        .build()
        .unwrap();
        let services: Vec<&str> = descriptors
            .iter()
            .filter_map(|d| match d {
                ResourceDescriptor::Service(s) => Some(s.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(services, vec!["frontend"]);
    }
}
