//! Cross-reference resolution
//!
//! Every value that two or more descriptors must agree on — service names,
//! ports, internal and external URLs, label selectors — is computed here,
//! in one pass. Consumers read resolved values; nobody re-formats a URL or
//! re-derives a selector downstream. This is the mechanism that keeps a
//! config map's advertised backend URL identical to the backend service's
//! actual name and port.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{ExposureKind, ReleaseConfiguration, WorkloadSpec};
use crate::error::{CoreError, Result};

/// Label key used for workload selectors
pub const APP_LABEL: &str = "app";

/// Resolved shared values for one workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedWorkload {
    /// Service name (equals the workload name)
    pub service_name: String,

    /// Selector labels shared by the deployment and its service
    pub labels: IndexMap<String, String>,

    /// Service port
    pub port: i64,

    /// Container port the service targets
    pub target_port: i64,

    /// How the service is exposed, `None` when no service is rendered
    pub exposure: Option<ExposureKind>,

    /// Externally reachable port, if any
    pub external_port: Option<i64>,

    /// `http://{service-name}:{port}` — the in-cluster address
    pub internal_url: String,

    /// External address, only for externally reachable services
    pub external_url: Option<String>,
}

impl ResolvedWorkload {
    /// The URL other workloads should use to reach this one
    ///
    /// External when the world can see it, internal otherwise.
    pub fn advertised_url(&self) -> &str {
        self.external_url.as_deref().unwrap_or(&self.internal_url)
    }

    fn resolve(workload: &WorkloadSpec, external_host: &str) -> Self {
        let service_name = workload.name.clone();
        let mut labels = IndexMap::new();
        labels.insert(APP_LABEL.to_string(), workload.name.clone());

        let (exposure, port, external_port) = match &workload.expose {
            Some(expose) => (
                Some(expose.kind),
                expose.port.unwrap_or(workload.container_port),
                expose.external_port,
            ),
            None => (None, workload.container_port, None),
        };

        let internal_url = format!("http://{}:{}", service_name, port);
        let external_url = match (exposure, external_port) {
            (Some(ExposureKind::External), Some(ext)) => {
                Some(format!("http://{}:{}", external_host, ext))
            }
            _ => None,
        };

        Self {
            service_name,
            labels,
            port,
            target_port: workload.container_port,
            exposure,
            external_port,
            internal_url,
            external_url,
        }
    }
}

/// Output of the single resolution pass over a configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTopology {
    /// Per-workload resolved values, in declaration order
    pub workloads: IndexMap<String, ResolvedWorkload>,

    /// Config entries the resolver materializes (`{name}Url` per workload)
    pub derived_config: IndexMap<String, String>,
}

impl ResolvedTopology {
    pub fn workload(&self, name: &str) -> Option<&ResolvedWorkload> {
        self.workloads.get(name)
    }
}

/// Host name used in external URLs
///
/// The engine names no real ingress host; the placeholder keeps external
/// URLs well-formed and distinct from in-cluster ones.
pub const DEFAULT_EXTERNAL_HOST: &str = "localhost";

/// Resolve all cross-referenced values for a configuration
///
/// Fails with `CrossReferenceConflict` when two descriptors would be made
/// to disagree: duplicate workload/service names, duplicate external
/// ports, or a derived config key colliding with an operator-supplied one.
pub fn resolve(config: &ReleaseConfiguration) -> Result<ResolvedTopology> {
    resolve_with_host(config, DEFAULT_EXTERNAL_HOST)
}

pub fn resolve_with_host(
    config: &ReleaseConfiguration,
    external_host: &str,
) -> Result<ResolvedTopology> {
    let mut workloads: IndexMap<String, ResolvedWorkload> = IndexMap::new();
    let mut external_ports: IndexMap<i64, String> = IndexMap::new();

    for workload in config.workloads() {
        if workloads.contains_key(&workload.name) {
            return Err(CoreError::conflict(format!(
                "two workloads share the service name '{}'",
                workload.name
            )));
        }

        let resolved = ResolvedWorkload::resolve(workload, external_host);

        if let Some(ext) = resolved.external_port {
            if let Some(other) = external_ports.insert(ext, workload.name.clone()) {
                return Err(CoreError::conflict(format!(
                    "external port {} requested by both '{}' and '{}'",
                    ext, other, workload.name
                )));
            }
        }

        workloads.insert(workload.name.clone(), resolved);
    }

    let mut derived_config = IndexMap::new();
    for (name, resolved) in &workloads {
        let key = format!("{}Url", name);
        let url = resolved.advertised_url().to_string();
        if let Some(existing) = config.config.get(&key) {
            if existing != &url {
                return Err(CoreError::conflict(format!(
                    "config key '{}' is '{}' but the resolver derives '{}'",
                    key, existing, url
                )));
            }
        }
        derived_config.insert(key, url);
    }

    Ok(ResolvedTopology {
        workloads,
        derived_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures;

    #[test]
    fn test_resolve_two_tier() {
        let topo = resolve(&fixtures::two_tier()).unwrap();

        let frontend = topo.workload("frontend").unwrap();
        assert_eq!(frontend.service_name, "frontend");
        assert_eq!(frontend.port, 3000);
        assert_eq!(frontend.external_port, Some(30080));
        assert_eq!(frontend.internal_url, "http://frontend:3000");
        assert_eq!(
            frontend.external_url.as_deref(),
            Some("http://localhost:30080")
        );

        let backend = topo.workload("backend").unwrap();
        assert_eq!(backend.exposure, Some(ExposureKind::Internal));
        assert_eq!(backend.external_url, None);
        assert_eq!(backend.internal_url, "http://backend:8000");
    }

    #[test]
    fn test_advertised_url_prefers_external() {
        let topo = resolve(&fixtures::two_tier()).unwrap();

        assert_eq!(
            topo.workload("frontend").unwrap().advertised_url(),
            "http://localhost:30080"
        );
        assert_eq!(
            topo.workload("backend").unwrap().advertised_url(),
            "http://backend:8000"
        );
    }

    #[test]
    fn test_derived_config_entries() {
        let topo = resolve(&fixtures::two_tier()).unwrap();

        assert_eq!(
            topo.derived_config.get("frontendUrl").map(String::as_str),
            Some("http://localhost:30080")
        );
        assert_eq!(
            topo.derived_config.get("backendUrl").map(String::as_str),
            Some("http://backend:8000")
        );
    }

    #[test]
    fn test_duplicate_external_port_conflicts() {
        let mut cfg = fixtures::two_tier();
        cfg.backend.expose = Some(crate::config::ExposureSpec {
            kind: ExposureKind::External,
            port: None,
            external_port: Some(30080),
        });

        let err = resolve(&cfg).unwrap_err();
        assert!(matches!(err, CoreError::CrossReferenceConflict { .. }));
        assert!(err.to_string().contains("30080"));
    }

    #[test]
    fn test_duplicate_workload_name_conflicts() {
        let mut cfg = fixtures::two_tier();
        cfg.backend.name = "frontend".to_string();

        let err = resolve(&cfg).unwrap_err();
        assert!(err.to_string().contains("share the service name"));
    }

    #[test]
    fn test_user_config_disagreeing_with_resolver_conflicts() {
        let mut cfg = fixtures::two_tier();
        cfg.config.insert(
            "backendUrl".to_string(),
            "http://somewhere-else:9999".to_string(),
        );

        let err = resolve(&cfg).unwrap_err();
        assert!(err.to_string().contains("backendUrl"));
    }

    #[test]
    fn test_selector_labels_match_workload() {
        let topo = resolve(&fixtures::two_tier()).unwrap();
        let backend = topo.workload("backend").unwrap();
        assert_eq!(backend.labels.get(APP_LABEL).map(String::as_str), Some("backend"));
    }

    #[test]
    fn test_service_port_defaults_to_container_port() {
        let topo = resolve(&fixtures::two_tier()).unwrap();
        let backend = topo.workload("backend").unwrap();
        assert_eq!(backend.port, 8000);
        assert_eq!(backend.target_port, 8000);
    }
}
