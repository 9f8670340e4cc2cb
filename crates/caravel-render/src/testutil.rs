//! Shared fixtures for the rendering tests.

use caravel_core::ReleaseConfiguration;

/// Two-tier configuration used across the rendering tests: frontend on
/// 3000 exposed externally on 30080, backend on 8000 internal-only,
/// backend env wired to the secret partition.
pub const TWO_TIER_YAML: &str = r#"
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
"#;

pub fn two_tier_config() -> ReleaseConfiguration {
    ReleaseConfiguration::from_yaml(TWO_TIER_YAML).unwrap()
}
