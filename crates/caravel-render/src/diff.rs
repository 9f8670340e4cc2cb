//! Diff engine for comparing rendered descriptor sets.
//!
//! Upgrades apply only what changed: the engine pairs descriptors across
//! two renders by identity, compares content hashes, and produces a
//! per-resource change list with line-level text diffs. Text diffs are
//! computed over redacted YAML so secret values never end up in logs or
//! terminal output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use caravel_core::{ResourceDescriptor, ResourceId};

use crate::error::Result;

/// Compares two rendered descriptor sets.
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compare two descriptor sets by identity and content.
    ///
    /// `old` and `new` are rendered sets for the same release at two
    /// versions. Order within each set does not affect the result; the
    /// change list follows `new`'s order with removals appended.
    pub fn diff(
        &self,
        old: &[ResourceDescriptor],
        new: &[ResourceDescriptor],
    ) -> Result<DiffResult> {
        let old_by_id = index_by_id(old);
        let new_by_id = index_by_id(new);

        let mut changes = Vec::new();

        for (id, new_descriptor) in &new_by_id {
            match old_by_id.get(id) {
                Some(old_descriptor) => {
                    if old_descriptor.content_hash()? == new_descriptor.content_hash()? {
                        continue;
                    }
                    changes.push(ResourceChange {
                        id: (*id).clone(),
                        change_type: ChangeType::Modified,
                        diff: Some(text_diff(
                            &old_descriptor.to_redacted_yaml()?,
                            &new_descriptor.to_redacted_yaml()?,
                        )),
                    });
                }
                None => {
                    changes.push(ResourceChange {
                        id: (*id).clone(),
                        change_type: ChangeType::Added,
                        diff: Some(DiffContent::new_addition(
                            &new_descriptor.to_redacted_yaml()?,
                        )),
                    });
                }
            }
        }

        for (id, old_descriptor) in &old_by_id {
            if !new_by_id.contains_key(id) {
                changes.push(ResourceChange {
                    id: (*id).clone(),
                    change_type: ChangeType::Removed,
                    diff: Some(DiffContent::new_removal(
                        &old_descriptor.to_redacted_yaml()?,
                    )),
                });
            }
        }

        Ok(DiffResult { changes })
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn index_by_id(descriptors: &[ResourceDescriptor]) -> IndexMap<ResourceId, &ResourceDescriptor> {
    descriptors.iter().map(|d| (d.id(), d)).collect()
}

fn text_diff(old: &str, new: &str) -> DiffContent {
    let diff = TextDiff::from_lines(old, new);
    let lines = diff
        .iter_all_changes()
        .map(|change| {
            let line_type = match change.tag() {
                ChangeTag::Delete => LineType::Removed,
                ChangeTag::Insert => LineType::Added,
                ChangeTag::Equal => LineType::Context,
            };
            DiffLine {
                line_type,
                content: change.value().trim_end().to_string(),
            }
        })
        .collect();
    DiffContent { lines }
}

/// Result of comparing two descriptor sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    pub changes: Vec<ResourceChange>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes_by_type(&self, change_type: ChangeType) -> Vec<&ResourceChange> {
        self.changes
            .iter()
            .filter(|c| c.change_type == change_type)
            .collect()
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        let count = |t| {
            self.changes
                .iter()
                .filter(|c| c.change_type == t)
                .count()
        };
        let added = count(ChangeType::Added);
        let modified = count(ChangeType::Modified);
        let removed = count(ChangeType::Removed);

        let mut parts = Vec::new();
        if added > 0 {
            parts.push(format!("{added} added"));
        }
        if modified > 0 {
            parts.push(format!("{modified} modified"));
        }
        if removed > 0 {
            parts.push(format!("{removed} removed"));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A change to a single descriptor between two renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChange {
    pub id: ResourceId,
    pub change_type: ChangeType,
    pub diff: Option<DiffContent>,
}

/// Type of descriptor change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Modified => write!(f, "modified"),
            ChangeType::Removed => write!(f, "removed"),
        }
    }
}

/// Line-level diff of one descriptor's redacted YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffContent {
    pub lines: Vec<DiffLine>,
}

impl DiffContent {
    fn new_addition(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| DiffLine {
                line_type: LineType::Added,
                content: line.to_string(),
            })
            .collect();
        Self { lines }
    }

    fn new_removal(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| DiffLine {
                line_type: LineType::Removed,
                content: line.to_string(),
            })
            .collect();
        Self { lines }
    }

    /// Render as a unified diff string.
    pub fn to_unified_diff(&self) -> String {
        let mut output = String::new();
        for line in &self.lines {
            let prefix = match line.line_type {
                LineType::Added => "+",
                LineType::Removed => "-",
                LineType::Context => " ",
            };
            output.push_str(prefix);
            output.push_str(&line.content);
            output.push('\n');
        }
        output
    }
}

/// A single line in a diff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: LineType,
    pub content: String,
}

/// Type of diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Added,
    Removed,
    Context,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{render, RenderOptions};
    use crate::testutil::{two_tier_config, TWO_TIER_YAML};

    fn rendered() -> Vec<ResourceDescriptor> {
        render("demo", &two_tier_config(), &RenderOptions::default())
            .unwrap()
            .into_descriptors()
    }

    #[test]
    fn test_identical_renders_produce_no_changes() {
        let engine = DiffEngine::new();
        let result = engine.diff(&rendered(), &rendered()).unwrap();
        assert!(!result.has_changes());
        assert_eq!(result.summary(), "No changes");
    }

    #[test]
    fn test_changed_replica_count_shows_as_modified() {
        let old = rendered();
        let yaml = TWO_TIER_YAML.replace("replicaCount: 2", "replicaCount: 3");
        let config = caravel_core::ReleaseConfiguration::from_yaml(&yaml).unwrap();
        let new = render("demo", &config, &RenderOptions::default())
            .unwrap()
            .into_descriptors();

        let engine = DiffEngine::new();
        let result = engine.diff(&old, &new).unwrap();

        assert_eq!(result.changes.len(), 1);
        let change = &result.changes[0];
        assert_eq!(change.change_type, ChangeType::Modified);
        assert_eq!(change.id.to_string(), "Deployment/frontend");

        let unified = change.diff.as_ref().unwrap().to_unified_diff();
        assert!(unified.contains("-replicas: 2") || unified.contains("- replicas: 2"), "{unified}");
        assert!(unified.contains("+replicas: 3") || unified.contains("+ replicas: 3"), "{unified}");
    }

    #[test]
    fn test_removed_exposure_shows_service_as_removed() {
        let old = rendered();
        let yaml = TWO_TIER_YAML.replace("  expose:\n    kind: internal\n", "");
        let config = caravel_core::ReleaseConfiguration::from_yaml(&yaml).unwrap();
        let new = render("demo", &config, &RenderOptions::default())
            .unwrap()
            .into_descriptors();

        let engine = DiffEngine::new();
        let result = engine.diff(&old, &new).unwrap();

        let removed = result.changes_by_type(ChangeType::Removed);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id.to_string(), "Service/backend");
    }

    #[test]
    fn test_diff_output_never_contains_secret_values() {
        let old = rendered();
        let yaml = TWO_TIER_YAML.replace("sk-test-123", "sk-test-456");
        let config = caravel_core::ReleaseConfiguration::from_yaml(&yaml).unwrap();
        let new = render("demo", &config, &RenderOptions::default())
            .unwrap()
            .into_descriptors();

        let engine = DiffEngine::new();
        let result = engine.diff(&old, &new).unwrap();
        let dump = serde_json::to_string(&result).unwrap();
        assert!(!dump.contains("sk-test-123"));
        assert!(!dump.contains("sk-test-456"));
        assert!(!dump.contains("hunter2"));
    }
}
