//! Pipeline configuration from YAML

use crate::core::Pipeline;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Container image every step and the coordinator run in
    pub image: String,

    /// Namespace the coordinator and its workers are scheduled into
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Fixed run name; generated per submission when absent
    #[serde(default)]
    pub run_name: Option<String>,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Source reference of the step implementation (e.g. `module.path:Class`)
    pub source: String,

    /// Input name -> source reference of the artifact that feeds it
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Output name -> source reference of the materializer that writes it
    #[serde(default)]
    pub materializers: BTreeMap<String, String>,

    /// List of step IDs this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            anyhow::bail!("Pipeline '{}' has no image", self.name);
        }

        // Check that all step IDs are unique
        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
        }

        // Check that all dependencies reference existing steps
        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen_ids.contains(dep) {
                    anyhow::bail!(
                        "Step '{}' depends on non-existent step '{}'",
                        step.id,
                        dep
                    );
                }
            }
        }

        self.check_cycles()?;

        Ok(())
    }

    /// Check for cycles in the step dependency graph
    fn check_cycles(&self) -> Result<()> {
        let by_id: HashMap<&str, &StepConfig> =
            self.steps.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for step in &self.steps {
            if !visited.contains(step.id.as_str()) {
                Self::dfs_check(&step.id, &by_id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check<'a>(
        step_id: &'a str,
        by_id: &HashMap<&'a str, &'a StepConfig>,
        visited: &mut HashSet<&'a str>,
        recursion_stack: &mut HashSet<&'a str>,
    ) -> Result<()> {
        visited.insert(step_id);
        recursion_stack.insert(step_id);

        if let Some(&step) = by_id.get(step_id) {
            for dep in &step.depends_on {
                if recursion_stack.contains(dep.as_str()) {
                    anyhow::bail!("Cycle detected in dependency graph involving step '{}'", dep);
                }
                if !visited.contains(dep.as_str()) {
                    Self::dfs_check(dep, by_id, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(step_id);
        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_pipeline() {
        let yaml = r#"
name: "training"
version: "1.0"
image: "registry.local/training:latest"

steps:
  - id: "importer"
    source: "steps.importer:Importer"
    materializers:
      output: "materializers.csv:CsvMaterializer"

  - id: "trainer"
    source: "steps.trainer:Trainer"
    depends_on: ["importer"]
    inputs:
      data: "importer.output"
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "training");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.steps.len(), 2);
        assert_eq!(
            config.steps[1].inputs.get("data"),
            Some(&"importer.output".to_string())
        );
        assert!(config.run_name.is_none());
    }

    #[test]
    fn test_duplicate_step_id_fails() {
        let yaml = r#"
name: "p"
image: "img"
steps:
  - id: "step1"
    source: "a"
  - id: "step1"
    source: "b"
"#;

        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate step ID"));
    }

    #[test]
    fn test_invalid_dependency_fails() {
        let yaml = r#"
name: "p"
image: "img"
steps:
  - id: "step1"
    source: "a"
    depends_on: ["nonexistent"]
"#;

        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_cycle_fails() {
        let yaml = r#"
name: "p"
image: "img"
steps:
  - id: "a"
    source: "a"
    depends_on: ["c"]
  - id: "b"
    source: "b"
    depends_on: ["a"]
  - id: "c"
    source: "c"
    depends_on: ["b"]
"#;

        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Cycle detected"));
    }

    #[test]
    fn test_missing_image_fails() {
        let yaml = r#"
name: "p"
image: ""
steps: []
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }
}
