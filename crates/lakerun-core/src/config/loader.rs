//! YAML configuration loading with variable substitution and overlay merging.
//!
//! String scalars may reference `${NAME}` or `${NAME:default}`. Resolution
//! order: caller-supplied widget parameters, then the process environment,
//! then the inline default; a reference none of them resolve fails the load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::config::types::{Layer, PipelineConfig};
use crate::error::{PipelineError, Result};

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("valid substitution regex"));

/// Overlay suffixes excluded from primary config listings.
const OVERLAY_ENVS: [&str; 3] = ["dev", "qa", "prd"];

/// Loads and resolves pipeline YAML documents.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: PathBuf,
    environment: String,
    widget_params: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a loader rooted at `base_path`. The environment defaults to
    /// `$ENVIRONMENT`, falling back to `dev`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
            widget_params: HashMap::new(),
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_widget_params(mut self, params: HashMap<String, String>) -> Self {
        self.widget_params = params;
        self
    }

    pub fn set_widget_params(&mut self, params: HashMap<String, String>) {
        self.widget_params = params;
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn substitute_str(&self, input: &str) -> Result<String> {
        let mut missing: Vec<String> = Vec::new();
        let result = VAR_RE.replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if let Some(value) = self.widget_params.get(name) {
                return value.clone();
            }
            if let Ok(value) = std::env::var(name) {
                return value;
            }
            if let Some(default) = caps.get(2) {
                return default.as_str().to_string();
            }
            missing.push(name.to_string());
            String::new()
        });
        if missing.is_empty() {
            Ok(result.into_owned())
        } else {
            Err(PipelineError::Configuration(format!(
                "unresolved variable(s): {}",
                missing.join(", ")
            )))
        }
    }

    fn substitute_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(self.substitute_str(&s)?)),
            Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (key, val) in map {
                    out.insert(key, self.substitute_value(val)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.substitute_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    /// Load a YAML file and substitute variables in every string scalar.
    ///
    /// # Errors
    ///
    /// Fails if the file is absent, the YAML is malformed, or a variable
    /// reference cannot be resolved.
    pub fn load_yaml(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = self.resolve_path(path.as_ref());
        if !path.exists() {
            return Err(PipelineError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PipelineError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let value: Value = serde_yaml::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!("invalid YAML in {}: {e}", path.display()))
        })?;
        let value = match value {
            Value::Null => Value::Mapping(serde_yaml::Mapping::new()),
            other => other,
        };
        self.substitute_value(value)
    }

    /// Deep-merge two documents. Where both sides hold a mapping the merge
    /// recurses; otherwise the override wins outright — lists and scalars
    /// replace, never concatenate.
    pub fn merge_values(base: Value, override_value: Value) -> Value {
        match (base, override_value) {
            (Value::Mapping(mut base_map), Value::Mapping(override_map)) => {
                for (key, value) in override_map {
                    let merged = match base_map.remove(&key) {
                        Some(existing) => Self::merge_values(existing, value),
                        None => value,
                    };
                    base_map.insert(key, merged);
                }
                Value::Mapping(base_map)
            }
            (_, override_value) => override_value,
        }
    }

    /// Load a pipeline configuration, applying an optional explicit override
    /// document and then the sibling `{stem}.{environment}.yaml` overlay when
    /// one exists next to the base file.
    ///
    /// # Errors
    ///
    /// Fails on any load error or on an invalid bound configuration.
    pub fn load_pipeline_config(
        &self,
        config_path: impl AsRef<Path>,
        env_override_path: Option<&Path>,
    ) -> Result<PipelineConfig> {
        let config_path = config_path.as_ref();
        let mut merged = self.load_yaml(config_path)?;

        if let Some(override_path) = env_override_path {
            merged = Self::merge_values(merged, self.load_yaml(override_path)?);
        }

        let resolved = self.resolve_path(config_path);
        if let (Some(parent), Some(stem)) = (resolved.parent(), resolved.file_stem()) {
            let overlay = parent.join(format!(
                "{}.{}.yaml",
                stem.to_string_lossy(),
                self.environment
            ));
            if overlay.exists() {
                tracing::debug!(overlay = %overlay.display(), "Applying environment overlay");
                merged = Self::merge_values(merged, self.load_yaml(&overlay)?);
            }
        }

        PipelineConfig::from_yaml_value(merged)
    }

    /// List primary configuration files under the base path, optionally scoped
    /// to a layer subdirectory. Environment overlays (`*.dev.yaml` etc.) are
    /// excluded. Results are sorted.
    pub fn list_configs(&self, layer: Option<Layer>, pattern: &str) -> Vec<PathBuf> {
        let mut search_path = self.base_path.clone();
        if let Some(layer) = layer {
            search_path = search_path.join(layer.as_str());
        }

        let mut configs: Vec<PathBuf> = WalkDir::new(&search_path)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.file_name()
                    .map(|name| pattern_matches(pattern, &name.to_string_lossy()))
                    .unwrap_or(false)
            })
            .filter(|path| !is_overlay(path))
            .collect();
        configs.sort();
        configs
    }
}

fn is_overlay(path: &Path) -> bool {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return false;
    };
    OVERLAY_ENVS
        .iter()
        .any(|env| stem.ends_with(&format!(".{env}")))
}

/// Minimal glob match supporting `*` and `?`.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    fn matches(pat: &[char], text: &[char]) -> bool {
        match (pat.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                matches(&pat[1..], text) || (!text.is_empty() && matches(pat, &text[1..]))
            }
            (Some('?'), Some(_)) => matches(&pat[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => matches(&pat[1..], &text[1..]),
            _ => false,
        }
    }
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = name.chars().collect();
    matches(&pat, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loader() -> ConfigLoader {
        ConfigLoader::new(".").with_environment("dev")
    }

    #[test]
    fn substitutes_from_environment() {
        std::env::set_var("LR_TEST_HOST", "warehouse.example.com");
        let result = loader().substitute_str("host: ${LR_TEST_HOST}").unwrap();
        assert_eq!(result, "host: warehouse.example.com");
        std::env::remove_var("LR_TEST_HOST");
    }

    #[test]
    fn widget_params_take_precedence_over_environment() {
        std::env::set_var("LR_TEST_CATALOG", "from_env");
        let loader = loader().with_widget_params(HashMap::from([(
            "LR_TEST_CATALOG".to_string(),
            "from_widget".to_string(),
        )]));
        let result = loader
            .substitute_str("${LR_TEST_CATALOG:from_default}")
            .unwrap();
        assert_eq!(result, "from_widget");
        std::env::remove_var("LR_TEST_CATALOG");
    }

    #[test]
    fn inline_default_is_last_resort() {
        let result = loader()
            .substitute_str("${LR_DEFINITELY_NOT_SET_1:fallback}")
            .unwrap();
        assert_eq!(result, "fallback");
        // An empty default still counts as a default.
        let result = loader().substitute_str("${LR_DEFINITELY_NOT_SET_1:}").unwrap();
        assert_eq!(result, "");
    }

    #[test]
    fn missing_variables_are_all_reported() {
        let err = loader()
            .substitute_str("${LR_MISSING_A} and ${LR_MISSING_B}")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("LR_MISSING_A"));
        assert!(msg.contains("LR_MISSING_B"));
    }

    #[test]
    fn non_string_scalars_pass_through() {
        let value: Value = serde_yaml::from_str("port: 5432\nratio: 0.5\nflag: true").unwrap();
        let result = loader().substitute_value(value.clone()).unwrap();
        assert_eq!(result, value);
    }

    #[test]
    fn substitution_recurses_into_sequences() {
        std::env::set_var("LR_TEST_SEQ", "silver");
        let value: Value = serde_yaml::from_str("layers:\n  - bronze\n  - ${LR_TEST_SEQ}").unwrap();
        let result = loader().substitute_value(value).unwrap();
        let layers = result.get("layers").unwrap().as_sequence().unwrap();
        assert_eq!(layers[1].as_str().unwrap(), "silver");
        std::env::remove_var("LR_TEST_SEQ");
    }

    #[test]
    fn merge_is_right_biased_per_key() {
        let base: Value = serde_yaml::from_str("a:\n  x: 1\n  y: 2").unwrap();
        let over: Value = serde_yaml::from_str("a:\n  x: 9").unwrap();
        let merged = ConfigLoader::merge_values(base, over);
        let a = merged.get("a").unwrap();
        assert_eq!(a.get("x").unwrap().as_i64().unwrap(), 9);
        assert_eq!(a.get("y").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn merge_replaces_lists_outright() {
        let base: Value = serde_yaml::from_str("a: [1, 2]").unwrap();
        let over: Value = serde_yaml::from_str("a: [3]").unwrap();
        let merged = ConfigLoader::merge_values(base, over);
        let a = merged.get("a").unwrap().as_sequence().unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].as_i64().unwrap(), 3);
    }

    #[test]
    fn load_yaml_missing_file_errors() {
        let err = loader().load_yaml("/nonexistent/pipeline.yaml").unwrap_err();
        assert!(err.to_string().contains("configuration file not found"));
    }

    #[test]
    fn load_yaml_invalid_yaml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "this is not: [valid: yaml: {{{}}}").unwrap();
        let err = ConfigLoader::new(dir.path()).load_yaml("bad.yaml").unwrap_err();
        assert!(err.to_string().contains("invalid YAML"));
    }

    fn write_config(dir: &Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn environment_overlay_is_probed_automatically() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "orders.yaml",
            "pipeline:\n  name: orders\n  layer: bronze\ntarget:\n  catalog: main\n  schema: raw\n  table: orders\n",
        );
        write_config(
            dir.path(),
            "orders.qa.yaml",
            "target:\n  catalog: qa_catalog\n",
        );

        let loader = ConfigLoader::new(dir.path()).with_environment("qa");
        let config = loader.load_pipeline_config("orders.yaml", None).unwrap();
        let target = config.target.unwrap();
        assert_eq!(target.catalog, "qa_catalog");
        assert_eq!(target.schema, "raw");

        // A different environment leaves the base untouched.
        let loader = ConfigLoader::new(dir.path()).with_environment("prd");
        let config = loader.load_pipeline_config("orders.yaml", None).unwrap();
        assert_eq!(config.target.unwrap().catalog, "main");
    }

    #[test]
    fn explicit_override_applies_before_overlay() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "p.yaml",
            "pipeline:\n  name: p\n  layer: bronze\n  owner: base\n",
        );
        write_config(dir.path(), "extra.yaml", "pipeline:\n  owner: override\n");
        write_config(dir.path(), "p.dev.yaml", "pipeline:\n  version: 9.9.9\n");

        let loader = ConfigLoader::new(dir.path()).with_environment("dev");
        let config = loader
            .load_pipeline_config("p.yaml", Some(Path::new("extra.yaml")))
            .unwrap();
        assert_eq!(config.owner, "override");
        assert_eq!(config.version, "9.9.9");
    }

    #[test]
    fn list_configs_excludes_overlays_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let bronze = dir.path().join("bronze");
        std::fs::create_dir(&bronze).unwrap();
        write_config(&bronze, "b.yaml", "x: 1\n");
        write_config(&bronze, "a.yaml", "x: 1\n");
        write_config(&bronze, "a.dev.yaml", "x: 2\n");
        write_config(&bronze, "a.qa.yaml", "x: 2\n");
        write_config(&bronze, "notes.txt", "not yaml\n");

        let loader = ConfigLoader::new(dir.path());
        let configs = loader.list_configs(Some(Layer::Bronze), "*.yaml");
        let names: Vec<String> = configs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yaml"]);
    }

    #[test]
    fn pattern_matching_supports_star_and_question() {
        assert!(pattern_matches("*.yaml", "orders.yaml"));
        assert!(pattern_matches("orders.*", "orders.yaml"));
        assert!(pattern_matches("?.yaml", "a.yaml"));
        assert!(!pattern_matches("*.yaml", "orders.yml"));
        assert!(!pattern_matches("?.yaml", "ab.yaml"));
    }
}
