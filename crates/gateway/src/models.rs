//! The persistent registry of embedding models. Backed by a YAML file;
//! mutations are serialized with a mutex and persisted with a temp-file
//! write plus atomic rename so a crash never leaves a torn registry.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelsError {
    #[error("Model not found: {provider}/{model}")]
    NotFound { provider: String, model: String },

    #[error("Failed to persist models registry: {0}")]
    Persist(#[from] std::io::Error),

    #[error("Failed to serialize models registry: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// One embedding model entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider: String,
    pub model: String,
    pub version: String,
    pub timestamp: String,
    pub dimensions: u32,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
    #[serde(rename = "isDeprecated", default)]
    pub is_deprecated: bool,
    #[serde(rename = "deprecationDate", default, skip_serializing_if = "Option::is_none")]
    pub deprecation_date: Option<String>,
}

impl ModelEntry {
    /// The full model string: `timestamp@version@provider/model`.
    pub fn full_model(&self) -> String {
        build_full_model(&self.timestamp, &self.version, &self.provider, &self.model)
    }
}

/// Build the full model string from its components.
pub fn build_full_model(timestamp: &str, version: &str, provider: &str, model: &str) -> String {
    format!("{timestamp}@{version}@{provider}/{model}")
}

/// Parse a full model string back into `(provider, model)`.
pub fn parse_full_model(full_model: &str) -> Option<(&str, &str)> {
    let mut parts = full_model.splitn(3, '@');
    let _timestamp = parts.next()?;
    let _version = parts.next()?;
    let spec = parts.next()?;

    let (provider, model) = spec.split_once('/')?;

    if provider.is_empty() || model.is_empty() {
        return None;
    }

    Some((provider, model))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModelsFile {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

/// A view of the registry suitable for the API response.
#[derive(Debug, Serialize)]
pub struct ModelsView {
    pub models: Vec<ModelViewEntry>,
    pub default: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelViewEntry {
    #[serde(flatten)]
    pub entry: ModelEntry,
    #[serde(rename = "fullModel")]
    pub full_model: String,
}

/// Manages the registry of available embedding models.
pub struct ModelsRegistry {
    path: PathBuf,
    inner: Mutex<Vec<ModelEntry>>,
}

impl ModelsRegistry {
    /// Load models from the YAML configuration file. A missing file starts
    /// an empty registry; the first mutation creates it.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let models = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_yaml::from_str::<ModelsFile>(&content) {
                Ok(file) => file.models,
                Err(e) => {
                    log::error!("Error parsing {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) => {
                log::warn!("Models configuration file not readable ({}): {e}", path.display());
                Vec::new()
            }
        };

        if !models.iter().any(|m| m.is_default) {
            log::warn!("No default model specified in {}", path.display());
        }

        log::info!("Loaded {} embedding models from {}", models.len(), path.display());

        Self {
            path,
            inner: Mutex::new(models),
        }
    }

    /// All models plus the current default, in API response shape.
    pub fn all(&self) -> ModelsView {
        let models = self.inner.lock().expect("models registry mutex poisoned");

        let default = models.iter().find(|m| m.is_default).map(ModelEntry::full_model);

        ModelsView {
            models: models
                .iter()
                .map(|m| ModelViewEntry {
                    entry: m.clone(),
                    full_model: m.full_model(),
                })
                .collect(),
            default,
        }
    }

    /// The current default model string, when one is configured.
    pub fn default_model(&self) -> Option<String> {
        let models = self.inner.lock().expect("models registry mutex poisoned");
        models.iter().find(|m| m.is_default).map(ModelEntry::full_model)
    }

    /// Set a model as the single default and persist.
    pub fn set_default(&self, provider: &str, model: &str) -> Result<String, ModelsError> {
        let mut models = self.inner.lock().expect("models registry mutex poisoned");

        if !models.iter().any(|m| m.provider == provider && m.model == model) {
            return Err(ModelsError::NotFound {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }

        for m in models.iter_mut() {
            m.is_default = m.provider == provider && m.model == model;
        }

        persist(&self.path, &models)?;

        let full_model = models
            .iter()
            .find(|m| m.is_default)
            .map(ModelEntry::full_model)
            .unwrap_or_default();

        log::info!("Default embedding model changed to {provider}/{model}");

        Ok(full_model)
    }

    /// Mark a model as deprecated with a deprecation date and persist.
    pub fn deprecate(&self, provider: &str, model: &str, deprecation_date: &str) -> Result<(), ModelsError> {
        let mut models = self.inner.lock().expect("models registry mutex poisoned");

        let Some(target) = models.iter_mut().find(|m| m.provider == provider && m.model == model) else {
            return Err(ModelsError::NotFound {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        };

        target.is_deprecated = true;
        target.deprecation_date = Some(deprecation_date.to_string());

        persist(&self.path, &models)?;

        log::info!("Embedding model deprecated: {provider}/{model} ({deprecation_date})");

        Ok(())
    }
}

/// Write the registry to a sibling temp file and atomically rename it over
/// the target, so readers never observe a partial write.
fn persist(path: &Path, models: &[ModelEntry]) -> Result<(), ModelsError> {
    let file = ModelsFile {
        models: models.to_vec(),
    };

    let content = serde_yaml::to_string(&file)?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = indoc::indoc! {r#"
        models:
          - provider: jina
            model: jina-clip-v2
            version: "2.0"
            timestamp: "1718236800"
            dimensions: 1024
            isDefault: true
          - provider: ollama
            model: mxbai-embed-large
            version: "1.0"
            timestamp: "1710000000"
            dimensions: 1024
    "#};

    fn registry() -> (tempfile::TempDir, ModelsRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.yaml");
        std::fs::write(&path, FIXTURE).unwrap();

        let registry = ModelsRegistry::load(&path);
        (dir, registry)
    }

    #[test]
    fn full_model_round_trips() {
        let (_dir, registry) = registry();

        for view in registry.all().models {
            let (provider, model) = parse_full_model(&view.full_model).unwrap();
            assert_eq!(provider, view.entry.provider);
            assert_eq!(model, view.entry.model);
        }
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert!(parse_full_model("jina/jina-clip-v2").is_none());
        assert!(parse_full_model("ts@v2@no-slash").is_none());
        assert!(parse_full_model("ts@v2@/model").is_none());
        assert_eq!(
            parse_full_model("1718236800@2.0@jina/jina-clip-v2"),
            Some(("jina", "jina-clip-v2"))
        );
    }

    #[test]
    fn default_follows_set_default_and_persists() {
        let (dir, registry) = registry();

        assert_eq!(
            registry.default_model().as_deref(),
            Some("1718236800@2.0@jina/jina-clip-v2")
        );

        registry.set_default("ollama", "mxbai-embed-large").unwrap();
        assert_eq!(
            registry.default_model().as_deref(),
            Some("1710000000@1.0@ollama/mxbai-embed-large")
        );

        // A fresh load from disk sees the change, and only one default.
        let reloaded = ModelsRegistry::load(dir.path().join("models.yaml"));
        let view = reloaded.all();
        assert_eq!(view.models.iter().filter(|m| m.entry.is_default).count(), 1);
        assert_eq!(view.default.as_deref(), Some("1710000000@1.0@ollama/mxbai-embed-large"));
    }

    #[test]
    fn set_default_rejects_unknown_models() {
        let (_dir, registry) = registry();

        let err = registry.set_default("jina", "nope").unwrap_err();
        assert!(matches!(err, ModelsError::NotFound { .. }));
    }

    #[test]
    fn deprecate_records_the_date() {
        let (dir, registry) = registry();

        registry.deprecate("jina", "jina-clip-v2", "2026-01-01").unwrap();

        let reloaded = ModelsRegistry::load(dir.path().join("models.yaml"));
        let view = reloaded.all();
        let jina = view
            .models
            .iter()
            .find(|m| m.entry.provider == "jina")
            .unwrap();

        assert!(jina.entry.is_deprecated);
        assert_eq!(jina.entry.deprecation_date.as_deref(), Some("2026-01-01"));
    }
}
