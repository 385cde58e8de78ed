//! Prompt template registry. All YAML prompts are loaded from a directory
//! into memory at startup so no disk reads happen during requests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior};
use serde::Deserialize;
use thiserror::Error;

use crate::schemas::ChatMessage;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Missing required variables for {key}: {missing:?}")]
    Validation { key: String, missing: Vec<String> },

    #[error("Failed to render prompt {key}: {message}")]
    Render { key: String, message: String },
}

/// The declared shape of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptForm {
    /// A single templated string.
    Prompt,
    /// A template rendering to a YAML list of chat messages.
    Messages,
}

/// A declared template variable: either a bare name or a spec map.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum VariableSpec {
    Name(String),
    Spec {
        name: String,
        #[serde(default)]
        required: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawPrompt {
    id: Option<String>,
    name: Option<String>,
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    description: String,
    form: Option<PromptForm>,
    template: Option<String>,
    messages_template: Option<String>,
    #[serde(default)]
    variables: Vec<VariableSpec>,
    #[serde(default)]
    meta: serde_yaml::Mapping,
}

/// In-memory representation of a prompt template loaded from YAML.
#[derive(Debug)]
pub struct PromptEntry {
    pub id: String,
    pub version: String,
    pub description: String,
    pub form: PromptForm,
    pub variables: Vec<VariableSpec>,
    pub meta: serde_yaml::Mapping,
    has_template: bool,
    has_messages_template: bool,
    /// Required variables resolved at load time: declared ones when present,
    /// otherwise inferred from the template.
    required_vars: Vec<String>,
}

impl PromptEntry {
    pub fn key(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }

    /// The `complexity` tag the auto-router reads, when present.
    pub fn complexity(&self) -> Option<&str> {
        self.meta.get("complexity").and_then(|v| v.as_str())
    }
}

/// Metadata view of a prompt entry returned by the admin endpoints.
#[derive(Debug, serde::Serialize)]
pub struct PromptInspection {
    pub r#type: String,
    pub version: String,
    pub description: String,
    pub form: PromptForm,
    pub variables: Vec<VariableSpec>,
    pub has_template: bool,
    pub has_messages_template: bool,
    pub meta: serde_yaml::Mapping,
}

/// The result of rendering a prompt.
#[derive(Debug)]
pub struct RenderedPrompt {
    pub id: String,
    pub version: String,
    pub form: PromptForm,
    /// Set for `prompt` form.
    pub prompt: Option<String>,
    /// Set for `messages` form.
    pub messages: Option<Vec<ChatMessage>>,
}

/// Loads all YAML prompts from a directory into memory and renders them with
/// strict undefined-variable semantics.
pub struct PromptRegistry {
    store: BTreeMap<String, PromptEntry>,
    env: Environment<'static>,
}

impl PromptRegistry {
    /// Read all `.yml`/`.yaml` files in the directory and compile their
    /// templates. A file that fails to parse is logged and skipped.
    pub fn load(prompts_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let prompts_dir = prompts_dir.as_ref();

        if !prompts_dir.is_dir() {
            anyhow::bail!("Prompts directory does not exist: {}", prompts_dir.display());
        }

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        let mut files: Vec<PathBuf> = std::fs::read_dir(prompts_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yml") | Some("yaml")
                )
            })
            .collect();
        files.sort();

        let mut store: BTreeMap<String, PromptEntry> = BTreeMap::new();

        for path in files {
            match load_entry(&mut env, &path) {
                Ok(entry) => {
                    let key = entry.key();

                    if store.contains_key(&key) {
                        log::warn!(
                            "Duplicate prompt key {key} found (file {}); overwriting",
                            path.display()
                        );
                    }

                    log::debug!("Loaded prompt {key} from {}", path.display());
                    store.insert(key, entry);
                }
                Err(e) => {
                    log::error!("Failed loading prompt file {}: {e}", path.display());
                }
            }
        }

        log::info!("Loaded {} prompt templates into memory", store.len());

        Ok(Self { store, env })
    }

    /// All prompt keys, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.store.keys().map(String::as_str).collect()
    }

    /// Look up an entry by id and optional version. Without a version the
    /// highest version wins, by lexicographic descending sort.
    pub fn get_entry(&self, id: &str, version: Option<&str>) -> Result<&PromptEntry, PromptError> {
        if let Some(version) = version {
            let key = format!("{id}@{version}");

            return self
                .store
                .get(&key)
                .ok_or_else(|| PromptError::NotFound(key));
        }

        let prefix = format!("{id}@");
        let mut candidates: Vec<&PromptEntry> = self
            .store
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, entry)| entry)
            .collect();

        candidates.sort_by(|a, b| b.version.cmp(&a.version));

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| PromptError::NotFound(format!("{id}@latest")))
    }

    /// Render a prompt with the provided variables.
    pub fn render(
        &self,
        id: &str,
        version: Option<&str>,
        vars: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<RenderedPrompt, PromptError> {
        let entry = self.get_entry(id, version)?;
        let key = entry.key();

        let missing: Vec<String> = entry
            .required_vars
            .iter()
            .filter(|name| !vars.contains_key(*name))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(PromptError::Validation { key, missing });
        }

        let context = minijinja::Value::from_serialize(vars);

        match entry.form {
            PromptForm::Messages => {
                if !entry.has_messages_template {
                    return Err(PromptError::Render {
                        key: key.clone(),
                        message: "declares form 'messages' but has no messages_template".to_string(),
                    });
                }

                let rendered = self
                    .template(&key, "messages")
                    .render(&context)
                    .map_err(|e| PromptError::Render {
                        key: key.clone(),
                        message: e.to_string(),
                    })?;

                let messages = parse_rendered_messages(&key, &rendered)?;

                Ok(RenderedPrompt {
                    id: entry.id.clone(),
                    version: entry.version.clone(),
                    form: PromptForm::Messages,
                    prompt: None,
                    messages: Some(messages),
                })
            }
            PromptForm::Prompt => {
                if !entry.has_template {
                    return Err(PromptError::Render {
                        key: key.clone(),
                        message: "has no template field".to_string(),
                    });
                }

                let rendered = self
                    .template(&key, "prompt")
                    .render(&context)
                    .map_err(|e| PromptError::Render {
                        key: key.clone(),
                        message: e.to_string(),
                    })?;

                Ok(RenderedPrompt {
                    id: entry.id.clone(),
                    version: entry.version.clone(),
                    form: PromptForm::Prompt,
                    prompt: Some(rendered),
                    messages: None,
                })
            }
        }
    }

    /// The raw metadata of an entry, for the admin endpoints.
    pub fn inspect(&self, id: &str, version: Option<&str>) -> Result<PromptInspection, PromptError> {
        let entry = self.get_entry(id, version)?;

        Ok(PromptInspection {
            r#type: entry.id.clone(),
            version: entry.version.clone(),
            description: entry.description.clone(),
            form: entry.form,
            variables: entry.variables.clone(),
            has_template: entry.has_template,
            has_messages_template: entry.has_messages_template,
            meta: entry.meta.clone(),
        })
    }

    fn template(&self, key: &str, kind: &str) -> minijinja::Template<'_, '_> {
        self.env
            .get_template(&template_name(key, kind))
            .expect("templates are compiled at load time")
    }
}

fn template_name(key: &str, kind: &str) -> String {
    format!("{key}#{kind}")
}

fn load_entry(env: &mut Environment<'static>, path: &Path) -> anyhow::Result<PromptEntry> {
    let content = std::fs::read_to_string(path)?;
    let raw: RawPrompt = serde_yaml::from_str(&content)?;

    let id = raw
        .id
        .or(raw.name)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();

    let version = match raw.version {
        Some(serde_yaml::Value::String(s)) => s,
        Some(other) => serde_yaml::to_string(&other)?.trim().to_string(),
        None => "v1".to_string(),
    };

    let form = raw.form.unwrap_or(PromptForm::Prompt);
    let key = format!("{id}@{version}");

    let mut required_vars: Vec<String> = raw
        .variables
        .iter()
        .filter_map(|v| match v {
            VariableSpec::Name(name) => Some(name.clone()),
            VariableSpec::Spec { name, required: true, .. } => Some(name.clone()),
            VariableSpec::Spec { .. } => None,
        })
        .collect();

    let mut has_template = false;
    let mut has_messages_template = false;
    let mut inferred: Vec<String> = Vec::new();

    if let Some(template) = raw.template {
        env.add_template_owned(template_name(&key, "prompt"), template)?;
        has_template = true;

        let compiled = env.get_template(&template_name(&key, "prompt"))?;
        inferred.extend(compiled.undeclared_variables(true));
    }

    if let Some(template) = raw.messages_template {
        env.add_template_owned(template_name(&key, "messages"), template)?;
        has_messages_template = true;

        let compiled = env.get_template(&template_name(&key, "messages"))?;
        inferred.extend(compiled.undeclared_variables(true));
    }

    if required_vars.is_empty() {
        inferred.sort();
        inferred.dedup();
        required_vars = inferred;
    }

    Ok(PromptEntry {
        id,
        version,
        description: raw.description,
        form,
        variables: raw.variables,
        meta: raw.meta,
        has_template,
        has_messages_template,
        required_vars,
    })
}

fn parse_rendered_messages(key: &str, rendered: &str) -> Result<Vec<ChatMessage>, PromptError> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(rendered).map_err(|e| PromptError::Render {
        key: key.to_string(),
        message: format!("Rendered messages_template is not valid YAML/JSON: {e}"),
    })?;

    let serde_yaml::Value::Sequence(items) = parsed else {
        return Err(PromptError::Render {
            key: key.to_string(),
            message: "messages_template must render to a YAML/JSON list of messages".to_string(),
        });
    };

    let mut messages = Vec::with_capacity(items.len());

    for (i, item) in items.into_iter().enumerate() {
        let serde_yaml::Value::Mapping(map) = item else {
            return Err(PromptError::Render {
                key: key.to_string(),
                message: format!("messages_template element #{i} invalid"),
            });
        };

        let Some(content) = map.get("content").and_then(|v| v.as_str()) else {
            return Err(PromptError::Render {
                key: key.to_string(),
                message: format!("messages_template element #{i} invalid"),
            });
        };

        let role = map
            .get("role")
            .and_then(|v| v.as_str())
            .unwrap_or("user");

        messages.push(ChatMessage::new(role, content));
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(files: &[(&str, &str)]) -> PromptRegistry {
        let dir = tempfile::tempdir().unwrap();

        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }

        let registry = PromptRegistry::load(dir.path()).unwrap();
        drop(dir);
        registry
    }

    #[test]
    fn renders_prompt_form() {
        let registry = registry_with(&[(
            "episode_summary.yml",
            indoc::indoc! {r#"
                id: episode_summary
                version: v1
                form: prompt
                template: |
                  Summarize "{{ episode_title }}" focusing on {{ focus }}.

                  {{ context_content }}
            "#},
        )]);

        let mut vars = serde_json::Map::new();
        vars.insert("episode_title".into(), "History of X".into());
        vars.insert("focus".into(), "origins".into());
        vars.insert("context_content".into(), "Source: a\nContent: b".into());

        let rendered = registry.render("episode_summary", Some("v1"), &vars).unwrap();

        assert_eq!(rendered.form, PromptForm::Prompt);
        let prompt = rendered.prompt.unwrap();
        assert!(prompt.starts_with("Summarize \"History of X\" focusing on origins."));
    }

    #[test]
    fn missing_variables_are_listed() {
        let registry = registry_with(&[(
            "episode_summary.yml",
            indoc::indoc! {r#"
                id: episode_summary
                version: v1
                template: "{{ episode_title }} / {{ focus }} / {{ context_content }}"
            "#},
        )]);

        let mut vars = serde_json::Map::new();
        vars.insert("episode_title".into(), "X".into());

        let err = registry.render("episode_summary", Some("v1"), &vars).unwrap_err();

        match err {
            PromptError::Validation { missing, .. } => {
                assert_eq!(missing, vec!["context_content".to_string(), "focus".to_string()]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn messages_form_parses_rendered_yaml() {
        let registry = registry_with(&[(
            "podcast_segment.yml",
            indoc::indoc! {r#"
                id: podcast_segment
                version: v1
                form: messages
                meta:
                  complexity: synthesis
                messages_template: |
                  - role: system
                    content: "You summarize segments."
                  - content: "Segment: {{ segment }}"
            "#},
        )]);

        let mut vars = serde_json::Map::new();
        vars.insert("segment".into(), "clusters".into());

        let rendered = registry.render("podcast_segment", None, &vars).unwrap();
        let messages = rendered.messages.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        // Role defaults to user when the template omits it.
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content.as_deref(), Some("Segment: clusters"));
    }

    #[test]
    fn latest_version_wins_without_an_explicit_version() {
        let registry = registry_with(&[
            (
                "keywords_v1.yml",
                "id: summary_keywords\nversion: v1\ntemplate: \"one\"\n",
            ),
            (
                "keywords_v2.yml",
                "id: summary_keywords\nversion: v2\ntemplate: \"two\"\n",
            ),
        ]);

        let entry = registry.get_entry("summary_keywords", None).unwrap();
        assert_eq!(entry.version, "v2");

        let pinned = registry.get_entry("summary_keywords", Some("v1")).unwrap();
        assert_eq!(pinned.version, "v1");
    }

    #[test]
    fn duplicate_keys_keep_the_last_file() {
        let registry = registry_with(&[
            ("a_first.yml", "id: dup\nversion: v1\ntemplate: \"first\"\n"),
            ("b_second.yml", "id: dup\nversion: v1\ntemplate: \"second\"\n"),
        ]);

        let rendered = registry.render("dup", Some("v1"), &serde_json::Map::new()).unwrap();
        assert_eq!(rendered.prompt.as_deref(), Some("second"));
    }

    #[test]
    fn unknown_prompt_is_not_found() {
        let registry = registry_with(&[]);

        let err = registry.get_entry("nope", None).unwrap_err();
        assert!(matches!(err, PromptError::NotFound(_)));
    }

    #[test]
    fn complexity_tag_is_exposed() {
        let registry = registry_with(&[(
            "seg.yml",
            indoc::indoc! {r#"
                id: podcast_segment
                meta:
                  complexity: synthesis
                template: "{{ x }}"
            "#},
        )]);

        let entry = registry.get_entry("podcast_segment", None).unwrap();
        assert_eq!(entry.complexity(), Some("synthesis"));
    }
}
