use std::{fmt::Write, path::Path, sync::OnceLock};

use anyhow::bail;
use indoc::indoc;
use regex::Regex;
use serde::Deserialize;
use toml::Value;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate_routing(&config)?;

    Ok(config)
}

/// Matches `{{ env.SOME_VAR }}` placeholders inside configuration strings.
fn env_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid"))
}

fn expand_env(input: &str) -> anyhow::Result<String> {
    let re = env_placeholder();
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];

        out.push_str(&input[last..whole.start()]);

        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => bail!("environment variable '{name}' is not set"),
        }

        last = whole.end();
    }

    out.push_str(&input[last..]);
    Ok(out)
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match expand_env(s) {
            Ok(out) => *s = out,
            Err(err) => {
                let mut p = String::new();

                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            // Keys are iterated in place; the values can contain further
            // placeholders at any depth.
            for (key, value) in map.iter_mut() {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        _ => {}
    }

    Ok(())
}

pub(crate) fn validate_routing(config: &Config) -> anyhow::Result<()> {
    if config.gateway.providers.is_empty() {
        return Ok(());
    }

    if !config.gateway.routing.is_empty() && !config.gateway.routing.contains_key("default") {
        bail!(indoc! {r#"
            The auto-router table has no 'default' entry. Requests without a
            prompt complexity tag cannot be routed without one.

            Example configuration:

              [gateway.routing]
              default = { provider = "openai", model = "z-ai/glm-4.5-air:free" }
        "#});
    }

    for (complexity, target) in &config.gateway.routing {
        if !config.gateway.providers.contains_key(&target.provider) {
            bail!(
                "Auto-router entry '{complexity}' references provider '{}' which is not configured",
                target.provider
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        let mut raw: Value = toml::from_str(toml).unwrap();
        expand_dynamic_strings(&mut Vec::new(), &mut raw).unwrap();
        Config::deserialize(raw).unwrap()
    }

    #[test]
    fn expands_env_placeholders() {
        // Process-wide env mutation; use a name no other test touches.
        unsafe { std::env::set_var("FYLR_TEST_DB_USER", "ingest") };

        let config = parse(indoc::indoc! {r#"
            [database]
            user = "{{ env.FYLR_TEST_DB_USER }}"
        "#});

        assert_eq!(config.database.user, "ingest");
    }

    #[test]
    fn missing_env_variable_names_the_path() {
        let mut raw: Value = toml::from_str(indoc::indoc! {r#"
            [database]
            host = "{{ env.FYLR_TEST_UNSET_VARIABLE }}"
        "#})
        .unwrap();

        let err = expand_dynamic_strings(&mut Vec::new(), &mut raw).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("database.host"), "{message}");
        assert!(message.contains("FYLR_TEST_UNSET_VARIABLE"), "{message}");
    }

    #[test]
    fn loads_a_config_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fylr.toml");

        std::fs::write(
            &path,
            indoc::indoc! {r#"
                [server]
                listen_address = "0.0.0.0:8123"

                [database]
                name = "fylr_test"
            "#},
        )
        .unwrap();

        let config = load(&path).unwrap();

        assert_eq!(config.server.listen_address().port(), 8123);
        assert_eq!(config.database.name, "fylr_test");
    }

    #[test]
    fn routing_requires_default_entry() {
        let config = parse(indoc::indoc! {r#"
            [gateway.providers.openai]
            type = "openai"
            api_key = "test"
            base_url = "http://localhost:11434/v1"

            [gateway.routing]
            synthesis = { provider = "openai", model = "x-ai/grok-4-fast" }
        "#});

        let err = validate_routing(&config).unwrap_err();
        assert!(err.to_string().contains("no 'default' entry"), "{err}");
    }

    #[test]
    fn routing_rejects_unknown_provider() {
        let config = parse(indoc::indoc! {r#"
            [gateway.providers.openai]
            type = "openai"
            api_key = "test"
            base_url = "http://localhost:11434/v1"

            [gateway.routing]
            default = { provider = "groq", model = "llama3-70b-8192" }
        "#});

        let err = validate_routing(&config).unwrap_err();
        assert!(err.to_string().contains("'groq'"), "{err}");
    }
}
