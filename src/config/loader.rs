//! Configuration loading
//!
//! `chunker.config.{toml,yaml,yml,json}` is located by walking parent
//! directories from a starting point, then `~/.chunker/config.*` as the
//! user-level fallback. String values are `${VAR}` / `${VAR:default}`
//! expanded, `CHUNKER_`-prefixed environment variables override file
//! values, and a malformed file is fatal at load time.

use crate::config::types::{ChunkerConfig, PluginConfig};
use crate::domain::error::{Error, Result};
use figment::providers::{Format, Json, Toml, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_STEMS: &[&str] = &[
    "chunker.config.toml",
    "chunker.config.yaml",
    "chunker.config.yml",
    "chunker.config.json",
];

const USER_CONFIG_STEMS: &[&str] = &[
    "config.toml",
    "config.yaml",
    "config.yml",
    "config.json",
];

/// Locate the nearest configuration file.
///
/// Walks from `start` to the filesystem root, then looks under
/// `~/.chunker/`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        for stem in CONFIG_STEMS {
            let candidate = dir.join(stem);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        current = dir.parent();
    }

    let home = dirs::home_dir()?;
    for stem in USER_CONFIG_STEMS {
        let candidate = home.join(".chunker").join(stem);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Load configuration from an explicit file
pub fn load_config(path: &Path) -> Result<ChunkerConfig> {
    let figment = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Figment::new().merge(Toml::file(path)),
        Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
        Some("json") => Figment::new().merge(Json::file(path)),
        other => {
            return Err(Error::config(format!(
                "unsupported config extension {other:?} for {}",
                path.display()
            )));
        }
    };

    let mut config: ChunkerConfig = figment.extract().map_err(|e| Error::InvalidConfig {
        message: format!("malformed configuration {}", path.display()),
        source: Some(Box::new(e)),
    })?;

    expand_config(&mut config, path.parent().unwrap_or(Path::new(".")))?;
    apply_env_overrides(&mut config, std::env::vars());

    debug!(config = %path.display(), "configuration loaded");
    Ok(config)
}

/// Find and load the nearest configuration; defaults when none exists
pub fn load_or_default(start: &Path) -> Result<ChunkerConfig> {
    match find_config(start) {
        Some(path) => load_config(&path),
        None => Ok(ChunkerConfig::default()),
    }
}

/// Expand `${VAR}` / `${VAR:default}` and `~` in string values, and
/// resolve relative plugin directories against the config file location.
fn expand_config(config: &mut ChunkerConfig, config_dir: &Path) -> Result<()> {
    let mut resolved = Vec::with_capacity(config.chunker.plugin_dirs.len());
    for dir in &config.chunker.plugin_dirs {
        let expanded = expand_str(&dir.to_string_lossy())?;
        let path = PathBuf::from(expanded);
        resolved.push(if path.is_relative() {
            config_dir.join(path)
        } else {
            path
        });
    }
    config.chunker.plugin_dirs = resolved;

    for plugin in config
        .languages
        .values_mut()
        .chain(std::iter::once(&mut config.chunker.default_plugin_config))
    {
        for value in plugin.custom_options.values_mut() {
            if let serde_json::Value::String(text) = value {
                *text = expand_str(text)?;
            }
        }
    }

    Ok(())
}

/// Expand environment references in one string value.
///
/// `${VAR}` fails soft to an empty string; `${VAR:default}` falls back
/// to the default.
pub fn expand_str(input: &str) -> Result<String> {
    // `${VAR:default}` first, since shellexpand has no default syntax
    let with_defaults = expand_defaults(input);
    let expanded = shellexpand::full_with_context_no_errors(
        &with_defaults,
        || dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
        |var| Some(std::env::var(var).unwrap_or_default()),
    );
    Ok(expanded.into_owned())
}

fn expand_defaults(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };
        let inner = &rest[start + 2..start + end];
        match inner.split_once(':') {
            Some((var, default)) => {
                let value = std::env::var(var).unwrap_or_else(|_| default.to_owned());
                output.push_str(&value);
            }
            None => {
                // Leave plain ${VAR} for shellexpand
                output.push_str(&rest[start..=start + end]);
            }
        }
        rest = &rest[start + end + 1..];
    }
    output.push_str(rest);
    output
}

/// Apply `CHUNKER_`-prefixed environment overrides.
///
/// Recognized shapes: `CHUNKER_ENABLED_LANGUAGES`, `CHUNKER_PLUGIN_DIRS`
/// (comma-separated lists), `CHUNKER_DEFAULT_PLUGIN_CONFIG_<FIELD>` and
/// `CHUNKER_LANGUAGES_<LANG>_<FIELD>`; unrecognized language fields land
/// in `custom_options`.
pub fn apply_env_overrides<I>(config: &mut ChunkerConfig, vars: I)
where
    I: Iterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix("CHUNKER_") else {
            continue;
        };

        match rest {
            "ENABLED_LANGUAGES" => {
                config.chunker.enabled_languages = Some(split_list(&value));
            }
            "PLUGIN_DIRS" => {
                config.chunker.plugin_dirs = split_list(&value).into_iter().map(Into::into).collect();
            }
            _ => {
                if let Some(field) = rest.strip_prefix("DEFAULT_PLUGIN_CONFIG_") {
                    apply_plugin_field(&mut config.chunker.default_plugin_config, field, &value);
                } else if let Some(lang_field) = rest.strip_prefix("LANGUAGES_") {
                    let Some((language, field)) = lang_field.split_once('_') else {
                        continue;
                    };
                    let plugin = config
                        .languages
                        .entry(language.to_lowercase())
                        .or_default();
                    apply_plugin_field(plugin, field, &value);
                }
            }
        }
    }
}

fn apply_plugin_field(plugin: &mut PluginConfig, field: &str, value: &str) {
    match field {
        "ENABLED" => {
            if let Some(enabled) = parse_bool(value) {
                plugin.enabled = enabled;
            }
        }
        "MIN_CHUNK_SIZE" => {
            if let Ok(size) = value.parse() {
                plugin.min_chunk_size = size;
            }
        }
        "MAX_CHUNK_SIZE" => {
            if let Ok(size) = value.parse() {
                plugin.max_chunk_size = size;
            }
        }
        "CHUNK_TYPES" => {
            plugin.chunk_types = split_list(value).into_iter().collect();
        }
        other => {
            plugin.custom_options.insert(
                other.to_lowercase(),
                serde_json::Value::String(value.to_owned()),
            );
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_config_in_parent_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join("chunker.config.toml"),
            "[chunker]\nenabled_languages = [\"python\"]\n",
        )
        .unwrap();

        let found = find_config(&nested).expect("config file");
        assert!(found.ends_with("chunker.config.toml"));
    }

    #[test]
    fn toml_config_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunker.config.toml");
        std::fs::write(
            &path,
            r#"
[chunker]
plugin_dirs = ["./plugins"]
enabled_languages = ["python", "rust"]

[chunker.default_plugin_config]
min_chunk_size = 3
max_chunk_size = 300

[languages.python]
enabled = true
min_chunk_size = 5
chunk_types = ["function_definition", "class_definition"]

[processors.markdown_sections]
enabled = true
priority = 7
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.chunker.enabled_languages,
            Some(vec!["python".to_owned(), "rust".to_owned()])
        );
        assert_eq!(config.chunker.default_plugin_config.min_chunk_size, 3);
        assert_eq!(config.plugin_config("python").min_chunk_size, 5);
        assert_eq!(config.plugin_config("go").min_chunk_size, 3);
        assert_eq!(config.processors["markdown_sections"].priority, 7);

        // Relative plugin dirs resolve against the config file
        assert!(config.chunker.plugin_dirs[0].starts_with(dir.path()));
        assert!(config.language_enabled("python"));
        assert!(!config.language_enabled("go"));
    }

    #[test]
    fn malformed_config_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunker.config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn env_overrides_lists_and_fields() {
        let mut config = ChunkerConfig::default();
        let vars = vec![
            (
                "CHUNKER_ENABLED_LANGUAGES".to_owned(),
                "python,rust,javascript".to_owned(),
            ),
            (
                "CHUNKER_LANGUAGES_PYTHON_MIN_CHUNK_SIZE".to_owned(),
                "10".to_owned(),
            ),
            (
                "CHUNKER_LANGUAGES_PYTHON_ENABLED".to_owned(),
                "FALSE".to_owned(),
            ),
            (
                "CHUNKER_DEFAULT_PLUGIN_CONFIG_MAX_CHUNK_SIZE".to_owned(),
                "2000".to_owned(),
            ),
            (
                "CHUNKER_LANGUAGES_PYTHON_INCLUDE_DOCSTRINGS".to_owned(),
                "true".to_owned(),
            ),
            ("UNRELATED".to_owned(), "ignored".to_owned()),
        ];

        apply_env_overrides(&mut config, vars.into_iter());

        assert_eq!(
            config.chunker.enabled_languages.as_ref().unwrap().len(),
            3
        );
        assert_eq!(config.languages["python"].min_chunk_size, 10);
        assert!(!config.languages["python"].enabled);
        assert_eq!(config.chunker.default_plugin_config.max_chunk_size, 2000);
        assert_eq!(
            config.languages["python"].custom_options["include_docstrings"],
            serde_json::json!("true")
        );
    }

    #[test]
    #[serial_test::serial]
    fn default_expansion_prefers_env_value() {
        unsafe { std::env::remove_var("CC_TEST_MISSING") };
        assert_eq!(
            expand_str("${CC_TEST_MISSING:fallback}").unwrap(),
            "fallback"
        );

        unsafe { std::env::set_var("CC_TEST_PRESENT", "actual") };
        assert_eq!(expand_str("${CC_TEST_PRESENT:fallback}").unwrap(), "actual");
        unsafe { std::env::remove_var("CC_TEST_PRESENT") };
    }
}
