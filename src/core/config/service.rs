use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::paths::AppPaths;
use super::settings::AppSettings;
use super::validation::validate_config;
use crate::core::errors::RagError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "access_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("CODEMENTOR_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config merged with secrets and environment overrides.
    pub fn load_config(&self) -> Result<Value, RagError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let merged = deep_merge(&public_config, &secrets_config);
        Ok(apply_env_overrides(merged, |key| env::var(key).ok()))
    }

    pub fn settings(&self) -> Result<AppSettings, RagError> {
        let config = self.load_config()?;
        settings_from_value(config)
    }

    /// Writes the default template unless a config file already exists.
    pub fn ensure_config_file(&self) -> Result<PathBuf, RagError> {
        let path = self.config_path();
        if path.exists() {
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let yaml = serde_yaml::to_string(&default_config()).map_err(RagError::internal)?;
        fs::write(&path, yaml).map_err(RagError::internal)?;
        tracing::info!("Wrote default config to {}", path.display());
        Ok(path)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: Value) -> Result<AppSettings, RagError> {
    validate_config(&config)?;
    serde_json::from_value(config).map_err(|e| RagError::Config(e.to_string()))
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(e) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), e);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides<F>(config: Value, lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut overrides = Map::new();
    let mut llm = Map::new();
    let mut embedding = Map::new();

    if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
        let has_llm_key = config
            .pointer("/llm/api_key")
            .and_then(Value::as_str)
            .is_some_and(|k| !k.is_empty());
        if !has_llm_key {
            llm.insert("api_key".to_string(), Value::String(key.clone()));
        }
        let has_embedding_key = config
            .pointer("/embedding/api_key")
            .and_then(Value::as_str)
            .is_some_and(|k| !k.is_empty());
        if !has_embedding_key {
            embedding.insert("api_key".to_string(), Value::String(key));
        }
    }
    if let Some(model) = lookup("MODEL_NAME").filter(|m| !m.trim().is_empty()) {
        llm.insert("model".to_string(), Value::String(model));
    }
    if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
        llm.insert("base_url".to_string(), Value::String(url));
    }

    if !llm.is_empty() {
        overrides.insert("llm".to_string(), Value::Object(llm));
    }
    if !embedding.is_empty() {
        overrides.insert("embedding".to_string(), Value::Object(embedding));
    }

    deep_merge(&config, &Value::Object(overrides))
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
