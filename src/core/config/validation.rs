use serde_json::{Map, Value};

use crate::core::errors::RagError;

pub fn validate_config(config: &Value) -> Result<(), RagError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_optional_string_field(rag, "rag.collection_name", "collection_name")?;
        validate_optional_string_field(rag, "rag.persist_directory", "persist_directory")?;
        validate_enum_field(
            rag,
            "rag.distance_metric",
            "distance_metric",
            &["cosine", "l2"],
        )?;
        validate_u64_field(rag, "rag.batch_size", "batch_size", 1, 10_000)?;
        validate_u64_field(rag, "rag.chunk_max_length", "chunk_max_length", 1, 1_000_000)?;
        validate_u64_field(rag, "rag.chunk_threshold", "chunk_threshold", 1, 10_000_000)?;
        validate_bool_field(rag, "rag.hard_split", "hard_split")?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_enum_field(
            embedding,
            "embedding.provider",
            "provider",
            &["hashing", "openai"],
        )?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.dimension", "dimension", 1, 65_536)?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 86_400)?;

        if let Some(retry) = expect_optional_object(llm, "retry")? {
            validate_u64_field(retry, "llm.retry.max_attempts", "max_attempts", 1, 20)?;
            validate_u64_field(retry, "llm.retry.multiplier_secs", "multiplier_secs", 0, 3_600)?;
            validate_u64_field(retry, "llm.retry.min_delay_secs", "min_delay_secs", 0, 3_600)?;
            validate_u64_field(retry, "llm.retry.max_delay_secs", "max_delay_secs", 0, 3_600)?;
        }
    }

    if let Some(qa) = expect_optional_object(root, "qa")? {
        validate_optional_string_field(qa, "qa.language", "language")?;
        validate_optional_string_field(qa, "qa.level", "level")?;
        validate_bool_field(qa, "qa.include_examples", "include_examples")?;
        validate_u64_field(qa, "qa.n_context_docs", "n_context_docs", 1, 100)?;
        validate_u64_field(qa, "qa.max_sources", "max_sources", 1, 3)?;
        validate_u64_field(qa, "qa.preview_chars", "preview_chars", 1, 100_000)?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, RagError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(RagError::Config(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn config_type_error(path: &str, expected: &str) -> RagError {
    RagError::Config(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_default_template() {
        assert!(validate_config(&crate::core::config::defaults::default_config()).is_ok());
    }

    #[test]
    fn rejects_unknown_metric() {
        let err = validate_config(&json!({ "rag": { "distance_metric": "dot" } })).unwrap_err();
        assert!(err.to_string().contains("rag.distance_metric"));
    }

    #[test]
    fn rejects_wrong_types_and_ranges() {
        assert!(validate_config(&json!({ "qa": "fast" })).is_err());
        assert!(validate_config(&json!({ "qa": { "include_examples": "yes" } })).is_err());
        assert!(validate_config(&json!({ "qa": { "n_context_docs": 0 } })).is_err());
        assert!(validate_config(&json!({ "llm": { "temperature": 3.5 } })).is_err());
        assert!(validate_config(&json!({ "llm": { "retry": { "max_attempts": 0 } } })).is_err());
        assert!(validate_config(&json!({ "embedding": { "model": "  " } })).is_err());
        assert!(validate_config(&json!({ "qa": { "max_sources": 5 } })).is_err());
        assert!(validate_config(&json!({ "qa": { "max_sources": 2 } })).is_ok());
    }

    #[test]
    fn null_secrets_are_allowed() {
        assert!(validate_config(&json!({ "llm": { "api_key": null } })).is_ok());
    }
}
