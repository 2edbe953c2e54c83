use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_required_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65_535)?;
    }

    if let Some(storage) = expect_optional_object(root, "storage")? {
        validate_required_string_field(storage, "storage.database_file", "database_file")?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_u64_field(llm, "llm.connect_timeout_secs", "connect_timeout_secs", 1, 3_600)?;
        validate_u64_field(llm, "llm.embed_timeout_secs", "embed_timeout_secs", 1, 86_400)?;
        validate_u64_field(llm, "llm.read_timeout_secs", "read_timeout_secs", 1, 86_400)?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.default_chunk_size", "default_chunk_size", 1, 10_000_000)?;
        validate_u64_field(
            rag,
            "rag.default_chunk_overlap",
            "default_chunk_overlap",
            0,
            10_000_000,
        )?;
        validate_u64_field(rag, "rag.default_top_k", "default_top_k", 1, 10_000)?;
        validate_u64_field(rag, "rag.session_capacity", "session_capacity", 1, 100_000)?;

        // A window that never advances would make every build loop forever.
        let size = rag.get("default_chunk_size").and_then(Value::as_u64);
        let overlap = rag.get("default_chunk_overlap").and_then(Value::as_u64);
        if let (Some(size), Some(overlap)) = (size, overlap) {
            if overlap >= size {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at 'rag.default_chunk_overlap': must be smaller than default_chunk_size ({} >= {})",
                    overlap, size
                )));
            }
        }
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let value = section.get(key).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
