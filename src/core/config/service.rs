use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::paths::AppPaths;
use super::validation::validate_config;
use crate::core::errors::ApiError;

/// Merged view of the embedded defaults and the optional user `config.yml`.
/// Loaded once at startup; the service is cheap to clone and hand around.
#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
    merged: Value,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub connect_timeout: Duration,
    pub embed_timeout: Duration,
    pub read_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub default_chunk_size: usize,
    pub default_chunk_overlap: usize,
    pub default_top_k: usize,
    pub session_capacity: usize,
}

impl ConfigService {
    pub fn load(paths: Arc<AppPaths>) -> Result<Self, ApiError> {
        let user = load_yaml_file(&paths.config_file());
        let merged = deep_merge(&default_config(), &user);
        validate_config(&merged)?;
        Ok(Self { paths, merged })
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Reads a value by dot-separated path, e.g. `"rag.default_top_k"`.
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        let mut current = &self.merged;
        for part in path.split('.') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get_value(path)?.as_u64()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_value(path)?.as_str()
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            host: self
                .get_str("server.host")
                .unwrap_or("127.0.0.1")
                .to_string(),
            port: self
                .get_u64("server.port")
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(8750),
        }
    }

    pub fn llm_settings(&self) -> LlmSettings {
        let secs = |path: &str, fallback: u64| {
            Duration::from_secs(self.get_u64(path).unwrap_or(fallback))
        };
        LlmSettings {
            connect_timeout: secs("llm.connect_timeout_secs", 10),
            embed_timeout: secs("llm.embed_timeout_secs", 60),
            read_timeout: secs("llm.read_timeout_secs", 60),
        }
    }

    pub fn rag_settings(&self) -> RagSettings {
        let num = |path: &str, fallback: usize| {
            self.get_u64(path)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(fallback)
        };
        RagSettings {
            default_chunk_size: num("rag.default_chunk_size", 500),
            default_chunk_overlap: num("rag.default_chunk_overlap", 50),
            default_top_k: num("rag.default_top_k", 3),
            session_capacity: num("rag.session_capacity", 64),
        }
    }

    pub fn database_file(&self) -> String {
        self.get_str("storage.database_file")
            .unwrap_or("magpie.db")
            .to_string()
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "config file is not a mapping, ignoring");
                Value::Object(Map::new())
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to parse config file, using defaults");
                Value::Object(Map::new())
            }
        },
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "failed to read config file, using defaults");
            Value::Object(Map::new())
        }
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_paths(dir: &tempfile::TempDir) -> Arc<AppPaths> {
        Arc::new(AppPaths {
            data_dir: dir.path().to_path_buf(),
            config_dir: dir.path().to_path_buf(),
            log_dir: dir.path().join("logs"),
        })
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "server": { "host": "127.0.0.1", "port": 8750 },
            "rag": { "default_top_k": 3 }
        });
        let override_value = json!({
            "server": { "port": 9000 },
            "extra": true
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "server": { "host": "127.0.0.1", "port": 9000 },
                "rag": { "default_top_k": 3 },
                "extra": true
            })
        );
    }

    #[test]
    fn load_without_user_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::load(temp_paths(&dir)).unwrap();

        assert_eq!(service.server_settings().port, 8750);
        assert_eq!(service.rag_settings().default_chunk_size, 500);
        assert_eq!(service.rag_settings().default_chunk_overlap, 50);
        assert_eq!(service.llm_settings().embed_timeout, Duration::from_secs(60));
        assert_eq!(service.database_file(), "magpie.db");
    }

    #[test]
    fn user_file_overrides_defaults_per_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "server:\n  port: 9001\nrag:\n  default_top_k: 5\n",
        )
        .unwrap();

        let service = ConfigService::load(temp_paths(&dir)).unwrap();

        assert_eq!(service.server_settings().port, 9001);
        assert_eq!(service.server_settings().host, "127.0.0.1");
        assert_eq!(service.rag_settings().default_top_k, 5);
        assert_eq!(service.rag_settings().default_chunk_size, 500);
    }

    #[test]
    fn load_rejects_overlap_not_smaller_than_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "rag:\n  default_chunk_size: 50\n  default_chunk_overlap: 50\n",
        )
        .unwrap();

        assert!(ConfigService::load(temp_paths(&dir)).is_err());
    }

    #[test]
    fn get_value_walks_dot_paths() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::load(temp_paths(&dir)).unwrap();

        assert_eq!(service.get_u64("rag.session_capacity"), Some(64));
        assert_eq!(service.get_str("storage.database_file"), Some("magpie.db"));
        assert!(service.get_value("rag.nope").is_none());
        assert!(service.get_value("nope.at.all").is_none());
    }
}
