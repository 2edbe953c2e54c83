use serde_json::{json, Value};

/// Baseline configuration document. A user `config.yml` is deep-merged over
/// this, so every key a getter reads exists even with no file on disk.
pub fn default_config() -> Value {
    json!({
        "server": {
            "host": "127.0.0.1",
            "port": 8750
        },
        "storage": {
            "database_file": "magpie.db"
        },
        "llm": {
            "connect_timeout_secs": 10,
            "embed_timeout_secs": 60,
            "read_timeout_secs": 60
        },
        "rag": {
            "default_chunk_size": 500,
            "default_chunk_overlap": 50,
            "default_top_k": 3,
            "session_capacity": 64
        }
    })
}
