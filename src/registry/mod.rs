use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub document: String,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub agent_id: String,
    pub embedding_model: String,
    pub created_at: String,
}

/// Listing row: everything but the document body, plus its length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseSummary {
    pub id: String,
    pub name: String,
    pub document_chars: i64,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub agent_id: String,
    pub embedding_model: String,
    pub created_at: String,
}

impl From<&KnowledgeBase> for KnowledgeBaseSummary {
    fn from(kb: &KnowledgeBase) -> Self {
        Self {
            id: kb.id.clone(),
            name: kb.name.clone(),
            // LENGTH() on sqlite TEXT counts characters, so the listing and
            // this conversion agree on the unit.
            document_chars: kb.document.chars().count() as i64,
            chunk_size: kb.chunk_size,
            chunk_overlap: kb.chunk_overlap,
            agent_id: kb.agent_id.clone(),
            embedding_model: kb.embedding_model.clone(),
            created_at: kb.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewKnowledgeBase {
    pub name: String,
    pub document: String,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub agent_id: String,
    pub embedding_model: String,
}

#[derive(Clone)]
pub struct RegistryStore {
    pool: SqlitePool,
}

impl RegistryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to registry db: {}", e)))?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to enable foreign keys: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init agents table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_bases (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                document TEXT NOT NULL,
                chunk_size INTEGER NOT NULL,
                chunk_overlap INTEGER NOT NULL,
                agent_id TEXT NOT NULL,
                embedding_model TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY(agent_id) REFERENCES agents(id)
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init knowledge_bases table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_bases_agent_id \
             ON knowledge_bases(agent_id)",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn create_agent(&self, name: &str, base_url: &str) -> Result<Agent, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO agents (id, name, base_url, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(base_url)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create agent: {}", e)))?;

        Ok(Agent {
            id,
            name: name.to_string(),
            base_url: base_url.to_string(),
            created_at: now,
        })
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>, ApiError> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|row| Agent {
            id: row.try_get::<String, _>("id").unwrap_or_default(),
            name: row.try_get::<String, _>("name").unwrap_or_default(),
            base_url: row.try_get::<String, _>("base_url").unwrap_or_default(),
            created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
        }))
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ApiError> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(Agent {
                id: row.try_get::<String, _>("id").unwrap_or_default(),
                name: row.try_get::<String, _>("name").unwrap_or_default(),
                base_url: row.try_get::<String, _>("base_url").unwrap_or_default(),
                created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
            });
        }
        Ok(agents)
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(agent_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }

    /// How many knowledge bases still point at the agent. Deletion is
    /// refused upstream while this is non-zero.
    pub async fn count_knowledge_bases_for_agent(&self, agent_id: &str) -> Result<i64, ApiError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM knowledge_bases WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get(0))
            .unwrap_or(0);
        Ok(count)
    }

    pub async fn create_knowledge_base(
        &self,
        new: &NewKnowledgeBase,
    ) -> Result<KnowledgeBase, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO knowledge_bases \
             (id, name, document, chunk_size, chunk_overlap, agent_id, embedding_model, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.document)
        .bind(new.chunk_size)
        .bind(new.chunk_overlap)
        .bind(&new.agent_id)
        .bind(&new.embedding_model)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create knowledge base: {}", e)))?;

        Ok(KnowledgeBase {
            id,
            name: new.name.clone(),
            document: new.document.clone(),
            chunk_size: new.chunk_size,
            chunk_overlap: new.chunk_overlap,
            agent_id: new.agent_id.clone(),
            embedding_model: new.embedding_model.clone(),
            created_at: now,
        })
    }

    pub async fn get_knowledge_base(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Option<KnowledgeBase>, ApiError> {
        let row = sqlx::query("SELECT * FROM knowledge_bases WHERE id = ?")
            .bind(knowledge_base_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|row| KnowledgeBase {
            id: row.try_get::<String, _>("id").unwrap_or_default(),
            name: row.try_get::<String, _>("name").unwrap_or_default(),
            document: row.try_get::<String, _>("document").unwrap_or_default(),
            chunk_size: row.try_get::<i64, _>("chunk_size").unwrap_or_default(),
            chunk_overlap: row.try_get::<i64, _>("chunk_overlap").unwrap_or_default(),
            agent_id: row.try_get::<String, _>("agent_id").unwrap_or_default(),
            embedding_model: row.try_get::<String, _>("embedding_model").unwrap_or_default(),
            created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
        }))
    }

    /// Listing skips the document body so large corpora stay off the wire.
    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBaseSummary>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, name, LENGTH(document) AS document_chars, chunk_size, chunk_overlap, \
             agent_id, embedding_model, created_at \
             FROM knowledge_bases \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(KnowledgeBaseSummary {
                id: row.try_get::<String, _>("id").unwrap_or_default(),
                name: row.try_get::<String, _>("name").unwrap_or_default(),
                document_chars: row.try_get::<i64, _>("document_chars").unwrap_or_default(),
                chunk_size: row.try_get::<i64, _>("chunk_size").unwrap_or_default(),
                chunk_overlap: row.try_get::<i64, _>("chunk_overlap").unwrap_or_default(),
                agent_id: row.try_get::<String, _>("agent_id").unwrap_or_default(),
                embedding_model: row.try_get::<String, _>("embedding_model").unwrap_or_default(),
                created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
            });
        }
        Ok(summaries)
    }

    pub async fn delete_knowledge_base(&self, knowledge_base_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM knowledge_bases WHERE id = ?")
            .bind(knowledge_base_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }
}
