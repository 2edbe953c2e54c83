//! Retrieval engine for one knowledge base: build once, query many.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::core::errors::RagError;
use crate::llm::Embedder;

use super::chunker::{Chunk, Chunker};
use super::index::VectorIndex;

/// Everything a successful build produces. Assigned as one unit, so a
/// partially embedded knowledge base is unrepresentable.
struct BuiltIndex {
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

/// Owns the chunker output, the embedding seam and the vector index for one
/// knowledge base.
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    built: Option<BuiltIndex>,
}

impl RagEngine {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            built: None,
        }
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.chunks.len())
    }

    /// Chunks the document and embeds every chunk in order, so vector `i`
    /// belongs to chunk `i`, then packs the index. The first embedding failure
    /// aborts the whole build and leaves the engine unbuilt.
    pub async fn build(
        &mut self,
        document: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<(), RagError> {
        let chunker = Chunker::new(chunk_size, chunk_overlap)?;
        let chunks = chunker.chunk(document);

        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .map_err(RagError::BuildFailed)?;
            vectors.push(vector);
        }

        let index = VectorIndex::build(&vectors)?;
        info!(
            chunks = chunks.len(),
            dim = index.dim(),
            "knowledge base index built"
        );
        self.built = Some(BuiltIndex { chunks, index });
        Ok(())
    }

    /// Embeds the query and returns up to `k` chunk texts in ranked order.
    /// Fails with `IndexNotBuilt` before a successful build; an empty index
    /// answers without calling the embedding backend at all.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RagError> {
        let built = self.built.as_ref().ok_or(RagError::IndexNotBuilt)?;
        if built.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let ranked = built.index.search(&query_vector, k)?;
        Ok(ranked
            .into_iter()
            .map(|(row, _)| built.chunks[row].text.clone())
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn chunks(&self) -> &[Chunk] {
        self.built.as_ref().map_or(&[], |b| &b.chunks)
    }
}

// The embedder is a bare trait object, so Debug covers the build state only.
impl fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagEngine")
            .field("built", &self.is_built())
            .field("chunks", &self.chunk_count())
            .finish_non_exhaustive()
    }
}
