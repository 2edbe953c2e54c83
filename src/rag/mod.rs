//! Retrieval-augmented generation pipeline.
//!
//! This module provides:
//! - `Chunker`: Splits a document into fixed-size overlapping windows
//! - `VectorIndex`: Flat index answering nearest-neighbour queries exactly
//! - `RagEngine`: Ties chunking, embedding and search into one retriever
//! - `SessionCache`: Shares built engines per (requester, knowledge base)
//! - `augment`: Folds retrieved context and the question into one prompt

mod chunker;
mod engine;
mod index;
mod prompt;
mod session;

#[cfg(test)]
mod tests;

pub use chunker::{Chunk, Chunker};
pub use engine::RagEngine;
pub use index::VectorIndex;
pub use prompt::augment;
pub use session::{BuildState, CacheStats, SessionCache, SessionKey};
