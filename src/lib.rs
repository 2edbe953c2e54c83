//! Retrieval-augmented generation backend.
//!
//! Serves a small HTTP API for registering model-serving agents and
//! document knowledge bases, and for answering questions against a
//! knowledge base with context retrieved by embedding similarity. The
//! completion endpoint's NDJSON stream is relayed to the caller as-is.

pub mod core;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod registry;
pub mod server;
pub mod state;
