pub mod completion;
pub mod embedding;
pub mod types;


pub use completion::CompletionClient;
pub use embedding::{Embedder, HttpEmbedder};
pub use types::{ChatMessage, ChatRequest, StreamEvent};
