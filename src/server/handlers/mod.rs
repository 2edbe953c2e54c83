pub mod agents;
pub mod health;
pub mod knowledge_bases;
pub mod query;
