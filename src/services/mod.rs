pub mod files;
pub mod llm;
pub mod store;
