pub mod aggregator;
pub mod config;
pub mod document;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod roles;
pub mod tools;
