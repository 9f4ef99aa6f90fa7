// Mock interview flow: session state machine, AI delegates, records.
// All LLM calls go through llm_client.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod questions;
pub mod records;
pub mod report;
pub mod service;
pub mod session;
pub mod speech;
pub mod store;
