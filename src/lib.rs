#![deny(missing_docs)]

//! Core library for the docsum document summarization server.

/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// External text extraction tool integration.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Document-to-summary orchestration.
pub mod pipeline;
/// Prompt templates.
pub mod prompt;
/// Generative-language summarization client.
pub mod summarization;
/// Upload validation and temporary storage.
pub mod upload;
