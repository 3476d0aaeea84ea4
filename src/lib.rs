//! # CodeQuery
//!
//! Ingests public source repositories and answers natural-language
//! questions about them by combining a structural symbol graph with
//! semantic vector retrieval and a text generator.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models, configuration, and error types
//! - `application`: Capability interfaces and orchestration use cases
//! - `connector`: External integrations (DuckDB, Tree-sitter, git,
//!   object storage, embedding and generation clients)

pub mod application;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
