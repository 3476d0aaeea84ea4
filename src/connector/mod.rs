//! # Connector Layer
//!
//! External integrations implementing the application interfaces:
//! Tree-sitter parsing, git cloning, DuckDB storage, filesystem object
//! storage, embedding and generation clients, caches and queues.

pub mod adapter;
pub mod container;

pub use adapter::*;
pub use container::*;
