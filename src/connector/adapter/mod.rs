mod anthropic_generator;
mod duckdb_metadata_repository;
mod duckdb_symbol_store;
mod duckdb_vector_index;
mod gemini_embedding;
mod git_cloner;
mod hash_embedding;
mod in_memory_symbol_store;
mod in_memory_vector_index;
mod local_object_store;
mod memory_cache;
mod memory_work_queue;
mod tar_packager;
mod token_bucket;
mod treesitter_parser;

pub use anthropic_generator::*;
pub use duckdb_metadata_repository::*;
pub use duckdb_symbol_store::*;
pub use duckdb_vector_index::*;
pub use gemini_embedding::*;
pub use git_cloner::*;
pub use hash_embedding::*;
pub use in_memory_symbol_store::*;
pub use in_memory_vector_index::*;
pub use local_object_store::*;
pub use memory_cache::*;
pub use memory_work_queue::*;
pub use tar_packager::*;
pub use token_bucket::*;
pub use treesitter_parser::*;
