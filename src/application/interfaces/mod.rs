mod cache;
mod cloner_service;
mod embedding_service;
mod generator_client;
mod metadata_repository;
mod object_store;
mod parser_service;
mod source_archive;
mod symbol_store;
mod vector_index;
mod work_queue;

pub use cache::*;
pub use cloner_service::*;
pub use embedding_service::*;
pub use generator_client::*;
pub use metadata_repository::*;
pub use object_store::*;
pub use parser_service::*;
pub use source_archive::*;
pub use symbol_store::*;
pub use vector_index::*;
pub use work_queue::*;
