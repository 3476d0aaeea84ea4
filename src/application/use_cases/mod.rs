mod call_graph_builder;
mod chunker;
mod delete_repository;
mod hybrid_query;
mod import_resolver;
mod ingest_repository;
mod query_router;
mod static_query;
mod symbol_indexer;

pub use call_graph_builder::*;
pub use chunker::*;
pub use delete_repository::*;
pub use hybrid_query::*;
pub use import_resolver::*;
pub use ingest_repository::*;
pub use query_router::*;
pub use static_query::*;
pub use symbol_indexer::*;
