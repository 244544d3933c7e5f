//! Vector store adapter
//!
//! Abstracts any engine that can hold embedding-indexed memory rows
//! with per-owner scoping. Two implementations: Postgres with pgvector
//! (production) and an in-memory map (tests and the conformance
//! suite).

pub mod memory_store;
pub mod postgres;
pub mod vector_store;

pub use memory_store::MemoryVectorStore;
pub use postgres::PostgresVectorStore;
pub use vector_store::{content_hash, SearchFilters, VectorStore};
