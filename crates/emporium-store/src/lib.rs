//! Emporium Store: `DocumentStore` implementations.
//!
//! `MemoryDocumentStore` backs tests and single-process development runs.
//! `PgDocumentStore` keeps every collection in one JSONB table and performs
//! conditional writes inside single SQL statements.

pub mod memory;
pub mod pg_document_store;
pub mod schema;

pub use memory::MemoryDocumentStore;
pub use pg_document_store::PgDocumentStore;
