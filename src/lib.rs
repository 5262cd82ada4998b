// Public API exports
pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ports;
pub mod prettyprint;

// Re-export key types for easy access
pub use application::{backup::BackupOrchestrator, merge::MergeOrchestrator};
pub use domain::error::SheetMergerError;
pub use ports::document_store::{DocumentStore, DocumentStoreError};
