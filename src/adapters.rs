pub mod drive;
pub mod google_document_store;
pub mod memory;
pub mod sheets;
