pub mod command_handler;
pub mod document_store;
