use thiserror::Error;

use crate::domain::sheets::{a1_notation::A1Notation, cell_value::CellGrid};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStoreError {
    #[error("Document not found")]
    NotFound,
    #[error("Access denied")]
    AccessDenied,
    #[error("Transport failure")]
    Transport,
    #[error("Malformed response: {0}")]
    MalformedResponse(&'static str),
}

/// Names of the store operations, used to label failures and in call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreOperation {
    GetCellGrid,
    AppendRows,
    UpdateRange,
    GetDocumentMetadata,
    ListChildren,
    CreateFolder,
    CopyDocument,
    DeleteDocument,
}

impl StoreOperation {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub key: String,
    pub display_name: String,
}

/// Remote document store: spreadsheet values plus the file operations the
/// backup needs. Every call is awaited by the caller before the next one is
/// issued.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads every populated cell of `sheet_name`. An empty sheet yields an
    /// empty grid.
    async fn get_cell_grid(
        &self,
        document_key: &str,
        sheet_name: &str,
    ) -> error_stack::Result<CellGrid, DocumentStoreError>;

    /// Appends `rows` below the existing content, starting at `range`.
    async fn append_rows(
        &self,
        document_key: &str,
        range: &A1Notation,
        rows: CellGrid,
    ) -> error_stack::Result<(), DocumentStoreError>;

    /// Overwrites `range` with `rows`.
    async fn update_range(
        &self,
        document_key: &str,
        range: &A1Notation,
        rows: CellGrid,
    ) -> error_stack::Result<(), DocumentStoreError>;

    async fn get_document_metadata(
        &self,
        document_key: &str,
    ) -> error_stack::Result<DocumentMetadata, DocumentStoreError>;

    async fn list_children(
        &self,
        folder_key: &str,
        folders_only: bool,
    ) -> error_stack::Result<Vec<DocumentMetadata>, DocumentStoreError>;

    /// Returns the key of the new folder.
    async fn create_folder(
        &self,
        parent_key: &str,
        name: &str,
    ) -> error_stack::Result<String, DocumentStoreError>;

    /// Returns the key of the copy.
    async fn copy_document(
        &self,
        document_key: &str,
        destination_folder_key: &str,
        name: &str,
    ) -> error_stack::Result<String, DocumentStoreError>;

    async fn delete_document(&self, key: &str) -> error_stack::Result<(), DocumentStoreError>;
}
