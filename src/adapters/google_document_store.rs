use error_stack::{report, Report, ResultExt};
use google_drive3::api::File;
use google_sheets4::api::ValueRange;
use serde_json::Value;
use tracing::instrument;

use crate::{
    domain::sheets::{a1_notation::A1Notation, cell_value::CellGrid},
    ports::document_store::{DocumentMetadata, DocumentStore, DocumentStoreError},
};

use super::{
    drive::drive_manager::{self, DriveManager},
    sheets::{
        auth::{self, AuthError},
        spreadsheet_manager::SpreadsheetManager,
        value_range_factory::{IntoCellGrid, ValueRangeFactory},
    },
};

/// [`DocumentStore`] backed by Google Sheets (values) and Google Drive
/// (files and folders), both authenticated with the same service account.
#[derive(Debug)]
pub struct GoogleDocumentStore {
    sheets: SpreadsheetManager,
    drive: DriveManager,
}

impl GoogleDocumentStore {
    #[instrument(name = "GoogleDocumentStore::connect")]
    pub async fn connect(credential_path: &str) -> error_stack::Result<Self, DocumentStoreError> {
        let session = auth::session(credential_path).await.map_err(|report| {
            let kind = match report.current_context() {
                AuthError::BuildHttpClient => DocumentStoreError::Transport,
                _ => DocumentStoreError::AccessDenied,
            };
            report.change_context(kind)
        })?;

        Ok(Self {
            sheets: SpreadsheetManager::new(session.clone()),
            drive: DriveManager::new(session),
        })
    }
}

pub fn kind_from_status(status: u16) -> DocumentStoreError {
    match status {
        404 => DocumentStoreError::NotFound,
        401 | 403 => DocumentStoreError::AccessDenied,
        _ => DocumentStoreError::Transport,
    }
}

// Error bodies look like {"error": {"code": 404, "message": ..., "status": ...}}.
fn kind_from_error_body(body: &Value) -> DocumentStoreError {
    body.pointer("/error/code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .map(kind_from_status)
        .unwrap_or(DocumentStoreError::Transport)
}

fn sheets_error_kind(error: &google_sheets4::Error) -> DocumentStoreError {
    match error {
        google_sheets4::Error::Failure(response) => kind_from_status(response.status().as_u16()),
        google_sheets4::Error::BadRequest(body) => kind_from_error_body(body),
        google_sheets4::Error::MissingAPIKey | google_sheets4::Error::MissingToken(_) => {
            DocumentStoreError::AccessDenied
        }
        _ => DocumentStoreError::Transport,
    }
}

fn drive_error_kind(error: &google_drive3::Error) -> DocumentStoreError {
    match error {
        google_drive3::Error::Failure(response) => kind_from_status(response.status().as_u16()),
        google_drive3::Error::BadRequest(body) => kind_from_error_body(body),
        google_drive3::Error::MissingAPIKey | google_drive3::Error::MissingToken(_) => {
            DocumentStoreError::AccessDenied
        }
        _ => DocumentStoreError::Transport,
    }
}

/// Finds the client error buried in `report` and maps it onto the store's
/// error kinds.
pub fn classify<C>(report: &Report<C>) -> DocumentStoreError {
    if let Some(error) = report.downcast_ref::<google_sheets4::Error>() {
        return sheets_error_kind(error);
    }
    if let Some(error) = report.downcast_ref::<google_drive3::Error>() {
        return drive_error_kind(error);
    }
    DocumentStoreError::Transport
}

fn to_store_error<T, C>(
    result: error_stack::Result<T, C>,
) -> error_stack::Result<T, DocumentStoreError> {
    result.map_err(|report| {
        let kind = classify(&report);
        report.change_context(kind)
    })
}

fn to_metadata(file: File) -> error_stack::Result<DocumentMetadata, DocumentStoreError> {
    let key = drive_manager::file_id(&file)
        .change_context(DocumentStoreError::MalformedResponse("id"))?;
    let display_name = file
        .name
        .ok_or_else(|| report!(DocumentStoreError::MalformedResponse("name")))
        .attach_printable_lazy(|| format!("key:{}", key))?;
    Ok(DocumentMetadata { key, display_name })
}

#[async_trait::async_trait]
impl DocumentStore for GoogleDocumentStore {
    async fn get_cell_grid(
        &self,
        document_key: &str,
        sheet_name: &str,
    ) -> error_stack::Result<CellGrid, DocumentStoreError> {
        let range = A1Notation::whole_sheet(sheet_name);
        let value_range = to_store_error(self.sheets.read_range(document_key, range.as_ref()).await)?;
        Ok(value_range.into_cell_grid())
    }

    async fn append_rows(
        &self,
        document_key: &str,
        range: &A1Notation,
        rows: CellGrid,
    ) -> error_stack::Result<(), DocumentStoreError> {
        to_store_error(
            self.sheets
                .append_range(document_key, range, ValueRange::from_grid(rows))
                .await,
        )
    }

    async fn update_range(
        &self,
        document_key: &str,
        range: &A1Notation,
        rows: CellGrid,
    ) -> error_stack::Result<(), DocumentStoreError> {
        to_store_error(
            self.sheets
                .write_range(document_key, range, ValueRange::from_grid(rows))
                .await,
        )
    }

    async fn get_document_metadata(
        &self,
        document_key: &str,
    ) -> error_stack::Result<DocumentMetadata, DocumentStoreError> {
        let file = to_store_error(self.drive.get_file(document_key).await)?;
        to_metadata(file)
    }

    async fn list_children(
        &self,
        folder_key: &str,
        folders_only: bool,
    ) -> error_stack::Result<Vec<DocumentMetadata>, DocumentStoreError> {
        to_store_error(self.drive.list_children(folder_key, folders_only).await)?
            .into_iter()
            .map(to_metadata)
            .collect()
    }

    async fn create_folder(
        &self,
        parent_key: &str,
        name: &str,
    ) -> error_stack::Result<String, DocumentStoreError> {
        let folder = to_store_error(self.drive.create_folder(parent_key, name).await)?;
        drive_manager::file_id(&folder).change_context(DocumentStoreError::MalformedResponse("id"))
    }

    async fn copy_document(
        &self,
        document_key: &str,
        destination_folder_key: &str,
        name: &str,
    ) -> error_stack::Result<String, DocumentStoreError> {
        let copy = to_store_error(
            self.drive
                .copy_file(document_key, destination_folder_key, name)
                .await,
        )?;
        drive_manager::file_id(&copy).change_context(DocumentStoreError::MalformedResponse("id"))
    }

    async fn delete_document(&self, key: &str) -> error_stack::Result<(), DocumentStoreError> {
        to_store_error(self.drive.delete_file(key).await)
    }
}
