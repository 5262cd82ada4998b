use error_stack::{report, ResultExt};
use google_drive3::{api::File, DriveHub};
use std::{fmt::Debug, io::Cursor};
use thiserror::Error;
use tracing::instrument;

use crate::adapters::sheets::{auth::GoogleSession, http_client::HttpsConnector};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

pub struct DriveManager {
    hub: DriveHub<HttpsConnector>,
}

impl Debug for DriveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DriveManager")
    }
}

#[derive(Error, Debug)]
pub enum DriveManagerError {
    #[error("Failed to list files")]
    FailedToListFiles,
    #[error("Failed to fetch file")]
    FailedToGetFile,
    #[error("Failed to create folder")]
    FailedToCreateFolder,
    #[error("Failed to copy file")]
    FailedToCopyFile,
    #[error("Failed to delete file")]
    FailedToDeleteFile,
    #[error("Field {0} missing from Drive response")]
    MissingField(&'static str),
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive search query for the direct children of `folder_id`.
pub fn children_query(folder_id: &str, folders_only: bool) -> String {
    let parent = format!("'{}' in parents", escape_query_literal(folder_id));
    if folders_only {
        format!("{} and mimeType = '{}'", parent, FOLDER_MIME_TYPE)
    } else {
        parent
    }
}

/// `id` of a file returned by the API, which every call here asks for.
pub fn file_id(file: &File) -> error_stack::Result<String, DriveManagerError> {
    file.id
        .clone()
        .ok_or_else(|| report!(DriveManagerError::MissingField("id")))
}

/// Metadata and upload content type for a new folder named `name` in
/// `parent_id`.
pub fn folder_request(
    parent_id: &str,
    name: &str,
) -> error_stack::Result<(File, mime::Mime), DriveManagerError> {
    let mime_type = FOLDER_MIME_TYPE
        .parse::<mime::Mime>()
        .change_context(DriveManagerError::FailedToCreateFolder)?;
    let request = File {
        name: Some(name.to_owned()),
        mime_type: Some(FOLDER_MIME_TYPE.to_owned()),
        parents: Some(vec![parent_id.to_owned()]),
        ..Default::default()
    };
    Ok((request, mime_type))
}

impl DriveManager {
    pub fn new(session: GoogleSession) -> Self {
        DriveManager {
            hub: DriveHub::new(session.client, session.auth),
        }
    }

    /// Every direct child of `folder_id`, following pagination.
    #[instrument]
    pub async fn list_children(
        &self,
        folder_id: &str,
        folders_only: bool,
    ) -> error_stack::Result<Vec<File>, DriveManagerError> {
        let query = children_query(folder_id, folders_only);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut call = self
                .hub
                .files()
                .list()
                .q(&query)
                .param("fields", "nextPageToken, files(id, name, mimeType)");
            if let Some(token) = &page_token {
                call = call.page_token(token);
            }

            let (_, file_list) = call
                .doit()
                .await
                .change_context(DriveManagerError::FailedToListFiles)
                .attach_printable_lazy(|| format!("search failed: `{}`", query))?;

            files.extend(file_list.files.unwrap_or_default());
            match file_list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    #[instrument]
    pub async fn get_file(&self, file_id: &str) -> error_stack::Result<File, DriveManagerError> {
        let (_, file) = self
            .hub
            .files()
            .get(file_id)
            .param("fields", "id, name, mimeType")
            .doit()
            .await
            .change_context(DriveManagerError::FailedToGetFile)
            .attach_printable_lazy(|| format!("file fetch failed. key:{}", file_id))?;
        Ok(file)
    }

    #[instrument]
    pub async fn create_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> error_stack::Result<File, DriveManagerError> {
        let (request, mime_type) = folder_request(parent_id, name)?;

        // A folder has no content: the upload body is empty.
        let (_, folder) = self
            .hub
            .files()
            .create(request)
            .upload(Cursor::new(Vec::<u8>::new()), mime_type)
            .await
            .change_context(DriveManagerError::FailedToCreateFolder)
            .attach_printable_lazy(|| {
                format!("create folder failed: parent:{} name:{}", parent_id, name)
            })?;
        Ok(folder)
    }

    #[instrument]
    pub async fn copy_file(
        &self,
        file_id: &str,
        parent_id: &str,
        name: &str,
    ) -> error_stack::Result<File, DriveManagerError> {
        let request = File {
            name: Some(name.to_owned()),
            parents: Some(vec![parent_id.to_owned()]),
            ..Default::default()
        };

        let (_, copy) = self
            .hub
            .files()
            .copy(request, file_id)
            .doit()
            .await
            .change_context(DriveManagerError::FailedToCopyFile)
            .attach_printable_lazy(|| {
                format!(
                    "file copy failed. from:key:{} to:parent:{} to:name:{}",
                    file_id, parent_id, name
                )
            })?;
        Ok(copy)
    }

    #[instrument]
    pub async fn delete_file(&self, file_id: &str) -> error_stack::Result<(), DriveManagerError> {
        self.hub
            .files()
            .delete(file_id)
            .doit()
            .await
            .map(|_| ())
            .change_context(DriveManagerError::FailedToDeleteFile)
            .attach_printable_lazy(|| format!("delete failed. id:{}", file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_query_for_folders() {
        assert_eq!(
            children_query("F1", true),
            "'F1' in parents and mimeType = 'application/vnd.google-apps.folder'"
        );
    }

    #[test]
    fn test_children_query_escapes_quotes() {
        assert_eq!(children_query("it's", false), "'it\\'s' in parents");
    }

    #[test]
    fn test_folder_request() {
        let (request, mime_type) = folder_request("PARENT", "20240101093000").unwrap();
        assert_eq!(mime_type.essence_str(), FOLDER_MIME_TYPE);
        assert_eq!(request.mime_type.as_deref(), Some(FOLDER_MIME_TYPE));
        assert_eq!(request.name.as_deref(), Some("20240101093000"));
        assert_eq!(request.parents, Some(vec!["PARENT".to_owned()]));
    }

    #[test]
    fn test_file_id_requires_id() {
        assert!(file_id(&File::default()).is_err());
        let file = File {
            id: Some("abc".to_owned()),
            ..Default::default()
        };
        assert_eq!(file_id(&file).unwrap(), "abc");
    }
}
