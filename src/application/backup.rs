use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use error_stack::{report, ResultExt};
use tracing::{info, instrument, warn, Instrument};

use crate::{
    domain::{error::SheetMergerError, sheets::index_sheet::IndexSheet},
    ports::document_store::{DocumentStore, DocumentStoreError, StoreOperation},
};

fn is_missing_sheet(report: &error_stack::Report<SheetMergerError>) -> bool {
    report.downcast_ref::<DocumentStoreError>() == Some(&DocumentStoreError::NotFound)
}

/// Copies an index spreadsheet and every spreadsheet it references into a
/// new folder, then points the copied index at the copies.
pub struct BackupOrchestrator {
    store: Arc<dyn DocumentStore>,
    index_sheet_name: String,
    backup_folder_name: String,
}

impl std::fmt::Debug for BackupOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupOrchestrator")
            .field("index_sheet_name", &self.index_sheet_name)
            .field("backup_folder_name", &self.backup_folder_name)
            .finish()
    }
}

impl BackupOrchestrator {
    pub fn new<I: Into<String>, B: Into<String>>(
        store: Arc<dyn DocumentStore>,
        index_sheet_name: I,
        backup_folder_name: B,
    ) -> Self {
        Self {
            store,
            index_sheet_name: index_sheet_name.into(),
            backup_folder_name: backup_folder_name.into(),
        }
    }

    /// Backs up `index_sheet_key` into a folder named `label`, created under
    /// the backup folder found in `base_folder_id`.
    #[instrument(skip(self))]
    pub async fn backup(
        &self,
        index_sheet_key: &str,
        base_folder_id: &str,
        label: &str,
    ) -> error_stack::Result<(), SheetMergerError> {
        if index_sheet_key.is_empty() {
            return Err(report!(SheetMergerError::validation(
                "indexSheetKey is required."
            )));
        }
        if base_folder_id.is_empty() {
            return Err(report!(SheetMergerError::validation(
                "baseFolderID is required."
            )));
        }

        info!("start backup");

        let backup_folder_id = self.find_backup_folder(base_folder_id).await?;
        let run_folder_id = self
            .store
            .create_folder(&backup_folder_id, label)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::CreateFolder.name()))
            .attach_printable_lazy(|| {
                format!(
                    "create folder failed: parent:{} name:{}",
                    backup_folder_id, label
                )
            })?;

        let index_sheet = IndexSheet::fetch(
            Arc::clone(&self.store),
            index_sheet_key,
            &self.index_sheet_name,
        )
        .await?;
        let original_keys = index_sheet.keys()?;

        let (replacements, backup_index) = self
            .copy_documents(index_sheet_key, &original_keys, &run_folder_id)
            .await?;
        let mut backup_index = backup_index.ok_or_else(|| {
            report!(SheetMergerError::validation(format!(
                "no copy has a {} sheet to use as the backup index",
                self.index_sheet_name
            )))
            .attach_printable(format!("backup folder:{}", run_folder_id))
        })?;

        backup_index.replace_keys(&replacements).await?;
        backup_index.refresh().await?;

        self.verify(&original_keys, &backup_index, &run_folder_id)
            .await?;

        info!("finish backup");
        Ok(())
    }

    async fn find_backup_folder(
        &self,
        base_folder_id: &str,
    ) -> error_stack::Result<String, SheetMergerError> {
        let folders = self
            .store
            .list_children(base_folder_id, true)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::ListChildren.name()))
            .attach_printable_lazy(|| format!("search failed: folders in {}", base_folder_id))?;

        let mut matching = folders
            .into_iter()
            .filter(|folder| folder.display_name == self.backup_folder_name);

        match (matching.next(), matching.next()) {
            (Some(folder), None) => Ok(folder.key),
            (None, _) => Err(report!(SheetMergerError::validation(format!(
                "backup folder {} not found in {}",
                self.backup_folder_name, base_folder_id
            )))),
            (Some(_), Some(_)) => Err(report!(SheetMergerError::validation(format!(
                "more than one backup folder named {} in {}",
                self.backup_folder_name, base_folder_id
            )))),
        }
    }

    /// Copies the index and the documents it references, in that order.
    /// Returns the old -> new key map and the first copy that opens as an
    /// index sheet.
    async fn copy_documents(
        &self,
        index_sheet_key: &str,
        referenced_keys: &[String],
        run_folder_id: &str,
    ) -> error_stack::Result<(HashMap<String, String>, Option<IndexSheet>), SheetMergerError>
    {
        let mut replacements = HashMap::new();
        let mut backup_index = None;
        let mut seen = HashSet::new();

        let keys = std::iter::once(index_sheet_key)
            .chain(referenced_keys.iter().map(String::as_str))
            .filter(|key| !key.is_empty())
            .filter(|key| seen.insert(key.to_string()))
            .collect::<Vec<_>>();

        for (index, key) in keys.iter().enumerate() {
            let copy_key = self
                .copy_document(key, run_folder_id)
                .instrument(tracing::span!(
                    tracing::Level::INFO,
                    "copy",
                    key = key,
                    index = index,
                    len = keys.len()
                ))
                .await?;

            if backup_index.is_none() {
                match IndexSheet::fetch(Arc::clone(&self.store), &copy_key, &self.index_sheet_name)
                    .await
                {
                    Ok(sheet) => backup_index = Some(sheet),
                    Err(report) if is_missing_sheet(&report) => {
                        tracing::debug!("{} is not an index copy", copy_key)
                    }
                    Err(report) => return Err(report),
                }
            }

            replacements.insert(key.to_string(), copy_key);
        }

        Ok((replacements, backup_index))
    }

    async fn copy_document(
        &self,
        key: &str,
        run_folder_id: &str,
    ) -> error_stack::Result<String, SheetMergerError> {
        let metadata = self
            .store
            .get_document_metadata(key)
            .await
            .change_context(SheetMergerError::remote(
                StoreOperation::GetDocumentMetadata.name(),
            ))
            .attach_printable_lazy(|| format!("file fetch failed. key:{}", key))?;

        let copy_key = self
            .store
            .copy_document(key, run_folder_id, &metadata.display_name)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::CopyDocument.name()))
            .attach_printable_lazy(|| {
                format!(
                    "file copy failed. from:key:{} to:parent:{} to:name:{}",
                    key, run_folder_id, metadata.display_name
                )
            })?;

        info!("{} : done", metadata.display_name);
        Ok(copy_key)
    }

    /// Fails when the rewritten backup index still points at an original
    /// document. The run folder is deleted first.
    async fn verify(
        &self,
        original_keys: &[String],
        backup_index: &IndexSheet,
        run_folder_id: &str,
    ) -> error_stack::Result<(), SheetMergerError> {
        let backup_keys = backup_index.keys()?.into_iter().collect::<HashSet<_>>();
        let leaked = original_keys
            .iter()
            .filter(|key| !key.is_empty() && backup_keys.contains(*key))
            .cloned()
            .collect::<Vec<_>>();

        if leaked.is_empty() {
            return Ok(());
        }

        warn!(
            "backup index still references {:?}, deleting {}",
            leaked, run_folder_id
        );
        self.store
            .delete_document(run_folder_id)
            .await
            .change_context(SheetMergerError::remote(
                StoreOperation::DeleteDocument.name(),
            ))
            .attach_printable_lazy(|| format!("delete folder failed. id:{}", run_folder_id))?;

        Err(report!(SheetMergerError::conflict("fail in duplicate")))
            .attach_printable_lazy(|| format!("original keys left in backup index: {:?}", leaked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::in_memory_store::{text_grid, InMemoryDocumentStore};

    const INDEX: &str = "table_map";
    const LABEL: &str = "20240101093000";

    fn store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.add_folder("ROOT", "root", None);
        store.add_folder("BACKUP", "backup", Some("ROOT"));
        store.add_folder("OTHER", "archive", Some("ROOT"));
        store.add_spreadsheet("IDX", "index", Some("ROOT"));
        store.put_sheet(
            "IDX",
            INDEX,
            text_grid(&[
                &["sheetname", "key"],
                &["users", "A"],
                &["items", "B"],
                &["orders", "A"],
            ]),
        );
        store.add_spreadsheet("A", "users book", Some("ROOT"));
        store.put_sheet("A", "users", text_grid(&[&["id"], &["1"]]));
        store.add_spreadsheet("B", "items book", Some("ROOT"));
        store.put_sheet("B", "items", text_grid(&[&["id"], &["9"]]));
        store
    }

    fn orchestrator(store: &Arc<InMemoryDocumentStore>) -> BackupOrchestrator {
        BackupOrchestrator::new(store.clone(), INDEX, "backup")
    }

    #[tokio::test]
    async fn test_backup_rewrites_copied_index() {
        let store = store();

        orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap();

        let runs = store.children_of("BACKUP");
        assert_eq!(runs.len(), 1);
        let run = store.document(&runs[0]).unwrap();
        assert_eq!(run.name, LABEL);

        let copies = store.children_of(&runs[0]);
        assert_eq!(copies.len(), 3);
        assert_eq!(
            store.calls_to(StoreOperation::CopyDocument),
            [
                format!("IDX {}", runs[0]),
                format!("A {}", runs[0]),
                format!("B {}", runs[0]),
            ]
        );

        let index_copy = copies
            .iter()
            .find(|key| store.document(key).unwrap().name == "index")
            .unwrap();
        let users_copy = copies
            .iter()
            .find(|key| store.document(key).unwrap().name == "users book")
            .unwrap();
        let items_copy = copies
            .iter()
            .find(|key| store.document(key).unwrap().name == "items book")
            .unwrap();

        assert_eq!(
            store.sheet(index_copy, INDEX).unwrap(),
            text_grid(&[
                &["sheetname", "key"],
                &["users", users_copy.as_str()],
                &["items", items_copy.as_str()],
                &["orders", users_copy.as_str()],
            ])
        );
        assert_eq!(
            store.sheet("IDX", INDEX).unwrap()[1],
            text_grid(&[&["users", "A"]])[0]
        );
    }

    #[tokio::test]
    async fn test_backup_skips_empty_keys() {
        let store = store();
        store.put_sheet(
            "IDX",
            INDEX,
            text_grid(&[&["sheetname", "key"], &["users", "A"], &["drafts", ""]]),
        );

        orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap();

        let run = store.children_of("BACKUP").remove(0);
        assert_eq!(
            store.calls_to(StoreOperation::CopyDocument),
            [format!("IDX {}", run), format!("A {}", run)]
        );
        let index_copy = store
            .children_of(&run)
            .into_iter()
            .find(|key| store.document(key).unwrap().name == "index")
            .unwrap();
        let rewritten = store.sheet(&index_copy, INDEX).unwrap();
        assert_eq!(rewritten[2], text_grid(&[&["drafts", ""]])[0]);
        assert!(store.calls_to(StoreOperation::DeleteDocument).is_empty());
    }

    #[tokio::test]
    async fn test_no_index_among_copies() {
        let store = store();
        store.fail_on_target(StoreOperation::GetCellGrid, "copy-", DocumentStoreError::NotFound);

        let report = orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap_err();

        assert!(report.current_context().is_validation());
        assert_eq!(store.calls_to(StoreOperation::CopyDocument).len(), 3);
        assert!(store.calls_to(StoreOperation::UpdateRange).is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_copy_keeps_remote_cause() {
        let store = store();
        store.fail_on_target(StoreOperation::GetCellGrid, "copy-", DocumentStoreError::AccessDenied);

        let report = orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::remote(StoreOperation::GetCellGrid.name())
        );
        assert_eq!(
            report.downcast_ref::<DocumentStoreError>(),
            Some(&DocumentStoreError::AccessDenied)
        );
        assert_eq!(store.calls_to(StoreOperation::CopyDocument).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_backup_folder_creates_nothing() {
        let store = store();
        let orchestrator = BackupOrchestrator::new(store.clone(), INDEX, "snapshots");

        let report = orchestrator.backup("IDX", "ROOT", LABEL).await.unwrap_err();

        assert!(report.current_context().is_validation());
        assert!(store.calls_to(StoreOperation::CreateFolder).is_empty());
        assert!(store.calls_to(StoreOperation::CopyDocument).is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_backup_folder() {
        let store = store();
        store.add_folder("BACKUP2", "backup", Some("ROOT"));

        let report = orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap_err();

        assert!(report.current_context().is_validation());
        assert!(store.calls_to(StoreOperation::CreateFolder).is_empty());
    }

    #[tokio::test]
    async fn test_missing_keys_are_rejected() {
        let store = store();

        let report = orchestrator(&store)
            .backup("IDX", "", LABEL)
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::validation("baseFolderID is required.")
        );
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_index_deletes_run_folder() {
        let store = store();
        store.drop_writes_on(StoreOperation::UpdateRange);

        let report = orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::conflict("fail in duplicate")
        );
        let deleted = store.calls_to(StoreOperation::DeleteDocument);
        assert_eq!(deleted.len(), 1);
        assert!(store.document(&deleted[0]).is_none());
        assert!(store.children_of("BACKUP").is_empty());
    }

    #[tokio::test]
    async fn test_failed_cleanup_reports_delete_error() {
        let store = store();
        store.drop_writes_on(StoreOperation::UpdateRange);
        store.fail_on(StoreOperation::DeleteDocument);

        let report = orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::remote(StoreOperation::DeleteDocument.name())
        );
        assert_eq!(store.children_of("BACKUP").len(), 1);
    }

    #[tokio::test]
    async fn test_copy_failure_stops_backup() {
        let store = store();
        store.fail_on(StoreOperation::CopyDocument);

        let report = orchestrator(&store)
            .backup("IDX", "ROOT", LABEL)
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::remote(StoreOperation::CopyDocument.name())
        );
        assert_eq!(store.calls_to(StoreOperation::CopyDocument).len(), 1);
        assert!(store.calls_to(StoreOperation::UpdateRange).is_empty());
    }
}
