use std::sync::Arc;

use error_stack::{report, ResultExt};
use tracing::{info, instrument, Instrument};

use crate::{
    domain::{
        error::SheetMergerError,
        sheets::{
            cell_value::CellValue,
            index_sheet::IndexSheet,
            tabular_document::{TabularDocument, ID_COLUMN},
        },
    },
    ports::document_store::DocumentStore,
};

fn require(value: &str, name: &str) -> error_stack::Result<(), SheetMergerError> {
    if value.is_empty() {
        return Err(report!(SheetMergerError::validation(format!(
            "{} is required.",
            name
        ))));
    }
    Ok(())
}

fn format_ids(ids: &[CellValue]) -> String {
    let ids = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
    format!("[{}]", ids.join(", "))
}

/// Appends the rows of tables listed in a diff index into the matching
/// tables of a base index.
pub struct MergeOrchestrator {
    store: Arc<dyn DocumentStore>,
    index_sheet_name: String,
}

impl std::fmt::Debug for MergeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOrchestrator")
            .field("index_sheet_name", &self.index_sheet_name)
            .finish()
    }
}

impl MergeOrchestrator {
    pub fn new<S: Into<String>>(store: Arc<dyn DocumentStore>, index_sheet_name: S) -> Self {
        Self {
            store,
            index_sheet_name: index_sheet_name.into(),
        }
    }

    /// Merges every table of `sheet_names`, in order, stopping at the first
    /// failure.
    #[instrument(skip(self))]
    pub async fn merge<S: AsRef<str> + std::fmt::Debug>(
        &self,
        base_sheet_key: &str,
        diff_sheet_key: &str,
        sheet_names: &[S],
    ) -> error_stack::Result<(), SheetMergerError> {
        require(base_sheet_key, "baseSheetKey")?;
        require(diff_sheet_key, "diffSheetKey")?;

        let base_index =
            IndexSheet::fetch(Arc::clone(&self.store), base_sheet_key, &self.index_sheet_name)
                .await?;
        let diff_index =
            IndexSheet::fetch(Arc::clone(&self.store), diff_sheet_key, &self.index_sheet_name)
                .await?;

        for (index, sheet_name) in sheet_names.iter().enumerate() {
            let sheet_name = sheet_name.as_ref();
            self.merge_table(&base_index, &diff_index, sheet_name)
                .instrument(tracing::span!(
                    tracing::Level::INFO,
                    "table",
                    sheet = sheet_name,
                    index = index,
                    len = sheet_names.len()
                ))
                .await
                .attach_printable_lazy(|| {
                    format!(
                        "sheet merge failed. base:{} diff:{} sheetName:{}",
                        base_index.key(),
                        diff_index.key(),
                        sheet_name
                    )
                })?;
            info!("✅ {}: merged", sheet_name);
        }

        Ok(())
    }

    async fn merge_table(
        &self,
        base_index: &IndexSheet,
        diff_index: &IndexSheet,
        sheet_name: &str,
    ) -> error_stack::Result<(), SheetMergerError> {
        if base_index.key() == diff_index.key() {
            return Err(report!(SheetMergerError::validation(format!(
                "{} : same key",
                sheet_name
            ))));
        }

        let base_row = base_index.find_unique(sheet_name, "base")?;
        let diff_row = diff_index.find_unique(sheet_name, "diff")?;

        let base_sheet =
            TabularDocument::fetch(Arc::clone(&self.store), &base_row.key, sheet_name).await?;
        let diff_sheet =
            TabularDocument::fetch(Arc::clone(&self.store), &diff_row.key, sheet_name).await?;

        info!("{} : start check", sheet_name);
        let duplicated = base_sheet.dup_check_by_column(&diff_sheet, ID_COLUMN)?;
        if !duplicated.is_empty() {
            return Err(report!(SheetMergerError::conflict(format!(
                "{} : id duplication {}",
                sheet_name,
                format_ids(&duplicated)
            ))));
        }
        info!("{} : finish check", sheet_name);

        base_sheet.merge(&diff_sheet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::memory::in_memory_store::{text_grid, InMemoryDocumentStore},
        ports::document_store::StoreOperation,
    };

    const INDEX: &str = "table_map";

    fn store_with_users(diff_ids: &[&str]) -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.put_sheet("BASE", INDEX, text_grid(&[&["sheetname", "key"], &["users", "K1"]]));
        store.put_sheet("DIFF", INDEX, text_grid(&[&["sheetname", "key"], &["users", "K2"]]));
        store.put_sheet(
            "K1",
            "users",
            text_grid(&[&["id", "name", "age"], &["1", "alice", "30"], &["2", "bob", "41"]]),
        );

        let mut diff = vec![vec![
            CellValue::text("name"),
            CellValue::text("id"),
            CellValue::text("age"),
        ]];
        for id in diff_ids {
            diff.push(vec![
                CellValue::text(format!("user{}", id)),
                CellValue::text(*id),
                CellValue::text("20"),
            ]);
        }
        store.put_sheet("K2", "users", diff);
        store
    }

    fn orchestrator(store: &Arc<InMemoryDocumentStore>) -> MergeOrchestrator {
        MergeOrchestrator::new(store.clone(), INDEX)
    }

    #[tokio::test]
    async fn test_merge_appends_diff_rows_in_base_order() {
        let store = store_with_users(&["3", "4"]);

        orchestrator(&store)
            .merge("BASE", "DIFF", &["users"])
            .await
            .unwrap();

        assert_eq!(store.calls_to(StoreOperation::AppendRows), ["K1 'users'!A5"]);
        let grid = store.sheet("K1", "users").unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(
            grid[4..].to_vec(),
            text_grid(&[&["3", "user3", "20"], &["4", "user4", "20"]])
        );
    }

    #[tokio::test]
    async fn test_merge_rejects_id_collision() {
        let store = store_with_users(&["2", "5"]);

        let report = orchestrator(&store)
            .merge("BASE", "DIFF", &["users"])
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::conflict("users : id duplication [2]")
        );
        assert!(store.calls_to(StoreOperation::AppendRows).is_empty());
    }

    #[tokio::test]
    async fn test_merge_into_itself_is_rejected() {
        let store = store_with_users(&["3"]);

        let report = orchestrator(&store)
            .merge("BASE", "BASE", &["users"])
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::validation("users : same key")
        );
        assert!(store.calls_to(StoreOperation::AppendRows).is_empty());
    }

    #[tokio::test]
    async fn test_missing_keys_fail_before_remote_calls() {
        let store = store_with_users(&["3"]);

        let report = orchestrator(&store)
            .merge("", "DIFF", &["users"])
            .await
            .unwrap_err();

        assert!(report.current_context().is_validation());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_table_stops_remaining_tables() {
        let store = store_with_users(&["3"]);
        store.put_sheet(
            "BASE",
            INDEX,
            text_grid(&[&["sheetname", "key"], &["users", "K1"], &["items", "K5"]]),
        );

        let report = orchestrator(&store)
            .merge("BASE", "DIFF", &["items", "users"])
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::validation("items : no corresponding diff index rows")
        );
        assert!(store.calls_to(StoreOperation::AppendRows).is_empty());
        assert_eq!(store.sheet("K1", "users").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicated_index_rows_are_rejected() {
        let store = store_with_users(&["3"]);
        store.put_sheet(
            "DIFF",
            INDEX,
            text_grid(&[&["sheetname", "key"], &["users", "K2"], &["users", "K3"]]),
        );

        let report = orchestrator(&store)
            .merge("BASE", "DIFF", &["users"])
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::validation("users : sheetname duplication in diff index sheet")
        );
    }

    #[tokio::test]
    async fn test_append_failure_is_remote_error() {
        let store = store_with_users(&["3"]);
        store.fail_on(StoreOperation::AppendRows);

        let report = orchestrator(&store)
            .merge("BASE", "DIFF", &["users"])
            .await
            .unwrap_err();

        assert_eq!(
            report.current_context(),
            &SheetMergerError::remote(StoreOperation::AppendRows.name())
        );
    }
}
