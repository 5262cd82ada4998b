use std::{collections::HashMap, sync::Arc};

use error_stack::report;

use crate::{domain::error::SheetMergerError, ports::document_store::DocumentStore};

use super::tabular_document::{Record, TabularDocument};

pub const SHEETNAME_COLUMN: &str = "sheetname";
pub const KEY_COLUMN: &str = "key";

/// A row of the index sheet: logical table name -> spreadsheet holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub sheetname: String,
    pub key: String,
}

fn text_field(record: &Record, column: &str) -> error_stack::Result<String, SheetMergerError> {
    let cell = record.get(column).ok_or_else(|| {
        report!(SheetMergerError::validation(format!(
            "index sheet has no {} column",
            column
        )))
    })?;

    cell.as_text().map(str::to_owned).ok_or_else(|| {
        report!(SheetMergerError::validation(format!(
            "index column {} holds a {} value, expected text",
            column,
            cell.type_name()
        )))
        .attach_printable(format!("value:{}", cell))
    })
}

impl TryFrom<&Record> for IndexRow {
    type Error = error_stack::Report<SheetMergerError>;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        Ok(IndexRow {
            sheetname: text_field(record, SHEETNAME_COLUMN)?,
            key: text_field(record, KEY_COLUMN)?,
        })
    }
}

/// The `sheetname`/`key` table that maps logical tables to spreadsheets.
#[derive(Debug)]
pub struct IndexSheet {
    document: TabularDocument,
}

impl IndexSheet {
    pub fn new(document: TabularDocument) -> Self {
        Self { document }
    }

    pub async fn fetch(
        store: Arc<dyn DocumentStore>,
        key: &str,
        index_sheet_name: &str,
    ) -> error_stack::Result<Self, SheetMergerError> {
        Ok(Self::new(
            TabularDocument::fetch(store, key, index_sheet_name).await?,
        ))
    }

    /// Key of the spreadsheet the index lives in.
    pub fn key(&self) -> &str {
        self.document.key()
    }

    pub fn rows_for(&self, sheetname: &str) -> error_stack::Result<Vec<IndexRow>, SheetMergerError> {
        let mut matching = Vec::new();
        for record in self.document.rows()? {
            let row = IndexRow::try_from(record)?;
            if row.sheetname == sheetname {
                matching.push(row);
            }
        }
        Ok(matching)
    }

    /// The single row for `sheetname`. `side` only labels the error
    /// ("base", "diff").
    pub fn find_unique(
        &self,
        sheetname: &str,
        side: &str,
    ) -> error_stack::Result<IndexRow, SheetMergerError> {
        let mut rows = self.rows_for(sheetname)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(report!(SheetMergerError::validation(format!(
                "{} : no corresponding {} index rows",
                sheetname, side
            )))),
            count => Err(report!(SheetMergerError::validation(format!(
                "{} : sheetname duplication in {} index sheet",
                sheetname, side
            )))
            .attach_printable(format!("{} rows named {}", count, sheetname))),
        }
    }

    /// Distinct spreadsheet keys referenced by the index.
    pub fn keys(&self) -> error_stack::Result<Vec<String>, SheetMergerError> {
        self.document.unique_values_by_column(KEY_COLUMN)
    }

    pub async fn replace_keys(
        &self,
        replacements: &HashMap<String, String>,
    ) -> error_stack::Result<(), SheetMergerError> {
        self.document.replace_by_column(KEY_COLUMN, replacements).await
    }

    pub async fn refresh(&mut self) -> error_stack::Result<(), SheetMergerError> {
        self.document.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::in_memory_store::{text_grid, InMemoryDocumentStore};

    fn index(rows: &[&[&str]]) -> IndexSheet {
        IndexSheet::new(TabularDocument::from_values(
            Arc::new(InMemoryDocumentStore::new()),
            "IDX",
            "table_map",
            text_grid(rows),
        ))
    }

    #[test]
    fn test_find_unique_row() {
        let index = index(&[&["sheetname", "key"], &["users", "K1"], &["items", "K2"]]);
        assert_eq!(
            index.find_unique("items", "base").unwrap(),
            IndexRow {
                sheetname: "items".to_owned(),
                key: "K2".to_owned()
            }
        );
    }

    #[test]
    fn test_find_unique_rejects_duplicates() {
        let index = index(&[&["sheetname", "key"], &["users", "K1"], &["users", "K3"]]);
        let report = index.find_unique("users", "diff").unwrap_err();
        assert_eq!(
            report.current_context(),
            &SheetMergerError::validation("users : sheetname duplication in diff index sheet")
        );
    }

    #[test]
    fn test_find_unique_rejects_missing() {
        let index = index(&[&["sheetname", "key"], &["users", "K1"]]);
        let report = index.find_unique("orders", "base").unwrap_err();
        assert_eq!(
            report.current_context(),
            &SheetMergerError::validation("orders : no corresponding base index rows")
        );
    }

    #[test]
    fn test_index_without_key_column() {
        let index = index(&[&["sheetname"], &["users"]]);
        assert!(index.find_unique("users", "base").is_err());
    }

    #[test]
    fn test_keys_are_unique() {
        let index = index(&[
            &["sheetname", "key"],
            &["users", "A"],
            &["items", "B"],
            &["orders", "A"],
        ]);
        assert_eq!(index.keys().unwrap(), ["A", "B"]);
    }
}
