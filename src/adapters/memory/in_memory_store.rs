use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use error_stack::{report, ResultExt};

use crate::{
    domain::sheets::{
        a1_notation::{generic_a1_notation_split, A1Notation, CellPosition, ColumnSpan, FromA1Notation},
        cell_value::{CellGrid, CellValue},
    },
    ports::document_store::{DocumentMetadata, DocumentStore, DocumentStoreError, StoreOperation},
};

/// Builds a grid of text cells.
pub fn text_grid(rows: &[&[&str]]) -> CellGrid {
    rows.iter()
        .map(|row| row.iter().map(|cell| CellValue::text(*cell)).collect())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredKind {
    Folder,
    Spreadsheet,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub name: String,
    pub kind: StoredKind,
    pub parent: Option<String>,
    pub sheets: HashMap<String, CellGrid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: StoreOperation,
    pub target: String,
}

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<String, StoredDocument>,
    calls: Vec<StoreCall>,
    failing: HashSet<StoreOperation>,
    failing_targets: Vec<(StoreOperation, String, DocumentStoreError)>,
    dropped_writes: HashSet<StoreOperation>,
    next_key: u64,
}

impl StoreState {
    fn record(&mut self, operation: StoreOperation, target: String) -> error_stack::Result<(), DocumentStoreError> {
        self.calls.push(StoreCall {
            operation,
            target: target.clone(),
        });
        if self.failing.contains(&operation) {
            return Err(report!(DocumentStoreError::Transport))
                .attach_printable_lazy(|| format!("injected failure: {} {}", operation, target));
        }
        let targeted = self
            .failing_targets
            .iter()
            .find(|(failing, prefix, _)| *failing == operation && target.starts_with(prefix.as_str()));
        if let Some((_, _, kind)) = targeted {
            return Err(report!(*kind))
                .attach_printable_lazy(|| format!("injected failure: {} {}", operation, target));
        }
        Ok(())
    }

    fn document(&self, key: &str) -> error_stack::Result<&StoredDocument, DocumentStoreError> {
        self.documents
            .get(key)
            .ok_or_else(|| report!(DocumentStoreError::NotFound))
            .attach_printable_lazy(|| format!("no document with key {}", key))
    }

    fn document_mut(&mut self, key: &str) -> error_stack::Result<&mut StoredDocument, DocumentStoreError> {
        self.documents
            .get_mut(key)
            .ok_or_else(|| report!(DocumentStoreError::NotFound))
            .attach_printable_lazy(|| format!("no document with key {}", key))
    }

    fn sheet_mut(
        &mut self,
        key: &str,
        range: &A1Notation,
    ) -> error_stack::Result<(&mut CellGrid, String, String), DocumentStoreError> {
        let parts = generic_a1_notation_split(range);
        let sheet_name = parts
            .sheet_title
            .ok_or_else(|| report!(DocumentStoreError::MalformedResponse("range without sheet")))
            .attach_printable_lazy(|| format!("range {}", range))?;
        let grid = self
            .document_mut(key)?
            .sheets
            .get_mut(&sheet_name)
            .ok_or_else(|| report!(DocumentStoreError::NotFound))
            .attach_printable_lazy(|| format!("no sheet {} in {}", sheet_name, key))?;
        Ok((grid, parts.start, parts.end))
    }

    fn allocate_key(&mut self, prefix: &str) -> String {
        loop {
            self.next_key += 1;
            let key = format!("{}-{}", prefix, self.next_key);
            if !self.documents.contains_key(&key) {
                return key;
            }
        }
    }

    fn remove_tree(&mut self, key: &str) {
        let children: Vec<String> = self
            .documents
            .iter()
            .filter(|(_, document)| document.parent.as_deref() == Some(key))
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            self.remove_tree(&child);
        }
        self.documents.remove(key);
    }
}

/// Store kept entirely in memory. Writes follow the Sheets semantics closely
/// enough for the merge and backup flows: appends land at the requested row,
/// column updates overwrite one column top-down.
///
/// Every call is logged, and any operation can be made to fail or, for the
/// two write operations, to be accepted without changing anything.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    state: Mutex<StoreState>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, key: &str, name: &str, kind: StoredKind, parent: Option<&str>) {
        self.state().documents.insert(
            key.to_owned(),
            StoredDocument {
                name: name.to_owned(),
                kind,
                parent: parent.map(str::to_owned),
                sheets: HashMap::new(),
            },
        );
    }

    pub fn add_folder(&self, key: &str, name: &str, parent: Option<&str>) {
        self.insert(key, name, StoredKind::Folder, parent);
    }

    pub fn add_spreadsheet(&self, key: &str, name: &str, parent: Option<&str>) {
        self.insert(key, name, StoredKind::Spreadsheet, parent);
    }

    /// Replaces (or creates) a sheet. Creates the spreadsheet if needed.
    pub fn put_sheet(&self, key: &str, sheet_name: &str, grid: CellGrid) {
        let mut state = self.state();
        let document = state
            .documents
            .entry(key.to_owned())
            .or_insert_with(|| StoredDocument {
                name: key.to_owned(),
                kind: StoredKind::Spreadsheet,
                parent: None,
                sheets: HashMap::new(),
            });
        document.sheets.insert(sheet_name.to_owned(), grid);
    }

    pub fn sheet(&self, key: &str, sheet_name: &str) -> Option<CellGrid> {
        self.state()
            .documents
            .get(key)
            .and_then(|document| document.sheets.get(sheet_name).cloned())
    }

    pub fn document(&self, key: &str) -> Option<StoredDocument> {
        self.state().documents.get(key).cloned()
    }

    /// Keys of the direct children of `key`, sorted.
    pub fn children_of(&self, key: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .state()
            .documents
            .iter()
            .filter(|(_, document)| document.parent.as_deref() == Some(key))
            .map(|(child, _)| child.clone())
            .collect();
        children.sort();
        children
    }

    pub fn fail_on(&self, operation: StoreOperation) {
        self.state().failing.insert(operation);
    }

    /// Fail `operation` with `kind` whenever its target starts with
    /// `target_prefix`. Copies get keys starting with `copy-`.
    pub fn fail_on_target(&self, operation: StoreOperation, target_prefix: &str, kind: DocumentStoreError) {
        self.state()
            .failing_targets
            .push((operation, target_prefix.to_owned(), kind));
    }

    /// Accept `operation` (append or update) but keep the data unchanged.
    pub fn drop_writes_on(&self, operation: StoreOperation) {
        self.state().dropped_writes.insert(operation);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Targets of every call made to `operation`, in call order.
    pub fn calls_to(&self, operation: StoreOperation) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .map(|call| call.target.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_cell_grid(
        &self,
        document_key: &str,
        sheet_name: &str,
    ) -> error_stack::Result<CellGrid, DocumentStoreError> {
        let mut state = self.state();
        state.record(
            StoreOperation::GetCellGrid,
            format!("{} {}", document_key, sheet_name),
        )?;
        state
            .document(document_key)?
            .sheets
            .get(sheet_name)
            .cloned()
            .ok_or_else(|| report!(DocumentStoreError::NotFound))
            .attach_printable_lazy(|| format!("no sheet {} in {}", sheet_name, document_key))
    }

    async fn append_rows(
        &self,
        document_key: &str,
        range: &A1Notation,
        rows: CellGrid,
    ) -> error_stack::Result<(), DocumentStoreError> {
        let mut state = self.state();
        state.record(
            StoreOperation::AppendRows,
            format!("{} {}", document_key, range),
        )?;
        let dropped = state.dropped_writes.contains(&StoreOperation::AppendRows);

        let (grid, start, _) = state.sheet_mut(document_key, range)?;
        let position = CellPosition::from_a1_notation(&start)
            .change_context(DocumentStoreError::MalformedResponse("append range"))?;
        if dropped {
            return Ok(());
        }

        let first_row = position.row.index() as usize;
        let offset = position.col.index();
        while grid.len() < first_row {
            grid.push(Vec::new());
        }
        for row in rows {
            let mut padded = vec![CellValue::Empty; offset];
            padded.extend(row);
            grid.push(padded);
        }
        Ok(())
    }

    async fn update_range(
        &self,
        document_key: &str,
        range: &A1Notation,
        rows: CellGrid,
    ) -> error_stack::Result<(), DocumentStoreError> {
        let mut state = self.state();
        state.record(
            StoreOperation::UpdateRange,
            format!("{} {}", document_key, range),
        )?;
        let dropped = state.dropped_writes.contains(&StoreOperation::UpdateRange);

        let (grid, start, end) = state.sheet_mut(document_key, range)?;
        let span = ColumnSpan::from_a1_notation(&start)
            .change_context(DocumentStoreError::MalformedResponse("update range"))?;
        if start != end {
            return Err(report!(DocumentStoreError::MalformedResponse(
                "only single column updates are supported"
            )))
            .attach_printable_lazy(|| format!("range {}", range));
        }
        if dropped {
            return Ok(());
        }

        let column = span.col.index();
        for (index, row) in rows.into_iter().enumerate() {
            let value = row.into_iter().next().unwrap_or_default();
            while grid.len() <= index {
                grid.push(Vec::new());
            }
            let target = &mut grid[index];
            if target.len() <= column {
                target.resize(column + 1, CellValue::Empty);
            }
            target[column] = value;
        }
        Ok(())
    }

    async fn get_document_metadata(
        &self,
        document_key: &str,
    ) -> error_stack::Result<DocumentMetadata, DocumentStoreError> {
        let mut state = self.state();
        state.record(StoreOperation::GetDocumentMetadata, document_key.to_owned())?;
        let document = state.document(document_key)?;
        Ok(DocumentMetadata {
            key: document_key.to_owned(),
            display_name: document.name.clone(),
        })
    }

    async fn list_children(
        &self,
        folder_key: &str,
        folders_only: bool,
    ) -> error_stack::Result<Vec<DocumentMetadata>, DocumentStoreError> {
        let mut state = self.state();
        state.record(StoreOperation::ListChildren, folder_key.to_owned())?;
        let mut children: Vec<DocumentMetadata> = state
            .documents
            .iter()
            .filter(|(_, document)| document.parent.as_deref() == Some(folder_key))
            .filter(|(_, document)| !folders_only || document.kind == StoredKind::Folder)
            .map(|(key, document)| DocumentMetadata {
                key: key.clone(),
                display_name: document.name.clone(),
            })
            .collect();
        children.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(children)
    }

    async fn create_folder(
        &self,
        parent_key: &str,
        name: &str,
    ) -> error_stack::Result<String, DocumentStoreError> {
        let mut state = self.state();
        state.record(
            StoreOperation::CreateFolder,
            format!("{} {}", parent_key, name),
        )?;
        state.document(parent_key)?;

        let key = state.allocate_key("folder");
        state.documents.insert(
            key.clone(),
            StoredDocument {
                name: name.to_owned(),
                kind: StoredKind::Folder,
                parent: Some(parent_key.to_owned()),
                sheets: HashMap::new(),
            },
        );
        Ok(key)
    }

    async fn copy_document(
        &self,
        document_key: &str,
        destination_folder_key: &str,
        name: &str,
    ) -> error_stack::Result<String, DocumentStoreError> {
        let mut state = self.state();
        state.record(
            StoreOperation::CopyDocument,
            format!("{} {}", document_key, destination_folder_key),
        )?;
        state.document(destination_folder_key)?;
        let mut copy = state.document(document_key)?.clone();
        copy.name = name.to_owned();
        copy.parent = Some(destination_folder_key.to_owned());

        let key = state.allocate_key("copy");
        state.documents.insert(key.clone(), copy);
        Ok(key)
    }

    async fn delete_document(&self, key: &str) -> error_stack::Result<(), DocumentStoreError> {
        let mut state = self.state();
        state.record(StoreOperation::DeleteDocument, key.to_owned())?;
        state.document(key)?;
        state.remove_tree(key);
        Ok(())
    }
}
