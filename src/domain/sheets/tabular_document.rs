use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use error_stack::{report, ResultExt};
use tracing::instrument;

use crate::{
    domain::error::SheetMergerError,
    ports::document_store::{DocumentStore, StoreOperation},
};

use super::{
    a1_notation::{CellPosition, ColumnSpan, ToA1Notation},
    cell_value::{CellGrid, CellValue},
    column::Column,
    row::Row,
};

/// Column every logical row is keyed by.
pub const ID_COLUMN: &str = "id";

/// One logical row: header name -> cell.
pub type Record = HashMap<String, CellValue>;

/// Everything computed from the raw grid. Built at most once per grid and
/// thrown away as a whole whenever the grid changes.
#[derive(Debug)]
struct Derived {
    header_row: Vec<String>,
    headers: Vec<String>,
    header_indexes: Vec<usize>,
    rows: Vec<Record>,
}

impl Derived {
    fn compute(values: &CellGrid) -> error_stack::Result<Self, SheetMergerError> {
        let header_cells = values
            .first()
            .ok_or_else(|| report!(SheetMergerError::validation("header row is missing")))?;

        let header_row = header_cells
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                cell.as_text().map(str::to_owned).ok_or_else(|| {
                    report!(SheetMergerError::validation(format!(
                        "header cell {} is {}, expected text",
                        Column::from_index(index),
                        cell.type_name()
                    )))
                })
            })
            .collect::<error_stack::Result<Vec<_>, _>>()?;

        let (header_indexes, headers): (Vec<usize>, Vec<String>) = header_row
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(index, name)| (index, name.clone()))
            .unzip();

        // Sheets without an id column (index sheets) keep every data row.
        let keyed_by_id = headers.iter().any(|name| name == ID_COLUMN);

        let rows = values
            .iter()
            .skip(1)
            .map(|raw| {
                header_indexes
                    .iter()
                    .zip(headers.iter())
                    .map(|(&index, name)| (name.clone(), raw.get(index).cloned().unwrap_or_default()))
                    .collect::<Record>()
            })
            .filter(|record| {
                !keyed_by_id || record.get(ID_COLUMN).is_some_and(|id| !id.is_empty())
            })
            .collect();

        Ok(Derived {
            header_row,
            headers,
            header_indexes,
            rows,
        })
    }
}

/// One sheet of a remote spreadsheet: raw cell grid plus the header/row view
/// derived from it.
pub struct TabularDocument {
    store: Arc<dyn DocumentStore>,
    key: String,
    sheet_name: String,
    values: CellGrid,
    derived: OnceLock<Derived>,
}

impl Debug for TabularDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularDocument")
            .field("key", &self.key)
            .field("sheet_name", &self.sheet_name)
            .field("raw_rows", &self.values.len())
            .finish()
    }
}

impl TabularDocument {
    pub fn from_values<K: Into<String>, S: Into<String>>(
        store: Arc<dyn DocumentStore>,
        key: K,
        sheet_name: S,
        values: CellGrid,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            sheet_name: sheet_name.into(),
            values,
            derived: OnceLock::new(),
        }
    }

    #[instrument(skip(store))]
    pub async fn fetch(
        store: Arc<dyn DocumentStore>,
        key: &str,
        sheet_name: &str,
    ) -> error_stack::Result<Self, SheetMergerError> {
        let values = store
            .get_cell_grid(key, sheet_name)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::GetCellGrid.name()))
            .attach_printable_lazy(|| {
                format!("fetch failed. key:{} sheetname:{}", key, sheet_name)
            })?;

        Ok(Self::from_values(store, key, sheet_name, values))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn values(&self) -> &CellGrid {
        &self.values
    }

    // The only place the grid is replaced; the derived view goes with it.
    fn set_values(&mut self, values: CellGrid) {
        self.values = values;
        self.derived = OnceLock::new();
    }

    fn derived(&self) -> error_stack::Result<&Derived, SheetMergerError> {
        if let Some(derived) = self.derived.get() {
            return Ok(derived);
        }

        let computed = Derived::compute(&self.values).attach_printable_lazy(|| {
            format!("key:{} sheetname:{}", self.key, self.sheet_name)
        })?;
        Ok(self.derived.get_or_init(|| computed))
    }

    /// Non-empty header names, left to right.
    pub fn headers(&self) -> error_stack::Result<&[String], SheetMergerError> {
        Ok(&self.derived()?.headers)
    }

    /// Grid positions of [`Self::headers`].
    pub fn header_indexes(&self) -> error_stack::Result<&[usize], SheetMergerError> {
        Ok(&self.derived()?.header_indexes)
    }

    /// The header row as written, blank cells included. Appended rows are
    /// laid out against this so they land under the right physical column.
    pub fn header_row(&self) -> error_stack::Result<&[String], SheetMergerError> {
        Ok(&self.derived()?.header_row)
    }

    /// Logical rows: every data row whose `id` is non-empty. Cells missing
    /// from short rows read as empty.
    pub fn rows(&self) -> error_stack::Result<&[Record], SheetMergerError> {
        Ok(&self.derived()?.rows)
    }

    /// Distinct text values of `column` in first-occurrence order.
    pub fn unique_values_by_column(
        &self,
        column: &str,
    ) -> error_stack::Result<Vec<String>, SheetMergerError> {
        if !self.headers()?.iter().any(|name| name == column) {
            return Err(report!(SheetMergerError::validation(format!(
                "column {} not found",
                column
            ))))
            .attach_printable_lazy(|| {
                format!("key:{} sheetname:{}", self.key, self.sheet_name)
            });
        }

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for (position, row) in self.rows()?.iter().enumerate() {
            let cell = row.get(column).cloned().unwrap_or_default();
            let text = cell.as_text().ok_or_else(|| {
                report!(SheetMergerError::validation(format!(
                    "column {} holds a {} value, expected text",
                    column,
                    cell.type_name()
                )))
                .attach_printable(format!(
                    "key:{} sheetname:{} logical row:{} value:{}",
                    self.key, self.sheet_name, position, cell
                ))
            })?;
            if seen.insert(text.to_owned()) {
                unique.push(text.to_owned());
            }
        }

        Ok(unique)
    }

    /// Grid position of the first header cell equal to `column`.
    pub fn header_index_by_column(&self, column: &str) -> Option<usize> {
        self.values
            .first()?
            .iter()
            .position(|cell| cell.as_text() == Some(column))
    }

    /// Values of `column` that occur more than once across the logical rows
    /// of `self` and `other` together, each reported once.
    pub fn dup_check_by_column(
        &self,
        other: &TabularDocument,
        column: &str,
    ) -> error_stack::Result<Vec<CellValue>, SheetMergerError> {
        let mut order = Vec::new();
        let mut counts: HashMap<CellValue, usize> = HashMap::new();

        for row in self.rows()?.iter().chain(other.rows()?.iter()) {
            let value = row.get(column).cloned().unwrap_or_default();
            let count = counts.entry(value.clone()).or_insert(0);
            if *count == 0 {
                order.push(value);
            }
            *count += 1;
        }

        Ok(order
            .into_iter()
            .filter(|value| counts.get(value).is_some_and(|count| *count > 1))
            .collect())
    }

    /// Projects every logical row onto `headers`. Blank or unknown header
    /// names produce empty cells.
    pub fn to_ordered_values<S: AsRef<str>>(
        &self,
        headers: &[S],
    ) -> error_stack::Result<CellGrid, SheetMergerError> {
        Ok(self
            .rows()?
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|header| match header.as_ref() {
                        "" => CellValue::Empty,
                        name => row.get(name).cloned().unwrap_or_default(),
                    })
                    .collect()
            })
            .collect())
    }

    /// Appends the logical rows of `diff` below this sheet, leaving one blank
    /// row, in this sheet's column order.
    #[instrument(skip(self, diff), fields(base = %self.key, diff = %diff.key, sheet = %self.sheet_name))]
    pub async fn merge(&self, diff: &TabularDocument) -> error_stack::Result<(), SheetMergerError> {
        let values = diff.to_ordered_values(self.header_row()?)?;
        if values.is_empty() {
            tracing::info!("{} : nothing to append", self.sheet_name);
            return Ok(());
        }

        let range = CellPosition {
            col: Column::from_index(0),
            row: Row::after(self.values.len(), 1),
        }
        .to_a1_notation(Some(&self.sheet_name));

        let appended = values.len();
        self.store
            .append_rows(&self.key, &range, values)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::AppendRows.name()))
            .attach_printable_lazy(|| {
                format!("sheet append failed. key:{} range:{}", self.key, range)
            })?;

        tracing::debug!("{} : appended {} rows at {}", self.sheet_name, appended, range);
        Ok(())
    }

    /// Rewrites `column` on every grid row, header included, swapping values
    /// found in `replacements`. Other values are written back unchanged.
    ///
    /// The in-memory grid is left as it was; call [`Self::refresh`] to see the
    /// new values.
    #[instrument(skip(self, replacements), fields(key = %self.key, sheet = %self.sheet_name))]
    pub async fn replace_by_column(
        &self,
        column: &str,
        replacements: &HashMap<String, String>,
    ) -> error_stack::Result<(), SheetMergerError> {
        let index = self.header_index_by_column(column).ok_or_else(|| {
            report!(SheetMergerError::validation(format!(
                "column {} not found",
                column
            )))
            .attach_printable(format!("key:{} sheetname:{}", self.key, self.sheet_name))
        })?;

        let update = self
            .values
            .iter()
            .map(|raw| {
                let cell = raw.get(index).cloned().unwrap_or_default();
                let replaced = match cell.as_text().and_then(|text| replacements.get(text)) {
                    Some(new_value) => CellValue::text(new_value.as_str()),
                    None => cell,
                };
                vec![replaced]
            })
            .collect::<CellGrid>();

        let range = ColumnSpan {
            col: Column::from_index(index),
        }
        .to_a1_notation(Some(&self.sheet_name));

        self.store
            .update_range(&self.key, &range, update)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::UpdateRange.name()))
            .attach_printable_lazy(|| {
                format!("sheet update failed. key:{} range:{}", self.key, range)
            })
    }

    /// Re-reads the grid from the store and drops the derived view.
    #[instrument(skip(self), fields(key = %self.key, sheet = %self.sheet_name))]
    pub async fn refresh(&mut self) -> error_stack::Result<(), SheetMergerError> {
        let values = self
            .store
            .get_cell_grid(&self.key, &self.sheet_name)
            .await
            .change_context(SheetMergerError::remote(StoreOperation::GetCellGrid.name()))
            .attach_printable_lazy(|| {
                format!("fetch failed. key:{} sheetname:{}", self.key, self.sheet_name)
            })?;

        self.set_values(values);
        Ok(())
    }
}
