use google_sheets4::api::ValueRange;
use serde_json::Value;

use crate::domain::sheets::cell_value::{CellGrid, CellValue};

pub trait ValueRangeFactory {
    fn from_grid(rows: CellGrid) -> Self;
}

/// Conversions: ValueRange -> CellGrid
pub trait IntoCellGrid {
    fn into_cell_grid(self) -> CellGrid;
}

fn wrap_row(row: Vec<CellValue>) -> Vec<Value> {
    row.into_iter().map(Value::from).collect()
}

impl ValueRangeFactory for ValueRange {
    fn from_grid(rows: CellGrid) -> Self {
        Self {
            major_dimension: Some("ROWS".to_string()),
            range: None,
            values: Some(rows.into_iter().map(wrap_row).collect()),
        }
    }
}

impl IntoCellGrid for ValueRange {
    fn into_cell_grid(self) -> CellGrid {
        self.values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_iter().map(CellValue::from).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_grid() {
        let value_range = ValueRange::from_grid(vec![
            vec![CellValue::text("id"), CellValue::Empty],
            vec![CellValue::Number(3.0)],
        ]);
        assert_eq!(
            value_range.major_dimension,
            Some("ROWS".to_string()),
            "Major dimension should be ROWS"
        );
        assert_eq!(value_range.range, None, "Range should be None");
        assert_eq!(
            value_range.values,
            Some(vec![vec![json!("id"), json!("")], vec![json!(3)]]),
        );
    }

    #[test]
    fn test_into_cell_grid_of_empty_sheet() {
        let value_range = ValueRange {
            major_dimension: Some("ROWS".to_string()),
            range: Some("'users'!A1:Z1000".to_string()),
            values: None,
        };
        assert!(value_range.into_cell_grid().is_empty());
    }

    #[test]
    fn test_into_cell_grid_keeps_ragged_rows() {
        let value_range = ValueRange {
            major_dimension: None,
            range: None,
            values: Some(vec![vec![json!("id"), json!("name")], vec![json!("1")]]),
        };
        assert_eq!(
            value_range.into_cell_grid(),
            vec![
                vec![CellValue::text("id"), CellValue::text("name")],
                vec![CellValue::text("1")],
            ]
        );
    }
}
