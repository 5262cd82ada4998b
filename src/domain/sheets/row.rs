use std::{fmt::Formatter, num::ParseIntError, str::FromStr};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row {
    index: u32,
}

impl Row {
    pub fn from_index(index: u32) -> Self {
        Row { index }
    }

    pub fn from_row(row: u32) -> Self {
        Row {
            index: row.saturating_sub(1), // Convert to zero-based index
        }
    }

    /// Row placed right after `len` existing grid rows plus `margin` blank rows.
    pub fn after(len: usize, margin: u32) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        Row::from_index(len.saturating_add(margin))
    }

    /// Returns the row number as a 1-based index.
    /// # Examples
    /// ```
    /// use sheet_merger::domain::sheets::row::Row;
    /// let row = Row::from_index(0);
    /// assert_eq!(row.row(), 1);
    /// let row = Row::from_index(4);
    /// assert_eq!(row.row(), 5);
    /// ```
    pub fn row(&self) -> u32 {
        self.index.saturating_add(1)
    }

    /// Returns the row index as a zero-based index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.row())
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row(index: {}, row: {})", self.index(), self.row())
    }
}

impl FromStr for Row {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let row = s.parse::<u32>()?;
        Ok(Row::from_row(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_display() {
        let row = Row::from_index(0);
        assert_eq!(row.to_string(), "1");
    }

    #[test]
    fn test_row_debug() {
        let row = Row::from_index(4);
        assert_eq!(format!("{:?}", row), "Row(index: 4, row: 5)");
    }

    #[test]
    fn test_index_from_row() {
        let row = Row::from_row(5);
        assert_eq!(row.index(), 4); // Zero-based index
    }

    #[test]
    fn test_zero_row() {
        let row = Row::from_row(0);
        assert_eq!(row.index(), 0);
        assert_eq!(row.row(), 1);
    }

    #[test]
    fn test_row_after_grid_with_margin() {
        // 3 rows in the grid, one blank row of margin: writing starts on row 5.
        assert_eq!(Row::after(3, 1).row(), 5);
        assert_eq!(Row::after(0, 0).row(), 1);
    }

    #[test]
    fn test_row_from_str() {
        let row: Row = "5".parse().unwrap();
        assert_eq!(row, Row::from_row(5));
        assert!("abc".parse::<Row>().is_err());
    }
}
