use std::fmt::Formatter;
use thiserror::Error;

use super::{
    column::{parse_col, Column, ColumnParseError},
    row::Row,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct A1Notation(String);

impl std::fmt::Display for A1Notation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<A1Notation> for String {
    fn from(a1_notation: A1Notation) -> Self {
        a1_notation.0
    }
}

impl From<String> for A1Notation {
    fn from(s: String) -> Self {
        A1Notation(s)
    }
}

impl From<&str> for A1Notation {
    fn from(s: &str) -> Self {
        A1Notation(s.to_owned())
    }
}

impl A1Notation {
    /// Every cell of `sheet_name`, e.g. `'users'`.
    pub fn whole_sheet(sheet_name: &str) -> Self {
        A1Notation(quote_sheet_name(sheet_name))
    }
}

impl AsRef<str> for A1Notation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub trait ToA1Notation {
    fn to_a1_notation(&self, sheet_name: Option<&str>) -> A1Notation;
}

pub trait FromA1Notation: Sized {
    fn from_a1_notation(a1_notation: &str) -> Result<Self, A1NotationParseError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum A1NotationParseError {
    #[error("Error parsing column: {0}")]
    ColumnParseError(ColumnParseError),
    #[error("Missing row number in {0}")]
    MissingRow(String),
    #[error("Unexpected row number in {0}")]
    UnexpectedRow(String),
    #[error("Invalid row number in {0}")]
    InvalidRow(String),
}

/// A single cell, e.g. `'users'!A5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub col: Column,
    pub row: Row,
}

/// A whole column, e.g. `'table_map'!C:C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    pub col: Column,
}

fn quote_sheet_name(sheet_name: &str) -> String {
    let bare = sheet_name.trim_start_matches('\'').trim_end_matches('\'');
    format!("'{}'", bare.replace('\'', "''"))
}

fn unquote_sheet_name(sheet_name: &str) -> String {
    match sheet_name
        .strip_prefix('\'')
        .and_then(|name| name.strip_suffix('\''))
    {
        Some(name) => name.replace("''", "'"),
        None => sheet_name.to_owned(),
    }
}

impl ToA1Notation for CellPosition {
    fn to_a1_notation(&self, sheet_name: Option<&str>) -> A1Notation {
        match sheet_name {
            Some(sheet_name) => A1Notation(format!(
                "{}!{}{}",
                quote_sheet_name(sheet_name),
                self.col,
                self.row
            )),
            None => A1Notation(format!("{}{}", self.col, self.row)),
        }
    }
}

impl ToA1Notation for ColumnSpan {
    fn to_a1_notation(&self, sheet_name: Option<&str>) -> A1Notation {
        match sheet_name {
            Some(sheet_name) => A1Notation(format!(
                "{}!{}:{}",
                quote_sheet_name(sheet_name),
                self.col,
                self.col
            )),
            None => A1Notation(format!("{}:{}", self.col, self.col)),
        }
    }
}

pub struct A1NotationParts {
    pub sheet_title: Option<String>,
    pub start: String,
    pub end: String,
}

pub fn generic_a1_notation_split(a1_notation: &A1Notation) -> A1NotationParts {
    let (sheet_title, local_a1_notation) = match a1_notation.0.rfind('!') {
        Some(index) => {
            let (sheet_title, local_a1_notation) = a1_notation.0.split_at(index);
            (
                Some(unquote_sheet_name(sheet_title)),
                local_a1_notation.trim_start_matches('!').to_owned(),
            )
        }
        None => (None, a1_notation.0.clone()),
    };

    let (start, end) = match local_a1_notation.find(':') {
        Some(index) => {
            let (start, end) = local_a1_notation.split_at(index);
            (start, end.trim_start_matches(':'))
        }
        None => (local_a1_notation.as_str(), local_a1_notation.as_str()),
    };

    A1NotationParts {
        sheet_title,
        start: start.to_owned(),
        end: end.to_owned(),
    }
}

fn split_reference(reference: &str) -> (&str, &str) {
    let digits_at = reference
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(reference.len());
    reference.split_at(digits_at)
}

impl FromA1Notation for CellPosition {
    fn from_a1_notation(a1_notation: &str) -> Result<Self, A1NotationParseError> {
        let (letters, digits) = split_reference(a1_notation);
        let col = parse_col(letters).map_err(A1NotationParseError::ColumnParseError)?;
        if digits.is_empty() {
            return Err(A1NotationParseError::MissingRow(a1_notation.to_owned()));
        }
        let row = match digits.parse::<Row>() {
            Ok(row) if row.row() > 0 && digits != "0" => row,
            _ => return Err(A1NotationParseError::InvalidRow(a1_notation.to_owned())),
        };
        Ok(CellPosition { col, row })
    }
}

impl FromA1Notation for ColumnSpan {
    fn from_a1_notation(a1_notation: &str) -> Result<Self, A1NotationParseError> {
        let (letters, digits) = split_reference(a1_notation);
        if !digits.is_empty() {
            return Err(A1NotationParseError::UnexpectedRow(a1_notation.to_owned()));
        }
        let col = parse_col(letters).map_err(A1NotationParseError::ColumnParseError)?;
        Ok(ColumnSpan { col })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_position_with_sheet() {
        let position = CellPosition {
            col: Column::from_index(0),
            row: Row::from_row(5),
        };
        assert_eq!(position.to_a1_notation(Some("users")).as_ref(), "'users'!A5");
        assert_eq!(position.to_a1_notation(None).as_ref(), "A5");
    }

    #[test]
    fn test_whole_sheet() {
        assert_eq!(A1Notation::whole_sheet("table_map").as_ref(), "'table_map'");
        assert_eq!(A1Notation::whole_sheet("it's").as_ref(), "'it''s'");
    }

    #[test]
    fn test_column_span_with_sheet() {
        let span = ColumnSpan {
            col: Column::from_index(27),
        };
        assert_eq!(
            span.to_a1_notation(Some("table_map")).as_ref(),
            "'table_map'!AB:AB"
        );
    }

    #[test]
    fn test_sheet_name_with_quote_is_escaped() {
        let span = ColumnSpan {
            col: Column::from_index(0),
        };
        let a1 = span.to_a1_notation(Some("bob's"));
        assert_eq!(a1.as_ref(), "'bob''s'!A:A");

        let parts = generic_a1_notation_split(&a1);
        assert_eq!(parts.sheet_title.as_deref(), Some("bob's"));
    }

    #[test]
    fn test_split_cell_reference() {
        let parts = generic_a1_notation_split(&A1Notation::from("'users'!A5"));
        assert_eq!(parts.sheet_title.as_deref(), Some("users"));
        assert_eq!(parts.start, "A5");
        assert_eq!(parts.end, "A5");
    }

    #[test]
    fn test_split_range_without_sheet() {
        let parts = generic_a1_notation_split(&A1Notation::from("C:C"));
        assert_eq!(parts.sheet_title, None);
        assert_eq!(parts.start, "C");
        assert_eq!(parts.end, "C");
    }

    #[test]
    fn test_parse_cell_position() {
        let position = CellPosition::from_a1_notation("AB12").unwrap();
        assert_eq!(position.col.letters(), "AB");
        assert_eq!(position.row.row(), 12);
        assert!(matches!(
            CellPosition::from_a1_notation("AB"),
            Err(A1NotationParseError::MissingRow(_))
        ));
        assert!(matches!(
            CellPosition::from_a1_notation("A0"),
            Err(A1NotationParseError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_parse_column_span() {
        assert_eq!(ColumnSpan::from_a1_notation("c").unwrap().col.index(), 2);
        assert!(matches!(
            ColumnSpan::from_a1_notation("C3"),
            Err(A1NotationParseError::UnexpectedRow(_))
        ));
    }
}
