use std::fmt::Formatter;

use thiserror::Error;

/// 1-based spreadsheet column. Column 1 is `A`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(u32);

impl Column {
    /// Column from a zero-based position in a grid row.
    pub fn from_index(index: usize) -> Self {
        Column(u32::try_from(index).unwrap_or(u32::MAX - 1).saturating_add(1))
    }

    /// Zero-based position in a grid row.
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn letters(&self) -> String {
        number_to_letters(self.0)
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letters())
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Column(u32: {}, letters: {})", self.0, self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnParseError {
    #[error("Non-alphabetic character in column")]
    NonAlphabeticCharacter,
    #[error("Empty column")]
    Empty,
}

pub fn parse_col<T: AsRef<str>>(col_str: T) -> Result<Column, ColumnParseError> {
    let col_str = col_str.as_ref();
    if col_str.is_empty() {
        return Err(ColumnParseError::Empty);
    }
    if col_str.chars().any(|c| !c.is_ascii_alphabetic()) {
        return Err(ColumnParseError::NonAlphabeticCharacter);
    }

    let col_num = col_str
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .fold(0u32, |acc, c| {
            acc.saturating_mul(26)
                .saturating_add(c as u32 - 'A' as u32 + 1)
        });

    Ok(Column(col_num))
}

/// Spreadsheet letters for a 1-based column number: 1 is `A`, 26 is `Z`,
/// 27 is `AA`, 703 is `AAA`. Zero has no letters and maps to `""`.
pub fn number_to_letters(number: u32) -> String {
    let mut number = number;
    let mut result = String::new();
    while number > 0 {
        let remainder = (number - 1) % 26;
        let letter = (remainder as u8 + b'A') as char;
        result.push(letter);
        number = (number - remainder) / 26;
    }
    result.chars().rev().collect()
}
