//! Cell locations in A1 notation

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// Location of one cell, zero-based.
///
/// `B13` is `row: 12, col: 1`. `$` markers are accepted when parsing and
/// dropped; workbook parts always get the plain reference back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: u32,
    pub col: u16,
}

impl CellAddress {
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Column letters plus the row number printed in the sheet, as layout
    /// settings name cells: `("B", 44)` is B44.
    pub fn at(column: &str, row_number: u32) -> Result<Self> {
        if !(1..=MAX_ROWS).contains(&row_number) {
            return Err(Error::RowOutOfBounds(row_number, MAX_ROWS));
        }
        Ok(Self::new(row_number - 1, Self::letters_to_column(column)?))
    }

    /// Read a reference such as `E7` or `$E$7`.
    ///
    /// ```
    /// use dealsheets_core::CellAddress;
    ///
    /// let price = CellAddress::parse("$E$7").unwrap();
    /// assert_eq!(price, CellAddress::new(6, 4));
    /// assert_eq!(price.to_string(), "E7");
    /// ```
    pub fn parse(reference: &str) -> Result<Self> {
        let text = reference.trim();
        let rest = text.strip_prefix('$').unwrap_or(text);

        let split = rest
            .bytes()
            .position(|b| !b.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (letters, rest) = rest.split_at(split);
        let digits = rest.strip_prefix('$').unwrap_or(rest);

        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!("'{}'", text)));
        }
        let row_number: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("row of '{}'", text)))?;
        if row_number == 0 {
            return Err(Error::InvalidAddress(format!("row 0 in '{}'", text)));
        }
        Self::at(letters, row_number)
    }

    /// `0` is A, `26` is AA
    pub fn column_to_letters(col: u16) -> String {
        let mut rest = u32::from(col) + 1;
        let mut reversed = Vec::with_capacity(3);
        while rest > 0 {
            let digit = (rest - 1) % 26;
            reversed.push(char::from(b'A' + digit as u8));
            rest = (rest - 1) / 26;
        }
        reversed.into_iter().rev().collect()
    }

    /// Inverse of [`column_to_letters`](Self::column_to_letters), case-insensitive
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("no column letters".into()));
        }
        let mut number: u32 = 0;
        for b in letters.bytes() {
            if !b.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!("column '{}'", letters)));
            }
            number = number * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1;
            if number > u32::from(MAX_COLS) {
                return Err(Error::ColumnOutOfBounds(number, MAX_COLS));
            }
        }
        Ok((number - 1) as u16)
    }

    pub fn row_number(&self) -> u32 {
        self.row + 1
    }

    pub fn column_letters(&self) -> String {
        Self::column_to_letters(self.col)
    }

    pub fn to_a1_string(&self) -> String {
        format!("{}{}", self.column_letters(), self.row_number())
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Block of cells between two corners, e.g. the item rows `B3:H42`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Any two opposite corners; `start` ends up top-left
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// `("B", 3, "H", 42)` is B3:H42
    pub fn columns(first_col: &str, first_row: u32, last_col: &str, last_row: u32) -> Result<Self> {
        Ok(Self::new(
            CellAddress::at(first_col, first_row)?,
            CellAddress::at(last_col, last_row)?,
        ))
    }

    /// `B3:H42`, or a single cell
    pub fn parse(text: &str) -> Result<Self> {
        let mut corners = text.trim().split(':');
        let first = corners.next().unwrap_or_default();
        let second = corners.next();
        if corners.next().is_some() {
            return Err(Error::InvalidRange(text.trim().to_string()));
        }
        let start = CellAddress::parse(first)?;
        let end = match second {
            Some(end) => CellAddress::parse(end)?,
            None => start,
        };
        Ok(Self::new(start, end))
    }

    pub fn contains(&self, addr: &CellAddress) -> bool {
        (self.start.row..=self.end.row).contains(&addr.row)
            && (self.start.col..=self.end.col).contains(&addr.col)
    }

    /// Every address in the block, left to right then top to bottom
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellAddress::new(row, col)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout_columns() {
        let letters: Vec<String> = [1, 7, 8, 21, 22, 23, 25, 26, 701, 702, 16383]
            .into_iter()
            .map(CellAddress::column_to_letters)
            .collect();
        assert_eq!(
            letters,
            vec!["B", "H", "I", "V", "W", "X", "Z", "AA", "ZZ", "AAA", "XFD"]
        );

        assert_eq!(CellAddress::letters_to_column("x").unwrap(), 23);
        assert_eq!(CellAddress::letters_to_column("XFD").unwrap(), 16383);
        assert!(CellAddress::letters_to_column("XFE").is_err());
        assert!(CellAddress::letters_to_column("B2").is_err());
        assert!(CellAddress::letters_to_column("").is_err());
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(CellAddress::parse("B13").unwrap(), CellAddress::new(12, 1));
        assert_eq!(CellAddress::parse(" $H3 ").unwrap(), CellAddress::new(2, 7));
        assert_eq!(CellAddress::parse("A$44").unwrap().row_number(), 44);
        assert_eq!(
            CellAddress::parse("XFD1048576").unwrap(),
            CellAddress::new(1_048_575, 16_383)
        );

        for bad in ["", "B", "44", "B0", "B1048577", "XFE1", "B3x", "B-3"] {
            assert!(CellAddress::parse(bad).is_err(), "{bad} parsed");
        }
    }

    #[test]
    fn test_at() {
        assert_eq!(CellAddress::at("B", 44).unwrap().to_string(), "B44");
        assert_eq!(CellAddress::at("i", 3).unwrap().column_letters(), "I");
        assert!(matches!(
            CellAddress::at("B", 0),
            Err(Error::RowOutOfBounds(0, _))
        ));
    }

    #[test]
    fn test_item_block() {
        let block = CellRange::columns("B", 3, "C", 4).unwrap();
        let cells: Vec<String> = block.cells().map(|a| a.to_string()).collect();
        assert_eq!(cells, vec!["B3", "C3", "B4", "C4"]);
        assert_eq!(block.to_string(), "B3:C4");

        let flipped: CellRange = "H42:B3".parse().unwrap();
        assert_eq!(flipped, CellRange::columns("B", 3, "H", 42).unwrap());
        assert!(flipped.contains(&CellAddress::parse("E20").unwrap()));
        assert!(!flipped.contains(&CellAddress::parse("I20").unwrap()));
        assert!(!flipped.contains(&CellAddress::parse("E43").unwrap()));

        assert_eq!(CellRange::parse("B44").unwrap().to_string(), "B44");
        assert!(CellRange::parse("A1:B2:C3").is_err());
    }
}
