//! Addressing and naming errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad cell reference {0}")]
    InvalidAddress(String),

    #[error("Bad cell range '{0}'")]
    InvalidRange(String),

    /// Row number and the sheet's row limit
    #[error("Row {0} is outside the sheet (1..={1})")]
    RowOutOfBounds(u32, u32),

    /// Column number and the sheet's column limit
    #[error("Column {0} is outside the sheet (1..={1})")]
    ColumnOutOfBounds(u32, u16),

    #[error("Sheet name {0}")]
    InvalidSheetName(String),
}

/// Sheet names are 1 to 31 characters without `[]:*?/\`
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let length = name.chars().count();
    if !(1..=crate::MAX_SHEET_NAME_LEN).contains(&length) {
        return Err(Error::InvalidSheetName(format!(
            "'{}' has {} characters",
            name, length
        )));
    }
    match name.chars().find(|c| "[]:*?/\\".contains(*c)) {
        Some(c) => Err(Error::InvalidSheetName(format!(
            "'{}' may not contain '{}'",
            name, c
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workbook_sheet_names() {
        for name in ["Калькулятор", "Доставка", "Товары_Сделки", "Products"] {
            assert!(validate_sheet_name(name).is_ok(), "{name}");
        }
        assert!(validate_sheet_name(&"Я".repeat(31)).is_ok());
        assert!(validate_sheet_name(&"Я".repeat(32)).is_err());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("Цены 1/2").is_err());
        assert!(validate_sheet_name("[Итого]").is_err());
    }
}
