//! # dealsheets-core
//!
//! Cell addressing and cell values shared by the workbook reader/writer and
//! the deal pipeline.
//!
//! ```rust
//! use dealsheets_core::{CellAddress, CellValue};
//!
//! let quantity = CellAddress::at("D", 3).unwrap();
//! assert_eq!(quantity.to_string(), "D3");
//! assert_eq!(CellValue::from("2,5").as_number(), Some(2.5));
//! ```

pub mod cell;
pub mod error;

pub use cell::{format_number, CellAddress, CellRange, CellValue};
pub use error::{validate_sheet_name, Error, Result};

/// Rows per worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Columns per worksheet (A..XFD)
pub const MAX_COLS: u16 = 16_384;

pub const MAX_SHEET_NAME_LEN: usize = 31;
