//! Cell-related types
//!
//! - [`CellAddress`] - a cell's location (e.g., "B13")
//! - [`CellRange`] - a rectangular block of cells (e.g., "B3:H42")
//! - [`CellValue`] - the content of a cell

mod address;
mod value;

pub use address::{CellAddress, CellRange};
pub use value::{format_number, CellValue};
