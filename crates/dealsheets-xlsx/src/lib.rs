//! # dealsheets-xlsx
//!
//! XLSX (Office Open XML) support for dealsheets:
//! - [`TemplateWorkbook`] opens an existing workbook, edits individual cells
//!   and row visibility, and saves it back while leaving every formula,
//!   style and untouched part as it was.
//! - [`TableWriter`] writes fresh workbooks made of plain tables with a
//!   styled header row.

pub mod error;
pub mod package;
pub mod reader;
pub mod writer;

mod escape;

pub use error::{XlsxError, XlsxResult};
pub use package::TemplateWorkbook;
pub use writer::{TableSheet, TableWriter};
