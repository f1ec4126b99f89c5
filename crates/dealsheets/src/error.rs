//! Pipeline error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by pipeline steps
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be read or written
    #[error(transparent)]
    Xlsx(#[from] dealsheets_xlsx::XlsxError),

    /// CRM request failed
    #[error(transparent)]
    Crm(#[from] dealsheets_crm::CrmError),

    /// Invalid cell reference in the layout
    #[error(transparent)]
    Core(#[from] dealsheets_core::Error),

    /// Settings file is unreadable or inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// The template or calculation file is missing
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// More line items than item slots in the calculator
    #[error("deal has {count} line items, the calculator holds at most {capacity}")]
    TooManyItems { count: usize, capacity: usize },

    /// The deal folder already has an archive with the largest number
    #[error("no archive number left after {} in {}", .last, .folder.display())]
    ArchiveExhausted { folder: PathBuf, last: u64 },

    /// No price profile with this name
    #[error("unknown price profile '{0}'")]
    UnknownProfile(String),

    /// No repricing property for this shipper
    #[error("unknown shipper '{0}'")]
    UnknownShipper(String),
}
