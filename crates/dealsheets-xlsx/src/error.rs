//! Workbook read/write errors

use thiserror::Error;

pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Workbook archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The package is readable but not a workbook we understand
    #[error("Not a usable workbook: {0}")]
    InvalidFormat(String),

    /// A part named by a relationship is absent from the archive
    #[error("Workbook part '{0}' is missing")]
    MissingPart(String),

    #[error("No sheet named '{0}'")]
    SheetNotFound(String),

    /// A value inside a part could not be read
    #[error("Unreadable workbook value: {0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] dealsheets_core::Error),
}

impl From<quick_xml::events::attributes::AttrError> for XlsxError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(quick_xml::Error::InvalidAttr(e))
    }
}
