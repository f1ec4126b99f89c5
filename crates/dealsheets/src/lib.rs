//! # dealsheets
//!
//! Keeps a deal's line items in the CRM and its calculation spreadsheet in
//! step:
//!
//! 1. **import**: load the deal's product rows, enrich them from the catalog
//!    and fill a copy of the calculation template
//! 2. the manager edits prices and quantities in the spreadsheet
//! 3. **export**: read the calculation back and replace the deal's rows
//!
//! Around that sit a field dump of everything the CRM knows about the
//! items, repricing from catalog purchase prices, and a full catalog export.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dealsheets::{Pipeline, Settings};
//! use dealsheets_crm::WebhookClient;
//!
//! let settings = Settings::load(None)?;
//! let client = WebhookClient::new(settings.require_webhook()?)?;
//! let pipeline = Pipeline::new(client, settings);
//!
//! if let Some(report) = pipeline.import(25034)? {
//!     println!("{}", report.calculation.display());
//! }
//! ```

pub mod archive;
pub mod catalog;
pub mod config;
pub mod dump;
pub mod enrich;
pub mod error;
pub mod export;
pub mod labels;
pub mod pipeline;
pub mod reprice;
pub mod template;

pub use config::{PriceProfile, Settings};
pub use error::{Error, Result};
pub use export::PriceSource;
pub use pipeline::{ExportReport, ImportReport, Pipeline};
