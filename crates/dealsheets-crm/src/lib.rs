//! # dealsheets-crm
//!
//! A small blocking client for CRM REST webhooks (Bitrix24 style).
//!
//! Every call is `POST <webhook><method>` with a JSON body; the response is
//! an envelope whose `result` carries the payload. [`CrmApi`] is the set of
//! operations the deal pipeline needs, implemented by [`WebhookClient`] and
//! by in-memory fakes in tests.

pub mod api;
pub mod client;
pub mod error;
pub mod record;

pub use api::CrmApi;
pub use client::{deal_link, Envelope, WebhookClient, DEFAULT_TIMEOUT};
pub use error::{CrmError, CrmResult};
pub use record::{CatalogProduct, Deal, ProductRow, ProductRowUpdate, Record};
