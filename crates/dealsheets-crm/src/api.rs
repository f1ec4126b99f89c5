//! The CRM operations used by the deal pipeline

use serde_json::{json, Value};

use crate::client::WebhookClient;
use crate::error::{CrmError, CrmResult};
use crate::record::{CatalogProduct, Deal, ProductRow, ProductRowUpdate, Record};

/// Operations on deals and products.
///
/// [`WebhookClient`] talks to the real REST API; tests substitute an
/// in-memory implementation.
pub trait CrmApi {
    /// `crm.deal.get`; a missing result gives an empty deal
    fn deal(&self, deal_id: u64) -> CrmResult<Deal>;

    /// `crm.deal.productrows.get`; a missing result gives no rows
    fn deal_product_rows(&self, deal_id: u64) -> CrmResult<Vec<ProductRow>>;

    /// `crm.deal.productrows.set`: replace every line item of a deal
    fn set_deal_product_rows(&self, deal_id: u64, rows: &[ProductRowUpdate]) -> CrmResult<()>;

    /// `catalog.product.get`; `None` when the catalog refuses the request
    fn catalog_product(&self, product_id: u64) -> CrmResult<Option<CatalogProduct>>;

    /// `crm.product.get`; `None` for HTTP 400 (a manual position)
    fn crm_product(&self, product_id: u64) -> CrmResult<Option<Record>>;

    /// `crm.product.list`, every page
    fn product_list(&self) -> CrmResult<Vec<Record>>;

    /// `catalog.price.list` filtered by product, every page
    fn product_prices(&self, product_id: u64) -> CrmResult<Vec<Record>>;
}

impl CrmApi for WebhookClient {
    fn deal(&self, deal_id: u64) -> CrmResult<Deal> {
        let envelope = self.call("crm.deal.get", &json!({ "id": deal_id }))?;
        Ok(Deal::new(Record::from_value(envelope.result)))
    }

    fn deal_product_rows(&self, deal_id: u64) -> CrmResult<Vec<ProductRow>> {
        let envelope = self.call("crm.deal.productrows.get", &json!({ "id": deal_id }))?;
        Ok(envelope
            .into_items()
            .into_iter()
            .filter(Value::is_object)
            .map(|v| ProductRow::new(Record::from_value(v)))
            .collect())
    }

    fn set_deal_product_rows(&self, deal_id: u64, rows: &[ProductRowUpdate]) -> CrmResult<()> {
        const METHOD: &str = "crm.deal.productrows.set";
        let rows_json = serde_json::to_value(rows).map_err(|source| CrmError::Decode {
            method: METHOD.to_string(),
            source,
        })?;
        let envelope = self.call(METHOD, &json!({ "id": deal_id, "rows": rows_json }))?;
        tracing::debug!(deal_id, rows = rows.len(), result = %envelope.result, "product rows replaced");
        Ok(())
    }

    fn catalog_product(&self, product_id: u64) -> CrmResult<Option<CatalogProduct>> {
        match self.call("catalog.product.get", &json!({ "id": product_id })) {
            Ok(envelope) if envelope.result.is_object() => {
                Ok(Some(CatalogProduct::from_result(envelope.result)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.is_rejection() => {
                tracing::warn!(product_id, "could not load catalog product: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn crm_product(&self, product_id: u64) -> CrmResult<Option<Record>> {
        match self.call("crm.product.get", &json!({ "id": product_id })) {
            Ok(envelope) => Ok(Some(Record::from_value(envelope.result))),
            Err(e) if e.status() == Some(400) => {
                tracing::info!(product_id, "product not in catalog (manual position)");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn product_list(&self) -> CrmResult<Vec<Record>> {
        let items = self.call_list("crm.product.list", &json!({}))?;
        Ok(items.into_iter().map(Record::from_value).collect())
    }

    fn product_prices(&self, product_id: u64) -> CrmResult<Vec<Record>> {
        let items = self.call_list(
            "catalog.price.list",
            &json!({ "filter": { "PRODUCT_ID": product_id } }),
        )?;
        Ok(items.into_iter().map(Record::from_value).collect())
    }
}
