//! Re-pricing a deal from the purchase prices stored in the catalog

use dealsheets_crm::{CatalogProduct, CrmApi, ProductRow, ProductRowUpdate};

use crate::error::Result;

const DEFAULT_DISCOUNT_TYPE: u64 = 1;
const DEFAULT_MEASURE_CODE: u64 = 796;
const DEFAULT_MEASURE_NAME: &str = "шт";
const DEFAULT_SORT: u64 = 100;

/// Price held in a catalog property; `120|RUB` reads as 120
pub fn catalog_price(product: &CatalogProduct, property: u32) -> Option<f64> {
    let raw = product.property_value(property)?;
    let amount = raw.split('|').next().unwrap_or_default().trim();
    if amount.is_empty() {
        return None;
    }
    amount.parse().ok()
}

/// The outgoing version of a deal row, with `price` replacing its own when
/// given. Unset fields get the CRM's usual defaults.
pub fn repriced_row(row: &ProductRow, price: Option<f64>) -> ProductRowUpdate {
    let tax_rate = row.tax_rate().unwrap_or(0.0);
    ProductRowUpdate {
        product_id: row.product_id(),
        product_name: row.product_name().map(str::to_string),
        price: price.or_else(|| row.price()).unwrap_or(0.0),
        quantity: row.quantity().unwrap_or(1.0),
        tax_rate: Some(format!("{:.2}", tax_rate)),
        tax_included: Some(row.tax_included().unwrap_or("Y").to_string()),
        discount_type_id: Some(row.discount_type_id().unwrap_or(DEFAULT_DISCOUNT_TYPE)),
        discount_rate: Some(row.discount_rate().unwrap_or(0.0)),
        discount_sum: Some(row.discount_sum().unwrap_or(0.0)),
        measure_code: Some(row.measure_code().unwrap_or(DEFAULT_MEASURE_CODE)),
        measure_name: Some(
            row.measure_name()
                .unwrap_or(DEFAULT_MEASURE_NAME)
                .to_string(),
        ),
        sort: Some(row.sort().unwrap_or(DEFAULT_SORT)),
    }
}

/// Set every catalog row of a deal to the price in `property`.
///
/// Rows without a catalog product or without a price keep their current
/// price. Returns the number of rows whose price came from the catalog.
pub fn reprice_deal<A: CrmApi>(api: &A, deal_id: u64, property: u32) -> Result<usize> {
    let rows = api.deal_product_rows(deal_id)?;
    if rows.is_empty() {
        tracing::warn!(deal_id, "deal has no line items, nothing to reprice");
        return Ok(0);
    }

    let mut repriced = 0;
    let mut updates = Vec::with_capacity(rows.len());
    for row in &rows {
        let price = match row.product_id() {
            Some(id) => api
                .catalog_product(id)?
                .and_then(|product| catalog_price(&product, property)),
            None => None,
        };
        match price {
            Some(p) => {
                tracing::debug!(product_id = ?row.product_id(), price = p, "catalog price");
                repriced += 1;
            }
            None => tracing::warn!(
                product_id = ?row.product_id(),
                "no price in property{}, keeping the current price",
                property
            ),
        }
        updates.push(repriced_row(row, price));
    }

    api.set_deal_product_rows(deal_id, &updates)?;
    tracing::info!(deal_id, repriced, rows = updates.len(), "deal repriced");
    Ok(repriced)
}
