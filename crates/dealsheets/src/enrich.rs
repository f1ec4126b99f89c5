//! Turning deal product rows into calculator line items

use dealsheets_crm::{CatalogProduct, CrmApi, ProductRow};

use crate::config::Settings;
use crate::error::Result;

/// One line item, ready to be written into the template
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    /// Catalog product; `None` for manual positions
    pub product_id: Option<u64>,
    pub name: String,
    pub quantity: f64,
    pub price_with_vat: f64,
    pub supplier: String,
    pub vat_in: String,
    pub shipping_city: String,
    pub weight_g: f64,
    pub length_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub link: String,
}

/// Display name of a deal row, with a placeholder for blank names
pub fn item_name(row: &ProductRow) -> String {
    match row.product_name().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => match row.product_id() {
            Some(id) => format!("Товар ID={}", id),
            None => "Неизвестный товар".to_string(),
        },
    }
}

/// Build a line item from a deal row and its catalog product (if any)
pub fn line_item(
    settings: &Settings,
    row: &ProductRow,
    catalog: Option<&CatalogProduct>,
) -> LineItem {
    let empty = CatalogProduct::default();
    let product = catalog.unwrap_or(&empty);

    let supplier_enum = product.property_enum(settings.enrich.supplier_property);
    let supplier = settings.supplier_for(supplier_enum.as_deref());

    LineItem {
        product_id: row.product_id(),
        name: item_name(row),
        quantity: row.quantity().unwrap_or(1.0),
        price_with_vat: row.price().unwrap_or(0.0),
        supplier: supplier.name,
        vat_in: supplier.vat_in,
        shipping_city: supplier.city,
        weight_g: product.weight(),
        length_mm: product.length(),
        width_mm: product.width(),
        height_mm: product.height(),
        link: row
            .property_text(&settings.enrich.link_field)
            .unwrap_or_default(),
    }
}

/// A deal row together with its catalog product
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealItem {
    pub row: ProductRow,
    pub catalog: Option<CatalogProduct>,
}

/// Load the catalog product of every row bound to one.
///
/// A product the catalog does not return is treated as having no catalog
/// data.
pub fn load_items<A: CrmApi>(api: &A, rows: Vec<ProductRow>) -> Result<Vec<DealItem>> {
    rows.into_iter()
        .map(|row| {
            let catalog = match row.product_id() {
                Some(id) => api.catalog_product(id)?,
                None => None,
            };
            Ok(DealItem { row, catalog })
        })
        .collect()
}

/// Line items of the loaded deal rows
pub fn enrich(settings: &Settings, items: &[DealItem]) -> Vec<LineItem> {
    items
        .iter()
        .map(|item| {
            let line = line_item(settings, &item.row, item.catalog.as_ref());
            tracing::debug!(
                product_id = ?line.product_id,
                name = %line.name,
                supplier = %line.supplier,
                "line item"
            );
            line
        })
        .collect()
}
