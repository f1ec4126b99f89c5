//! Full export of the product catalog into one table

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use dealsheets_core::CellValue;
use dealsheets_crm::{CrmApi, Record};
use dealsheets_xlsx::{TableSheet, TableWriter};
use serde_json::Value;

use crate::error::Result;

/// Default output file of the catalog dump
pub const CATALOG_FILE: &str = "products_full.xlsx";
pub const CATALOG_SHEET: &str = "Products";

/// Column holding the product's price list as JSON
pub const PRICES_COLUMN: &str = "PRICES";

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Boolean(*b),
        Value::Number(n) => n.as_f64().map_or(CellValue::Empty, CellValue::Number),
        Value::String(s) => CellValue::String(s.clone()),
        nested => CellValue::String(nested.to_string()),
    }
}

/// Everything known about one product: its list entry, `crm.product.get`,
/// the catalog product and its prices. Later sources win on equal keys.
pub fn product_record<A: CrmApi>(api: &A, listed: &Record) -> Result<Record> {
    let mut record = listed.clone();
    let id = match listed.u64("ID") {
        Some(id) => id,
        None => {
            tracing::warn!("product without ID in the product list");
            return Ok(record);
        }
    };

    if let Some(details) = api.crm_product(id)? {
        record.merge(&details);
    }
    if let Some(catalog) = api.catalog_product(id)? {
        record.merge(catalog.record());
    }
    let prices = match api.product_prices(id) {
        Ok(prices) => prices,
        Err(e) if e.is_rejection() => {
            tracing::warn!(product_id = id, "could not load prices: {e}");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    let prices: Vec<Value> = prices
        .into_iter()
        .map(|p| Value::Object(p.as_map().clone()))
        .collect();
    record.insert(PRICES_COLUMN, Value::Array(prices));
    Ok(record)
}

/// Table of records over the sorted union of their keys
pub fn catalog_sheet(records: &[Record]) -> TableSheet {
    let headers: BTreeSet<&String> = records
        .iter()
        .flat_map(|r| r.iter().map(|(k, _)| k))
        .collect();
    let headers: Vec<String> = headers.into_iter().cloned().collect();

    let mut sheet = TableSheet::new(CATALOG_SHEET, headers.clone());
    for record in records {
        sheet.push_row(
            headers
                .iter()
                .map(|h| record.get(h).map_or(CellValue::Empty, json_cell))
                .collect(),
        );
    }
    sheet
}

/// Export every CRM product into `output`. Returns the number of products.
pub fn dump_catalog<A: CrmApi>(api: &A, output: &Path) -> Result<usize> {
    let products = api.product_list()?;
    tracing::info!(products = products.len(), "product list loaded");

    let mut records = Vec::with_capacity(products.len());
    for (index, listed) in products.iter().enumerate() {
        tracing::debug!("product {}/{}", index + 1, products.len());
        records.push(product_record(api, listed)?);
    }

    let mut writer = TableWriter::new();
    writer.add_sheet(catalog_sheet(&records))?;
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    writer.save(output)?;
    tracing::info!("catalog written to {}", output.display());
    Ok(records.len())
}
