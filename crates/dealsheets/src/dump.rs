//! The field dump ("database") workbook of a deal.
//!
//! Every field the CRM returns for the deal's line items, one row per item,
//! with catalog fields next to the deal row fields. Nested values are kept
//! as pretty-printed JSON so nothing is lost.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use dealsheets_core::CellValue;
use dealsheets_crm::{Deal, Record};
use dealsheets_xlsx::{TableSheet, TableWriter};
use serde_json::Value;

use crate::enrich::DealItem;
use crate::error::Result;
use crate::labels::{deal_field_label, field_label, DEAL_FIELDS};

pub const PRODUCTS_SHEET: &str = "Товары_Сделки";
pub const DEAL_SHEET: &str = "Сделка";
pub const FIELDS_SHEET: &str = "Поля";

const DEAL_PREFIX: &str = "DEAL_";
const CATALOG_PREFIX: &str = "CATALOG_";

/// Deal-level values shown on the `Сделка` sheet
#[derive(Debug, Clone, Default)]
pub struct DealInfo {
    pub deal: Deal,
    pub link: Option<String>,
    pub exported_at: Option<NaiveDateTime>,
}

/// Whether a field code names a product property (`PROPERTY_206`, `property206`)
fn is_property_key(key: &str) -> bool {
    let digits = key
        .strip_prefix("PROPERTY_")
        .or_else(|| key.strip_prefix("property"));
    matches!(digits, Some(d) if !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
}

/// Convert a JSON field into a cell.
///
/// Property objects are unwrapped to their `value`; any other object or
/// array becomes pretty JSON.
pub fn field_cell(key: &str, value: &Value) -> CellValue {
    let value = match value {
        Value::Object(map) if is_property_key(key) => map.get("value").unwrap_or(value),
        other => other,
    };
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Boolean(*b),
        Value::Number(n) => n.as_f64().map_or(CellValue::Empty, CellValue::Number),
        Value::String(s) => CellValue::String(s.clone()),
        nested => CellValue::String(
            serde_json::to_string_pretty(nested).unwrap_or_else(|_| nested.to_string()),
        ),
    }
}

fn prefixed(prefix: &str, record: &Record, into: &mut BTreeMap<String, CellValue>) {
    for (key, value) in record.iter() {
        into.insert(format!("{}{}", prefix, key), field_cell(key, value));
    }
}

/// The `Товары_Сделки` sheet: sorted union of every field, one row per
/// item. `None` when there is no field at all.
pub fn products_sheet(rows: &[DealItem]) -> Option<TableSheet> {
    let combined: Vec<BTreeMap<String, CellValue>> = rows
        .iter()
        .map(|item| {
            let mut fields = BTreeMap::new();
            prefixed(DEAL_PREFIX, item.row.record(), &mut fields);
            if let Some(catalog) = &item.catalog {
                prefixed(CATALOG_PREFIX, catalog.record(), &mut fields);
            }
            fields
        })
        .collect();

    let headers: BTreeSet<&String> = combined.iter().flat_map(|f| f.keys()).collect();
    if headers.is_empty() {
        return None;
    }
    let headers: Vec<String> = headers.into_iter().cloned().collect();

    let mut sheet = TableSheet::new(PRODUCTS_SHEET, headers.clone());
    for fields in &combined {
        sheet.push_row(
            headers
                .iter()
                .map(|h| fields.get(h).cloned().unwrap_or_default())
                .collect(),
        );
    }
    Some(sheet)
}

/// The `Сделка` sheet: field, label and value of the deal
pub fn deal_sheet(info: &DealInfo) -> TableSheet {
    let mut sheet = TableSheet::new(
        DEAL_SHEET,
        vec!["Поле".into(), "Описание".into(), "Значение".into()],
    );
    let record = info.deal.record();

    for (code, label) in DEAL_FIELDS {
        let value = record
            .get(code)
            .map_or(CellValue::Empty, |v| field_cell(code, v));
        sheet.push_row(vec![
            CellValue::from(format!("{}{}", DEAL_PREFIX, code)),
            CellValue::from(*label),
            value,
        ]);
    }
    if let Some(link) = &info.link {
        sheet.push_row(vec![
            CellValue::from("DEAL_LINK"),
            CellValue::from("Ссылка на сделку"),
            CellValue::from(link.as_str()),
        ]);
    }
    if let Some(at) = info.exported_at {
        sheet.push_row(vec![
            CellValue::from("EXPORTED_AT"),
            CellValue::from("Дата выгрузки"),
            CellValue::from(at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }

    // remaining deal fields, in response order
    for (code, value) in record.iter() {
        if deal_field_label(code).is_some() {
            continue;
        }
        sheet.push_row(vec![
            CellValue::from(format!("{}{}", DEAL_PREFIX, code)),
            CellValue::Empty,
            field_cell(code, value),
        ]);
    }
    sheet
}

/// The `Поля` sheet: labels of the product columns that have one
pub fn fields_sheet(products: &TableSheet) -> TableSheet {
    let mut sheet = TableSheet::new(FIELDS_SHEET, vec!["Поле".into(), "Название".into()]);
    for header in &products.headers {
        if let Some(label) = field_label(header) {
            sheet.push_row(vec![CellValue::from(header.as_str()), CellValue::from(label)]);
        }
    }
    sheet
}

/// Write the dump workbook. Returns `false` (and writes nothing) when the
/// items carry no fields.
pub fn write_dump(rows: &[DealItem], info: &DealInfo, output: &Path) -> Result<bool> {
    let products = match products_sheet(rows) {
        Some(sheet) => sheet,
        None => {
            tracing::warn!("no fields to dump, {} not written", output.display());
            return Ok(false);
        }
    };
    let columns = products.headers.len();

    let mut writer = TableWriter::new();
    let fields = fields_sheet(&products);
    writer.add_sheet(products)?;
    writer.add_sheet(deal_sheet(info))?;
    writer.add_sheet(fields)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    writer.save(output)?;
    tracing::info!(
        rows = rows.len(),
        columns,
        "field dump written to {}",
        output.display()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealsheets_crm::{CatalogProduct, ProductRow};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn deal_item(row: Value, catalog: Option<Value>) -> DealItem {
        DealItem {
            row: ProductRow::new(Record::from_value(row)),
            catalog: catalog.map(CatalogProduct::from_result),
        }
    }

    #[test]
    fn test_field_cells() {
        assert_eq!(
            field_cell("PROPERTY_206", &json!({"valueId": 1, "value": "https://x"})),
            CellValue::from("https://x")
        );
        assert_eq!(field_cell("PRICE", &json!("12.5")), CellValue::from("12.5"));
        assert_eq!(field_cell("QUANTITY", &json!(2)), CellValue::Number(2.0));
        assert_eq!(field_cell("CUSTOMIZED", &json!(null)), CellValue::Empty);
        assert_eq!(
            field_cell("OTHER", &json!({"a": 1})),
            CellValue::from("{\n  \"a\": 1\n}")
        );
    }

    #[test]
    fn test_products_sheet() {
        let rows = vec![
            deal_item(
                json!({"ID": "1", "PRODUCT_ID": 10, "PRICE": 5}),
                Some(json!({"product": {"id": 10, "property196": {"value": "51", "valueEnum": "ООО"}}})),
            ),
            deal_item(json!({"ID": "2", "PRODUCT_NAME": "Монтаж"}), None),
        ];
        let sheet = products_sheet(&rows).unwrap();

        assert_eq!(
            sheet.headers,
            vec![
                "CATALOG_id",
                "CATALOG_property196",
                "DEAL_ID",
                "DEAL_PRICE",
                "DEAL_PRODUCT_ID",
                "DEAL_PRODUCT_NAME",
            ]
        );
        assert_eq!(sheet.rows[0][1], CellValue::from("51"));
        assert_eq!(sheet.rows[1][0], CellValue::Empty);
        assert_eq!(sheet.rows[1][5], CellValue::from("Монтаж"));

        let fields = fields_sheet(&sheet);
        let labelled: Vec<String> = fields.rows.iter().map(|r| r[0].to_display_string()).collect();
        assert_eq!(labelled, vec!["DEAL_ID", "DEAL_PRICE", "DEAL_PRODUCT_ID", "DEAL_PRODUCT_NAME"]);
    }

    #[test]
    fn test_nothing_to_dump() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("db.xlsx");
        let written = write_dump(&[], &DealInfo::default(), &output).unwrap();
        assert!(!written);
        assert!(!output.exists());
    }

    #[test]
    fn test_deal_sheet() {
        let info = DealInfo {
            deal: Deal::new(Record::from_value(json!({
                "ID": "25034",
                "TITLE": "Школа 5",
                "UF_CRM_1": "x",
            }))),
            link: Some("https://portal.example.com/crm/deal/details/25034/".into()),
            exported_at: NaiveDateTime::parse_from_str("2025-10-04 12:30:00", "%Y-%m-%d %H:%M:%S").ok(),
        };
        let sheet = deal_sheet(&info);
        let codes: Vec<String> = sheet.rows.iter().map(|r| r[0].to_display_string()).collect();

        assert_eq!(codes.len(), DEAL_FIELDS.len() + 3);
        assert_eq!(sheet.rows[1][2], CellValue::from("Школа 5"));
        assert_eq!(codes[DEAL_FIELDS.len()], "DEAL_LINK");
        assert_eq!(
            sheet.rows[DEAL_FIELDS.len() + 1][2],
            CellValue::from("2025-10-04 12:30:00")
        );
        assert_eq!(codes.last().unwrap(), "DEAL_UF_CRM_1");
    }
}
