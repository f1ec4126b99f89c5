//! Typed views over the loosely typed JSON the CRM returns.
//!
//! The REST API mixes numbers and numeric strings freely (`"PRICE": "120.00"`
//! next to `"QUANTITY": 2`), so accessors coerce instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object with lenient accessors.
///
/// Iteration follows the order of keys in the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; anything but an object becomes an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Raw value of a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field as a string slice (string values only)
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Field as text: strings as they are, numbers and booleans printed
    pub fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(value_text)
    }

    /// Field as a float, accepting numeric strings
    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(value_f64)
    }

    /// Field as a non-negative integer, accepting numeric strings and
    /// integral floats
    pub fn u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(value_u64)
    }

    /// Set a field
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Copy every field of `other` into this record, overwriting duplicates
    pub fn merge(&mut self, other: &Record) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Iterate over fields
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying JSON map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// Value of a product property field.
///
/// Properties come as plain values, as `{"value": ...}` objects, or as
/// arrays of those for multi-valued properties (first entry wins).
fn property_inner<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => items.first().and_then(|first| property_inner(first, key)),
        _ => None,
    }
}

/// A line item of a deal (`crm.deal.productrows.get`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRow(Record);

impl ProductRow {
    /// Wrap a record
    pub fn new(record: Record) -> Self {
        Self(record)
    }

    /// The row as received
    pub fn record(&self) -> &Record {
        &self.0
    }

    /// Row id within the deal
    pub fn row_id(&self) -> Option<u64> {
        self.0.u64("ID")
    }

    /// Catalog product id; manual positions (id 0) have none
    pub fn product_id(&self) -> Option<u64> {
        self.0.u64("PRODUCT_ID").filter(|id| *id != 0)
    }

    pub fn product_name(&self) -> Option<&str> {
        self.0.str("PRODUCT_NAME")
    }

    pub fn price(&self) -> Option<f64> {
        self.0.f64("PRICE")
    }

    pub fn quantity(&self) -> Option<f64> {
        self.0.f64("QUANTITY")
    }

    pub fn tax_rate(&self) -> Option<f64> {
        self.0.f64("TAX_RATE")
    }

    pub fn tax_included(&self) -> Option<&str> {
        self.0.str("TAX_INCLUDED")
    }

    pub fn discount_type_id(&self) -> Option<u64> {
        self.0.u64("DISCOUNT_TYPE_ID")
    }

    pub fn discount_rate(&self) -> Option<f64> {
        self.0.f64("DISCOUNT_RATE")
    }

    pub fn discount_sum(&self) -> Option<f64> {
        self.0.f64("DISCOUNT_SUM")
    }

    pub fn measure_code(&self) -> Option<u64> {
        self.0.u64("MEASURE_CODE")
    }

    pub fn measure_name(&self) -> Option<&str> {
        self.0.str("MEASURE_NAME")
    }

    pub fn sort(&self) -> Option<u64> {
        self.0.u64("SORT")
    }

    /// Text of a `PROPERTY_N` field, unwrapping `{"value": ...}` objects
    pub fn property_text(&self, key: &str) -> Option<String> {
        let value = self.0.get(key)?;
        let text = match value {
            Value::Object(_) | Value::Array(_) => value_text(property_inner(value, "value")?),
            other => value_text(other),
        }?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// A catalog product (`catalog.product.get`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogProduct(Record);

impl CatalogProduct {
    /// Wrap a record that is already the product object
    pub fn new(record: Record) -> Self {
        Self(record)
    }

    /// Build from the `result` of `catalog.product.get`, which nests the
    /// product under a `product` key.
    pub fn from_result(result: Value) -> Self {
        match result {
            Value::Object(mut map) => match map.remove("product") {
                Some(Value::Object(product)) => Self(Record::from(product)),
                Some(other) => {
                    map.insert("product".into(), other);
                    Self(Record::from(map))
                }
                None => Self(Record::from(map)),
            },
            _ => Self::default(),
        }
    }

    /// The product fields
    pub fn record(&self) -> &Record {
        &self.0
    }

    pub fn id(&self) -> Option<u64> {
        self.0.u64("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.0.str("name")
    }

    /// Raw `propertyN` field
    pub fn property(&self, n: u32) -> Option<&Value> {
        self.0.get(&format!("property{}", n))
    }

    /// `propertyN.valueEnum`: display text of a list property
    pub fn property_enum(&self, n: u32) -> Option<String> {
        self.property(n)
            .and_then(|v| property_inner(v, "valueEnum"))
            .and_then(value_text)
    }

    /// `propertyN.value`
    pub fn property_value(&self, n: u32) -> Option<String> {
        self.property(n)
            .and_then(|v| property_inner(v, "value"))
            .and_then(value_text)
    }

    /// Weight in grams (0 when unknown)
    pub fn weight(&self) -> f64 {
        self.0.f64("weight").unwrap_or(0.0)
    }

    /// Length in millimetres (0 when unknown)
    pub fn length(&self) -> f64 {
        self.0.f64("length").unwrap_or(0.0)
    }

    /// Width in millimetres (0 when unknown)
    pub fn width(&self) -> f64 {
        self.0.f64("width").unwrap_or(0.0)
    }

    /// Height in millimetres (0 when unknown)
    pub fn height(&self) -> f64 {
        self.0.f64("height").unwrap_or(0.0)
    }
}

/// A deal (`crm.deal.get`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deal(Record);

impl Deal {
    pub fn new(record: Record) -> Self {
        Self(record)
    }

    pub fn record(&self) -> &Record {
        &self.0
    }

    pub fn id(&self) -> Option<u64> {
        self.0.u64("ID")
    }

    pub fn title(&self) -> Option<&str> {
        self.0.str("TITLE")
    }

    pub fn stage(&self) -> Option<&str> {
        self.0.str("STAGE_ID")
    }

    pub fn opportunity(&self) -> Option<f64> {
        self.0.f64("OPPORTUNITY")
    }

    pub fn currency(&self) -> Option<&str> {
        self.0.str("CURRENCY_ID")
    }
}

/// An outgoing line item for `crm.deal.productrows.set`.
///
/// Fields left as `None` are not sent, so the CRM applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProductRowUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub price: f64,
    pub quantity: f64,
    /// Percent as text, e.g. `"20.00"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<String>,
    /// `"Y"` or `"N"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_included: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_type_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<u64>,
}

impl ProductRowUpdate {
    /// A row bound to a catalog product
    pub fn catalog(product_id: u64, price: f64, quantity: f64) -> Self {
        Self {
            product_id: Some(product_id),
            price,
            quantity,
            ..Default::default()
        }
    }

    /// A free-text row without a catalog product
    pub fn manual<S: Into<String>>(name: S, price: f64, quantity: f64) -> Self {
        Self {
            product_name: Some(name.into()),
            price,
            quantity,
            ..Default::default()
        }
    }

    /// Attach tax rate and the tax-included flag
    pub fn with_tax<R: Into<String>, I: Into<String>>(mut self, rate: R, included: I) -> Self {
        self.tax_rate = Some(rate.into());
        self.tax_included = Some(included.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_lenient_numbers() {
        let record = Record::from_value(json!({
            "PRICE": "27900.00",
            "QUANTITY": 2,
            "PRODUCT_ID": "1036",
            "SORT": 10.0,
            "BAD": "шт",
        }));
        assert_eq!(record.f64("PRICE"), Some(27900.0));
        assert_eq!(record.f64("QUANTITY"), Some(2.0));
        assert_eq!(record.u64("PRODUCT_ID"), Some(1036));
        assert_eq!(record.u64("SORT"), Some(10));
        assert_eq!(record.u64("PRICE"), Some(27900));
        assert_eq!(record.f64("BAD"), None);
        assert_eq!(record.text("QUANTITY").as_deref(), Some("2"));
        assert!(Record::from_value(json!([1, 2])).is_empty());
    }

    #[test]
    fn test_record_keeps_response_order() {
        let record: Record = serde_json::from_str(r#"{"b":1,"a":2,"c":3}"#).unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_product_row() {
        let row = ProductRow::new(Record::from_value(json!({
            "ID": "7",
            "PRODUCT_ID": 0,
            "PRODUCT_NAME": "Доставка до склада",
            "PROPERTY_206": {"valueId": "1", "value": " https://example.com/p "},
        })));
        assert_eq!(row.row_id(), Some(7));
        assert_eq!(row.product_id(), None);
        assert_eq!(row.product_name(), Some("Доставка до склада"));
        assert_eq!(
            row.property_text("PROPERTY_206").as_deref(),
            Some("https://example.com/p")
        );
        assert_eq!(row.property_text("PROPERTY_999"), None);
    }

    #[test]
    fn test_catalog_product() {
        let product = CatalogProduct::from_result(json!({
            "product": {
                "id": 1036,
                "name": "Глобус",
                "weight": "1200",
                "width": 300,
                "property196": {"value": "51", "valueEnum": "ООО"},
                "property222": {"value": "120|RUB"},
                "property230": [{"value": "a"}, {"value": "b"}],
            }
        }));
        assert_eq!(product.id(), Some(1036));
        assert_eq!(product.property_enum(196).as_deref(), Some("ООО"));
        assert_eq!(product.property_value(222).as_deref(), Some("120|RUB"));
        assert_eq!(product.property_value(230).as_deref(), Some("a"));
        assert_eq!(product.property_enum(224), None);
        assert_eq!(product.weight(), 1200.0);
        assert_eq!(product.width(), 300.0);
        assert_eq!(product.height(), 0.0);
    }

    #[test]
    fn test_update_serialization() {
        let catalog = ProductRowUpdate::catalog(1036, 144.0, 3.0).with_tax("20.00", "Y");
        assert_eq!(
            serde_json::to_value(&catalog).unwrap(),
            json!({
                "PRODUCT_ID": 1036,
                "PRICE": 144.0,
                "QUANTITY": 3.0,
                "TAX_RATE": "20.00",
                "TAX_INCLUDED": "Y",
            })
        );

        let manual = ProductRowUpdate::manual("Монтаж", 5000.0, 1.0);
        assert_eq!(
            serde_json::to_value(&manual).unwrap(),
            json!({"PRODUCT_NAME": "Монтаж", "PRICE": 5000.0, "QUANTITY": 1.0})
        );
    }
}
