//! Reading an edited calculation back and replacing the deal's line items

use std::fmt;
use std::path::Path;

use dealsheets_core::{CellAddress, CellValue};
use dealsheets_crm::{CrmApi, ProductRowUpdate};
use dealsheets_xlsx::TemplateWorkbook;

use crate::config::{CalculatorLayout, PriceProfile};
use crate::error::{Error, Result};

/// Names that mark the rows after the item block
const SENTINEL_NAMES: [&str; 2] = ["доставка", "итого"];

/// Which calculator column supplies the price sent to the CRM
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PriceSource {
    /// The price entered next to the item, sent without tax fields
    #[default]
    Entered,
    /// A computed price column with the tax terms of a profile
    Profile(PriceProfile),
}

impl PriceSource {
    fn column<'a>(&'a self, layout: &'a CalculatorLayout) -> &'a str {
        match self {
            PriceSource::Entered => &layout.price_column,
            PriceSource::Profile(profile) => &profile.column,
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Entered => write!(f, "entered prices"),
            PriceSource::Profile(profile) => write!(f, "profile {}", profile.name),
        }
    }
}

fn is_sentinel(name: &str) -> bool {
    let name = name.to_lowercase();
    SENTINEL_NAMES.contains(&name.as_str())
}

/// Product id of a cell: integral part of its number, 0 for anything else
fn product_id(cell: &CellValue) -> u64 {
    match cell.as_number() {
        Some(n) if n.is_finite() && n >= 1.0 => n.trunc() as u64,
        _ => 0,
    }
}

fn cell(
    workbook: &TemplateWorkbook,
    sheet: &str,
    column: &str,
    row: u32,
) -> Result<CellValue> {
    let addr = CellAddress::at(column, row)?;
    Ok(workbook.cell_value_at(sheet, addr)?)
}

/// Read the line items of a calculator sheet.
///
/// Formulas count with their cached results. The item block ends at the
/// first row with neither id nor name, or at the delivery/total rows.
pub fn read_rows(
    workbook: &TemplateWorkbook,
    layout: &CalculatorLayout,
    source: &PriceSource,
) -> Result<Vec<ProductRowUpdate>> {
    let sheet = layout.sheet.as_str();
    let price_column = source.column(layout);
    let mut rows = Vec::new();

    for row in layout.item_rows() {
        let id_cell = cell(workbook, sheet, &layout.id_column, row)?;
        let name = cell(workbook, sheet, &layout.name_column, row)?
            .to_display_string()
            .trim()
            .to_string();

        if id_cell.is_blank() && name.is_empty() {
            break;
        }
        if is_sentinel(&name) {
            if id_cell.is_blank() {
                break;
            }
            continue;
        }

        let id = if id_cell.is_blank() { 0 } else { product_id(&id_cell) };

        let quantity_cell = cell(workbook, sheet, &layout.quantity_column, row)?;
        let quantity = if quantity_cell.is_blank() {
            1.0
        } else {
            match quantity_cell.as_number() {
                Some(q) => q.trunc(),
                None => {
                    tracing::warn!(row, "quantity '{}' is not a number, row skipped", quantity_cell);
                    continue;
                }
            }
        };

        let price_cell = cell(workbook, sheet, price_column, row)?;
        let price = if price_cell.is_blank() {
            0.0
        } else {
            match price_cell.as_number() {
                Some(p) => p,
                None => {
                    tracing::warn!(row, "price '{}' is not a number, row skipped", price_cell);
                    continue;
                }
            }
        };

        let mut update = if id == 0 {
            if name.is_empty() {
                continue;
            }
            tracing::debug!(row, "manual item: {} x {} = {}", name, quantity, price);
            ProductRowUpdate::manual(name, price, quantity)
        } else {
            tracing::debug!(row, product_id = id, "catalog item: {} x {} = {}", name, quantity, price);
            ProductRowUpdate::catalog(id, price, quantity)
        };
        if let PriceSource::Profile(profile) = source {
            update = update.with_tax(profile.tax_rate.as_str(), profile.tax_included.as_str());
        }
        rows.push(update);
    }

    Ok(rows)
}

/// Open a calculation file and read its line items
pub fn read_calculation(
    path: &Path,
    layout: &CalculatorLayout,
    source: &PriceSource,
) -> Result<Vec<ProductRowUpdate>> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let workbook = TemplateWorkbook::open(path)?;
    read_rows(&workbook, layout, source)
}

/// Replace the deal's line items with the rows of its calculation.
///
/// Returns the number of rows sent; an empty calculation sends nothing.
pub fn export_calculation<A: CrmApi>(
    api: &A,
    deal_id: u64,
    path: &Path,
    layout: &CalculatorLayout,
    source: &PriceSource,
) -> Result<usize> {
    let rows = read_calculation(path, layout, source)?;
    if rows.is_empty() {
        tracing::warn!(deal_id, "no line items in {}, nothing exported", path.display());
        return Ok(0);
    }

    tracing::info!(deal_id, rows = rows.len(), "exporting with {}", source);
    api.set_deal_product_rows(deal_id, &rows)?;
    Ok(rows.len())
}
