//! Filling the calculation template with line items

use std::fs;
use std::path::Path;

use dealsheets_core::{CellAddress, CellRange, CellValue};
use dealsheets_xlsx::TemplateWorkbook;

use crate::config::{CalculatorLayout, ShippingLayout, TemplateLayout};
use crate::enrich::LineItem;
use crate::error::{Error, Result};

/// Number of line items a layout can hold
pub fn capacity(layout: &TemplateLayout) -> usize {
    let shipping = layout.shipping.last_row.saturating_sub(layout.shipping.first_row) as usize + 1;
    layout.calculator.capacity().min(shipping)
}

/// Copy the template to `output`, filled with `items`.
///
/// The template file itself is never written. Nothing is written when the
/// items do not fit.
pub fn fill_template(
    layout: &TemplateLayout,
    items: &[LineItem],
    template: &Path,
    output: &Path,
) -> Result<()> {
    let capacity = capacity(layout);
    if items.len() > capacity {
        return Err(Error::TooManyItems {
            count: items.len(),
            capacity,
        });
    }
    if !template.is_file() {
        return Err(Error::FileNotFound(template.to_path_buf()));
    }

    let mut workbook = TemplateWorkbook::open(template)?;
    fill_calculator(&mut workbook, &layout.calculator, items)?;
    fill_shipping(&mut workbook, &layout.shipping, items)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    workbook.save(output)?;
    tracing::info!(items = items.len(), "calculation written to {}", output.display());
    Ok(())
}

fn put(
    workbook: &mut TemplateWorkbook,
    sheet: &str,
    column: &str,
    row: u32,
    value: impl Into<CellValue>,
) -> Result<()> {
    let addr = CellAddress::at(column, row)?;
    workbook.set_cell_at(sheet, addr, value)?;
    Ok(())
}

/// Write the calculator's input columns and hide unused item rows
pub fn fill_calculator(
    workbook: &mut TemplateWorkbook,
    layout: &CalculatorLayout,
    items: &[LineItem],
) -> Result<()> {
    let sheet = layout.sheet.as_str();
    let range = CellRange::columns(
        &layout.clear_from,
        layout.first_row,
        &layout.clear_to,
        layout.last_row,
    )?;
    workbook.clear_range(sheet, &range)?;

    for (row, item) in layout.item_rows().zip(items) {
        if let Some(id) = item.product_id {
            put(workbook, sheet, &layout.id_column, row, id)?;
        }
        put(workbook, sheet, &layout.name_column, row, item.name.as_str())?;
        put(workbook, sheet, &layout.quantity_column, row, item.quantity)?;
        put(workbook, sheet, &layout.price_column, row, item.price_with_vat)?;
        put(workbook, sheet, &layout.supplier_column, row, item.supplier.as_str())?;
        put(workbook, sheet, &layout.vat_column, row, item.vat_in.as_str())?;
        if !item.link.is_empty() {
            put(workbook, sheet, &layout.link_column, row, item.link.as_str())?;
        }
    }

    put(
        workbook,
        sheet,
        &layout.total_label_column,
        layout.total_row,
        layout.total_label.as_str(),
    )?;

    for (index, row) in layout.item_rows().enumerate() {
        workbook.set_row_hidden(sheet, row, index >= items.len())?;
    }
    workbook.set_row_hidden(sheet, layout.delivery_row, false)?;
    workbook.set_row_hidden(sheet, layout.total_row, false)?;
    Ok(())
}

/// Write the shipping sheet: origin, weight and size of every item
pub fn fill_shipping(
    workbook: &mut TemplateWorkbook,
    layout: &ShippingLayout,
    items: &[LineItem],
) -> Result<()> {
    let sheet = layout.sheet.as_str();
    let range = CellRange::columns(
        &layout.clear_from,
        layout.first_row,
        &layout.clear_to,
        layout.last_row,
    )?;
    workbook.clear_range(sheet, &range)?;

    let rows = layout.first_row..=layout.last_row;
    for (row, item) in rows.zip(items) {
        put(workbook, sheet, &layout.name_column, row, item.name.as_str())?;
        put(workbook, sheet, &layout.quantity_column, row, item.quantity)?;
        put(workbook, sheet, &layout.supplier_column, row, item.supplier.as_str())?;
        put(workbook, sheet, &layout.city_column, row, item.shipping_city.as_str())?;
        put(workbook, sheet, &layout.weight_column, row, item.weight_g)?;
        put(workbook, sheet, &layout.length_column, row, item.length_mm)?;
        put(workbook, sheet, &layout.width_column, row, item.width_mm)?;
        put(workbook, sheet, &layout.height_column, row, item.height_mm)?;
    }

    let total_row = layout.first_row + items.len() as u32;
    if total_row <= layout.last_row {
        put(
            workbook,
            sheet,
            &layout.total_label_column,
            total_row,
            layout.total_label.as_str(),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use dealsheets_xlsx::{TableSheet, TableWriter};
    use pretty_assertions::assert_eq;

    fn template(dir: &Path) -> std::path::PathBuf {
        let mut writer = TableWriter::new();
        let mut calc = TableSheet::new("Калькулятор", vec!["№".into(), "ID".into()]);
        for _ in 0..45 {
            calc.push_row(vec![CellValue::from("x"), CellValue::from(999.0)]);
        }
        writer.add_sheet(calc).unwrap();
        writer
            .add_sheet(TableSheet::new("Доставка", vec!["№".into()]))
            .unwrap();
        let path = dir.join("template.xlsx");
        writer.save(&path).unwrap();
        path
    }

    fn item(name: &str) -> LineItem {
        LineItem {
            product_id: Some(7),
            name: name.into(),
            quantity: 3.0,
            price_with_vat: 120.5,
            supplier: "ООО".into(),
            vat_in: "НДС 20%".into(),
            shipping_city: "Москва".into(),
            weight_g: 10.0,
            length_mm: 20.0,
            width_mm: 30.0,
            height_mm: 40.0,
            link: String::new(),
        }
    }

    #[test]
    fn test_fill() {
        let dir = tempfile::tempdir().unwrap();
        let template = template(dir.path());
        let output = dir.path().join("out").join("calc.xlsx");
        let layout = Settings::default().layout;

        fill_template(&layout, &[item("Глобус"), item("Карта")], &template, &output).unwrap();

        let wb = TemplateWorkbook::open(&output).unwrap();
        let calc = "Калькулятор";
        assert_eq!(wb.cell_value(calc, "B3").unwrap(), CellValue::Number(7.0));
        assert_eq!(wb.cell_value(calc, "C4").unwrap(), CellValue::from("Карта"));
        assert_eq!(wb.cell_value(calc, "E3").unwrap(), CellValue::Number(120.5));
        assert_eq!(wb.cell_value(calc, "B5").unwrap(), CellValue::Empty);
        assert_eq!(wb.cell_value(calc, "A5").unwrap(), CellValue::from("x"));
        assert_eq!(wb.cell_value(calc, "B44").unwrap(), CellValue::from("Итого"));
        assert!(!wb.is_row_hidden(calc, 4).unwrap());
        assert!(wb.is_row_hidden(calc, 5).unwrap());
        assert!(wb.is_row_hidden(calc, 42).unwrap());
        assert!(!wb.is_row_hidden(calc, 43).unwrap());
        assert!(!wb.is_row_hidden(calc, 44).unwrap());

        let ship = "Доставка";
        assert_eq!(wb.cell_value(ship, "B3").unwrap(), CellValue::from("Глобус"));
        assert_eq!(wb.cell_value(ship, "I4").unwrap(), CellValue::Number(40.0));
        assert_eq!(wb.cell_value(ship, "A5").unwrap(), CellValue::from("Итого"));

        // the template is left alone
        let original = TemplateWorkbook::open(&template).unwrap();
        assert_eq!(original.cell_value(calc, "B3").unwrap(), CellValue::Number(999.0));
    }

    #[test]
    fn test_shipping_total_only_fits_below_a_free_slot() {
        let dir = tempfile::tempdir().unwrap();
        let template = template(dir.path());
        let layout = Settings::default().layout.shipping;
        let ship = "Доставка";

        let mut wb = TemplateWorkbook::open(&template).unwrap();
        fill_shipping(&mut wb, &layout, &vec![item("x"); 39]).unwrap();
        assert_eq!(wb.cell_value(ship, "A42").unwrap(), CellValue::from("Итого"));

        for count in [40, 41] {
            let mut wb = TemplateWorkbook::open(&template).unwrap();
            fill_shipping(&mut wb, &layout, &vec![item("x"); count]).unwrap();
            assert_eq!(wb.cell_value(ship, "B42").unwrap(), CellValue::from("x"), "{count}");
            for cell in ["A42", "A43", "A44", "B43"] {
                assert_eq!(wb.cell_value(ship, cell).unwrap(), CellValue::Empty, "{count} {cell}");
            }
        }
    }

    #[test]
    fn test_too_many_items() {
        let dir = tempfile::tempdir().unwrap();
        let template = template(dir.path());
        let output = dir.path().join("calc.xlsx");
        let items = vec![item("x"); 41];

        let err = fill_template(&Settings::default().layout, &items, &template, &output)
            .unwrap_err();
        assert!(matches!(err, Error::TooManyItems { count: 41, capacity: 40 }));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = fill_template(
            &Settings::default().layout,
            &[],
            &dir.path().join("none.xlsx"),
            &dir.path().join("calc.xlsx"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
