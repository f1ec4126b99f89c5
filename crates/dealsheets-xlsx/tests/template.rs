//! End-to-end tests for template patching (open -> edit -> save -> reopen)

use std::io::{Cursor, Read, Write};

use dealsheets_core::{CellRange, CellValue};
use dealsheets_xlsx::{TableSheet, TableWriter, TemplateWorkbook};
use pretty_assertions::assert_eq;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Калькулятор" sheetId="1" r:id="rId1"/><sheet name="Доставка" sheetId="2" r:id="rId2"/></sheets><calcPr calcId="191029"/></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2"><si><t>Наименование</t></si><si><t>Итого</t></si></sst>"#;

const CALCULATOR: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="2"><c r="C2" s="1" t="s"><v>0</v></c></row><row r="3"><c r="B3" s="2"><v>11</v></c><c r="C3" s="2" t="s"><v>0</v></c><c r="D3" s="2"><v>2</v></c><c r="E3" s="2"><v>50</v></c><c r="I3" s="3"><f>D3*E3</f><v>100</v></c></row><row r="4"><c r="I4" s="3"><f>D4*E4</f><v>0</v></c></row><row r="44"><c r="B44" t="s"><v>1</v></c><c r="I44" s="3"><f>SUM(I3:I43)</f></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

const SHIPPING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;

const CALC_CHAIN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="I3" i="1"/><c r="I4"/><c r="I44"/></calcChain>"#;

fn template_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", CALCULATOR),
            ("xl/worksheets/sheet2.xml", SHIPPING),
            ("xl/calcChain.xml", CALC_CHAIN),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn part(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    Some(content)
}

fn save(wb: &TemplateWorkbook) -> Vec<u8> {
    let mut buf = Vec::new();
    wb.write(Cursor::new(&mut buf)).unwrap();
    buf
}

#[test]
fn test_read_template_values() {
    let wb = TemplateWorkbook::from_reader(Cursor::new(template_bytes())).unwrap();

    assert_eq!(wb.sheet_names(), vec!["Калькулятор", "Доставка"]);
    assert_eq!(
        wb.cell_value("Калькулятор", "C3").unwrap(),
        CellValue::from("Наименование")
    );
    assert_eq!(wb.cell_value("Калькулятор", "B3").unwrap().as_number(), Some(11.0));
    assert_eq!(wb.cell_value("Калькулятор", "I3").unwrap().as_number(), Some(100.0));
    assert!(wb.cell_value("Калькулятор", "I44").unwrap().is_blank());
    assert!(wb.cell_value("Доставка", "A1").unwrap().is_empty());
    assert!(wb.cell_value("Нет такого", "A1").is_err());
    assert!(!wb.is_modified());
}

#[test]
fn test_untouched_save_keeps_every_part() {
    let original = template_bytes();
    let wb = TemplateWorkbook::from_reader(Cursor::new(original.clone())).unwrap();
    let saved = save(&wb);

    for name in [
        "xl/workbook.xml",
        "xl/worksheets/sheet1.xml",
        "xl/calcChain.xml",
        "[Content_Types].xml",
    ] {
        assert_eq!(part(&saved, name), part(&original, name), "{}", name);
    }
}

#[test]
fn test_edit_and_reopen() {
    let mut wb = TemplateWorkbook::from_reader(Cursor::new(template_bytes())).unwrap();

    wb.clear_range("Калькулятор", &CellRange::parse("B3:H42").unwrap())
        .unwrap();
    wb.set_cell("Калькулятор", "B3", 1036.0).unwrap();
    wb.set_cell("Калькулятор", "C3", "Набор <Юный химик>").unwrap();
    wb.set_cell("Калькулятор", "D3", 3.0).unwrap();
    wb.set_cell("Калькулятор", "E3", 27900.0).unwrap();
    wb.set_cell("Доставка", "A4", "Итого").unwrap();
    for row in 4..=42 {
        wb.set_row_hidden("Калькулятор", row, true).unwrap();
    }
    wb.set_row_hidden("Калькулятор", 44, false).unwrap();
    assert!(wb.is_modified());

    let saved = save(&wb);
    let reopened = TemplateWorkbook::from_reader(Cursor::new(saved.clone())).unwrap();

    assert_eq!(
        reopened.cell_value("Калькулятор", "C3").unwrap(),
        CellValue::from("Набор <Юный химик>")
    );
    assert_eq!(
        reopened.cell_value("Калькулятор", "E3").unwrap().as_number(),
        Some(27900.0)
    );
    assert_eq!(
        reopened.cell_value("Калькулятор", "I3").unwrap().formula_text(),
        Some("D3*E3")
    );
    assert_eq!(
        reopened.cell_value("Калькулятор", "B44").unwrap(),
        CellValue::from("Итого")
    );
    assert_eq!(
        reopened.cell_value("Доставка", "A4").unwrap(),
        CellValue::from("Итого")
    );
    assert!(reopened.is_row_hidden("Калькулятор", 4).unwrap());
    assert!(reopened.is_row_hidden("Калькулятор", 42).unwrap());
    assert!(!reopened.is_row_hidden("Калькулятор", 3).unwrap());
    assert!(!reopened.is_row_hidden("Калькулятор", 44).unwrap());

    let sheet1 = part(&saved, "xl/worksheets/sheet1.xml").unwrap();
    assert!(sheet1.contains(r#"<c r="B3" s="2"><v>1036</v></c>"#));
    assert!(sheet1.contains("<pageMargins"));

    // recalculation is forced and the stale chain is gone
    let workbook = part(&saved, "xl/workbook.xml").unwrap();
    assert!(workbook.contains(r#"fullCalcOnLoad="1""#));
    assert!(part(&saved, "xl/calcChain.xml").is_none());
    assert!(!part(&saved, "xl/_rels/workbook.xml.rels")
        .unwrap()
        .contains("calcChain"));
    assert!(!part(&saved, "[Content_Types].xml")
        .unwrap()
        .contains("calcChain"));
}

#[test]
fn test_save_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("расчет_42.xlsx");

    let mut wb = TemplateWorkbook::from_reader(Cursor::new(template_bytes())).unwrap();
    wb.set_cell("Калькулятор", "H3", "https://example.com/p/11")
        .unwrap();
    wb.save(&path).unwrap();

    let reopened = TemplateWorkbook::open(&path).unwrap();
    assert_eq!(
        reopened.cell_value("Калькулятор", "H3").unwrap().as_str(),
        Some("https://example.com/p/11")
    );
}

#[test]
fn test_table_writer_output_opens_as_template() {
    let mut sheet = TableSheet::new("Products", vec!["ID".into(), "NAME".into()]);
    sheet.push_row(vec![CellValue::Number(11.0), CellValue::from("Глобус")]);
    sheet.push_row(vec![CellValue::Number(12.0), CellValue::Boolean(true)]);

    let mut writer = TableWriter::new();
    writer.add_sheet(sheet).unwrap();
    let mut buf = Vec::new();
    writer.write(Cursor::new(&mut buf)).unwrap();

    let wb = TemplateWorkbook::from_reader(Cursor::new(buf)).unwrap();
    assert_eq!(wb.sheet_names(), vec!["Products"]);
    assert_eq!(wb.cell_value("Products", "A1").unwrap(), CellValue::from("ID"));
    assert_eq!(
        wb.cell_value("Products", "B2").unwrap(),
        CellValue::from("Глобус")
    );
    assert_eq!(
        wb.cell_value("Products", "B3").unwrap(),
        CellValue::Boolean(true)
    );
}
