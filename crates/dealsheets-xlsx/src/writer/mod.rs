//! XLSX table writer
//!
//! Writes fresh workbooks where every sheet is a plain table: one bold,
//! grey-filled header row followed by data rows, with column widths fitted
//! to the content.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::{escape_text, needs_space_preserve};
use dealsheets_core::{format_number, validate_sheet_name, CellAddress, CellValue};

/// Widest column the writer produces, in characters
pub const MAX_COLUMN_WIDTH: usize = 50;

/// Style index of header cells in the generated `styles.xml`
const HEADER_XF: u32 = 1;

/// One sheet of a table workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSheet {
    /// Sheet name
    pub name: String,
    /// Header row
    pub headers: Vec<String>,
    /// Data rows; shorter rows leave their trailing cells empty
    pub rows: Vec<Vec<CellValue>>,
}

impl TableSheet {
    /// Create an empty table with the given headers
    pub fn new<S: Into<String>>(name: S, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a data row
    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    /// Column widths: the longest display text per column plus two, capped
    /// at [`MAX_COLUMN_WIDTH`].
    pub fn column_widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        (0..columns)
            .map(|col| {
                let header = self.headers.get(col).map_or(0, |h| display_len(h));
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|value| display_len(&value.to_display_string()))
                    .fold(header, usize::max);
                (longest + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }
}

/// Length of a value's text as measured for column widths: long values
/// count as their first 50 characters plus an ellipsis.
fn display_len(text: &str) -> usize {
    let chars = text.chars().count();
    if chars > MAX_COLUMN_WIDTH {
        MAX_COLUMN_WIDTH + 3
    } else {
        chars
    }
}

/// Builder for table workbooks
#[derive(Debug, Default)]
pub struct TableWriter {
    sheets: Vec<TableSheet>,
}

impl TableWriter {
    /// Create a writer with no sheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet, validating its name
    pub fn add_sheet(&mut self, sheet: TableSheet) -> XlsxResult<()> {
        validate_sheet_name(&sheet.name)?;
        if self
            .sheets
            .iter()
            .any(|s| s.name.to_lowercase() == sheet.name.to_lowercase())
        {
            return Err(XlsxError::InvalidFormat(format!(
                "duplicate sheet name '{}'",
                sheet.name
            )));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Write the workbook to `path`, replacing any existing file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        let path = path.as_ref();
        self.write(File::create(path)?)?;
        log::debug!("wrote {} sheet(s) to {}", self.sheets.len(), path.display());
        Ok(())
    }

    /// Write the package into any seekable sink
    pub fn write<W: Write + Seek>(&self, sink: W) -> XlsxResult<()> {
        if self.sheets.is_empty() {
            return Err(XlsxError::InvalidFormat("workbook without sheets".into()));
        }

        let mut parts = vec![
            ("[Content_Types].xml".to_string(), self.content_types()),
            ("_rels/.rels".to_string(), package_rels()),
            ("xl/workbook.xml".to_string(), self.workbook()),
            ("xl/_rels/workbook.xml.rels".to_string(), self.workbook_rels()),
            ("xl/styles.xml".to_string(), STYLES.to_string()),
        ];
        for (n, sheet) in (1..).zip(&self.sheets) {
            parts.push((format!("xl/worksheets/sheet{}.xml", n), worksheet_xml(sheet)));
        }

        let mut archive = zip::ZipWriter::new(sink);
        for (name, xml) in &parts {
            archive.start_file(name.as_str(), zip::write::SimpleFileOptions::default())?;
            archive.write_all(xml.as_bytes())?;
        }
        archive.finish()?;
        Ok(())
    }

    fn content_types(&self) -> String {
        let mut xml = format!("{}<Types xmlns=\"{}\">", XML_DECL, NS_CONTENT_TYPES);
        let _ = write!(
            xml,
            "<Default Extension=\"rels\" ContentType=\"{}\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>",
            CT_RELS
        );
        let _ = write!(
            xml,
            "<Override PartName=\"/xl/workbook.xml\" ContentType=\"{}.sheet.main+xml\"/>\
             <Override PartName=\"/xl/styles.xml\" ContentType=\"{}.styles+xml\"/>",
            CT_SPREADSHEETML, CT_SPREADSHEETML
        );
        for n in 1..=self.sheets.len() {
            let _ = write!(
                xml,
                "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"{}.worksheet+xml\"/>",
                n, CT_SPREADSHEETML
            );
        }
        xml.push_str("</Types>");
        xml
    }

    fn workbook(&self) -> String {
        let mut xml = format!(
            "{}<workbook xmlns=\"{}\" xmlns:r=\"{}\"><sheets>",
            XML_DECL, NS_MAIN, NS_OFFICE_RELS
        );
        for (n, sheet) in (1..).zip(&self.sheets) {
            let _ = write!(
                xml,
                "<sheet name=\"{}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>",
                escape_text(&sheet.name)
            );
        }
        xml.push_str("</sheets></workbook>");
        xml
    }

    /// Worksheets are rId1..rIdN, styles come last
    fn workbook_rels(&self) -> String {
        let mut xml = format!("{}<Relationships xmlns=\"{}\">", XML_DECL, NS_PACKAGE_RELS);
        for n in 1..=self.sheets.len() {
            let _ = write!(
                xml,
                "<Relationship Id=\"rId{n}\" Type=\"{}/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>",
                NS_OFFICE_RELS
            );
        }
        let _ = write!(
            xml,
            "<Relationship Id=\"rId{}\" Type=\"{}/styles\" Target=\"styles.xml\"/></Relationships>",
            self.sheets.len() + 1,
            NS_OFFICE_RELS
        );
        xml
    }
}

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_OFFICE_RELS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";
const CT_SPREADSHEETML: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml";

fn package_rels() -> String {
    format!(
        "{}<Relationships xmlns=\"{}\"><Relationship Id=\"rId1\" Type=\"{}/officeDocument\" Target=\"xl/workbook.xml\"/></Relationships>",
        XML_DECL, NS_PACKAGE_RELS, NS_OFFICE_RELS
    )
}

/// Cell format 0 is plain, 1 is the header: bold on light grey
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFD3D3D3"/></patternFill></fill></fills>
<borders count="1"><border/></borders>
<cellStyleXfs count="1"><xf/></cellStyleXfs>
<cellXfs count="2"><xf xfId="0"/><xf fontId="1" fillId="2" xfId="0" applyFont="1" applyFill="1"/></cellXfs>
</styleSheet>"#;

fn worksheet_xml(sheet: &TableSheet) -> String {
    let mut xml = format!("{}<worksheet xmlns=\"{}\">", XML_DECL, NS_MAIN);

    let widths = sheet.column_widths();
    if !widths.is_empty() {
        xml.push_str("<cols>");
        for (n, width) in (1..).zip(&widths) {
            let _ = write!(xml, "<col min=\"{n}\" max=\"{n}\" width=\"{width}\" customWidth=\"1\"/>");
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");
    if !sheet.headers.is_empty() {
        xml.push_str("<row r=\"1\">");
        for (col, header) in (0u16..).zip(&sheet.headers) {
            push_cell(&mut xml, CellAddress::new(0, col), &CellValue::from(header.as_str()), HEADER_XF);
        }
        xml.push_str("</row>");
    }
    for (row, values) in (1u32..).zip(&sheet.rows) {
        let _ = write!(xml, "<row r=\"{}\">", row + 1);
        for (col, value) in (0u16..).zip(values) {
            push_cell(&mut xml, CellAddress::new(row, col), value, 0);
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Append one `<c>`. Formulas are written as their cached value; empty
/// cells only appear when they carry the header style.
fn push_cell(xml: &mut String, addr: CellAddress, value: &CellValue, xf: u32) {
    let style = match xf {
        0 => String::new(),
        xf => format!(" s=\"{}\"", xf),
    };
    let inline = |xml: &mut String, text: &str| {
        let space = if needs_space_preserve(text) { " xml:space=\"preserve\"" } else { "" };
        let _ = write!(
            xml,
            "<c r=\"{}\"{} t=\"inlineStr\"><is><t{}>{}</t></is></c>",
            addr,
            style,
            space,
            escape_text(text)
        );
    };

    match value.resolved() {
        CellValue::Number(n) if n.is_finite() => {
            let _ = write!(xml, "<c r=\"{}\"{}><v>{}</v></c>", addr, style, format_number(*n));
        }
        // NaN and infinities have no numeric cell form
        CellValue::Number(n) => inline(xml, &n.to_string()),
        CellValue::String(s) => inline(xml, s),
        CellValue::Boolean(b) => {
            let _ = write!(xml, "<c r=\"{}\"{} t=\"b\"><v>{}</v></c>", addr, style, u8::from(*b));
        }
        CellValue::Error(e) => {
            let _ = write!(xml, "<c r=\"{}\"{} t=\"e\"><v>{}</v></c>", addr, style, escape_text(e));
        }
        CellValue::Empty | CellValue::Formula { .. } => {
            if xf != 0 {
                let _ = write!(xml, "<c r=\"{}\"{}/>", addr, style);
            }
        }
    }
}
