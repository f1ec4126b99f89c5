//! Readers for the package-level parts of an XLSX file.
//!
//! These work on part bytes already pulled out of the zip archive, so the
//! same code serves [`crate::TemplateWorkbook`] and the tests.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::decode_excel_escapes;
use dealsheets_core::CellValue;

/// A `<sheet>` entry of `xl/workbook.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    /// Visible sheet name
    pub name: String,
    /// Relationship id pointing at the worksheet part
    pub r_id: String,
}

/// A `<Relationship>` entry of a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship id (`rId1`)
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target as written in the file
    pub target: String,
}

impl Relationship {
    /// Resolve the target against the folder of the part that owns the
    /// relationship ("xl/" for the workbook).
    pub fn resolve(&self, base_dir: &str) -> String {
        if let Some(absolute) = self.target.strip_prefix('/') {
            return absolute.to_string();
        }
        let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
        for segment in self.target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        parts.join("/")
    }

    /// Whether the relationship type ends with the given kind
    /// (`worksheet`, `calcChain`, ...).
    pub fn is_kind(&self, kind: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .map_or(false, |last| last == kind)
    }
}

/// Read the value of an attribute by its local name.
pub(crate) fn attr_value(e: &BytesStart<'_>, local: &[u8]) -> XlsxResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Read the shared strings table.
///
/// Rich-text runs are concatenated; phonetic runs (`<rPh>`) are skipped.
pub fn read_shared_strings(xml: &[u8]) -> XlsxResult<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(decode_excel_escapes(&current));
                    in_si = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(e) if in_t => current.push_str(&e.unescape()?),
            Event::CData(e) if in_t => current.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Read `xl/workbook.xml` to get sheet names and relationship ids, in tab order.
pub fn read_workbook_sheets(xml: &[u8]) -> XlsxResult<Vec<SheetEntry>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name")?;
                let r_id = attr_value(&e, b"id")?;
                match (name, r_id) {
                    (Some(name), Some(r_id)) => sheets.push(SheetEntry { name, r_id }),
                    _ => {
                        return Err(XlsxError::InvalidFormat(
                            "<sheet> without name or r:id".into(),
                        ))
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Read every `<Relationship>` of a `.rels` part.
pub fn read_relationships(xml: &[u8]) -> XlsxResult<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, b"Id")?;
                let rel_type = attr_value(&e, b"Type")?;
                let target = attr_value(&e, b"Target")?;
                if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Raw pieces of a `<c>` element, as found while scanning a worksheet.
#[derive(Debug, Default, Clone)]
pub(crate) struct RawCell {
    pub cell_type: Option<String>,
    pub value: Option<String>,
    pub formula: Option<String>,
    pub inline: Option<String>,
}

/// Turn the raw pieces of a cell into a [`CellValue`].
pub(crate) fn decode_cell(raw: &RawCell, shared_strings: &[String]) -> XlsxResult<CellValue> {
    let typed = |v: &str| -> XlsxResult<CellValue> {
        Ok(match raw.cell_type.as_deref() {
            Some("s") => {
                let idx: usize = v.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", v))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                CellValue::String(s.clone())
            }
            Some("b") => CellValue::Boolean(v == "1" || v.eq_ignore_ascii_case("true")),
            Some("e") => CellValue::Error(v.to_string()),
            Some("str") | Some("inlineStr") => CellValue::String(decode_excel_escapes(v)),
            None | Some("n") | Some("d") => match v.trim().parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::String(v.to_string()),
            },
            Some(_) => CellValue::String(v.to_string()),
        })
    };

    if let Some(f) = &raw.formula {
        let cached = match (&raw.value, raw.cell_type.as_deref()) {
            (Some(v), _) => Some(typed(v)?),
            (None, Some("inlineStr")) => raw
                .inline
                .as_deref()
                .map(|s| CellValue::String(decode_excel_escapes(s))),
            (None, _) => None,
        };
        return Ok(CellValue::Formula {
            text: f.strip_prefix('=').unwrap_or(f).to_string(),
            cached_value: cached.map(Box::new),
        });
    }

    if raw.cell_type.as_deref() == Some("inlineStr") {
        if let Some(s) = &raw.inline {
            return Ok(CellValue::String(decode_excel_escapes(s)));
        }
    }

    match &raw.value {
        Some(v) => typed(v),
        None => Ok(CellValue::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shared_strings_with_runs() {
        let xml = r#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>Калькулятор</t></si>
  <si><r><t>Цена </t></r><r><rPr><b/></rPr><t>закупа</t></r><rPh><t>skip</t></rPh></si>
  <si><t xml:space="preserve"> a_x000D_b </t></si>
  <si/>
</sst>"#;
        let strings = read_shared_strings(xml.as_bytes()).unwrap();
        assert_eq!(strings, vec!["Калькулятор", "Цена закупа", " a\rb ", ""]);
    }

    #[test]
    fn test_workbook_sheets_and_rels() {
        let wb = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Калькулятор" sheetId="1" r:id="rId1"/><sheet name="Доставка" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
        let sheets = read_workbook_sheets(wb.as_bytes()).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[1].name, "Доставка");
        assert_eq!(sheets[1].r_id, "rId2");

        let rels = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/>
</Relationships>"#;
        let rels = read_relationships(rels).unwrap();
        assert_eq!(rels[0].resolve("xl/"), "xl/worksheets/sheet1.xml");
        assert_eq!(rels[1].resolve("xl/"), "xl/worksheets/sheet2.xml");
        assert!(rels[2].is_kind("calcChain"));
        assert!(!rels[2].is_kind("worksheet"));
    }

    #[test]
    fn test_relative_targets() {
        let rel = Relationship {
            id: "rId1".into(),
            rel_type: "x/comments".into(),
            target: "../comments1.xml".into(),
        };
        assert_eq!(rel.resolve("xl/worksheets/"), "xl/comments1.xml");
    }

    #[test]
    fn test_decode_cells() {
        let shared = vec!["Итого".to_string()];
        let raw = |t: Option<&str>, v: Option<&str>, f: Option<&str>| RawCell {
            cell_type: t.map(str::to_string),
            value: v.map(str::to_string),
            formula: f.map(str::to_string),
            inline: None,
        };

        assert_eq!(
            decode_cell(&raw(Some("s"), Some("0"), None), &shared).unwrap(),
            CellValue::from("Итого")
        );
        assert_eq!(
            decode_cell(&raw(None, Some("27900"), None), &shared).unwrap(),
            CellValue::Number(27900.0)
        );
        assert_eq!(
            decode_cell(&raw(Some("b"), Some("1"), None), &shared).unwrap(),
            CellValue::Boolean(true)
        );
        assert!(decode_cell(&raw(Some("s"), Some("7"), None), &shared).is_err());

        let f = decode_cell(&raw(None, Some("144"), Some("E3*1.2")), &shared).unwrap();
        assert_eq!(f.formula_text(), Some("E3*1.2"));
        assert_eq!(f.as_number(), Some(144.0));

        let uncached = decode_cell(&raw(None, None, Some("SUM(E3:E42)")), &shared).unwrap();
        assert!(uncached.is_blank());
        assert_eq!(
            decode_cell(&raw(None, None, None), &shared).unwrap(),
            CellValue::Empty
        );
    }
}
