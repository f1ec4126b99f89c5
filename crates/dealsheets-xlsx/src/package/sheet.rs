//! Editable model of a worksheet part.
//!
//! Only `<sheetData>` is parsed. The markup before and after it (column
//! widths, merged cells, conditional formatting, page setup...) is kept as
//! the original text. Each cell keeps its attributes and its inner XML, so a
//! cell that is never edited is written back exactly as it was read.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::{escape_text, needs_space_preserve};
use crate::reader::{decode_cell, RawCell};
use dealsheets_core::{format_number, CellAddress, CellValue};

/// One `<row>` element.
#[derive(Debug, Clone)]
struct RowXml {
    /// Attributes in document order, values kept in their escaped form.
    attrs: Vec<(String, String)>,
    cells: BTreeMap<u16, CellXml>,
}

impl RowXml {
    fn new(row: u32) -> Self {
        Self {
            attrs: vec![("r".to_string(), (row + 1).to_string())],
            cells: BTreeMap::new(),
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        find_attr(&self.attrs, key)
    }
}

/// One `<c>` element.
#[derive(Debug, Clone)]
struct CellXml {
    attrs: Vec<(String, String)>,
    /// Inner XML (`<f>`, `<v>`, `<is>`) as found in the file.
    body: String,
    value: CellValue,
}

fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn collect_attrs(e: &BytesStart<'_>) -> XlsxResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok(attrs)
}

/// Locate the start tag of `local` (with or without namespace prefix).
///
/// Returns the byte offsets of `<` and of the closing `>`, and the
/// qualified name as written.
fn find_start_tag<'a>(xml: &'a str, local: &str) -> Option<(usize, usize, &'a str)> {
    let mut from = 0;
    while let Some(offset) = xml[from..].find('<') {
        let start = from + offset;
        let name_end = xml[start + 1..]
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .map(|i| start + 1 + i)?;
        let qname = &xml[start + 1..name_end];
        let matches = qname == local
            || qname
                .split_once(':')
                .map_or(false, |(_, name)| name == local);
        if matches {
            let end = name_end + xml[name_end..].find('>')?;
            return Some((start, end, qname));
        }
        from = name_end;
    }
    None
}

/// A worksheet loaded for editing.
#[derive(Debug, Clone)]
pub(crate) struct SheetPart {
    head: String,
    tail: String,
    /// Namespace prefix used by the worksheet (`""` or `"x:"`).
    prefix: String,
    rows: BTreeMap<u32, RowXml>,
    modified: bool,
}

impl SheetPart {
    /// Parse a worksheet part, resolving shared strings for cell values.
    pub(crate) fn parse(xml: &str, shared_strings: &[String]) -> XlsxResult<Self> {
        let (start, end, qname) = find_start_tag(xml, "sheetData")
            .ok_or_else(|| XlsxError::InvalidFormat("worksheet without <sheetData>".into()))?;
        let prefix = qname
            .split_once(':')
            .map(|(p, _)| format!("{}:", p))
            .unwrap_or_default();

        if xml[..end].ends_with('/') {
            return Ok(Self {
                head: format!("{}<{}>", &xml[..start], qname),
                tail: format!("</{}>{}", qname, &xml[end + 1..]),
                prefix,
                rows: BTreeMap::new(),
                modified: false,
            });
        }

        let close_tag = format!("</{}>", qname);
        let close = xml[end..]
            .find(&close_tag)
            .map(|i| end + i)
            .ok_or_else(|| XlsxError::InvalidFormat("unterminated <sheetData>".into()))?;

        let rows = parse_rows(&xml[end + 1..close], shared_strings)?;
        log::debug!("parsed worksheet with {} rows", rows.len());

        Ok(Self {
            head: xml[..=end].to_string(),
            tail: xml[close..].to_string(),
            prefix,
            rows,
            modified: false,
        })
    }

    /// Whether any cell or row of this sheet was changed.
    pub(crate) fn is_modified(&self) -> bool {
        self.modified
    }

    /// Value of a cell; cells missing from the file read as `Empty`.
    pub(crate) fn cell(&self, addr: CellAddress) -> CellValue {
        self.rows
            .get(&addr.row)
            .and_then(|row| row.cells.get(&addr.col))
            .map(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    /// Replace a cell's content, keeping its style.
    ///
    /// Writing `Empty` to a cell that does not exist is a no-op.
    pub(crate) fn set_cell(&mut self, addr: CellAddress, value: &CellValue) {
        if value.is_empty() && !self.has_cell(addr) {
            return;
        }

        let (cell_type, body) = cell_body(&self.prefix, value);
        let reference = addr.to_a1_string();

        let row = self
            .rows
            .entry(addr.row)
            .or_insert_with(|| RowXml::new(addr.row));
        // spans is only a load hint and may no longer cover the row
        row.attrs.retain(|(k, _)| k != "spans");

        let cell = row.cells.entry(addr.col).or_insert_with(|| CellXml {
            attrs: Vec::new(),
            body: String::new(),
            value: CellValue::Empty,
        });

        let style = find_attr(&cell.attrs, "s").map(str::to_string);
        let mut attrs = vec![("r".to_string(), reference)];
        if let Some(style) = style {
            attrs.push(("s".to_string(), style));
        }
        if let Some(t) = cell_type {
            attrs.push(("t".to_string(), t.to_string()));
        }
        cell.attrs = attrs;
        cell.body = body;
        cell.value = value.clone();
        self.modified = true;
    }

    fn has_cell(&self, addr: CellAddress) -> bool {
        self.rows
            .get(&addr.row)
            .map_or(false, |row| row.cells.contains_key(&addr.col))
    }

    /// Show or hide a row (0-based index).
    pub(crate) fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        if !hidden && !self.rows.contains_key(&row) {
            return;
        }
        let entry = self.rows.entry(row).or_insert_with(|| RowXml::new(row));
        entry.attrs.retain(|(k, _)| k != "hidden");
        if hidden {
            entry.attrs.push(("hidden".to_string(), "1".to_string()));
        }
        self.modified = true;
    }

    pub(crate) fn is_row_hidden(&self, row: u32) -> bool {
        self.rows
            .get(&row)
            .and_then(|r| r.attr("hidden"))
            .map_or(false, |v| v == "1" || v == "true")
    }

    /// Serialize the sheet back to XML.
    pub(crate) fn to_xml(&self) -> String {
        let p = &self.prefix;
        let mut out = String::with_capacity(self.head.len() + self.tail.len() + self.rows.len() * 256);
        out.push_str(&self.head);

        for row in self.rows.values() {
            out.push('<');
            out.push_str(p);
            out.push_str("row");
            push_attrs(&mut out, &row.attrs);
            if row.cells.is_empty() {
                out.push_str("/>");
                continue;
            }
            out.push('>');
            for cell in row.cells.values() {
                out.push('<');
                out.push_str(p);
                out.push('c');
                push_attrs(&mut out, &cell.attrs);
                if cell.body.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    out.push_str(&cell.body);
                    out.push_str(&format!("</{}c>", p));
                }
            }
            out.push_str(&format!("</{}row>", p));
        }

        out.push_str(&self.tail);
        out
    }
}

fn push_attrs(out: &mut String, attrs: &[(String, String)]) {
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
    }
}

/// Cell type attribute and inner XML for a value.
fn cell_body(p: &str, value: &CellValue) -> (Option<&'static str>, String) {
    match value {
        CellValue::Empty => (None, String::new()),
        CellValue::Number(n) if n.is_finite() => (None, format!("<{p}v>{}</{p}v>", format_number(*n))),
        CellValue::Number(_) => (Some("e"), format!("<{p}v>#NUM!</{p}v>")),
        CellValue::Boolean(b) => (Some("b"), format!("<{p}v>{}</{p}v>", u8::from(*b))),
        CellValue::Error(e) => (Some("e"), format!("<{p}v>{}</{p}v>", escape_text(e))),
        CellValue::String(s) => {
            let space = if needs_space_preserve(s) {
                r#" xml:space="preserve""#
            } else {
                ""
            };
            (
                Some("inlineStr"),
                format!("<{p}is><{p}t{space}>{}</{p}t></{p}is>", escape_text(s)),
            )
        }
        CellValue::Formula { text, cached_value } => {
            let mut body = format!("<{p}f>{}</{p}f>", escape_text(text));
            let cell_type = match cached_value.as_deref() {
                Some(CellValue::Number(n)) if n.is_finite() => {
                    body.push_str(&format!("<{p}v>{}</{p}v>", format_number(*n)));
                    None
                }
                Some(CellValue::String(s)) => {
                    body.push_str(&format!("<{p}v>{}</{p}v>", escape_text(s)));
                    Some("str")
                }
                Some(CellValue::Boolean(b)) => {
                    body.push_str(&format!("<{p}v>{}</{p}v>", u8::from(*b)));
                    Some("b")
                }
                Some(CellValue::Error(e)) => {
                    body.push_str(&format!("<{p}v>{}</{p}v>", escape_text(e)));
                    Some("e")
                }
                _ => None,
            };
            (cell_type, body)
        }
    }
}

fn parse_rows(inner: &str, shared_strings: &[String]) -> XlsxResult<BTreeMap<u32, RowXml>> {
    let mut reader = Reader::from_str(inner);
    reader.trim_text(false);

    let mut rows = BTreeMap::new();
    let mut current: Option<(u32, RowXml)> = None;
    let mut next_row = 0u32;
    let mut next_col = 0u16;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let (index, row) = start_row(&e, next_row)?;
                current = Some((index, row));
                next_col = 0;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let (index, row) = start_row(&e, next_row)?;
                rows.insert(index, row);
                next_row = index + 1;
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                if let Some((index, row)) = current.take() {
                    rows.insert(index, row);
                    next_row = index + 1;
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let attrs = collect_attrs(&e)?;
                let (body, mut raw) = read_cell_body(&mut reader)?;
                raw.cell_type = find_attr(&attrs, "t").map(str::to_string);
                if let Some((index, row)) = current.as_mut() {
                    let col = cell_column(&attrs, next_col)?;
                    let value = decode_cell(&raw, shared_strings).map_err(|e| {
                        XlsxError::Parse(format!(
                            "cell {}: {}",
                            CellAddress::new(*index, col),
                            e
                        ))
                    })?;
                    row.cells.insert(col, CellXml { attrs, body, value });
                    next_col = col.saturating_add(1);
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let attrs = collect_attrs(&e)?;
                if let Some((_, row)) = current.as_mut() {
                    let col = cell_column(&attrs, next_col)?;
                    row.cells.insert(
                        col,
                        CellXml {
                            attrs,
                            body: String::new(),
                            value: CellValue::Empty,
                        },
                    );
                    next_col = col.saturating_add(1);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows)
}

fn start_row(e: &BytesStart<'_>, next_row: u32) -> XlsxResult<(u32, RowXml)> {
    let attrs = collect_attrs(e)?;
    let index = match find_attr(&attrs, "r") {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n - 1)
            .ok_or_else(|| XlsxError::Parse(format!("invalid row number '{}'", r)))?,
        None => next_row,
    };
    Ok((
        index,
        RowXml {
            attrs,
            cells: BTreeMap::new(),
        },
    ))
}

fn cell_column(attrs: &[(String, String)], next_col: u16) -> XlsxResult<u16> {
    match find_attr(attrs, "r") {
        Some(r) => Ok(CellAddress::parse(r)?.col),
        None => Ok(next_col),
    }
}

/// Read the children of a `<c>` up to its end tag.
///
/// Returns the inner XML re-serialized from the events and the pieces needed
/// to decode the value.
fn read_cell_body(reader: &mut Reader<&[u8]>) -> XlsxResult<(String, RawCell)> {
    let mut writer = Writer::new(Vec::new());
    let mut raw = RawCell::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::End(e) if stack.is_empty() && e.local_name().as_ref() == b"c" => break,
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"f" {
                    raw.formula.get_or_insert_with(String::new);
                }
                stack.push(name);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"f" => {
                raw.formula.get_or_insert_with(String::new);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                push_text(&mut raw, &stack, &text);
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(t);
                push_text(&mut raw, &stack, &text);
            }
            Event::Eof => return Err(XlsxError::InvalidFormat("unterminated <c>".into())),
            _ => {}
        }
        writer.write_event(event)?;
    }

    let body = String::from_utf8(writer.into_inner())
        .map_err(|e| XlsxError::Parse(format!("cell content is not UTF-8: {}", e)))?;
    Ok((body, raw))
}

fn push_text(raw: &mut RawCell, stack: &[Vec<u8>], text: &str) {
    match stack.last().map(Vec::as_slice) {
        Some(b"v") => raw.value.get_or_insert_with(String::new).push_str(text),
        Some(b"f") => raw.formula.get_or_insert_with(String::new).push_str(text),
        Some(b"t")
            if stack.iter().any(|n| n == b"is") && !stack.iter().any(|n| n == b"rPh") =>
        {
            raw.inline.get_or_insert_with(String::new).push_str(text)
        }
        _ => {}
    }
}
