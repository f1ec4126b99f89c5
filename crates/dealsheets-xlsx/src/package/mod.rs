//! Patching of existing workbooks.
//!
//! A [`TemplateWorkbook`] keeps every part of the package in memory and only
//! rewrites the worksheets that were edited. Formulas, styles, drawings and
//! everything else the library does not understand survive a save.

mod sheet;

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;

use crate::error::{XlsxError, XlsxResult};
use crate::reader::{attr_value, read_relationships, read_shared_strings, read_workbook_sheets};
use dealsheets_core::{CellAddress, CellRange, CellValue, MAX_ROWS};
use sheet::SheetPart;

const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

struct SheetSlot {
    name: String,
    path: String,
    part: SheetPart,
}

/// An existing workbook opened for cell-level edits
pub struct TemplateWorkbook {
    /// Every zip entry in archive order.
    parts: Vec<(String, Vec<u8>)>,
    sheets: Vec<SheetSlot>,
    calc_chain: Option<String>,
}

impl TemplateWorkbook {
    /// Open a workbook file
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let workbook = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "opened {} ({} sheets)",
            path.display(),
            workbook.sheets.len()
        );
        Ok(workbook)
    }

    /// Load a workbook from any seekable reader
    pub fn from_reader<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        let find = |name: &str| {
            parts
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, data)| data.as_slice())
        };

        if find(CONTENT_TYPES).is_none() {
            return Err(XlsxError::MissingPart(CONTENT_TYPES.into()));
        }
        let workbook_xml =
            find(WORKBOOK_PART).ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.into()))?;
        let rels_xml =
            find(WORKBOOK_RELS).ok_or_else(|| XlsxError::MissingPart(WORKBOOK_RELS.into()))?;

        let entries = read_workbook_sheets(workbook_xml)?;
        let rels = read_relationships(rels_xml)?;

        let shared_path = rels
            .iter()
            .find(|r| r.is_kind("sharedStrings"))
            .map(|r| r.resolve("xl/"))
            .unwrap_or_else(|| DEFAULT_SHARED_STRINGS.to_string());
        let shared_strings = match find(&shared_path) {
            Some(xml) => read_shared_strings(xml)?,
            None => Vec::new(),
        };

        let calc_chain = rels
            .iter()
            .find(|r| r.is_kind("calcChain"))
            .map(|r| r.resolve("xl/"));

        let mut sheets = Vec::with_capacity(entries.len());
        for entry in entries {
            let rel = rels.iter().find(|r| r.id == entry.r_id).ok_or_else(|| {
                XlsxError::InvalidFormat(format!(
                    "sheet '{}' refers to unknown relationship {}",
                    entry.name, entry.r_id
                ))
            })?;
            if !rel.is_kind("worksheet") {
                log::debug!("skipping non-worksheet sheet '{}'", entry.name);
                continue;
            }
            let path = rel.resolve("xl/");
            let data = find(&path).ok_or_else(|| XlsxError::MissingPart(path.clone()))?;
            let xml = std::str::from_utf8(data)
                .map_err(|e| XlsxError::Parse(format!("{} is not UTF-8: {}", path, e)))?;
            let part = SheetPart::parse(xml, &shared_strings)?;
            sheets.push(SheetSlot {
                name: entry.name,
                path,
                part,
            });
        }

        Ok(Self {
            parts,
            sheets,
            calc_chain,
        })
    }

    /// Worksheet names in tab order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Check whether a worksheet with this name exists
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    fn sheet(&self, name: &str) -> XlsxResult<&SheetPart> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.part)
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> XlsxResult<&mut SheetPart> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.part)
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))
    }

    /// Read a cell by A1 reference ("B3").
    ///
    /// Formula cells come back as [`CellValue::Formula`] carrying the cached
    /// result; use [`CellValue::resolved`] for the computed value.
    pub fn cell_value(&self, sheet: &str, cell: &str) -> XlsxResult<CellValue> {
        self.cell_value_at(sheet, CellAddress::parse(cell)?)
    }

    /// Read a cell by address
    pub fn cell_value_at(&self, sheet: &str, addr: CellAddress) -> XlsxResult<CellValue> {
        Ok(self.sheet(sheet)?.cell(addr))
    }

    /// Write a value into a cell by A1 reference, keeping the cell style
    pub fn set_cell(
        &mut self,
        sheet: &str,
        cell: &str,
        value: impl Into<CellValue>,
    ) -> XlsxResult<()> {
        self.set_cell_at(sheet, CellAddress::parse(cell)?, value)
    }

    /// Write a value into a cell by address, keeping the cell style
    pub fn set_cell_at(
        &mut self,
        sheet: &str,
        addr: CellAddress,
        value: impl Into<CellValue>,
    ) -> XlsxResult<()> {
        let value = value.into();
        self.sheet_mut(sheet)?.set_cell(addr, &value);
        Ok(())
    }

    /// Remove the value or formula of a cell, keeping its style
    pub fn clear_cell(&mut self, sheet: &str, cell: &str) -> XlsxResult<()> {
        self.set_cell(sheet, cell, CellValue::Empty)
    }

    /// Clear every cell of a range
    pub fn clear_range(&mut self, sheet: &str, range: &CellRange) -> XlsxResult<()> {
        let part = self.sheet_mut(sheet)?;
        for addr in range.cells() {
            part.set_cell(addr, &CellValue::Empty);
        }
        Ok(())
    }

    /// Hide or show a row (1-based row number)
    pub fn set_row_hidden(&mut self, sheet: &str, row_number: u32, hidden: bool) -> XlsxResult<()> {
        let row = row_index(row_number)?;
        self.sheet_mut(sheet)?.set_row_hidden(row, hidden);
        Ok(())
    }

    /// Whether a row (1-based row number) is hidden
    pub fn is_row_hidden(&self, sheet: &str, row_number: u32) -> XlsxResult<bool> {
        let row = row_index(row_number)?;
        Ok(self.sheet(sheet)?.is_row_hidden(row))
    }

    /// Whether any worksheet was edited since the workbook was opened
    pub fn is_modified(&self) -> bool {
        self.sheets.iter().any(|s| s.part.is_modified())
    }

    /// Save the workbook to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write(file)?;
        log::debug!("saved {}", path.display());
        Ok(())
    }

    /// Write the workbook to a writer.
    ///
    /// When a sheet was edited the calculation chain is dropped and the
    /// workbook is flagged for a full recalculation on load, so cached
    /// formula results are refreshed by the spreadsheet application.
    pub fn write<W: Write + Seek>(&self, writer: W) -> XlsxResult<()> {
        let modified = self.is_modified();
        let calc_chain = self.calc_chain.as_deref().filter(|_| modified);

        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default();

        for (name, data) in &self.parts {
            if calc_chain == Some(name.as_str()) {
                log::debug!("dropping {}", name);
                continue;
            }

            let sheet = self
                .sheets
                .iter()
                .find(|s| s.path == *name && s.part.is_modified());

            let bytes: Cow<'_, [u8]> = match (sheet, name.as_str()) {
                (Some(slot), _) => Cow::Owned(slot.part.to_xml().into_bytes()),
                (None, WORKBOOK_PART) if modified => Cow::Owned(force_full_calc(data)?),
                (None, WORKBOOK_RELS) if calc_chain.is_some() => {
                    Cow::Owned(drop_elements(data, |e| {
                        if e.local_name().as_ref() != b"Relationship" {
                            return Ok(false);
                        }
                        Ok(attr_value(e, b"Type")?.map_or(false, |t| t.ends_with("/calcChain")))
                    })?)
                }
                (None, CONTENT_TYPES) => match calc_chain {
                    Some(chain) => {
                        let part_name = format!("/{}", chain);
                        Cow::Owned(drop_elements(data, |e| {
                            Ok(e.local_name().as_ref() == b"Override"
                                && attr_value(e, b"PartName")?.as_deref() == Some(part_name.as_str()))
                        })?)
                    }
                    None => Cow::Borrowed(data.as_slice()),
                },
                _ => Cow::Borrowed(data.as_slice()),
            };

            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }

        zip.finish()?;
        Ok(())
    }
}

fn row_index(row_number: u32) -> XlsxResult<u32> {
    if row_number == 0 || row_number > MAX_ROWS {
        return Err(dealsheets_core::Error::RowOutOfBounds(row_number, MAX_ROWS).into());
    }
    Ok(row_number - 1)
}

fn read_events(xml: &[u8]) -> XlsxResult<Vec<Event<'static>>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut events = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        if matches!(event, Event::Eof) {
            break;
        }
        events.push(event.into_owned());
        buf.clear();
    }
    Ok(events)
}

fn write_events(events: &[Event<'static>]) -> XlsxResult<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    for event in events {
        writer.write_event(event)?;
    }
    Ok(writer.into_inner())
}

/// Remove every element matching `pred`, including its children.
fn drop_elements<F>(xml: &[u8], mut pred: F) -> XlsxResult<Vec<u8>>
where
    F: FnMut(&BytesStart<'_>) -> XlsxResult<bool>,
{
    let mut kept = Vec::new();
    let mut skip_depth = 0usize;
    for event in read_events(xml)? {
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            }
            continue;
        }
        match &event {
            Event::Empty(e) if pred(e)? => continue,
            Event::Start(e) if pred(e)? => {
                skip_depth = 1;
                continue;
            }
            _ => {}
        }
        kept.push(event);
    }
    write_events(&kept)
}

/// Set `fullCalcOnLoad="1"` on `<calcPr>`, adding the element when missing.
fn force_full_calc(xml: &[u8]) -> XlsxResult<Vec<u8>> {
    let mut events = read_events(xml)?;

    let mut found = false;
    for event in events.iter_mut() {
        let (e, empty) = match event {
            Event::Empty(e) if e.local_name().as_ref() == b"calcPr" => (e, true),
            Event::Start(e) if e.local_name().as_ref() == b"calcPr" => (e, false),
            _ => continue,
        };
        let mut patched = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr?;
            if attr.key.local_name().as_ref() != b"fullCalcOnLoad" {
                patched.push_attribute(attr);
            }
        }
        patched.push_attribute(("fullCalcOnLoad", "1"));
        *event = if empty {
            Event::Empty(patched)
        } else {
            Event::Start(patched)
        };
        found = true;
    }

    if !found {
        // calcPr follows these elements in the workbook schema
        let anchor = events.iter().rposition(|event| match event {
            Event::End(e) => matches!(
                e.local_name().as_ref(),
                b"sheets" | b"functionGroups" | b"externalReferences" | b"definedNames"
            ),
            Event::Empty(e) => matches!(
                e.local_name().as_ref(),
                b"sheets" | b"functionGroups" | b"externalReferences" | b"definedNames"
            ),
            _ => false,
        });
        let anchor = anchor.ok_or_else(|| {
            XlsxError::InvalidFormat("workbook.xml has no <sheets> element".into())
        })?;
        let prefix = workbook_prefix(&events);
        let mut calc = BytesStart::new(format!("{}calcPr", prefix));
        calc.push_attribute(("fullCalcOnLoad", "1"));
        events.insert(anchor + 1, Event::Empty(calc));
    }

    write_events(&events)
}

fn workbook_prefix(events: &[Event<'static>]) -> String {
    events
        .iter()
        .find_map(|event| match event {
            Event::Start(e) if e.local_name().as_ref() == b"workbook" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                Some(
                    name.split_once(':')
                        .map(|(p, _)| format!("{}:", p))
                        .unwrap_or_default(),
                )
            }
            _ => None,
        })
        .unwrap_or_default()
}
