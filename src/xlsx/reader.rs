//! Parses an XLSX package into a [`Workbook`]: relationships, shared
//! strings, sheet list, then each worksheet's cells and merge ranges.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Cursor, Read, Seek};
use zip::ZipArchive;

use crate::backend::{Sheet, Workbook};
use crate::cell_ref::{parse_cell_range, parse_cell_ref, Coord};
use crate::error::Result;
use crate::record::Value;

/// Sheet metadata from workbook.xml
struct SheetInfo {
    name: String,
    path: String,
}

/// Paths found in xl/_rels/workbook.xml.rels, resolved against `xl/`.
#[derive(Default, Debug)]
struct WorkbookRelationships {
    /// rId -> full path, e.g. "rId1" -> "xl/worksheets/sheet1.xml"
    worksheets: HashMap<String, String>,
    shared_strings: Option<String>,
}

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellTypeTag {
    Shared,
    Inline,
    Str,
    Bool,
    Error,
    Number,
}

fn parse_cell_type_tag(value: &[u8]) -> CellTypeTag {
    match value {
        b"s" => CellTypeTag::Shared,
        b"b" => CellTypeTag::Bool,
        b"e" => CellTypeTag::Error,
        b"str" => CellTypeTag::Str,
        b"inlineStr" => CellTypeTag::Inline,
        _ => CellTypeTag::Number,
    }
}

fn attr_string(value: &[u8]) -> String {
    std::str::from_utf8(value).unwrap_or("").to_string()
}

pub(super) fn read_workbook(data: &[u8]) -> Result<Workbook> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let relationships = parse_workbook_relationships(&mut archive);
    let shared_strings =
        parse_shared_strings(&mut archive, relationships.shared_strings.as_deref());
    let infos = get_sheet_info(&mut archive, &relationships.worksheets)?;

    let mut workbook = Workbook::new();
    for info in &infos {
        workbook.push_sheet(parse_sheet(&mut archive, info, &shared_strings)?);
    }

    log::debug!(
        "read xlsx package: {} sheets, {} shared strings",
        infos.len(),
        shared_strings.len()
    );
    Ok(workbook)
}

fn parse_workbook_relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> WorkbookRelationships {
    let mut rels = WorkbookRelationships::default();

    let Ok(file) = archive.by_name("xl/_rels/workbook.xml.rels") else {
        return rels;
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = String::new();
                    let mut target = String::new();
                    let mut rel_type = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => id = attr_string(&attr.value),
                            b"Target" => target = attr_string(&attr.value),
                            b"Type" => rel_type = attr_string(&attr.value),
                            _ => {}
                        }
                    }

                    let full_path = if let Some(stripped) = target.strip_prefix('/') {
                        stripped.to_string()
                    } else {
                        format!("xl/{target}")
                    };

                    if rel_type.ends_with("/worksheet") && !id.is_empty() && !target.is_empty() {
                        rels.worksheets.insert(id, full_path);
                    } else if rel_type.ends_with("/sharedStrings") {
                        rels.shared_strings = Some(full_path);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

/// Sheet names and part paths from xl/workbook.xml, in tab order.
fn get_sheet_info<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    relationships: &HashMap<String, String>,
) -> Result<Vec<SheetInfo>> {
    let file = archive.by_name("xl/workbook.xml")?;

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e)) if e.local_name().as_ref() == b"sheet" => {
                let mut name = String::new();
                let mut r_id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = attr
                                .unescape_value()
                                .map_or_else(|_| attr_string(&attr.value), |v| v.to_string());
                        }
                        // r:id attribute (namespace prefixed)
                        key if key.ends_with(b":id") || key == b"id" => {
                            r_id = attr_string(&attr.value);
                        }
                        _ => {}
                    }
                }

                if !name.is_empty() {
                    let path = relationships.get(&r_id).cloned().unwrap_or_else(|| {
                        format!("xl/worksheets/sheet{}.xml", sheets.len() + 1)
                    });
                    sheets.push(SheetInfo { name, path });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Shared strings in table order. Rich text runs are concatenated; phonetic
/// runs are dropped.
fn parse_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: Option<&str>,
) -> Vec<String> {
    let sst_path = path.unwrap_or("xl/sharedStrings.xml");
    let Ok(file) = archive.by_name(sst_path) else {
        return Vec::new();
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut strings = Vec::new();
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(ref e)) if in_t => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    strings
}

/// A `<c>` element whose value text is still being read.
struct PendingCell {
    at: Coord,
    tag: CellTypeTag,
    text: String,
    /// A `<v>` or `<t>` child was seen, even an empty one.
    has_text: bool,
}

impl PendingCell {
    /// `r` is optional in SpreadsheetML; without it the cell follows the
    /// previous one in the row.
    fn from_element(e: &BytesStart<'_>, row: u32, next_col: u32) -> Self {
        let mut at = Coord::new(next_col, row);
        let mut tag = CellTypeTag::Number;
        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"r" => {
                    if let Some(coord) =
                        std::str::from_utf8(&attr.value).ok().and_then(parse_cell_ref)
                    {
                        at = coord;
                    }
                }
                b"t" => tag = parse_cell_type_tag(&attr.value),
                _ => {}
            }
        }
        Self {
            at,
            tag,
            text: String::new(),
            has_text: false,
        }
    }

    /// `None` only for cells without a value; an empty string cell stays an
    /// empty string so trailing blank rows survive.
    fn into_value(self, shared_strings: &[String]) -> Option<Value> {
        if !self.has_text {
            return None;
        }
        match self.tag {
            CellTypeTag::Shared => {
                let resolved = self
                    .text
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| shared_strings.get(idx));
                if resolved.is_none() {
                    log::warn!("cell {} refers to unknown shared string {}", self.at, self.text);
                }
                resolved.map(|s| Value::Str(s.clone()))
            }
            CellTypeTag::Bool | CellTypeTag::Number if self.text.trim().is_empty() => None,
            CellTypeTag::Bool => Some(Value::Str(
                if self.text.trim() == "1" { "TRUE" } else { "FALSE" }.to_string(),
            )),
            CellTypeTag::Inline | CellTypeTag::Str | CellTypeTag::Error => {
                Some(Value::Str(self.text))
            }
            CellTypeTag::Number => Some(parse_number(self.text)),
        }
    }
}

/// The narrowest numeric value the text parses as, else the text itself.
fn parse_number(text: String) -> Value {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        Value::Int(v)
    } else if let Ok(v) = trimmed.parse::<u64>() {
        Value::Uint(v)
    } else if let Ok(v) = trimmed.parse::<f64>() {
        Value::Float(v)
    } else {
        Value::Str(text)
    }
}

fn row_number(e: &BytesStart<'_>) -> Option<u32> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"r")
        .and_then(|attr| std::str::from_utf8(&attr.value).ok()?.parse().ok())
}

fn add_merge(sheet: &mut Sheet, e: &BytesStart<'_>) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"ref" {
            continue;
        }
        let Some((start, end)) = std::str::from_utf8(&attr.value)
            .ok()
            .and_then(parse_cell_range)
        else {
            continue;
        };
        if let Err(err) = sheet.add_merge(start, end) {
            log::warn!("skipping merge on sheet [{}]: {err}", sheet.name());
        }
    }
}

/// Parse a single worksheet
fn parse_sheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    info: &SheetInfo,
    shared_strings: &[String],
) -> Result<Sheet> {
    let file = archive.by_name(&info.path)?;

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut sheet = Sheet::new(info.name.clone());
    let mut buf = Vec::new();
    let mut current_row: u32 = 0;
    let mut next_col: u32 = 1;
    let mut cell: Option<PendingCell> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = row_number(e).unwrap_or(current_row + 1);
                    next_col = 1;
                }
                b"c" => cell = Some(PendingCell::from_element(e, current_row, next_col)),
                b"rPh" => in_phonetic = true,
                b"v" | b"t" if !in_phonetic => {
                    if let Some(pending) = cell.as_mut() {
                        pending.has_text = true;
                        in_text = true;
                    }
                }
                b"mergeCell" => add_merge(&mut sheet, e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    current_row = row_number(e).unwrap_or(current_row + 1);
                    next_col = 1;
                }
                b"c" => {
                    let empty = PendingCell::from_element(e, current_row, next_col);
                    next_col = empty.at.x + 1;
                }
                b"v" | b"t" if !in_phonetic => {
                    if let Some(pending) = cell.as_mut() {
                        pending.has_text = true;
                    }
                }
                b"mergeCell" => add_merge(&mut sheet, e),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                if let Some(pending) = cell.as_mut() {
                    pending.text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        next_col = pending.at.x + 1;
                        let at = pending.at;
                        if let Some(value) = pending.into_value(shared_strings) {
                            sheet.set_value(at, value)?;
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet)
}
