//! Generates a minimal SpreadsheetML package from a [`Workbook`].
//!
//! Strings are written inline (`t="inlineStr"`), so no shared string table
//! is produced.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::backend::{CellStyle, Sheet, Workbook};
use crate::cell_ref::{format_range, Coord};
use crate::error::{GridError, Result};
use crate::record::Value;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const ROOT_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

/// Cell formats: 0 default, 1 header, 2 body.
const STYLES: &str = concat!(
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="2">"#,
    r#"<font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/></font>"#,
    r#"<font><b/><sz val="12"/><color rgb="FF000000"/><name val="Times New Roman"/><family val="1"/></font>"#,
    r#"</fonts>"#,
    r#"<fills count="3">"#,
    r#"<fill><patternFill patternType="none"/></fill>"#,
    r#"<fill><patternFill patternType="gray125"/></fill>"#,
    r#"<fill><patternFill patternType="solid"><fgColor rgb="FFE0EBF5"/><bgColor indexed="64"/></patternFill></fill>"#,
    r#"</fills>"#,
    r#"<borders count="2">"#,
    r#"<border><left/><right/><top/><bottom/><diagonal/></border>"#,
    r#"<border>"#,
    r#"<left style="dashed"><color rgb="FF333333"/></left>"#,
    r#"<right style="dashed"><color rgb="FF333333"/></right>"#,
    r#"<top style="dashed"><color rgb="FF333333"/></top>"#,
    r#"<bottom style="dashed"><color rgb="FF333333"/></bottom>"#,
    r#"<diagonal/></border>"#,
    r#"</borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="3">"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyAlignment="1">"#,
    r#"<alignment horizontal="center" vertical="center" wrapText="1"/></xf>"#,
    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1">"#,
    r#"<alignment horizontal="center" vertical="center" wrapText="1"/></xf>"#,
    r#"</cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

fn style_index(style: CellStyle) -> u32 {
    match style {
        CellStyle::Header => 1,
        CellStyle::Body => 2,
    }
}

/// Write the whole package.
pub(super) fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    let sheets = workbook.sheets();
    if sheets.is_empty() {
        return Err(GridError::Backend(
            "a workbook needs at least one sheet".to_string(),
        ));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut put = |name: &str, body: &str| -> Result<()> {
        writer.start_file(name, options)?;
        writer.write_all(XML_DECL.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.write_all(body.as_bytes())?;
        Ok(())
    };

    put("[Content_Types].xml", &content_types(sheets.len()))?;
    put("_rels/.rels", ROOT_RELS)?;
    put("xl/workbook.xml", &workbook_xml(sheets))?;
    put("xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len()))?;
    put("xl/styles.xml", STYLES)?;
    for (idx, sheet) in sheets.iter().enumerate() {
        put(
            &format!("xl/worksheets/sheet{}.xml", idx + 1),
            &write_sheet_xml(sheet),
        )?;
    }

    let cursor = writer.finish()?;
    let bytes = cursor.into_inner();
    log::debug!(
        "wrote xlsx package: {} sheets, {} bytes",
        sheets.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn content_types(sheet_count: usize) -> String {
    let mut out = String::from(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    out.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    out.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    out.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    out.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    for idx in 1..=sheet_count {
        out.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{idx}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    out.push_str("</Types>");
    out
}

fn workbook_xml(sheets: &[Sheet]) -> String {
    let mut out = String::from(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    for (idx, sheet) in sheets.iter().enumerate() {
        out.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_escape(sheet.name()),
            idx + 1,
            idx + 1
        ));
    }
    out.push_str("</sheets></workbook>");
    out
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut out = String::from(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for idx in 1..=sheet_count {
        out.push_str(&format!(
            r#"<Relationship Id="rId{idx}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{idx}.xml"/>"#
        ));
    }
    out.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    ));
    out.push_str("</Relationships>");
    out
}

/// Worksheet XML for one sheet. Styled cells without a value are written
/// as empty `<c>` elements so merged header ranges keep their borders.
pub(super) fn write_sheet_xml(sheet: &Sheet) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    );
    out.push_str(
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    );

    let mut cells: BTreeMap<(u32, u32), (Option<&Value>, Option<CellStyle>)> = BTreeMap::new();
    for (at, value) in sheet.cells() {
        cells.entry((at.y, at.x)).or_default().0 = Some(value);
    }
    for (at, style) in sheet.styles() {
        cells.entry((at.y, at.x)).or_default().1 = Some(style);
    }

    if let (Some(&(max_row, _)), Some(max_col)) = (
        cells.keys().next_back(),
        cells.keys().map(|&(_, x)| x).max(),
    ) {
        out.push_str(&format!(
            "<dimension ref=\"{}\"/>",
            format_range(Coord::new(1, 1), Coord::new(max_col, max_row))
        ));
    }

    out.push_str("<sheetData>");
    let mut current_row = None;
    for (&(y, x), &(value, style)) in &cells {
        if current_row != Some(y) {
            if current_row.is_some() {
                out.push_str("</row>");
            }
            out.push_str(&format!("<row r=\"{y}\">"));
            current_row = Some(y);
        }
        write_cell(&mut out, Coord::new(x, y), value, style);
    }
    if current_row.is_some() {
        out.push_str("</row>");
    }
    out.push_str("</sheetData>");

    let merges = sheet.merges();
    if !merges.is_empty() {
        out.push_str(&format!("<mergeCells count=\"{}\">", merges.len()));
        for &(start, end) in merges {
            out.push_str(&format!(
                "<mergeCell ref=\"{}\"/>",
                format_range(start, end)
            ));
        }
        out.push_str("</mergeCells>");
    }

    out.push_str("</worksheet>");
    out
}

/// Write a single `<c>` element.
fn write_cell(out: &mut String, at: Coord, value: Option<&Value>, style: Option<CellStyle>) {
    out.push_str(&format!("<c r=\"{at}\""));
    if let Some(style) = style {
        out.push_str(&format!(" s=\"{}\"", style_index(style)));
    }

    match value {
        None => out.push_str("/>"),
        Some(Value::Str(text)) => write_inline_string(out, text),
        // NaN and infinities have no numeric form in SpreadsheetML.
        Some(Value::Float(v)) if !v.is_finite() => write_inline_string(out, &v.to_string()),
        Some(number) => {
            out.push_str(&format!("><v>{number}</v></c>"));
        }
    }
}

fn write_inline_string(out: &mut String, text: &str) {
    out.push_str(" t=\"inlineStr\"><is><t xml:space=\"preserve\">");
    out.push_str(&xml_escape(text));
    out.push_str("</t></is></c>");
}

/// Minimal XML escaping for attribute/text content.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sheet_xml_layout() {
        let mut sheet = Sheet::new("S");
        sheet
            .set_value(Coord::new(1, 1), Value::Str("a&b".into()))
            .unwrap();
        sheet.add_merge(Coord::new(1, 1), Coord::new(2, 1)).unwrap();
        sheet
            .apply_style(Coord::new(1, 1), Coord::new(2, 1), CellStyle::Header)
            .unwrap();
        sheet.set_value(Coord::new(1, 2), Value::Int(3)).unwrap();

        let xml = write_sheet_xml(&sheet);
        assert!(xml.contains("<dimension ref=\"A1:B2\"/>"));
        assert!(xml.contains(
            "<row r=\"1\"><c r=\"A1\" s=\"1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">a&amp;b</t></is></c><c r=\"B1\" s=\"1\"/></row>"
        ));
        assert!(xml.contains("<row r=\"2\"><c r=\"A2\"><v>3</v></c></row>"));
        assert!(xml.contains("<mergeCells count=\"1\"><mergeCell ref=\"A1:B1\"/></mergeCells>"));
    }

    #[test]
    fn non_finite_floats_become_inline_strings() {
        let mut sheet = Sheet::new("S");
        sheet.set_value(Coord::new(1, 1), Value::Float(f64::NAN)).unwrap();
        sheet
            .set_value(Coord::new(2, 1), Value::Float(f64::NEG_INFINITY))
            .unwrap();
        sheet.set_value(Coord::new(3, 1), Value::Float(0.5)).unwrap();

        let xml = write_sheet_xml(&sheet);
        assert!(xml.contains(
            "<c r=\"A1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">NaN</t></is></c>"
        ));
        assert!(xml.contains(
            "<c r=\"B1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">-inf</t></is></c>"
        ));
        assert!(xml.contains("<c r=\"C1\"><v>0.5</v></c>"));
        assert!(!xml.contains("<v>NaN</v>"));
    }

    #[test]
    fn empty_sheet_has_no_dimension() {
        let xml = write_sheet_xml(&Sheet::new("S"));
        assert!(!xml.contains("dimension"));
        assert!(xml.contains("<sheetData></sheetData>"));
    }

    #[test]
    fn escapes_sheet_names() {
        let xml = workbook_xml(&[Sheet::new("R&D \"x\"")]);
        assert!(xml.contains("name=\"R&amp;D &quot;x&quot;\""));
    }
}
