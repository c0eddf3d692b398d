//! Bare-bones xlsx writer for the salvage path
//!
//! Emits the smallest package a spreadsheet application will accept:
//! content types, the two relationship parts, a workbook part, and one
//! worksheet per salvaged sheet. Strings are written inline so no
//! shared-strings table is needed. Formatting is deliberately absent;
//! salvage preserves values, nothing else.

use anyhow::{Context, Result};
use calamine::{Data, Range};
use quick_xml::escape::escape;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::cellref::cell_ref;

/// One salvaged sheet: its name and the cached-value range read back
/// from the damaged workbook
pub struct SalvageSheet {
    pub name: String,
    pub range: Range<Data>,
}

pub fn write_values_workbook(path: &Path, sheets: &[SalvageSheet]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let add = |zip: &mut ZipWriter<File>, name: &str, content: &str| -> Result<()> {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
        Ok(())
    };

    add(&mut zip, "[Content_Types].xml", &content_types(sheets.len()))?;
    add(&mut zip, "_rels/.rels", ROOT_RELS)?;
    add(&mut zip, "xl/workbook.xml", &workbook_xml(sheets))?;
    add(&mut zip, "xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len()))?;
    for (i, sheet) in sheets.iter().enumerate() {
        add(
            &mut zip,
            &format!("xl/worksheets/sheet{}.xml", i + 1),
            &sheet_xml(&sheet.range),
        )?;
    }

    zip.finish()?;
    Ok(())
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn content_types(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn workbook_xml(sheets: &[SalvageSheet]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(sheet.name.as_str()),
            i + 1,
            i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i, i
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn sheet_xml(range: &Range<Data>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut open_row: Option<u32> = None;

    // used_cells is row-major, so rows can be emitted in a single pass
    for (rel_row, rel_col, value) in range.used_cells() {
        let row = start_row + rel_row as u32;
        let col = start_col + rel_col as u32;

        let Some(cell) = cell_markup(&cell_ref(row, col), value) else {
            continue;
        };

        if open_row != Some(row) {
            if open_row.is_some() {
                xml.push_str("</row>");
            }
            xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
            open_row = Some(row);
        }
        xml.push_str(&cell);
    }
    if open_row.is_some() {
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn cell_markup(r: &str, value: &Data) -> Option<String> {
    match value {
        Data::Int(i) => Some(format!(r#"<c r="{}"><v>{}</v></c>"#, r, i)),
        Data::Float(f) => Some(format!(r#"<c r="{}"><v>{}</v></c>"#, r, f)),
        Data::Bool(b) => Some(format!(
            r#"<c r="{}" t="b"><v>{}</v></c>"#,
            r,
            if *b { 1 } else { 0 }
        )),
        Data::String(s) => Some(format!(
            r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
            r,
            escape(s.as_str())
        )),
        Data::DateTime(dt) => Some(format!(r#"<c r="{}"><v>{}</v></c>"#, r, dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(format!(
            r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
            r,
            escape(s.as_str())
        )),
        // Error cells carry no value worth keeping
        Data::Error(_) | Data::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_markup_types() {
        assert_eq!(
            cell_markup("A1", &Data::Float(2.5)).unwrap(),
            r#"<c r="A1"><v>2.5</v></c>"#
        );
        assert_eq!(
            cell_markup("B2", &Data::Bool(true)).unwrap(),
            r#"<c r="B2" t="b"><v>1</v></c>"#
        );
        assert_eq!(
            cell_markup("C3", &Data::String("a<b".to_string())).unwrap(),
            r#"<c r="C3" t="inlineStr"><is><t>a&lt;b</t></is></c>"#
        );
        assert!(cell_markup("D4", &Data::Empty).is_none());
    }

    #[test]
    fn test_sheet_xml_groups_rows() {
        let mut range = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::Float(1.0));
        range.set_value((0, 1), Data::String("x".to_string()));
        range.set_value((1, 0), Data::Float(2.0));

        let xml = sheet_xml(&range);
        assert!(xml.contains(r#"<row r="1"><c r="A1"><v>1</v></c><c r="B1" t="inlineStr"><is><t>x</t></is></c></row>"#));
        assert!(xml.contains(r#"<row r="2"><c r="A2"><v>2</v></c></row>"#));
    }

    #[test]
    fn test_offset_range_keeps_absolute_refs() {
        // A range starting at C5 must still address its cells as C5
        let mut range = Range::new((4, 2), (4, 2));
        range.set_value((4, 2), Data::Float(9.0));
        let xml = sheet_xml(&range);
        assert!(xml.contains(r#"<c r="C5"><v>9</v></c>"#));
    }
}
