//! Zip-backed workbook host
//!
//! Loads every part of an Office Open XML package into memory, applies
//! the cleanup fixups as XML rewrites, and writes the package back out.
//! Parts keep their original archive order so the saved file diffs
//! cleanly against the input.

use anyhow::{Context, Result, anyhow, bail};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use quick_xml::Reader;
use quick_xml::events::Event;

use super::workbook_xml::{self, Relationship, attr_value};
use super::{TrimOutcome, WorkbookHost, paths, sheet_xml};
use crate::format::FileKind;
use crate::images;

const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_BIN_PART: &str = "xl/workbook.bin";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const VBA_PART: &str = "xl/vbaProject.bin";

const MACRO_WORKBOOK_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";
const PLAIN_WORKBOOK_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// One external workbook link, resolved from the package relationships
#[derive(Debug, Clone)]
struct LinkEntry {
    rid: String,
    part: String,
    /// 1-based index used in formula text as `[N]`
    index: u32,
    source: String,
}

pub struct PackageHost {
    /// Every file in the archive, in original order
    parts: Vec<(String, Vec<u8>)>,
    /// Media parts already visited; shared pictures are recompressed once
    visited_media: HashSet<String>,
}

impl PackageHost {
    /// Read a package from disk into memory.
    ///
    /// Fails when the file is not a zip archive or is missing the
    /// content-types part, which covers misnamed and truncated inputs.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).context("not a zip package")?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        let host = Self { parts, visited_media: HashSet::new() };
        if !host.has_part(CONTENT_TYPES) {
            bail!("missing {CONTENT_TYPES}; not a spreadsheet package");
        }
        Ok(host)
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.iter().find(|(n, _)| n == name).map(|(_, d)| d.as_slice())
    }

    fn part_string(&self, name: &str) -> Result<String> {
        let data = self.part(name).ok_or_else(|| anyhow!("missing part {}", name))?;
        String::from_utf8(data.to_vec()).with_context(|| format!("part {} is not UTF-8", name))
    }

    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, d)) => *d = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    pub fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|(n, _)| n != name);
        self.parts.len() != before
    }

    /// `(name, part path)` for every sheet, in workbook order
    fn sheet_entries(&self) -> Result<Vec<(String, String)>> {
        // Binary workbooks (.xlsb) keep their sheet list in workbook.bin;
        // there is nothing XML-level to optimize per sheet, but the
        // package can still be repacked and saved.
        if !self.has_part(WORKBOOK_PART) && self.has_part(WORKBOOK_BIN_PART) {
            return Ok(Vec::new());
        }
        let workbook = self.part_string(WORKBOOK_PART)?;
        let rels = workbook_xml::relationships(&self.part_string(WORKBOOK_RELS)?)?;

        let mut reader = Reader::from_str(&workbook);
        let mut buf = Vec::new();
        let mut entries = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                    let name = attr_value(&e, b"name")?.unwrap_or_default();
                    let rid = attr_value(&e, b"r:id")?.unwrap_or_default();
                    let rel = rels
                        .iter()
                        .find(|r| r.id == rid)
                        .ok_or_else(|| anyhow!("sheet '{}' has no relationship", name))?;
                    entries.push((name, paths::resolve_part_path("xl", &rel.target)));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow!("Error parsing XML: {}", e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(entries)
    }

    fn sheet_part(&self, sheet: &str) -> Result<String> {
        self.sheet_entries()?
            .into_iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, part)| part)
            .ok_or_else(|| anyhow!("no sheet named '{}'", sheet))
    }

    /// Rewrite one sheet part through an XML filter
    fn rewrite_sheet<T>(
        &mut self,
        sheet: &str,
        filter: impl FnOnce(&str) -> Result<(String, T)>,
    ) -> Result<T> {
        let part = self.sheet_part(sheet)?;
        let (new_xml, out) = filter(&self.part_string(&part)?)?;
        self.set_part(&part, new_xml.into_bytes());
        Ok(out)
    }

    fn links(&self) -> Result<Vec<LinkEntry>> {
        let rels = workbook_xml::relationships(&self.part_string(WORKBOOK_RELS)?)?;
        let mut links = Vec::new();

        for rel in rels.iter().filter(|r| r.rel_type.ends_with("/externalLink")) {
            let part = paths::resolve_part_path("xl", &rel.target);
            // externalLink3.xml -> formula index 3
            let index: u32 = part
                .rsplit('/')
                .next()
                .unwrap_or("")
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .with_context(|| format!("unindexed external link part {}", part))?;

            let link_rels =
                workbook_xml::relationships(&self.part_string(&paths::part_rels_path(&part))?)?;
            let source = link_rels
                .iter()
                .find(|r| {
                    r.rel_type.ends_with("/externalLinkPath")
                        || r.rel_type.ends_with("/externalWorkbook")
                })
                .map(|r| r.target.clone())
                .ok_or_else(|| anyhow!("external link {} has no source", part))?;

            links.push(LinkEntry { rid: rel.id.clone(), part, index, source });
        }

        links.sort_by_key(|l| l.index);
        Ok(links)
    }

    fn remove_content_type(&mut self, part_name: &str) -> Result<()> {
        let ct = workbook_xml::remove_content_type_override(
            &self.part_string(CONTENT_TYPES)?,
            &format!("/{}", part_name),
        )?;
        self.set_part(CONTENT_TYPES, ct.into_bytes());
        Ok(())
    }

    /// Media parts reachable from a sheet via its drawings
    fn media_parts(&self, sheet_part: &str) -> Result<Vec<String>> {
        let rels_part = paths::part_rels_path(sheet_part);
        if !self.has_part(&rels_part) {
            return Ok(Vec::new());
        }
        let sheet_dir = paths::part_dir(sheet_part).to_string();
        let mut media = Vec::new();

        let rels = workbook_xml::relationships(&self.part_string(&rels_part)?)?;
        for rel in rels.iter().filter(|r| r.rel_type.ends_with("/drawing")) {
            let drawing = paths::resolve_part_path(&sheet_dir, &rel.target);
            let drawing_rels = paths::part_rels_path(&drawing);
            if !self.has_part(&drawing_rels) {
                continue;
            }
            let drawing_dir = paths::part_dir(&drawing).to_string();
            for irel in workbook_xml::relationships(&self.part_string(&drawing_rels)?)? {
                if irel.rel_type.ends_with("/image") {
                    media.push(paths::resolve_part_path(&drawing_dir, &irel.target));
                }
            }
        }
        Ok(media)
    }

    /// Drop the macro payload so the package is valid as plain xlsx
    fn strip_macro_payload(&mut self) -> Result<()> {
        if !self.remove_part(VBA_PART) {
            return Ok(());
        }
        let ct = self
            .part_string(CONTENT_TYPES)?
            .replace(MACRO_WORKBOOK_TYPE, PLAIN_WORKBOOK_TYPE);
        self.set_part(CONTENT_TYPES, ct.into_bytes());
        self.remove_content_type(VBA_PART)?;

        let (rels, _) = workbook_xml::remove_relationships(
            &self.part_string(WORKBOOK_RELS)?,
            |r| r.rel_type.ends_with("/vbaProject"),
        )?;
        self.set_part(WORKBOOK_RELS, rels.into_bytes());
        Ok(())
    }
}

impl WorkbookHost for PackageHost {
    fn sheet_names(&mut self) -> Result<Vec<String>> {
        Ok(self.sheet_entries()?.into_iter().map(|(name, _)| name).collect())
    }

    fn link_sources(&mut self) -> Result<Vec<String>> {
        Ok(self.links()?.into_iter().map(|l| l.source).collect())
    }

    fn break_link(&mut self, source: &str) -> Result<()> {
        let link = self
            .links()?
            .into_iter()
            .find(|l| l.source == source)
            .ok_or_else(|| anyhow!("no external link to '{}'", source))?;

        // Freeze dependent formulas before the link part disappears
        let sheets = self.sheet_names()?;
        for sheet in &sheets {
            self.rewrite_sheet(sheet, |xml| {
                sheet_xml::flatten_formulas(xml, Some(link.index))
            })?;
        }

        let workbook = workbook_xml::remove_external_reference(
            &self.part_string(WORKBOOK_PART)?,
            &link.rid,
        )?;
        self.set_part(WORKBOOK_PART, workbook.into_bytes());

        let (rels, _) = workbook_xml::remove_relationships(
            &self.part_string(WORKBOOK_RELS)?,
            |r| r.id == link.rid,
        )?;
        self.set_part(WORKBOOK_RELS, rels.into_bytes());

        self.remove_content_type(&link.part)?;
        self.remove_part(&link.part);
        self.remove_part(&paths::part_rels_path(&link.part));
        Ok(())
    }

    fn defined_names(&mut self) -> Result<Vec<String>> {
        workbook_xml::defined_name_list(&self.part_string(WORKBOOK_PART)?)
    }

    fn delete_defined_name(&mut self, name: &str) -> Result<()> {
        let (workbook, found) =
            workbook_xml::remove_defined_name(&self.part_string(WORKBOOK_PART)?, name)?;
        if !found {
            bail!("defined name '{}' not found", name);
        }
        self.set_part(WORKBOOK_PART, workbook.into_bytes());
        Ok(())
    }

    fn recompress_images(&mut self, sheet: &str, jpeg_quality: u8) -> Result<usize> {
        let part = self.sheet_part(sheet)?;
        let mut replaced = 0;
        for media in self.media_parts(&part)? {
            if !self.visited_media.insert(media.clone()) {
                continue;
            }
            let Some(data) = self.part(&media) else { continue };
            if let Some(smaller) = images::recompress(data, jpeg_quality) {
                self.set_part(&media, smaller);
                replaced += 1;
            }
        }
        Ok(replaced)
    }

    fn flatten_formulas(&mut self, sheet: &str) -> Result<usize> {
        self.rewrite_sheet(sheet, |xml| sheet_xml::flatten_formulas(xml, None))
    }

    fn trim_ghost_area(&mut self, sheet: &str) -> Result<TrimOutcome> {
        self.rewrite_sheet(sheet, |xml| {
            let (new_xml, rows, cols) = sheet_xml::delete_ghost_area(xml)?;
            Ok((new_xml, TrimOutcome { rows_deleted: rows, cols_deleted: cols }))
        })
    }

    fn clear_trailing_formats(&mut self, sheet: &str) -> Result<usize> {
        self.rewrite_sheet(sheet, sheet_xml::clear_trailing_formats)
    }

    fn remove_comments(&mut self, sheet: &str) -> Result<usize> {
        let part = self.sheet_part(sheet)?;
        let rels_part = paths::part_rels_path(&part);
        if !self.has_part(&rels_part) {
            return Ok(0);
        }

        let rels = workbook_xml::relationships(&self.part_string(&rels_part)?)?;
        let doomed: Vec<Relationship> = rels
            .into_iter()
            .filter(|r| {
                r.rel_type.ends_with("/comments")
                    || r.rel_type.ends_with("/threadedComment")
                    || r.rel_type.ends_with("/vmlDrawing")
            })
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let sheet_dir = paths::part_dir(&part).to_string();
        let mut count = 0;
        for rel in &doomed {
            let target = paths::resolve_part_path(&sheet_dir, &rel.target);
            if !rel.rel_type.ends_with("/vmlDrawing") {
                if let Ok(xml) = self.part_string(&target) {
                    count += sheet_xml::count_comments(&xml)?;
                }
            }
            self.remove_content_type(&target)?;
            self.remove_part(&target);
            self.remove_part(&paths::part_rels_path(&target));
        }

        let (new_rels, _) = workbook_xml::remove_relationships(
            &self.part_string(&rels_part)?,
            |r| doomed.iter().any(|d| d.id == r.id),
        )?;
        self.set_part(&rels_part, new_rels.into_bytes());

        // The sheet keeps a legacyDrawing pointer to the (now gone) VML part
        let sheet_xml_src = self.part_string(&part)?;
        let cleaned = sheet_xml::remove_legacy_drawing(&sheet_xml_src)?;
        self.set_part(&part, cleaned.into_bytes());

        Ok(count)
    }

    fn remove_hyperlinks(&mut self, sheet: &str) -> Result<usize> {
        let removed = self.rewrite_sheet(sheet, sheet_xml::remove_hyperlinks)?;
        if removed > 0 {
            let part = self.sheet_part(sheet)?;
            let rels_part = paths::part_rels_path(&part);
            if self.has_part(&rels_part) {
                let (new_rels, _) = workbook_xml::remove_relationships(
                    &self.part_string(&rels_part)?,
                    |r| r.rel_type.ends_with("/hyperlink"),
                )?;
                self.set_part(&rels_part, new_rels.into_bytes());
            }
        }
        Ok(removed)
    }

    fn named_style_count(&mut self) -> Result<usize> {
        if !self.has_part(STYLES_PART) {
            return Ok(0);
        }
        workbook_xml::named_style_count(&self.part_string(STYLES_PART)?)
    }

    fn truncate_named_styles(&mut self, cap: usize) -> Result<usize> {
        if !self.has_part(STYLES_PART) {
            return Ok(0);
        }
        let (styles, removed) =
            workbook_xml::truncate_named_styles(&self.part_string(STYLES_PART)?, cap)?;
        self.set_part(STYLES_PART, styles.into_bytes());
        Ok(removed)
    }

    fn save_as(&mut self, path: &Path, kind: FileKind) -> Result<()> {
        if !kind.is_package() {
            bail!("cannot write the {} format from a package", kind.extension());
        }
        if kind == FileKind::Xlsx {
            self.strip_macro_payload()?;
        }

        let file = File::create(path)
            .with_context(|| format!("could not create {}", path.display()))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.parts {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>
<definedNames><definedName name="MyRange">Data!$A$1:$B$2</definedName></definedNames>
</workbook>"#;

    const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:B2"/>
<sheetData>
<row r="1"><c r="A1"><v>1</v></c><c r="B1"><f>A1*2</f><v>2</v></c></row>
<row r="2"><c r="A2" t="str"><f>CONCAT("a","b")</f><v>ab</v></c></row>
</sheetData>
</worksheet>"#;

    fn mock_xlsx_bytes() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
            ("xl/worksheets/sheet1.xml", SHEET1),
        ] {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn open_mock(dir: &TempDir) -> PackageHost {
        let path = dir.path().join("book.xlsx");
        std::fs::write(&path, mock_xlsx_bytes()).unwrap();
        PackageHost::open(&path).unwrap()
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.xlsx");
        std::fs::write(&path, b"this is not a zip").unwrap();
        assert!(PackageHost::open(&path).is_err());
    }

    #[test]
    fn test_sheet_names() {
        let dir = TempDir::new().unwrap();
        let mut host = open_mock(&dir);
        assert_eq!(host.sheet_names().unwrap(), vec!["Data".to_string()]);
    }

    #[test]
    fn test_defined_name_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut host = open_mock(&dir);
        assert_eq!(host.defined_names().unwrap(), vec!["MyRange".to_string()]);
        host.delete_defined_name("MyRange").unwrap();
        assert!(host.defined_names().unwrap().is_empty());
        assert!(host.delete_defined_name("MyRange").is_err());
    }

    #[test]
    fn test_flatten_and_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut host = open_mock(&dir);
        assert_eq!(host.flatten_formulas("Data").unwrap(), 2);

        let out = dir.path().join("book_light.xlsx");
        host.save_as(&out, FileKind::Xlsx).unwrap();

        let mut reopened = PackageHost::open(&out).unwrap();
        assert_eq!(reopened.sheet_names().unwrap(), vec!["Data".to_string()]);
        let xml = reopened.part_string("xl/worksheets/sheet1.xml").unwrap();
        assert!(!xml.contains("<f>"));
        assert!(xml.contains("<v>2</v>"));
        assert!(xml.contains("<v>ab</v>"));
    }

    #[test]
    fn test_missing_sheet_errors() {
        let dir = TempDir::new().unwrap();
        let mut host = open_mock(&dir);
        assert!(host.flatten_formulas("NoSuchSheet").is_err());
    }
}
