//! Event filters for workbook-level XML parts
//!
//! All rewrites stream events through `quick_xml` and only touch the
//! elements they are asked to remove, so untouched markup survives
//! byte-for-byte.

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// One entry of a `.rels` part
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

pub(crate) fn attr_value(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

/// List every relationship in a `.rels` part
pub fn relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                rels.push(Relationship {
                    id: attr_value(&e, b"Id")?.unwrap_or_default(),
                    rel_type: attr_value(&e, b"Type")?.unwrap_or_default(),
                    target: attr_value(&e, b"Target")?.unwrap_or_default(),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Remove every relationship the predicate selects; returns the rewritten
/// part and how many entries were dropped
pub fn remove_relationships(
    xml: &str,
    should_remove: impl Fn(&Relationship) -> bool,
) -> Result<(String, usize)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut removed = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                let rel = Relationship {
                    id: attr_value(&e, b"Id")?.unwrap_or_default(),
                    rel_type: attr_value(&e, b"Type")?.unwrap_or_default(),
                    target: attr_value(&e, b"Target")?.unwrap_or_default(),
                };
                if should_remove(&rel) {
                    removed += 1;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok((String::from_utf8(result)?, removed))
}

/// Enumerate every workbook-level defined name, in document order.
///
/// Unlike a linter, the lightener also wants internal names such as
/// `_xlnm.Print_Area`; the host application deletes those too.
pub fn defined_name_list(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"definedName" => {
                if let Some(name) = attr_value(&e, b"name")? {
                    names.push(name);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

/// Remove a single defined name from workbook.xml, dropping the
/// surrounding `<definedNames>` block once it is empty.
///
/// Returns the rewritten XML and whether a matching entry was found.
pub fn remove_defined_name(xml: &str, name_to_remove: &str) -> Result<(String, bool)> {
    let names = defined_name_list(xml)?;
    let will_match = names.iter().any(|n| n == name_to_remove);
    let will_be_empty = will_match && names.len() == 1;

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut skip_current = false;
    let mut found = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"definedNames" => {
                if !will_be_empty {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"definedNames" => {
                if !will_be_empty {
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"definedName" => {
                let name = attr_value(&e, b"name")?.unwrap_or_default();
                if !found && name == name_to_remove {
                    skip_current = true;
                    found = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"definedName" => {
                let name = attr_value(&e, b"name")?.unwrap_or_default();
                if !found && name == name_to_remove {
                    found = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"definedName" => {
                if skip_current {
                    skip_current = false;
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => {
                if !skip_current {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok((String::from_utf8(result)?, found))
}

/// Remove one `<externalReference r:id="..."/>` entry from workbook.xml,
/// dropping the surrounding `<externalReferences>` block once it is empty
pub fn remove_external_reference(xml: &str, rid: &str) -> Result<String> {
    let remaining = {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut count = 0usize;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e))
                    if e.name().as_ref() == b"externalReference" =>
                {
                    let id = attr_value(&e, b"r:id")?.unwrap_or_default();
                    if id != rid {
                        count += 1;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
                _ => {}
            }
            buf.clear();
        }
        count
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) if e.name().as_ref() == b"externalReference" => {
                let id = attr_value(&e, b"r:id")?.unwrap_or_default();
                if id != rid {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"externalReferences" => {
                if remaining > 0 {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"externalReferences" => {
                if remaining > 0 {
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

/// Remove an `<Override PartName="..."/>` entry from [Content_Types].xml
pub fn remove_content_type_override(xml: &str, part_name: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Override" => {
                let part = attr_value(&e, b"PartName")?.unwrap_or_default();
                if part != part_name {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

/// Count named cell styles in styles.xml
pub fn named_style_count(xml: &str) -> Result<usize> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut count = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"cellStyle" => {
                count += 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(count)
}

/// Delete named cell styles beyond the cap, from the end, and fix up the
/// `count` attribute. Returns the rewritten XML and the number removed.
pub fn truncate_named_styles(xml: &str, cap: usize) -> Result<(String, usize)> {
    let total = named_style_count(xml)?;
    if total <= cap {
        return Ok((xml.to_string(), 0));
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut kept = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"cellStyles" => {
                let mut elem = BytesStart::new("cellStyles");
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() != b"count" {
                        elem.push_attribute(attr);
                    }
                }
                elem.push_attribute(("count", cap.to_string().as_str()));
                writer.write_event(Event::Start(elem))?;
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"cellStyle" => {
                if kept < cap {
                    kept += 1;
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"cellStyle" => {
                if kept < cap {
                    kept += 1;
                    writer.write_event(Event::Start(e))?;
                } else {
                    // Styles with child elements are rare; skip to the close tag
                    let mut depth = 1usize;
                    let mut inner = Vec::new();
                    while depth > 0 {
                        match reader.read_event_into(&mut inner)? {
                            Event::Start(_) => depth += 1,
                            Event::End(_) => depth -= 1,
                            Event::Eof => break,
                            _ => {}
                        }
                        inner.clear();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok((String::from_utf8(result)?, total - cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<?xml version="1.0"?>
<workbook><sheets><sheet name="S1" sheetId="1" r:id="rId1"/></sheets>
<definedNames><definedName name="Alpha">S1!$A$1</definedName><definedName name="_xlnm.Print_Area">S1!$A$1:$B$2</definedName></definedNames>
<externalReferences><externalReference r:id="rId9"/><externalReference r:id="rId10"/></externalReferences></workbook>"#;

    #[test]
    fn test_defined_name_list_includes_internal_names() {
        let names = defined_name_list(WORKBOOK).unwrap();
        assert_eq!(names, vec!["Alpha", "_xlnm.Print_Area"]);
    }

    #[test]
    fn test_remove_defined_name() {
        let (xml, found) = remove_defined_name(WORKBOOK, "Alpha").unwrap();
        assert!(found);
        assert!(!xml.contains(r#"name="Alpha""#));
        assert!(xml.contains("_xlnm.Print_Area"));

        let (xml, found) = remove_defined_name(&xml, "_xlnm.Print_Area").unwrap();
        assert!(found);
        assert_eq!(defined_name_list(&xml).unwrap().len(), 0);
        // Removing the last name drops the whole block
        assert!(!xml.contains("definedNames"));

        let (_, found) = remove_defined_name(&xml, "Missing").unwrap();
        assert!(!found);
    }

    #[test]
    fn test_remove_external_reference() {
        let xml = remove_external_reference(WORKBOOK, "rId9").unwrap();
        assert!(!xml.contains("rId9\""));
        assert!(xml.contains("rId10"));

        // Removing the last entry drops the whole block
        let xml = remove_external_reference(&xml, "rId10").unwrap();
        assert!(!xml.contains("externalReferences"));
    }

    #[test]
    fn test_relationship_filtering() {
        let rels_xml = r#"<Relationships>
<Relationship Id="rId1" Type="http://x/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://x/externalLink" Target="externalLinks/externalLink1.xml"/>
</Relationships>"#;
        let rels = relationships(rels_xml).unwrap();
        assert_eq!(rels.len(), 2);

        let (filtered, removed) =
            remove_relationships(rels_xml, |r| r.rel_type.ends_with("/externalLink")).unwrap();
        assert_eq!(removed, 1);
        assert!(filtered.contains("rId1"));
        assert!(!filtered.contains("externalLink1"));
    }

    #[test]
    fn test_truncate_named_styles() {
        let mut styles = String::from("<styleSheet><cellStyles count=\"5\">");
        for i in 0..5 {
            styles.push_str(&format!("<cellStyle name=\"s{i}\" xfId=\"{i}\"/>"));
        }
        styles.push_str("</cellStyles></styleSheet>");

        assert_eq!(named_style_count(&styles).unwrap(), 5);

        let (truncated, removed) = truncate_named_styles(&styles, 3).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(named_style_count(&truncated).unwrap(), 3);
        assert!(truncated.contains("count=\"3\""));
        assert!(truncated.contains("s0"));
        assert!(!truncated.contains("s4"));

        let (same, removed) = truncate_named_styles(&styles, 10).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(same, styles);
    }
}
