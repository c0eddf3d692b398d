//! Event filters for worksheet XML parts
//!
//! Row and cell positions follow the spreadsheetml convention: the `r`
//! attribute when present, positional counting when absent.

use crate::cellref::{cell_ref, parse_cell_ref};
use anyhow::Result;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::OnceLock;

use super::workbook_xml::attr_value;

/// Matches external workbook references like `[2]Sheet1!A1` in formulas
fn external_ref_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\[\d+\]").expect("valid regex"))
}

fn formula_references_link(formula: &str, link_index: Option<u32>) -> bool {
    match link_index {
        Some(idx) => formula.contains(&format!("[{}]", idx)),
        None => external_ref_re().is_match(formula),
    }
}

/// Last cell with actual content (value, formula or inline string),
/// 0-based. `None` for a sheet with no data at all.
pub fn data_extent(xml: &str) -> Result<Option<(u32, u32)>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut current_row = 0u32;
    let mut current_col = 0u32;
    let mut pending: Option<(u32, u32)> = None;
    let mut has_content = false;
    let mut extent: Option<(u32, u32)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"row" => {
                    if let Some(r) = attr_value(&e, b"r")? {
                        current_row = r.parse::<u32>()?.saturating_sub(1);
                    }
                    current_col = 0;
                }
                b"c" => {
                    let (row, col) = cell_position(&e, current_row, &mut current_col)?;
                    pending = Some((row, col));
                    has_content = false;
                }
                b"v" | b"f" | b"is" => {
                    if pending.is_some() {
                        has_content = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"row" => {
                    if let Some(r) = attr_value(&e, b"r")? {
                        current_row = r.parse::<u32>()?.saturating_sub(1);
                    }
                    current_col = 0;
                }
                b"c" => {
                    // Style-only cell, no content
                    cell_position(&e, current_row, &mut current_col)?;
                }
                b"f" => {
                    if pending.is_some() {
                        has_content = true;
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"c" => {
                    if let Some((row, col)) = pending.take()
                        && has_content
                    {
                        extent = Some(match extent {
                            Some((mr, mc)) => (mr.max(row), mc.max(col)),
                            None => (row, col),
                        });
                    }
                }
                b"row" => {
                    current_row += 1;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(extent)
}

fn cell_position(e: &BytesStart, current_row: u32, current_col: &mut u32) -> Result<(u32, u32)> {
    if let Some(r) = attr_value(e, b"r")? {
        let (row, col) = parse_cell_ref(&r).unwrap_or((current_row, *current_col));
        *current_col = col + 1;
        Ok((row, col))
    } else {
        let col = *current_col;
        *current_col += 1;
        Ok((current_row, col))
    }
}

/// Replace formulas with their cached values by dropping `<f>` elements.
///
/// With `link_index` set, only formulas referencing that external link
/// index are frozen (the package-level equivalent of breaking a link);
/// with `None`, every formula goes. Returns the rewritten XML and the
/// number of cells flattened.
pub fn flatten_formulas(xml: &str, link_index: Option<u32>) -> Result<(String, usize)> {
    let flatten_all = link_index.is_none();
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut flattened = 0usize;
    let mut dropped_shared: HashSet<String> = HashSet::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"f" => {
                let elem = e.to_owned();
                let si = attr_value(&elem, b"si")?;

                // Collect the formula text up to </f>
                let mut text = String::new();
                let mut inner = Vec::new();
                loop {
                    match reader.read_event_into(&mut inner)? {
                        Event::Text(t) => text.push_str(t.unescape()?.as_ref()),
                        Event::CData(t) => text.push_str(&String::from_utf8_lossy(t.as_ref())),
                        Event::End(end) if end.name().as_ref() == b"f" => break,
                        Event::Eof => break,
                        _ => {}
                    }
                    inner.clear();
                }

                let follower_of_dropped = si
                    .as_ref()
                    .is_some_and(|s| text.is_empty() && dropped_shared.contains(s));
                let drop = flatten_all
                    || follower_of_dropped
                    || formula_references_link(&text, link_index);

                if drop {
                    flattened += 1;
                    if let Some(s) = si {
                        dropped_shared.insert(s);
                    }
                } else {
                    writer.write_event(Event::Start(elem.borrow()))?;
                    writer.write_event(Event::Text(BytesText::new(&text)))?;
                    writer.write_event(Event::End(elem.to_end()))?;
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"f" => {
                // Shared-formula follower without its own expression
                let si = attr_value(&e, b"si")?;
                let drop =
                    flatten_all || si.as_ref().is_some_and(|s| dropped_shared.contains(s));
                if drop {
                    flattened += 1;
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
    Ok((String::from_utf8(result)?, flattened))
}

/// Delete ghost rows and trailing cells reported beyond the data extent.
///
/// Rows entirely past the last data row are dropped; cells past the last
/// data column are dropped from kept rows; the `<dimension>` element is
/// rewritten to the data extent. Returns the rewritten XML plus
/// (rows deleted, distinct ghost columns deleted).
pub fn delete_ghost_area(xml: &str) -> Result<(String, usize, usize)> {
    let Some((max_row, max_col)) = data_extent(xml)? else {
        return Ok((xml.to_string(), 0, 0));
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    let mut current_row = 0u32;
    let mut current_col = 0u32;
    let mut skip_row_depth = 0usize;
    let mut skip_cell_depth = 0usize;
    let mut rows_deleted = 0usize;
    let mut ghost_cols: HashSet<u32> = HashSet::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if skip_row_depth > 0 || skip_cell_depth > 0 {
                    if skip_row_depth > 0 {
                        skip_row_depth += 1;
                    } else {
                        skip_cell_depth += 1;
                    }
                } else {
                    match e.name().as_ref() {
                        b"row" => {
                            if let Some(r) = attr_value(&e, b"r")? {
                                current_row = r.parse::<u32>()?.saturating_sub(1);
                            }
                            current_col = 0;
                            if current_row > max_row {
                                rows_deleted += 1;
                                skip_row_depth = 1;
                            } else {
                                writer.write_event(Event::Start(e))?;
                            }
                        }
                        b"c" => {
                            let (_, col) = cell_position(&e, current_row, &mut current_col)?;
                            if col > max_col {
                                ghost_cols.insert(col);
                                skip_cell_depth = 1;
                            } else {
                                writer.write_event(Event::Start(e))?;
                            }
                        }
                        b"dimension" => {
                            writer.write_event(Event::Start(rewritten_dimension(
                                &e, max_row, max_col,
                            )))?;
                        }
                        _ => writer.write_event(Event::Start(e))?,
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if skip_row_depth > 0 || skip_cell_depth > 0 {
                    // swallowed with the enclosing element
                } else {
                    match e.name().as_ref() {
                        b"row" => {
                            if let Some(r) = attr_value(&e, b"r")? {
                                current_row = r.parse::<u32>()?.saturating_sub(1);
                            }
                            current_col = 0;
                            if current_row > max_row {
                                rows_deleted += 1;
                            } else {
                                writer.write_event(Event::Empty(e))?;
                            }
                        }
                        b"c" => {
                            let (_, col) = cell_position(&e, current_row, &mut current_col)?;
                            if col > max_col {
                                ghost_cols.insert(col);
                            } else {
                                writer.write_event(Event::Empty(e))?;
                            }
                        }
                        b"dimension" => {
                            writer.write_event(Event::Empty(rewritten_dimension(
                                &e, max_row, max_col,
                            )))?;
                        }
                        _ => writer.write_event(Event::Empty(e))?,
                    }
                }
            }
            Ok(Event::End(e)) => {
                if skip_cell_depth > 0 {
                    skip_cell_depth -= 1;
                } else if skip_row_depth > 0 {
                    skip_row_depth -= 1;
                } else {
                    if e.name().as_ref() == b"row" {
                        current_row += 1;
                    }
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => {
                if skip_row_depth == 0 && skip_cell_depth == 0 {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok((String::from_utf8(result)?, rows_deleted, ghost_cols.len()))
}

fn rewritten_dimension(original: &BytesStart, max_row: u32, max_col: u32) -> BytesStart<'static> {
    let mut elem = BytesStart::new("dimension");
    for attr in original.attributes().flatten() {
        if attr.key.as_ref() != b"ref" {
            elem.push_attribute(attr);
        }
    }
    let dim_ref = if max_row == 0 && max_col == 0 {
        "A1".to_string()
    } else {
        format!("A1:{}", cell_ref(max_row, max_col))
    };
    elem.push_attribute(("ref", dim_ref.as_str()));
    elem
}

/// Clear formatting beyond the used range: column style definitions past
/// the data extent and style-only empty cells past it. Returns the
/// rewritten XML and a count of cleared entries.
pub fn clear_trailing_formats(xml: &str) -> Result<(String, usize)> {
    let Some((max_row, max_col)) = data_extent(xml)? else {
        return Ok((xml.to_string(), 0));
    };

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    let mut current_row = 0u32;
    let mut current_col = 0u32;
    let mut cleared = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"col" => {
                    let min = attr_value(&e, b"min")?
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(1)
                        .saturating_sub(1);
                    // A missing or inverted max still describes at least
                    // the min column
                    let max = attr_value(&e, b"max")?
                        .and_then(|v| v.parse::<u32>().ok())
                        .map(|v| v.saturating_sub(1))
                        .unwrap_or(min)
                        .max(min);
                    let styled = attr_value(&e, b"style")?.is_some();
                    if styled && min > max_col {
                        cleared += (max - min + 1) as usize;
                    } else {
                        writer.write_event(Event::Empty(e))?;
                    }
                }
                b"row" => {
                    if let Some(r) = attr_value(&e, b"r")? {
                        current_row = r.parse::<u32>()?.saturating_sub(1);
                    }
                    current_col = 0;
                    writer.write_event(Event::Empty(e))?;
                }
                b"c" => {
                    let (row, col) = cell_position(&e, current_row, &mut current_col)?;
                    let styled = attr_value(&e, b"s")?.is_some();
                    if styled && (row > max_row || col > max_col) {
                        cleared += 1;
                    } else {
                        writer.write_event(Event::Empty(e))?;
                    }
                }
                _ => writer.write_event(Event::Empty(e))?,
            },
            Ok(Event::Start(e)) => {
                match e.name().as_ref() {
                    b"row" => {
                        if let Some(r) = attr_value(&e, b"r")? {
                            current_row = r.parse::<u32>()?.saturating_sub(1);
                        }
                        current_col = 0;
                    }
                    b"c" => {
                        cell_position(&e, current_row, &mut current_col)?;
                    }
                    _ => {}
                }
                writer.write_event(Event::Start(e))?;
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"row" {
                    current_row += 1;
                }
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok((String::from_utf8(result)?, cleared))
}

/// Remove the `<hyperlinks>` block; returns the count of links dropped
pub fn remove_hyperlinks(xml: &str) -> Result<(String, usize)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut in_block = false;
    let mut removed = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"hyperlinks" => in_block = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"hyperlinks" => in_block = false,
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_block && e.name().as_ref() == b"hyperlink" =>
            {
                removed += 1;
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"hyperlinks" => {}
            Ok(Event::Eof) => break,
            Ok(e) => {
                if !in_block {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok((String::from_utf8(result)?, removed))
}

/// Drop the legacy VML drawing reference left behind by deleted comments
pub fn remove_legacy_drawing(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e))
                if matches!(e.name().as_ref(), b"legacyDrawing" | b"legacyDrawingHF") => {}
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
        buf.clear();
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

/// Count comment entries in a comments or threadedComments part
pub fn count_comments(xml: &str) -> Result<usize> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut count = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if matches!(e.name().as_ref(), b"comment" | b"threadedComment") =>
            {
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
