//! Minimal XLSX reader: shared strings plus the first worksheet.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::SheetError;
use crate::sheet::{Cell, Grid, SheetFormat, SheetReader};

const FALLBACK_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Worksheet size limits of the format.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

pub struct XlsxReader;

impl XlsxReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XlsxReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetReader for XlsxReader {
    fn read(&self, bytes: &[u8]) -> Result<Grid, SheetError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SheetError::Xlsx(format!("Failed to open workbook: {}", e)))?;

        let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        let sheet_path = first_sheet_path(&mut archive)?;
        let sheet_xml = read_entry(&mut archive, &sheet_path)?.ok_or(SheetError::MissingWorksheet)?;

        parse_sheet(&sheet_xml, &shared)
    }

    fn supports(&self, format: SheetFormat) -> bool {
        matches!(format, SheetFormat::Xlsx)
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, SheetError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(SheetError::Xlsx(format!("Failed to open {}: {}", name, e))),
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| SheetError::Xlsx(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

/// Resolves the first `<sheet>` of the workbook through its relationship id.
fn first_sheet_path<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<String, SheetError> {
    let workbook = read_entry(archive, "xl/workbook.xml")?;
    let rels = read_entry(archive, "xl/_rels/workbook.xml.rels")?;

    let (Some(workbook), Some(rels)) = (workbook, rels) else {
        return Ok(FALLBACK_SHEET.to_string());
    };

    let Some(rel_id) = first_sheet_rel_id(&workbook)? else {
        return Ok(FALLBACK_SHEET.to_string());
    };

    Ok(relationship_target(&rels, &rel_id)?
        .map(|target| normalize_target(&target))
        .unwrap_or_else(|| FALLBACK_SHEET.to_string()))
}

fn first_sheet_rel_id(xml: &str) -> Result<Option<String>, SheetError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"sheet" => {
                return Ok(attribute(e, b"id"));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error("workbook.xml", e)),
            _ => {}
        }
    }
}

fn relationship_target(xml: &str, rel_id: &str) -> Result<Option<String>, SheetError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attribute(e, b"Id").as_deref() == Some(rel_id) {
                    return Ok(attribute(e, b"Target"));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error("workbook.xml.rels", e)),
            _ => {}
        }
    }
}

fn normalize_target(target: &str) -> String {
    let target = target.trim_start_matches('/');
    if target.starts_with("xl/") {
        target.to_string()
    } else {
        format!("xl/{}", target)
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, SheetError> {
    let mut reader = Reader::from_str(xml);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs carry reading hints, not cell content.
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(ref e)) if in_text && !in_phonetic => {
                current.push_str(&decode_text(e));
            }
            Ok(Event::GeneralRef(ref r)) if in_text && !in_phonetic => {
                push_entity(&mut current, &String::from_utf8_lossy(r));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("sharedStrings.xml", e)),
            _ => {}
        }
    }

    Ok(strings)
}

#[derive(Default)]
struct PendingCell {
    reference: Option<String>,
    kind: Option<String>,
    value: String,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Grid, SheetError> {
    let mut reader = Reader::from_str(xml);
    let mut grid = Grid::default();

    let mut row_index: usize = 0;
    let mut next_col: usize = 0;
    let mut rows_seen = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_index = row_number(e)?.unwrap_or(rows_seen);
                    rows_seen = row_index + 1;
                    next_col = 0;
                }
                b"c" => {
                    cell = Some(PendingCell {
                        reference: attribute(e, b"r"),
                        kind: attribute(e, b"t"),
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_index = row_number(e)?.unwrap_or(rows_seen);
                    rows_seen = row_index + 1;
                }
                b"c" => {
                    let position = match attribute(e, b"r") {
                        Some(r) => cell_position(&r)?,
                        None => None,
                    };
                    next_col = position.map(|(_, col)| col + 1).unwrap_or(next_col + 1);
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&decode_text(e));
                }
            }
            Ok(Event::GeneralRef(ref r)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    push_entity(&mut c.value, &String::from_utf8_lossy(r));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let position = match pending.reference.as_deref() {
                            Some(r) => cell_position(r)?,
                            None => None,
                        };
                        let (row, col) = position.unwrap_or((row_index, next_col));
                        check_bounds(row, col)?;
                        next_col = col + 1;
                        let value = convert_cell(&pending, shared);
                        if !value.is_blank() {
                            grid.set(row, col, value);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("worksheet", e)),
            _ => {}
        }
    }

    Ok(grid)
}

fn convert_cell(cell: &PendingCell, shared: &[String]) -> Cell {
    let raw = cell.value.as_str();
    match cell.kind.as_deref() {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .map(|s| Cell::from_raw(s))
            .unwrap_or(Cell::Empty),
        Some("inlineStr") | Some("str") | Some("e") => Cell::from_raw(raw),
        Some("b") => Cell::Text(if raw.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()),
        _ => match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::from_raw(raw),
        },
    }
}

/// Zero-based row index from a `<row r="..">` attribute.
fn row_number(e: &BytesStart<'_>) -> Result<Option<usize>, SheetError> {
    let Some(raw) = attribute(e, b"r") else {
        return Ok(None);
    };
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match digits.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(n) if n <= MAX_ROWS => Ok(Some(n - 1)),
        _ => Err(SheetError::Xlsx(format!("Row number {} out of range", digits))),
    }
}

/// Position of a cell reference. Unparsable references are `None`;
/// references past the worksheet limits are an error.
fn cell_position(reference: &str) -> Result<Option<(usize, usize)>, SheetError> {
    let Some(parsed) = parse_cell_ref(reference) else {
        if looks_like_cell_ref(reference) {
            return Err(out_of_range(reference));
        }
        return Ok(None);
    };
    match parsed {
        (row, col) if row < MAX_ROWS && col < MAX_COLUMNS => Ok(Some((row, col))),
        _ => Err(out_of_range(reference)),
    }
}

/// Letters followed by digits; true for references whose numbers overflow.
fn looks_like_cell_ref(reference: &str) -> bool {
    let reference = reference.trim().replace('$', "");
    let letters = reference.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    letters > 0
        && reference.len() > letters
        && reference[letters..].chars().all(|c| c.is_ascii_digit())
}

fn check_bounds(row: usize, col: usize) -> Result<(), SheetError> {
    if row < MAX_ROWS && col < MAX_COLUMNS {
        Ok(())
    } else {
        Err(SheetError::Xlsx(format!(
            "Cell at row {}, column {} out of range",
            row + 1,
            col + 1
        )))
    }
}

fn out_of_range(reference: &str) -> SheetError {
    SheetError::Xlsx(format!("Cell reference {} out of range", reference.trim()))
}

/// Parses an A1-style reference into zero-based `(row, col)`.
pub(crate) fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim().trim_start_matches('$');
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let letters = letters.trim_end_matches('$');
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: usize = 0;
    for c in letters.chars() {
        let v = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(v)?;
    }
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn decode_text(text: &[u8]) -> String {
    let raw = String::from_utf8_lossy(text);
    match quick_xml::escape::unescape(&raw) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

fn push_entity(out: &mut String, name: &str) {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name
            .strip_prefix("#x")
            .or_else(|| name.strip_prefix("#X"))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
            .and_then(char::from_u32),
    };
    match resolved {
        Some(c) => out.push(c),
        None => {
            out.push('&');
            out.push_str(name);
            out.push(';');
        }
    }
}

fn xml_error(part: &str, e: quick_xml::Error) -> SheetError {
    SheetError::Xlsx(format!("XML parsing error in {}: {}", part, e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Builds an in-memory workbook with one sheet and a shared-string table.
    pub(crate) fn build_workbook(shared: &[&str], sheet_rows: &str) -> Vec<u8> {
        let mut sst = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
        for s in shared {
            sst.push_str(&format!("<si><t>{}</t></si>", s));
        }
        sst.push_str("</sst>");

        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            sheet_rows
        );
        let workbook = r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Orders" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/orders.xml"/></Relationships>"#;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in [
            ("xl/workbook.xml", workbook.to_string()),
            ("xl/_rels/workbook.xml.rels", rels.to_string()),
            ("xl/sharedStrings.xml", sst),
            ("xl/worksheets/orders.xml", sheet),
        ] {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("C12"), Some((11, 2)));
        assert_eq!(parse_cell_ref("AA3"), Some((2, 26)));
        assert_eq!(parse_cell_ref("$B$2"), Some((1, 1)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A0"), None);
    }

    #[test]
    fn test_reads_shared_and_numeric_cells() {
        let rows = r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>15</v></c></row>"#;
        let bytes = build_workbook(&["Master SKU", "FG Qty", "TSH-1"], rows);

        let grid = XlsxReader::new().read(&bytes).unwrap();
        assert_eq!(grid.cell(0, 0).text(), "Master SKU");
        assert!(grid.cell(0, 1).is_blank());
        assert_eq!(grid.cell(0, 2).text(), "FG Qty");
        assert_eq!(grid.cell(1, 2), &Cell::Number(15.0));
    }

    #[test]
    fn test_reads_inline_and_boolean_cells() {
        let rows = r#"<row r="3"><c r="B3" t="inlineStr"><is><t>Tom &amp; Co</t></is></c><c r="C3" t="b"><v>1</v></c></row>"#;
        let bytes = build_workbook(&[], rows);

        let grid = XlsxReader::new().read(&bytes).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.cell(2, 1).text(), "Tom & Co");
        assert_eq!(grid.cell(2, 2).text(), "TRUE");
    }

    #[test]
    fn test_cells_without_reference_are_sequential() {
        let rows = r#"<row><c t="s"><v>0</v></c><c><v>7</v></c></row>"#;
        let bytes = build_workbook(&["WIP Qty"], rows);

        let grid = XlsxReader::new().read(&bytes).unwrap();
        assert_eq!(grid.cell(0, 0).text(), "WIP Qty");
        assert_eq!(grid.cell(0, 1), &Cell::Number(7.0));
    }

    #[test]
    fn test_shared_strings_skip_phonetic_runs() {
        let xml = r#"<sst><si><r><t>Semi </t></r><r><t>Finished</t></r><rPh><t>x</t></rPh></si><si/></sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["Semi Finished".to_string(), String::new()]);
    }

    #[test]
    fn test_out_of_range_references_are_rejected() {
        for rows in [
            r#"<row r="1"><c r="ZZZZZZZZZZZZ1" t="s"><v>0</v></c></row>"#,
            r#"<row r="1"><c r="XFE1" t="s"><v>0</v></c></row>"#,
            r#"<row r="1"><c r="A1048577" t="s"><v>0</v></c></row>"#,
            r#"<row r="99999999999999999999"><c t="s"><v>0</v></c></row>"#,
            r#"<row r="2000000"><c t="s"><v>0</v></c></row>"#,
        ] {
            let bytes = build_workbook(&["Master SKU"], rows);
            let result = XlsxReader::new().read(&bytes);
            assert!(matches!(result, Err(SheetError::Xlsx(_))), "{}", rows);
        }
    }

    #[test]
    fn test_last_cell_of_the_sheet_is_accepted() {
        assert_eq!(cell_position("XFD1048576").unwrap(), Some((1_048_575, 16_383)));
        assert_eq!(cell_position("not a ref").unwrap(), None);
    }

    #[test]
    fn test_not_a_zip_is_error() {
        let result = XlsxReader::new().read(b"plain text");
        assert!(matches!(result, Err(SheetError::Xlsx(_))));
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("worksheets/s.xml"), "xl/worksheets/s.xml");
        assert_eq!(normalize_target("/xl/worksheets/s.xml"), "xl/worksheets/s.xml");
    }
}
