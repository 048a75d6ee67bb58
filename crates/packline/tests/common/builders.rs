//! Builders for sheets used as test input.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use packline::Grid;

/// Rows of text cells. Cells that are all digits become numeric cells in
/// the XLSX output, the way a spreadsheet app stores them.
#[derive(Debug, Clone, Default)]
pub struct SheetBuilder {
    rows: Vec<Vec<String>>,
}

impl SheetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, cells: &[&str]) -> Self {
        self.rows
            .push(cells.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Two empty cells, so the row survives as `,` in CSV output.
    pub fn blank_row(mut self) -> Self {
        self.rows.push(vec![String::new(), String::new()]);
        self
    }

    pub fn grid(&self) -> Grid {
        Grid::from_text(self.rows.clone())
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| csv_field(c)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// A workbook holding only `xl/worksheets/sheet1.xml`, cells written
    /// as inline strings or numbers.
    pub fn to_xlsx(&self) -> Vec<u8> {
        let mut sheet_data = String::new();
        for (r, row) in self.rows.iter().enumerate() {
            sheet_data.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let reference = format!("{}{}", column_letters(c), r + 1);
                if value.chars().all(|ch| ch.is_ascii_digit()) {
                    sheet_data.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value));
                } else {
                    sheet_data.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference,
                        xml_escape(value)
                    ));
                }
            }
            sheet_data.push_str("</row>");
        }

        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            sheet_data
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "xl/worksheets/sheet1.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(sheet.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// The order sheet most integration tests start from.
///
/// Row 0 is a title, row 2 the header. `TSH-01` under-supplies its channels,
/// `POLO-02` over-supplies them. The last two rows are skipped.
pub fn dispatch_sheet() -> SheetBuilder {
    SheetBuilder::new()
        .row(&["Daily dispatch plan"])
        .blank_row()
        .row(&["Master SKU", "FG Qty", "SFG Qty", "WIP Qty", "Ajio", "Nykaa"])
        .row(&["TSH-01", "10", "2", "0", "6", "8"])
        .row(&["POLO-02", "20", "", "5", "5", "5"])
        .row(&["", "4", "4", "4", "", ""])
        .row(&["Grand Total", "30", "2", "5", "11", "13"])
}

pub fn mapping_sheet() -> SheetBuilder {
    SheetBuilder::new()
        .row(&["Master SKU", "FG SKU", "SFG SKU"])
        .row(&["TSH-01", "FG000079", "SF001130"])
        .row(&["POLO-02", "FG000080", ""])
}
