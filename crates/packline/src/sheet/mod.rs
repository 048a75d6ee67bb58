//! Spreadsheet decoding into a raw cell grid.
//!
//! Readers make no assumption about where the header row is; they return
//! every cell they find, positioned as in the source sheet.

pub mod delimited;
pub mod xlsx;

use std::path::Path;

use crate::error::SheetError;

/// One raw cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Builds a cell from raw text, treating blank text as empty.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }

    /// Trimmed display text. Integral numbers render without a fraction.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
        }
    }

    /// Lowercase, trimmed text used for header matching.
    pub fn normalized(&self) -> String {
        self.text().to_lowercase()
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::from_raw(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A rectangular-ish grid of cells; rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Builds a grid from text rows. Handy for tests and delimited input.
    pub fn from_text<R, C, S>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|s| Cell::from_raw(s.as_ref())).collect())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell at `(row, col)`; out-of-range positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Places a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let r = &mut self.rows[row];
        if r.len() <= col {
            r.resize(col + 1, Cell::Empty);
        }
        r[col] = cell;
    }
}

/// Spreadsheet container formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Csv,
    Tsv,
}

impl SheetFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(SheetFormat::Xlsx),
            "csv" => Some(SheetFormat::Csv),
            "tsv" | "tab" => Some(SheetFormat::Tsv),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

pub trait SheetReader: Send + Sync {
    fn read(&self, bytes: &[u8]) -> Result<Grid, SheetError>;
    fn supports(&self, format: SheetFormat) -> bool;
}

pub struct ReaderRegistry {
    readers: Vec<Box<dyn SheetReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        let readers: Vec<Box<dyn SheetReader>> = vec![
            Box::new(xlsx::XlsxReader::new()),
            Box::new(delimited::DelimitedReader::csv()),
            Box::new(delimited::DelimitedReader::tsv()),
        ];
        Self { readers }
    }

    /// Reads a spreadsheet file, choosing the reader by extension.
    pub fn read_path(&self, path: &Path) -> Result<Grid, SheetError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let format = SheetFormat::from_extension(extension)
            .ok_or_else(|| SheetError::UnsupportedFormat(extension.to_string()))?;

        let bytes = std::fs::read(path).map_err(|e| SheetError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.read_bytes(format, &bytes)
    }

    pub fn read_bytes(&self, format: SheetFormat, bytes: &[u8]) -> Result<Grid, SheetError> {
        for reader in &self.readers {
            if reader.supports(format) {
                return reader.read(bytes);
            }
        }
        Err(SheetError::UnsupportedFormat(format!("{:?}", format)))
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
