use crate::error::SheetError;
use crate::sheet::{Cell, Grid, SheetFormat, SheetReader};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Comma- or tab-separated text. No header handling: every record is a row.
pub struct DelimitedReader {
    delimiter: u8,
    format: SheetFormat,
}

impl DelimitedReader {
    pub fn csv() -> Self {
        Self {
            delimiter: b',',
            format: SheetFormat::Csv,
        }
    }

    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            format: SheetFormat::Tsv,
        }
    }
}

impl SheetReader for DelimitedReader {
    fn read(&self, bytes: &[u8]) -> Result<Grid, SheetError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::from_raw).collect());
        }

        Ok(Grid::new(rows))
    }

    fn supports(&self, format: SheetFormat) -> bool {
        format == self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_ragged_rows() {
        let data = b"Report,,\nMaster SKU,FG Qty,Amazon\nTSH-1,10\n";
        let grid = DelimitedReader::csv().read(data).unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(grid.row(2).unwrap().len(), 2);
        assert_eq!(grid.cell(1, 2).text(), "Amazon");
        assert!(grid.cell(0, 1).is_blank());
    }

    #[test]
    fn test_strips_bom() {
        let mut data = UTF8_BOM.to_vec();
        data.extend_from_slice(b"Master SKU\n");
        let grid = DelimitedReader::csv().read(&data).unwrap();
        assert_eq!(grid.cell(0, 0).text(), "Master SKU");
    }

    #[test]
    fn test_quoted_thousands_separator_kept_as_text() {
        let data = b"\"1 200\",x\n";
        let grid = DelimitedReader::csv().read(data).unwrap();
        assert_eq!(grid.cell(0, 0), &Cell::Text("1 200".to_string()));
    }

    #[test]
    fn test_tsv_delimiter() {
        let data = b"Master SKU\tWIP Qty\nA1\t3\n";
        let reader = DelimitedReader::tsv();
        assert!(reader.supports(SheetFormat::Tsv));
        assert!(!reader.supports(SheetFormat::Csv));
        let grid = reader.read(data).unwrap();
        assert_eq!(grid.cell(1, 1).text(), "3");
    }
}
