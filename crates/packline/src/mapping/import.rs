//! Parsing of child-code mapping sheets.

use crate::db::mapping_repo::MappingRow;
use crate::error::MappingError;
use crate::sheet::Grid;

pub const KIND_FG: &str = "FG";
pub const KIND_SFG: &str = "SFG";

/// Mapping rows extracted from one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMappings {
    pub rows: Vec<MappingRow>,
    /// Data rows below the header.
    pub rows_read: u32,
}

#[derive(Debug, Clone, Copy)]
struct MappingColumns {
    master: usize,
    fg: Option<usize>,
    sfg: Option<usize>,
}

fn find_columns(header: &[String]) -> Option<MappingColumns> {
    let master = header.iter().position(|h| h.contains("master"))?;
    let fg = header.iter().position(|h| h.contains("fg") && h.contains("sku"));
    let sfg = header.iter().position(|h| h.contains("sf") && h.contains("sku"));
    Some(MappingColumns { master, fg, sfg })
}

/// Reads a mapping sheet. The first non-blank row is the header.
///
/// Codes are trimmed and uppercased; master SKUs are trimmed. Rows without
/// a master SKU are ignored.
pub fn parse_mapping_grid(grid: &Grid) -> Result<ParsedMappings, MappingError> {
    let header_index = grid
        .rows()
        .iter()
        .position(|row| row.iter().any(|c| !c.is_blank()))
        .ok_or(MappingError::MissingMasterColumn)?;

    let header: Vec<String> = grid.rows()[header_index]
        .iter()
        .map(|c| c.normalized())
        .collect();
    let columns = find_columns(&header).ok_or(MappingError::MissingMasterColumn)?;

    let mut parsed = ParsedMappings::default();
    for row_index in (header_index + 1)..grid.len() {
        parsed.rows_read += 1;

        let master = grid.cell(row_index, columns.master).text();
        if master.is_empty() {
            continue;
        }

        for (col, kind) in [(columns.fg, KIND_FG), (columns.sfg, KIND_SFG)] {
            let Some(col) = col else { continue };
            let code = grid.cell(row_index, col).text().to_uppercase();
            if !code.is_empty() {
                parsed.rows.push(MappingRow {
                    code,
                    master_sku: master.clone(),
                    kind: kind.to_string(),
                });
            }
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fg_and_sfg_codes() {
        let grid = Grid::from_text(vec![
            vec!["", "", ""],
            vec!["Master SKU", "FG SKU", "SFG SKU"],
            vec!["ALL004_36", "fg000079", "SF001130"],
            vec!["ALL005_42", "FG000080", ""],
            vec!["", "FG000081", "SF001132"],
        ]);
        let parsed = parse_mapping_grid(&grid).unwrap();

        assert_eq!(parsed.rows_read, 3);
        let codes: Vec<(&str, &str, &str)> = parsed
            .rows
            .iter()
            .map(|r| (r.code.as_str(), r.master_sku.as_str(), r.kind.as_str()))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("FG000079", "ALL004_36", "FG"),
                ("SF001130", "ALL004_36", "SFG"),
                ("FG000080", "ALL005_42", "FG"),
            ]
        );
    }

    #[test]
    fn test_missing_master_column() {
        let grid = Grid::from_text(vec![vec!["FG SKU", "SFG SKU"], vec!["A", "B"]]);
        assert!(matches!(
            parse_mapping_grid(&grid),
            Err(MappingError::MissingMasterColumn)
        ));
        assert!(matches!(
            parse_mapping_grid(&Grid::default()),
            Err(MappingError::MissingMasterColumn)
        ));
    }
}
