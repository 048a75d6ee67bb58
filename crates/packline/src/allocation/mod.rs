//! Turns header-bound sheet rows into order lines.
//!
//! SFG and WIP quantities become one line each. The FG quantity is spread
//! over the bound channel columns in priority order, each channel taking at
//! most what it asks for; whatever is left goes to "All Stock". Channels
//! that ask for more than remains get less or nothing, and no shortage line
//! is recorded.

mod qty;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::inference::{Binding, ColumnMap};
use crate::order::{Category, LineStatus, OrderLine, ALL_STOCK, GENERAL};
use crate::sheet::{Cell, Grid};

pub use qty::parse_qty;

/// Identity shared by every line of one ingestion batch.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub upload_id: String,
    pub created_at: DateTime<Utc>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self {
            upload_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Allocation {
    pub lines: Vec<OrderLine>,
    /// Data rows after the header.
    pub rows_considered: usize,
    /// Rows dropped for a blank SKU or a "total" label.
    pub rows_skipped: usize,
}

impl Allocation {
    pub fn units(&self, category: Category) -> u64 {
        self.lines
            .iter()
            .filter(|l| l.category == category)
            .map(|l| u64::from(l.quantity))
            .sum()
    }
}

/// Allocates every data row of `grid` below `map.header_row`.
pub fn allocate(grid: &Grid, map: &ColumnMap, batch: &BatchContext) -> Allocation {
    let mut allocation = Allocation::default();

    for (index, row) in grid.rows().iter().enumerate().skip(map.header_row + 1) {
        allocation.rows_considered += 1;

        let sku = map
            .sku
            .and_then(|col| row.get(col))
            .map(Cell::text)
            .unwrap_or_default();
        if sku.is_empty() || sku.to_lowercase().contains("total") {
            allocation.rows_skipped += 1;
            continue;
        }

        let template = LineTemplate {
            sku,
            fg_sku: text_at(row, map.fg_sku),
            sfg_sku: text_at(row, map.sfg_sku),
            source_row: index as u32,
            batch,
        };
        allocate_row(row, map, &template, &mut allocation.lines);
    }

    log::debug!(
        "Allocated {} lines from {} rows ({} skipped)",
        allocation.lines.len(),
        allocation.rows_considered,
        allocation.rows_skipped
    );
    allocation
}

fn allocate_row(row: &[Cell], map: &ColumnMap, template: &LineTemplate<'_>, out: &mut Vec<OrderLine>) {
    let sfg = qty_at(row, map.sfg_qty);
    if sfg > 0 {
        out.push(template.line(Category::SemiFinished, sfg, GENERAL));
    }

    let wip = qty_at(row, map.wip_qty);
    if wip > 0 {
        out.push(template.line(Category::Wip, wip, GENERAL));
    }

    let fg = qty_at(row, map.fg_qty);
    if fg == 0 {
        return;
    }

    let mut remaining = fg;
    for (channel, col) in map.bound_channels() {
        let demand = row.get(col).map(parse_qty).unwrap_or(0);
        if remaining > 0 && demand > 0 {
            let take = remaining.min(demand);
            out.push(template.line(Category::FinishedGoods, take, channel.label()));
            remaining -= take;
        }
    }
    if remaining > 0 {
        out.push(template.line(Category::FinishedGoods, remaining, ALL_STOCK));
    }
}

struct LineTemplate<'a> {
    sku: String,
    fg_sku: Option<String>,
    sfg_sku: Option<String>,
    source_row: u32,
    batch: &'a BatchContext,
}

impl LineTemplate<'_> {
    fn line(&self, category: Category, quantity: u32, portal: &str) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4().to_string(),
            sku: self.sku.clone(),
            category,
            quantity,
            status: LineStatus::Pending,
            portal: Some(portal.to_string()),
            fg_sku: self.fg_sku.clone(),
            sfg_sku: self.sfg_sku.clone(),
            picked_by: None,
            picked_at: None,
            created_at: self.batch.created_at,
            upload_id: self.batch.upload_id.clone(),
            source_row: self.source_row,
        }
    }
}

fn qty_at(row: &[Cell], binding: Option<Binding>) -> u32 {
    binding
        .and_then(|b| row.get(b.column))
        .map(parse_qty)
        .unwrap_or(0)
}

fn text_at(row: &[Cell], col: Option<usize>) -> Option<String> {
    col.and_then(|c| row.get(c))
        .map(Cell::text)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::infer_columns;
    use crate::order::Channel;

    fn run(rows: Vec<Vec<&str>>) -> Allocation {
        let grid = Grid::from_text(rows);
        let map = infer_columns(&grid).unwrap();
        allocate(&grid, &map, &BatchContext::new())
    }

    fn fg_portions(allocation: &Allocation) -> Vec<(String, u32)> {
        allocation
            .lines
            .iter()
            .filter(|l| l.category == Category::FinishedGoods)
            .map(|l| (l.portal.clone().unwrap_or_default(), l.quantity))
            .collect()
    }

    #[test]
    fn test_undersupply_starves_lower_priority_channel() {
        let allocation = run(vec![
            vec!["Master SKU", "Finished Goods Qty", "Ajio", "Nykaa"],
            vec!["TSH-1", "10", "6", "8"],
        ]);
        assert_eq!(
            fg_portions(&allocation),
            vec![("Ajio".to_string(), 6), ("Nykaa".to_string(), 4)]
        );
    }

    #[test]
    fn test_oversupply_goes_to_all_stock() {
        let allocation = run(vec![
            vec!["Master SKU", "Finished Goods Qty", "Flipkart", "Amazon"],
            vec!["TSH-1", "20", "5", "5"],
        ]);
        assert_eq!(
            fg_portions(&allocation),
            vec![
                ("Flipkart".to_string(), 5),
                ("Amazon".to_string(), 5),
                (ALL_STOCK.to_string(), 10)
            ]
        );
    }

    #[test]
    fn test_priority_follows_channel_order_not_column_order() {
        let allocation = run(vec![
            vec!["Master SKU", "Website", "Myntra", "Finished Goods Qty"],
            vec!["TSH-1", "5", "5", "7"],
        ]);
        assert_eq!(
            fg_portions(&allocation),
            vec![
                (Channel::Myntra.label().to_string(), 5),
                (Channel::Website.label().to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_emission_order_and_general_portal() {
        let allocation = run(vec![
            vec!["Master SKU", "Finished Goods Qty", "Semi Finished Qty", "WIP Qty", "Amazon"],
            vec!["TSH-1", "3", "2", "1", "1"],
        ]);
        let order: Vec<(Category, &str)> = allocation
            .lines
            .iter()
            .map(|l| (l.category, l.portal.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(
            order,
            vec![
                (Category::SemiFinished, GENERAL),
                (Category::Wip, GENERAL),
                (Category::FinishedGoods, "Amazon"),
                (Category::FinishedGoods, ALL_STOCK),
            ]
        );
        assert!(allocation.lines.iter().all(|l| l.status == LineStatus::Pending));
    }

    #[test]
    fn test_skip_rules() {
        let allocation = run(vec![
            vec!["Master SKU", "WIP Qty"],
            vec!["", "5"],
            vec!["Grand Total", "50"],
            vec!["SUBTOTAL", "9"],
            vec!["TSH-1", "2"],
        ]);
        assert_eq!(allocation.rows_considered, 4);
        assert_eq!(allocation.rows_skipped, 3);
        assert_eq!(allocation.lines.len(), 1);
        assert_eq!(allocation.lines[0].sku, "TSH-1");
        assert_eq!(allocation.lines[0].source_row, 4);
    }

    #[test]
    fn test_zero_and_garbage_quantities_emit_nothing() {
        let allocation = run(vec![
            vec!["Master SKU", "Finished Goods Qty", "WIP Qty"],
            vec!["TSH-1", "0", "n/a"],
        ]);
        assert!(allocation.lines.is_empty());
        assert_eq!(allocation.rows_skipped, 0);
    }

    #[test]
    fn test_cross_references_copied_to_every_line() {
        let allocation = run(vec![
            vec!["Master SKU", "FG SKU", "SFG Code", "Finished Goods Qty", "Semi Finished Qty"],
            vec![" TSH-1 ", "FG-9", "", "2", "1"],
        ]);
        assert_eq!(allocation.lines.len(), 2);
        for line in &allocation.lines {
            assert_eq!(line.sku, "TSH-1");
            assert_eq!(line.fg_sku.as_deref(), Some("FG-9"));
            assert_eq!(line.sfg_sku, None);
        }
    }

    #[test]
    fn test_lines_share_batch_identity() {
        let grid = Grid::from_text(vec![
            vec!["Master SKU", "WIP Qty"],
            vec!["A1", "1"],
            vec!["B1", "2"],
        ]);
        let map = infer_columns(&grid).unwrap();
        let batch = BatchContext::new();
        let allocation = allocate(&grid, &map, &batch);

        assert_eq!(allocation.units(Category::Wip), 3);
        assert!(allocation.lines.iter().all(|l| l.upload_id == batch.upload_id));
        assert_ne!(allocation.lines[0].id, allocation.lines[1].id);
    }
}
