//! Header row detection and column binding for order sheets.
//!
//! Each of the first [`HEADER_SCAN_ROWS`] rows is scored against the
//! [`rules::RULES`] table. The highest-scoring row wins; ties keep the
//! earliest row.

pub mod rules;

use serde::Serialize;

use crate::error::InferenceError;
use crate::order::Channel;
use crate::sheet::Grid;

pub use rules::{Confidence, Field};

/// Rows examined as header candidates.
pub const HEADER_SCAN_ROWS: usize = 10;

/// A bound quantity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub column: usize,
    pub confidence: Confidence,
}

/// Columns inferred for one order sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub header_row: usize,
    pub sku: Option<usize>,
    pub fg_qty: Option<Binding>,
    pub sfg_qty: Option<Binding>,
    pub wip_qty: Option<Binding>,
    /// Indexed by [`Channel::index`].
    pub channels: [Option<usize>; 7],
    pub fg_sku: Option<usize>,
    pub sfg_sku: Option<usize>,
    pub score: u32,
}

impl ColumnMap {
    pub fn channel(&self, channel: Channel) -> Option<usize> {
        self.channels[channel.index()]
    }

    /// Bound channel columns in priority order.
    pub fn bound_channels(&self) -> impl Iterator<Item = (Channel, usize)> + '_ {
        Channel::PRIORITY
            .iter()
            .filter_map(|&c| self.channel(c).map(|col| (c, col)))
    }

    /// True when any category quantity was bound by a low-confidence fallback.
    pub fn has_low_confidence(&self) -> bool {
        [self.fg_qty, self.sfg_qty, self.wip_qty]
            .iter()
            .flatten()
            .any(|b| b.confidence == Confidence::Low)
    }

    fn bind(&mut self, field: Field, column: usize, confidence: Confidence) {
        let binding = Some(Binding { column, confidence });
        match field {
            Field::Sku => self.sku = Some(column),
            Field::FgSku => self.fg_sku = Some(column),
            Field::SfgSku => self.sfg_sku = Some(column),
            Field::Channel(c) => self.channels[c.index()] = Some(column),
            Field::FgQty => self.fg_qty = binding,
            Field::SfgQty => self.sfg_qty = binding,
            Field::WipQty => self.wip_qty = binding,
        }
    }
}

/// Scores one candidate row. `cells` are already normalized.
pub fn score_row(header_row: usize, cells: &[String]) -> ColumnMap {
    let mut map = ColumnMap {
        header_row,
        ..ColumnMap::default()
    };

    for rule in rules::RULES {
        let hit = rule.matchers.iter().find_map(|matcher| {
            cells
                .iter()
                .position(|cell| matcher.accepts(cell))
                .map(|col| (col, matcher.confidence))
        });
        if let Some((column, confidence)) = hit {
            map.bind(rule.field, column, confidence);
            map.score += rule.score;
        }
    }

    map
}

/// Finds the header row of `grid` and binds its columns.
pub fn infer_columns(grid: &Grid) -> Result<ColumnMap, InferenceError> {
    let rows_scanned = grid.len().min(HEADER_SCAN_ROWS);
    let mut best: Option<ColumnMap> = None;

    for (i, row) in grid.rows().iter().take(rows_scanned).enumerate() {
        let cells: Vec<String> = row.iter().map(|c| c.normalized()).collect();
        let candidate = score_row(i, &cells);
        log::trace!("Header candidate row {} scored {}", i, candidate.score);

        let current = best.as_ref().map(|b| b.score).unwrap_or(0);
        if candidate.score > current {
            best = Some(candidate);
        }
    }

    match best {
        Some(map) => {
            log::debug!(
                "Header row {} selected with score {}",
                map.header_row,
                map.score
            );
            Ok(map)
        }
        None => Err(InferenceError::HeadersNotRecognized { rows_scanned }),
    }
}
