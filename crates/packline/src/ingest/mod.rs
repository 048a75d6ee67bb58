//! Upload ingestion: sheet file to persisted order lines.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::allocation::{self, Allocation, BatchContext};
use crate::error::Result;
use crate::inference::{self, Binding, ColumnMap};
use crate::order::{Category, OrderLine};
use crate::sanitize;
use crate::sheet::{Grid, ReaderRegistry};
use crate::store::{BatchUpload, OrderStore};

/// Units allocated per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUnits {
    pub finished_goods: u64,
    pub semi_finished: u64,
    pub wip: u64,
}

impl CategoryUnits {
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::FinishedGoods => self.finished_goods,
            Category::SemiFinished => self.semi_finished,
            Category::Wip => self.wip,
        }
    }

    pub fn total(&self) -> u64 {
        self.finished_goods + self.semi_finished + self.wip
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub upload_id: String,
    pub file_name: String,
    pub header_row: usize,
    pub header_score: u32,
    /// A quantity column was bound without a quantity keyword.
    pub low_confidence: bool,
    pub rows_considered: usize,
    pub rows_skipped: usize,
    pub lines_written: usize,
    pub units: CategoryUnits,
    pub snapshot_version: u64,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Upload {} ({})", self.upload_id, self.file_name)?;
        writeln!(
            f,
            "  header row {} (score {}{})",
            self.header_row,
            self.header_score,
            if self.low_confidence {
                ", low confidence"
            } else {
                ""
            }
        )?;
        writeln!(
            f,
            "  rows: {} read, {} skipped",
            self.rows_considered, self.rows_skipped
        )?;
        write!(
            f,
            "  lines: {} written; units FG {} / SFG {} / WIP {}",
            self.lines_written, self.units.finished_goods, self.units.semi_finished, self.units.wip
        )
    }
}

/// One bound column, with the header text it was matched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnBinding {
    pub field: String,
    pub column: usize,
    pub header: String,
    pub low_confidence: bool,
}

/// What an upload would write, computed without touching the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPreview {
    pub file_name: String,
    pub header_row: usize,
    pub header_score: u32,
    pub columns: Vec<ColumnBinding>,
    pub rows_considered: usize,
    pub rows_skipped: usize,
    pub units: CategoryUnits,
    pub lines: Vec<OrderLine>,
}

impl IngestPreview {
    fn new(file_name: &str, grid: &Grid, columns: &ColumnMap, allocation: Allocation) -> Self {
        let header = |column: usize| grid.cell(columns.header_row, column).text();
        let mut bound = Vec::new();
        let mut push = |field: &str, column: usize, low_confidence: bool| {
            bound.push(ColumnBinding {
                field: field.to_string(),
                column,
                header: header(column),
                low_confidence,
            });
        };

        if let Some(col) = columns.sku {
            push("Master SKU", col, false);
        }
        for (field, binding) in [
            ("FG qty", columns.fg_qty),
            ("SFG qty", columns.sfg_qty),
            ("WIP qty", columns.wip_qty),
        ] {
            if let Some(Binding { column, confidence }) = binding {
                push(field, column, confidence == inference::Confidence::Low);
            }
        }
        for (channel, col) in columns.bound_channels() {
            push(channel.label(), col, false);
        }
        if let Some(col) = columns.fg_sku {
            push("FG code", col, false);
        }
        if let Some(col) = columns.sfg_sku {
            push("SFG code", col, false);
        }

        Self {
            file_name: file_name.to_string(),
            header_row: columns.header_row,
            header_score: columns.score,
            columns: bound,
            rows_considered: allocation.rows_considered,
            rows_skipped: allocation.rows_skipped,
            units: units_of(&allocation),
            lines: allocation.lines,
        }
    }
}

impl std::fmt::Display for IngestPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Preview of {} (nothing written)", self.file_name)?;
        writeln!(
            f,
            "  header row {} (score {})",
            self.header_row, self.header_score
        )?;
        for binding in &self.columns {
            writeln!(
                f,
                "  {:<10} column {} \"{}\"{}",
                binding.field,
                binding.column + 1,
                binding.header,
                if binding.low_confidence {
                    " (low confidence)"
                } else {
                    ""
                }
            )?;
        }
        writeln!(
            f,
            "  rows: {} read, {} skipped",
            self.rows_considered, self.rows_skipped
        )?;
        write!(
            f,
            "  lines: {} to write; units FG {} / SFG {} / WIP {}",
            self.lines.len(),
            self.units.finished_goods,
            self.units.semi_finished,
            self.units.wip
        )
    }
}

pub struct Ingestor {
    store: Arc<OrderStore>,
    readers: ReaderRegistry,
}

impl Ingestor {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self {
            store,
            readers: ReaderRegistry::new(),
        }
    }

    /// Reads, infers, allocates and stores one sheet file.
    pub fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let file_name = sanitize::redact_path(path);
        let _span = info_span!("ingest_file",
            file = %file_name,
            path_hash = %sanitize::hash_path(path),
        )
        .entered();

        let grid = {
            let _step = info_span!("read_sheet").entered();
            let grid = self.readers.read_path(path)?;
            debug!(rows = grid.len(), "Sheet decoded");
            grid
        };

        self.ingest_grid(&file_name, &grid)
    }

    /// Reads, infers and allocates one sheet file without storing anything.
    pub fn preview_file(&self, path: &Path) -> Result<IngestPreview> {
        let file_name = sanitize::redact_path(path);
        let _span = info_span!("preview_file", file = %file_name).entered();
        let grid = self.readers.read_path(path)?;
        self.preview_grid(&file_name, &grid)
    }

    pub fn preview_grid(&self, file_name: &str, grid: &Grid) -> Result<IngestPreview> {
        let batch = BatchContext::new();
        let (columns, allocation) = self.plan(grid, &batch)?;
        debug!(lines = allocation.lines.len(), "Upload previewed");
        Ok(IngestPreview::new(file_name, grid, &columns, allocation))
    }

    /// Infers, allocates and stores an already decoded grid.
    pub fn ingest_grid(&self, file_name: &str, grid: &Grid) -> Result<IngestReport> {
        let batch = BatchContext::new();
        let _span = info_span!("ingest", upload_id = %batch.upload_id, file = %file_name).entered();

        let (columns, allocation) = self.plan(grid, &batch)?;

        let snapshot = {
            let _step = info_span!("store_batch", lines = allocation.lines.len()).entered();
            let upload = BatchUpload {
                batch: &batch,
                file_name,
                rows_read: allocation.rows_considered as u32,
            };
            self.store.insert_batch(&upload, &allocation.lines)?
        };

        if allocation.lines.is_empty() {
            warn!("Headers recognized but no quantities allocated");
        }

        let report = IngestReport {
            upload_id: batch.upload_id.clone(),
            file_name: file_name.to_string(),
            header_row: columns.header_row,
            header_score: columns.score,
            low_confidence: columns.has_low_confidence(),
            rows_considered: allocation.rows_considered,
            rows_skipped: allocation.rows_skipped,
            lines_written: allocation.lines.len(),
            units: units_of(&allocation),
            snapshot_version: snapshot.version,
        };
        info!(
            lines = report.lines_written,
            skipped = report.rows_skipped,
            "Upload ingested"
        );
        Ok(report)
    }

    fn plan(&self, grid: &Grid, batch: &BatchContext) -> Result<(ColumnMap, Allocation)> {
        let columns = {
            let _step = info_span!("infer_columns").entered();
            let columns = inference::infer_columns(grid)?;
            if columns.has_low_confidence() {
                warn!(header_row = columns.header_row, "Quantity column bound by fallback");
            }
            columns
        };

        let allocation = {
            let _step = info_span!("allocate").entered();
            allocation::allocate(grid, &columns, batch)
        };

        Ok((columns, allocation))
    }
}

fn units_of(allocation: &Allocation) -> CategoryUnits {
    CategoryUnits {
        finished_goods: allocation.units(Category::FinishedGoods),
        semi_finished: allocation.units(Category::SemiFinished),
        wip: allocation.units(Category::Wip),
    }
}
