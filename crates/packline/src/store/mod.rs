//! The shared order collection.
//!
//! Every mutation commits in SQLite and then publishes a fresh
//! [`OrderSnapshot`]. The snapshot is built from rows read inside the
//! mutation's own transaction, so once a write commits nothing can fail
//! before it is published. Mutation and publication happen under one
//! store-wide lock, so subscribers see snapshots in commit order.

pub mod snapshot;

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::allocation::BatchContext;
use crate::db::order_repo::{self, LineFilter, LineRow, PickStamp};
use crate::db::upload_repo::{self, UploadRow};
use crate::db::Database;
use crate::error::StoreError;
use crate::order::{Category, LineRevision, LineStatus, OrderLine};

pub use snapshot::{OrderSnapshot, SnapshotBroadcaster};

/// Describes the upload an insert batch came from.
#[derive(Debug, Clone)]
pub struct BatchUpload<'a> {
    pub batch: &'a BatchContext,
    pub file_name: &'a str,
    /// Data rows read from the sheet.
    pub rows_read: u32,
}

/// Optional filters for [`OrderStore::list`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LineQuery {
    pub category: Option<Category>,
    pub status: Option<LineStatus>,
}

pub struct OrderStore {
    db: Database,
    broadcaster: SnapshotBroadcaster,
    write_lock: Mutex<()>,
    current: RwLock<Arc<OrderSnapshot>>,
}

impl OrderStore {
    /// Opens the store over `db`, seeding version 0 from what is persisted.
    pub fn new(db: Database, snapshot_capacity: usize) -> Result<Self, StoreError> {
        let lines = load_lines(&db, &LineFilter::default())?;
        log::info!("Order store opened with {} lines", lines.len());
        Ok(Self {
            db,
            broadcaster: SnapshotBroadcaster::new(snapshot_capacity),
            write_lock: Mutex::new(()),
            current: RwLock::new(Arc::new(OrderSnapshot::new(0, lines))),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OrderSnapshot>> {
        self.broadcaster.subscribe()
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<OrderSnapshot> {
        let guard = match self.current.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Order store snapshot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        Arc::clone(&guard)
    }

    pub fn get(&self, id: &str) -> Result<OrderLine, StoreError> {
        match order_repo::find_by_id(&self.db, id)? {
            Some(row) => line_from_row(row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Lines in insertion order, read from the database.
    pub fn list(&self, query: &LineQuery) -> Result<Vec<OrderLine>, StoreError> {
        let filter = LineFilter {
            category: query.category.map(|c| c.as_str().to_string()),
            status: query.status.map(|s| s.as_str().to_string()),
        };
        load_lines(&self.db, &filter)
    }

    /// Inserts all lines of one upload atomically and publishes.
    pub fn insert_batch(
        &self,
        upload: &BatchUpload<'_>,
        lines: &[OrderLine],
    ) -> Result<Arc<OrderSnapshot>, StoreError> {
        for line in lines {
            validate_line(line)?;
        }
        let rows: Vec<LineRow> = lines.iter().map(line_to_row).collect();
        let history = UploadRow {
            id: upload.batch.upload_id.clone(),
            kind: upload_repo::KIND_ORDERS.to_string(),
            file_name: upload.file_name.to_string(),
            uploaded_at: format_timestamp(upload.batch.created_at),
            row_count: upload.rows_read,
            line_count: rows.len() as u32,
        };

        let _guard = self.lock_writes();
        let table = order_repo::insert_batch(&self.db, &history, &rows)?;
        log::info!(
            "Inserted {} lines from upload {}",
            rows.len(),
            upload.batch.upload_id
        );
        Ok(self.publish(table))
    }

    /// Moves a whole line to `next` if it still matches `observed`.
    pub fn complete_if_unchanged(
        &self,
        id: &str,
        observed: LineRevision,
        next: LineStatus,
        picked_by: &str,
        picked_at: DateTime<Utc>,
    ) -> Result<OrderLine, StoreError> {
        let at = format_timestamp(picked_at);
        let stamp = PickStamp {
            status: next.as_str(),
            picked_by,
            picked_at: &at,
        };

        let _guard = self.lock_writes();
        let table = order_repo::complete_if_unchanged(
            &self.db,
            id,
            observed.quantity,
            observed.status.as_str(),
            &stamp,
        )?;
        let snapshot = self.publish(self.ensure_applied(id, table)?);
        committed_line(&snapshot, id)
    }

    /// Splits `clone.quantity` off `id` if the line still matches `observed`.
    /// Returns the decremented original and the inserted clone.
    pub fn split_if_unchanged(
        &self,
        id: &str,
        observed: LineRevision,
        clone: &OrderLine,
    ) -> Result<(OrderLine, OrderLine), StoreError> {
        validate_line(clone)?;
        let row = line_to_row(clone);

        let _guard = self.lock_writes();
        let table = order_repo::split_if_unchanged(
            &self.db,
            id,
            observed.quantity,
            observed.status.as_str(),
            &row,
        )?;
        let snapshot = self.publish(self.ensure_applied(id, table)?);
        Ok((
            committed_line(&snapshot, id)?,
            committed_line(&snapshot, &clone.id)?,
        ))
    }

    /// Writes `next` with no comparison against the stored line.
    pub fn overwrite_status(
        &self,
        id: &str,
        next: LineStatus,
        picked_by: &str,
        picked_at: DateTime<Utc>,
    ) -> Result<OrderLine, StoreError> {
        let at = format_timestamp(picked_at);
        let stamp = PickStamp {
            status: next.as_str(),
            picked_by,
            picked_at: &at,
        };

        let _guard = self.lock_writes();
        let table = order_repo::overwrite_status(&self.db, id, &stamp)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let snapshot = self.publish(table);
        committed_line(&snapshot, id)
    }

    /// Sets the original's quantity to `remaining_quantity` and inserts
    /// `clone`, with no comparison against the stored line.
    pub fn overwrite_split(
        &self,
        id: &str,
        remaining_quantity: u32,
        clone: &OrderLine,
    ) -> Result<(OrderLine, OrderLine), StoreError> {
        if remaining_quantity == 0 {
            return Err(StoreError::InvalidLine {
                line_id: id.to_string(),
                reason: "remaining quantity must be positive".to_string(),
            });
        }
        validate_line(clone)?;
        let row = line_to_row(clone);

        let _guard = self.lock_writes();
        let table = order_repo::overwrite_split(&self.db, id, remaining_quantity, &row)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let snapshot = self.publish(table);
        Ok((
            committed_line(&snapshot, id)?,
            committed_line(&snapshot, &clone.id)?,
        ))
    }

    /// Deletes every line and publishes the empty snapshot.
    pub fn reset(&self) -> Result<usize, StoreError> {
        let _guard = self.lock_writes();
        let deleted = order_repo::delete_all(&self.db)?;
        log::warn!("Order store reset, {} lines deleted", deleted);
        self.publish(Vec::new());
        Ok(deleted)
    }

    /// Passes a committed table through. A conditional write that matched
    /// nothing wrote nothing; tells a changed line from a missing one.
    fn ensure_applied(
        &self,
        id: &str,
        table: Option<Vec<LineRow>>,
    ) -> Result<Vec<LineRow>, StoreError> {
        if let Some(table) = table {
            return Ok(table);
        }
        match order_repo::find_by_id(&self.db, id)? {
            Some(_) => {
                log::debug!("Conditional write on {} rejected, line changed", id);
                Err(StoreError::Conflict {
                    line_id: id.to_string(),
                })
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Publishes the committed table as the next version. Callers hold the
    /// write lock. Rows that fail to decode are logged and left out.
    fn publish(&self, table: Vec<LineRow>) -> Arc<OrderSnapshot> {
        let lines: Vec<OrderLine> = table
            .into_iter()
            .filter_map(|row| match line_from_row(row) {
                Ok(line) => Some(line),
                Err(e) => {
                    log::error!("Skipping undecodable line in snapshot: {}", e);
                    None
                }
            })
            .collect();

        let mut current = match self.current.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Order store snapshot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let snapshot = Arc::new(OrderSnapshot::new(current.version + 1, lines));
        *current = Arc::clone(&snapshot);
        drop(current);

        log::debug!(
            "Published snapshot v{} with {} lines",
            snapshot.version,
            snapshot.len()
        );
        self.broadcaster.send(Arc::clone(&snapshot));
        snapshot
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Order store write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn committed_line(snapshot: &OrderSnapshot, id: &str) -> Result<OrderLine, StoreError> {
    snapshot
        .line(id)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

fn load_lines(db: &Database, filter: &LineFilter) -> Result<Vec<OrderLine>, StoreError> {
    order_repo::list(db, filter)?
        .into_iter()
        .map(line_from_row)
        .collect()
}

fn validate_line(line: &OrderLine) -> Result<(), StoreError> {
    let reason = if line.sku.trim().is_empty() {
        Some("sku must not be empty")
    } else if line.quantity == 0 {
        Some("quantity must be positive")
    } else if line.status == LineStatus::WipProcessing && line.category != Category::Wip {
        Some("only WIP lines can be in processing")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidLine {
            line_id: line.id.clone(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_timestamp(s: &str, line_id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("Line {}: failed to parse timestamp '{}': {}", line_id, s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn line_to_row(line: &OrderLine) -> LineRow {
    LineRow {
        id: line.id.clone(),
        sku: line.sku.clone(),
        category: line.category.as_str().to_string(),
        quantity: line.quantity,
        status: line.status.as_str().to_string(),
        portal: line.portal.clone(),
        fg_sku: line.fg_sku.clone(),
        sfg_sku: line.sfg_sku.clone(),
        picked_by: line.picked_by.clone(),
        picked_at: line.picked_at.map(format_timestamp),
        created_at: format_timestamp(line.created_at),
        upload_id: line.upload_id.clone(),
        source_row: line.source_row,
    }
}

fn line_from_row(row: LineRow) -> Result<OrderLine, StoreError> {
    let category = Category::parse(&row.category).ok_or_else(|| StoreError::InvalidLine {
        line_id: row.id.clone(),
        reason: format!("unknown category '{}'", row.category),
    })?;
    let status = LineStatus::parse(&row.status).ok_or_else(|| StoreError::InvalidLine {
        line_id: row.id.clone(),
        reason: format!("unknown status '{}'", row.status),
    })?;
    let picked_at = row.picked_at.as_deref().map(|s| parse_timestamp(s, &row.id));
    let created_at = parse_timestamp(&row.created_at, &row.id);

    Ok(OrderLine {
        id: row.id,
        sku: row.sku,
        category,
        quantity: row.quantity,
        status,
        portal: row.portal,
        fg_sku: row.fg_sku,
        sfg_sku: row.sfg_sku,
        picked_by: row.picked_by,
        picked_at,
        created_at,
        upload_id: row.upload_id,
        source_row: row.source_row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::GENERAL;

    fn store() -> OrderStore {
        OrderStore::new(Database::open_in_memory().unwrap(), 16).unwrap()
    }

    fn line(id: &str, category: Category, quantity: u32, batch: &BatchContext) -> OrderLine {
        OrderLine {
            id: id.to_string(),
            sku: "TSH-1".to_string(),
            category,
            quantity,
            status: LineStatus::Pending,
            portal: Some(GENERAL.to_string()),
            fg_sku: None,
            sfg_sku: None,
            picked_by: None,
            picked_at: None,
            created_at: batch.created_at,
            upload_id: batch.upload_id.clone(),
            source_row: 1,
        }
    }

    fn seed(store: &OrderStore, lines: &[(&str, Category, u32)]) -> BatchContext {
        let batch = BatchContext::new();
        let lines: Vec<OrderLine> = lines
            .iter()
            .map(|(id, c, q)| line(id, *c, *q, &batch))
            .collect();
        let upload = BatchUpload {
            batch: &batch,
            file_name: "orders.csv",
            rows_read: 1,
        };
        store.insert_batch(&upload, &lines).unwrap();
        batch
    }

    fn pending(quantity: u32) -> LineRevision {
        LineRevision {
            quantity,
            status: LineStatus::Pending,
        }
    }

    #[test]
    fn test_insert_batch_publishes_snapshot() {
        let store = store();
        let mut rx = store.subscribe();
        assert_eq!(store.current().version, 0);

        seed(&store, &[("a", Category::Wip, 2), ("b", Category::SemiFinished, 3)]);

        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.current().version, 1);
        assert_eq!(snapshot.line("b").unwrap().quantity, 3);
    }

    #[test]
    fn test_insert_batch_rejects_zero_quantity_without_writing() {
        let store = store();
        let batch = BatchContext::new();
        let lines = vec![
            line("a", Category::Wip, 2, &batch),
            line("b", Category::Wip, 0, &batch),
        ];
        let upload = BatchUpload {
            batch: &batch,
            file_name: "orders.csv",
            rows_read: 2,
        };

        let result = store.insert_batch(&upload, &lines);
        assert!(matches!(result, Err(StoreError::InvalidLine { .. })));
        assert!(store.list(&LineQuery::default()).unwrap().is_empty());
        assert_eq!(store.current().version, 0);
    }

    #[test]
    fn test_seeded_from_existing_database() {
        let db = Database::open_in_memory().unwrap();
        let first = OrderStore::new(db.clone(), 4).unwrap();
        seed(&first, &[("a", Category::Wip, 2)]);

        let second = OrderStore::new(db, 4).unwrap();
        assert_eq!(second.current().version, 0);
        assert_eq!(second.current().len(), 1);
    }

    #[test]
    fn test_complete_if_unchanged_conflict_and_not_found() {
        let store = store();
        seed(&store, &[("a", Category::FinishedGoods, 4)]);

        let stale = store.complete_if_unchanged("a", pending(5), LineStatus::Completed, "Asha", Utc::now());
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));

        let missing = store.complete_if_unchanged("zz", pending(4), LineStatus::Completed, "Asha", Utc::now());
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        let done = store
            .complete_if_unchanged("a", pending(4), LineStatus::Completed, "Asha", Utc::now())
            .unwrap();
        assert_eq!(done.status, LineStatus::Completed);
        assert_eq!(done.picked_by.as_deref(), Some("Asha"));
        assert!(done.picked_at.is_some());
    }

    #[test]
    fn test_split_if_unchanged_preserves_total() {
        let store = store();
        let batch = seed(&store, &[("a", Category::FinishedGoods, 10)]);

        let mut clone = line("b", Category::FinishedGoods, 3, &batch);
        clone.status = LineStatus::Completed;
        let (remaining, picked) = store.split_if_unchanged("a", pending(10), &clone).unwrap();

        assert_eq!(remaining.quantity, 7);
        assert_eq!(remaining.status, LineStatus::Pending);
        assert_eq!(picked.quantity, 3);
        assert_eq!(picked.status, LineStatus::Completed);

        let snapshot = store.current();
        let total: u32 = snapshot.lines.iter().map(|l| l.quantity).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_list_filters_by_category_and_status() {
        let store = store();
        seed(&store, &[("a", Category::Wip, 2), ("b", Category::FinishedGoods, 1)]);

        let wip = store
            .list(&LineQuery {
                category: Some(Category::Wip),
                status: Some(LineStatus::Pending),
            })
            .unwrap();
        assert_eq!(wip.len(), 1);
        assert_eq!(wip[0].id, "a");
    }

    #[test]
    fn test_reset_publishes_empty_snapshot() {
        let store = store();
        seed(&store, &[("a", Category::Wip, 2)]);
        let mut rx = store.subscribe();

        assert_eq!(store.reset().unwrap(), 1);
        let snapshot = rx.try_recv().unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, 2);
    }

    #[test]
    fn test_versions_strictly_increase() {
        let store = store();
        let mut rx = store.subscribe();
        seed(&store, &[("a", Category::Wip, 5)]);
        store
            .complete_if_unchanged("a", pending(5), LineStatus::WipProcessing, "Ravi", Utc::now())
            .unwrap();
        store.reset().unwrap();

        let versions: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|s| s.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_published_snapshot_is_the_committed_table() {
        let store = store();
        let batch = seed(&store, &[("a", Category::FinishedGoods, 10), ("b", Category::Wip, 2)]);
        let mut rx = store.subscribe();

        let clone = line("c", Category::FinishedGoods, 4, &batch);
        store.split_if_unchanged("a", pending(10), &clone).unwrap();
        assert!(matches!(
            store.split_if_unchanged("a", pending(10), &line("d", Category::FinishedGoods, 1, &batch)),
            Err(StoreError::Conflict { .. })
        ));

        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.lines, store.list(&LineQuery::default()).unwrap());
        // The rejected split published nothing.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.db");
        let store = OrderStore::new(Database::open(&path).unwrap(), 4).unwrap();
        seed(&store, &[("a", Category::FinishedGoods, 4)]);
        let mut rx = store.subscribe();

        let other = rusqlite::Connection::open(&path).unwrap();
        other.execute_batch("BEGIN EXCLUSIVE;").unwrap();
        let result =
            store.complete_if_unchanged("a", pending(4), LineStatus::Completed, "Asha", Utc::now());
        assert!(matches!(result, Err(StoreError::Database(_))));
        other.execute_batch("ROLLBACK;").unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(store.current().version, 1);
        assert_eq!(store.get("a").unwrap().status, LineStatus::Pending);
    }
}
