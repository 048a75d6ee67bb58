//! Order line repository: batch insert, reads, and the guarded and
//! unguarded pick writes for the `order_lines` table.

use rusqlite::{params, Connection, Row};

use super::upload_repo::{self, UploadRow};
use super::{Database, DatabaseError};

/// A raw order line row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRow {
    pub id: String,
    pub sku: String,
    pub category: String,
    pub quantity: u32,
    pub status: String,
    pub portal: Option<String>,
    pub fg_sku: Option<String>,
    pub sfg_sku: Option<String>,
    pub picked_by: Option<String>,
    pub picked_at: Option<String>,
    pub created_at: String,
    pub upload_id: String,
    pub source_row: u32,
}

impl LineRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            sku: row.get("sku")?,
            category: row.get("category")?,
            quantity: row.get("quantity")?,
            status: row.get("status")?,
            portal: row.get("portal")?,
            fg_sku: row.get("fg_sku")?,
            sfg_sku: row.get("sfg_sku")?,
            picked_by: row.get("picked_by")?,
            picked_at: row.get("picked_at")?,
            created_at: row.get("created_at")?,
            upload_id: row.get("upload_id")?,
            source_row: row.get("source_row")?,
        })
    }
}

/// Query filter for line listing. `None` fields match everything.
#[derive(Debug, Default, Clone)]
pub struct LineFilter {
    pub category: Option<String>,
    pub status: Option<String>,
}

/// Status stamp written by a pick.
#[derive(Debug, Clone)]
pub struct PickStamp<'a> {
    pub status: &'a str,
    pub picked_by: &'a str,
    pub picked_at: &'a str,
}

fn insert_on(conn: &Connection, line: &LineRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO order_lines (id, sku, category, quantity, status, portal, fg_sku, sfg_sku,
         picked_by, picked_at, created_at, upload_id, source_row)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            line.id,
            line.sku,
            line.category,
            line.quantity,
            line.status,
            line.portal,
            line.fg_sku,
            line.sfg_sku,
            line.picked_by,
            line.picked_at,
            line.created_at,
            line.upload_id,
            line.source_row,
        ],
    )?;
    Ok(())
}

/// Inserts all lines of one upload together with its history row.
/// Either everything is written or nothing is. Returns the whole table as
/// it stands after the insert.
pub fn insert_batch(
    db: &Database,
    upload: &UploadRow,
    lines: &[LineRow],
) -> Result<Vec<LineRow>, DatabaseError> {
    db.with_transaction(|tx| {
        upload_repo::insert_on(tx, upload)?;
        for line in lines {
            insert_on(tx, line)?;
        }
        list_on(tx, &LineFilter::default())
    })
}

/// Finds a line by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<LineRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM order_lines WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], LineRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists lines in insertion order.
pub fn list(db: &Database, filter: &LineFilter) -> Result<Vec<LineRow>, DatabaseError> {
    db.with_conn(|conn| list_on(conn, filter))
}

fn list_on(conn: &Connection, filter: &LineFilter) -> Result<Vec<LineRow>, DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<&dyn rusqlite::types::ToSql> = Vec::new();

    if let Some(ref category) = filter.category {
        conditions.push(format!("category = ?{}", param_values.len() + 1));
        param_values.push(category);
    }
    if let Some(ref status) = filter.status {
        conditions.push(format!("status = ?{}", param_values.len() + 1));
        param_values.push(status);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!("SELECT * FROM order_lines {} ORDER BY rowid", where_clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(param_values.as_slice(), LineRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Moves a whole line to the stamped status if it still has the observed
/// quantity and status.
///
/// Returns the whole table after the write, or `None` when no row matched
/// and nothing was written.
pub fn complete_if_unchanged(
    db: &Database,
    id: &str,
    observed_quantity: u32,
    observed_status: &str,
    stamp: &PickStamp<'_>,
) -> Result<Option<Vec<LineRow>>, DatabaseError> {
    db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE order_lines SET status = ?1, picked_by = ?2, picked_at = ?3
             WHERE id = ?4 AND quantity = ?5 AND status = ?6",
            params![
                stamp.status,
                stamp.picked_by,
                stamp.picked_at,
                id,
                observed_quantity,
                observed_status,
            ],
        )?;
        if changed != 1 {
            return Ok(None);
        }
        list_on(tx, &LineFilter::default()).map(Some)
    })
}

/// Decrements the original by `clone.quantity` and inserts `clone`, in one
/// transaction, if the original still has the observed quantity and status.
/// Returns the table after the split, or `None` when it was not applied.
pub fn split_if_unchanged(
    db: &Database,
    id: &str,
    observed_quantity: u32,
    observed_status: &str,
    clone: &LineRow,
) -> Result<Option<Vec<LineRow>>, DatabaseError> {
    db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE order_lines SET quantity = quantity - ?1
             WHERE id = ?2 AND quantity = ?3 AND status = ?4 AND quantity > ?1",
            params![clone.quantity, id, observed_quantity, observed_status],
        )?;
        if changed != 1 {
            return Ok(None);
        }
        insert_on(tx, clone)?;
        list_on(tx, &LineFilter::default()).map(Some)
    })
}

/// Writes the stamped status with no comparison. `None` means the line
/// does not exist.
pub fn overwrite_status(
    db: &Database,
    id: &str,
    stamp: &PickStamp<'_>,
) -> Result<Option<Vec<LineRow>>, DatabaseError> {
    db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE order_lines SET status = ?1, picked_by = ?2, picked_at = ?3 WHERE id = ?4",
            params![stamp.status, stamp.picked_by, stamp.picked_at, id],
        )?;
        if changed != 1 {
            return Ok(None);
        }
        list_on(tx, &LineFilter::default()).map(Some)
    })
}

/// Sets the original's quantity to an absolute value and inserts `clone`,
/// with no comparison against what is stored.
pub fn overwrite_split(
    db: &Database,
    id: &str,
    remaining_quantity: u32,
    clone: &LineRow,
) -> Result<Option<Vec<LineRow>>, DatabaseError> {
    db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE order_lines SET quantity = ?1 WHERE id = ?2",
            params![remaining_quantity, id],
        )?;
        if changed != 1 {
            return Ok(None);
        }
        insert_on(tx, clone)?;
        list_on(tx, &LineFilter::default()).map(Some)
    })
}

/// Deletes every order line. Returns the number removed.
pub fn delete_all(db: &Database) -> Result<usize, DatabaseError> {
    db.with_transaction(|tx| {
        let deleted = tx.execute("DELETE FROM order_lines", [])?;
        Ok(deleted)
    })
}
