//! SKU mapping repository for the `sku_mappings` table.

use rusqlite::{params, Row};

use super::upload_repo::{self, UploadRow};
use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    /// Child code, uppercased.
    pub code: String,
    pub master_sku: String,
    /// `FG` or `SFG`.
    pub kind: String,
}

impl MappingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            code: row.get("code")?,
            master_sku: row.get("master_sku")?,
            kind: row.get("kind")?,
        })
    }
}

/// Upserts mapping rows and records the upload, in one transaction.
/// A later row for the same code overwrites an earlier one.
pub fn upsert_batch(
    db: &Database,
    upload: &UploadRow,
    rows: &[MappingRow],
) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| {
        upload_repo::insert_on(tx, upload)?;
        let mut stmt = tx.prepare(
            "INSERT INTO sku_mappings (code, master_sku, kind, upload_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(code) DO UPDATE SET
                master_sku = excluded.master_sku,
                kind = excluded.kind,
                upload_id = excluded.upload_id,
                updated_at = excluded.updated_at",
        )?;
        for row in rows {
            stmt.execute(params![
                row.code,
                row.master_sku,
                row.kind,
                upload.id,
                upload.uploaded_at,
            ])?;
        }
        Ok(())
    })
}

pub fn list_all(db: &Database) -> Result<Vec<MappingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM sku_mappings ORDER BY code")?;
        let rows = stmt
            .query_map([], MappingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes every mapping. Returns the number removed.
pub fn delete_all(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| Ok(conn.execute("DELETE FROM sku_mappings", [])?))
}
