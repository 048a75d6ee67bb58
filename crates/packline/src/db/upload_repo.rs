//! Upload history: one row per ingested order sheet or mapping sheet.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

pub const KIND_ORDERS: &str = "ORDERS";
pub const KIND_MAPPINGS: &str = "MAPPINGS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRow {
    pub id: String,
    pub kind: String,
    pub file_name: String,
    pub uploaded_at: String,
    /// Data rows read from the sheet (after the header).
    pub row_count: u32,
    /// Order lines or mapping codes written.
    pub line_count: u32,
}

impl UploadRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            file_name: row.get("file_name")?,
            uploaded_at: row.get("uploaded_at")?,
            row_count: row.get("row_count")?,
            line_count: row.get("line_count")?,
        })
    }
}

/// Inserts an upload row on an open connection or transaction.
pub(crate) fn insert_on(conn: &Connection, upload: &UploadRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO upload_history (id, kind, file_name, uploaded_at, row_count, line_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            upload.id,
            upload.kind,
            upload.file_name,
            upload.uploaded_at,
            upload.row_count,
            upload.line_count,
        ],
    )?;
    Ok(())
}

/// Most recent uploads first.
pub fn list_recent(db: &Database, limit: u32) -> Result<Vec<UploadRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM upload_history ORDER BY uploaded_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], UploadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
