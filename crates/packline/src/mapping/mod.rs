//! Child-code to master-SKU lookup.
//!
//! The resolver keeps an immutable [`SkuMappingSnapshot`] per version.
//! Consumers take the snapshot by reference; a refresh swaps in a new one.

pub mod import;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::db::mapping_repo::{self, MappingRow};
use crate::db::upload_repo::{self, UploadRow};
use crate::db::Database;
use crate::error::MappingError;
use crate::sheet::Grid;

pub use import::{parse_mapping_grid, ParsedMappings, KIND_FG, KIND_SFG};

/// Child codes known for one master SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterCodes {
    pub fg: Option<String>,
    pub sfg: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SkuMappingSnapshot {
    pub version: u64,
    forward: HashMap<String, String>,
    reverse: HashMap<String, MasterCodes>,
}

impl SkuMappingSnapshot {
    pub fn from_rows(version: u64, rows: &[MappingRow]) -> Self {
        let mut forward = HashMap::with_capacity(rows.len());
        let mut reverse: HashMap<String, MasterCodes> = HashMap::new();

        for row in rows {
            forward.insert(row.code.clone(), row.master_sku.clone());
            let codes = reverse.entry(row.master_sku.clone()).or_default();
            match row.kind.as_str() {
                KIND_SFG => codes.sfg = Some(row.code.clone()),
                _ => codes.fg = Some(row.code.clone()),
            }
        }

        Self {
            version,
            forward,
            reverse,
        }
    }

    /// The mapped master for `code`, if any.
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.forward
            .get(&code.trim().to_uppercase())
            .map(String::as_str)
    }

    /// Master SKU for `code`; unmapped codes resolve to themselves.
    pub fn resolve(&self, code: &str) -> String {
        let key = code.trim().to_uppercase();
        match self.forward.get(&key) {
            Some(master) => master.clone(),
            None => key,
        }
    }

    pub fn codes_for(&self, master_sku: &str) -> Option<&MasterCodes> {
        self.reverse.get(master_sku.trim())
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

pub struct MappingResolver {
    db: Database,
    current: RwLock<Arc<SkuMappingSnapshot>>,
}

impl MappingResolver {
    pub fn new(db: Database) -> Result<Self, MappingError> {
        let rows = mapping_repo::list_all(&db)?;
        let snapshot = SkuMappingSnapshot::from_rows(0, &rows);
        Ok(Self {
            db,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn current(&self) -> Arc<SkuMappingSnapshot> {
        let guard = match self.current.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Mapping snapshot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        Arc::clone(&guard)
    }

    /// Reloads all mappings into a new snapshot version.
    pub fn refresh(&self) -> Result<Arc<SkuMappingSnapshot>, MappingError> {
        let rows = mapping_repo::list_all(&self.db)?;

        let mut guard = match self.current.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Mapping snapshot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let snapshot = Arc::new(SkuMappingSnapshot::from_rows(guard.version + 1, &rows));
        *guard = Arc::clone(&snapshot);
        log::debug!(
            "Mapping snapshot v{} loaded with {} codes",
            snapshot.version,
            snapshot.len()
        );
        Ok(snapshot)
    }

    pub fn resolve(&self, code: &str) -> String {
        self.current().resolve(code)
    }

    /// Imports a mapping sheet and its history entry in one transaction,
    /// then refreshes. Returns the number of codes written.
    pub fn import_mapping_grid(&self, file_name: &str, grid: &Grid) -> Result<usize, MappingError> {
        let parsed = parse_mapping_grid(grid)?;
        let upload = UploadRow {
            id: Uuid::new_v4().to_string(),
            kind: upload_repo::KIND_MAPPINGS.to_string(),
            file_name: file_name.to_string(),
            uploaded_at: Utc::now().to_rfc3339(),
            row_count: parsed.rows_read,
            line_count: parsed.rows.len() as u32,
        };

        mapping_repo::upsert_batch(&self.db, &upload, &parsed.rows)?;
        log::info!(
            "Imported {} mapping codes from {}",
            parsed.rows.len(),
            file_name
        );
        self.refresh()?;
        Ok(parsed.rows.len())
    }

    /// Removes every mapping and refreshes.
    pub fn clear(&self) -> Result<usize, MappingError> {
        let deleted = mapping_repo::delete_all(&self.db)?;
        log::warn!("Cleared {} SKU mappings", deleted);
        self.refresh()?;
        Ok(deleted)
    }
}
