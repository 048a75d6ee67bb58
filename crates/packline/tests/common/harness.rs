//! Isolated store for integration tests.
//!
//! Each harness owns a temp directory with an inbox folder and a SQLite file,
//! so tests can reopen the store to check what was persisted.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use packline::{
    Category, ConcurrencyGuard, Database, IngestReport, Ingestor, LineQuery, MappingResolver,
    OrderLine, OrderStore, Workflow,
};

use super::builders::SheetBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub inbox_dir: PathBuf,
    pub db_path: PathBuf,
    pub db: Database,
    pub store: Arc<OrderStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox_dir = temp_dir.path().join("inbox");
        std::fs::create_dir_all(&inbox_dir).expect("Failed to create inbox dir");

        let db_path = temp_dir.path().join("data").join("packline.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        let store = Arc::new(OrderStore::new(db.clone(), 16).expect("Failed to open store"));

        Self {
            temp_dir,
            inbox_dir,
            db_path,
            db,
            store,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(Arc::clone(&self.store))
    }

    pub fn workflow(&self, guard: ConcurrencyGuard) -> Workflow {
        Workflow::new(Arc::clone(&self.store), guard)
    }

    pub fn resolver(&self) -> MappingResolver {
        MappingResolver::new(self.db.clone()).expect("Failed to open mapping resolver")
    }

    /// A second store over the same database file.
    pub fn reopen(&self) -> OrderStore {
        let db = Database::open(&self.db_path).expect("Failed to reopen database");
        OrderStore::new(db, 16).expect("Failed to reopen store")
    }

    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Writes `sheet` as CSV and ingests the file.
    pub fn ingest_csv(&self, filename: &str, sheet: &SheetBuilder) -> IngestReport {
        let path = self.write_input(filename, sheet.to_csv().as_bytes());
        self.ingestor()
            .ingest_file(&path)
            .expect("Failed to ingest CSV")
    }

    pub fn lines(&self, category: Category) -> Vec<OrderLine> {
        self.store
            .list(&LineQuery {
                category: Some(category),
                status: None,
            })
            .expect("Failed to list lines")
    }

    /// Lines of `sku` in `category`, in insertion order.
    pub fn lines_for(&self, category: Category, sku: &str) -> Vec<OrderLine> {
        self.lines(category)
            .into_iter()
            .filter(|l| l.sku == sku)
            .collect()
    }

    /// Units across every status.
    pub fn total_units(&self, category: Category, sku: &str) -> u64 {
        self.lines_for(category, sku)
            .iter()
            .map(|l| u64::from(l.quantity))
            .sum()
    }
}
