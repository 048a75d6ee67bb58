pub mod allocation;
pub mod config;
pub mod db;
pub mod error;
pub mod inbox;
pub mod inference;
pub mod ingest;
pub mod mapping;
pub mod order;
pub mod sanitize;
pub mod sheet;
pub mod store;
pub mod telemetry;
pub mod view;
pub mod workflow;

pub use allocation::{allocate, Allocation, BatchContext};
pub use config::{load_config, load_config_or_default, PacklineConfig};
pub use db::Database;
pub use error::{
    ConfigError, InboxError, InferenceError, MappingError, PacklineError, Result, ScanError,
    SheetError, StoreError, WorkflowError,
};
pub use inbox::{InboxOutcome, InboxWatcher};
pub use inference::{infer_columns, ColumnMap};
pub use ingest::{IngestPreview, IngestReport, Ingestor};
pub use mapping::{MappingResolver, SkuMappingSnapshot};
pub use order::{Category, Channel, LineRevision, LineStatus, OrderLine};
pub use sheet::{Cell, Grid, ReaderRegistry};
pub use store::{LineQuery, OrderSnapshot, OrderStore};
pub use view::{LocalView, ViewFilter};
pub use workflow::{Actor, ConcurrencyGuard, PickOutcome, PickRequest, Workflow};
