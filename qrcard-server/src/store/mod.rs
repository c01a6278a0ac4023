//! Record store
//!
//! Persistence for scans and the generator log. Two backends implement
//! [`RecordStore`]:
//!
//! - [`SqliteStore`]: `scans` and `generated` tables behind a `sqlx` pool
//! - [`SheetStore`]: `.xlsx` workbooks rewritten under a writer lock
//!
//! Both are append/delete-only and list rows newest first.

use std::sync::Arc;

use async_trait::async_trait;
use qrcard_common::config::{BackendKind, ServiceConfig};
use qrcard_common::{ContactRecord, Error, GeneratedRecord, NewScan, Result, ScanRecord};

mod sheet;
mod sqlite;

pub use sheet::{SheetStore, SHEET_COLUMNS};
pub use sqlite::SqliteStore;

/// Backend-agnostic persistence for scans and generated contacts
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend identifier for logs and `/health`
    fn backend_name(&self) -> &'static str;

    /// Append one scan and return the stored row
    async fn append_scan(&self, scan: NewScan) -> Result<ScanRecord>;

    /// All scans, newest first
    async fn list_scans(&self) -> Result<Vec<ScanRecord>>;

    /// Remove one scan; `Error::NotFound` leaves the store unchanged
    async fn delete_scan(&self, id: i64) -> Result<()>;

    /// Remove every scan, returning how many were removed
    async fn clear_scans(&self) -> Result<u64>;

    /// Append a generator log row
    async fn record_generated(
        &self,
        contact: ContactRecord,
        image_file: Option<String>,
    ) -> Result<GeneratedRecord>;

    /// All generator log rows, newest first
    async fn list_generated(&self) -> Result<Vec<GeneratedRecord>>;

    /// Release backend resources
    async fn close(&self) {}
}

/// Shared store handle held by the application state
pub type SharedStore = Arc<dyn RecordStore>;

/// Open the backend selected by the configuration
pub async fn open_store(config: &ServiceConfig) -> Result<SharedStore> {
    match config.backend {
        BackendKind::Sqlite => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                Error::Config("DATABASE_URL environment variable is required".to_string())
            })?;
            Ok(Arc::new(SqliteStore::connect(url).await?))
        }
        BackendKind::Sheet => Ok(Arc::new(SheetStore::open(&config.data_dir)?)),
    }
}

pub(crate) fn scan_not_found(id: i64) -> Error {
    tracing::info!("Scan {} not found", id);
    Error::NotFound("Scan not found".to_string())
}
