//! SQLite-backed record store
//!
//! One row per scan in `scans`, one row per generated code in `generated`.
//! Every write runs in its own transaction; an early return drops the
//! transaction and rolls it back.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use qrcard_common::{ContactRecord, Error, GeneratedRecord, NewScan, Result, ScanRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{scan_not_found, RecordStore};

/// Record store over a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url`, creating the file and tables if needed
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            // WAL allows concurrent readers with one writer
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        info!("Connected to SQLite record store");
        Ok(store)
    }

    /// Wrap an existing pool; tables are created if missing
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                qr_data TEXT NOT NULL,
                scan_time TEXT NOT NULL,
                additional_info TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scans_scan_time ON scans(scan_time)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS generated (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                image_file TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Database tables initialized (scans, generated)");
        Ok(())
    }
}

/// Fixed-width UTC text so that `ORDER BY` on the column is chronological
fn to_db_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(value: &str) -> Result<DateTime<Utc>> {
    qrcard_common::time::parse_rfc3339(value)
        .ok_or_else(|| Error::Internal(format!("Invalid timestamp in database: {}", value)))
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn append_scan(&self, scan: NewScan) -> Result<ScanRecord> {
        // The timestamp is clamped inside the INSERT, which holds the write
        // lock, so ids and scan times never disagree on insertion order
        let mut tx = self.pool.begin().await?;
        let (id, scan_time): (i64, String) = sqlx::query_as(
            "INSERT INTO scans (qr_data, scan_time, additional_info)
             SELECT ?, MAX(?, COALESCE((SELECT MAX(scan_time) FROM scans), '')), ?
             RETURNING id, scan_time",
        )
        .bind(&scan.qr_data)
        .bind(to_db_time(&qrcard_common::time::now()))
        .bind(&scan.additional_info)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(ScanRecord::from_stored(
            id,
            from_db_time(&scan_time)?,
            scan.qr_data,
            scan.additional_info,
        ))
    }

    async fn list_scans(&self) -> Result<Vec<ScanRecord>> {
        let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, qr_data, scan_time, additional_info FROM scans
             ORDER BY scan_time DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, qr_data, scan_time, additional_info)| {
                Ok(ScanRecord::from_stored(
                    id,
                    from_db_time(&scan_time)?,
                    qr_data,
                    additional_info,
                ))
            })
            .collect()
    }

    async fn delete_scan(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM scans WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(scan_not_found(id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_scans(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM scans")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted)
    }

    async fn record_generated(
        &self,
        contact: ContactRecord,
        image_file: Option<String>,
    ) -> Result<GeneratedRecord> {
        let mut tx = self.pool.begin().await?;
        let (id, created_at): (i64, String) = sqlx::query_as(
            "INSERT INTO generated (user_id, name, email, phone, image_file, created_at)
             SELECT ?, ?, ?, ?, ?, MAX(?, COALESCE((SELECT MAX(created_at) FROM generated), ''))
             RETURNING id, created_at",
        )
        .bind(&contact.id)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&image_file)
        .bind(to_db_time(&qrcard_common::time::now()))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(GeneratedRecord {
            id,
            created_at: from_db_time(&created_at)?,
            contact,
            image_file,
        })
    }

    async fn list_generated(&self) -> Result<Vec<GeneratedRecord>> {
        let rows: Vec<(i64, String, String, String, String, Option<String>, String)> =
            sqlx::query_as(
                "SELECT id, user_id, name, email, phone, image_file, created_at FROM generated
                 ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, user_id, name, email, phone, image_file, created_at)| {
                Ok(GeneratedRecord {
                    id,
                    created_at: from_db_time(&created_at)?,
                    contact: ContactRecord {
                        id: user_id,
                        name,
                        email,
                        phone,
                    },
                    image_file,
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
