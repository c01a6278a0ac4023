//! Workbook-backed record store
//!
//! Scans live in `scanned_data.xlsx`, generated contacts in
//! `generated_data.xlsx`. Both use [`SHEET_COLUMNS`]. A missing workbook is an
//! empty store and is created on first write.
//!
//! Writes rewrite the whole workbook. They are serialized in-process by an
//! async mutex and across processes by an exclusive lock on `<file>.lock`;
//! the new workbook is written to a temporary file and renamed into place so
//! readers never see a partial file.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{DateTime, SecondsFormat, Utc};
use qrcard_common::{ContactRecord, Error, GeneratedRecord, NewScan, Result, ScanRecord};
use rust_xlsxwriter::{Format, Workbook};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{scan_not_found, RecordStore};

pub const SCANS_FILE: &str = "scanned_data.xlsx";
pub const GENERATED_FILE: &str = "generated_data.xlsx";

/// Fixed column layout shared by both workbooks
pub const SHEET_COLUMNS: [&str; 9] = [
    "Row ID",
    "Timestamp",
    "ID",
    "Name",
    "Email",
    "Phone",
    "Image Filename",
    "Scanned Data",
    "Additional Info",
];

/// One workbook row
#[derive(Debug, Clone, PartialEq)]
struct SheetRow {
    row_id: i64,
    timestamp: DateTime<Utc>,
    id: String,
    name: String,
    email: String,
    phone: String,
    image_file: String,
    scanned_data: String,
    additional_info: String,
}

impl SheetRow {
    fn cells(&self) -> [String; 9] {
        [
            self.row_id.to_string(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id.clone(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.image_file.clone(),
            self.scanned_data.clone(),
            self.additional_info.clone(),
        ]
    }

    fn into_scan(self) -> ScanRecord {
        let additional_info = Some(self.additional_info).filter(|s| !s.is_empty());
        ScanRecord::from_stored(self.row_id, self.timestamp, self.scanned_data, additional_info)
    }

    fn into_generated(self) -> GeneratedRecord {
        GeneratedRecord {
            id: self.row_id,
            created_at: self.timestamp,
            contact: ContactRecord {
                id: self.id,
                name: self.name,
                email: self.email,
                phone: self.phone,
            },
            image_file: Some(self.image_file).filter(|s| !s.is_empty()),
        }
    }
}

/// Record store over two `.xlsx` workbooks in a data directory
#[derive(Debug)]
pub struct SheetStore {
    scans_path: PathBuf,
    generated_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SheetStore {
    /// Use `data_dir` for the workbooks, creating the directory if needed
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        info!("Workbook record store in {}", data_dir.display());
        Ok(Self {
            scans_path: data_dir.join(SCANS_FILE),
            generated_path: data_dir.join(GENERATED_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub fn scans_path(&self) -> &Path {
        &self.scans_path
    }

    pub fn generated_path(&self) -> &Path {
        &self.generated_path
    }

    async fn read(&self, path: &Path) -> Result<Vec<SheetRow>> {
        let path = path.to_path_buf();
        blocking(move || read_rows(&path)).await
    }

    /// Read-modify-write one workbook under both writer locks
    ///
    /// When `change` fails nothing is written.
    async fn modify<T, F>(&self, path: &Path, sheet_name: &'static str, change: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Vec<SheetRow>) -> Result<T> + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = path.to_path_buf();
        blocking(move || {
            let _lock = FileLock::acquire(&lock_path(&path))?;
            let mut rows = read_rows(&path)?;
            let result = change(&mut rows)?;
            write_rows(&path, sheet_name, &rows)?;
            Ok(result)
        })
        .await
    }
}

/// Next identifier and timestamp for an appended row
///
/// The timestamp never precedes the last stored one.
fn next_position(rows: &[SheetRow]) -> (i64, DateTime<Utc>) {
    let row_id = rows.iter().map(|r| r.row_id).max().unwrap_or(0) + 1;
    let now = qrcard_common::time::now();
    let timestamp = rows
        .iter()
        .map(|r| r.timestamp)
        .max()
        .map_or(now, |last| last.max(now));
    (row_id, timestamp)
}

fn newest_first(rows: &mut [SheetRow]) {
    rows.sort_by(|a, b| (b.timestamp, b.row_id).cmp(&(a.timestamp, a.row_id)));
}

#[async_trait]
impl RecordStore for SheetStore {
    fn backend_name(&self) -> &'static str {
        "sheet"
    }

    async fn append_scan(&self, scan: NewScan) -> Result<ScanRecord> {
        let row = self
            .modify(&self.scans_path, "Scans", move |rows| {
                let (row_id, timestamp) = next_position(rows);
                let fields = qrcard_common::decode(&scan.qr_data).into_fields();
                let row = SheetRow {
                    row_id,
                    timestamp,
                    id: fields.id,
                    name: fields.name,
                    email: fields.email,
                    phone: fields.phone,
                    image_file: String::new(),
                    scanned_data: scan.qr_data,
                    additional_info: scan.additional_info.unwrap_or_default(),
                };
                rows.push(row.clone());
                Ok(row)
            })
            .await?;

        debug!("Appended scan row {} to {}", row.row_id, self.scans_path.display());
        Ok(row.into_scan())
    }

    async fn list_scans(&self) -> Result<Vec<ScanRecord>> {
        let mut rows = self.read(&self.scans_path).await?;
        newest_first(&mut rows);
        Ok(rows.into_iter().map(SheetRow::into_scan).collect())
    }

    async fn delete_scan(&self, id: i64) -> Result<()> {
        self.modify(&self.scans_path, "Scans", move |rows| {
            let position = rows
                .iter()
                .position(|r| r.row_id == id)
                .ok_or_else(|| scan_not_found(id))?;
            rows.remove(position);
            Ok(())
        })
        .await
    }

    async fn clear_scans(&self) -> Result<u64> {
        self.modify(&self.scans_path, "Scans", |rows| {
            let count = rows.len() as u64;
            rows.clear();
            Ok(count)
        })
        .await
    }

    async fn record_generated(
        &self,
        contact: ContactRecord,
        image_file: Option<String>,
    ) -> Result<GeneratedRecord> {
        let row = self
            .modify(&self.generated_path, "Generated", move |rows| {
                let (row_id, timestamp) = next_position(rows);
                let row = SheetRow {
                    row_id,
                    timestamp,
                    id: contact.id,
                    name: contact.name,
                    email: contact.email,
                    phone: contact.phone,
                    image_file: image_file.unwrap_or_default(),
                    scanned_data: String::new(),
                    additional_info: String::new(),
                };
                rows.push(row.clone());
                Ok(row)
            })
            .await?;

        Ok(row.into_generated())
    }

    async fn list_generated(&self) -> Result<Vec<GeneratedRecord>> {
        let mut rows = self.read(&self.generated_path).await?;
        newest_first(&mut rows);
        Ok(rows.into_iter().map(SheetRow::into_generated).collect())
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("Workbook task failed: {}", e)))?
}

fn sheet_error(path: &Path, e: impl Display) -> Error {
    Error::Sheet(format!("{}: {}", path.display(), e))
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive advisory lock on a sidecar file, released on drop
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!("Failed to release workbook lock: {}", e);
        }
    }
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => unescape_cell(s),
        Some(Data::Float(f)) if f.fract() == 0.0 => format!("{}", *f as i64),
        Some(Data::Int(i)) => i.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Undo the `_xHHHH_` escape the workbook writer applies to control
/// characters and to literal `_xHHHH_` runs (written as `_x005F_xHHHH_`)
fn unescape_cell(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("_x") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &candidate[7..];
            }
            None => {
                out.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Read every data row; a missing workbook has none
fn read_rows(path: &Path) -> Result<Vec<SheetRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| sheet_error(path, e))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| sheet_error(path, e))?,
        None => return Ok(Vec::new()),
    };

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell_text(Some(cell)).trim().to_string(), i))
        .collect();
    let column = |row: &[Data], name: &str| -> String {
        columns
            .get(name)
            .map(|&i| cell_text(row.get(i)))
            .unwrap_or_default()
    };

    let mut rows = Vec::new();
    let mut missing_ids = Vec::new();
    for line in lines {
        if line.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let timestamp = column(line, "Timestamp");
        let row = SheetRow {
            row_id: column(line, "Row ID").parse().unwrap_or(0),
            timestamp: qrcard_common::time::parse_rfc3339(&timestamp).unwrap_or_default(),
            id: column(line, "ID"),
            name: column(line, "Name"),
            email: column(line, "Email"),
            phone: column(line, "Phone"),
            image_file: column(line, "Image Filename"),
            scanned_data: column(line, "Scanned Data"),
            additional_info: column(line, "Additional Info"),
        };
        if row.row_id <= 0 {
            missing_ids.push(rows.len());
        }
        rows.push(row);
    }

    // Rows edited by hand may lack an identifier; give them fresh ones
    if !missing_ids.is_empty() {
        warn!("{} rows without Row ID in {}", missing_ids.len(), path.display());
        let mut next = rows.iter().map(|r| r.row_id).max().unwrap_or(0).max(0);
        for index in missing_ids {
            next += 1;
            rows[index].row_id = next;
        }
    }

    Ok(rows)
}

/// Write all rows to a temporary workbook and rename it over `path`
fn write_rows(path: &Path, sheet_name: &str, rows: &[SheetRow]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .map_err(|e| sheet_error(path, e))?;

    let header = Format::new().set_bold();
    for (col, name) in SHEET_COLUMNS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *name, &header)
            .map_err(|e| sheet_error(path, e))?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        worksheet
            .write_number(line, 0, row.row_id as f64)
            .map_err(|e| sheet_error(path, e))?;
        for (col, value) in row.cells().iter().enumerate().skip(1) {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(line, col as u16, value)
                .map_err(|e| sheet_error(path, e))?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    workbook.save(&tmp).map_err(|e| sheet_error(path, e))?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(row_id: i64, secs: i64) -> SheetRow {
        SheetRow {
            row_id,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            id: "42".to_string(),
            name: "Ann".to_string(),
            email: "a@x.com".to_string(),
            phone: "555".to_string(),
            image_file: String::new(),
            scanned_data: "ID: 42".to_string(),
            additional_info: String::new(),
        }
    }

    #[test]
    fn test_missing_workbook_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows = read_rows(&dir.path().join(SCANS_FILE)).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_write_then_read_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCANS_FILE);
        let mut second = row(2, 1_700_000_100);
        second.id = "007".to_string();
        second.additional_info = "lobby".to_string();
        let rows = vec![row(1, 1_700_000_000), second];

        write_rows(&path, "Scans", &rows).unwrap();
        assert!(path.exists());
        assert!(!lock_path(&path).exists());

        let back = read_rows(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_next_position_is_monotonic() {
        assert_eq!(next_position(&[]).0, 1);

        // A stored timestamp in the future pins the next one
        let future = Utc::now().timestamp() + 3600;
        let (row_id, timestamp) = next_position(&[row(3, 1_700_000_000), row(9, future)]);
        assert_eq!(row_id, 10);
        assert_eq!(timestamp.timestamp(), future);
    }

    #[test]
    fn test_newest_first_breaks_ties_by_id() {
        let mut rows = vec![row(1, 100), row(3, 200), row(2, 200)];
        newest_first(&mut rows);
        let ids: Vec<i64> = rows.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_unescape_cell() {
        assert_eq!(unescape_cell("ID: 1_x000D_\nName: A"), "ID: 1\r\nName: A");
        assert_eq!(unescape_cell("a_x0001_b"), "a\u{1}b");
        assert_eq!(unescape_cell("lit _x005F_x0041_ x"), "lit _x0041_ x");
        // Not an escape: left alone
        assert_eq!(unescape_cell("snake_x_case _x12_ _xZZZZ_ _x0041"), "snake_x_case _x12_ _xZZZZ_ _x0041");
        assert_eq!(unescape_cell("Ñúñez_x"), "Ñúñez_x");
    }

    #[test]
    fn test_control_characters_survive_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCANS_FILE);
        let mut rows = Vec::new();
        for (n, data) in ["ID: 1\r\nName: A", "a\u{1}b", "lit _x0041_ x"].iter().enumerate() {
            let mut r = row(n as i64 + 1, 1_700_000_000);
            r.scanned_data = data.to_string();
            rows.push(r);
        }

        write_rows(&path, "Scans", &rows).unwrap();
        assert_eq!(read_rows(&path).unwrap(), rows);
    }

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/data/scanned_data.xlsx")),
            PathBuf::from("/data/scanned_data.xlsx.lock")
        );
    }
}
