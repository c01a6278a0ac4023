//! Scan export
//!
//! Reshapes stored scans into a flat workbook, re-decoding each payload into
//! its contact columns.

use qrcard_common::{Error, Result, ScanRecord};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

pub const EXPORT_SHEET: &str = "QR Scans";

pub const EXPORT_COLUMNS: [&str; 7] = [
    "ID",
    "User ID",
    "Name",
    "Email",
    "Phone",
    "Scan Time",
    "Additional Info",
];

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Build the export workbook for `scans`, in the order given
///
/// Fails with `Error::NotFound` when there is nothing to export.
pub fn export_workbook(scans: &[ScanRecord]) -> Result<Vec<u8>> {
    if scans.is_empty() {
        return Err(Error::NotFound("No data to export".to_string()));
    }

    write_workbook(scans).map_err(|e| Error::Sheet(format!("Export failed: {}", e)))
}

fn write_workbook(scans: &[ScanRecord]) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET)?;

    let header = Format::new().set_bold();
    for (col, name) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    worksheet.set_column_width(5, 20.0)?;
    worksheet.set_column_width(6, 30.0)?;

    for (index, scan) in scans.iter().enumerate() {
        let row = index as u32 + 1;
        let fields = scan.decoded().into_fields();
        worksheet.write_number(row, 0, scan.id as f64)?;
        worksheet.write_string(row, 1, &fields.id)?;
        worksheet.write_string(row, 2, &fields.name)?;
        worksheet.write_string(row, 3, &fields.email)?;
        worksheet.write_string(row, 4, &fields.phone)?;
        worksheet.write_string(row, 5, qrcard_common::time::format_export(&scan.scan_time))?;
        worksheet.write_string(row, 6, scan.additional_info.as_deref().unwrap_or_default())?;
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Data, Reader, Xlsx};
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    fn scan(id: i64, qr_data: &str, info: Option<&str>) -> ScanRecord {
        ScanRecord::from_stored(
            id,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            qr_data.to_string(),
            info.map(str::to_string),
        )
    }

    fn read_back(bytes: Vec<u8>) -> Vec<Vec<Data>> {
        let mut workbook = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(EXPORT_SHEET).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_empty_export_is_not_found() {
        assert!(matches!(export_workbook(&[]), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_export_reshapes_payloads() {
        let scans = vec![
            scan(2, "ID: 42\nName: Ann\nEmail: a@x.com\nPhone: 555", Some("desk")),
            scan(1, r#"{"id":"7","name":"Bob","email":"b@y.com","phone":"123"}"#, None),
            scan(3, "free text", None),
        ];
        let rows = read_back(export_workbook(&scans).unwrap());

        assert_eq!(rows.len(), 4);
        let header: Vec<String> = rows[0].iter().map(|c| c.to_string()).collect();
        assert_eq!(header, EXPORT_COLUMNS);

        assert_eq!(rows[1][0], Data::Float(2.0));
        assert_eq!(rows[1][1], Data::String("42".to_string()));
        assert_eq!(rows[1][2], Data::String("Ann".to_string()));
        assert_eq!(rows[1][5], Data::String("2024-05-01 12:30:00".to_string()));
        assert_eq!(rows[1][6], Data::String("desk".to_string()));

        assert_eq!(rows[2][2], Data::String("Bob".to_string()));
        assert_eq!(rows[2][4], Data::String("123".to_string()));

        // Raw payloads keep their row with empty contact columns
        assert_eq!(rows[3][0], Data::Float(3.0));
        assert_eq!(rows[3][2].to_string(), "");
    }
}
