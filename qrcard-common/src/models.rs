//! Contact and scan models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{self, Decoded};
use crate::{Error, Result};

/// Contact details encoded into a QR payload
///
/// Build through [`ContactRecord::new`], which trims every field and rejects
/// empty values or values containing line breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactRecord {
    /// Validate and normalize a contact from raw user input
    pub fn new(
        id: impl AsRef<str>,
        name: impl AsRef<str>,
        email: impl AsRef<str>,
        phone: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            id: clean_field("ID", id.as_ref())?,
            name: clean_field("Name", name.as_ref())?,
            email: clean_field("Email", email.as_ref())?,
            phone: clean_field("Phone", phone.as_ref())?,
        })
    }
}

fn clean_field(label: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput("All fields are required".to_string()));
    }
    if value.contains(['\n', '\r']) {
        return Err(Error::InvalidInput(format!(
            "{} must not contain line breaks",
            label
        )));
    }
    Ok(value.to_string())
}

/// Contact fields recovered from a scanned payload
///
/// Fields whose label was missing from the payload are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactFields {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.name.is_empty() && self.email.is_empty() && self.phone.is_empty()
    }
}

impl From<ContactRecord> for ContactFields {
    fn from(record: ContactRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            phone: record.phone,
        }
    }
}

/// Largest scan payload accepted, in characters (a version 40 QR code
/// holds at most 7089 numeric characters)
pub const MAX_SCAN_DATA_CHARS: usize = 7089;

/// Largest free-text note accepted alongside a scan, in characters
pub const MAX_ADDITIONAL_INFO_CHARS: usize = 2000;

/// A scan submitted for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    /// Raw scanned text, stored verbatim
    pub qr_data: String,
    pub additional_info: Option<String>,
}

impl NewScan {
    /// Rejects missing or oversize scan data; blank additional info becomes `None`
    pub fn new(qr_data: impl Into<String>, additional_info: Option<String>) -> Result<Self> {
        let qr_data = qr_data.into();
        if qr_data.trim().is_empty() {
            return Err(Error::InvalidInput("No QR data provided".to_string()));
        }
        if qr_data.chars().count() > MAX_SCAN_DATA_CHARS {
            return Err(Error::InvalidInput(format!(
                "QR data exceeds {} characters",
                MAX_SCAN_DATA_CHARS
            )));
        }
        let additional_info = additional_info.filter(|info| !info.trim().is_empty());
        if additional_info
            .as_ref()
            .is_some_and(|info| info.chars().count() > MAX_ADDITIONAL_INFO_CHARS)
        {
            return Err(Error::InvalidInput(format!(
                "Additional info exceeds {} characters",
                MAX_ADDITIONAL_INFO_CHARS
            )));
        }
        Ok(Self {
            qr_data,
            additional_info,
        })
    }
}

/// A persisted scan row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub scan_time: DateTime<Utc>,
    pub qr_data: String,
    pub additional_info: Option<String>,
    /// Whether `qr_data` decoded into contact fields
    pub parsed: bool,
    pub fields: ContactFields,
}

impl ScanRecord {
    /// Rebuild a scan row from its stored columns, decoding the payload
    pub fn from_stored(
        id: i64,
        scan_time: DateTime<Utc>,
        qr_data: String,
        additional_info: Option<String>,
    ) -> Self {
        let decoded = codec::decode(&qr_data);
        let parsed = decoded.is_parsed();
        Self {
            id,
            scan_time,
            additional_info,
            parsed,
            fields: decoded.into_fields(),
            qr_data,
        }
    }

    pub fn decoded(&self) -> Decoded {
        codec::decode(&self.qr_data)
    }
}

/// A row of the generator log, written each time a QR code is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub contact: ContactRecord,
    /// File name of the saved image under the static directory, if any
    pub image_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_trims_fields() {
        let record = ContactRecord::new(" 42 ", "Ann ", " a@x.com", "555").unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.name, "Ann");
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.phone, "555");
    }

    #[test]
    fn test_contact_rejects_missing_field() {
        let err = ContactRecord::new("42", "", "a@x.com", "555").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg == "All fields are required"));

        assert!(ContactRecord::new("42", "Ann", "   ", "555").is_err());
    }

    #[test]
    fn test_contact_rejects_line_breaks() {
        let err = ContactRecord::new("42", "Ann\nPhone: 1", "a@x.com", "555").unwrap_err();
        assert!(err.to_string().contains("Name must not contain line breaks"));
    }

    #[test]
    fn test_new_scan_requires_data() {
        assert!(NewScan::new("", None).is_err());
        assert!(NewScan::new("  \n", None).is_err());
    }

    #[test]
    fn test_new_scan_rejects_oversize_data() {
        assert!(NewScan::new("7".repeat(MAX_SCAN_DATA_CHARS), None).is_ok());

        let err = NewScan::new("x".repeat(40_000), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = NewScan::new("x".repeat(MAX_SCAN_DATA_CHARS + 1), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = NewScan::new("ID: 1", Some("n".repeat(MAX_ADDITIONAL_INFO_CHARS + 1))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_new_scan_drops_blank_info() {
        let scan = NewScan::new("hello", Some("  ".to_string())).unwrap();
        assert_eq!(scan.additional_info, None);

        let scan = NewScan::new("hello", Some("front desk".to_string())).unwrap();
        assert_eq!(scan.additional_info.as_deref(), Some("front desk"));
    }

    #[test]
    fn test_scan_record_decodes_payload() {
        let scan = ScanRecord::from_stored(
            7,
            Utc::now(),
            "ID: 42\nName: Ann\nEmail: a@x.com\nPhone: 555".to_string(),
            None,
        );
        assert!(scan.parsed);
        assert_eq!(scan.fields.name, "Ann");

        let raw = ScanRecord::from_stored(8, Utc::now(), "just text".to_string(), None);
        assert!(!raw.parsed);
        assert!(raw.fields.is_empty());
        assert_eq!(raw.qr_data, "just text");
    }
}
