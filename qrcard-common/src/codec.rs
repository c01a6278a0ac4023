//! Payload codec
//!
//! Turns a [`ContactRecord`] into the text stored in a QR code and turns a
//! scanned string back into [`ContactFields`]. Two encodings are produced:
//!
//! - **Text**: one `Label: value` pair per line
//! - **JSON**: a flat object with `id`, `name`, `email`, `phone`
//!
//! Decoding also accepts the older single-line form
//! `ID: 1, Name: Ann, Phone: 555, Email: a@x.com`. Anything that yields no
//! recognized label decodes to [`Decoded::Raw`] so callers can keep the text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ContactFields, ContactRecord};
use crate::{Error, Result};

const LABEL_ID: &str = "ID";
const LABEL_NAME: &str = "Name";
const LABEL_EMAIL: &str = "Email";
const LABEL_PHONE: &str = "Phone";

/// Separator between pairs in the single-line legacy payload
const LEGACY_SEPARATOR: &str = ", ";

/// Payload encoding used when generating QR codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Text => write!(f, "text"),
            PayloadFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(PayloadFormat::Text),
            "json" => Ok(PayloadFormat::Json),
            other => Err(format!("unknown payload format '{}' (expected text or json)", other)),
        }
    }
}

/// Outcome of decoding a scanned payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// At least one recognized field was found
    Parsed(ContactFields),
    /// Nothing recognizable; holds the original text unchanged
    Raw(String),
}

impl Decoded {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }

    pub fn fields(&self) -> Option<&ContactFields> {
        match self {
            Decoded::Parsed(fields) => Some(fields),
            Decoded::Raw(_) => None,
        }
    }

    /// Decoded fields, or all-empty fields for a raw payload
    pub fn into_fields(self) -> ContactFields {
        match self {
            Decoded::Parsed(fields) => fields,
            Decoded::Raw(_) => ContactFields::default(),
        }
    }
}

/// Encode a contact into a QR payload
pub fn encode(record: &ContactRecord, format: PayloadFormat) -> Result<String> {
    match format {
        PayloadFormat::Text => Ok(format!(
            "{LABEL_ID}: {}\n{LABEL_NAME}: {}\n{LABEL_EMAIL}: {}\n{LABEL_PHONE}: {}",
            record.id, record.name, record.email, record.phone
        )),
        PayloadFormat::Json => serde_json::to_string(record)
            .map_err(|e| Error::Internal(format!("Failed to encode payload: {}", e))),
    }
}

/// Decode a scanned payload
///
/// JSON is tried first when the payload looks like an object, then the
/// labelled text forms. Never fails; see [`Decoded`].
pub fn decode(payload: &str) -> Decoded {
    let trimmed = payload.trim();

    if trimmed.starts_with('{') {
        if let Some(fields) = decode_json(trimmed) {
            return Decoded::Parsed(fields);
        }
    }

    match decode_text(trimmed) {
        Some(fields) => Decoded::Parsed(fields),
        None => Decoded::Raw(payload.to_string()),
    }
}

fn decode_json(payload: &str) -> Option<ContactFields> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(payload) else {
        return None;
    };

    let mut fields = ContactFields::default();
    let mut found = false;
    for (key, slot) in [
        ("id", &mut fields.id),
        ("name", &mut fields.name),
        ("email", &mut fields.email),
        ("phone", &mut fields.phone),
    ] {
        let value = match map.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        *slot = value;
        found = true;
    }

    found.then_some(fields)
}

fn decode_text(payload: &str) -> Option<ContactFields> {
    let segments: Vec<&str> = if payload.contains('\n') {
        payload.lines().collect()
    } else {
        payload.split(LEGACY_SEPARATOR).collect()
    };

    let mut fields = ContactFields::default();
    let mut found = false;
    for segment in segments {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            LABEL_ID => &mut fields.id,
            LABEL_NAME => &mut fields.name,
            LABEL_EMAIL => &mut fields.email,
            LABEL_PHONE => &mut fields.phone,
            _ => continue,
        };
        *slot = value.trim().to_string();
        found = true;
    }

    found.then_some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> ContactRecord {
        ContactRecord::new("42", "Ann", "a@x.com", "555").unwrap()
    }

    #[test]
    fn test_encode_text_layout() {
        let payload = encode(&ann(), PayloadFormat::Text).unwrap();
        assert_eq!(payload, "ID: 42\nName: Ann\nEmail: a@x.com\nPhone: 555");
    }

    #[test]
    fn test_encode_json_layout() {
        let payload = encode(&ann(), PayloadFormat::Json).unwrap();
        assert_eq!(
            payload,
            r#"{"id":"42","name":"Ann","email":"a@x.com","phone":"555"}"#
        );
    }

    #[test]
    fn test_round_trip_both_formats() {
        let records = [
            ann(),
            ContactRecord::new("A-7", "José Ñúñez", "jose+tag@example.org", "+34 600 123 456").unwrap(),
            ContactRecord::new("x", "Colon: Name", "mailto:odd@x", "{555}").unwrap(),
        ];
        for record in records {
            for format in [PayloadFormat::Text, PayloadFormat::Json] {
                let payload = encode(&record, format).unwrap();
                assert_eq!(
                    decode(&payload),
                    Decoded::Parsed(record.clone().into()),
                    "format {format} payload {payload:?}"
                );
            }
        }
    }

    #[test]
    fn test_decode_legacy_single_line() {
        let decoded = decode("ID: 9, Name: Bob, Phone: 123, Email: b@y.com");
        let fields = decoded.fields().unwrap();
        assert_eq!(fields.id, "9");
        assert_eq!(fields.name, "Bob");
        assert_eq!(fields.phone, "123");
        assert_eq!(fields.email, "b@y.com");
    }

    #[test]
    fn test_decode_missing_labels_are_empty() {
        let decoded = decode("Name: Ann\nsomething else\nNickname: A");
        assert_eq!(
            decoded,
            Decoded::Parsed(ContactFields {
                name: "Ann".to_string(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_decode_trims_around_separator() {
        let fields = decode("  ID :   42  \r\nPhone:555  ").into_fields();
        assert_eq!(fields.id, "42");
        assert_eq!(fields.phone, "555");
    }

    #[test]
    fn test_decode_labels_are_case_sensitive() {
        assert_eq!(
            decode("id: 42\nname: Ann"),
            Decoded::Raw("id: 42\nname: Ann".to_string())
        );
    }

    #[test]
    fn test_decode_malformed_falls_back_to_raw() {
        for payload in [
            "",
            "https://example.com/some/path",
            "no separators here",
            "{not json",
            "[1, 2, 3]",
            r#"{"other": "field"}"#,
            "\u{0}\u{1}\u{2}",
            ":::",
        ] {
            assert_eq!(decode(payload), Decoded::Raw(payload.to_string()), "{payload:?}");
        }
    }

    #[test]
    fn test_decode_json_numbers_and_partial() {
        let fields = decode(r#"{"id": 42, "name": "Ann", "extra": true}"#).into_fields();
        assert_eq!(fields.id, "42");
        assert_eq!(fields.name, "Ann");
        assert_eq!(fields.email, "");
    }

    #[test]
    fn test_decode_brace_text_falls_through_to_labels() {
        let fields = decode("{ID: 1\nName: Ann").into_fields();
        assert_eq!(fields.name, "Ann");
    }

    #[test]
    fn test_payload_format_parse() {
        assert_eq!("JSON".parse::<PayloadFormat>().unwrap(), PayloadFormat::Json);
        assert_eq!("text".parse::<PayloadFormat>().unwrap(), PayloadFormat::Text);
        assert!("xml".parse::<PayloadFormat>().is_err());
    }
}
