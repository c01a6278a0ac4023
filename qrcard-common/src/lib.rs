//! # qrcard Common Library
//!
//! Shared code for the qrcard service including:
//! - Contact and scan models
//! - Payload codec (text and JSON encodings)
//! - Configuration loading
//! - Timestamp helpers

pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use codec::{decode, encode, Decoded, PayloadFormat};
pub use error::{Error, Result};
pub use models::{
    ContactFields, ContactRecord, GeneratedRecord, NewScan, ScanRecord, MAX_SCAN_DATA_CHARS,
};
