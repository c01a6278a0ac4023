//! Timestamp utilities

use chrono::{DateTime, SubsecRound, Utc};

/// Get current UTC timestamp, truncated to the microsecond precision rows are stored with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Human-readable timestamp used in exported workbooks
pub fn format_export(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Download name for an export generated at `timestamp`
pub fn export_file_name(timestamp: &DateTime<Utc>) -> String {
    format!("qr_scans_{}.xlsx", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Parse an RFC 3339 timestamp as written to workbook cells
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_now_has_microsecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_format_export() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_export(&t), "2024-03-09 07:05:01");
        assert_eq!(export_file_name(&t), "qr_scans_20240309_070501.xlsx");
    }

    #[test]
    fn test_parse_rfc3339_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(parse_rfc3339(&t.to_rfc3339()), Some(t));
        assert_eq!(parse_rfc3339("yesterday"), None);
    }
}
