//! Clock-skew correction shared between the signer and the retry path
//!
//! The offset is the difference `server - local` in milliseconds. It is read on
//! every signing operation and written only after the service rejects a request
//! as too skewed. Each client owns its own offset.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct TimeOffset {
    offset_ms: AtomicI64,
}

impl TimeOffset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_millis(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    pub fn set_offset_millis(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    /// Current time as the service sees it
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::milliseconds(self.offset_millis())
    }

    /// Recompute the offset from an RFC 1123 `Date` header value.
    ///
    /// Returns the new offset, or `None` when the value cannot be parsed
    /// (the stored offset is left untouched in that case).
    pub fn adjust_from_server_date(&self, server_date: &str) -> Option<i64> {
        let server = DateTime::parse_from_rfc2822(server_date.trim()).ok()?;
        let offset = server.with_timezone(&Utc).timestamp_millis() - Utc::now().timestamp_millis();
        self.set_offset_millis(offset);
        tracing::warn!(
            server_date = %server_date,
            offset_ms = offset,
            "Adjusted time offset for clock skew"
        );
        Some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_offset_is_zero() {
        let clock = TimeOffset::new();
        assert_eq!(clock.offset_millis(), 0);
        let drift = (clock.now() - Utc::now()).num_milliseconds().abs();
        assert!(drift < 1000);
    }

    #[test]
    fn test_set_offset_shifts_now() {
        let clock = TimeOffset::new();
        clock.set_offset_millis(3_600_000);
        let ahead = (clock.now() - Utc::now()).num_seconds();
        assert!((3590..=3610).contains(&ahead));
    }

    #[test]
    fn test_adjust_from_server_date() {
        let clock = TimeOffset::new();
        let server = Utc::now() + ChronoDuration::minutes(20);
        let header = server.format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let offset = clock.adjust_from_server_date(&header).unwrap();
        // Header resolution is one second
        assert!((offset - 20 * 60 * 1000).abs() < 2000);
        assert_eq!(clock.offset_millis(), offset);
    }

    #[test]
    fn test_adjust_rejects_garbage() {
        let clock = TimeOffset::new();
        clock.set_offset_millis(42);
        assert_eq!(clock.adjust_from_server_date("not a date"), None);
        assert_eq!(clock.offset_millis(), 42);
    }
}
