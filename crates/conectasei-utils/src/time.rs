//! Time utilities for timestamp handling and conversions.

use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS`, the shape used in
/// `Process.links[*].last_checked`.
pub fn format_link_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
