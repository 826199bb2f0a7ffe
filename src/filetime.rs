//! Windows FILETIME (100-ns intervals since 1601-01-01 UTC) conversion.

use chrono::{DateTime, TimeZone, Utc};

/// Converts a raw FILETIME value to a UTC instant. `0` is treated as "no
/// value captured" and maps to the UNIX epoch, matching the snapshot
/// format's convention for an absent capture timestamp.
pub fn filetime_to_utc(value: u64) -> DateTime<Utc> {
    if value == 0 {
        return Utc.timestamp_opt(0, 0).single().expect("unix epoch is representable");
    }
    let epoch_1601 = Utc
        .with_ymd_and_hms(1601, 1, 1, 0, 0, 0)
        .single()
        .expect("1601-01-01 is representable");
    let micros = (value / 10) as i64;
    epoch_1601 + chrono::Duration::microseconds(micros)
}
