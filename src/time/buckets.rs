/// Bucket alignment on wall-clock boundaries
use chrono::{DateTime, Duration, Utc};

/// Floor `timestamp` to the nearest multiple of `width_secs` since the epoch
pub fn align_down(timestamp: DateTime<Utc>, width_secs: i64) -> DateTime<Utc> {
    let width = width_secs.max(1);
    let into_bucket = timestamp.timestamp().rem_euclid(width);
    let subsec = i64::from(timestamp.timestamp_subsec_nanos().min(999_999_999));

    timestamp - Duration::seconds(into_bucket) - Duration::nanoseconds(subsec)
}

/// Start of the 1s bucket containing `timestamp`
pub fn second_bucket(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    align_down(timestamp, 1)
}

/// Start of the 15s bucket containing `timestamp`: `floor(second / 15) * 15`
pub fn fifteen_second_bucket(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    align_down(timestamp, 15)
}
