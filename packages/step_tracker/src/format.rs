//! Human-readable formatting of measured values.

use std::time::Duration;

const BYTE_UNITS: [&str; 3] = ["KB", "MB", "GB"];
const BYTES_PER_UNIT: f64 = 1024.0;

/// Formats a duration as seconds with two decimal places, e.g. `1.50 s`.
pub(crate) fn seconds(duration: Duration) -> String {
    format!("{:.2} s", duration.as_secs_f64())
}

/// Formats a signed byte count using base-1024 units, e.g. `-1.50 MB`.
///
/// The largest unit in which the magnitude, rounded to two decimal places, is at least 1
/// is used. Magnitudes below 1024 are shown in plain bytes.
pub(crate) fn bytes(value: i64) -> String {
    let magnitude = value.unsigned_abs();
    let sign = if value < 0 { "-" } else { "" };

    if magnitude < 1024 {
        return format!("{value} B");
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "two decimal places of a large unit do not need the full precision"
    )]
    let mut scaled = magnitude as f64 / BYTES_PER_UNIT;
    let mut unit = BYTE_UNITS[0];

    for &next_unit in BYTE_UNITS.iter().skip(1) {
        // Compared after rounding, as the value is displayed.
        if round_to_hundredths(scaled) < BYTES_PER_UNIT {
            break;
        }

        scaled /= BYTES_PER_UNIT;
        unit = next_unit;
    }

    format!("{sign}{scaled:.2} {unit}")
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats an optional byte count, using `n/a` when the measurement is unavailable.
pub(crate) fn optional_bytes(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), bytes)
}
