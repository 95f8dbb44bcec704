use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * 60;

/// Format a duration down to its two most significant units, e.g. "12h30m",
/// "1m1s" or "42s". Durations of a second or less render as an empty string.
pub fn format_duration(duration: Duration) -> String {
    if duration > Duration::from_secs(SECS_PER_HOUR) {
        let minutes = round_div(duration.as_millis() as u64, 60_000);
        format!("{}h{}m", minutes / 60, minutes % 60)
    } else if duration > Duration::from_secs(1) {
        let secs = round_div(duration.as_millis() as u64, 1_000);
        if secs >= SECS_PER_MINUTE {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{secs}s")
        }
    } else {
        String::new()
    }
}

/// Format a byte count with a whole-number binary unit, e.g. "117MB".
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{}{}", value.round(), UNITS[unit])
}

fn round_div(value: u64, divisor: u64) -> u64 {
    (value + divisor / 2) / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_seconds() {
        assert_eq!(format_duration(Duration::new(1, 1)), "1s");
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
    }

    #[test]
    fn it_carries_seconds_into_minutes() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m0s");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m1s");
    }

    #[test]
    fn it_truncates_hours_to_two_units() {
        let twelve_and_a_half = Duration::from_secs(12 * 3600 + 30 * 60 + 1);
        assert_eq!(format_duration(twelve_and_a_half), "12h30m");
        assert_eq!(format_duration(Duration::from_secs(36 * 3600)), "36h0m");
    }

    #[test]
    fn it_renders_subsecond_durations_as_empty() {
        assert_eq!(format_duration(Duration::from_millis(900)), "");
        assert_eq!(format_duration(Duration::from_secs(1)), "");
    }

    #[test]
    fn it_formats_bytes_with_units() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2KB");
        assert_eq!(format_bytes(123 * 1024 * 1024), "123MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3GB");
    }
}
