use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds since the Unix epoch.
pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub fn now_unix_seconds() -> f64 {
    unix_seconds(SystemTime::now())
}

/// UTC hours, minutes and seconds of a Unix timestamp.
pub fn utc_clock(unix_seconds: f64) -> (u32, u32, u32) {
    let of_day = (unix_seconds.max(0.0) as u64) % 86_400;
    (
        (of_day / 3_600) as u32,
        ((of_day % 3_600) / 60) as u32,
        (of_day % 60) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(utc_clock(86_400.0 + 3_661.5), (1, 1, 1));
        assert_eq!(utc_clock(-5.0), (0, 0, 0));
    }

    #[test]
    fn unix_seconds_keeps_fraction() {
        let t = UNIX_EPOCH + Duration::from_millis(1_500);
        assert!((unix_seconds(t) - 1.5).abs() < 1e-9);
    }
}
