//! Small presentation helpers: relative timestamps and count abbreviation.

/// Render a Unix-seconds timestamp relative to `now` ("5 minutes ago").
pub fn format_time_ago(created: i64, now: i64) -> String {
    let diff = now.saturating_sub(created);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3_600 {
        plural(diff / 60, "minute")
    } else if diff < 86_400 {
        plural(diff / 3_600, "hour")
    } else if diff < 2_592_000 {
        plural(diff / 86_400, "day")
    } else if diff < 31_536_000 {
        plural(diff / 2_592_000, "month")
    } else {
        plural(diff / 31_536_000, "year")
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Abbreviate a count: 1500 -> "1.5k", 2_500_000 -> "2.5M".
pub fn format_count(value: f64) -> String {
    if value.is_nan() {
        return "0".to_string();
    }
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_ago_buckets() {
        assert_eq!(format_time_ago(100, 100), "just now");
        assert_eq!(format_time_ago(100, 159), "just now");
        assert_eq!(format_time_ago(100, 160), "1 minute ago");
        assert_eq!(format_time_ago(0, 120), "2 minutes ago");
        assert_eq!(format_time_ago(0, 3_600), "1 hour ago");
        assert_eq!(format_time_ago(0, 7_200), "2 hours ago");
        assert_eq!(format_time_ago(0, 86_400), "1 day ago");
        assert_eq!(format_time_ago(0, 2_592_000), "1 month ago");
        assert_eq!(format_time_ago(0, 31_536_000), "1 year ago");
        assert_eq!(format_time_ago(0, 63_072_000), "2 years ago");
    }

    #[test]
    fn test_time_ago_future_timestamp() {
        // Clock skew between fetcher and viewer should not panic or go negative.
        assert_eq!(format_time_ago(200, 100), "just now");
    }

    #[test]
    fn test_count_abbreviation() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(1_000.0), "1.0k");
        assert_eq!(format_count(1_543.0), "1.5k");
        assert_eq!(format_count(2_500_000.0), "2.5M");
        assert_eq!(format_count(f64::NAN), "0");
    }
}
