use chrono::{DateTime, Utc};

fn count_with_unit(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Renders the time between `from` and `now` as a coarse human readable
/// string. Buckets, checked in order with integer truncation:
/// years (+ leftover months), months (+ leftover days), days, hours,
/// minutes, and finally "a moment". A `from` in the future yields "future".
pub fn format_elapsed(from: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now - from;
    let days = delta.num_days();
    if delta < chrono::Duration::zero() {
        return "future".into();
    }
    if days >= 365 {
        let years = days / 365;
        let months = (days % 365) / 30;
        let mut period = format!("~{}", count_with_unit(years, "year"));
        if months > 0 {
            period.push_str(&format!(" {}", count_with_unit(months, "month")));
        }
        period
    } else if days >= 30 {
        let months = days / 30;
        let remaining_days = days % 30;
        let mut period = format!("~{}", count_with_unit(months, "month"));
        if remaining_days > 0 {
            period.push_str(&format!(" {}", count_with_unit(remaining_days, "day")));
        }
        period
    } else if days > 0 {
        count_with_unit(days, "day")
    } else {
        let hours = delta.num_hours();
        let minutes = delta.num_minutes();
        if hours > 0 {
            format!("~{}", count_with_unit(hours, "hour"))
        } else if minutes > 0 {
            format!("~{}", count_with_unit(minutes, "minute"))
        } else {
            "a moment".into()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2026-08-25T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn formats_years_with_leftover_months() {
        let n = now();
        assert!(format_elapsed(n - Duration::days(400), n).starts_with("~1 year"));
        assert_eq!(format_elapsed(n - Duration::days(400), n), "~1 year 1 month");
        assert_eq!(format_elapsed(n - Duration::days(365), n), "~1 year");
        assert_eq!(
            format_elapsed(n - Duration::days(365 * 2 + 70), n),
            "~2 years 2 months"
        );
    }

    #[test]
    fn formats_months_with_leftover_days() {
        let n = now();
        assert_eq!(format_elapsed(n - Duration::days(30), n), "~1 month");
        assert_eq!(format_elapsed(n - Duration::days(95), n), "~3 months 5 days");
    }

    #[test]
    fn formats_whole_days() {
        let n = now();
        assert_eq!(format_elapsed(n - Duration::days(5), n), "5 days");
        assert_eq!(format_elapsed(n - Duration::days(1), n), "1 day");
        assert_eq!(format_elapsed(n - Duration::days(29), n), "29 days");
    }

    #[test]
    fn formats_sub_day_buckets() {
        let n = now();
        assert_eq!(format_elapsed(n - Duration::hours(7), n), "~7 hours");
        assert_eq!(format_elapsed(n - Duration::minutes(42), n), "~42 minutes");
        assert_eq!(format_elapsed(n - Duration::seconds(30), n), "a moment");
    }

    #[test]
    fn future_timestamps_yield_sentinel() {
        let n = now();
        assert_eq!(format_elapsed(n + Duration::days(1), n), "future");
        assert_eq!(format_elapsed(n + Duration::seconds(1), n), "future");
    }

    #[test]
    fn truncates_instead_of_rounding() {
        let n = now();
        // 23h59m is still the hours bucket, not a day
        assert_eq!(
            format_elapsed(n - Duration::hours(23) - Duration::minutes(59), n),
            "~23 hours"
        );
        assert_eq!(format_elapsed(n - Duration::days(364), n), "~12 months 4 days");
    }
}
