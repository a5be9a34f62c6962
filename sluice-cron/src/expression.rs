//! Cron expression parsing and evaluation.

use crate::error::{CronError, CronResult};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use cron::Schedule;
use std::str::FromStr;

/// Parsed cron expression.
///
/// Holds two schedules when a 5-field expression restricts both the day of
/// month and the day of week, since either one matching fires the task.
#[derive(Debug, Clone)]
pub struct CronExpression {
    schedules: Vec<Schedule>,
    expression: String,
}

impl CronExpression {
    /// Parse a cron expression.
    ///
    /// Accepts the standard 5-field form (`minute hour day month weekday`,
    /// Sunday = 0 or 7), the 6/7-field form with leading seconds and
    /// trailing year, and `@hourly`-style shortcuts.
    ///
    /// In the 5-field form a day-of-month and a day-of-week that are both
    /// restricted match when either matches (`0 0 1 * 1` is midnight on the
    /// 1st and on every Monday). The 6/7-field form requires both.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice_cron::CronExpression;
    ///
    /// // Every minute
    /// let expr = CronExpression::parse("* * * * *").unwrap();
    ///
    /// // Weekdays at 03:30
    /// let expr = CronExpression::parse("30 3 * * 1-5").unwrap();
    ///
    /// // Every 10 seconds
    /// let expr = CronExpression::parse("*/10 * * * * *").unwrap();
    /// ```
    pub fn parse(expression: &str) -> CronResult<Self> {
        let schedules = normalize(expression)?
            .iter()
            .map(|normalized| {
                Schedule::from_str(normalized)
                    .map_err(|e| CronError::InvalidExpression(format!("{}: {}", expression, e)))
            })
            .collect::<CronResult<Vec<_>>>()?;

        Ok(Self {
            schedules,
            expression: expression.trim().to_string(),
        })
    }

    /// Get the next execution time strictly after the given time.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&after).next())
            .min()
    }

    /// Whether an occurrence falls inside the wall-clock minute containing `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let start = minute_start(now);
        self.next_after(start - TimeDelta::seconds(1))
            .is_some_and(|next| next < start + TimeDelta::minutes(1))
    }

    /// The expression as written.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// `now` truncated to the start of its minute.
pub fn minute_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now)
}

fn normalize(expression: &str) -> CronResult<Vec<String>> {
    let expression = expression.trim();
    if expression.starts_with('@') {
        return Ok(vec![expression.to_string()]);
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let (minute, hour, day, month) = (fields[0], fields[1], fields[2], fields[3]);
            let weekday = standard_day_of_week(fields[4])?;
            if is_restricted(day) && is_restricted(fields[4]) {
                Ok(vec![
                    format!("0 {} {} {} {} *", minute, hour, day, month),
                    format!("0 {} {} * {} {}", minute, hour, month, weekday),
                ])
            } else {
                Ok(vec![format!("0 {} {} {} {} {}", minute, hour, day, month, weekday)])
            }
        }
        6 | 7 => Ok(vec![fields.join(" ")]),
        n => Err(CronError::InvalidExpression(format!(
            "{}: expected 5, 6 or 7 fields, got {}",
            expression, n
        ))),
    }
}

fn is_restricted(field: &str) -> bool {
    !field.starts_with('*') && field != "?"
}

// Numeric weekdays in the standard form count from Sunday = 0; names are
// unambiguous for the parser.
fn standard_day_of_week(field: &str) -> CronResult<String> {
    let parts = field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };
            let range = match range.split_once('-') {
                Some((from, to)) => format!("{}-{}", day_name(from)?, day_name(to)?),
                None => day_name(range)?,
            };
            Ok(match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            })
        })
        .collect::<CronResult<Vec<String>>>()?;

    Ok(parts.join(","))
}

fn day_name(token: &str) -> CronResult<String> {
    const DAYS: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

    if token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty() {
        return token
            .parse::<usize>()
            .ok()
            .and_then(|n| DAYS.get(n))
            .map(|day| day.to_string())
            .ok_or_else(|| CronError::InvalidExpression(format!("day of week out of range: {}", token)));
    }
    Ok(token.to_uppercase())
}

/// Common cron expression presets.
pub struct CronPresets;

impl CronPresets {
    /// Every minute
    pub const EVERY_MINUTE: &'static str = "* * * * *";

    /// Every 5 minutes
    pub const EVERY_5_MINUTES: &'static str = "*/5 * * * *";

    /// Every 15 minutes
    pub const EVERY_15_MINUTES: &'static str = "*/15 * * * *";

    /// Every hour
    pub const HOURLY: &'static str = "0 * * * *";

    /// Every day at midnight
    pub const DAILY: &'static str = "0 0 * * *";

    /// Every week on Sunday at midnight
    pub const WEEKLY: &'static str = "0 0 * * 0";

    /// Every month on the 1st at midnight
    pub const MONTHLY: &'static str = "0 0 1 * *";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        // 2024-01-07 is a Sunday
        Utc.with_ymd_and_hms(2024, 1, 7, h, m, s).unwrap()
    }

    #[test]
    fn test_parse_valid_expressions() {
        assert!(CronExpression::parse("* * * * *").is_ok());
        assert!(CronExpression::parse("0 */15 * * * *").is_ok());
        assert!(CronExpression::parse("0 0 12 1 1 * 2030").is_ok());
        assert!(CronExpression::parse("@hourly").is_ok());
    }

    #[test]
    fn test_parse_invalid_expressions() {
        assert!(CronExpression::parse("invalid").is_err());
        assert!(CronExpression::parse("* * *").is_err());
        assert!(CronExpression::parse("61 * * * *").is_err());
        assert!(CronExpression::parse("* * * * 9").is_err());
    }

    #[test]
    fn test_presets() {
        for preset in [
            CronPresets::EVERY_MINUTE,
            CronPresets::EVERY_5_MINUTES,
            CronPresets::EVERY_15_MINUTES,
            CronPresets::HOURLY,
            CronPresets::DAILY,
            CronPresets::WEEKLY,
            CronPresets::MONTHLY,
        ] {
            assert!(CronExpression::parse(preset).is_ok(), "{}", preset);
        }
    }

    #[test]
    fn test_every_minute_is_always_due() {
        let expr = CronExpression::parse("* * * * *").unwrap();
        assert!(expr.is_due(at(10, 0, 0)));
        assert!(expr.is_due(at(10, 0, 59)));
        assert!(expr.is_due(at(23, 59, 30)));
    }

    #[test]
    fn test_due_within_minute_only() {
        let expr = CronExpression::parse("30 10 * * *").unwrap();
        assert!(expr.is_due(at(10, 30, 0)));
        assert!(expr.is_due(at(10, 30, 45)));
        assert!(!expr.is_due(at(10, 29, 59)));
        assert!(!expr.is_due(at(10, 31, 0)));
    }

    #[test]
    fn test_seconds_field_counts_inside_minute() {
        let expr = CronExpression::parse("45 30 10 * * *").unwrap();
        assert!(expr.is_due(at(10, 30, 0)));
        assert!(!expr.is_due(at(10, 31, 0)));
    }

    #[test]
    fn test_sunday_zero_and_seven() {
        let sunday_zero = CronExpression::parse("0 9 * * 0").unwrap();
        let sunday_seven = CronExpression::parse("0 9 * * 7").unwrap();
        let monday = CronExpression::parse("0 9 * * 1").unwrap();

        assert!(sunday_zero.is_due(at(9, 0, 10)));
        assert!(sunday_seven.is_due(at(9, 0, 10)));
        assert!(!monday.is_due(at(9, 0, 10)));
    }

    #[test]
    fn test_weekday_range() {
        let weekdays = CronExpression::parse("0 9 * * 1-5").unwrap();
        assert!(!weekdays.is_due(at(9, 0, 0)));
        let monday = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
        assert!(weekdays.is_due(monday));
    }

    #[test]
    fn test_next_after() {
        let expr = CronExpression::parse("0 * * * *").unwrap();
        assert_eq!(expr.next_after(at(10, 0, 0)), Some(at(11, 0, 0)));
        assert_eq!(expr.expression(), "0 * * * *");
    }

    #[test]
    fn test_minute_start() {
        assert_eq!(minute_start(at(10, 5, 42)), at(10, 5, 0));
    }

    #[test]
    fn test_day_of_month_or_day_of_week() {
        let expr = CronExpression::parse("0 0 1 * 1").unwrap();

        // Monday the 8th, Thursday the 1st, Tuesday the 9th
        let monday = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 30).unwrap();
        let first = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        assert!(expr.is_due(monday));
        assert!(expr.is_due(first));
        assert!(!expr.is_due(tuesday));

        assert_eq!(
            expr.next_after(at(12, 0, 0)),
            Some(Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap())
        );
        assert_eq!(
            expr.next_after(Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap()),
            Some(first)
        );
    }

    #[test]
    fn test_unrestricted_day_keeps_single_schedule() {
        assert_eq!(normalize("0 9 * * 1-5").unwrap(), vec!["0 0 9 * * MON-FRI"]);
        assert_eq!(normalize("0 9 */2 * 1").unwrap(), vec!["0 0 9 */2 * MON"]);
        assert_eq!(
            normalize("0 0 1,15 * 5").unwrap(),
            vec!["0 0 0 1,15 * *", "0 0 0 * * FRI"]
        );
    }

    #[test]
    fn test_day_of_week_translation() {
        assert_eq!(standard_day_of_week("0").unwrap(), "SUN");
        assert_eq!(standard_day_of_week("1-5").unwrap(), "MON-FRI");
        assert_eq!(standard_day_of_week("*/2").unwrap(), "*/2");
        assert_eq!(standard_day_of_week("mon,3").unwrap(), "MON,WED");
        assert!(standard_day_of_week("8").is_err());
    }
}
