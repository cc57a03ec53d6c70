// Schedule parsing and expiry window calculation
//
// The notification tick fires on a cron schedule; every tick compares the
// server-local wall clock against the configured notification time and, when
// open, classifies medicines into the monthly, weekly and daily windows.

use crate::errors::ScheduleError;
use crate::models::NotificationCategory;
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse and validate the tick cron expression (second precision)
pub fn parse_tick_schedule(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Next tick strictly after `after`, in the caller's timezone
pub fn next_tick_after<Tz: TimeZone>(
    schedule: &CronSchedule,
    after: &DateTime<Tz>,
) -> Result<DateTime<Tz>, ScheduleError> {
    schedule
        .after(after)
        .next()
        .ok_or_else(|| ScheduleError::NoUpcomingTick(after.naive_utc().to_string()))
}

/// Exact `HH:MM` comparison against the wall clock of `now`.
///
/// Seconds are ignored; a tick that lands in a different minute is a no-op.
pub fn is_notification_time<Tz: TimeZone>(notification_time: &str, now: &DateTime<Tz>) -> bool {
    now.naive_local().format("%H:%M").to_string() == notification_time
}

/// Validate a user supplied `HH:MM` notification time
pub fn parse_notification_time(value: &str) -> Option<NaiveTime> {
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Inclusive expiry range for one notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub category: NotificationCategory,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExpiryWindow {
    /// Compute the window for `category` as seen from `now`.
    ///
    /// * Monthly: first instant to last millisecond of the current calendar month
    /// * Weekly: `[now, now + 7 days]`
    /// * Daily: `[now, now + 1 day]`
    ///
    /// Windows overlap; a medicine expiring tomorrow falls into all three.
    pub fn for_category<Tz: TimeZone>(category: NotificationCategory, now: &DateTime<Tz>) -> Self {
        let (start, end) = match category {
            NotificationCategory::Monthly => current_month_bounds(now),
            NotificationCategory::Weekly => {
                let start = now.with_timezone(&Utc);
                (start, start + Duration::days(7))
            }
            NotificationCategory::Daily => {
                let start = now.with_timezone(&Utc);
                (start, start + Duration::days(1))
            }
        };

        Self {
            category,
            start,
            end,
        }
    }

    pub fn contains(&self, expiry: &DateTime<Utc>) -> bool {
        *expiry >= self.start && *expiry <= self.end
    }
}

fn current_month_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.naive_local().date();

    let first_day = today.with_day(1).unwrap_or(today);
    let next_month_first = if first_day.month() == 12 {
        NaiveDate::from_ymd_opt(first_day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first_day.year(), first_day.month() + 1, 1)
    }
    .unwrap_or(first_day);
    let last_day = next_month_first.pred_opt().unwrap_or(first_day);

    let start = localize(&tz, first_day.and_time(NaiveTime::MIN));
    let end = end_of_day_in(&tz, last_day);
    (start, end)
}

/// 23:59:59.999 of `date` in the given timezone
pub fn end_of_day_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN));
    localize(tz, end)
}

/// 23:59:59.999 of `date` on the server-local clock
pub fn end_of_day_local(date: NaiveDate) -> DateTime<Utc> {
    end_of_day_in(&chrono::Local, date)
}

// Nonexistent local times (DST gaps) are read as UTC
fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz.from_utc_datetime(&naive).with_timezone(&Utc),
    }
}

/// Human readable reminder text for one medicine
pub fn compose_message<Tz: TimeZone>(
    category: NotificationCategory,
    medicine_name: &str,
    expiry: &DateTime<Utc>,
    now: &DateTime<Tz>,
) -> String {
    let expiry_local = expiry.with_timezone(&now.timezone());
    let expiry_text = expiry_local.naive_local().format("%B %-d, %Y").to_string();

    match category {
        NotificationCategory::Monthly => format!(
            "Medicine {} will expire this month on {}",
            medicine_name, expiry_text
        ),
        NotificationCategory::Weekly => {
            let days = expiry.signed_duration_since(now.with_timezone(&Utc)).num_days();
            format!(
                "Medicine {} will expire in {} days on {}",
                medicine_name, days, expiry_text
            )
        }
        NotificationCategory::Daily => format!(
            "URGENT: Medicine {} will expire tomorrow on {}",
            medicine_name, expiry_text
        ),
    }
}
