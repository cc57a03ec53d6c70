// Property-based tests for expiry windows, the notification time gate and reminder text

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc,
};
use common::models::NotificationCategory;
use common::schedule::{
    compose_message, end_of_day_in, is_notification_time, parse_notification_time, ExpiryWindow,
};
use proptest::prelude::*;

// 2000-01-01 .. 2040-01-01
fn any_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..2_208_988_800i64)
        .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap())
}

fn any_offset() -> impl Strategy<Value = FixedOffset> {
    (-12i32..=14i32).prop_map(|hours| FixedOffset::east_opt(hours * 3600).unwrap())
}

/// Daily is always nested in weekly, and both start at `now`
#[test]
fn property_rolling_windows_are_nested() {
    proptest!(|(now in any_instant())| {
        let daily = ExpiryWindow::for_category(NotificationCategory::Daily, &now);
        let weekly = ExpiryWindow::for_category(NotificationCategory::Weekly, &now);

        prop_assert_eq!(daily.start, now);
        prop_assert_eq!(weekly.start, now);
        prop_assert!(daily.end <= weekly.end);
        prop_assert_eq!(weekly.end - weekly.start, Duration::days(7));
        prop_assert_eq!(daily.end - daily.start, Duration::days(1));
    });
}

/// The monthly window is exactly the calendar month of `now` in its own timezone
#[test]
fn property_monthly_window_is_calendar_month() {
    proptest!(|(instant in any_instant(), offset in any_offset())| {
        let now = instant.with_timezone(&offset);
        let window = ExpiryWindow::for_category(NotificationCategory::Monthly, &now);

        let start_local = window.start.with_timezone(&offset);
        let end_local = window.end.with_timezone(&offset);

        prop_assert!(window.contains(&instant));
        prop_assert_eq!(start_local.day(), 1);
        prop_assert_eq!(start_local.hour(), 0);
        prop_assert_eq!(start_local.month(), now.month());
        prop_assert_eq!(end_local.month(), now.month());

        // One millisecond past the end is the first instant of the next month
        let after = (window.end + Duration::milliseconds(1)).with_timezone(&offset);
        prop_assert_eq!(after.day(), 1);
        prop_assert_eq!(after.hour(), 0);
        prop_assert!(!window.contains(&(window.end + Duration::milliseconds(1))));
        prop_assert!(!window.contains(&(window.start - Duration::milliseconds(1))));
    });
}

/// A medicine expiring within a day is in the daily and weekly windows, and in the
/// monthly one exactly when it expires in the current month
#[test]
fn property_expiring_soon_matches_overlapping_windows() {
    proptest!(|(now in any_instant(), minutes in 0i64..=1440)| {
        let expiry = now + Duration::minutes(minutes);

        let daily = ExpiryWindow::for_category(NotificationCategory::Daily, &now);
        let weekly = ExpiryWindow::for_category(NotificationCategory::Weekly, &now);
        let monthly = ExpiryWindow::for_category(NotificationCategory::Monthly, &now);

        prop_assert!(daily.contains(&expiry));
        prop_assert!(weekly.contains(&expiry));
        let same_month = expiry.year() == now.year() && expiry.month() == now.month();
        prop_assert_eq!(monthly.contains(&expiry), same_month);
    });
}

/// Already expired medicines are outside the rolling windows
#[test]
fn property_past_expiry_is_outside_rolling_windows() {
    proptest!(|(now in any_instant(), seconds in 1i64..=10_000_000)| {
        let expiry = now - Duration::seconds(seconds);
        let daily = ExpiryWindow::for_category(NotificationCategory::Daily, &now);
        let weekly = ExpiryWindow::for_category(NotificationCategory::Weekly, &now);
        prop_assert!(!daily.contains(&expiry));
        prop_assert!(!weekly.contains(&expiry));
    });
}

/// The gate opens only on the exact HH:MM, for any second within that minute
#[test]
fn property_gate_opens_on_exact_minute_only() {
    proptest!(|(
        now in any_instant(),
        offset in any_offset(),
        hour in 0u32..24,
        minute in 0u32..60
    )| {
        let local = now.with_timezone(&offset);
        let configured = format!("{:02}:{:02}", hour, minute);
        let expected = local.hour() == hour && local.minute() == minute;

        prop_assert_eq!(is_notification_time(&configured, &local), expected);
        prop_assert!(parse_notification_time(&configured).is_some());
    });
}

/// End of day is the last millisecond of that date on the given clock
#[test]
fn property_end_of_day_is_last_millisecond() {
    proptest!(|(days in 0i64..15_000, offset in any_offset())| {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(days);
        let end = end_of_day_in(&offset, date).with_timezone(&offset);

        prop_assert_eq!(end.date_naive(), date);
        prop_assert_eq!(end.hour(), 23);
        prop_assert_eq!(end.minute(), 59);
        prop_assert_eq!(end.second(), 59);
        prop_assert_eq!(end.timestamp_subsec_millis(), 999);
    });
}

/// Weekly reminders report whole days remaining, never more than seven
#[test]
fn property_weekly_message_reports_days_remaining() {
    proptest!(|(now in any_instant(), hours in 0i64..=168)| {
        let expiry = now + Duration::hours(hours);
        let message = compose_message(NotificationCategory::Weekly, "Aspirin", &expiry, &now);

        let expected = format!("will expire in {} days on", hours / 24);
        prop_assert!(message.starts_with("Medicine Aspirin "));
        prop_assert!(message.contains(&expected), "{}", message);
    });
}
