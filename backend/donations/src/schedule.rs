//! Subscription scheduler rule.
//!
//! Calendar months and years follow chrono's clamping: when the target month is
//! shorter than the source day, the result lands on that month's last day
//! (`2025-01-31 + 1 month = 2025-02-28`). The rule is applied to the actual
//! charge timestamp, so a schedule that clamped once keeps the clamped day.

use chrono::{DateTime, Days, Months, Utc};

use crate::models::SubscriptionInterval;

/// Next due date after `from` for the given interval. `None` only on calendar
/// overflow.
pub fn next_due_date(interval: SubscriptionInterval, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match interval {
        SubscriptionInterval::Weekly => from.checked_add_days(Days::new(7)),
        SubscriptionInterval::Monthly => from.checked_add_months(Months::new(1)),
        SubscriptionInterval::Quarterly => from.checked_add_months(Months::new(3)),
        SubscriptionInterval::Yearly => from.checked_add_months(Months::new(12)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn weekly_adds_seven_days() {
        assert_eq!(
            next_due_date(SubscriptionInterval::Weekly, utc(2025, 2, 25)),
            Some(utc(2025, 3, 4))
        );
    }

    #[test]
    fn monthly_from_first_of_month() {
        assert_eq!(
            next_due_date(SubscriptionInterval::Monthly, utc(2025, 2, 1)),
            Some(utc(2025, 3, 1))
        );
    }

    #[test]
    fn monthly_clamps_month_end() {
        assert_eq!(
            next_due_date(SubscriptionInterval::Monthly, utc(2025, 1, 31)),
            Some(utc(2025, 2, 28))
        );
        assert_eq!(
            next_due_date(SubscriptionInterval::Monthly, utc(2024, 1, 31)),
            Some(utc(2024, 2, 29))
        );
        assert_eq!(
            next_due_date(SubscriptionInterval::Monthly, utc(2025, 3, 31)),
            Some(utc(2025, 4, 30))
        );
        // The clamped day sticks on the following charge.
        assert_eq!(
            next_due_date(SubscriptionInterval::Monthly, utc(2025, 2, 28)),
            Some(utc(2025, 3, 28))
        );
    }

    #[test]
    fn quarterly_crosses_year_boundary() {
        assert_eq!(
            next_due_date(SubscriptionInterval::Quarterly, utc(2025, 11, 30)),
            Some(utc(2026, 2, 28))
        );
    }

    #[test]
    fn yearly_from_leap_day() {
        assert_eq!(
            next_due_date(SubscriptionInterval::Yearly, utc(2024, 2, 29)),
            Some(utc(2025, 2, 28))
        );
        assert_eq!(
            next_due_date(SubscriptionInterval::Yearly, utc(2025, 6, 15)),
            Some(utc(2026, 6, 15))
        );
    }

    #[test]
    fn result_is_strictly_later() {
        let from = utc(2025, 12, 31);
        for interval in [
            SubscriptionInterval::Weekly,
            SubscriptionInterval::Monthly,
            SubscriptionInterval::Quarterly,
            SubscriptionInterval::Yearly,
        ] {
            assert!(next_due_date(interval, from).unwrap() > from);
        }
    }
}
