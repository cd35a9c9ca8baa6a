//! Daily request quota as an explicit value object.
//!
//! `{date, count, last_request_at}` is owned by whoever holds the fetcher;
//! day rollover is a pure function of "now" instead of hidden module state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuota {
    pub date: NaiveDate,
    pub count: u32,
    pub last_request_at: Option<DateTime<Utc>>,
}

impl DailyQuota {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            count: 0,
            last_request_at: None,
        }
    }

    pub fn for_now(now: DateTime<Utc>) -> Self {
        Self::new(now.date_naive())
    }

    /// Reset the counter if `now` falls on a later calendar day.
    pub fn rolled_over(&self, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        if today == self.date {
            self.clone()
        } else {
            Self::new(today)
        }
    }

    /// Roll over if needed, then count one request at `now`.
    pub fn record(&mut self, now: DateTime<Utc>) {
        *self = self.rolled_over(now);
        self.count += 1;
        self.last_request_at = Some(now);
    }

    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }

    pub fn is_exhausted(&self, limit: u32) -> bool {
        self.count >= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(date: &str, hour: u32) -> DateTime<Utc> {
        let d: NaiveDate = date.parse().unwrap();
        Utc.from_utc_datetime(&d.and_hms_opt(hour, 0, 0).unwrap())
    }

    #[test]
    fn counts_within_the_same_day() {
        let mut q = DailyQuota::for_now(at("2026-08-29", 8));
        q.record(at("2026-08-29", 9));
        q.record(at("2026-08-29", 10));
        assert_eq!(q.count, 2);
        assert_eq!(q.remaining(3), 1);
        assert!(!q.is_exhausted(3));
    }

    #[test]
    fn rolls_over_on_a_new_day() {
        let mut q = DailyQuota::for_now(at("2026-08-29", 8));
        q.record(at("2026-08-29", 9));
        q.record(at("2026-08-30", 1));
        assert_eq!(q.date, "2026-08-30".parse().unwrap());
        assert_eq!(q.count, 1);
    }

    #[test]
    fn rollover_is_pure() {
        let q = DailyQuota {
            date: "2026-08-29".parse().unwrap(),
            count: 7,
            last_request_at: Some(at("2026-08-29", 9)),
        };
        let same = q.rolled_over(at("2026-08-29", 23));
        assert_eq!(same, q);
        let fresh = q.rolled_over(at("2026-08-30", 0));
        assert_eq!(fresh.count, 0);
        assert_eq!(q.count, 7);
    }
}
