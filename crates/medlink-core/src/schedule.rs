//! Daily wall-clock jobs.

use chrono::{Duration, NaiveDateTime, NaiveTime};

/// A job that runs once a day at a fixed wall-clock time.
///
/// Polling callers check `is_due` and call `mark_ran` after running it; the
/// next run is the first occurrence of `at` strictly after that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyJob {
    at: NaiveTime,
    next_run: NaiveDateTime,
}

impl DailyJob {
    /// Schedule a job at `at`, first running at its next occurrence after `now`.
    pub fn new(at: NaiveTime, now: NaiveDateTime) -> Self {
        Self {
            at,
            next_run: next_occurrence(at, now),
        }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next_run
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_run
    }

    pub fn mark_ran(&mut self, now: NaiveDateTime) {
        self.next_run = next_occurrence(self.at, now);
    }
}

/// First instant at wall-clock `at` strictly after `after`.
pub fn next_occurrence(at: NaiveTime, after: NaiveDateTime) -> NaiveDateTime {
    let candidate = after.date().and_time(at);
    if candidate > after {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Latest instant at wall-clock `at` that is not after `now`.
pub fn latest_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let candidate = now.date().and_time(at);
    if candidate <= now {
        candidate
    } else {
        candidate - Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_midnight_job_runs_next_day() {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let mut job = DailyJob::new(midnight, at(5, 13, 0));
        assert_eq!(job.next_run(), at(6, 0, 0));

        assert!(!job.is_due(at(5, 23, 59)));
        assert!(job.is_due(at(6, 0, 0)));
        assert!(job.is_due(at(6, 0, 1)));

        job.mark_ran(at(6, 0, 1));
        assert_eq!(job.next_run(), at(7, 0, 0));
        assert!(!job.is_due(at(6, 12, 0)));
    }

    #[test]
    fn test_created_exactly_at_time_waits_a_day() {
        let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let job = DailyJob::new(eight, at(5, 8, 0));
        assert_eq!(job.next_run(), at(6, 8, 0));
    }

    #[test]
    fn test_late_poll_still_runs_once() {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let mut job = DailyJob::new(midnight, at(5, 22, 0));

        // The poller slept through midnight by several minutes
        assert!(job.is_due(at(6, 0, 7)));
        job.mark_ran(at(6, 0, 7));
        assert!(!job.is_due(at(6, 0, 8)));
    }

    #[test]
    fn test_latest_occurrence_wraps_midnight() {
        let late = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        assert_eq!(latest_occurrence(late, at(6, 0, 0)), at(5, 23, 59));
        assert_eq!(latest_occurrence(late, at(6, 23, 59)), at(6, 23, 59));
    }
}
