use chrono::{Datelike, NaiveDate};

use rutero_core::route::{ExceptionKind, RecurrenceRule};

/// Decides whether `rule` calls for a trip on `date`.
///
/// `date` is a civil date in the operating time zone. Dated "unavailable"
/// exceptions veto an otherwise matching weekday; "available" exceptions
/// are informational and never force a date in.
pub fn should_generate(rule: &RecurrenceRule, date: NaiveDate) -> bool {
    if let Some(start) = rule.start_date {
        if date < start {
            return false;
        }
    }
    if let Some(end) = rule.end_date {
        if date > end {
            return false;
        }
    }

    let weekday = date.weekday().number_from_monday() as u8;
    if !rule.weekdays.contains(&weekday) {
        return false;
    }

    !rule
        .exceptions
        .iter()
        .any(|ex| ex.date == date && ex.kind == ExceptionKind::Unavailable)
}
