use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// Invoice numbers look like `INV-202608-00042`: a calendar-month partition
/// followed by a 5-digit sequence that is monotonic within the month on the
/// happy path. Under pathological contention allocation falls back to a
/// timestamp+random suffix that keeps the prefix but abandons monotonicity;
/// gaps are acceptable, duplicates are not.
pub const PREFIX: &str = "INV";

pub fn period_for(date: DateTime<Utc>) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

pub fn format_number(period: &str, seq: i64) -> String {
    format!("{}-{}-{:05}", PREFIX, period, seq)
}

/// Extract the sequence from a number in this month's partition, if it
/// parses as one. Fallback numbers carry a non-numeric tail and are skipped.
pub fn parse_sequence(invoice_number: &str, period: &str) -> Option<i64> {
    let tail = invoice_number.strip_prefix(&format!("{}-{}-", PREFIX, period))?;
    tail.parse::<i64>().ok()
}

/// Non-sequential but collision-resistant number for the contention
/// fallback: epoch seconds folded into the 5-digit slot plus a random hex
/// tail. Still unique-checked at the store before use.
pub fn fallback_number(period: &str, now: DateTime<Utc>) -> String {
    let stamp = now.timestamp() % 100_000;
    let suffix: u16 = rand::thread_rng().gen();
    // The 'r' keeps fallback numbers out of the numeric sequence namespace
    // so the scan path never mistakes one for the month's high-water mark.
    format!("{}-{}-{:05}r{:04x}", PREFIX, period, stamp, suffix)
}
