use chrono::{DateTime, Duration, Utc};

use crate::domain::EntitlementWindow;

/// Compute the window for a fresh approval or an upgrade.
///
/// When the user still holds an active window (`end_date >= now`), the new
/// window stacks: it begins exactly where the current one ends, no gap and no
/// overlap. Otherwise it begins at `now`.
pub fn approval_window(
    now: DateTime<Utc>,
    duration_days: i64,
    grace_days: i64,
    active_until: Option<DateTime<Utc>>,
) -> EntitlementWindow {
    let start_date = match active_until {
        Some(end) if end >= now => end,
        _ => now,
    };
    window_from(start_date, duration_days, grace_days)
}

/// Compute the window for reactivating a cancelled or expired subscription.
/// Reactivation never stacks onto the old window; it always starts at `now`.
pub fn reactivation_window(
    now: DateTime<Utc>,
    duration_days: i64,
    grace_days: i64,
) -> EntitlementWindow {
    window_from(now, duration_days, grace_days)
}

fn window_from(start_date: DateTime<Utc>, duration_days: i64, grace_days: i64) -> EntitlementWindow {
    let end_date = start_date + Duration::days(duration_days);
    EntitlementWindow {
        start_date,
        end_date,
        grace_period_end: end_date + Duration::days(grace_days),
    }
}
