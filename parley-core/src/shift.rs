// ABOUTME: Shift gate -- decides whether an agent's declared shift covers the given instant.
// ABOUTME: Morning is hour < 12, Afternoon 12..18, Night >= 18, all in UTC.

use chrono::{DateTime, Timelike, Utc};

use crate::model::Shift;

pub fn is_in_shift(shift: Shift, now: DateTime<Utc>) -> bool {
    let hour = now.hour();
    match shift {
        Shift::Morning => hour < 12,
        Shift::Afternoon => (12..18).contains(&hour),
        Shift::Night => hour >= 18,
    }
}
