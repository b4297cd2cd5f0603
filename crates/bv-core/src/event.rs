//! Derivation of a day's chronological event stream.
//!
//! Block-level peaks depend on the order things happened, not just on
//! per-block totals, so the visit list is first flattened into atomic
//! check-in/check-out events sorted by minute. Check-ins and check-outs
//! sharing a minute are grouped into one event; their relative order
//! within the minute is immaterial to aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::day::{DataIssue, Day};
use crate::tag::TagId;
use crate::time::ClockTime;

/// Everything that happened in one minute of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEvent {
    pub time: ClockTime,
    pub tags_in: Vec<TagId>,
    pub tags_out: Vec<TagId>,
}

impl DayEvent {
    const fn new(time: ClockTime) -> Self {
        Self {
            time,
            tags_in: Vec::new(),
            tags_out: Vec::new(),
        }
    }
}

/// A derived event stream plus the data-quality issues found on the way.
///
/// Anomalous check-outs are still present in the stream; the issues let
/// the caller decide whether to flag them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStream {
    /// Events sorted ascending by time, one per distinct minute.
    pub events: Vec<DayEvent>,
    pub issues: Vec<DataIssue>,
}

/// Flattens a day's visits into a time-ordered event stream.
///
/// Events strictly later than `as_of` (when given) are excluded
/// entirely. Tag lists within each event are sorted, so identical
/// inputs always produce structurally identical output.
#[must_use]
pub fn derive_events(day: &Day, as_of: Option<ClockTime>) -> EventStream {
    let cutoff = as_of.unwrap_or(ClockTime::END_OF_DAY);
    let mut by_minute: BTreeMap<ClockTime, DayEvent> = BTreeMap::new();
    let mut issues = Vec::new();

    for visit in &day.visits {
        match (visit.time_in, visit.time_out) {
            (None, Some(time_out)) => issues.push(DataIssue::CheckOutWithoutCheckIn {
                tag: visit.tag.clone(),
                time_out,
            }),
            (Some(time_in), Some(time_out)) if time_out < time_in => {
                issues.push(DataIssue::CheckOutBeforeCheckIn {
                    tag: visit.tag.clone(),
                    time_in,
                    time_out,
                });
            }
            _ => {}
        }
        if let Some(time_in) = visit.time_in.filter(|t| *t <= cutoff) {
            by_minute
                .entry(time_in)
                .or_insert_with(|| DayEvent::new(time_in))
                .tags_in
                .push(visit.tag.clone());
        }
        if let Some(time_out) = visit.time_out.filter(|t| *t <= cutoff) {
            by_minute
                .entry(time_out)
                .or_insert_with(|| DayEvent::new(time_out))
                .tags_out
                .push(visit.tag.clone());
        }
    }

    let mut events: Vec<DayEvent> = by_minute.into_values().collect();
    for event in &mut events {
        event.tags_in.sort_unstable();
        event.tags_out.sort_unstable();
    }
    if !issues.is_empty() {
        tracing::debug!(count = issues.len(), "data-quality issues in event stream");
    }
    EventStream { events, issues }
}
