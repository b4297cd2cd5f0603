//! A single operating day: visits, hours, and the tag roster.
//!
//! `Day` and its `Visit`s are populated by a source-specific reader and
//! then treated as a read-only snapshot by the aggregation engine.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tag::TagId;
use crate::time::ClockTime;

/// The size class of a bike, as recorded on the day's roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeClass {
    Regular,
    Oversize,
}

/// A data-quality condition found in a day's records.
///
/// These are reportable facts, not failures: the engine still produces a
/// best-effort aggregation and returns the issues alongside it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataIssue {
    #[error("bike {tag} checked out at {time_out} with no check-in")]
    CheckOutWithoutCheckIn { tag: TagId, time_out: ClockTime },

    #[error("bike {tag} check-out {time_out} earlier than check-in {time_in}")]
    CheckOutBeforeCheckIn {
        tag: TagId,
        time_in: ClockTime,
        time_out: ClockTime,
    },

    #[error("tag {tag} is neither regular nor oversize on this day")]
    UnrosteredTag { tag: TagId },

    #[error("tag {tag} appears in both the regular and oversize rosters")]
    RosterOverlap { tag: TagId },

    #[error("opening time {opening} is not earlier than closing time {closing}")]
    OpeningNotBeforeClosing {
        opening: ClockTime,
        closing: ClockTime,
    },

    #[error("missing opening time")]
    MissingOpeningTime,

    #[error("missing closing time")]
    MissingClosingTime,
}

/// The day's tag classification: which tags count as regular and which
/// as oversize.
///
/// Classification is a property of the day, not of the tag itself; the
/// same tag can be regular one day and oversize the next. The roster is
/// supplied by the caller and consulted per aggregation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub regular: BTreeSet<TagId>,
    pub oversize: BTreeSet<TagId>,
}

impl Roster {
    /// The class of `tag` on this day, or `None` if unrostered.
    ///
    /// A tag listed in both sets reports as `Regular`; `overlap` surfaces
    /// that inconsistency separately.
    #[must_use]
    pub fn class_of(&self, tag: &TagId) -> Option<BikeClass> {
        if self.regular.contains(tag) {
            Some(BikeClass::Regular)
        } else if self.oversize.contains(tag) {
            Some(BikeClass::Oversize)
        } else {
            None
        }
    }

    /// Tags listed as both regular and oversize.
    #[must_use]
    pub fn overlap(&self) -> Vec<TagId> {
        self.regular.intersection(&self.oversize).cloned().collect()
    }
}

/// One check-in/check-out record for a tag.
///
/// `time_out` and `duration` are present only for completed visits.
/// `bike_type` is the class recorded at visit time; the authoritative
/// classification for aggregation is the day's [`Roster`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub tag: TagId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in: Option<ClockTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_out: Option<ClockTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_type: Option<BikeClass>,
}

impl Visit {
    /// Creates an in-progress visit (checked in, not yet out).
    #[must_use]
    pub const fn checked_in(tag: TagId, time_in: ClockTime) -> Self {
        Self {
            tag,
            time_in: Some(time_in),
            time_out: None,
            duration: None,
            bike_type: None,
        }
    }

    /// Creates a completed visit with its duration filled in.
    #[must_use]
    pub fn completed(tag: TagId, time_in: ClockTime, time_out: ClockTime) -> Self {
        let duration = time_out
            .minutes()
            .checked_sub(time_in.minutes());
        Self {
            tag,
            time_in: Some(time_in),
            time_out: Some(time_out),
            duration,
            bike_type: None,
        }
    }
}

/// One day of bike-valet data: summary information plus the visits.
///
/// Visit order is insertion order and carries no meaning; aggregation
/// re-sorts events chronologically, since a check-out can be recorded
/// before another tag's check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub org_code: String,
    pub site_code: String,
    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_time: Option<ClockTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_time: Option<ClockTime>,

    #[serde(default)]
    pub registrations: u32,

    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Day {
    /// Creates an empty day for the given site and date.
    #[must_use]
    pub fn new(org_code: impl Into<String>, site_code: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            org_code: org_code.into(),
            site_code: site_code.into(),
            date,
            opening_time: None,
            closing_time: None,
            registrations: 0,
            visits: Vec::new(),
        }
    }

    fn event_times(&self) -> impl Iterator<Item = ClockTime> + '_ {
        self.visits
            .iter()
            .flat_map(|v| [v.time_in, v.time_out])
            .flatten()
    }

    /// The earliest check-in or check-out of the day, if any.
    #[must_use]
    pub fn earliest_event(&self) -> Option<ClockTime> {
        self.event_times().min()
    }

    /// The latest check-in or check-out at or before `as_of`.
    ///
    /// With `as_of = None` the whole day is considered.
    #[must_use]
    pub fn latest_event(&self, as_of: Option<ClockTime>) -> Option<ClockTime> {
        let cutoff = as_of.unwrap_or(ClockTime::END_OF_DAY);
        self.event_times().filter(|t| *t <= cutoff).max()
    }

    /// How many check-ins/outs happened strictly after `after`.
    #[must_use]
    pub fn num_later_events(&self, after: ClockTime) -> usize {
        self.event_times().filter(|t| *t > after).count()
    }

    /// Checks the day's records against the roster and returns every
    /// data-quality condition found.
    ///
    /// With `strict_hours` set, missing opening/closing times are also
    /// reported.
    #[must_use]
    pub fn lint(&self, roster: &Roster, strict_hours: bool) -> Vec<DataIssue> {
        let mut issues = Vec::new();
        if strict_hours {
            if self.opening_time.is_none() {
                issues.push(DataIssue::MissingOpeningTime);
            }
            if self.closing_time.is_none() {
                issues.push(DataIssue::MissingClosingTime);
            }
        }
        if let (Some(opening), Some(closing)) = (self.opening_time, self.closing_time) {
            if opening >= closing {
                issues.push(DataIssue::OpeningNotBeforeClosing { opening, closing });
            }
        }
        for tag in roster.overlap() {
            issues.push(DataIssue::RosterOverlap { tag });
        }
        let mut unrostered = BTreeSet::new();
        for visit in &self.visits {
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
            if roster.class_of(&visit.tag).is_none() && unrostered.insert(visit.tag.clone()) {
                issues.push(DataIssue::UnrosteredTag {
                    tag: visit.tag.clone(),
                });
            }
        }
        issues
    }
}
