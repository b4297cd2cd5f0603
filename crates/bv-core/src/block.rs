//! Time-block aggregation: occupancy per fixed-width block of the day.
//!
//! The day is partitioned into contiguous `D`-minute blocks and the
//! event stream is replayed through them in order, carrying one running
//! occupancy set across block boundaries. Replay order matters: the
//! within-block peak must be sampled at every event, not just at block
//! boundaries, so it can exceed the block's end-of-block count.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::day::{BikeClass, DataIssue, Day, Roster};
use crate::event::derive_events;
use crate::tag::TagId;
use crate::time::ClockTime;

/// How long a single time block is (minutes) unless configured otherwise.
pub const DEFAULT_BLOCK_DURATION: u16 = 30;

/// Configuration errors for aggregation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// A block duration of zero minutes is programmer misuse.
    #[error("block duration must be positive")]
    InvalidBlockDuration,
}

/// Configuration for time-block aggregation.
///
/// Valid by construction: the block duration is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateConfig {
    block_duration: u16,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            block_duration: DEFAULT_BLOCK_DURATION,
        }
    }
}

impl AggregateConfig {
    /// Creates a configuration with the given block duration in minutes.
    pub const fn new(block_duration: u16) -> Result<Self, AggregateError> {
        if block_duration == 0 {
            return Err(AggregateError::InvalidBlockDuration);
        }
        Ok(Self { block_duration })
    }

    /// The block duration in minutes.
    #[must_use]
    pub const fn block_duration(self) -> u16 {
        self.block_duration
    }

    /// The start of the block containing `time`.
    #[must_use]
    pub const fn block_start(self, time: ClockTime) -> ClockTime {
        ClockTime::clamped((time.minutes() / self.block_duration) * self.block_duration)
    }

    /// The last minute of the block containing `time`.
    #[must_use]
    pub const fn block_end(self, time: ClockTime) -> ClockTime {
        ClockTime::clamped(self.block_start(time).minutes() + self.block_duration - 1)
    }
}

/// Counts broken down by bike class. Unrostered tags appear in neither
/// count, so `regular + oversize` can fall short of the matching total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub regular: usize,
    pub oversize: usize,
}

/// What took place in a single block of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// First minute of the block.
    pub time_start: ClockTime,
    /// Last minute of the block (`time_start + D - 1`).
    pub time_end: ClockTime,

    /// Tags checked in during this block, in event order.
    pub ins_list: Vec<TagId>,
    /// Tags checked out during this block, in event order.
    pub outs_list: Vec<TagId>,
    pub num_ins: usize,
    pub num_outs: usize,

    /// Tags present at the end of the block.
    pub here_list: BTreeSet<TagId>,
    pub num_here: usize,

    /// Peak occupancy observed within the block. At least `num_here`,
    /// and possibly more: a bike can come and go between boundaries.
    pub max_here: usize,
    /// Composition of the occupancy set at the peak.
    pub max_here_list: BTreeSet<TagId>,

    pub ins_by_class: ClassCounts,
    pub outs_by_class: ClassCounts,
    pub here_by_class: ClassCounts,
    pub max_here_by_class: ClassCounts,
}

impl Block {
    fn new(time_start: ClockTime, config: AggregateConfig) -> Self {
        Self {
            time_start,
            time_end: config.block_end(time_start),
            ins_list: Vec::new(),
            outs_list: Vec::new(),
            num_ins: 0,
            num_outs: 0,
            here_list: BTreeSet::new(),
            num_here: 0,
            max_here: 0,
            max_here_list: BTreeSet::new(),
            ins_by_class: ClassCounts::default(),
            outs_by_class: ClassCounts::default(),
            here_by_class: ClassCounts::default(),
            max_here_by_class: ClassCounts::default(),
        }
    }
}

/// One day's aggregation: the block mapping plus data-quality issues
/// found along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Blocks keyed by their start time, contiguous across the day's
    /// active range. Empty when the day has no events.
    pub blocks: BTreeMap<ClockTime, Block>,
    pub issues: Vec<DataIssue>,
}

/// Partitions the day into fixed-width blocks and replays its events.
///
/// `as_of` defaults to the day's latest event, raised to the closing
/// time when one is known. An explicit `as_of` excludes strictly-later
/// events entirely. The output is deterministic: identical inputs
/// produce structurally identical blocks.
#[must_use]
pub fn aggregate(
    day: &Day,
    roster: &Roster,
    as_of: Option<ClockTime>,
    config: AggregateConfig,
) -> Aggregation {
    let as_of = as_of.or_else(|| {
        day.latest_event(None).map(|latest| match day.closing_time {
            Some(closing) if closing > latest => closing,
            _ => latest,
        })
    });

    let stream = derive_events(day, as_of);
    let mut issues = stream.issues;
    let Some((earliest, latest)) = stream
        .events
        .first()
        .map(|e| e.time)
        .zip(stream.events.last().map(|e| e.time))
    else {
        return Aggregation {
            blocks: BTreeMap::new(),
            issues,
        };
    };

    // Grid covers from the first event through the later of the last
    // event and as_of, so a quiet late afternoon still shows as blocks.
    let horizon = as_of.map_or(latest, |t| t.max(latest));
    let first_start = config.block_start(earliest);
    let last_start = config.block_start(horizon);
    let mut blocks: BTreeMap<ClockTime, Block> = (first_start.minutes()..=last_start.minutes())
        .step_by(usize::from(config.block_duration()))
        .map(|m| {
            let start = ClockTime::clamped(m);
            (start, Block::new(start, config))
        })
        .collect();

    let mut here: BTreeSet<TagId> = BTreeSet::new();
    let mut unrostered: BTreeSet<TagId> = BTreeSet::new();
    let mut events = stream.events.into_iter().peekable();
    for (start, block) in &mut blocks {
        // The count carried in from the previous block is one value the
        // occupancy takes during this block, so it seeds the peak.
        block.max_here = here.len();
        block.max_here_list = here.clone();

        while let Some(event) = events.next_if(|e| config.block_start(e.time) == *start) {
            for tag in event.tags_in {
                if roster.class_of(&tag).is_none() {
                    unrostered.insert(tag.clone());
                }
                here.insert(tag.clone());
                block.ins_list.push(tag);
            }
            for tag in event.tags_out {
                if roster.class_of(&tag).is_none() {
                    unrostered.insert(tag.clone());
                }
                // A check-out with no matching check-in is already
                // reported by derivation; the running set just stays put,
                // keeping occupancy non-negative.
                here.remove(&tag);
                block.outs_list.push(tag);
            }
            if here.len() > block.max_here {
                block.max_here = here.len();
                block.max_here_list = here.clone();
            }
        }

        block.num_ins = block.ins_list.len();
        block.num_outs = block.outs_list.len();
        block.here_list = here.clone();
        block.num_here = here.len();

        block.ins_by_class = class_counts(&block.ins_list, roster);
        block.outs_by_class = class_counts(&block.outs_list, roster);
        block.here_by_class = class_counts(&block.here_list, roster);
        block.max_here_by_class = class_counts(&block.max_here_list, roster);
    }

    issues.extend(
        unrostered
            .into_iter()
            .map(|tag| DataIssue::UnrosteredTag { tag }),
    );
    if !issues.is_empty() {
        tracing::debug!(count = issues.len(), "data-quality issues in aggregation");
    }
    Aggregation { blocks, issues }
}

fn class_counts<'a, I>(tags: I, roster: &Roster) -> ClassCounts
where
    I: IntoIterator<Item = &'a TagId>,
{
    let mut counts = ClassCounts::default();
    for tag in tags {
        match roster.class_of(tag) {
            Some(BikeClass::Regular) => counts.regular += 1,
            Some(BikeClass::Oversize) => counts.oversize += 1,
            None => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::Visit;
    use chrono::NaiveDate;

    fn tag(text: &str) -> TagId {
        text.parse().expect("valid test tag")
    }

    fn t(text: &str) -> ClockTime {
        text.parse().expect("valid test time")
    }

    fn day_with(visits: Vec<Visit>) -> Day {
        let mut day = Day::new("org", "site", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        day.visits = visits;
        day
    }

    fn roster_for(regular: &[&str], oversize: &[&str]) -> Roster {
        Roster {
            regular: regular.iter().map(|s| tag(s)).collect(),
            oversize: oversize.iter().map(|s| tag(s)).collect(),
        }
    }

    #[test]
    fn config_rejects_zero_duration() {
        assert_eq!(
            AggregateConfig::new(0),
            Err(AggregateError::InvalidBlockDuration)
        );
        assert!(AggregateConfig::new(15).is_ok());
    }

    #[test]
    fn block_boundaries() {
        let config = AggregateConfig::default();
        assert_eq!(config.block_start(t("10:17")), t("10:00"));
        assert_eq!(config.block_start(t("10:30")), t("10:30"));
        assert_eq!(config.block_end(t("10:17")), t("10:29"));

        let hourly = AggregateConfig::new(60).unwrap();
        assert_eq!(hourly.block_start(t("10:59")), t("10:00"));
        assert_eq!(hourly.block_end(t("10:00")), t("10:59"));
    }

    #[test]
    fn empty_day_yields_no_blocks() {
        let result = aggregate(
            &day_with(vec![]),
            &Roster::default(),
            None,
            AggregateConfig::default(),
        );
        assert!(result.blocks.is_empty());
        assert!(result.issues.is_empty());
    }

    #[test]
    fn single_visit_spans_blocks() {
        let day = day_with(vec![Visit::completed(tag("wa1"), t("10:10"), t("11:40"))]);
        let roster = roster_for(&["wa1"], &[]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        let starts: Vec<ClockTime> = result.blocks.keys().copied().collect();
        assert_eq!(starts, [t("10:00"), t("10:30"), t("11:00"), t("11:30")]);

        let first = &result.blocks[&t("10:00")];
        assert_eq!(first.num_ins, 1);
        assert_eq!(first.num_here, 1);
        assert_eq!(first.max_here, 1);

        // Bike still here through the quiet middle blocks
        let middle = &result.blocks[&t("10:30")];
        assert_eq!(middle.num_ins, 0);
        assert_eq!(middle.num_here, 1);
        assert_eq!(middle.max_here, 1);

        let last = &result.blocks[&t("11:30")];
        assert_eq!(last.num_outs, 1);
        assert_eq!(last.num_here, 0);
        // Peak within the final block is the carried-in bike
        assert_eq!(last.max_here, 1);
    }

    #[test]
    fn peak_can_exceed_block_end_count() {
        // Three bikes overlap mid-block, two leave before it ends
        let day = day_with(vec![
            Visit::completed(tag("wa1"), t("10:00"), t("10:20")),
            Visit::completed(tag("wa2"), t("10:05"), t("10:25")),
            Visit::checked_in(tag("wa3"), t("10:10")),
        ]);
        let roster = roster_for(&["wa1", "wa2", "wa3"], &[]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        let block = &result.blocks[&t("10:00")];
        assert_eq!(block.max_here, 3);
        assert_eq!(
            block.max_here_list,
            [tag("wa1"), tag("wa2"), tag("wa3")].into()
        );
        assert_eq!(block.num_here, 1);
        assert_eq!(block.here_list, [tag("wa3")].into());
    }

    #[test]
    fn invariants_hold_across_blocks() {
        let day = day_with(vec![
            Visit::completed(tag("wa1"), t("09:10"), t("12:40")),
            Visit::completed(tag("wa2"), t("09:55"), t("10:05")),
            Visit::completed(tag("be1"), t("10:02"), t("10:58")),
            Visit::checked_in(tag("be2"), t("11:30")),
        ]);
        let roster = roster_for(&["wa1", "wa2"], &["be1", "be2"]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        let mut total_ins = 0;
        let mut total_outs = 0;
        for block in result.blocks.values() {
            assert!(block.max_here >= block.num_here);
            assert_eq!(block.num_here, block.here_list.len());
            assert!(block.ins_by_class.regular + block.ins_by_class.oversize <= block.num_ins);
            assert!(block.outs_by_class.regular + block.outs_by_class.oversize <= block.num_outs);
            total_ins += block.num_ins;
            total_outs += block.num_outs;
        }
        assert_eq!(total_ins, 4);
        assert_eq!(total_outs, 3);
    }

    #[test]
    fn here_list_chains_between_blocks() {
        let day = day_with(vec![
            Visit::completed(tag("wa1"), t("10:00"), t("11:10")),
            Visit::completed(tag("wa2"), t("10:40"), t("11:20")),
        ]);
        let roster = roster_for(&["wa1", "wa2"], &[]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        // here(t) == (here(t-1) | ins(t)) - outs(t)
        let mut carried: BTreeSet<TagId> = BTreeSet::new();
        for block in result.blocks.values() {
            for tag in &block.ins_list {
                carried.insert(tag.clone());
            }
            for tag in &block.outs_list {
                carried.remove(tag);
            }
            assert_eq!(block.here_list, carried);
        }
    }

    #[test]
    fn category_breakdowns_follow_roster() {
        let day = day_with(vec![
            Visit::completed(tag("wa1"), t("10:00"), t("10:20")),
            Visit::checked_in(tag("be1"), t("10:05")),
            Visit::checked_in(tag("zz1"), t("10:10")), // not on the roster
        ]);
        let roster = roster_for(&["wa1"], &["be1"]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        let block = &result.blocks[&t("10:00")];
        assert_eq!(block.num_ins, 3);
        assert_eq!(block.ins_by_class, ClassCounts { regular: 1, oversize: 1 });
        assert_eq!(block.num_here, 2);
        assert_eq!(block.here_by_class, ClassCounts { regular: 0, oversize: 1 });
        assert!(result
            .issues
            .contains(&DataIssue::UnrosteredTag { tag: tag("zz1") }));
    }

    #[test]
    fn unmatched_checkout_keeps_occupancy_non_negative() {
        let day = day_with(vec![
            Visit {
                tag: tag("wa9"),
                time_in: None,
                time_out: Some(t("10:15")),
                duration: None,
                bike_type: None,
            },
            Visit::checked_in(tag("wa1"), t("10:05")),
        ]);
        let roster = roster_for(&["wa1", "wa9"], &[]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        let block = &result.blocks[&t("10:00")];
        // The stray check-out is counted but never decrements the set
        assert_eq!(block.num_outs, 1);
        assert_eq!(block.num_here, 1);
        assert_eq!(block.here_list, [tag("wa1")].into());
        assert!(result.issues.contains(&DataIssue::CheckOutWithoutCheckIn {
            tag: tag("wa9"),
            time_out: t("10:15"),
        }));
    }

    #[test]
    fn explicit_as_of_excludes_later_events() {
        let day = day_with(vec![
            Visit::completed(tag("wa1"), t("10:00"), t("15:00")),
            Visit::checked_in(tag("wa2"), t("14:00")),
        ]);
        let roster = roster_for(&["wa1", "wa2"], &[]);
        let result = aggregate(&day, &roster, Some(t("11:00")), AggregateConfig::default());

        // Grid runs through as_of even though the last event is at 10:00
        let starts: Vec<ClockTime> = result.blocks.keys().copied().collect();
        assert_eq!(starts, [t("10:00"), t("10:30"), t("11:00")]);
        let total_outs: usize = result.blocks.values().map(|b| b.num_outs).sum();
        assert_eq!(total_outs, 0);
    }

    #[test]
    fn default_as_of_raised_to_closing_time() {
        let mut day = day_with(vec![Visit::completed(tag("wa1"), t("10:00"), t("10:20"))]);
        day.closing_time = Some(t("12:10"));
        let roster = roster_for(&["wa1"], &[]);
        let result = aggregate(&day, &roster, None, AggregateConfig::default());

        // Blocks extend to the one containing closing time
        assert_eq!(
            result.blocks.keys().last().copied(),
            Some(t("12:00"))
        );
    }

    #[test]
    fn same_minute_order_does_not_change_counts() {
        let visits = vec![
            Visit::completed(tag("wa1"), t("10:00"), t("10:30")),
            Visit::completed(tag("wa2"), t("10:30"), t("11:00")),
            Visit::completed(tag("wa3"), t("10:30"), t("10:30")),
        ];
        let mut shuffled = visits.clone();
        shuffled.reverse();
        let roster = roster_for(&["wa1", "wa2", "wa3"], &[]);

        let a = aggregate(&day_with(visits), &roster, None, AggregateConfig::default());
        let b = aggregate(&day_with(shuffled), &roster, None, AggregateConfig::default());
        assert_eq!(a.blocks, b.blocks);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let day = day_with(vec![
            Visit::completed(tag("wa1"), t("09:10"), t("12:40")),
            Visit::checked_in(tag("be2"), t("11:30")),
        ]);
        let roster = roster_for(&["wa1"], &["be2"]);

        let first = aggregate(&day, &roster, None, AggregateConfig::default());
        let second = aggregate(&day, &roster, None, AggregateConfig::default());
        assert_eq!(first, second);
    }
}
