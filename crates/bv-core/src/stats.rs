//! Visit-duration and time-of-day statistics.
//!
//! All functions here are pure and stateless. They accept any mix of
//! value forms through the [`ToMinutes`] seam (clock times, integer
//! minutes, `HH:MM` text); values that fail coercion are discarded as a
//! data-quality matter, never an error. A non-positive category width
//! is programmer misuse and fails fast.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::time::{ClockTime, ToMinutes};

/// Bucket size in minutes unless the caller chooses otherwise.
pub const DEFAULT_CATEGORY_WIDTH: u16 = 30;

/// Programmer-misuse errors from the statistics functions.
///
/// Distinct from data-quality conditions, which are absorbed by
/// excluding the offending value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("category width must be positive, got {width}")]
    InvalidCategoryWidth { width: u16 },
}

/// The modal duration(s) of a value list.
///
/// Every category achieving the maximum count appears, represented by
/// its center time; ties never collapse to an arbitrary single pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modes {
    /// Category centers (`start + width / 2`), sorted ascending.
    pub centers: Vec<ClockTime>,
    /// How many values fell in each modal category.
    pub count: usize,
}

impl Modes {
    /// True when the input had no coercible values at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// Frequency histogram: counts keyed by category start, where a value
/// `v` belongs to category `floor(v / width) * width`.
pub fn frequency<I>(values: I, category_width: u16) -> Result<BTreeMap<u16, usize>, StatsError>
where
    I: IntoIterator,
    I::Item: ToMinutes,
{
    if category_width == 0 {
        return Err(StatsError::InvalidCategoryWidth { width: 0 });
    }
    let mut counts = BTreeMap::new();
    for value in values {
        let Some(minutes) = value.to_minutes() else {
            tracing::trace!("discarding uncoercible value from frequency input");
            continue;
        };
        let category = (minutes / category_width) * category_width;
        *counts.entry(category).or_insert(0) += 1;
    }
    Ok(counts)
}

/// The mode(s) of a value list, with categories of `category_width`
/// minutes treated as identical.
///
/// An empty (or entirely uncoercible) input yields empty centers and a
/// count of zero.
pub fn modes<I>(values: I, category_width: u16) -> Result<Modes, StatsError>
where
    I: IntoIterator,
    I::Item: ToMinutes,
{
    let freq = frequency(values, category_width)?;
    let Some(count) = freq.values().max().copied() else {
        return Ok(Modes {
            centers: Vec::new(),
            count: 0,
        });
    };
    let centers = freq
        .iter()
        .filter(|(_, c)| **c == count)
        .map(|(start, _)| ClockTime::clamped(start + category_width / 2))
        .collect();
    Ok(Modes { centers, count })
}

/// Frequency distribution constrained to a display range.
///
/// Categories below `start` fold into the `start` bucket and its label
/// gains a trailing `-`; categories above `end` fold into the `end`
/// bucket, labelled with a trailing `+`. Omitted bounds default to the
/// natural minimum/maximum observed category, with no folding or
/// decoration. Buckets are returned ascending by category start,
/// zero-count grid buckets included.
pub fn distribution<I>(
    values: I,
    start: Option<ClockTime>,
    end: Option<ClockTime>,
    category_width: u16,
) -> Result<Vec<(String, usize)>, StatsError>
where
    I: IntoIterator,
    I::Item: ToMinutes,
{
    let freq = frequency(values, category_width)?;
    let (Some(natural_min), Some(natural_max)) =
        (freq.keys().next().copied(), freq.keys().last().copied())
    else {
        return Ok(Vec::new());
    };
    let start = start.map_or(natural_min, ClockTime::minutes);
    let end = end.map_or(natural_max, ClockTime::minutes);
    if start > end {
        return Ok(Vec::new());
    }

    let mut buckets: BTreeMap<u16, usize> = (start..=end)
        .step_by(usize::from(category_width))
        .map(|m| (m, 0))
        .collect();
    let mut folded_low = false;
    let mut folded_high = false;
    for (category, count) in freq {
        if category < start {
            *buckets.entry(start).or_insert(0) += count;
            folded_low = true;
        } else if category > end {
            *buckets.entry(end).or_insert(0) += count;
            folded_high = true;
        } else {
            // In-range categories keep their natural key even when the
            // caller's range is not aligned to the category grid.
            *buckets.entry(category).or_insert(0) += count;
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(category, count)| {
            let mut label = ClockTime::clamped(category).to_string();
            if category == start && folded_low {
                label.push('-');
            }
            if category == end && folded_high {
                label.push('+');
            }
            (label, count)
        })
        .collect())
}
