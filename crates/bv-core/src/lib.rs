//! Core domain logic for bike-valet day tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Day/Visit data holders, populated by source-specific readers
//! - Event-stream derivation and time-block occupancy aggregation
//! - Visit statistics: frequency histograms, modes, and distributions
//!
//! The engine is purely computational: one aggregation call does no I/O,
//! never mutates its inputs, and is referentially transparent.

pub mod block;
pub mod day;
pub mod event;
pub mod stats;
pub mod tag;
pub mod time;

pub use block::{
    Aggregation, AggregateConfig, AggregateError, Block, ClassCounts, DEFAULT_BLOCK_DURATION,
    aggregate,
};
pub use day::{BikeClass, DataIssue, Day, Roster, Visit};
pub use event::{DayEvent, EventStream, derive_events};
pub use stats::{DEFAULT_CATEGORY_WIDTH, Modes, StatsError, distribution, frequency, modes};
pub use tag::{TagError, TagId};
pub use time::{ClockTime, MINUTES_PER_DAY, TimeError, ToMinutes};
