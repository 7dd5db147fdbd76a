// src/schedule/mod.rs

//! Timeline scheduling.
//!
//! - [`layout`] turns a task collection plus an anchor date into start/end
//!   dates and display lanes, tolerating dependency cycles.
//! - [`editor`] is the interactive working copy (reschedule, reorder, link)
//!   with undo, committed back as a new plan revision.

pub mod editor;
pub mod layout;

pub use editor::{LinkOutcome, ScheduleEditor};
pub use layout::{layout, Placement, Timeline};
