//! Version instants and version windows.
//!
//! Every write is anchored at an instant and every read is evaluated at one.
//! The storage engine holds the windows; this module provides the clock that
//! picks instants and an in-process model of a resource's windows for
//! auditing what storage returns.

mod clock;
mod window;

pub use clock::{format_instant, instant_value, normalize_instant, parse_instant, VersionClock};
pub use window::{VersionTimeline, VersionWindow, WindowChange};
