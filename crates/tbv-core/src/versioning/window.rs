//! Version windows of a single resource.
//!
//! A resource's version edges carry half-open windows `[from, to)`. Windows
//! never overlap, leave no gaps after the first `from`, and at most the
//! latest one is open. [`VersionTimeline::insert`] applies the same window
//! maintenance the create rewrite performs in storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, TbvError, TbvResult};
use crate::versioning::clock::format_instant;

/// Validity window of one version edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionWindow {
    /// Inclusive start.
    pub from: DateTime<Utc>,
    /// Exclusive end; `None` while the version is current.
    pub to: Option<DateTime<Utc>>,
}

impl VersionWindow {
    pub fn open(from: DateTime<Utc>) -> Self {
        Self { from, to: None }
    }

    pub fn closed(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to: Some(to) }
    }

    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }

    /// `from <= at AND (to is absent OR at < to)`
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && self.to.map_or(true, |to| at < to)
    }
}

/// Effect of inserting a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowChange {
    /// Window of a version written at the same instant, now replaced.
    pub replaced: Option<VersionWindow>,
    /// Enclosing version as it was before being closed at the new instant.
    pub closed: Option<VersionWindow>,
    /// Window of the new version.
    pub inserted: VersionWindow,
}

/// Ordered version windows of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTimeline {
    windows: Vec<VersionWindow>,
}

impl VersionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from windows in any order.
    pub fn from_windows(windows: impl IntoIterator<Item = VersionWindow>) -> Self {
        let mut windows: Vec<_> = windows.into_iter().collect();
        windows.sort_by_key(|w| w.from);
        Self { windows }
    }

    pub fn windows(&self) -> &[VersionWindow] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// The window a read at `instant` selects.
    pub fn at(&self, instant: DateTime<Utc>) -> Option<&VersionWindow> {
        self.windows.iter().find(|w| w.contains(instant))
    }

    /// The open window, if any.
    pub fn current(&self) -> Option<&VersionWindow> {
        self.windows.iter().find(|w| w.is_open())
    }

    /// Insert a version starting at `at`.
    pub fn insert(&mut self, at: DateTime<Utc>) -> WindowChange {
        let replaced = self
            .windows
            .iter()
            .position(|w| w.from == at)
            .map(|index| self.windows.remove(index));

        let previous = self.windows.iter().position(|w| w.contains(at));
        let next_from = self
            .windows
            .iter()
            .map(|w| w.from)
            .filter(|from| *from > at)
            .min();

        let closed = previous.map(|index| self.windows[index]);
        let inserted = VersionWindow {
            from: at,
            to: closed.and_then(|w| w.to).or(next_from),
        };
        if let Some(index) = previous {
            self.windows[index].to = Some(at);
        }

        let position = self.windows.partition_point(|w| w.from < at);
        self.windows.insert(position, inserted);

        WindowChange {
            replaced,
            closed,
            inserted,
        }
    }

    /// Check that windows are well-formed, contiguous and non-overlapping.
    pub fn validate(&self) -> TbvResult<()> {
        for window in &self.windows {
            if let Some(to) = window.to {
                if to <= window.from {
                    return Err(TbvError::invariant(
                        ErrorCode::VerInvalidWindow,
                        format!(
                            "window [{}, {}) is empty",
                            format_instant(window.from),
                            format_instant(to)
                        ),
                    ));
                }
            }
        }

        for pair in self.windows.windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            match earlier.to {
                None if later.is_open() => {
                    return Err(TbvError::invariant(
                        ErrorCode::VerMultipleOpen,
                        format!(
                            "versions from {} and {} are both open",
                            format_instant(earlier.from),
                            format_instant(later.from)
                        ),
                    ));
                }
                None => {
                    return Err(TbvError::invariant(
                        ErrorCode::VerOverlap,
                        format!(
                            "open version from {} overlaps version from {}",
                            format_instant(earlier.from),
                            format_instant(later.from)
                        ),
                    ));
                }
                Some(to) if to > later.from => {
                    return Err(TbvError::invariant(
                        ErrorCode::VerOverlap,
                        format!(
                            "version ending {} overlaps version from {}",
                            format_instant(to),
                            format_instant(later.from)
                        ),
                    ));
                }
                Some(to) if to < later.from => {
                    return Err(TbvError::invariant(
                        ErrorCode::VerGap,
                        format!(
                            "no version between {} and {}",
                            format_instant(to),
                            format_instant(later.from)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
