// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Write tracking for a single visit or path operation.

/// Counts writes made during one operation.
///
/// A fresh tracker is created per top-level visit, handed down through nested
/// containers, and discarded afterwards. Property accessors use it to decide
/// whether a temporary copy of a value needs to be written back to its
/// container.
///
/// ```rust
/// use understory_properties::ChangeTracker;
///
/// let mut tracker = ChangeTracker::new();
/// assert!(!tracker.is_changed());
/// tracker.mark_changed();
/// tracker.merge(true);
/// assert!(tracker.is_changed());
/// assert_eq!(tracker.version(), 2);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u32,
}

impl ChangeTracker {
    /// A tracker that has seen no writes.
    #[must_use]
    pub const fn new() -> Self {
        Self { version: 0 }
    }

    /// Records a write.
    pub fn mark_changed(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    /// Records a write if `changed` is set; used to fold in a nested result.
    pub fn merge(&mut self, changed: bool) {
        if changed {
            self.mark_changed();
        }
    }

    /// Returns `true` once any write was recorded.
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        self.version != 0
    }

    /// Number of recorded writes.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }
}
