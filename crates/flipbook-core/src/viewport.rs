//! Viewport width tracking
//!
//! The host forwards container resize notifications; the tracker keeps the
//! latest width as the single authoritative value and queues every change so
//! it can be consumed as a lazy sequence.

use std::collections::VecDeque;

/// Opaque identifier of the hosting container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

#[derive(Debug, Clone, Default)]
pub struct ViewportTracker {
    container: Option<ContainerId>,
    latest: Option<f32>,
    pending: VecDeque<f32>,
}

impl ViewportTracker {
    /// Start observing a container. `None` is a valid transient state during
    /// mount: the tracker then yields nothing.
    pub fn observe(container: Option<ContainerId>) -> Self {
        Self { container, latest: None, pending: VecDeque::new() }
    }

    pub fn container(&self) -> Option<ContainerId> {
        self.container
    }

    pub fn is_observing(&self) -> bool {
        self.container.is_some()
    }

    /// Record a content-box width reported for `container`.
    ///
    /// Returns `true` when the width changed. Notifications for other
    /// containers, after release, or with non-finite or negative widths are
    /// ignored.
    pub fn record(&mut self, container: ContainerId, width: f32) -> bool {
        if self.container != Some(container) || !width.is_finite() || width < 0.0 {
            return false;
        }

        if self.latest == Some(width) {
            return false;
        }

        self.latest = Some(width);
        self.pending.push_back(width);
        true
    }

    /// Latest observed width, if any.
    pub fn width(&self) -> Option<f32> {
        self.latest
    }

    /// Widths observed since the last drain, oldest first.
    pub fn widths(&mut self) -> Widths<'_> {
        Widths { pending: &mut self.pending }
    }

    /// Stop observing. The last width stays readable; nothing new is recorded.
    pub fn release(&mut self) {
        self.container = None;
        self.pending.clear();
    }
}

/// Lazy sequence of width changes.
pub struct Widths<'a> {
    pending: &'a mut VecDeque<f32>,
}

impl Iterator for Widths<'_> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.pending.pop_front()
    }
}
