//! Active-page windowing.
//!
//! The active window is the set of pages whose content must be materialized
//! right now: a neighborhood of the current page, biased forward because flip
//! animations reveal the next spread before the current one leaves view.

use serde::Serialize;
use std::ops::Range;

/// Pages kept behind the current page.
pub const WINDOW_BEHIND: u32 = 2;

/// Pages kept ahead of the current page.
pub const WINDOW_AHEAD: u32 = 3;

/// Upper bound on the window length, independent of the page count.
pub const MAX_WINDOW_LEN: u32 = WINDOW_BEHIND + WINDOW_AHEAD + 1;

/// Contiguous, half-open run of page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActiveWindow {
    start: u32,
    end: u32,
}

impl ActiveWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: u32) -> bool {
        (self.start..self.end).contains(&index)
    }

    pub fn indices(&self) -> Range<u32> {
        self.start..self.end
    }
}

/// `{c-2, .., c+3} ∩ [0, n)` with the default radius.
pub fn active_window(current_page_index: u32, page_count: u32) -> ActiveWindow {
    active_window_with(current_page_index, page_count, WINDOW_BEHIND, WINDOW_AHEAD)
}

/// Window with an explicit radius. Callers are responsible for keeping
/// `behind + ahead + 1` bounded.
pub fn active_window_with(
    current_page_index: u32,
    page_count: u32,
    behind: u32,
    ahead: u32,
) -> ActiveWindow {
    if page_count == 0 {
        return ActiveWindow::empty();
    }

    let start = current_page_index.saturating_sub(behind);
    let end = current_page_index.saturating_add(ahead).saturating_add(1).min(page_count);

    if start >= end {
        return ActiveWindow::empty();
    }

    ActiveWindow { start, end }
}

/// Indices that must be materialized and released when the window moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowDiff {
    /// Entering pages, nearest to the current page first, forward before backward.
    pub entering: Vec<u32>,
    pub leaving: Vec<u32>,
}

impl WindowDiff {
    pub fn is_empty(&self) -> bool {
        self.entering.is_empty() && self.leaving.is_empty()
    }
}

pub fn diff_windows(previous: ActiveWindow, next: ActiveWindow, current_page_index: u32) -> WindowDiff {
    let mut entering: Vec<u32> = next.indices().filter(|index| !previous.contains(*index)).collect();
    let leaving = previous.indices().filter(|index| !next.contains(*index)).collect();

    entering.sort_by_key(|index| (index.abs_diff(current_page_index), *index < current_page_index));

    WindowDiff { entering, leaving }
}
