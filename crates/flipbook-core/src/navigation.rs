//! Navigation state machine
//!
//! Navigation intents only *request* a move; the current page index changes
//! exclusively when the animation engine confirms a position. While a command
//! is in flight, newer intents are coalesced so rapid input never floods the
//! engine: only the latest one is issued once the engine settles.

use crate::engine::PageFlip;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationIntent {
    GoTo(u32),
    Next,
    Previous,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Idle,
    AwaitingEngineConfirmation(NavigationIntent),
}

/// What happened to an intent handed to [`Navigator::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    Issued,
    /// Queued behind the in-flight command, replacing any earlier queued intent.
    Coalesced,
    /// Boundary or no-op; nothing reached the engine.
    Rejected,
}

/// `Centered` while the cover is shown, `Spread` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    Centered,
    Spread,
}

/// Two pages side by side, or one page at a time on narrow viewports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    #[default]
    Spread,
    SinglePage,
}

/// Which navigation controls are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Affordances {
    pub first: bool,
    pub previous: bool,
    pub next: bool,
    pub last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Scroll down pages forward, scroll up pages back. Zero is no scroll.
    pub fn from_delta(delta_y: f32) -> Option<Self> {
        if delta_y > 0.0 {
            Some(Self::Down)
        } else if delta_y < 0.0 {
            Some(Self::Up)
        } else {
            None
        }
    }

    pub fn intent(self) -> NavigationIntent {
        match self {
            Self::Down => NavigationIntent::Next,
            Self::Up => NavigationIntent::Previous,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    current: u32,
    page_count: u32,
    presentation: Presentation,
    state: NavigationState,
    queued: Option<NavigationIntent>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: 0,
            page_count: 0,
            presentation: Presentation::Spread,
            state: NavigationState::Idle,
            queued: None,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    /// Presentation survives document changes; it follows the viewport.
    pub fn set_presentation(&mut self, presentation: Presentation) {
        self.presentation = presentation;
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn queued_intent(&self) -> Option<NavigationIntent> {
        self.queued
    }

    pub fn is_idle(&self) -> bool {
        self.state == NavigationState::Idle
    }

    /// Start over for a new document: cover page, nothing in flight.
    pub fn reset(&mut self, page_count: u32) {
        self.current = 0;
        self.page_count = page_count;
        self.state = NavigationState::Idle;
        self.queued = None;
    }

    pub fn layout_mode(&self) -> LayoutMode {
        if self.current == 0 {
            LayoutMode::Centered
        } else {
            LayoutMode::Spread
        }
    }

    /// Last position the book can settle on. An odd page count in a spread
    /// ends on a two-page spread reported by its left page.
    pub fn final_position(&self) -> Option<u32> {
        let last = self.page_count.checked_sub(1)?;

        Some(match self.presentation {
            Presentation::Spread if last > 0 && last % 2 == 0 => last - 1,
            _ => last,
        })
    }

    pub fn affordances(&self) -> Affordances {
        let Some(end) = self.final_position() else {
            return Affordances::default();
        };

        let back = self.current > 0;
        let forward = self.current < end;

        Affordances { first: back, previous: back, next: forward, last: forward }
    }

    /// Target page for `intent` from the current position, or `None` when the
    /// intent is rejected by the boundary policy or would not move.
    pub fn resolve(&self, intent: NavigationIntent) -> Option<u32> {
        let last = self.page_count.checked_sub(1)?;
        let end = self.final_position()?;
        let current = self.current;

        let target = match intent {
            NavigationIntent::GoTo(index) => index.min(last),
            NavigationIntent::Next if current >= end => return None,
            NavigationIntent::Next => current + 1,
            NavigationIntent::Previous if current == 0 => return None,
            NavigationIntent::Previous => current - 1,
            NavigationIntent::First => 0,
            NavigationIntent::Last if current >= end => return None,
            NavigationIntent::Last => end,
        };

        (target != current).then_some(target)
    }

    pub fn request<E>(&mut self, intent: NavigationIntent, engine: &mut E) -> IntentOutcome
    where
        E: PageFlip + ?Sized,
    {
        if let NavigationState::AwaitingEngineConfirmation(in_flight) = self.state {
            tracing::debug!(?intent, ?in_flight, "coalescing navigation intent");
            self.queued = Some(intent);
            return IntentOutcome::Coalesced;
        }

        self.issue(intent, engine)
    }

    /// The engine settled on `index`. Returns `true` when the current page changed.
    ///
    /// Also accepts engine-originated moves (a dragged page corner) while idle.
    pub fn on_position_changed<E>(&mut self, index: u32, engine: &mut E) -> bool
    where
        E: PageFlip + ?Sized,
    {
        let Some(last) = self.page_count.checked_sub(1) else {
            tracing::debug!(index, "position event without a document");
            return false;
        };

        let index = index.min(last);
        let changed = index != self.current;
        self.current = index;
        self.state = NavigationState::Idle;

        if let Some(queued) = self.queued.take() {
            self.issue(queued, engine);
        }

        changed
    }

    /// Give up on the in-flight command when the host knows the engine dropped it.
    pub fn abandon_pending(&mut self) -> Option<NavigationIntent> {
        let NavigationState::AwaitingEngineConfirmation(intent) = self.state else {
            return None;
        };

        self.state = NavigationState::Idle;
        self.queued = None;
        Some(intent)
    }

    /// 1-based label for the visible page(s).
    pub fn page_label(&self) -> String {
        if self.page_count == 0 {
            return String::new();
        }

        let first = self.current + 1;
        let alone = self.current == 0 || first >= self.page_count;

        match self.presentation {
            Presentation::Spread if !alone => format!("{}-{}", first, first + 1),
            _ => first.to_string(),
        }
    }

    fn issue<E>(&mut self, intent: NavigationIntent, engine: &mut E) -> IntentOutcome
    where
        E: PageFlip + ?Sized,
    {
        let Some(target) = self.resolve(intent) else {
            tracing::debug!(?intent, current = self.current, "navigation intent rejected");
            return IntentOutcome::Rejected;
        };

        match intent {
            NavigationIntent::Next => engine.flip_next(),
            NavigationIntent::Previous => engine.flip_previous(),
            NavigationIntent::GoTo(_) | NavigationIntent::First | NavigationIntent::Last => {
                engine.flip_to_index(target)
            }
        }

        tracing::debug!(?intent, target, "navigation intent issued");
        self.state = NavigationState::AwaitingEngineConfirmation(intent);
        IntentOutcome::Issued
    }
}
