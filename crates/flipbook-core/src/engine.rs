//! Contract with the external page-flip animation engine.

use crate::navigation::Presentation;
use crate::surface::SlotView;

/// Commands the navigation state machine forwards to the engine.
pub trait PageFlip {
    fn flip_to_index(&mut self, index: u32);
    fn flip_next(&mut self);
    fn flip_previous(&mut self);
}

/// Something the engine reports back to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The flip settled and `index` is now the current page.
    PositionChanged(u32),
}

/// The animation engine collaborator.
///
/// Besides the flip commands it receives the ordered renderable slots whenever
/// they change, and the presentation when the viewport crosses the narrow
/// breakpoint. Engines that report positions through the host instead of
/// [`AnimationEngine::poll_events`] keep the default.
pub trait AnimationEngine<S>: PageFlip {
    fn set_presentation(&mut self, _presentation: Presentation) {}

    fn update_slots(&mut self, _slots: &[SlotView<'_, S>]) {}

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipCommand {
    ToIndex(u32),
    Next,
    Previous,
}

/// Headless engine that settles every flip immediately.
///
/// Models a cover-first book: the cover stands alone and the following pages
/// pair up as `(1, 2)`, `(3, 4)`, .. in a spread, reporting the left page of
/// each spread as the position. In single-page presentation every flip moves
/// exactly one page. Every command produces a position event, even when the
/// book cannot move.
#[derive(Debug, Clone, Default)]
pub struct InstantEngine {
    position: u32,
    page_count: u32,
    presentation: Presentation,
    commands: Vec<FlipCommand>,
    events: Vec<EngineEvent>,
}

impl InstantEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn commands(&self) -> &[FlipCommand] {
        &self.commands
    }

    fn spread_start(&self, index: u32) -> u32 {
        match self.presentation {
            Presentation::SinglePage => index,
            Presentation::Spread if index == 0 || index % 2 == 1 => index,
            Presentation::Spread => index - 1,
        }
    }

    fn settle(&mut self, target: u32) {
        let last = self.page_count.saturating_sub(1);
        self.position = self.spread_start(target.min(last));
        self.events.push(EngineEvent::PositionChanged(self.position));
    }
}

impl PageFlip for InstantEngine {
    fn flip_to_index(&mut self, index: u32) {
        self.commands.push(FlipCommand::ToIndex(index));
        self.settle(index);
    }

    fn flip_next(&mut self) {
        self.commands.push(FlipCommand::Next);
        let step = match self.presentation {
            Presentation::SinglePage => 1,
            Presentation::Spread if self.position == 0 => 1,
            Presentation::Spread => 2,
        };
        let target = self.position.saturating_add(step);
        if target >= self.page_count {
            self.settle(self.position);
        } else {
            self.settle(target);
        }
    }

    fn flip_previous(&mut self) {
        self.commands.push(FlipCommand::Previous);
        let target = match self.presentation {
            Presentation::SinglePage => self.position.saturating_sub(1),
            Presentation::Spread => match self.spread_start(self.position) {
                0 | 1 => 0,
                start => start - 2,
            },
        };
        self.settle(target);
    }
}

impl<S> AnimationEngine<S> for InstantEngine {
    fn set_presentation(&mut self, presentation: Presentation) {
        self.presentation = presentation;
    }

    fn update_slots(&mut self, slots: &[SlotView<'_, S>]) {
        self.page_count = slots.len() as u32;
        self.position = self.position.min(self.page_count.saturating_sub(1));
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}
