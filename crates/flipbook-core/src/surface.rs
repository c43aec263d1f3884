//! Flipbook surface
//!
//! Composes the viewport tracker, the navigation state machine, the active
//! window and the document session, and turns their state into a render
//! plan. It holds no page state of its own.
//!
//! All input arrives as [`FlipbookEvent`]s processed strictly in order by
//! [`Flipbook::pump`]. Collaborators never call back into the surface; their
//! results are polled and queued behind whatever event is being handled, so a
//! reconciliation triggered while another one runs always waits its turn.

use crate::config::FlipbookConfig;
use crate::decoder::{DecoderEvent, DocumentSource, OpenTicket, PageDecoder};
use crate::engine::{AnimationEngine, EngineEvent};
use crate::error::DecodeError;
use crate::navigation::{
    Affordances, IntentOutcome, LayoutMode, NavigationIntent, Navigator, Presentation,
    ScrollDirection,
};
use crate::session::{DocumentSession, DocumentStatus, Materialization, PageSlot, SlotState};
use crate::viewport::{ContainerId, ViewportTracker};
use crate::window::{active_window_with, diff_windows, ActiveWindow};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug)]
pub enum FlipbookEvent<S> {
    Navigate(NavigationIntent),
    Scroll { delta_y: f32 },
    SelectThumbnail(u32),
    PositionChanged(u32),
    Resized { container: ContainerId, width: f32 },
    Retry(u32),
    RetryThumbnail(u32),
    Decoder(DecoderEvent<S>),
}

/// What to draw for one slot.
#[derive(Debug)]
pub enum SlotContent<'a, S> {
    Painted { surface: &'a S, width: f32 },
    /// Sized by the page's aspect ratio so arriving content does not shift layout.
    Placeholder { aspect_ratio: f32, state: Materialization },
}

impl<S> SlotContent<'_, S> {
    pub fn is_painted(&self) -> bool {
        matches!(self, Self::Painted { .. })
    }

    pub fn materialization(&self) -> Materialization {
        match self {
            Self::Painted { .. } => Materialization::Ready,
            Self::Placeholder { state, .. } => *state,
        }
    }

    /// Failed slots offer a retry control.
    pub fn retry_eligible(&self) -> bool {
        matches!(self, Self::Placeholder { state: Materialization::Failed, .. })
    }
}

#[derive(Debug)]
pub struct SlotView<'a, S> {
    pub index: u32,
    pub content: SlotContent<'a, S>,
}

/// Book size and the horizontal shift applied while the cover is centered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BookGeometry {
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
}

/// Whole-surface state. Anything but `Ready` replaces the flipbook entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanStatus<'a> {
    Empty,
    Loading,
    Failed(&'a DecodeError),
    Ready,
}

#[derive(Debug)]
pub struct RenderPlan<'a, S> {
    pub status: PlanStatus<'a>,
    pub current_page: u32,
    pub page_count: u32,
    pub window: ActiveWindow,
    pub layout: LayoutMode,
    pub presentation: Presentation,
    pub geometry: BookGeometry,
    pub affordances: Affordances,
    pub page_label: String,
    pub slots: Vec<SlotView<'a, S>>,
    pub thumbnails: Vec<SlotView<'a, S>>,
}

pub struct Flipbook<D, E>
where
    D: PageDecoder,
    E: AnimationEngine<D::Surface>,
{
    config: FlipbookConfig,
    session: DocumentSession<D>,
    navigator: Navigator,
    viewport: ViewportTracker,
    engine: E,
    window: ActiveWindow,
    presentation: Presentation,
    events: VecDeque<FlipbookEvent<D::Surface>>,
}

impl<D, E> Flipbook<D, E>
where
    D: PageDecoder,
    E: AnimationEngine<D::Surface>,
{
    /// Compose a flipbook. The decoder's one-time initialization happens here.
    pub fn new(config: FlipbookConfig, mut decoder: D, mut engine: E) -> Result<Self, DecodeError> {
        decoder.initialize()?;

        let presentation = Presentation::Spread;
        engine.set_presentation(presentation);
        let mut navigator = Navigator::new();
        navigator.set_presentation(presentation);

        Ok(Self {
            config,
            session: DocumentSession::new(decoder),
            navigator,
            viewport: ViewportTracker::observe(None),
            engine,
            window: ActiveWindow::empty(),
            presentation,
            events: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &FlipbookConfig {
        &self.config
    }

    pub fn session(&self) -> &DocumentSession<D> {
        &self.session
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        self.session.decoder_mut()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn viewport(&self) -> &ViewportTracker {
        &self.viewport
    }

    /// Observe a new container, releasing the previous one.
    pub fn observe(&mut self, container: Option<ContainerId>) {
        self.viewport.release();
        self.viewport = ViewportTracker::observe(container);
    }

    /// Replace the document. Everything from the previous one is discarded.
    pub fn open(&mut self, source: DocumentSource) -> OpenTicket {
        self.navigator.reset(0);
        self.window = ActiveWindow::empty();
        let ticket = self.session.open(source);
        self.repaint();
        ticket
    }

    pub fn post(&mut self, event: FlipbookEvent<D::Surface>) {
        self.events.push_back(event);
    }

    /// Process queued events and collaborator output until everything settles.
    /// Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;

        loop {
            while let Some(event) = self.events.pop_front() {
                self.handle(event);
                handled += 1;
            }

            let decoded = self.session.poll_decoder();
            let moved = self.engine.poll_events();
            if decoded.is_empty() && moved.is_empty() {
                break;
            }

            self.events.extend(decoded.into_iter().map(FlipbookEvent::Decoder));
            self.events.extend(moved.into_iter().map(|event| match event {
                EngineEvent::PositionChanged(index) => FlipbookEvent::PositionChanged(index),
            }));
        }

        handled
    }

    pub fn dispatch(&mut self, event: FlipbookEvent<D::Surface>) -> usize {
        self.post(event);
        self.pump()
    }

    pub fn navigate(&mut self, intent: NavigationIntent) -> usize {
        self.dispatch(FlipbookEvent::Navigate(intent))
    }

    pub fn scroll(&mut self, delta_y: f32) -> usize {
        self.dispatch(FlipbookEvent::Scroll { delta_y })
    }

    pub fn select_thumbnail(&mut self, page_index: u32) -> usize {
        self.dispatch(FlipbookEvent::SelectThumbnail(page_index))
    }

    pub fn position_changed(&mut self, page_index: u32) -> usize {
        self.dispatch(FlipbookEvent::PositionChanged(page_index))
    }

    pub fn resize(&mut self, container: ContainerId, width: f32) -> usize {
        self.dispatch(FlipbookEvent::Resized { container, width })
    }

    pub fn retry(&mut self, page_index: u32) -> usize {
        self.dispatch(FlipbookEvent::Retry(page_index))
    }

    pub fn retry_thumbnail(&mut self, page_index: u32) -> usize {
        self.dispatch(FlipbookEvent::RetryThumbnail(page_index))
    }

    /// Stop waiting on an engine that dropped the last flip command.
    pub fn abandon_pending(&mut self) -> Option<NavigationIntent> {
        let abandoned = self.navigator.abandon_pending();
        if let Some(intent) = abandoned {
            tracing::warn!(?intent, "abandoned unconfirmed navigation");
        }
        abandoned
    }

    pub fn current_page(&self) -> u32 {
        self.navigator.current_page()
    }

    pub fn page_count(&self) -> u32 {
        self.session.page_count()
    }

    pub fn active_window(&self) -> ActiveWindow {
        self.window
    }

    pub fn layout_mode(&self) -> LayoutMode {
        self.navigator.layout_mode()
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn affordances(&self) -> Affordances {
        self.navigator.affordances()
    }

    pub fn page_label(&self) -> String {
        self.navigator.page_label()
    }

    /// Width painted pages are drawn at: the viewport, capped at the configured maximum.
    pub fn paint_width(&self) -> f32 {
        paint_width(&self.config, self.measured_width())
    }

    /// Latest viewport width, if it is usable for layout. A zero-width
    /// container is still mounting or hidden and counts as unmeasured.
    pub fn measured_width(&self) -> Option<f32> {
        self.viewport.width().filter(|width| *width > 0.0)
    }

    pub fn book_geometry(&self) -> BookGeometry {
        let (width, height) = match self.presentation {
            Presentation::Spread => (self.config.book_width, self.config.book_height),
            Presentation::SinglePage => {
                let viewport = self.measured_width().unwrap_or(self.config.book_width);
                ((viewport - self.config.narrow_gutter).max(0.0), self.config.narrow_book_height)
            }
        };

        let offset_x = match self.layout_mode() {
            LayoutMode::Centered => -0.25 * width,
            LayoutMode::Spread => 0.0,
        };

        BookGeometry { width, height, offset_x }
    }

    pub fn render_plan(&self) -> RenderPlan<'_, D::Surface> {
        let status = match self.session.status() {
            DocumentStatus::Empty => PlanStatus::Empty,
            DocumentStatus::Loading => PlanStatus::Loading,
            DocumentStatus::Failed(error) => PlanStatus::Failed(error),
            DocumentStatus::Ready => PlanStatus::Ready,
        };

        let (slots, thumbnails) = if status == PlanStatus::Ready {
            let thumbnails = if self.config.thumbnails {
                thumbnail_views(&self.session, &self.config)
            } else {
                Vec::new()
            };
            (slot_views(&self.session, &self.config, self.paint_width()), thumbnails)
        } else {
            (Vec::new(), Vec::new())
        };

        RenderPlan {
            status,
            current_page: self.current_page(),
            page_count: self.page_count(),
            window: self.window,
            layout: self.layout_mode(),
            presentation: self.presentation,
            geometry: self.book_geometry(),
            affordances: self.affordances(),
            page_label: self.page_label(),
            slots,
            thumbnails,
        }
    }

    fn handle(&mut self, event: FlipbookEvent<D::Surface>) {
        match event {
            FlipbookEvent::Navigate(intent) => {
                self.request(intent);
            }
            FlipbookEvent::Scroll { delta_y } => {
                if let Some(direction) = ScrollDirection::from_delta(delta_y) {
                    self.request(direction.intent());
                }
            }
            FlipbookEvent::SelectThumbnail(page_index) => {
                self.request(NavigationIntent::GoTo(page_index));
            }
            FlipbookEvent::PositionChanged(page_index) => {
                if self.navigator.on_position_changed(page_index, &mut self.engine) {
                    self.reconcile();
                }
            }
            FlipbookEvent::Resized { container, width } => {
                if self.viewport.record(container, width) {
                    let latest = self.viewport.widths().last();
                    tracing::debug!(?latest, "viewport resized");
                    self.reconcile();
                }
            }
            FlipbookEvent::Retry(page_index) => {
                if self.session.retry(page_index) && self.window.contains(page_index) {
                    self.materialize(page_index);
                    self.repaint();
                }
            }
            FlipbookEvent::RetryThumbnail(page_index) => {
                if self.config.thumbnails && self.session.retry_thumbnail(page_index) {
                    let width = self.config.thumbnail_width;
                    if let Err(error) = self.session.materialize_thumbnail(page_index, width) {
                        tracing::error!(%error, "thumbnail retry outside the document");
                    }
                }
            }
            FlipbookEvent::Decoder(DecoderEvent::Opened { ticket, result }) => {
                if self.session.finish_open(ticket, result) {
                    self.navigator.reset(self.session.page_count());
                    self.window = ActiveWindow::empty();
                    if self.config.thumbnails {
                        self.request_thumbnails();
                    }
                    self.reconcile();
                }
            }
            FlipbookEvent::Decoder(DecoderEvent::PageLoaded { ticket, result }) => {
                if self.session.complete_page(ticket, result).is_some() {
                    self.repaint();
                }
            }
        }
    }

    fn request(&mut self, intent: NavigationIntent) -> IntentOutcome {
        self.navigator.request(intent, &mut self.engine)
    }

    /// Recompute the window, materialize entering pages, release leaving
    /// ones, and push the new slot list to the engine.
    #[tracing::instrument(level = "trace", skip(self), fields(current = self.navigator.current_page()))]
    fn reconcile(&mut self) {
        let current = self.navigator.current_page();
        let (behind, ahead) = self.config.window_radius();
        let next = active_window_with(current, self.session.page_count(), behind, ahead);

        let diff = diff_windows(self.window, next, current);
        self.window = next;

        if !diff.is_empty() {
            tracing::debug!(entering = ?diff.entering, leaving = ?diff.leaving, "active window moved");
        }

        for page_index in diff.leaving {
            self.session.release(page_index);
        }

        for page_index in diff.entering {
            self.materialize(page_index);
        }

        let presentation = self.compute_presentation();
        if presentation != self.presentation {
            tracing::debug!(?presentation, "presentation changed");
            self.presentation = presentation;
            self.navigator.set_presentation(presentation);
            self.engine.set_presentation(presentation);
        }

        self.repaint();
    }

    fn materialize(&mut self, page_index: u32) {
        let width = self.paint_width();
        if let Err(error) = self.session.materialize(page_index, width) {
            tracing::error!(%error, "active window requested a page outside the document");
            debug_assert!(false, "active window requested a page outside the document: {error}");
        }
    }

    fn request_thumbnails(&mut self) {
        let width = self.config.thumbnail_width;
        for page_index in 0..self.session.page_count() {
            if let Err(error) = self.session.materialize_thumbnail(page_index, width) {
                tracing::error!(%error, "thumbnail request outside the document");
            }
        }
    }

    fn compute_presentation(&self) -> Presentation {
        match self.measured_width() {
            Some(width) if width < self.config.narrow_breakpoint => Presentation::SinglePage,
            _ => Presentation::Spread,
        }
    }

    fn repaint(&mut self) {
        let slots = match self.session.status() {
            DocumentStatus::Ready => {
                let width = paint_width(&self.config, self.measured_width());
                slot_views(&self.session, &self.config, width)
            }
            _ => Vec::new(),
        };
        self.engine.update_slots(&slots);
    }
}

fn paint_width(config: &FlipbookConfig, measured: Option<f32>) -> f32 {
    measured.map_or(config.max_page_width, |width| width.min(config.max_page_width))
}

fn slot_views<'a, D: PageDecoder>(
    session: &'a DocumentSession<D>,
    config: &FlipbookConfig,
    width: f32,
) -> Vec<SlotView<'a, D::Surface>> {
    session
        .slots()
        .iter()
        .map(|slot| view(session, config, slot, width))
        .collect()
}

fn thumbnail_views<'a, D: PageDecoder>(
    session: &'a DocumentSession<D>,
    config: &FlipbookConfig,
) -> Vec<SlotView<'a, D::Surface>> {
    session
        .thumbnails()
        .iter()
        .map(|slot| view(session, config, slot, config.thumbnail_width))
        .collect()
}

fn view<'a, D: PageDecoder>(
    session: &DocumentSession<D>,
    config: &FlipbookConfig,
    slot: &'a PageSlot<D::Surface>,
    width: f32,
) -> SlotView<'a, D::Surface> {
    let content = match slot.state() {
        SlotState::Ready(surface) => SlotContent::Painted { surface, width },
        _ => SlotContent::Placeholder {
            aspect_ratio: session
                .page_size(slot.index())
                .and_then(|size| size.aspect_ratio())
                .unwrap_or(config.default_aspect_ratio),
            state: slot.materialization(),
        },
    };

    SlotView { index: slot.index(), content }
}
