//! Scripted collaborators for unit tests.

use crate::decoder::{
    DecoderEvent, DocumentInfo, DocumentSource, OpenTicket, PageDecoder, PageRequest, PageSize,
    RenderKind,
};
use crate::engine::{AnimationEngine, FlipCommand, PageFlip};
use crate::error::DecodeError;
use crate::navigation::Presentation;
use crate::surface::SlotView;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestSurface {
    pub page_index: u32,
    pub width: f32,
}

/// Holds every request until the test resolves it, in whatever order it likes.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDecoder {
    pub initialized: usize,
    pub opens: Vec<OpenTicket>,
    pub requests: Vec<PageRequest>,
    outstanding: Vec<PageRequest>,
    ready: Vec<DecoderEvent<TestSurface>>,
}

impl ScriptedDecoder {
    pub fn info(page_count: u32) -> DocumentInfo {
        DocumentInfo::new(vec![PageSize::new(600.0, 400.0); page_count as usize])
    }

    pub fn resolve_open(&mut self, info: DocumentInfo) {
        let ticket = *self.opens.last().expect("no open to resolve");
        self.ready.push(DecoderEvent::Opened { ticket, result: Ok(info) });
    }

    pub fn fail_open(&mut self, error: DecodeError) {
        let ticket = *self.opens.last().expect("no open to resolve");
        self.ready.push(DecoderEvent::Opened { ticket, result: Err(error) });
    }

    pub fn resolve_page(&mut self, kind: RenderKind, page_index: u32) {
        let request = self.take_outstanding(kind, page_index);
        let surface = TestSurface { page_index, width: request.target_width };
        self.ready.push(DecoderEvent::PageLoaded { ticket: request.ticket, result: Ok(surface) });
    }

    pub fn fail_page(&mut self, kind: RenderKind, page_index: u32, error: DecodeError) {
        let request = self.take_outstanding(kind, page_index);
        self.ready.push(DecoderEvent::PageLoaded { ticket: request.ticket, result: Err(error) });
    }

    /// Resolve every outstanding request, newest first.
    pub fn resolve_all(&mut self) {
        while let Some(request) = self.outstanding.pop() {
            let surface =
                TestSurface { page_index: request.ticket.page_index, width: request.target_width };
            self.ready.push(DecoderEvent::PageLoaded { ticket: request.ticket, result: Ok(surface) });
        }
    }

    pub fn page_requests(&self, page_index: u32) -> usize {
        self.requests
            .iter()
            .filter(|request| {
                request.ticket.kind == RenderKind::Page && request.ticket.page_index == page_index
            })
            .count()
    }

    pub fn page_request_count(&self) -> usize {
        self.requests.iter().filter(|request| request.ticket.kind == RenderKind::Page).count()
    }

    pub fn outstanding_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .outstanding
            .iter()
            .filter(|request| request.ticket.kind == RenderKind::Page)
            .map(|request| request.ticket.page_index)
            .collect();
        pages.sort_unstable();
        pages
    }

    fn take_outstanding(&mut self, kind: RenderKind, page_index: u32) -> PageRequest {
        let position = self
            .outstanding
            .iter()
            .rposition(|request| request.ticket.kind == kind && request.ticket.page_index == page_index)
            .expect("no outstanding request for page");
        self.outstanding.remove(position)
    }
}

impl PageDecoder for ScriptedDecoder {
    type Surface = TestSurface;

    fn initialize(&mut self) -> Result<(), DecodeError> {
        self.initialized += 1;
        Ok(())
    }

    fn open(&mut self, ticket: OpenTicket, _source: DocumentSource) {
        self.opens.push(ticket);
    }

    fn load_page(&mut self, request: PageRequest) {
        self.requests.push(request);
        self.outstanding.push(request);
    }

    fn poll(&mut self) -> Vec<DecoderEvent<TestSurface>> {
        std::mem::take(&mut self.ready)
    }
}

/// Records commands and never confirms them on its own.
#[derive(Debug, Default)]
pub(crate) struct ManualEngine {
    pub commands: Vec<FlipCommand>,
    pub presentations: Vec<Presentation>,
    pub slot_updates: usize,
    pub last_painted: Vec<u32>,
}

impl PageFlip for ManualEngine {
    fn flip_to_index(&mut self, index: u32) {
        self.commands.push(FlipCommand::ToIndex(index));
    }

    fn flip_next(&mut self) {
        self.commands.push(FlipCommand::Next);
    }

    fn flip_previous(&mut self) {
        self.commands.push(FlipCommand::Previous);
    }
}

impl AnimationEngine<TestSurface> for ManualEngine {
    fn set_presentation(&mut self, presentation: Presentation) {
        self.presentations.push(presentation);
    }

    fn update_slots(&mut self, slots: &[SlotView<'_, TestSurface>]) {
        self.slot_updates += 1;
        self.last_painted =
            slots.iter().filter(|slot| slot.content.is_painted()).map(|slot| slot.index).collect();
    }
}
