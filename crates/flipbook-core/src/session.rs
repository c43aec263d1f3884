//! Document session
//!
//! Owns the opened document and the per-page slot tables, and is the only
//! writer of slot state. Readers go through [`DocumentSession::materialize`]
//! and [`DocumentSession::release`].
//!
//! Supersession works by generation: every `open` bumps the generation, and
//! any decoder result stamped with an older generation is discarded on
//! arrival. Releasing a page that is still decoding does not cancel the
//! decode; the result is discarded when it arrives, unless the page was
//! requested again in the meantime, in which case the in-flight decode is
//! adopted instead of issuing a second one.

use crate::decoder::{
    DecodeTicket, DocumentInfo, DocumentSource, OpenTicket, PageDecoder, PageRequest, PageSize,
    RenderKind,
};
use crate::error::{DecodeError, SessionError};
use serde::Serialize;
use std::collections::HashMap;

/// Materialization state of a slot, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    Unrequested,
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
pub enum SlotState<S> {
    Unrequested,
    Pending(DecodeTicket),
    Ready(S),
    Failed(DecodeError),
}

/// One page of the document. Released slots keep their record and drop the surface.
#[derive(Debug, Clone)]
pub struct PageSlot<S> {
    index: u32,
    state: SlotState<S>,
}

impl<S> PageSlot<S> {
    fn new(index: u32) -> Self {
        Self { index, state: SlotState::Unrequested }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn state(&self) -> &SlotState<S> {
        &self.state
    }

    pub fn materialization(&self) -> Materialization {
        match self.state {
            SlotState::Unrequested => Materialization::Unrequested,
            SlotState::Pending(_) => Materialization::Pending,
            SlotState::Ready(_) => Materialization::Ready,
            SlotState::Failed(_) => Materialization::Failed,
        }
    }

    pub fn surface(&self) -> Option<&S> {
        match &self.state {
            SlotState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DecodeError> {
        match &self.state {
            SlotState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentStatus {
    Empty,
    Loading,
    Ready,
    Failed(DecodeError),
}

/// Snapshot of the opened document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentHandle {
    pub generation: u64,
    pub total_pages: u32,
    pub is_loaded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub decodes_issued: u64,
    pub completions_applied: u64,
    pub completions_discarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// A new decode was submitted.
    Requested(DecodeTicket),
    /// The page already had a decode in flight; no new work was submitted.
    Joined(DecodeTicket),
    Ready,
    /// The page failed earlier; use [`DocumentSession::retry`].
    Failed,
}

pub struct DocumentSession<D: PageDecoder> {
    decoder: D,
    generation: u64,
    next_request_id: u64,
    status: DocumentStatus,
    info: Option<DocumentInfo>,
    pages: Vec<PageSlot<D::Surface>>,
    thumbnails: Vec<PageSlot<D::Surface>>,
    in_flight: HashMap<(RenderKind, u32), DecodeTicket>,
    stats: SessionStats,
}

impl<D: PageDecoder> DocumentSession<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            generation: 0,
            next_request_id: 0,
            status: DocumentStatus::Empty,
            info: None,
            pages: Vec::new(),
            thumbnails: Vec::new(),
            in_flight: HashMap::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn status(&self) -> &DocumentStatus {
        &self.status
    }

    pub fn is_loaded(&self) -> bool {
        self.status == DocumentStatus::Ready
    }

    pub fn handle(&self) -> Option<DocumentHandle> {
        if self.status == DocumentStatus::Empty {
            return None;
        }

        Some(DocumentHandle {
            generation: self.generation,
            total_pages: self.page_count(),
            is_loaded: self.is_loaded(),
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page_size(&self, page_index: u32) -> Option<PageSize> {
        self.info.as_ref()?.page_sizes.get(page_index as usize).copied()
    }

    pub fn slots(&self) -> &[PageSlot<D::Surface>] {
        &self.pages
    }

    pub fn slot(&self, page_index: u32) -> Option<&PageSlot<D::Surface>> {
        self.pages.get(page_index as usize)
    }

    pub fn thumbnails(&self) -> &[PageSlot<D::Surface>] {
        &self.thumbnails
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Start loading `source`, discarding everything from the previous document.
    pub fn open(&mut self, source: DocumentSource) -> OpenTicket {
        self.generation += 1;
        self.clear();
        self.status = DocumentStatus::Loading;

        let ticket = OpenTicket { generation: self.generation };
        tracing::debug!(generation = ticket.generation, "opening document");
        self.decoder.open(ticket, source);
        ticket
    }

    /// Apply the decoder's answer to an `open`. Returns `false` for stale tickets.
    pub fn finish_open(
        &mut self,
        ticket: OpenTicket,
        result: Result<DocumentInfo, DecodeError>,
    ) -> bool {
        if ticket.generation != self.generation || self.status != DocumentStatus::Loading {
            tracing::trace!(generation = ticket.generation, "discarding superseded open result");
            return false;
        }

        match result {
            Ok(info) => {
                let page_count = info.page_count();
                self.pages = (0..page_count).map(PageSlot::new).collect();
                self.thumbnails = (0..page_count).map(PageSlot::new).collect();
                self.info = Some(info);
                self.status = DocumentStatus::Ready;
                tracing::debug!(generation = ticket.generation, page_count, "document opened");
            }
            Err(error) => {
                tracing::warn!(generation = ticket.generation, %error, "document failed to open");
                self.clear();
                self.status = DocumentStatus::Failed(error);
            }
        }

        true
    }

    pub fn materialize(
        &mut self,
        page_index: u32,
        target_width: f32,
    ) -> Result<MaterializeOutcome, SessionError> {
        self.materialize_kind(RenderKind::Page, page_index, target_width)
    }

    pub fn materialize_thumbnail(
        &mut self,
        page_index: u32,
        target_width: f32,
    ) -> Result<MaterializeOutcome, SessionError> {
        self.materialize_kind(RenderKind::Thumbnail, page_index, target_width)
    }

    /// Drop the page's surface and return it to `Unrequested`. Never fails.
    pub fn release(&mut self, page_index: u32) {
        if let Some(slot) = self.pages.get_mut(page_index as usize) {
            if let SlotState::Pending(ticket) = slot.state {
                tracing::trace!(page_index, request_id = ticket.request_id, "released while decoding");
            }
            slot.state = SlotState::Unrequested;
        }
    }

    /// Clear a failed page so it can be requested again. Returns `true` if it was failed.
    pub fn retry(&mut self, page_index: u32) -> bool {
        self.retry_kind(RenderKind::Page, page_index)
    }

    pub fn retry_thumbnail(&mut self, page_index: u32) -> bool {
        self.retry_kind(RenderKind::Thumbnail, page_index)
    }

    /// Apply a page decode result. Returns the affected slot, or `None` when
    /// the result was discarded (superseded document or released page).
    pub fn complete_page(
        &mut self,
        ticket: DecodeTicket,
        result: Result<D::Surface, DecodeError>,
    ) -> Option<(RenderKind, u32)> {
        if ticket.generation != self.generation {
            tracing::trace!(request_id = ticket.request_id, "discarding result from a previous document");
            self.stats.completions_discarded += 1;
            return None;
        }

        let key = (ticket.kind, ticket.page_index);
        if self.in_flight.get(&key) == Some(&ticket) {
            self.in_flight.remove(&key);
        }

        let slots = match ticket.kind {
            RenderKind::Page => &mut self.pages,
            RenderKind::Thumbnail => &mut self.thumbnails,
        };

        let Some(slot) = slots.get_mut(ticket.page_index as usize) else {
            self.stats.completions_discarded += 1;
            return None;
        };

        if !matches!(slot.state, SlotState::Pending(pending) if pending == ticket) {
            tracing::trace!(
                page_index = ticket.page_index,
                request_id = ticket.request_id,
                "discarding result for released page"
            );
            self.stats.completions_discarded += 1;
            return None;
        }

        slot.state = match result {
            Ok(surface) => SlotState::Ready(surface),
            Err(error) => {
                tracing::warn!(page_index = ticket.page_index, kind = ?ticket.kind, %error, "page failed to decode");
                SlotState::Failed(error)
            }
        };
        self.stats.completions_applied += 1;

        Some(key)
    }

    fn materialize_kind(
        &mut self,
        kind: RenderKind,
        page_index: u32,
        target_width: f32,
    ) -> Result<MaterializeOutcome, SessionError> {
        let page_count = self.page_count();
        if page_index >= page_count {
            return Err(SessionError::OutOfRange { page: page_index, page_count });
        }

        let slots = match kind {
            RenderKind::Page => &mut self.pages,
            RenderKind::Thumbnail => &mut self.thumbnails,
        };
        let slot = &mut slots[page_index as usize];

        match slot.state {
            SlotState::Ready(_) => return Ok(MaterializeOutcome::Ready),
            SlotState::Failed(_) => return Ok(MaterializeOutcome::Failed),
            SlotState::Pending(ticket) => return Ok(MaterializeOutcome::Joined(ticket)),
            SlotState::Unrequested => {}
        }

        if let Some(ticket) = self.in_flight.get(&(kind, page_index)).copied() {
            tracing::trace!(page_index, request_id = ticket.request_id, "adopting in-flight decode");
            slot.state = SlotState::Pending(ticket);
            return Ok(MaterializeOutcome::Joined(ticket));
        }

        let ticket = DecodeTicket {
            generation: self.generation,
            request_id: self.next_request_id,
            kind,
            page_index,
        };
        self.next_request_id += 1;

        slot.state = SlotState::Pending(ticket);
        self.in_flight.insert((kind, page_index), ticket);
        self.stats.decodes_issued += 1;
        self.decoder.load_page(PageRequest { ticket, target_width });

        Ok(MaterializeOutcome::Requested(ticket))
    }

    fn retry_kind(&mut self, kind: RenderKind, page_index: u32) -> bool {
        let slots = match kind {
            RenderKind::Page => &mut self.pages,
            RenderKind::Thumbnail => &mut self.thumbnails,
        };

        match slots.get_mut(page_index as usize) {
            Some(slot) if matches!(slot.state, SlotState::Failed(_)) => {
                slot.state = SlotState::Unrequested;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn poll_decoder(&mut self) -> Vec<crate::decoder::DecoderEvent<D::Surface>> {
        self.decoder.poll()
    }

    fn clear(&mut self) {
        self.info = None;
        self.pages.clear();
        self.thumbnails.clear();
        self.in_flight.clear();
    }
}
