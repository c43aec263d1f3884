//! Cooperative page decoder
//!
//! Requests are queued and worked off in [`PageDecoder::poll`], a bounded
//! number per call, so a host event loop stays responsive between batches.
//! Jobs stamped with a superseded document generation are dropped unrun.

use crate::engine::{DocumentHandle, LopdfEngine, PdfEngine, PdfEngineError, RgbaImage};
use flipbook_core::{
    DecodeError, DecoderEvent, DocumentInfo, DocumentSource, OpenTicket, PageDecoder, PageRequest,
    RenderKind,
};
use std::collections::VecDeque;
use std::sync::Arc;

pub type PageImage = Arc<RgbaImage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Jobs run per `poll`. Zero drains the queue.
    pub jobs_per_poll: usize,
    /// Requested widths above this are clamped.
    pub max_render_width: u32,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self { jobs_per_poll: 4, max_render_width: 4096 }
    }
}

#[derive(Debug)]
enum Job {
    Open(OpenTicket, DocumentSource),
    Page(PageRequest),
}

impl Job {
    fn generation(&self) -> u64 {
        match self {
            Self::Open(ticket, _) => ticket.generation,
            Self::Page(request) => request.ticket.generation,
        }
    }
}

#[derive(Debug)]
pub struct QueuedDecoder<E: PdfEngine = LopdfEngine> {
    engine: E,
    options: DecoderOptions,
    initialized: bool,
    generation: u64,
    document: Option<DocumentHandle>,
    jobs: VecDeque<Job>,
}

impl QueuedDecoder<LopdfEngine> {
    pub fn lopdf(options: DecoderOptions) -> Self {
        Self::new(LopdfEngine::new(), options)
    }
}

impl<E: PdfEngine> QueuedDecoder<E> {
    pub fn new(engine: E, options: DecoderOptions) -> Self {
        Self {
            engine,
            options,
            initialized: false,
            generation: 0,
            document: None,
            jobs: VecDeque::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn queued_jobs(&self) -> usize {
        self.jobs.len()
    }

    fn run(&mut self, job: Job) -> Option<DecoderEvent<PageImage>> {
        match job {
            Job::Open(ticket, source) => {
                let result = self.open_document(source).map_err(DecodeError::from);
                Some(DecoderEvent::Opened { ticket, result })
            }
            Job::Page(request) => {
                let ticket = request.ticket;
                let Some(handle) = self.document.filter(|_| ticket.generation == self.generation)
                else {
                    tracing::trace!(request_id = ticket.request_id, "dropping page job for closed document");
                    return None;
                };

                let width = request.target_width.min(self.options.max_render_width as f32);
                let rendered = match ticket.kind {
                    RenderKind::Page => self.engine.render_page(handle, ticket.page_index, width),
                    RenderKind::Thumbnail => {
                        self.engine.render_thumbnail(handle, ticket.page_index, width)
                    }
                };

                let result = rendered.map(Arc::new).map_err(DecodeError::from);
                if let Err(error) = &result {
                    tracing::debug!(page_index = ticket.page_index, %error, "page render failed");
                }
                Some(DecoderEvent::PageLoaded { ticket, result })
            }
        }
    }

    fn open_document(&mut self, source: DocumentSource) -> Result<DocumentInfo, PdfEngineError> {
        if let Some(previous) = self.document.take() {
            self.engine.close(previous)?;
        }

        let handle = self.engine.open(source)?;
        self.document = Some(handle);
        Ok(DocumentInfo::new(self.engine.page_sizes(handle)?.to_vec()))
    }
}

impl<E: PdfEngine> PageDecoder for QueuedDecoder<E> {
    type Surface = PageImage;

    fn initialize(&mut self) -> Result<(), DecodeError> {
        if self.initialized {
            return Err(DecodeError::Configuration("decoder already initialized".to_owned()));
        }

        if self.options.max_render_width == 0 {
            return Err(DecodeError::Configuration("max_render_width must be positive".to_owned()));
        }

        tracing::debug!(options = ?self.options, "page decoder initialized");
        self.initialized = true;
        Ok(())
    }

    fn open(&mut self, ticket: OpenTicket, source: DocumentSource) {
        self.generation = ticket.generation;
        let before = self.jobs.len();
        self.jobs.retain(|job| job.generation() == ticket.generation);
        if before != self.jobs.len() {
            tracing::trace!(dropped = before - self.jobs.len(), "dropped superseded jobs");
        }
        self.jobs.push_back(Job::Open(ticket, source));
    }

    fn load_page(&mut self, request: PageRequest) {
        self.jobs.push_back(Job::Page(request));
    }

    fn poll(&mut self) -> Vec<DecoderEvent<PageImage>> {
        let budget = match self.options.jobs_per_poll {
            0 => usize::MAX,
            n => n,
        };

        let mut events = Vec::new();
        let mut ran = 0;

        while ran < budget {
            let Some(job) = self.jobs.pop_front() else {
                break;
            };
            ran += 1;
            events.extend(self.run(job));
        }

        events
    }
}

impl From<PdfEngineError> for DecodeError {
    fn from(error: PdfEngineError) -> Self {
        match error {
            PdfEngineError::Parse(_) | PdfEngineError::NoPages => Self::Corrupt(error.to_string()),
            PdfEngineError::EncryptedUnsupported => Self::Unsupported(error.to_string()),
            PdfEngineError::Io(_)
            | PdfEngineError::InvalidHandle(_)
            | PdfEngineError::PageOutOfRange { .. }
            | PdfEngineError::InvalidWidth(_) => Self::Backend(error.to_string()),
        }
    }
}
