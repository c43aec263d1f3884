//! Contract with the external document decoder.
//!
//! The decoder is an asynchronous service driven cooperatively: the session
//! submits work through [`PageDecoder::open`] and [`PageDecoder::load_page`],
//! and the event loop collects finished work through [`PageDecoder::poll`].
//! Every submission carries a ticket so results can be matched to the request
//! that produced them, or discarded when the request was superseded.

use crate::error::DecodeError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

/// Intrinsic page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }

    /// Width over height, or `None` for degenerate sizes.
    pub fn aspect_ratio(self) -> Option<f32> {
        if self.width_pt > 0.0 && self.height_pt > 0.0 {
            Some(self.width_pt / self.height_pt)
        } else {
            None
        }
    }
}

/// What the decoder learned about a document once it opened.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub page_sizes: Vec<PageSize>,
}

impl DocumentInfo {
    pub fn new(page_sizes: Vec<PageSize>) -> Self {
        Self { page_sizes }
    }

    pub fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }
}

/// Which slot table a decode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderKind {
    Page,
    Thumbnail,
}

/// Identifies one `open` call. A newer generation supersedes every older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenTicket {
    pub generation: u64,
}

/// Identifies one page decode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeTicket {
    pub generation: u64,
    pub request_id: u64,
    pub kind: RenderKind,
    pub page_index: u32,
}

/// A page rasterization request: intrinsic resolution scaled to `target_width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub ticket: DecodeTicket,
    pub target_width: f32,
}

/// Finished decoder work, handed back to the event loop.
#[derive(Debug)]
pub enum DecoderEvent<S> {
    Opened {
        ticket: OpenTicket,
        result: Result<DocumentInfo, DecodeError>,
    },
    PageLoaded {
        ticket: DecodeTicket,
        result: Result<S, DecodeError>,
    },
}

/// The document decoder collaborator.
pub trait PageDecoder {
    /// Rendered page content. Cloned into render plans by reference only.
    type Surface;

    /// One-time setup, performed by whoever composes the session.
    fn initialize(&mut self) -> Result<(), DecodeError> {
        Ok(())
    }

    /// Begin loading a document. Work for older generations may be dropped.
    fn open(&mut self, ticket: OpenTicket, source: DocumentSource);

    /// Begin rasterizing one page of the document opened under `request.ticket.generation`.
    fn load_page(&mut self, request: PageRequest);

    /// Hand back whatever finished since the last poll, in any order.
    fn poll(&mut self) -> Vec<DecoderEvent<Self::Surface>>;
}
