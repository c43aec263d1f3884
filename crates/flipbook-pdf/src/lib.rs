//! PDF backend for the flipbook.
//!
//! [`LopdfEngine`] reads document structure and page geometry; [`QueuedDecoder`]
//! adapts any [`PdfEngine`] to the flipbook's ticketed [`flipbook_core::PageDecoder`]
//! contract.

mod decoder;
mod engine;

#[cfg(test)]
mod fixtures;

pub use decoder::{DecoderOptions, PageImage, QueuedDecoder};
pub use engine::{
    default_engine, DocumentHandle, LopdfEngine, PdfEngine, PdfEngineError, RgbaImage,
    FALLBACK_PAGE_SIZE,
};
