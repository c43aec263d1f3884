use flipbook_core::{DocumentSource, PageSize};
use image::{imageops, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no usable MediaBox.
pub const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Inheritance chains deeper than this are treated as malformed.
const MAX_TREE_DEPTH: usize = 32;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const EDGE: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("render width must be positive, got {0}")]
    InvalidWidth(f32),
}

pub trait PdfEngine {
    fn open(&mut self, source: DocumentSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_sizes(&self, handle: DocumentHandle) -> Result<&[PageSize], PdfEngineError>;

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.page_sizes(handle)?.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let sizes = self.page_sizes(handle)?;
        sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: sizes.len() as u32,
        })
    }

    /// Render a page `width_px` wide, keeping its aspect ratio.
    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        width_px: f32,
    ) -> Result<RgbaImage, PdfEngineError>;

    /// Render a small preview. Thumbnails are downsampled from a larger render.
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        width_px: f32,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.render_page(handle, page_index, width_px * 4.0)?;
        let width = width_px.round().max(1.0) as u32;
        let height = scaled_height(self.page_size(handle, page_index)?, width);
        Ok(imageops::thumbnail(&page, width, height))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

/// Pure-Rust backend. Reads structure and geometry with lopdf and paints
/// page-sized blanks; it does not rasterize page content.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, Vec<PageSize>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            sizes.push(displayed_size(&doc, object_id)?);
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(sizes)
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: DocumentSource) -> Result<DocumentHandle, PdfEngineError> {
        let sizes = match source {
            DocumentSource::Path(path) => Self::parse_sizes(&fs::read(path)?)?,
            DocumentSource::Bytes(bytes) => Self::parse_sizes(&bytes)?,
        };

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, sizes);

        Ok(handle)
    }

    fn page_sizes(&self, handle: DocumentHandle) -> Result<&[PageSize], PdfEngineError> {
        self.docs
            .get(&handle)
            .map(Vec::as_slice)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        width_px: f32,
    ) -> Result<RgbaImage, PdfEngineError> {
        if !width_px.is_finite() || width_px <= 0.0 {
            return Err(PdfEngineError::InvalidWidth(width_px));
        }

        let page_size = self.page_size(handle, page_index)?;
        let width = width_px.round().max(1.0) as u32;
        let height = scaled_height(page_size, width);

        let mut image = RgbaImage::from_pixel(width, height, PAPER);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, EDGE);
                image.put_pixel(x, height - 1, EDGE);
            }
            for y in 0..height {
                image.put_pixel(0, y, EDGE);
                image.put_pixel(width - 1, y, EDGE);
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

fn scaled_height(page_size: PageSize, width: u32) -> u32 {
    let ratio = page_size.aspect_ratio().unwrap_or(1.0);
    (width as f32 / ratio).round().max(1.0) as u32
}

/// Size as displayed: MediaBox, inherited through the page tree, with
/// quarter-turn rotations swapping the axes.
fn displayed_size(doc: &Document, page_id: ObjectId) -> Result<PageSize, PdfEngineError> {
    let size = inherited(doc, page_id, b"MediaBox")?
        .and_then(|object| media_box(doc, object))
        .unwrap_or(FALLBACK_PAGE_SIZE);

    let rotate = inherited(doc, page_id, b"Rotate")?
        .and_then(|object| resolve(doc, object).as_i64().ok())
        .unwrap_or(0);

    if rotate.rem_euclid(180) == 90 {
        Ok(PageSize::new(size.height_pt, size.width_pt))
    } else {
        Ok(size)
    }
}

fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, PdfEngineError> {
    let mut dict: &Dictionary = doc.get_dictionary(page_id)?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(object) = dict.get(key) {
            return Ok(Some(object));
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => dict = doc.get_dictionary(*parent)?,
            _ => return Ok(None),
        }
    }

    tracing::warn!(?page_id, "page tree too deep, ignoring inherited attributes");
    Ok(None)
}

fn media_box(doc: &Document, object: &Object) -> Option<PageSize> {
    let array = resolve(doc, object).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let x0 = resolve(doc, &array[0]).as_float().ok()?;
    let y0 = resolve(doc, &array[1]).as_float().ok()?;
    let x1 = resolve(doc, &array[2]).as_float().ok()?;
    let y1 = resolve(doc, &array[3]).as_float().ok()?;

    let size = PageSize::new((x1 - x0).abs(), (y1 - y0).abs());
    size.aspect_ratio().map(|_| size)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixturePage};

    fn open(bytes: Vec<u8>) -> (LopdfEngine, DocumentHandle) {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(DocumentSource::from(bytes)).expect("open should succeed");
        (engine, handle)
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let (engine, handle) = open(fixtures::uniform(3));

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 3);
        assert_eq!(
            engine.page_size(handle, 0).expect("size should succeed"),
            PageSize::new(612.0, 792.0)
        );
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let bytes = fixtures::build(
            &[FixturePage::inheriting(), FixturePage::sized(200, 100)],
            Some((595, 842)),
        );
        let (engine, handle) = open(bytes);

        assert_eq!(
            engine.page_sizes(handle).expect("sizes"),
            &[PageSize::new(595.0, 842.0), PageSize::new(200.0, 100.0)]
        );
    }

    #[test]
    fn quarter_turn_rotation_swaps_axes() {
        let bytes = fixtures::build(
            &[FixturePage::sized(600, 400).rotated(90), FixturePage::sized(600, 400).rotated(180)],
            None,
        );
        let (engine, handle) = open(bytes);

        assert_eq!(engine.page_size(handle, 0).expect("size"), PageSize::new(400.0, 600.0));
        assert_eq!(engine.page_size(handle, 1).expect("size"), PageSize::new(600.0, 400.0));
    }

    #[test]
    fn missing_media_box_falls_back_to_letter() {
        let (engine, handle) = open(fixtures::build(&[FixturePage::inheriting()], None));

        assert_eq!(engine.page_size(handle, 0).expect("size"), FALLBACK_PAGE_SIZE);
    }

    #[test]
    fn render_page_honours_target_width_and_aspect() {
        let (engine, handle) = open(fixtures::build(&[FixturePage::sized(600, 400)], None));

        let image = engine.render_page(handle, 0, 300.0).expect("render should succeed");
        assert_eq!((image.width(), image.height()), (300, 200));
        assert_eq!(image.get_pixel(0, 0), &EDGE);
        assert_eq!(image.get_pixel(150, 100), &PAPER);
    }

    #[test]
    fn render_thumbnail_produces_small_image() {
        let (engine, handle) = open(fixtures::uniform(2));

        let image = engine.render_thumbnail(handle, 1, 55.0).expect("thumbnail should render");
        assert_eq!(image.width(), 55);
        assert_eq!(image.height(), 71);
    }

    #[test]
    fn render_rejects_bad_width_and_index() {
        let (engine, handle) = open(fixtures::uniform(2));

        assert!(matches!(engine.render_page(handle, 0, 0.0), Err(PdfEngineError::InvalidWidth(_))));
        assert!(matches!(
            engine.render_page(handle, 2, 100.0),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 2 })
        ));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(DocumentSource::from(b"%PDF-1.5\n/Encrypt 5 0 R\n".to_vec()))
            .expect_err("encrypted documents are unsupported");

        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn garbage_fails_to_parse() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(DocumentSource::from(b"not a pdf".to_vec()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");
        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));

        let (mut engine, handle) = open(fixtures::uniform(1));
        engine.close(handle).expect("close should succeed");
        assert!(matches!(engine.close(handle), Err(PdfEngineError::InvalidHandle(_))));
    }
}
