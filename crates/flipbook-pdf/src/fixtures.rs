//! In-memory PDFs for tests.

use lopdf::{dictionary, Document, Object};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FixturePage {
    media_box: Option<(i64, i64)>,
    rotate: Option<i64>,
}

impl FixturePage {
    pub fn sized(width: i64, height: i64) -> Self {
        Self { media_box: Some((width, height)), rotate: None }
    }

    /// No MediaBox of its own.
    pub fn inheriting() -> Self {
        Self::default()
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }
}

/// `page_count` US Letter pages.
pub(crate) fn uniform(page_count: usize) -> Vec<u8> {
    build(&vec![FixturePage::sized(612, 792); page_count], None)
}

/// A document whose page tree root optionally carries a MediaBox for its kids to inherit.
pub(crate) fn build(pages: &[FixturePage], tree_media_box: Option<(i64, i64)>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = pages
        .iter()
        .map(|page| {
            let mut dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            };
            if let Some((width, height)) = page.media_box {
                dict.set("MediaBox", media_box(width, height));
            }
            if let Some(degrees) = page.rotate {
                dict.set("Rotate", degrees);
            }
            Object::Reference(doc.add_object(dict))
        })
        .collect();

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages.len() as i64,
    };
    if let Some((width, height)) = tree_media_box {
        tree.set("MediaBox", media_box(width, height));
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture PDF should serialize");
    bytes
}

fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}
