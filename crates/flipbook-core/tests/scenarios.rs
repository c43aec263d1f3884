use flipbook_core::{
    active_window, AnimationEngine, ContainerId, DecodeError, DecoderEvent, DocumentInfo,
    DocumentSource, FlipCommand, Flipbook, FlipbookConfig, InstantEngine, LayoutMode,
    Materialization, NavigationIntent, OpenTicket, PageDecoder, PageFlip, PageRequest, PageSize,
    PlanStatus, Presentation, RenderKind, SlotView, MAX_WINDOW_LEN,
};
use std::collections::HashSet;

const CONTAINER: ContainerId = ContainerId(42);

#[derive(Debug, Clone, PartialEq)]
struct Bitmap {
    page_index: u32,
    width: f32,
}

/// Answers every request on the next poll unless told to hold results back.
#[derive(Debug, Default)]
struct LoopbackDecoder {
    page_count: u32,
    hold: bool,
    failing: HashSet<u32>,
    requests: Vec<PageRequest>,
    outbox: Vec<DecoderEvent<Bitmap>>,
    held: Vec<PageRequest>,
}

impl LoopbackDecoder {
    fn with_pages(page_count: u32) -> Self {
        Self { page_count, ..Self::default() }
    }

    fn page_requests(&self) -> Vec<u32> {
        self.requests
            .iter()
            .filter(|request| request.ticket.kind == RenderKind::Page)
            .map(|request| request.ticket.page_index)
            .collect()
    }

    fn release_held(&mut self) {
        for request in std::mem::take(&mut self.held) {
            self.answer(request);
        }
    }

    fn answer(&mut self, request: PageRequest) {
        let page_index = request.ticket.page_index;
        let result = if self.failing.contains(&page_index) {
            Err(DecodeError::Unsupported(format!("page {page_index}")))
        } else {
            Ok(Bitmap { page_index, width: request.target_width })
        };
        self.outbox.push(DecoderEvent::PageLoaded { ticket: request.ticket, result });
    }
}

impl PageDecoder for LoopbackDecoder {
    type Surface = Bitmap;

    fn open(&mut self, ticket: OpenTicket, _source: DocumentSource) {
        let info = DocumentInfo::new(vec![PageSize::new(612.0, 792.0); self.page_count as usize]);
        self.outbox.push(DecoderEvent::Opened { ticket, result: Ok(info) });
    }

    fn load_page(&mut self, request: PageRequest) {
        self.requests.push(request);
        if self.hold {
            self.held.push(request);
        } else {
            self.answer(request);
        }
    }

    fn poll(&mut self) -> Vec<DecoderEvent<Bitmap>> {
        std::mem::take(&mut self.outbox)
    }
}

#[derive(Debug, Default)]
struct RecordingEngine {
    commands: Vec<FlipCommand>,
    presentation: Option<Presentation>,
    slot_count: usize,
}

impl PageFlip for RecordingEngine {
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

impl AnimationEngine<Bitmap> for RecordingEngine {
    fn set_presentation(&mut self, presentation: Presentation) {
        self.presentation = Some(presentation);
    }

    fn update_slots(&mut self, slots: &[SlotView<'_, Bitmap>]) {
        self.slot_count = slots.len();
    }
}

fn open_book(page_count: u32, width: f32) -> Flipbook<LoopbackDecoder, RecordingEngine> {
    let config = FlipbookConfig::default().with_thumbnails(false);
    let mut flipbook =
        Flipbook::new(config, LoopbackDecoder::with_pages(page_count), RecordingEngine::default())
            .expect("loopback decoder initializes");
    flipbook.observe(Some(CONTAINER));
    flipbook.resize(CONTAINER, width);
    flipbook.open(DocumentSource::from(b"%PDF-1.5".to_vec()));
    flipbook.pump();
    flipbook
}

fn window_of<D, E>(flipbook: &Flipbook<D, E>) -> Vec<u32>
where
    D: PageDecoder,
    E: AnimationEngine<D::Surface>,
{
    flipbook.active_window().indices().collect()
}

#[test]
fn cover_window_is_clipped_and_centered() {
    let flipbook = open_book(20, 1280.0);

    assert_eq!(flipbook.current_page(), 0);
    assert_eq!(window_of(&flipbook), vec![0, 1, 2, 3]);
    assert_eq!(flipbook.layout_mode(), LayoutMode::Centered);
    assert_eq!(flipbook.engine().slot_count, 20);
}

#[test]
fn middle_window_spans_two_behind_three_ahead() {
    let mut flipbook = open_book(20, 1280.0);

    flipbook.navigate(NavigationIntent::GoTo(10));
    assert_eq!(flipbook.engine().commands, vec![FlipCommand::ToIndex(10)]);
    flipbook.position_changed(10);

    assert_eq!(window_of(&flipbook), vec![8, 9, 10, 11, 12, 13]);
    assert_eq!(flipbook.layout_mode(), LayoutMode::Spread);

    let plan = flipbook.render_plan();
    let painted: Vec<u32> =
        plan.slots.iter().filter(|slot| slot.content.is_painted()).map(|slot| slot.index).collect();
    assert_eq!(painted, vec![8, 9, 10, 11, 12, 13]);
}

#[test]
fn next_on_last_page_never_reaches_engine() {
    let mut flipbook = open_book(20, 1280.0);
    flipbook.position_changed(19);

    flipbook.navigate(NavigationIntent::Next);

    assert!(flipbook.engine().commands.is_empty());
    assert!(flipbook.navigator().is_idle());
    assert!(!flipbook.affordances().next);
    assert!(!flipbook.render_plan().affordances.next);
}

#[test]
fn narrowing_viewport_only_changes_presentation_and_paint_size() {
    let mut flipbook = open_book(20, 900.0);
    flipbook.position_changed(5);

    let window = window_of(&flipbook);
    let requests = flipbook.session().decoder().page_requests();
    assert_eq!(flipbook.presentation(), Presentation::Spread);

    flipbook.resize(CONTAINER, 400.0);

    assert_eq!(flipbook.presentation(), Presentation::SinglePage);
    assert_eq!(flipbook.engine().presentation, Some(Presentation::SinglePage));
    assert_eq!(window_of(&flipbook), window);
    assert_eq!(flipbook.session().decoder().page_requests(), requests);
    assert_eq!(flipbook.paint_width(), 400.0);
    assert_eq!(flipbook.page_label(), "6");
}

#[test]
fn go_to_past_the_end_lands_on_last_page() {
    let mut flipbook = open_book(10, 1280.0);

    flipbook.navigate(NavigationIntent::GoTo(15));
    assert_eq!(flipbook.engine().commands, vec![FlipCommand::ToIndex(9)]);
    flipbook.position_changed(9);
    assert_eq!(flipbook.current_page(), 9);

    flipbook.navigate(NavigationIntent::Next);
    assert_eq!(flipbook.engine().commands.len(), 1);
}

#[test]
fn window_is_bounded_for_every_position() {
    for page_count in 0..=30 {
        for current in 0..page_count.max(1) + 8 {
            let window = active_window(current, page_count);
            assert!(window.len() <= MAX_WINDOW_LEN);
            assert!(window.indices().all(|index| index < page_count));
        }
    }
}

#[test]
fn repeated_materialization_while_pending_issues_one_decode() {
    let mut flipbook = open_book(20, 1280.0);
    flipbook.decoder_mut().hold = true;

    flipbook.position_changed(10);
    flipbook.position_changed(11);
    flipbook.position_changed(10);

    let requests = flipbook.session().decoder().page_requests();
    let for_eleven = requests.iter().filter(|&&index| index == 11).count();
    assert_eq!(for_eleven, 1);
}

#[test]
fn full_release_cycle_materializes_again() {
    let mut flipbook = open_book(20, 1280.0);
    assert_eq!(
        flipbook.session().slot(1).map(|slot| slot.materialization()),
        Some(Materialization::Ready)
    );

    flipbook.position_changed(15);
    assert_eq!(
        flipbook.session().slot(1).map(|slot| slot.materialization()),
        Some(Materialization::Unrequested)
    );

    flipbook.position_changed(0);
    let requests = flipbook.session().decoder().page_requests();
    assert_eq!(requests.iter().filter(|&&index| index == 1).count(), 2);
    assert_eq!(
        flipbook.session().slot(1).map(|slot| slot.materialization()),
        Some(Materialization::Ready)
    );
}

#[test]
fn late_results_for_departed_pages_are_dropped() {
    let mut flipbook = open_book(20, 1280.0);
    flipbook.decoder_mut().hold = true;

    flipbook.position_changed(10);
    flipbook.position_changed(0);
    flipbook.decoder_mut().release_held();
    flipbook.pump();

    assert!(flipbook
        .session()
        .slots()
        .iter()
        .skip(4)
        .all(|slot| slot.materialization() == Materialization::Unrequested));
    assert_eq!(flipbook.session().stats().completions_discarded, 6);
}

#[test]
fn failed_page_is_isolated() {
    let config = FlipbookConfig::default().with_thumbnails(false);
    let mut decoder = LoopbackDecoder::with_pages(8);
    decoder.failing.insert(2);
    let mut flipbook =
        Flipbook::new(config, decoder, RecordingEngine::default()).expect("decoder initializes");
    flipbook.open(DocumentSource::from(b"%PDF-1.5".to_vec()));
    flipbook.pump();

    let plan = flipbook.render_plan();
    assert_eq!(plan.status, PlanStatus::Ready);
    assert!(plan.slots[2].content.retry_eligible());
    assert!(plan.slots[1].content.is_painted());
    assert!(plan.slots[3].content.is_painted());

    flipbook.decoder_mut().failing.clear();
    flipbook.retry(2);
    assert!(flipbook.render_plan().slots[2].content.is_painted());
}

#[test]
fn instant_engine_drives_the_loop_end_to_end() {
    let config = FlipbookConfig::default().with_thumbnails(false);
    let mut flipbook =
        Flipbook::new(config, LoopbackDecoder::with_pages(12), InstantEngine::new())
            .expect("decoder initializes");
    flipbook.observe(Some(CONTAINER));
    flipbook.resize(CONTAINER, 1280.0);
    flipbook.open(DocumentSource::from(b"%PDF-1.5".to_vec()));
    flipbook.pump();

    flipbook.navigate(NavigationIntent::Next);
    assert_eq!(flipbook.current_page(), 1);
    assert_eq!(flipbook.page_label(), "2-3");

    flipbook.navigate(NavigationIntent::Next);
    assert_eq!(flipbook.current_page(), 3);

    flipbook.navigate(NavigationIntent::Last);
    assert_eq!(flipbook.current_page(), 11);
    assert_eq!(window_of(&flipbook), vec![9, 10, 11]);
    assert!(flipbook.navigator().is_idle());

    flipbook.scroll(-1.0);
    assert_eq!(flipbook.current_page(), 9);
}
