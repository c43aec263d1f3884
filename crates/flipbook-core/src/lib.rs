//! Flipbook Core Library
//!
//! Page windowing, navigation and document session state for a PDF
//! flipbook.
//!
//! A [`Flipbook`] owns a [`DocumentSession`] backed by a [`PageDecoder`] and
//! drives an [`AnimationEngine`]. Only a small window of pages around the
//! current one (two behind, three ahead) is ever decoded; pages leaving the
//! window drop their surfaces and come back as placeholders. Navigation
//! requests are forwarded to the engine, and the current page moves only when
//! the engine confirms where it settled.

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod navigation;
pub mod session;
pub mod surface;
pub mod viewport;
pub mod window;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, FlipbookConfig};
pub use decoder::{
    DecodeTicket, DecoderEvent, DocumentInfo, DocumentSource, OpenTicket, PageDecoder,
    PageRequest, PageSize, RenderKind,
};
pub use engine::{AnimationEngine, EngineEvent, FlipCommand, InstantEngine, PageFlip};
pub use error::{DecodeError, SessionError};
pub use navigation::{
    Affordances, IntentOutcome, LayoutMode, NavigationIntent, NavigationState, Navigator,
    Presentation, ScrollDirection,
};
pub use session::{
    DocumentHandle, DocumentSession, DocumentStatus, MaterializeOutcome, Materialization,
    PageSlot, SessionStats, SlotState,
};
pub use surface::{
    BookGeometry, Flipbook, FlipbookEvent, PlanStatus, RenderPlan, SlotContent, SlotView,
};
pub use viewport::{ContainerId, ViewportTracker};
pub use window::{
    active_window, active_window_with, diff_windows, ActiveWindow, WindowDiff, MAX_WINDOW_LEN,
    WINDOW_AHEAD, WINDOW_BEHIND,
};
