//! Grid items and the ordered collection the layout engine arranges.
//!
//! An [`Item`] is a display label plus a small [`ViewState`] that consumers
//! flip at will; neither field influences geometry. The [`ItemCollection`]
//! preserves insertion order, which is what decides row placement
//! (row-major: item `i` lands in row `i / columns`, column `i % columns`).
//!
//! Index handling is permissive by default: out-of-range inserts append and
//! out-of-range removals fall back to removing the last item. Callers that
//! want bounds checking use the `try_*` variants, which return [`IndexError`].

mod collection;

pub use collection::{IndexError, ItemCollection};

/// Visual state of a single item. Layout never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewState {
    #[default]
    Loading,
    NoContent,
    ContentShowing,
}

impl ViewState {
    /// Flip used by the demo's "flip state" action: `Loading` becomes
    /// `ContentShowing`, every other state goes back to `Loading`.
    pub fn toggled(self) -> Self {
        match self {
            ViewState::Loading => ViewState::ContentShowing,
            ViewState::NoContent | ViewState::ContentShowing => ViewState::Loading,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::NoContent => "no_content",
            ViewState::ContentShowing => "content_showing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Display label. Not required to be unique.
    pub id: String,
    pub view_state: ViewState,
}

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            view_state: ViewState::default(),
        }
    }

    pub fn toggle_state(&mut self) -> ViewState {
        self.view_state = self.view_state.toggled();
        self.view_state
    }
}
