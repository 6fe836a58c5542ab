//! The native toolkit interface.
//!
//! The bridge is toolkit-agnostic: a host implements [`NativeToolkit`] over
//! its own widget tree and event loop. All methods are called on the UI
//! thread unless noted otherwise.
//!
//! ```ignore
//! use horizon_bridge::toolkit::{NativeToolkit, WidgetId, FocusPolicy};
//!
//! struct MyToolkit { /* handles into the native object graph */ }
//!
//! impl NativeToolkit for MyToolkit {
//!     fn create_widget(&self, kind: &str) -> WidgetId { /* ... */ }
//!     fn parent(&self, widget: WidgetId) -> Option<WidgetId> { /* ... */ }
//!     // ...
//! }
//! ```

use std::sync::Arc;
use std::thread::ThreadId;

use horizon_bridge_core::{ManagedValue, Point, Rect};
use image::RgbaImage;

use crate::drag::{DragRequest, DropAction};
use crate::event::NativeEvent;
use crate::focus::FocusNegotiator;
use crate::modify::ModifyCapability;

/// Opaque handle to an element of the native widget tree.
///
/// Identity is assigned by the toolkit and must not be reused while the
/// widget it named is still registered with the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    /// Create from a toolkit-assigned raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw toolkit value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// How a widget accepts keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FocusPolicy {
    #[default]
    NoFocus,
    TabFocus,
    ClickFocus,
    /// Tab and click.
    StrongFocus,
    /// Tab, click and wheel.
    WheelFocus,
}

impl FocusPolicy {
    /// Whether keyboard tab navigation can land on the widget.
    pub fn accepts_tab(self) -> bool {
        matches!(self, Self::TabFocus | Self::StrongFocus | Self::WheelFocus)
    }

    pub fn accepts_any(self) -> bool {
        self != Self::NoFocus
    }
}

/// A completion popup currently claiming input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPopup {
    /// The widget the popup completes for.
    pub owner: WidgetId,
    /// The pointer is currently over the popup.
    pub under_pointer: bool,
    /// The popup swallows focus changes entirely while shown.
    pub eats_focus: bool,
}

/// One selected item of a multi-selection view, rendered for a drag image.
#[derive(Debug, Clone)]
pub struct RenderedItem {
    /// Item rectangle in the coordinates drag positions are reported in.
    pub rect: Rect,
    /// The item drawn in its selected state, `rect.size()` pixels.
    pub image: Arc<RgbaImage>,
}

/// Where a drag hovers relative to an item of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropPosition {
    OnItem,
    AboveItem,
    BelowItem,
    OnViewport,
}

impl DropPosition {
    pub fn code(self) -> i32 {
        match self {
            Self::OnItem => 0,
            Self::AboveItem => 1,
            Self::BelowItem => 2,
            Self::OnViewport => 3,
        }
    }
}

/// The view item a drag hovers over.
#[derive(Debug, Clone, PartialEq)]
pub struct DropLocation {
    /// Managed index object of the hovered item; `None` for the viewport.
    pub index: ManagedValue,
    pub position: DropPosition,
}

/// The user's answer to the exception modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionChoice {
    /// Terminate the process instead of continuing.
    pub terminate: bool,
    /// Never show this message again.
    pub suppress: bool,
}

/// The native toolkit as seen by the bridge.
pub trait NativeToolkit: Send + Sync {
    // -- lifetime --

    /// Allocate a new native widget of the given kind.
    ///
    /// Allocation failure is fatal; implementations abort rather than return.
    fn create_widget(&self, kind: &str) -> WidgetId;

    /// Destroy a widget. Only ever called from the pump, never mid-dispatch.
    fn destroy_widget(&self, widget: WidgetId);

    /// Whether the widget still exists.
    fn is_alive(&self, widget: WidgetId) -> bool;

    /// Class name used for diagnostic registry names.
    fn class_name(&self, widget: WidgetId) -> String;

    /// Thread the widget currently has affinity with. May be called off the UI thread.
    fn widget_thread(&self, widget: WidgetId) -> Option<ThreadId>;

    /// Move the widget's thread affinity. May be called off the UI thread.
    fn move_to_thread(&self, widget: WidgetId, thread: ThreadId);

    // -- tree --

    fn parent(&self, widget: WidgetId) -> Option<WidgetId>;

    /// Top-level windows end ancestor walks.
    fn is_window(&self, widget: WidgetId) -> bool;

    fn is_enabled(&self, widget: WidgetId) -> bool;

    fn focus_policy(&self, widget: WidgetId) -> FocusPolicy;

    /// The widget this one forwards focus to, if any.
    fn focus_proxy(&self, _widget: WidgetId) -> Option<WidgetId> {
        None
    }

    /// The widget currently holding keyboard focus.
    fn focus_widget(&self) -> Option<WidgetId>;

    // -- capabilities --

    fn focus_negotiator(&self, _widget: WidgetId) -> Option<Arc<dyn FocusNegotiator>> {
        None
    }

    fn modify_capability(&self, _widget: WidgetId) -> Option<Arc<dyn ModifyCapability>> {
        None
    }

    fn completion_popup(&self) -> Option<CompletionPopup> {
        None
    }

    fn hide_completion_popup(&self) {}

    // -- painting --

    /// True when the widget paints through a nested scene graph or is not
    /// the paintable surface of its scroll view.
    fn paint_delegated(&self, _widget: WidgetId) -> bool {
        false
    }

    /// Begin painting and return the managed drawing context.
    fn begin_paint(&self, _widget: WidgetId, _region: Rect) -> ManagedValue {
        ManagedValue::None
    }

    fn end_paint(&self, _widget: WidgetId, _context: ManagedValue) {}

    // -- drag and drop --

    /// Platform drag start distance, if the toolkit defines one.
    fn drag_start_distance(&self) -> Option<i32> {
        None
    }

    /// Viewport of a scrollable view, in the coordinates of its events.
    fn viewport_rect(&self, _widget: WidgetId) -> Option<Rect> {
        None
    }

    /// Managed index objects of the current selection of a multi-selection
    /// view; `None` when the widget is not such a view.
    fn selection(&self, _widget: WidgetId) -> Option<Vec<ManagedValue>> {
        None
    }

    /// Render every selected item of a multi-selection view.
    fn render_selection(&self, _widget: WidgetId) -> Vec<RenderedItem> {
        Vec::new()
    }

    /// Item under a drag position in a view.
    fn drop_location(&self, _widget: WidgetId, _pos: Point) -> Option<DropLocation> {
        None
    }

    /// Run the native modal drag loop; blocks until the drop resolves.
    fn run_drag_loop(&self, source: WidgetId, request: DragRequest) -> DropAction;

    // -- pointer grab --

    fn grab_pointer(&self, widget: WidgetId);

    fn release_pointer(&self, widget: WidgetId);

    // -- application --

    /// Whether the native application object exists yet.
    fn application_exists(&self) -> bool {
        true
    }

    /// Show the blocking exception modal.
    fn show_exception(&self, title: &str, message: &str) -> ExceptionChoice;

    /// Ask the native loop to quit.
    fn quit(&self);

    /// Wake the native loop so it runs a pump iteration soon. May be called
    /// off the UI thread.
    fn wake(&self) {}

    /// Queue a synthetic event for normal native delivery to `widget`.
    fn post_event(&self, widget: WidgetId, event: NativeEvent);
}
