//! Drag and drop.
//!
//! This module provides the drag source gesture and the payload model shared
//! with drop targets:
//!
//! - [`DragDropController`] watches pointer input for a drag gesture, asks
//!   managed code for the payload, runs the toolkit's modal drag loop and
//!   reports the resolved action back.
//! - [`DragPayload`] holds the dragged data in its native representations and
//!   converts to and from managed values.
//!
//! # Gesture
//!
//! ```text
//! Idle --press--> Detecting --moved past threshold--> Armed
//! Armed --on-drag-start accepts--> InProgress --loop returns--> Completed
//! Armed --declined or failed--> Completed(NONE)
//! Completed --release or cancel--> Idle
//! ```
//!
//! Every armed gesture ends in `Completed`, with the resolved action or
//! [`DropAction::NONE`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use horizon_bridge_core::logging::{span_names, targets};
use horizon_bridge_core::values::COLOR_CLASS;
use horizon_bridge_core::{
    Color, ConversionError, EventRecord, FromManaged, IntoManaged, ManagedValue, Point, Rect,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::callback::{CallbackOutcome, CallbackRunner, names};
use crate::event::{MouseButtons, PointerEvent};
use crate::toolkit::{NativeToolkit, RenderedItem, WidgetId};

/// Standard MIME types used in drag and drop operations.
pub mod mime {
    /// Plain text MIME type.
    pub const TEXT_PLAIN: &str = "text/plain";
    /// URI list MIME type (for file paths and URLs).
    pub const TEXT_URI_LIST: &str = "text/uri-list";
    /// Color data.
    pub const COLOR: &str = "application/x-color";
    /// Image data.
    pub const IMAGE: &str = "image/png";
    /// A managed value dragged within the process.
    pub const MANAGED_OBJECT: &str = "application/x-horizon-bridge-object";
}

/// Actions that can be performed during a drop operation.
///
/// These flags indicate what actions are supported by the drag source
/// and what action was performed by the drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DropAction(u8);

impl DropAction {
    /// No action (drop not allowed).
    pub const NONE: Self = Self(0);
    /// Copy the data.
    pub const COPY: Self = Self(1 << 0);
    /// Move the data (source should delete original).
    pub const MOVE: Self = Self(1 << 1);
    /// Create a link/reference to the data.
    pub const LINK: Self = Self(1 << 2);
    /// Let the user pick between copy and move during the drag.
    pub const CUSTOMIZABLE: Self = Self(1 << 3);

    /// Build from managed flag bits; unknown bits are dropped.
    pub fn from_bits_truncate(bits: i64) -> Self {
        Self((bits & 0x0f) as u8)
    }

    pub fn bits(self) -> i64 {
        i64::from(self.0)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this action set contains another action.
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// The default action of a requested set: move wins over copy, copy
    /// over nothing.
    pub fn default_action(self) -> Self {
        if self.contains(Self::MOVE) {
            Self::MOVE
        } else if self.contains(Self::COPY) {
            Self::COPY
        } else {
            Self::NONE
        }
    }

    /// The actions offered to drop targets for a requested set.
    pub fn supported_actions(self) -> Self {
        if self.contains(Self::CUSTOMIZABLE) {
            Self::COPY | Self::MOVE
        } else {
            self.default_action()
        }
    }

    /// Collapse a native result to the single action reported to managed
    /// code.
    pub fn resolved(self) -> Self {
        self.default_action()
    }
}

impl std::ops::BitOr for DropAction {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for DropAction {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::BitOrAssign for DropAction {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromManaged for DropAction {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        if value.is_none() {
            return Ok(Self::NONE);
        }
        Ok(Self::from_bits_truncate(i64::from_managed(value)?))
    }
}

impl IntoManaged for DropAction {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Int(self.bits())
    }
}

/// Data being transferred in a drag and drop operation.
///
/// A payload can hold several representations at once; drop targets pick the
/// one they understand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragPayload {
    /// Raw data stored by MIME type.
    data: HashMap<String, Vec<u8>>,
    color: Option<Color>,
    image: Option<Arc<RgbaImage>>,
    urls: Vec<PathBuf>,
    object: Option<ManagedValue>,
}

impl DragPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a payload from a list of file paths, as dropped from the OS.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            urls: paths.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let mut payload = Self::default();
        payload.set_text(text);
        payload
    }

    /// Convert a managed `data` value: strings become text, colors color
    /// data, bitmaps an image; anything else travels as an opaque managed
    /// object. `None` gives an empty payload.
    pub fn from_managed_value(value: &ManagedValue) -> Result<Self, ConversionError> {
        let mut payload = Self::default();
        match value {
            ManagedValue::None => {}
            ManagedValue::Str(text) => payload.set_text(text.clone()),
            ManagedValue::Bitmap(image) => payload.image = Some(Arc::clone(image)),
            ManagedValue::Struct(object) if object.class() == COLOR_CLASS => {
                payload.color = Some(Color::from_managed(value)?);
            }
            other => payload.object = Some(other.clone()),
        }
        Ok(payload)
    }

    /// The managed view of a dropped payload: file paths first, then text,
    /// color, image and managed object.
    pub fn to_managed_value(&self) -> ManagedValue {
        if !self.urls.is_empty() {
            return ManagedValue::tuple(
                self.urls
                    .iter()
                    .map(|path| path.to_string_lossy().into_owned()),
            );
        }
        if let Some(text) = self.text() {
            return ManagedValue::Str(text);
        }
        if let Some(color) = self.color {
            return color.into_managed();
        }
        if let Some(image) = &self.image {
            return ManagedValue::Bitmap(Arc::clone(image));
        }
        self.object.clone().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
            && self.urls.is_empty()
            && self.color.is_none()
            && self.image.is_none()
            && self.object.is_none()
    }

    /// Every MIME type the payload can be read as, sorted.
    pub fn formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.data.keys().cloned().collect();
        if !self.urls.is_empty() {
            formats.push(mime::TEXT_URI_LIST.to_string());
        }
        if self.color.is_some() {
            formats.push(mime::COLOR.to_string());
        }
        if self.image.is_some() {
            formats.push(mime::IMAGE.to_string());
        }
        if self.object.is_some() {
            formats.push(mime::MANAGED_OBJECT.to_string());
        }
        formats.sort();
        formats
    }

    pub fn has_format(&self, mime_type: &str) -> bool {
        self.formats().iter().any(|format| format == mime_type)
    }

    pub fn get_data(&self, mime_type: &str) -> Option<&[u8]> {
        self.data.get(mime_type).map(Vec::as_slice)
    }

    pub fn set_data(&mut self, mime_type: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.data.insert(mime_type.into(), data.into());
    }

    pub fn text(&self) -> Option<String> {
        self.get_data(mime::TEXT_PLAIN)
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.set_data(mime::TEXT_PLAIN, text.into().into_bytes());
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    pub fn urls(&self) -> &[PathBuf] {
        &self.urls
    }

    pub fn object(&self) -> Option<&ManagedValue> {
        self.object.as_ref()
    }
}

/// Everything the toolkit's modal drag loop needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DragRequest {
    pub payload: DragPayload,
    pub image: Option<Arc<RgbaImage>>,
    /// Offset of the pointer within `image`.
    pub hotspot: Option<Point>,
    pub supported: DropAction,
    pub default_action: DropAction,
}

/// The drag session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// A button went down on `origin`; watching for movement.
    Detecting { origin: WidgetId, start: Point },
    /// Movement passed the threshold; managed code is being asked.
    Armed { origin: WidgetId, start: Point },
    /// The modal drag loop is running.
    InProgress { origin: WidgetId },
    /// The gesture resolved.
    Completed { origin: WidgetId, action: DropAction },
}

/// How a pointer move was handled by the drag controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// No drag was started; route the move normally.
    NotStarted,
    /// Managed code declined; route the move normally.
    Declined,
    /// The gesture failed; swallow the move.
    Aborted,
    /// The drag ran; swallow the move.
    Completed(DropAction),
}

impl DragOutcome {
    /// Whether the triggering pointer move was consumed.
    pub fn consumed(self) -> bool {
        matches!(self, Self::Aborted | Self::Completed(_))
    }
}

/// Drives drag gestures started from widgets with a managed owner.
pub struct DragDropController {
    state: Mutex<DragState>,
    threshold: i32,
    toolkit: Arc<dyn NativeToolkit>,
    callbacks: Arc<CallbackRunner>,
}

impl DragDropController {
    pub fn new(
        toolkit: Arc<dyn NativeToolkit>,
        callbacks: Arc<CallbackRunner>,
        default_threshold: i32,
    ) -> Self {
        let threshold = toolkit.drag_start_distance().unwrap_or(default_threshold);
        Self {
            state: Mutex::new(DragState::Idle),
            threshold,
            toolkit,
            callbacks,
        }
    }

    pub fn state(&self) -> DragState {
        *self.state.lock()
    }

    /// Manhattan distance the pointer must exceed before a drag arms.
    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// A button went down on `widget` at `pos`.
    pub fn pointer_down(&self, widget: WidgetId, pos: Point) {
        let mut state = self.state.lock();
        if !matches!(*state, DragState::InProgress { .. }) {
            *state = DragState::Detecting { origin: widget, start: pos };
        }
    }

    /// A button was released; any gesture is over.
    pub fn pointer_up(&self) {
        self.cancel();
    }

    /// Abandon the current gesture. A running drag loop is left alone.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, DragState::InProgress { .. }) {
            *state = DragState::Idle;
        }
    }

    /// Arm the gesture if `event` moved far enough from the press on
    /// `widget` with the left button held.
    pub fn should_arm(&self, widget: WidgetId, event: &PointerEvent) -> bool {
        let mut state = self.state.lock();
        let DragState::Detecting { origin, start } = *state else {
            return false;
        };
        if origin != widget
            || !event.buttons.contains(MouseButtons::LEFT)
            || event.pos.manhattan_distance(start) <= self.threshold
        {
            return false;
        }
        *state = DragState::Armed { origin, start };
        true
    }

    /// Run the drag gesture for a pointer move over `widget`.
    #[tracing::instrument(skip(self, event), target = "horizon_bridge::drag", level = "trace")]
    pub fn handle_pointer_move(&self, widget: WidgetId, event: &PointerEvent) -> DragOutcome {
        if !self.callbacks.has_callback(widget, names::ON_DRAG_START) {
            return DragOutcome::NotStarted;
        }
        if let Some(viewport) = self.toolkit.viewport_rect(widget) {
            if !viewport.contains(event.pos) {
                return DragOutcome::NotStarted;
            }
        }
        if !self.should_arm(widget, event) {
            return DragOutcome::NotStarted;
        }

        let span = tracing::trace_span!(
            target: targets::DRAG,
            span_names::DRAG_LOOP,
            ?widget
        );
        let _entered = span.enter();

        let selection = self
            .toolkit
            .selection(widget)
            .map(ManagedValue::tuple);
        let (outcome, data) = self.start(widget, event, selection.clone());
        let action = match outcome {
            DragOutcome::Completed(action) => action,
            _ => DropAction::NONE,
        };
        self.finish(widget, action);

        if outcome != DragOutcome::Declined {
            self.callbacks.call_with(widget, names::ON_DRAG_END, |record| {
                record.set("pos", event.pos.into_managed());
                record.set("modifiers", event.modifiers.bits());
                record.set("data", data);
                record.set("selection", selection.unwrap_or_default());
                record.set("action", action.bits());
            });
        }
        outcome
    }

    /// Ask managed code to start the drag and run the loop. Also returns
    /// the `data` managed code left on the start record.
    fn start(
        &self,
        widget: WidgetId,
        event: &PointerEvent,
        selection: Option<ManagedValue>,
    ) -> (DragOutcome, ManagedValue) {
        let is_view = selection.is_some();
        let invocation = self.callbacks.call_with(widget, names::ON_DRAG_START, |record| {
            record.set("pos", event.pos.into_managed());
            record.set("modifiers", event.modifiers.bits());
            record.set("data", ManagedValue::None);
            record.set("action", (DropAction::COPY | DropAction::CUSTOMIZABLE).bits());
            record.set("selection", selection.unwrap_or_default());
            record.set("bitmap", ManagedValue::None);
            record.set("hotspot", ManagedValue::None);
        });
        let data = invocation.record.get("data").unwrap_or_default();
        match invocation.outcome {
            CallbackOutcome::Returned(value) if value.is_truthy() => {}
            CallbackOutcome::Failed => return (DragOutcome::Aborted, data),
            _ => return (DragOutcome::Declined, data),
        }

        let request = match self.build_request(widget, event.pos, &invocation.record, is_view) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(target: targets::DRAG, ?widget, %err, "invalid drag parameters");
                return (DragOutcome::Aborted, data);
            }
        };

        self.transition(DragState::InProgress { origin: widget });
        tracing::debug!(target: targets::DRAG, ?widget, supported = ?request.supported, "entering drag loop");
        let result = self.toolkit.run_drag_loop(widget, request);
        (DragOutcome::Completed(result.resolved()), data)
    }

    fn build_request(
        &self,
        widget: WidgetId,
        pos: Point,
        record: &EventRecord,
        is_view: bool,
    ) -> Result<DragRequest, ConversionError> {
        let payload = DragPayload::from_managed_value(&record.get("data").unwrap_or_default())?;
        let mut image: Option<Arc<RgbaImage>> = record.get_as("bitmap")?;
        let mut hotspot: Option<Point> = record.get_as("hotspot")?;
        let requested: DropAction = record.get_as("action")?;

        if image.is_none() && is_view {
            let items = self.toolkit.render_selection(widget);
            if let Some((composite, bounds)) = composite_selection(&items) {
                image = Some(Arc::new(composite));
                hotspot = Some(pos - bounds.top_left());
            }
        }

        Ok(DragRequest {
            payload,
            image,
            hotspot,
            supported: requested.supported_actions(),
            default_action: requested.default_action(),
        })
    }

    fn transition(&self, next: DragState) {
        *self.state.lock() = next;
    }

    fn finish(&self, widget: WidgetId, action: DropAction) {
        tracing::debug!(target: targets::DRAG, ?widget, ?action, "drag completed");
        self.transition(DragState::Completed {
            origin: widget,
            action,
        });
    }
}

impl std::fmt::Debug for DragDropController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragDropController")
            .field("state", &self.state())
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// Draw every rendered item into one image with half alpha.
///
/// Returns the image and the bounding rectangle it covers, or `None` when the
/// selection covers no area.
pub fn composite_selection(items: &[RenderedItem]) -> Option<(RgbaImage, Rect)> {
    let bounds = items
        .iter()
        .fold(Rect::default(), |bounds, item| bounds.union(&item.rect));
    if bounds.is_empty() {
        return None;
    }

    let width = u32::try_from(bounds.width).ok()?;
    let height = u32::try_from(bounds.height).ok()?;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    for item in items {
        let local = item.rect.relative_to(bounds.top_left());
        image::imageops::replace(
            &mut canvas,
            item.image.as_ref(),
            i64::from(local.x),
            i64::from(local.y),
        );
    }
    for pixel in canvas.pixels_mut() {
        pixel.0[3] >>= 1;
    }
    Some((canvas, bounds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_resolution() {
        let requested = DropAction::COPY | DropAction::CUSTOMIZABLE;
        assert_eq!(requested.default_action(), DropAction::COPY);
        assert_eq!(requested.supported_actions(), DropAction::COPY | DropAction::MOVE);

        let both = DropAction::COPY | DropAction::MOVE;
        assert_eq!(both.default_action(), DropAction::MOVE);
        assert_eq!(both.supported_actions(), DropAction::MOVE);

        assert_eq!(DropAction::LINK.default_action(), DropAction::NONE);
        assert!(DropAction::NONE.supported_actions().is_none());
    }

    #[test]
    fn test_action_managed_bits() {
        let action = DropAction::from_managed(&ManagedValue::Int(3)).unwrap();
        assert_eq!(action, DropAction::COPY | DropAction::MOVE);
        assert_eq!(DropAction::from_managed(&ManagedValue::None).unwrap(), DropAction::NONE);
        assert_eq!(DropAction::MOVE.into_managed(), ManagedValue::Int(2));
    }

    #[test]
    fn test_payload_from_text() {
        let payload = DragPayload::from_managed_value(&ManagedValue::from("hello")).unwrap();
        assert_eq!(payload.text().as_deref(), Some("hello"));
        assert!(payload.has_format(mime::TEXT_PLAIN));
        assert_eq!(payload.to_managed_value(), ManagedValue::from("hello"));
    }

    #[test]
    fn test_payload_from_other_value_is_object_blob() {
        let value = ManagedValue::Int(42);
        let payload = DragPayload::from_managed_value(&value).unwrap();
        assert_eq!(payload.formats(), vec![mime::MANAGED_OBJECT.to_string()]);
        assert_eq!(payload.object(), Some(&value));
    }

    #[test]
    fn test_payload_urls_win() {
        let mut payload = DragPayload::from_paths([PathBuf::from("/tmp/a.txt")]);
        payload.set_text("ignored");
        assert_eq!(
            payload.to_managed_value(),
            ManagedValue::tuple(["/tmp/a.txt".to_string()])
        );
    }

    #[test]
    fn test_empty_payload() {
        let payload = DragPayload::from_managed_value(&ManagedValue::None).unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.to_managed_value(), ManagedValue::None);
    }

    #[test]
    fn test_composite_halves_alpha() {
        let opaque = Arc::new(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let items = vec![
            RenderedItem {
                rect: Rect::new(10, 10, 2, 2),
                image: Arc::clone(&opaque),
            },
            RenderedItem {
                rect: Rect::new(14, 10, 2, 2),
                image: opaque,
            },
        ];
        let (image, bounds) = composite_selection(&items).unwrap();
        assert_eq!(bounds, Rect::new(10, 10, 6, 2));
        assert_eq!(image.dimensions(), (6, 2));
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 127]);
        // The gap between the items stays transparent.
        assert_eq!(image.get_pixel(3, 0).0[3], 0);
    }

    #[test]
    fn test_composite_of_nothing() {
        assert!(composite_selection(&[]).is_none());
    }
}
