//! Managed value model and native value converters.
//!
//! Values cross the bridge as [`ManagedValue`]s. Native value types implement
//! [`FromManaged`] and [`IntoManaged`]; `None` maps to the null native value
//! only where the native type has one, everywhere else wrap the target in
//! `Option<T>`.
//!
//! Structured managed values (vectors, colors, fonts) are represented as
//! [`ManagedStruct`]s tagged with their managed class name. Converters also
//! accept arbitrary managed objects exposing the same attributes, so a
//! runtime adapter may hand its own instances straight through.
//!
//! ```ignore
//! use horizon_bridge_core::values::{Color, FromManaged, IntoManaged, ManagedValue};
//!
//! let value = ManagedValue::Tuple(vec![255.into(), 0.into(), 0.into()]);
//! let red = Color::from_managed(&value)?;
//! assert_eq!(red, Color::rgb(255, 0, 0));
//! let back = red.into_managed();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use image::RgbaImage;
use parking_lot::Mutex;

use crate::error::ConversionError;
use crate::runtime::{ManagedCallable, ManagedObject};

/// Managed class name for two-component vectors (points and sizes).
pub const VECTOR_CLASS: &str = "Vector";
/// Managed class name for colors.
pub const COLOR_CLASS: &str = "Color";
/// Managed class name for fonts.
pub const FONT_CLASS: &str = "Font";

/// A value living on the managed side of the bridge.
#[derive(Clone, Default)]
pub enum ManagedValue {
    /// The managed null value.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<ManagedValue>),
    List(Vec<ManagedValue>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Bitmap(Arc<RgbaImage>),
    /// A structured value of a well-known managed class.
    Struct(ManagedStruct),
    /// A mutable event record shared with a callback.
    Event(EventRecord),
    /// An opaque managed object.
    Object(Arc<dyn ManagedObject>),
    /// A managed callable.
    Callable(Arc<dyn ManagedCallable>),
}

impl ManagedValue {
    /// Name of the managed type, used in conversion diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Bitmap(_) => "Bitmap",
            Self::Struct(s) => s.class(),
            Self::Event(_) => "Event",
            Self::Object(obj) => obj.type_name(),
            Self::Callable(_) => "function",
        }
    }

    /// Managed truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::Tuple(items) | Self::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Returns true for the managed null value.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Look up an attribute on a structured value or managed object.
    pub fn attr(&self, name: &str) -> Option<ManagedValue> {
        match self {
            Self::Struct(s) => s.get(name).cloned(),
            Self::Object(obj) => obj.attr(name),
            Self::Event(record) => record.get(name),
            _ => None,
        }
    }

    /// Borrow the elements of a tuple or list.
    pub fn as_sequence(&self) -> Option<&[ManagedValue]> {
        match self {
            Self::Tuple(items) | Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Build a tuple from anything convertible.
    pub fn tuple<T: IntoManaged>(items: impl IntoIterator<Item = T>) -> Self {
        Self::Tuple(items.into_iter().map(IntoManaged::into_managed).collect())
    }

    fn required_attr(&self, name: &'static str) -> Result<ManagedValue, ConversionError> {
        match self {
            Self::Struct(_) | Self::Object(_) | Self::Event(_) => {
                self.attr(name).ok_or(ConversionError::MissingAttribute(name))
            }
            other => Err(ConversionError::mismatch("object with attributes", other)),
        }
    }
}

impl fmt::Debug for ManagedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "bytes({})", b.len()),
            Self::Tuple(items) => f.debug_tuple("").field(items).finish(),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Date(d) => write!(f, "date({d})"),
            Self::DateTime(dt) => write!(f, "datetime({dt})"),
            Self::Bitmap(img) => write!(f, "Bitmap({}x{})", img.width(), img.height()),
            Self::Struct(s) => s.fmt(f),
            Self::Event(record) => record.fmt(f),
            Self::Object(obj) => write!(f, "<{} object>", obj.type_name()),
            Self::Callable(_) => write!(f, "<function>"),
        }
    }
}

impl PartialEq for ManagedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) | (Self::List(a), Self::List(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Bitmap(a), Self::Bitmap(b)) => Arc::ptr_eq(a, b) || a.as_raw() == b.as_raw(),
            (Self::Struct(a), Self::Struct(b)) => a == b,
            (Self::Event(a), Self::Event(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Callable(a), Self::Callable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for ManagedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ManagedValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for ManagedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ManagedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ManagedValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ManagedValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A structured managed value of a known class (vector, color, font).
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedStruct {
    class: String,
    fields: BTreeMap<String, ManagedValue>,
}

impl ManagedStruct {
    /// Create an empty struct of the given managed class.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ManagedValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The managed class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Get a field.
    pub fn get(&self, name: &str) -> Option<&ManagedValue> {
        self.fields.get(name)
    }
}

/// A keyed record handed to managed callbacks.
///
/// The record is a shared handle: managed code may rewrite fields during the
/// callback (e.g. the drag payload), and the caller reads them back after the
/// callback returns.
#[derive(Clone, Default)]
pub struct EventRecord {
    fields: Arc<Mutex<BTreeMap<String, ManagedValue>>>,
}

impl EventRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ManagedValue>) {
        self.fields.lock().insert(key.into(), value.into());
    }

    /// Get a copy of a field.
    pub fn get(&self, key: &str) -> Option<ManagedValue> {
        self.fields.lock().get(key).cloned()
    }

    /// Get a field converted to a native type.
    pub fn get_as<T: FromManaged>(&self, key: &str) -> Result<T, ConversionError> {
        let value = self.get(key).unwrap_or_default();
        T::from_managed(&value)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.fields.lock().keys().cloned().collect()
    }

    /// Returns true if both handles share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.lock().iter()).finish()
    }
}

impl From<EventRecord> for ManagedValue {
    fn from(record: EventRecord) -> Self {
        Self::Event(record)
    }
}

/// Conversion from a managed value into a native value.
pub trait FromManaged: Sized {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError>;
}

/// Conversion from a native value into a managed value.
pub trait IntoManaged {
    fn into_managed(self) -> ManagedValue;
}

impl<T: IntoManaged> IntoManaged for Option<T> {
    fn into_managed(self) -> ManagedValue {
        self.map_or(ManagedValue::None, IntoManaged::into_managed)
    }
}

impl<T: FromManaged> FromManaged for Option<T> {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        if value.is_none() {
            Ok(None)
        } else {
            T::from_managed(value).map(Some)
        }
    }
}

impl IntoManaged for ManagedValue {
    fn into_managed(self) -> ManagedValue {
        self
    }
}

impl FromManaged for ManagedValue {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromManaged for bool {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        Ok(value.is_truthy())
    }
}

impl IntoManaged for bool {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Bool(self)
    }
}

/// Parse an integer literal with an optional base prefix (`0x`, `0o`, `0b`,
/// or a leading `0` for octal) and sign.
fn parse_int_literal(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest.to_string())
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, lower[1..].to_string())
    } else {
        (10, lower)
    };
    // The sign was consumed above; `from_str_radix` would accept another.
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    if negative {
        i64::from_str_radix(&format!("-{body}"), radix).ok()
    } else {
        i64::from_str_radix(&body, radix).ok()
    }
}

impl FromManaged for i64 {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::Int(i) => Ok(*i),
            ManagedValue::Bool(b) => Ok(i64::from(*b)),
            ManagedValue::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            ManagedValue::Str(s) => parse_int_literal(s).ok_or_else(|| {
                ConversionError::InvalidValue(format!("invalid integer literal '{s}'"))
            }),
            other => Err(ConversionError::mismatch("an integer", other)),
        }
    }
}

impl FromManaged for i32 {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        let wide = i64::from_managed(value)?;
        i32::try_from(wide).map_err(|_| ConversionError::Overflow(wide))
    }
}

impl IntoManaged for i32 {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Int(self.into())
    }
}

impl IntoManaged for i64 {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Int(self)
    }
}

impl FromManaged for f64 {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::Float(f) => Ok(*f),
            ManagedValue::Int(i) => Ok(*i as f64),
            ManagedValue::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(ConversionError::mismatch("a number", other)),
        }
    }
}

impl IntoManaged for f64 {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Float(self)
    }
}

/// Integer lists accept any tuple or list of integer-convertible items.
impl FromManaged for Vec<i32> {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        let items = value
            .as_sequence()
            .ok_or_else(|| ConversionError::mismatch("a sequence", value))?;
        items.iter().map(i32::from_managed).collect()
    }
}

impl IntoManaged for Vec<i32> {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::tuple(self)
    }
}

impl FromManaged for String {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::Str(s) => Ok(s.clone()),
            other => Err(ConversionError::mismatch("a string", other)),
        }
    }
}

impl IntoManaged for String {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Str(self)
    }
}

impl IntoManaged for &str {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Str(self.to_string())
    }
}

/// A byte buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer(pub Vec<u8>);

impl FromManaged for Buffer {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::Bytes(b) => Ok(Self(b.clone())),
            ManagedValue::Str(s) => Ok(Self(s.as_bytes().to_vec())),
            other => Err(ConversionError::mismatch("a readable buffer", other)),
        }
    }
}

impl IntoManaged for Buffer {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Bytes(self.0)
    }
}

/// An integer point in widget coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Sum of the absolute coordinate differences.
    ///
    /// Saturates at `i32::MAX`.
    pub fn manhattan_distance(self, other: Point) -> i32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).abs();
        saturate(dx + dy)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Self) -> Self::Output {
        Point::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

/// An integer rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && i64::from(point.x) < self.right()
            && i64::from(point.y) < self.bottom()
    }

    fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Smallest rectangle covering both; empty rectangles are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(
            left,
            top,
            saturate(right - i64::from(left)),
            saturate(bottom - i64::from(top)),
        )
    }

    /// The same rectangle moved by `-origin`.
    pub fn relative_to(&self, origin: Point) -> Rect {
        Rect::new(
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
            self.width,
            self.height,
        )
    }
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// A floating-point point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An integer size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// A floating-point size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeF {
    pub width: f64,
    pub height: f64,
}

/// Reads a two-component vector from `x`/`y` attributes or a 2-element sequence.
fn vector_components<T: FromManaged>(value: &ManagedValue) -> Result<(T, T), ConversionError> {
    if let Some(items) = value.as_sequence() {
        return match items {
            [x, y] => Ok((T::from_managed(x)?, T::from_managed(y)?)),
            _ => Err(ConversionError::InvalidValue(
                "expected sequence containing 2 elements".to_string(),
            )),
        };
    }
    let x = T::from_managed(&value.required_attr("x")?)?;
    let y = T::from_managed(&value.required_attr("y")?)?;
    Ok((x, y))
}

fn vector_struct(x: ManagedValue, y: ManagedValue) -> ManagedValue {
    ManagedValue::Struct(ManagedStruct::new(VECTOR_CLASS).with("x", x).with("y", y))
}

/// `None` converts to the origin.
impl FromManaged for Point {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        if value.is_none() {
            return Ok(Self::default());
        }
        let (x, y) = vector_components::<i32>(value)?;
        Ok(Self { x, y })
    }
}

impl IntoManaged for Point {
    fn into_managed(self) -> ManagedValue {
        vector_struct(self.x.into(), self.y.into())
    }
}

impl FromManaged for PointF {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        if value.is_none() {
            return Ok(Self::default());
        }
        let (x, y) = vector_components::<f64>(value)?;
        Ok(Self { x, y })
    }
}

impl IntoManaged for PointF {
    fn into_managed(self) -> ManagedValue {
        vector_struct(self.x.into(), self.y.into())
    }
}

impl FromManaged for Size {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        let point = Point::from_managed(value)?;
        Ok(Self::new(point.x, point.y))
    }
}

impl IntoManaged for Size {
    fn into_managed(self) -> ManagedValue {
        Point::new(self.width, self.height).into_managed()
    }
}

impl FromManaged for SizeF {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        let point = PointF::from_managed(value)?;
        Ok(Self {
            width: point.x,
            height: point.y,
        })
    }
}

impl IntoManaged for SizeF {
    fn into_managed(self) -> ManagedValue {
        PointF::new(self.width, self.height).into_managed()
    }
}

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

fn color_channel(value: &ManagedValue) -> Result<u8, ConversionError> {
    let wide = i64::from_managed(value)?;
    u8::try_from(wide).map_err(|_| ConversionError::Overflow(wide))
}

/// Accepts a 3- or 4-element sequence, or an object with `r`, `g`, `b` and
/// optional `a` attributes.
impl FromManaged for Color {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        if let Some(items) = value.as_sequence() {
            if !(3..=4).contains(&items.len()) {
                return Err(ConversionError::InvalidValue(
                    "expected sequence containing 3 or 4 int elements".to_string(),
                ));
            }
            let a = match items.get(3) {
                Some(alpha) => color_channel(alpha)?,
                None => 255,
            };
            return Ok(Self::rgba(
                color_channel(&items[0])?,
                color_channel(&items[1])?,
                color_channel(&items[2])?,
                a,
            ));
        }
        let r = color_channel(&value.required_attr("r")?)?;
        let g = color_channel(&value.required_attr("g")?)?;
        let b = color_channel(&value.required_attr("b")?)?;
        let a = match value.attr("a") {
            Some(alpha) => color_channel(&alpha)?,
            None => 255,
        };
        Ok(Self::rgba(r, g, b, a))
    }
}

impl IntoManaged for Color {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Struct(
            ManagedStruct::new(COLOR_CLASS)
                .with("r", i32::from(self.r))
                .with("g", i32::from(self.g))
                .with("b", i32::from(self.b))
                .with("a", i32::from(self.a)),
        )
    }
}

/// Generic font families understood by managed font objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FontFamily {
    #[default]
    Default,
    Decorative,
    Roman,
    Script,
    SansSerif,
    FixedPitch,
    Teletype,
}

impl FontFamily {
    /// Integer id used on the managed side.
    pub fn id(self) -> i32 {
        match self {
            Self::Default => 0,
            Self::Decorative => 1,
            Self::Roman => 2,
            Self::Script => 3,
            Self::SansSerif => 4,
            Self::FixedPitch => 5,
            Self::Teletype => 6,
        }
    }

    /// Family id back to the enumeration; unknown ids map to `Default`.
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => Self::Decorative,
            2 => Self::Roman,
            3 => Self::Script,
            4 => Self::SansSerif,
            5 => Self::FixedPitch,
            6 => Self::Teletype,
            _ => Self::Default,
        }
    }

    /// Concrete face used when no explicit face is named.
    pub fn fallback_face(self) -> Option<&'static str> {
        match self {
            Self::Roman => Some("Times New Roman"),
            Self::Script => Some("Comic Sans MS"),
            Self::SansSerif => Some("Helvetica"),
            Self::FixedPitch | Self::Teletype => Some("Courier New"),
            Self::Default | Self::Decorative => None,
        }
    }
}

/// Font style bit: bold.
pub const FONT_STYLE_BOLD: i32 = 1;
/// Font style bit: italic.
pub const FONT_STYLE_ITALIC: i32 = 2;
/// Font style bit: underlined.
pub const FONT_STYLE_UNDERLINED: i32 = 4;
/// Size value meaning "toolkit default size".
pub const FONT_SIZE_DEFAULT: i32 = -1;

/// A font description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Font {
    pub family: FontFamily,
    /// Explicit face name; overrides the family fallback.
    pub face: Option<String>,
    /// Point size; `None` keeps the toolkit default.
    pub point_size: Option<i32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Font {
    /// The face the toolkit should load, if any.
    pub fn resolved_face(&self) -> Option<&str> {
        self.face.as_deref().or_else(|| self.family.fallback_face())
    }

    fn style_bits(&self) -> i32 {
        let mut style = 0;
        if self.bold {
            style |= FONT_STYLE_BOLD;
        }
        if self.italic {
            style |= FONT_STYLE_ITALIC;
        }
        if self.underline {
            style |= FONT_STYLE_UNDERLINED;
        }
        style
    }
}

/// `None` converts to the default font.
impl FromManaged for Font {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        if value.is_none() {
            return Ok(Self::default());
        }
        let family = FontFamily::from_id(i32::from_managed(&value.required_attr("family")?)?);
        let face = String::from_managed(&value.required_attr("face")?)?;
        let size = i32::from_managed(&value.required_attr("size")?)?;
        let style = i32::from_managed(&value.required_attr("style")?)?;
        Ok(Self {
            family,
            face: (!face.is_empty()).then_some(face),
            point_size: (size != FONT_SIZE_DEFAULT).then_some(size),
            bold: style & FONT_STYLE_BOLD != 0,
            italic: style & FONT_STYLE_ITALIC != 0,
            underline: style & FONT_STYLE_UNDERLINED != 0,
        })
    }
}

impl IntoManaged for Font {
    fn into_managed(self) -> ManagedValue {
        let style = self.style_bits();
        ManagedValue::Struct(
            ManagedStruct::new(FONT_CLASS)
                .with("family", self.family.id())
                .with("face", self.face.unwrap_or_default())
                .with("size", self.point_size.unwrap_or(FONT_SIZE_DEFAULT))
                .with("style", style),
        )
    }
}

/// Dates accept both date and datetime values; the time part is dropped.
impl FromManaged for NaiveDate {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::Date(d) => Ok(*d),
            ManagedValue::DateTime(dt) => Ok(dt.date()),
            other => Err(ConversionError::mismatch(
                "a date or datetime",
                other,
            )),
        }
    }
}

impl IntoManaged for NaiveDate {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Date(self)
    }
}

/// Datetimes cross the bridge with millisecond precision.
impl FromManaged for NaiveDateTime {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::DateTime(dt) => Ok(truncate_to_millis(*dt)),
            other => Err(ConversionError::mismatch("a datetime", other)),
        }
    }
}

impl IntoManaged for NaiveDateTime {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::DateTime(truncate_to_millis(self))
    }
}

fn truncate_to_millis(dt: NaiveDateTime) -> NaiveDateTime {
    let nanos = dt.nanosecond() / 1_000_000 * 1_000_000;
    dt.with_nanosecond(nanos).unwrap_or(dt)
}

impl FromManaged for Arc<RgbaImage> {
    fn from_managed(value: &ManagedValue) -> Result<Self, ConversionError> {
        match value {
            ManagedValue::Bitmap(img) => Ok(Arc::clone(img)),
            other => Err(ConversionError::mismatch("a bitmap", other)),
        }
    }
}

impl IntoManaged for Arc<RgbaImage> {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Bitmap(self)
    }
}

impl IntoManaged for RgbaImage {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::Bitmap(Arc::new(self))
    }
}

impl IntoManaged for Vec<String> {
    fn into_managed(self) -> ManagedValue {
        ManagedValue::tuple(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn int_accepts_prefixed_literals() {
        assert_eq!(i32::from_managed(&"0x1F".into()), Ok(31));
        assert_eq!(i32::from_managed(&"017".into()), Ok(15));
        assert_eq!(i32::from_managed(&"-42".into()), Ok(-42));
        assert_eq!(i32::from_managed(&ManagedValue::Float(3.9)), Ok(3));
        assert!(i32::from_managed(&"abc".into()).is_err());
        assert!(matches!(
            i32::from_managed(&ManagedValue::Int(i64::MAX)),
            Err(ConversionError::Overflow(_))
        ));
    }

    #[test]
    fn int_sign_only_before_prefix() {
        assert_eq!(i64::from_managed(&"-0x10".into()), Ok(-16));
        assert_eq!(i64::from_managed(&"+0b101".into()), Ok(5));
        assert_eq!(i64::from_managed(&"-9223372036854775808".into()), Ok(i64::MIN));
        assert!(i64::from_managed(&"0x-5".into()).is_err());
        assert!(i64::from_managed(&"0o+7".into()).is_err());
        assert!(i64::from_managed(&"--5".into()).is_err());
        assert!(i64::from_managed(&"+-5".into()).is_err());
        assert!(i64::from_managed(&"0-5".into()).is_err());
    }

    #[test]
    fn int_list_rejects_non_sequences() {
        let list = ManagedValue::List(vec![1.into(), "2".into()]);
        assert_eq!(Vec::<i32>::from_managed(&list), Ok(vec![1, 2]));
        assert!(matches!(
            Vec::<i32>::from_managed(&ManagedValue::Int(1)),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn point_from_none_is_origin() {
        assert_eq!(Point::from_managed(&ManagedValue::None), Ok(Point::default()));
        let managed = Point::new(3, -4).into_managed();
        assert_eq!(managed.attr("x"), Some(ManagedValue::Int(3)));
        assert_eq!(Point::from_managed(&managed), Ok(Point::new(3, -4)));
    }

    #[test]
    fn point_missing_attribute() {
        let value = ManagedValue::Struct(ManagedStruct::new(VECTOR_CLASS).with("x", 1));
        assert_eq!(
            Point::from_managed(&value),
            Err(ConversionError::MissingAttribute("y"))
        );
    }

    #[test]
    fn color_from_sequence_and_attributes() {
        let seq = ManagedValue::Tuple(vec![10.into(), 20.into(), 30.into()]);
        assert_eq!(Color::from_managed(&seq), Ok(Color::rgb(10, 20, 30)));

        let short = ManagedValue::Tuple(vec![10.into(), 20.into()]);
        assert!(matches!(
            Color::from_managed(&short),
            Err(ConversionError::InvalidValue(_))
        ));

        let attrs = Color::rgba(1, 2, 3, 4).into_managed();
        assert_eq!(Color::from_managed(&attrs), Ok(Color::rgba(1, 2, 3, 4)));
        assert_eq!(Option::<Color>::from_managed(&ManagedValue::None), Ok(None));
    }

    #[test]
    fn color_channel_overflow() {
        let seq = ManagedValue::Tuple(vec![300.into(), 0.into(), 0.into()]);
        assert_eq!(Color::from_managed(&seq), Err(ConversionError::Overflow(300)));
    }

    #[test]
    fn font_style_bits() {
        let font = Font {
            family: FontFamily::Roman,
            face: None,
            point_size: Some(12),
            bold: true,
            italic: false,
            underline: true,
        };
        assert_eq!(font.resolved_face(), Some("Times New Roman"));
        let managed = font.clone().into_managed();
        assert_eq!(managed.attr("style"), Some(ManagedValue::Int(5)));
        assert_eq!(Font::from_managed(&managed), Ok(font));
    }

    #[test]
    fn date_accepts_datetime() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let dt = date.and_time(NaiveTime::from_hms_micro_opt(10, 30, 0, 123_456).unwrap());
        assert_eq!(NaiveDate::from_managed(&ManagedValue::DateTime(dt)), Ok(date));
        let millis = NaiveDateTime::from_managed(&ManagedValue::DateTime(dt)).unwrap();
        assert_eq!(millis.nanosecond(), 123_000_000);
        assert!(NaiveDateTime::from_managed(&ManagedValue::Date(date)).is_err());
    }

    #[test]
    fn string_and_buffer() {
        assert_eq!(String::from_managed(&"hi".into()), Ok("hi".to_string()));
        assert!(String::from_managed(&ManagedValue::Int(1)).is_err());
        assert_eq!(Buffer::from_managed(&"ab".into()), Ok(Buffer(b"ab".to_vec())));
    }

    #[test]
    fn rect_union_skips_empty() {
        let a = Rect::new(10, 10, 20, 20);
        let b = Rect::new(0, 25, 5, 10);
        assert_eq!(a.union(&b), Rect::new(0, 10, 30, 25));
        assert_eq!(Rect::default().union(&a), a);
        assert!(a.contains(Point::new(10, 29)));
        assert!(!a.contains(Point::new(30, 10)));
    }

    #[test]
    fn geometry_saturates_on_extreme_coordinates() {
        let far = Point::new(i32::MAX, i32::MIN);
        assert_eq!(far.manhattan_distance(Point::new(i32::MIN, i32::MAX)), i32::MAX);
        assert_eq!(Point::new(3, 4).manhattan_distance(Point::new(0, 0)), 7);
        assert_eq!(Point::new(i32::MIN, 0) - Point::new(1, 0), Point::new(i32::MIN, 0));

        let wide = Rect::new(i32::MAX - 10, 0, i32::MAX, 10);
        assert!(wide.contains(Point::new(i32::MAX, 5)));
        let union = wide.union(&Rect::new(i32::MIN, 0, 10, 10));
        assert_eq!(union.x, i32::MIN);
        assert_eq!(union.width, i32::MAX);
        assert_eq!(Rect::new(i32::MIN, 0, 1, 1).relative_to(Point::new(1, 0)).x, i32::MIN);
    }

    #[test]
    fn truthiness() {
        assert!(!ManagedValue::None.is_truthy());
        assert!(!ManagedValue::Int(0).is_truthy());
        assert!(!ManagedValue::Str(String::new()).is_truthy());
        assert!(ManagedValue::Tuple(vec![ManagedValue::None]).is_truthy());
        assert!(ManagedValue::from(EventRecord::new()).is_truthy());
    }

    #[test]
    fn event_record_is_shared() {
        let record = EventRecord::new();
        let alias = record.clone();
        alias.set("action", 2);
        assert_eq!(record.get_as::<i32>("action"), Ok(2));
        assert_eq!(record.get_as::<Option<i32>>("missing"), Ok(None));
    }
}
