//! Error types for Horizon Bridge.

use std::fmt;

/// The main error type for Horizon Bridge core operations.
#[derive(Debug)]
pub enum BridgeError {
    /// The process-wide bridge has already been installed.
    AlreadyInstalled,
    /// The process-wide bridge has not been installed yet.
    NotInstalled,
    /// The UI thread's event pump has shut down and no longer accepts posts.
    PumpClosed,
    /// A value could not be converted across the boundary.
    Conversion(ConversionError),
    /// Managed code raised an error.
    Managed(ManagedError),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "Bridge has already been installed"),
            Self::NotInstalled => {
                write!(f, "Bridge has not been installed. Call Bridge::install() first")
            }
            Self::PumpClosed => write!(f, "The UI event pump has shut down"),
            Self::Conversion(err) => write!(f, "Conversion error: {err}"),
            Self::Managed(err) => write!(f, "Managed error: {err}"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Conversion(err) => Some(err),
            Self::Managed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConversionError> for BridgeError {
    fn from(err: ConversionError) -> Self {
        Self::Conversion(err)
    }
}

impl From<ManagedError> for BridgeError {
    fn from(err: ManagedError) -> Self {
        Self::Managed(err)
    }
}

/// Errors raised while converting between native and managed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The managed value has the wrong type for the requested native type.
    TypeMismatch {
        /// What the converter accepts.
        expected: &'static str,
        /// The managed type that was supplied.
        found: String,
    },
    /// A required attribute is missing from a managed object.
    MissingAttribute(&'static str),
    /// The value has the right type but an unacceptable shape or content.
    InvalidValue(String),
    /// An integer does not fit the native width.
    Overflow(i64),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::MissingAttribute(name) => write!(f, "object has no attribute '{name}'"),
            Self::InvalidValue(msg) => write!(f, "{msg}"),
            Self::Overflow(value) => write!(f, "integer {value} out of range"),
        }
    }
}

impl std::error::Error for ConversionError {}

impl ConversionError {
    pub(crate) fn mismatch(expected: &'static str, found: &crate::values::ManagedValue) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.type_name().to_string(),
        }
    }

    /// The managed exception class this error surfaces as.
    pub fn managed_kind(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "TypeError",
            Self::MissingAttribute(_) => "ReferenceError",
            Self::InvalidValue(_) => "ValueError",
            Self::Overflow(_) => "RangeError",
        }
    }
}

/// An error raised by managed code, captured at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedError {
    /// The managed exception class name.
    pub kind: String,
    /// The exception message.
    pub message: String,
    /// Pre-rendered stack frames, outermost first.
    pub traceback: Vec<String>,
}

impl ManagedError {
    /// Create an error without traceback.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Attach a traceback.
    pub fn with_traceback(mut self, frames: impl IntoIterator<Item = String>) -> Self {
        self.traceback = frames.into_iter().collect();
        self
    }

    /// Render the error the way the managed runtime prints it.
    ///
    /// The rendered text is the deduplication key used by the exception
    /// funnel, so it must be stable for identical failures.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.traceback.is_empty() {
            out.push_str("Stack (outermost first):\n");
            for frame in &self.traceback {
                out.push_str("  ");
                out.push_str(frame);
                out.push('\n');
            }
        }
        out.push_str(&self.kind);
        if !self.message.is_empty() {
            out.push_str(": ");
            out.push_str(&self.message);
        }
        out
    }
}

impl fmt::Display for ManagedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ManagedError {}

impl From<ConversionError> for ManagedError {
    fn from(err: ConversionError) -> Self {
        Self::new(err.managed_kind(), err.to_string())
    }
}

/// A specialized Result type for Horizon Bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
