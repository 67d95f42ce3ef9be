//! Captured exceptions and the derived exception stack
//!
//! A [`CapturedException`] is the raw material taken from an error value at
//! report construction time: its type name, display message, `source()`
//! chain and backtrace text. The [`ExceptionStack`] is the normalized,
//! read-only view built from it on demand.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;

use serde::{Deserialize, Serialize};

/// Error data captured from an error value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedException {
    /// Fully qualified type name, e.g. `std::io::error::Error`
    type_name: String,
    /// `Display` output of the error
    message: String,
    /// Display output of each `source()` in order, outermost first
    chain: Vec<String>,
    /// Backtrace text, present only when one was actually captured
    backtrace: Option<String>,
}

impl CapturedException {
    /// Describes an exception by type name and message.
    ///
    /// Used for errors that did not originate as a Rust error value, or for
    /// trait objects whose concrete type is no longer known.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            chain: Vec::new(),
            backtrace: capture_backtrace_text(),
        }
    }

    /// Captures type name, message, source chain and a backtrace from `error`.
    ///
    /// The backtrace honours `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`; when
    /// capture is disabled no frames are recorded.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            chain: source_chain(error),
            backtrace: capture_backtrace_text(),
        }
    }

    /// Replaces the backtrace text (e.g. one captured elsewhere).
    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    /// Replaces the source chain.
    pub fn with_chain(mut self, chain: Vec<String>) -> Self {
        self.chain = chain;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

fn source_chain(error: &dyn Error) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = error.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

fn capture_backtrace_text() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

// ============================================================================
// ExceptionStack
// ============================================================================

/// One entry of the error chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionEntry {
    /// Type name; only known for the outermost error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub message: String,
}

/// One frame of a parsed backtrace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Whether the frame belongs to application code rather than std or
    /// runtime internals
    pub in_app: bool,
}

/// Normalized, read-only view of a captured exception
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExceptionStack {
    /// Outermost error first, followed by its sources
    pub exceptions: Vec<ExceptionEntry>,
    /// Parsed frames, innermost (most recent call) first
    pub frames: Vec<StackFrame>,
}

impl ExceptionStack {
    /// Builds the stack from captured exception data. Pure: the same input
    /// always yields the same stack.
    pub fn from_exception(exception: &CapturedException) -> Self {
        let mut exceptions = Vec::with_capacity(exception.chain.len() + 1);
        exceptions.push(ExceptionEntry {
            type_name: Some(exception.type_name.clone()),
            message: exception.message.clone(),
        });
        exceptions.extend(exception.chain.iter().map(|message| ExceptionEntry {
            type_name: None,
            message: message.clone(),
        }));

        let frames = exception
            .backtrace
            .as_deref()
            .map(parse_backtrace)
            .unwrap_or_default();

        Self { exceptions, frames }
    }

    /// Returns only the frames that belong to application code.
    pub fn app_frames(&self) -> impl Iterator<Item = &StackFrame> {
        self.frames.iter().filter(|f| f.in_app)
    }
}

/// Parses the `Display` form of a `std::backtrace::Backtrace`.
///
/// Frame lines look like `  12: my_app::handler::run` and are optionally
/// followed by a location line `at src/handler.rs:40:9`.
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, lineno, column) = parse_location(location);
                frame.file = Some(file);
                frame.line = lineno;
                frame.column = column;
            }
            continue;
        }

        let Some((index, function)) = line.split_once(':') else {
            continue;
        };
        if index.trim().parse::<u32>().is_err() {
            continue;
        }
        let function = function.trim();
        if function.is_empty() {
            continue;
        }

        let module = function
            .rfind("::")
            .map(|idx| function[..idx].to_string())
            .filter(|m| !m.is_empty());

        frames.push(StackFrame {
            function: function.to_string(),
            module,
            file: None,
            line: None,
            column: None,
            in_app: is_in_app_frame(function),
        });
    }

    frames
}

/// Splits `path:line:col` from the right so Windows drive letters survive.
fn parse_location(location: &str) -> (String, Option<u32>, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();

    match (rest, middle, last) {
        (Some(file), Some(line), Some(col)) => match (line.parse(), col.parse()) {
            (Ok(l), Ok(c)) => (file.to_string(), Some(l), Some(c)),
            _ => (location.to_string(), None, None),
        },
        (None, Some(file), Some(line)) => match line.parse() {
            Ok(l) => (file.to_string(), Some(l), None),
            Err(_) => (location.to_string(), None, None),
        },
        _ => (location.to_string(), None, None),
    }
}

/// Determine if a frame is from application code vs std / runtime internals.
fn is_in_app_frame(function: &str) -> bool {
    const SYSTEM_PREFIXES: &[&str] = &[
        "std::",
        "core::",
        "alloc::",
        "<std::",
        "<core::",
        "<alloc::",
        "tokio::",
        "<tokio::",
        "futures::",
        "<futures::",
        "futures_util::",
        "async_trait::",
        "tracing::",
        "<tracing::",
        "backtrace::",
        "faultline_core::domain::exception::",
        "rust_begin_unwind",
        "__rust_",
        "_rust_",
        "__libc_start",
    ];
    const SYSTEM_SYMBOLS: &[&str] = &["_start"];

    const SYSTEM_CONTAINS: &[&str] = &["::panicking::", "::rt::", "::sys_common::"];

    if SYSTEM_SYMBOLS.contains(&function)
        || SYSTEM_PREFIXES.iter().any(|p| function.starts_with(p))
    {
        return false;
    }
    !SYSTEM_CONTAINS.iter().any(|c| function.contains(c))
}
