//! Report entity
//!
//! A [`Report`] captures one error event: either a plain message or an
//! exception, plus a mutable attribute bag. Everything except the
//! attributes is fixed at construction.
//!
//! ## Invariants
//!
//! - `is_exception_report()` is true exactly when exception data was captured
//! - `classifier()` is the exception type name, or empty for message reports
//! - The [`ExceptionStack`] is built lazily, once, and never for message
//!   reports

use std::borrow::Cow;
use std::error::Error;
use std::panic::Location;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attributes::{merge_attributes, AttributeValue, Attributes};
use super::errors::DomainError;
use super::exception::{CapturedException, ExceptionStack};
use super::newtypes::ReportId;

// ============================================================================
// CallingContext
// ============================================================================

/// Source location of the code that constructed a report
///
/// Recorded through `#[track_caller]` on the report constructors instead of
/// any runtime inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallingContext {
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// Module or component name supplied by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl CallingContext {
    fn from_location(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
            module: None,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// A captured error event awaiting delivery
#[derive(Debug, Clone)]
pub struct Report {
    id: ReportId,
    timestamp: DateTime<Utc>,
    message: Option<String>,
    exception: Option<CapturedException>,
    attributes: Attributes,
    calling_context: CallingContext,
    stack: OnceLock<ExceptionStack>,
}

impl Report {
    /// Creates a message report.
    #[track_caller]
    pub fn from_message(message: impl Into<String>, attributes: Attributes) -> Self {
        Self::build(Some(message.into()), None, attributes, Location::caller())
    }

    /// Creates an exception report from an error value.
    ///
    /// The classifier is the error's fully qualified type name.
    #[track_caller]
    pub fn from_error<E: Error + 'static>(error: &E, attributes: Attributes) -> Self {
        let exception = CapturedException::from_error(error);
        Self::build(
            Some(exception.message().to_string()),
            Some(exception),
            attributes,
            Location::caller(),
        )
    }

    /// Creates a report from an optional error.
    ///
    /// `None` yields a report without exception data rather than an error.
    #[track_caller]
    pub fn from_optional_error<E: Error + 'static>(
        error: Option<&E>,
        attributes: Attributes,
    ) -> Self {
        let location = Location::caller();
        match error {
            Some(error) => {
                let exception = CapturedException::from_error(error);
                Self::build(
                    Some(exception.message().to_string()),
                    Some(exception),
                    attributes,
                    location,
                )
            }
            None => Self::build(None, None, attributes, location),
        }
    }

    /// Creates an exception report from already captured exception data.
    #[track_caller]
    pub fn from_exception(exception: CapturedException, attributes: Attributes) -> Self {
        Self::build(
            Some(exception.message().to_string()),
            Some(exception),
            attributes,
            Location::caller(),
        )
    }

    fn build(
        message: Option<String>,
        exception: Option<CapturedException>,
        attributes: Attributes,
        location: &Location<'_>,
    ) -> Self {
        Self {
            id: ReportId::new(),
            timestamp: Utc::now(),
            message,
            exception,
            attributes,
            calling_context: CallingContext::from_location(location),
            stack: OnceLock::new(),
        }
    }

    /// Sets the module name recorded in the calling context.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.calling_context.module = Some(module.into());
        self
    }

    /// Adds a single attribute, returning the report.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> ReportId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn exception(&self) -> Option<&CapturedException> {
        self.exception.as_ref()
    }

    pub fn calling_context(&self) -> &CallingContext {
        &self.calling_context
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Inserts or replaces an attribute.
    ///
    /// Keys must contain at least one non-whitespace character.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), DomainError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(DomainError::InvalidAttributeKey(key));
        }
        self.attributes.insert(key, value.into());
        Ok(())
    }

    /// Removes an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    pub fn is_exception_report(&self) -> bool {
        self.exception.is_some()
    }

    /// Exception type name for exception reports, empty otherwise.
    pub fn classifier(&self) -> &str {
        self.exception
            .as_ref()
            .map(CapturedException::type_name)
            .unwrap_or("")
    }

    /// Returns the normalized exception stack for exception reports.
    ///
    /// Built on first call and cached; later calls return the same value.
    pub fn exception_stack(&self) -> Option<&ExceptionStack> {
        let exception = self.exception.as_ref()?;
        Some(
            self.stack
                .get_or_init(|| ExceptionStack::from_exception(exception)),
        )
    }

    /// Report attributes with `overrides` merged on top.
    ///
    /// Borrows the report's own attributes when there is nothing to merge.
    pub fn concat_attributes<'a>(&'a self, overrides: Option<&Attributes>) -> Cow<'a, Attributes> {
        merge_attributes(&self.attributes, overrides)
    }
}
