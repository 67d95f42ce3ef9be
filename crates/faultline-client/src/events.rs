//! Event hooks
//!
//! Callers observe delivery through four optional hooks. Each slot holds at
//! most one callback; setting it again replaces the previous one. Callbacks
//! run on whichever task settles the report, never while a hook lock is held,
//! so a callback may itself replace hooks.

use std::sync::{Arc, PoisonError, RwLock};

use faultline_core::domain::{Report, ReportPayload, SubmissionResult};

use crate::ClientError;

pub type ServerResponseHook = Arc<dyn Fn(&SubmissionResult) + Send + Sync>;
pub type ServerErrorHook = Arc<dyn Fn(&ClientError) + Send + Sync>;
pub type BeforeSendHook = Arc<dyn Fn(&mut ReportPayload) + Send + Sync>;
pub type ReportLimitHook = Arc<dyn Fn(&Report) + Send + Sync>;

/// Registered callbacks of one client
#[derive(Default)]
pub struct EventHooks {
    on_server_response: RwLock<Option<ServerResponseHook>>,
    on_server_error: RwLock<Option<ServerErrorHook>>,
    before_send: RwLock<Option<BeforeSendHook>>,
    on_report_limit_reached: RwLock<Option<ReportLimitHook>>,
}

fn replace<T>(slot: &RwLock<Option<T>>, value: Option<T>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

fn current<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the endpoint's answer for every delivered report.
    pub fn set_on_server_response<F>(&self, hook: F)
    where
        F: Fn(&SubmissionResult) + Send + Sync + 'static,
    {
        replace(&self.on_server_response, Some(Arc::new(hook)));
    }

    /// Called once for every report that was not delivered, including
    /// reports that were queued for a later retry.
    pub fn set_on_server_error<F>(&self, hook: F)
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        replace(&self.on_server_error, Some(Arc::new(hook)));
    }

    /// Called with the payload right before it is serialized for sending.
    pub fn set_before_send<F>(&self, hook: F)
    where
        F: Fn(&mut ReportPayload) + Send + Sync + 'static,
    {
        replace(&self.before_send, Some(Arc::new(hook)));
    }

    /// Called with the report dropped by the rate limiter.
    pub fn set_on_report_limit_reached<F>(&self, hook: F)
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        replace(&self.on_report_limit_reached, Some(Arc::new(hook)));
    }

    /// Removes every registered hook.
    pub fn clear(&self) {
        replace(&self.on_server_response, None);
        replace(&self.on_server_error, None);
        replace(&self.before_send, None);
        replace(&self.on_report_limit_reached, None);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn server_response(&self, result: &SubmissionResult) {
        if let Some(hook) = current(&self.on_server_response) {
            hook(result);
        }
    }

    pub(crate) fn server_error(&self, error: &ClientError) {
        if let Some(hook) = current(&self.on_server_error) {
            hook(error);
        }
    }

    pub(crate) fn before_send(&self, payload: &mut ReportPayload) {
        if let Some(hook) = current(&self.before_send) {
            hook(payload);
        }
    }

    pub(crate) fn report_limit_reached(&self, report: &Report) {
        if let Some(hook) = current(&self.on_report_limit_reached) {
            hook(report);
        }
    }
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field("on_server_response", &current(&self.on_server_response).is_some())
            .field("on_server_error", &current(&self.on_server_error).is_some())
            .field("before_send", &current(&self.before_send).is_some())
            .field(
                "on_report_limit_reached",
                &current(&self.on_report_limit_reached).is_some(),
            )
            .finish()
    }
}
