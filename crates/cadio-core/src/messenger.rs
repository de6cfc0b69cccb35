//! Levelled diagnostic sink
//!
//! Orchestration code reports user-visible diagnostics through a [`Messenger`]
//! rather than a concrete UI channel. The convenience emitters all funnel into
//! the single [`Messenger::emit_message`] dispatch so implementors override
//! one method.

use once_cell::sync::Lazy;
use std::sync::Arc;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Developer-level trace output
    Trace,
    /// Informational message
    Info,
    /// Something suspicious but not fatal
    Warning,
    /// Operation-level failure
    Error,
}

/// Sink for user-visible diagnostics
pub trait Messenger: Send + Sync {
    /// Single dispatch point all emitters forward to
    fn emit_message(&self, msg_type: MessageType, text: &str);

    /// Emit a [`MessageType::Trace`] message
    fn emit_trace(&self, text: &str) {
        self.emit_message(MessageType::Trace, text);
    }

    /// Emit a [`MessageType::Info`] message
    fn emit_info(&self, text: &str) {
        self.emit_message(MessageType::Info, text);
    }

    /// Emit a [`MessageType::Warning`] message
    fn emit_warning(&self, text: &str) {
        self.emit_message(MessageType::Warning, text);
    }

    /// Emit a [`MessageType::Error`] message
    fn emit_error(&self, text: &str) {
        self.emit_message(MessageType::Error, text);
    }
}

/// Messenger that discards every message
///
/// Orchestrators substitute the process-wide instance when the caller supplies
/// no messenger of their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMessenger;

impl NullMessenger {
    /// Process-wide shared instance, alive for the program duration
    #[must_use = "returns the process-wide null messenger"]
    pub fn instance() -> Arc<dyn Messenger> {
        static INSTANCE: Lazy<Arc<NullMessenger>> = Lazy::new(|| Arc::new(NullMessenger));
        Arc::clone(&*INSTANCE) as Arc<dyn Messenger>
    }
}

impl Messenger for NullMessenger {
    fn emit_message(&self, _msg_type: MessageType, _text: &str) {}
}

/// Messenger built from a closure
///
/// Avoids writing a one-off trait impl when a callback is all the caller has,
/// e.g. collecting messages into a UI list model.
pub struct MessengerByCallback {
    callback: Box<dyn Fn(MessageType, &str) + Send + Sync>,
}

impl MessengerByCallback {
    /// Wrap `callback` as a [`Messenger`]
    pub fn new(callback: impl Fn(MessageType, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Messenger for MessengerByCallback {
    fn emit_message(&self, msg_type: MessageType, text: &str) {
        (self.callback)(msg_type, text);
    }
}

/// Messenger forwarding onto the `log` facade
///
/// Trace maps to `log::trace!`, Info to `log::info!`, Warning to `log::warn!`
/// and Error to `log::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessenger;

impl Messenger for LogMessenger {
    fn emit_message(&self, msg_type: MessageType, text: &str) {
        match msg_type {
            MessageType::Trace => log::trace!("{text}"),
            MessageType::Info => log::info!("{text}"),
            MessageType::Warning => log::warn!("{text}"),
            MessageType::Error => log::error!("{text}"),
        }
    }
}
