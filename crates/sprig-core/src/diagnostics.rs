//! Advisory reporting channel.
//!
//! Nothing the engine reports is ever raised back to the caller. Every
//! [`Diagnostic`] is logged through the `log` facade at its own level and
//! handed to an optional user sink.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::host::NodeId;

/// Where a caught panic originated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Factory,
    Connect,
    Disconnect,
    Action(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Factory => f.write_str("factory"),
            Stage::Connect => f.write_str("connect"),
            Stage::Disconnect => f.write_str("disconnect"),
            Stage::Action(method) => write!(f, "action `{method}`"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("no scope named `{scope}` is registered (node {node})")]
    UnknownScope { scope: String, node: NodeId },
    #[error("node {node} has no scope name")]
    MissingScopeName { node: NodeId },
    #[error("scope `{scope}` has no action `{method}`")]
    UnknownAction { scope: String, method: String },
    #[error("action `{method}` on scope `{scope}` failed: {message}")]
    HandlerFailed {
        scope: String,
        method: String,
        message: String,
    },
    #[error("{stage} of scope `{scope}` panicked: {message}")]
    Panicked {
        scope: String,
        stage: Stage,
        message: String,
    },
    #[error("controller of scope `{scope}` is already in use; `{method}` skipped")]
    ControllerBusy { scope: String, method: String },
}

impl Diagnostic {
    pub fn level(&self) -> log::Level {
        match self {
            Diagnostic::MissingScopeName { .. } => log::Level::Debug,
            Diagnostic::UnknownAction { .. } => log::Level::Warn,
            _ => log::Level::Error,
        }
    }
}

pub type DiagnosticSink = Rc<dyn Fn(&Diagnostic) + 'static>;

#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Rc<RefCell<Option<DiagnosticSink>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the sink that receives every report after it is logged.
    pub fn set_sink(&self, sink: impl Fn(&Diagnostic) + 'static) {
        *self.sink.borrow_mut() = Some(Rc::new(sink));
    }

    pub fn clear_sink(&self) {
        *self.sink.borrow_mut() = None;
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        log::log!(diagnostic.level(), "{diagnostic}");
        let sink = self.sink.borrow().clone();
        if let Some(sink) = sink {
            sink(&diagnostic);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("has_sink", &self.sink.borrow().is_some())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
