#![doc = r"Lifecycle and action dispatch engine binding markup scopes to controllers."]

pub mod accessor;
pub mod action;
pub mod collections;
pub mod config;
pub mod controller;
pub mod diagnostics;
mod dispatcher;
pub mod engine;
pub mod host;
pub mod lifecycle;
pub mod memory;
pub mod platform;
pub mod registry;
pub mod runtime;
mod watcher;

#[cfg(test)]
mod test_support;

pub use accessor::{AllTargets, AttributeMap, Targets};
pub use action::ActionDescriptor;
pub use config::{EngineConfig, DEFAULT_EVENTS};
pub use controller::{
    ActionContext, ActionResult, ActionSet, Controller, InstanceId, IntoActionResult,
    ScopeContext, ScopeFactory,
};
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, Stage};
pub use engine::Engine;
pub use host::{Event, EventListener, Host, MutationCallback, MutationRecord, NodeId};
pub use lifecycle::{FlushReport, LifecycleManager};
pub use memory::{DomError, MemoryDocument};
pub use platform::RuntimeScheduler;
pub use registry::ScopeRegistry;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};

/// Values and params share one accessor type.
pub type Values = AttributeMap;
pub type Params = AttributeMap;
