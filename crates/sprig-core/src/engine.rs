use std::cell::{Cell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::controller::{Controller, InstanceId, ScopeContext};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::dispatcher::ActionDispatcher;
use crate::host::{Event, Host, NodeId};
use crate::lifecycle::{FlushReport, LifecycleManager};
use crate::registry::ScopeRegistry;
use crate::runtime::RuntimeHandle;
use crate::watcher::MutationWatcher;

/// One engine bound to one host document.
///
/// Construct it once at startup, register scopes with [`Engine::define_scope`]
/// and call [`Engine::start`] when the document is ready. Listeners and the
/// mutation observer hold only weak references, so the engine must be kept
/// alive by its owner for as long as the document should stay wired.
pub struct Engine {
    lifecycle: LifecycleManager,
    started: Cell<bool>,
}

impl Engine {
    pub fn new(host: Rc<dyn Host>, runtime: RuntimeHandle) -> Self {
        Self::with_config(host, runtime, EngineConfig::default())
    }

    pub fn with_config(host: Rc<dyn Host>, runtime: RuntimeHandle, config: EngineConfig) -> Self {
        let lifecycle = LifecycleManager::new(
            host,
            runtime,
            Rc::new(config),
            ScopeRegistry::new(),
            Diagnostics::new(),
        );
        Self {
            lifecycle,
            started: Cell::new(false),
        }
    }

    /// Registers `factory` under `name`, replacing any earlier registration.
    pub fn define_scope<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ScopeContext) -> Box<dyn Controller> + 'static,
    {
        self.lifecycle.registry().register(name, Rc::new(factory));
    }

    /// Typed convenience over [`Engine::define_scope`].
    pub fn define<C, F>(&self, name: impl Into<String>, factory: F)
    where
        C: Controller,
        F: Fn(&ScopeContext) -> C + 'static,
    {
        self.define_scope(name, move |ctx: &ScopeContext| -> Box<dyn Controller> {
            Box::new(factory(ctx))
        });
    }

    /// Routes every report to `sink` in addition to the log.
    pub fn on_diagnostic(&self, sink: impl Fn(&Diagnostic) + 'static) {
        self.lifecycle.diagnostics().set_sink(sink);
    }

    /// Connects every scope already in the document, then starts observing
    /// mutations and installs the delegated listeners. Later calls do nothing.
    pub fn start(&self) {
        if self.started.replace(true) {
            return;
        }
        // Observe first so scopes inserted by startup factories reach the queue.
        MutationWatcher::observe(&self.lifecycle);
        let host = self.lifecycle.host();
        let scopes =
            host.subtree_with_attribute(host.document_element(), &self.config().scope_attribute);
        log::debug!("startup scan found {} scope roots", scopes.len());
        for node in scopes {
            if let Err(diagnostic) = self.lifecycle.connect(node) {
                self.lifecycle.diagnostics().report(diagnostic);
            }
        }
        ActionDispatcher::install(&self.lifecycle);
    }

    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    /// Dispatches `event` as the delegated listeners would. Returns the
    /// number of handlers that completed.
    pub fn dispatch(&self, event: &Event) -> usize {
        ActionDispatcher::new(self.lifecycle.clone()).dispatch(event)
    }

    /// Applies queued transitions now instead of waiting for the microtask.
    pub fn flush(&self) -> FlushReport {
        self.lifecycle.flush()
    }

    /// Unbinds `node` right away; for hosts about to destroy it.
    pub fn release(&self, node: NodeId) {
        self.lifecycle.release(node);
    }

    pub fn is_bound(&self, node: NodeId) -> bool {
        self.lifecycle.is_bound(node)
    }

    pub fn instance_id(&self, node: NodeId) -> Option<InstanceId> {
        self.lifecycle.instance_id(node)
    }

    pub fn bound_count(&self) -> usize {
        self.lifecycle.bound_count()
    }

    /// Runs `f` against the controller bound to `node` when it is a `C` and
    /// not already in use.
    pub fn with_controller<C, R>(&self, node: NodeId, f: impl FnOnce(&mut C) -> R) -> Option<R>
    where
        C: Controller,
    {
        let (_, controller) = self.lifecycle.controller(node)?;
        let mut guard: RefMut<'_, Box<dyn Controller>> = controller.try_borrow_mut().ok()?;
        let typed = guard.as_any_mut().downcast_mut::<C>()?;
        Some(f(typed))
    }

    pub fn config(&self) -> &EngineConfig {
        self.lifecycle.config()
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        self.lifecycle.host()
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("started", &self.started.get())
            .field("scopes", &self.lifecycle.registry().len())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
