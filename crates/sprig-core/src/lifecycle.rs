//! Connect/disconnect state machine for scope nodes.
//!
//! A node is *bound* while an instance is stored for it here and *unbound*
//! otherwise. The association is keyed by [`NodeId`] only; detaching a node
//! does not unbind it, only a disconnect transition does.
//!
//! Transitions requested by tree mutations are queued and applied by one
//! batched [`LifecycleManager::flush`] on the next microtask. The flush
//! re-checks attachment at that point, so any sequence of removals and
//! insertions of the same node inside one tick collapses to its net effect.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::collections::map::{HashMap, HashSet, IndexSet};
use crate::config::EngineConfig;
use crate::controller::{Controller, InstanceId, ScopeContext};
use crate::diagnostics::{panic_message, Diagnostic, Diagnostics, Stage};
use crate::host::{Host, NodeId};
use crate::registry::ScopeRegistry;
use crate::runtime::RuntimeHandle;

pub(crate) type SharedController = Rc<RefCell<Box<dyn Controller>>>;

struct Binding {
    id: InstanceId,
    scope: String,
    controller: SharedController,
}

/// Counts of what one flush did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub disconnected: usize,
    pub connected: usize,
    pub skipped: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.disconnected == 0 && self.connected == 0 && self.skipped == 0
    }
}

struct LifecycleInner {
    host: Rc<dyn Host>,
    runtime: RuntimeHandle,
    config: Rc<EngineConfig>,
    registry: ScopeRegistry,
    diagnostics: Diagnostics,
    bindings: RefCell<HashMap<NodeId, Binding>>,
    to_connect: RefCell<IndexSet<NodeId>>,
    to_disconnect: RefCell<IndexSet<NodeId>>,
    flush_scheduled: Cell<bool>,
    constructing: RefCell<HashSet<NodeId>>,
    next_instance: Cell<u64>,
}

impl LifecycleInner {
    fn scope_name(&self, node: NodeId) -> Option<String> {
        let name = self.host.attribute(node, &self.config.scope_attribute)?;
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn allocate_instance(&self) -> InstanceId {
        let id = self.next_instance.get();
        self.next_instance.set(id + 1);
        InstanceId(id)
    }
}

#[derive(Clone)]
pub struct LifecycleManager {
    inner: Rc<LifecycleInner>,
}

impl LifecycleManager {
    pub fn new(
        host: Rc<dyn Host>,
        runtime: RuntimeHandle,
        config: Rc<EngineConfig>,
        registry: ScopeRegistry,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            inner: Rc::new(LifecycleInner {
                host,
                runtime,
                config,
                registry,
                diagnostics,
                bindings: RefCell::new(HashMap::default()),
                to_connect: RefCell::new(IndexSet::default()),
                to_disconnect: RefCell::new(IndexSet::default()),
                flush_scheduled: Cell::new(false),
                constructing: RefCell::new(HashSet::default()),
                next_instance: Cell::new(1),
            }),
        }
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.inner.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.inner.diagnostics
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.inner.registry
    }

    pub(crate) fn downgrade(&self) -> WeakLifecycle {
        WeakLifecycle(Rc::downgrade(&self.inner))
    }

    /// Trimmed, non-empty scope name declared on `node`.
    pub fn scope_name(&self, node: NodeId) -> Option<String> {
        self.inner.scope_name(node)
    }

    pub fn is_bound(&self, node: NodeId) -> bool {
        self.inner.bindings.borrow().contains_key(&node)
    }

    pub fn instance_id(&self, node: NodeId) -> Option<InstanceId> {
        self.inner.bindings.borrow().get(&node).map(|b| b.id)
    }

    pub fn bound_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    /// Scope name and controller currently bound to `node`.
    pub(crate) fn controller(&self, node: NodeId) -> Option<(String, SharedController)> {
        self.inner
            .bindings
            .borrow()
            .get(&node)
            .map(|b| (b.scope.clone(), b.controller.clone()))
    }

    pub fn enqueue_connect(&self, node: NodeId) {
        self.inner.to_connect.borrow_mut().insert(node);
    }

    pub fn enqueue_disconnect(&self, node: NodeId) {
        self.inner.to_disconnect.borrow_mut().insert(node);
    }

    pub fn pending(&self) -> (usize, usize) {
        (
            self.inner.to_disconnect.borrow().len(),
            self.inner.to_connect.borrow().len(),
        )
    }

    pub fn flush_scheduled(&self) -> bool {
        self.inner.flush_scheduled.get()
    }

    /// Queues a flush on the next microtask unless one is already pending.
    pub fn schedule_flush(&self) {
        if self.inner.flush_scheduled.replace(true) {
            return;
        }
        let weak = self.downgrade();
        self.inner.runtime.queue_microtask(move || {
            if let Some(lifecycle) = weak.upgrade() {
                lifecycle.flush();
            }
        });
    }

    /// Binds `node` to a fresh instance of its declared scope.
    ///
    /// A no-op for bound nodes. A node whose factory is running further up
    /// the stack is queued for the next flush instead of being built twice.
    pub fn connect(&self, node: NodeId) -> Result<(), Diagnostic> {
        let inner = &self.inner;
        if self.is_bound(node) {
            return Ok(());
        }
        if inner.constructing.borrow().contains(&node) {
            log::trace!("deferring nested connect of {node}");
            self.enqueue_connect(node);
            self.schedule_flush();
            return Ok(());
        }

        let scope = inner
            .scope_name(node)
            .ok_or(Diagnostic::MissingScopeName { node })?;
        let factory = inner
            .registry
            .lookup(&scope)
            .ok_or_else(|| Diagnostic::UnknownScope {
                scope: scope.clone(),
                node,
            })?;

        let context = ScopeContext::new(inner.host.clone(), node, &inner.config);
        inner.constructing.borrow_mut().insert(node);
        let built = panic::catch_unwind(AssertUnwindSafe(|| factory(&context)));
        inner.constructing.borrow_mut().remove(&node);
        let controller = built.map_err(|payload| Diagnostic::Panicked {
            scope: scope.clone(),
            stage: Stage::Factory,
            message: panic_message(&*payload),
        })?;

        let id = inner.allocate_instance();
        let controller: SharedController = Rc::new(RefCell::new(controller));
        inner.bindings.borrow_mut().insert(
            node,
            Binding {
                id,
                scope: scope.clone(),
                controller: controller.clone(),
            },
        );
        log::debug!("bound scope `{scope}` on {node} as {id}");

        let hooked = panic::catch_unwind(AssertUnwindSafe(|| controller.borrow_mut().connect()));
        hooked.map_err(|payload| Diagnostic::Panicked {
            scope,
            stage: Stage::Connect,
            message: panic_message(&*payload),
        })
    }

    /// Runs the disconnect hook of `node`'s instance and drops the
    /// association. A no-op for unbound nodes.
    pub fn disconnect(&self, node: NodeId) -> Result<(), Diagnostic> {
        let Some((scope, controller)) = self.controller(node) else {
            return Ok(());
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            controller
                .try_borrow_mut()
                .map(|mut controller| controller.disconnect())
                .is_ok()
        }));
        self.inner.bindings.borrow_mut().remove(&node);
        log::debug!("unbound scope `{scope}` from {node}");
        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(Diagnostic::ControllerBusy {
                scope,
                method: "disconnect".to_string(),
            }),
            Err(payload) => Err(Diagnostic::Panicked {
                scope,
                stage: Stage::Disconnect,
                message: panic_message(&*payload),
            }),
        }
    }

    /// Unbinds `node` immediately, whatever its attachment, and drops any
    /// queued transition for it. Hosts that destroy nodes call this first.
    pub fn release(&self, node: NodeId) {
        self.inner.to_connect.borrow_mut().shift_remove(&node);
        self.inner.to_disconnect.borrow_mut().shift_remove(&node);
        if let Err(diagnostic) = self.disconnect(node) {
            self.inner.diagnostics.report(diagnostic);
        }
    }

    /// Applies all queued transitions: eligible disconnects first, then
    /// eligible connects.
    ///
    /// Both queues are taken up front, so anything queued while the flush
    /// runs belongs to the next one.
    pub fn flush(&self) -> FlushReport {
        let inner = &self.inner;
        inner.flush_scheduled.set(false);
        let to_disconnect = mem::take(&mut *inner.to_disconnect.borrow_mut());
        let to_connect = mem::take(&mut *inner.to_connect.borrow_mut());
        let mut report = FlushReport::default();

        for node in to_disconnect {
            if !self.should_disconnect(node) {
                report.skipped += 1;
                continue;
            }
            if let Err(diagnostic) = self.disconnect(node) {
                inner.diagnostics.report(diagnostic);
            }
            report.disconnected += 1;
        }

        for node in to_connect {
            if !self.should_connect(node) {
                report.skipped += 1;
                continue;
            }
            match self.connect(node) {
                Ok(()) => report.connected += 1,
                Err(diagnostic) => {
                    if self.is_bound(node) {
                        report.connected += 1;
                    }
                    inner.diagnostics.report(diagnostic);
                }
            }
        }

        if !report.is_empty() {
            log::debug!(
                "flush: {} disconnected, {} connected, {} skipped",
                report.disconnected,
                report.connected,
                report.skipped
            );
        }
        report
    }

    /// Detached, or declaring a different scope than the one it is bound as.
    fn should_disconnect(&self, node: NodeId) -> bool {
        let Some((bound_scope, _)) = self.controller(node) else {
            return false;
        };
        !self.inner.host.is_connected(node)
            || self.scope_name(node).as_deref() != Some(bound_scope.as_str())
    }

    fn should_connect(&self, node: NodeId) -> bool {
        !self.is_bound(node)
            && self.inner.host.is_connected(node)
            && self.scope_name(node).is_some()
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (disconnects, connects) = self.pending();
        f.debug_struct("LifecycleManager")
            .field("bound", &self.bound_count())
            .field("pending_disconnects", &disconnects)
            .field("pending_connects", &connects)
            .field("flush_scheduled", &self.flush_scheduled())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct WeakLifecycle(Weak<LifecycleInner>);

impl WeakLifecycle {
    pub(crate) fn upgrade(&self) -> Option<LifecycleManager> {
        self.0.upgrade().map(|inner| LifecycleManager { inner })
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
