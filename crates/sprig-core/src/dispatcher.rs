use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::accessor::AttributeMap;
use crate::action::ActionDescriptor;
use crate::collections::map::IndexSet;
use crate::controller::{ActionContext, Controller};
use crate::diagnostics::{panic_message, Diagnostic, Stage};
use crate::host::{Event, NodeId};
use crate::lifecycle::LifecycleManager;

/// Routes delegated events to controller methods.
pub(crate) struct ActionDispatcher {
    lifecycle: LifecycleManager,
}

impl ActionDispatcher {
    pub(crate) fn new(lifecycle: LifecycleManager) -> Self {
        Self { lifecycle }
    }

    /// Installs one capturing document listener per configured event kind.
    pub(crate) fn install(lifecycle: &LifecycleManager) {
        let kinds: IndexSet<&str> = lifecycle
            .config()
            .events
            .iter()
            .map(String::as_str)
            .collect();
        for kind in kinds {
            let weak = lifecycle.downgrade();
            lifecycle.host().add_event_listener(
                kind,
                true,
                Rc::new(move |event: &Event| {
                    if let Some(lifecycle) = weak.upgrade() {
                        ActionDispatcher::new(lifecycle).dispatch(event);
                    }
                }),
            );
        }
    }

    /// Runs every descriptor of the nearest acting element bound to the
    /// event's kind and returns how many handlers completed.
    pub(crate) fn dispatch(&self, event: &Event) -> usize {
        let Some((acting, descriptors)) = self.acting_element(event) else {
            return 0;
        };
        let mut completed = 0;
        for descriptor in descriptors {
            if self.invoke(acting, &descriptor, event) {
                completed += 1;
            }
        }
        completed
    }

    fn acting_element(&self, event: &Event) -> Option<(NodeId, Vec<ActionDescriptor>)> {
        let host = self.lifecycle.host();
        let attribute = self.lifecycle.config().action_attribute.as_str();
        let mut found = None;
        host.closest(event.target(), |node| {
            let Some(value) = host.attribute(node, attribute) else {
                return false;
            };
            let descriptors = ActionDescriptor::parse_for(&value, event.kind());
            if descriptors.is_empty() {
                return false;
            }
            found = Some((node, descriptors));
            true
        });
        found
    }

    fn invoke(&self, acting: NodeId, descriptor: &ActionDescriptor, event: &Event) -> bool {
        let lifecycle = &self.lifecycle;
        let diagnostics = lifecycle.diagnostics();
        let host = lifecycle.host();

        let Some(scope_node) = host.closest(acting, |node| lifecycle.scope_name(node).is_some())
        else {
            log::trace!("`{}` on {acting} has no enclosing scope", descriptor.method);
            return false;
        };
        if !lifecycle.is_bound(scope_node) {
            if !host.is_connected(scope_node) {
                log::trace!(
                    "`{}` on {acting} targets detached scope {scope_node}",
                    descriptor.method
                );
                return false;
            }
            if let Err(diagnostic) = lifecycle.connect(scope_node) {
                diagnostics.report(diagnostic);
            }
        }
        let Some((scope, controller)) = lifecycle.controller(scope_node) else {
            return false;
        };

        let method = descriptor.method.as_str();
        let Ok(mut controller) = controller.try_borrow_mut() else {
            diagnostics.report(Diagnostic::ControllerBusy {
                scope,
                method: method.to_string(),
            });
            return false;
        };
        let mut ctx = ActionContext {
            element: acting,
            event,
            params: AttributeMap::new(
                host.clone(),
                acting,
                lifecycle.config().value_prefix.as_str(),
            ),
        };
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| controller.action(method, &mut ctx)));
        drop(controller);

        match outcome {
            Ok(Some(Ok(()))) => true,
            Ok(Some(Err(error))) => {
                diagnostics.report(Diagnostic::HandlerFailed {
                    scope,
                    method: method.to_string(),
                    message: error.to_string(),
                });
                false
            }
            Ok(None) => {
                diagnostics.report(Diagnostic::UnknownAction {
                    scope,
                    method: method.to_string(),
                });
                false
            }
            Err(payload) => {
                diagnostics.report(Diagnostic::Panicked {
                    scope,
                    stage: Stage::Action(method.to_string()),
                    message: panic_message(&*payload),
                });
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
