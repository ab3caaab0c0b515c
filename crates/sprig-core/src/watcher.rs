use crate::host::MutationRecord;
use crate::lifecycle::{LifecycleManager, WeakLifecycle};

/// Feeds host mutation batches into the lifecycle queues.
pub(crate) struct MutationWatcher {
    lifecycle: WeakLifecycle,
}

impl MutationWatcher {
    /// Subscribes to the host's mutation notifier for the whole document.
    pub(crate) fn observe(lifecycle: &LifecycleManager) {
        let watcher = MutationWatcher {
            lifecycle: lifecycle.downgrade(),
        };
        lifecycle
            .host()
            .observe_mutations(Box::new(move |records: &[MutationRecord]| {
                watcher.handle(records)
            }));
    }

    fn handle(&self, records: &[MutationRecord]) {
        let Some(lifecycle) = self.lifecycle.upgrade() else {
            return;
        };
        classify(&lifecycle, records);
        lifecycle.schedule_flush();
    }
}

/// Queues every scope root found in added or removed subtrees, plus nodes
/// whose scope attribute changed.
pub(crate) fn classify(lifecycle: &LifecycleManager, records: &[MutationRecord]) {
    let host = lifecycle.host();
    let scope_attribute = lifecycle.config().scope_attribute.as_str();
    for record in records {
        match record {
            MutationRecord::ChildList { added, removed, .. } => {
                for &root in removed {
                    for node in host.subtree_with_attribute(root, scope_attribute) {
                        log::trace!("queue disconnect {node}");
                        lifecycle.enqueue_disconnect(node);
                    }
                }
                for &root in added {
                    for node in host.subtree_with_attribute(root, scope_attribute) {
                        log::trace!("queue connect {node}");
                        lifecycle.enqueue_connect(node);
                    }
                }
            }
            MutationRecord::Attributes { target, name, .. } if name == scope_attribute => {
                log::trace!("scope attribute changed on {target}");
                if lifecycle.is_bound(*target) {
                    lifecycle.enqueue_disconnect(*target);
                }
                lifecycle.enqueue_connect(*target);
            }
            MutationRecord::Attributes { .. } => {}
        }
    }
}
