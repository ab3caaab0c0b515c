//! The seam between the engine and the document it is bound to.
//!
//! The engine never owns the tree. Everything it needs from the host
//! (attribute storage, ancestry, attachment, descendant queries, mutation
//! notification and event delivery) goes through [`Host`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identity of a node in the host document.
///
/// Identity survives detachment: a node removed from the tree and inserted
/// elsewhere keeps its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single change reported by the host's mutation notifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. } | MutationRecord::Attributes { target, .. } => {
                *target
            }
        }
    }
}

/// A native event travelling through the host document.
#[derive(Debug)]
pub struct Event {
    kind: String,
    target: NodeId,
    detail: Option<String>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            detail: None,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Payload carried by the event, such as the typed key or an input value.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stops the remaining document listeners from seeing this event.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

pub type MutationCallback = Box<dyn FnMut(&[MutationRecord]) + 'static>;
pub type EventListener = Rc<dyn Fn(&Event) + 'static>;

/// The host document as seen by the engine.
///
/// All methods take `&self`; implementations keep their own interior
/// mutability and must not hold internal borrows while invoking observers or
/// listeners, since those call straight back into the host.
pub trait Host {
    fn document_element(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` is currently attached to the document.
    fn is_connected(&self, node: NodeId) -> bool;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    /// Strict descendants of `root` carrying attribute `name`, in document
    /// order. With `value` set, only nodes whose attribute equals it match.
    fn query_all(&self, root: NodeId, name: &str, value: Option<&str>) -> Vec<NodeId>;

    fn query_first(&self, root: NodeId, name: &str, value: Option<&str>) -> Option<NodeId> {
        self.query_all(root, name, value).into_iter().next()
    }

    /// Subscribes to batched tree mutations for the whole document.
    fn observe_mutations(&self, callback: MutationCallback);

    /// Installs a document-level listener for events of `kind`.
    fn add_event_listener(&self, kind: &str, capture: bool, listener: EventListener);
}

impl dyn Host {
    /// Nearest inclusive ancestor of `start` satisfying `predicate`.
    pub fn closest(
        &self,
        start: NodeId,
        mut predicate: impl FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut cursor = Some(start);
        while let Some(node) = cursor {
            if predicate(node) {
                return Some(node);
            }
            cursor = self.parent(node);
        }
        None
    }

    /// `node` itself when it carries `name`, followed by every descendant that does.
    pub fn subtree_with_attribute(&self, node: NodeId, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        if self.attribute(node, name).is_some() {
            found.push(node);
        }
        found.extend(self.query_all(node, name, None));
        found
    }
}
