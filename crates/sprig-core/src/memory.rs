use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::host::{Event, EventListener, Host, MutationCallback, MutationRecord, NodeId};
use crate::runtime::RuntimeHandle;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0} missing")]
    Missing(NodeId),
    #[error("cannot insert {child} into {parent}: it is an ancestor of the parent")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: String,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            text: String::new(),
        }
    }
}

struct Listener {
    kind: String,
    capture: bool,
    callback: EventListener,
}

/// Arena-backed in-memory document.
///
/// Elements are never freed, so a [`NodeId`] stays valid for the lifetime of
/// the document whether or not the node is attached. Mutation records are
/// batched and delivered to observers on the runtime's microtask queue, one
/// delivery for every run of synchronous mutations.
pub struct MemoryDocument {
    runtime: RuntimeHandle,
    this: Weak<MemoryDocument>,
    nodes: RefCell<Vec<Element>>,
    root: NodeId,
    body: NodeId,
    records: RefCell<Vec<MutationRecord>>,
    delivery_scheduled: Cell<bool>,
    observers: RefCell<Vec<Rc<RefCell<MutationCallback>>>>,
    listeners: RefCell<Vec<Listener>>,
}

impl MemoryDocument {
    /// Creates a document holding `<html><body></body></html>`.
    pub fn new(runtime: RuntimeHandle) -> Rc<Self> {
        let mut html = Element::new("html");
        let mut body = Element::new("body");
        let root = NodeId::from_raw(0);
        let body_id = NodeId::from_raw(1);
        html.children.push(body_id);
        body.parent = Some(root);
        Rc::new_cyclic(|this| Self {
            runtime,
            this: this.clone(),
            nodes: RefCell::new(vec![html, body]),
            root,
            body: body_id,
            records: RefCell::new(Vec::new()),
            delivery_scheduled: Cell::new(false),
            observers: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId::from_raw(nodes.len());
        nodes.push(Element::new(tag));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.nodes.borrow().get(node.raw()).map(|el| el.tag.clone())
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(node.raw())
            .map(|el| el.children.clone())
            .unwrap_or_default()
    }

    pub fn text(&self, node: NodeId) -> String {
        self.nodes
            .borrow()
            .get(node.raw())
            .map(|el| el.text.clone())
            .unwrap_or_default()
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        if let Some(el) = self.nodes.borrow_mut().get_mut(node.raw()) {
            el.text = text.to_string();
        }
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` under `parent` before `reference`, or last when
    /// `reference` is `None`. A child that already has a parent is moved.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check(parent)?;
        self.check(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent_of(reference) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }
        // Inserting a node before itself keeps it where it is.
        let reference = match reference {
            Some(reference) if reference == child => self.next_sibling(child),
            other => other,
        };
        self.detach(child);
        {
            let mut nodes = self.nodes.borrow_mut();
            let siblings = &mut nodes[parent.raw()].children;
            let index = reference
                .and_then(|reference| siblings.iter().position(|id| *id == reference))
                .unwrap_or(siblings.len());
            siblings.insert(index, child);
            nodes[child.raw()].parent = Some(parent);
        }
        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check(parent)?;
        self.check(child)?;
        if self.parent_of(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child);
        Ok(())
    }

    /// Detaches `node` from its parent; a no-op for detached nodes.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        self.check(node)?;
        self.detach(node);
        Ok(())
    }

    /// Dispatches a fresh event of `kind` at `target` and returns it.
    pub fn dispatch_event(&self, target: NodeId, kind: &str) -> Event {
        let event = Event::new(kind, target);
        self.dispatch(&event);
        event
    }

    /// Runs the document listeners for `event`: capturing listeners first,
    /// then bubbling ones, each group in registration order. Events at
    /// detached targets never reach the document.
    pub fn dispatch(&self, event: &Event) {
        if !self.is_connected(event.target()) {
            log::trace!("`{}` at detached {} not delivered", event.kind(), event.target());
            return;
        }
        let matching: Vec<EventListener> = {
            let listeners = self.listeners.borrow();
            let capture = listeners
                .iter()
                .filter(|l| l.capture && l.kind == event.kind());
            let bubble = listeners
                .iter()
                .filter(|l| !l.capture && l.kind == event.kind());
            capture.chain(bubble).map(|l| l.callback.clone()).collect()
        };
        for listener in matching {
            if event.propagation_stopped() {
                break;
            }
            listener(event);
        }
    }

    fn check(&self, node: NodeId) -> Result<(), DomError> {
        if node.raw() < self.nodes.borrow().len() {
            Ok(())
        } else {
            Err(DomError::Missing(node))
        }
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(node.raw()).and_then(|el| el.parent)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(node)?;
        let nodes = self.nodes.borrow();
        let siblings = &nodes[parent.raw()].children;
        let index = siblings.iter().position(|id| *id == node)?;
        siblings.get(index + 1).copied()
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    fn detach(&self, node: NodeId) {
        let parent = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(parent) = nodes[node.raw()].parent.take() else {
                return;
            };
            nodes[parent.raw()].children.retain(|child| *child != node);
            parent
        };
        self.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
    }

    fn record(&self, record: MutationRecord) {
        if self.observers.borrow().is_empty() {
            return;
        }
        self.records.borrow_mut().push(record);
        if self.delivery_scheduled.replace(true) {
            return;
        }
        let this = self.this.clone();
        self.runtime.queue_microtask(move || {
            if let Some(document) = this.upgrade() {
                document.deliver_records();
            }
        });
    }

    fn deliver_records(&self) {
        self.delivery_scheduled.set(false);
        let records = std::mem::take(&mut *self.records.borrow_mut());
        if records.is_empty() {
            return;
        }
        log::trace!("delivering {} mutation records", records.len());
        let observers = self.observers.borrow().clone();
        for observer in observers {
            let mut callback = observer.borrow_mut();
            (*callback)(&records);
        }
    }

    fn walk_descendants(&self, root: NodeId, visit: &mut impl FnMut(NodeId, &Element)) {
        let nodes = self.nodes.borrow();
        let Some(start) = nodes.get(root.raw()) else {
            return;
        };
        let mut stack: Vec<NodeId> = start.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let element = &nodes[id.raw()];
            visit(id, element);
            stack.extend(element.children.iter().rev().copied());
        }
    }
}

impl Host for MemoryDocument {
    fn document_element(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parent_of(node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let nodes = self.nodes.borrow();
        let element = nodes.get(node.raw())?;
        element
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let old_value = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(element) = nodes.get_mut(node.raw()) else {
                return;
            };
            match element.attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
                None => {
                    element
                        .attributes
                        .push((name.to_string(), value.to_string()));
                    None
                }
            }
        };
        self.record(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
            old_value,
        });
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        let old_value = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(element) = nodes.get_mut(node.raw()) else {
                return;
            };
            let Some(index) = element.attributes.iter().position(|(key, _)| key == name) else {
                return;
            };
            element.attributes.remove(index).1
        };
        self.record(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
            old_value: Some(old_value),
        });
    }

    fn query_all(&self, root: NodeId, name: &str, value: Option<&str>) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk_descendants(root, &mut |id, element| {
            let matches = element.attributes.iter().any(|(key, current)| {
                key == name && value.map_or(true, |expected| current.as_str() == expected)
            });
            if matches {
                found.push(id);
            }
        });
        found
    }

    fn observe_mutations(&self, callback: MutationCallback) {
        self.observers
            .borrow_mut()
            .push(Rc::new(RefCell::new(callback)));
    }

    fn add_event_listener(&self, kind: &str, capture: bool, listener: EventListener) {
        self.listeners.borrow_mut().push(Listener {
            kind: kind.to_string(),
            capture,
            callback: listener,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    fn document() -> (Runtime, Rc<MemoryDocument>) {
        let runtime = Runtime::default();
        let document = MemoryDocument::new(runtime.handle());
        (runtime, document)
    }

    #[test]
    fn attachment_follows_parent_chain() {
        let (_runtime, doc) = document();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner).unwrap();
        assert!(!doc.is_connected(inner));
        doc.append_child(doc.body(), outer).unwrap();
        assert!(doc.is_connected(inner));
        doc.remove(outer).unwrap();
        assert!(!doc.is_connected(inner));
        assert_eq!(doc.parent(inner), Some(outer));
    }

    #[test]
    fn query_all_returns_document_order_and_excludes_root() {
        let (_runtime, doc) = document();
        let root = doc.create_element("div");
        doc.set_attribute(root, "data-target", "item");
        let first = doc.create_element("p");
        let nested = doc.create_element("b");
        let second = doc.create_element("p");
        doc.set_attribute(first, "data-target", "item");
        doc.set_attribute(nested, "data-target", "item");
        doc.set_attribute(second, "data-target", "other");
        doc.append_child(root, first).unwrap();
        doc.append_child(first, nested).unwrap();
        doc.append_child(root, second).unwrap();

        assert_eq!(
            doc.query_all(root, "data-target", Some("item")),
            vec![first, nested]
        );
        assert_eq!(
            doc.query_all(root, "data-target", None),
            vec![first, nested, second]
        );
    }

    #[test]
    fn insert_before_places_child_and_rejects_cycles() {
        let (_runtime, doc) = document();
        let list = doc.create_element("ul");
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        doc.append_child(list, b).unwrap();
        doc.insert_before(list, a, Some(b)).unwrap();
        assert_eq!(doc.children(list), vec![a, b]);
        assert_eq!(
            doc.append_child(a, list),
            Err(DomError::HierarchyRequest {
                parent: a,
                child: list
            })
        );
        assert_eq!(
            doc.remove_child(a, b),
            Err(DomError::NotAChild { parent: a, child: b })
        );
    }

    #[test]
    fn inserting_a_child_before_itself_keeps_its_position() {
        let (_runtime, doc) = document();
        let list = doc.create_element("ul");
        let items: Vec<NodeId> = (0..3).map(|_| doc.create_element("li")).collect();
        for &item in &items {
            doc.append_child(list, item).unwrap();
        }
        doc.insert_before(list, items[1], Some(items[1])).unwrap();
        assert_eq!(doc.children(list), items);
        doc.insert_before(list, items[2], Some(items[2])).unwrap();
        assert_eq!(doc.children(list), items);
    }

    #[test]
    fn events_at_detached_targets_skip_document_listeners() {
        let (_runtime, doc) = document();
        let heard = Rc::new(Cell::new(0));
        let counter = heard.clone();
        doc.add_event_listener(
            "click",
            true,
            Rc::new(move |_event: &Event| counter.set(counter.get() + 1)),
        );
        let node = doc.create_element("button");
        doc.dispatch_event(node, "click");
        assert_eq!(heard.get(), 0);

        doc.append_child(doc.body(), node).unwrap();
        doc.dispatch_event(node, "click");
        assert_eq!(heard.get(), 1);
    }

    #[test]
    fn mutations_are_batched_into_one_delivery() {
        let (runtime, doc) = document();
        let batches = Rc::new(RefCell::new(Vec::new()));
        {
            let batches = batches.clone();
            doc.observe_mutations(Box::new(move |records: &[MutationRecord]| {
                batches.borrow_mut().push(records.to_vec());
            }));
        }
        let node = doc.create_element("div");
        doc.append_child(doc.body(), node).unwrap();
        doc.set_attribute(node, "data-x", "1");
        doc.remove(node).unwrap();
        assert!(batches.borrow().is_empty());

        runtime.run_microtasks();
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(
            batches[0][2],
            MutationRecord::ChildList {
                target: doc.body(),
                added: Vec::new(),
                removed: vec![node],
            }
        );
    }

    #[test]
    fn capture_listeners_run_first_and_stop_propagation_halts() {
        let (_runtime, doc) = document();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (label, capture) in [("bubble", false), ("capture", true), ("late", true)] {
            let log = log.clone();
            doc.add_event_listener(
                "click",
                capture,
                Rc::new(move |event: &Event| {
                    log.borrow_mut().push(label);
                    if label == "late" {
                        event.stop_propagation();
                    }
                }),
            );
        }
        let event = doc.dispatch_event(doc.body(), "click");
        assert!(event.propagation_stopped());
        assert_eq!(*log.borrow(), vec!["capture", "late"]);
    }
}
