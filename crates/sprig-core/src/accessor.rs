//! Attribute-backed views handed to controllers.
//!
//! Views are built fresh for every factory call and action invocation and
//! never cache: each read goes back to the host, so mutations made in between
//! are always observed.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::host::{Host, NodeId};

/// Named descendants of a scope root.
#[derive(Clone)]
pub struct Targets {
    host: Rc<dyn Host>,
    root: NodeId,
    attribute: Rc<str>,
}

impl Targets {
    pub fn new(host: Rc<dyn Host>, root: NodeId, attribute: impl Into<Rc<str>>) -> Self {
        Self {
            host,
            root,
            attribute: attribute.into(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// First descendant, in document order, whose target marker equals `name`.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.host.query_first(self.root, &self.attribute, Some(name))
    }

    /// View returning every match instead of the first.
    pub fn all(&self) -> AllTargets {
        AllTargets {
            host: self.host.clone(),
            root: self.root,
            attribute: self.attribute.clone(),
        }
    }
}

impl fmt::Debug for Targets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Targets")
            .field("root", &self.root)
            .field("attribute", &self.attribute)
            .finish()
    }
}

#[derive(Clone)]
pub struct AllTargets {
    host: Rc<dyn Host>,
    root: NodeId,
    attribute: Rc<str>,
}

impl AllTargets {
    pub fn find(&self, name: &str) -> Vec<NodeId> {
        self.host.query_all(self.root, &self.attribute, Some(name))
    }
}

impl fmt::Debug for AllTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllTargets")
            .field("root", &self.root)
            .field("attribute", &self.attribute)
            .finish()
    }
}

/// String-valued custom attributes on one node.
///
/// Used as `values` (scope root) and `params` (acting element). Names are
/// namespaced by the configured prefix, so `get("count")` reads `data-count`
/// under the default configuration.
#[derive(Clone)]
pub struct AttributeMap {
    host: Rc<dyn Host>,
    node: NodeId,
    prefix: Rc<str>,
}

impl AttributeMap {
    pub fn new(host: Rc<dyn Host>, node: NodeId, prefix: impl Into<Rc<str>>) -> Self {
        Self {
            host,
            node,
            prefix: prefix.into(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.host.attribute(self.node, &self.qualified(name))
    }

    pub fn set(&self, name: &str, value: impl AsRef<str>) {
        self.host
            .set_attribute(self.node, &self.qualified(name), value.as_ref());
    }

    pub fn remove(&self, name: &str) {
        self.host.remove_attribute(self.node, &self.qualified(name));
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Reads and parses `name`; `None` when absent or unparsable.
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|raw| raw.trim().parse().ok())
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMap")
            .field("node", &self.node)
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;
    use crate::runtime::Runtime;

    #[test]
    fn targets_requery_the_live_tree() {
        let runtime = Runtime::default();
        let doc = MemoryDocument::new(runtime.handle());
        let root = doc.create_element("div");
        let first = doc.create_element("span");
        doc.set_attribute(first, "data-target", "label");
        doc.append_child(root, first).unwrap();

        let targets = Targets::new(doc.clone(), root, "data-target");
        assert_eq!(targets.find("label"), Some(first));
        assert_eq!(targets.find("missing"), None);

        let all = targets.all();
        assert_eq!(all.find("label"), vec![first]);

        let second = doc.create_element("span");
        doc.set_attribute(second, "data-target", "label");
        doc.insert_before(root, second, Some(first)).unwrap();
        assert_eq!(targets.find("label"), Some(second));
        assert_eq!(all.find("label"), vec![second, first]);

        doc.remove(second).unwrap();
        assert_eq!(all.find("label"), vec![first]);
    }

    #[test]
    fn attribute_map_reads_and_writes_prefixed_names() {
        let runtime = Runtime::default();
        let doc = MemoryDocument::new(runtime.handle());
        let node = doc.create_element("div");
        let values = AttributeMap::new(doc.clone(), node, "data-");

        assert_eq!(values.get("count"), None);
        values.set("count", "4");
        assert_eq!(doc.attribute(node, "data-count").as_deref(), Some("4"));
        assert_eq!(values.parse::<i64>("count"), Some(4));
        assert!(values.has("count"));

        values.set("count", "four");
        assert_eq!(values.parse::<i64>("count"), None);

        values.remove("count");
        assert!(!values.has("count"));
    }
}
