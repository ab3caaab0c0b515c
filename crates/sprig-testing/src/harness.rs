use std::cell::RefCell;
use std::rc::Rc;

use sprig_core::{
    Diagnostic, Engine, EngineConfig, Event, Host, MemoryDocument, NodeId, Runtime,
};

use crate::markup::{parse_fragment, MarkupError};

/// Runtime, in-memory document and engine wired together, with every
/// diagnostic captured for assertions.
///
/// Nothing runs until [`Harness::tick`]; handlers triggered through
/// [`Harness::click`] and [`Harness::dispatch`] run synchronously.
pub struct Harness {
    runtime: Runtime,
    doc: Rc<MemoryDocument>,
    engine: Engine,
    diagnostics: Rc<RefCell<Vec<Diagnostic>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let runtime = Runtime::default();
        let doc = MemoryDocument::new(runtime.handle());
        let engine = Engine::with_config(doc.clone(), runtime.handle(), config);
        let diagnostics = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&diagnostics);
        engine.on_diagnostic(move |diagnostic| sink.borrow_mut().push(diagnostic.clone()));
        Self {
            runtime,
            doc,
            engine,
            diagnostics,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn doc(&self) -> &Rc<MemoryDocument> {
        &self.doc
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn start(&self) -> &Self {
        self.engine.start();
        self
    }

    /// Parses `markup` and appends its top-level elements to the body.
    pub fn mount(&self, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        self.mount_into(self.doc.body(), markup)
    }

    pub fn mount_into(&self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        let roots = parse_fragment(&self.doc, markup)?;
        for &root in &roots {
            self.doc.append_child(parent, root)?;
        }
        Ok(roots)
    }

    /// Drains the microtask queue: mutation delivery, then the flush.
    pub fn tick(&self) -> usize {
        self.runtime.run_microtasks()
    }

    /// First element in the document whose `name` attribute equals `value`.
    pub fn find(&self, name: &str, value: &str) -> Option<NodeId> {
        self.doc
            .query_first(self.doc.document_element(), name, Some(value))
    }

    pub fn find_all(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.doc
            .query_all(self.doc.document_element(), name, Some(value))
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.find("id", id)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.doc.attribute(node, name)
    }

    pub fn click(&self, target: NodeId) -> Event {
        self.dispatch(target, "click")
    }

    pub fn dispatch(&self, target: NodeId, kind: &str) -> Event {
        log::trace!("harness dispatching `{kind}` at {target}");
        self.doc.dispatch_event(target, kind)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
