use std::cell::RefCell;
use std::rc::Rc;

use crate::{ActionSet, Diagnostic, Engine, Host, MemoryDocument, NodeId, Runtime};

pub(crate) struct Fixture {
    pub runtime: Runtime,
    pub doc: Rc<MemoryDocument>,
    pub engine: Engine,
    pub reports: Rc<RefCell<Vec<Diagnostic>>>,
    pub log: Rc<RefCell<Vec<String>>>,
}

impl Fixture {
    pub fn new() -> Self {
        let runtime = Runtime::default();
        let doc = MemoryDocument::new(runtime.handle());
        let engine = Engine::new(doc.clone(), runtime.handle());
        let reports = Rc::new(RefCell::new(Vec::new()));
        {
            let reports = reports.clone();
            engine.on_diagnostic(move |d| reports.borrow_mut().push(d.clone()));
        }
        Self {
            runtime,
            doc,
            engine,
            reports,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn started() -> Self {
        let fixture = Self::new();
        fixture.engine.start();
        fixture
    }

    /// Detached `<div data-scope=scope>`.
    pub fn scoped(&self, scope: &str) -> NodeId {
        let node = self.doc.create_element("div");
        self.doc.set_attribute(node, "data-scope", scope);
        node
    }

    pub fn attach(&self, node: NodeId) {
        self.doc.append_child(self.doc.body(), node).unwrap();
    }

    pub fn tick(&self) -> usize {
        self.runtime.run_microtasks()
    }

    /// Registers `name` with a controller that logs factory, connect and
    /// disconnect calls.
    pub fn define_logged(&self, name: &'static str) {
        let log = self.log.clone();
        self.engine.define(name, move |_ctx| {
            log.borrow_mut().push(format!("factory:{name}"));
            let on_connect = log.clone();
            let on_disconnect = log.clone();
            ActionSet::new()
                .on_connect(move || on_connect.borrow_mut().push(format!("connect:{name}")))
                .on_disconnect(move || {
                    on_disconnect
                        .borrow_mut()
                        .push(format!("disconnect:{name}"))
                })
        });
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn reports(&self) -> Vec<Diagnostic> {
        self.reports.borrow().clone()
    }
}
