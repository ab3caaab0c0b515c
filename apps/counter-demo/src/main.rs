use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;

use sprig_core::{
    ActionContext, ActionSet, AttributeMap, Engine, Host, MemoryDocument, NodeId, ScopeContext,
    Targets,
};
use sprig_macros::controller;
use sprig_runtime_std::StdRuntime;
use sprig_testing::parse_fragment;

const PAGE: &str = r#"
<main>
  <section id="left">
    <div id="first" data-scope="counter" data-count="0" data-max="5">
      <span data-target="output">0</span>
      <button id="first-inc" data-action="click->increment">+</button>
      <button id="first-add" data-action="click->add" data-amount="3">+3</button>
      <button id="first-reset" data-action="click->reset dblclick->reset">reset</button>
    </div>
  </section>
  <section id="right"></section>
  <div data-scope="status">
    <button id="status" data-action="click->report">status</button>
  </div>
</main>
"#;

const LATE_COUNTER: &str = r#"
<div id="second" data-scope="counter" data-count="10">
  <span data-target="output">10</span>
  <button id="second-inc" data-action="click->increment">+</button>
</div>
"#;

struct Counter {
    doc: Rc<MemoryDocument>,
    values: AttributeMap,
    targets: Targets,
    count: i64,
}

#[controller]
impl Counter {
    fn new(ctx: &ScopeContext, doc: Rc<MemoryDocument>) -> Self {
        Self {
            doc,
            values: ctx.values.clone(),
            targets: ctx.targets.clone(),
            count: 0,
        }
    }

    fn render(&self) {
        self.values.set("count", self.count.to_string());
        if let Some(output) = self.targets.find("output") {
            self.doc.set_text(output, &self.count.to_string());
        }
    }

    fn bump(&mut self, by: i64) -> Result<(), String> {
        let next = self.count + by;
        match self.values.parse::<i64>("max") {
            Some(max) if next > max => Err(format!("{next} exceeds the maximum of {max}")),
            _ => {
                self.count = next;
                self.render();
                Ok(())
            }
        }
    }

    #[connect]
    fn connect(&mut self) {
        self.count = self.values.parse("count").unwrap_or(0);
        log::info!("counter {} connected at {}", self.values.node(), self.count);
    }

    #[disconnect]
    fn disconnect(&mut self) {
        log::info!("counter {} disconnected at {}", self.values.node(), self.count);
    }

    #[action]
    fn increment(&mut self) -> Result<(), String> {
        self.bump(1)
    }

    #[action]
    fn add(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), String> {
        let amount = ctx.params.parse("amount").unwrap_or(1);
        self.bump(amount)
    }

    #[action]
    fn reset(&mut self, ctx: &mut ActionContext<'_>) {
        log::info!("reset via `{}`", ctx.event.kind());
        self.count = 0;
        self.render();
    }
}

fn by_id(doc: &MemoryDocument, id: &str) -> Result<NodeId, Box<dyn Error>> {
    doc.query_first(doc.document_element(), "id", Some(id))
        .ok_or_else(|| format!("no element with id `{id}`").into())
}

fn show(doc: &MemoryDocument, engine: &Engine, id: &str) -> Result<(), Box<dyn Error>> {
    let node = by_id(doc, id)?;
    println!(
        "  {id}: count={} bound={} instance={}",
        doc.attribute(node, "data-count").unwrap_or_default(),
        engine.is_bound(node),
        engine
            .instance_id(node)
            .map(|instance| instance.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== sprig counter demo ===");
    println!("Run with RUST_LOG=debug to watch connects, disconnects and flushes.");
    println!();

    let runtime = StdRuntime::new();
    let doc = MemoryDocument::new(runtime.runtime_handle());
    let engine = Engine::new(doc.clone(), runtime.runtime_handle());

    let reports = Rc::new(Cell::new(0usize));
    let counted = Rc::clone(&reports);
    engine.on_diagnostic(move |diagnostic| {
        counted.set(counted.get() + 1);
        println!("  ! {diagnostic}");
    });

    {
        let doc = Rc::clone(&doc);
        engine.define("counter", move |ctx| Counter::new(ctx, Rc::clone(&doc)));
    }
    {
        let doc = Rc::clone(&doc);
        engine.define("status", move |_ctx| {
            let doc = Rc::clone(&doc);
            ActionSet::new().on("report", move |_ctx: &mut ActionContext<'_>| {
                let counters =
                    doc.query_all(doc.document_element(), "data-scope", Some("counter"));
                println!("  status: {} counters attached", counters.len());
            })
        });
    }

    for root in parse_fragment(&doc, PAGE)? {
        doc.append_child(doc.body(), root)?;
    }
    engine.start();
    println!("startup:");
    show(&doc, &engine, "first")?;

    println!("click + twice, +3 once, +3 again past the maximum:");
    doc.dispatch_event(by_id(&doc, "first-inc")?, "click");
    doc.dispatch_event(by_id(&doc, "first-inc")?, "click");
    doc.dispatch_event(by_id(&doc, "first-add")?, "click");
    doc.dispatch_event(by_id(&doc, "first-add")?, "click");
    show(&doc, &engine, "first")?;

    println!("move the counter to the other section within one tick:");
    let first = by_id(&doc, "first")?;
    doc.append_child(by_id(&doc, "right")?, first)?;
    runtime.run_until_idle();
    show(&doc, &engine, "first")?;

    println!("insert a second counter and click it before the flush:");
    for root in parse_fragment(&doc, LATE_COUNTER)? {
        doc.append_child(by_id(&doc, "left")?, root)?;
    }
    doc.dispatch_event(by_id(&doc, "second-inc")?, "click");
    show(&doc, &engine, "second")?;
    runtime.run_until_idle();
    doc.dispatch_event(by_id(&doc, "status")?, "click");

    println!("double-click reset, then remove the first counter:");
    doc.dispatch_event(by_id(&doc, "first-reset")?, "dblclick");
    doc.remove(first)?;
    runtime.run_until_idle();
    show(&doc, &engine, "second")?;
    println!("  first: bound={} (detached)", engine.is_bound(first));
    println!("  {} scopes bound", engine.bound_count());
    doc.dispatch_event(by_id(&doc, "status")?, "click");

    println!();
    println!("{} diagnostics reported", reports.get());
    Ok(())
}
