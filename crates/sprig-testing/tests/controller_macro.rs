use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use sprig_core::AttributeMap;
use sprig_macros::controller;
use sprig_testing::prelude::*;

#[derive(Debug)]
struct Overflow(u32);

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "counter would overflow to {}", self.0)
    }
}

impl std::error::Error for Overflow {}

struct Counter {
    values: AttributeMap,
    count: u32,
    connected: bool,
    log: Rc<RefCell<Vec<String>>>,
}

#[controller]
impl Counter {
    const LIMIT: u32 = 10;

    fn new(ctx: &ScopeContext, log: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            values: ctx.values.clone(),
            count: 0,
            connected: false,
            log,
        }
    }

    #[connect]
    fn start(&mut self) {
        self.connected = true;
        self.count = self.values.parse("count").unwrap_or(0);
    }

    #[disconnect]
    fn stop(&mut self) {
        self.log
            .borrow_mut()
            .push(format!("stopped at {}", self.count));
    }

    #[action]
    fn increment(&mut self, ctx: &mut ActionContext<'_>) -> Result<(), Overflow> {
        let step: u32 = ctx.params.parse("step").unwrap_or(1);
        let next = self.count + step;
        if next > Self::LIMIT {
            return Err(Overflow(next));
        }
        self.count = next;
        self.values.set("count", next.to_string());
        Ok(())
    }

    #[action("reset")]
    fn reset_to_zero(&mut self) {
        self.count = 0;
        self.values.set("count", "0");
    }
}

struct Pinger {
    pings: u32,
}

#[controller]
impl Pinger {
    #[action]
    fn ping(&mut self) -> ActionResult {
        self.pings += 1;
        Ok(())
    }
}

const COUNTER: &str = r#"
<div id="counter" data-scope="counter" data-count="2">
  <button id="inc" data-action="click->increment" data-step="4">+4</button>
  <button id="reset" data-action="click->reset">reset</button>
  <button id="bogus" data-action="click->decrement">-</button>
</div>
"#;

fn counter_harness() -> (Harness, Rc<RefCell<Vec<String>>>) {
    let harness = Harness::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let shared = Rc::clone(&log);
    harness
        .engine()
        .define("counter", move |ctx| Counter::new(ctx, Rc::clone(&shared)));
    harness.start();
    harness.mount(COUNTER).unwrap();
    harness.tick();
    (harness, log)
}

#[test]
fn connect_hook_runs_on_attach() {
    let (harness, _log) = counter_harness();
    let root = harness.by_id("counter").unwrap();
    let state = harness
        .engine()
        .with_controller(root, |counter: &mut Counter| (counter.connected, counter.count));
    assert_eq!(state, Some((true, 2)));
}

#[test]
fn actions_read_params_and_write_values() {
    let (harness, _log) = counter_harness();
    let root = harness.by_id("counter").unwrap();
    let inc = harness.by_id("inc").unwrap();

    harness.click(inc);
    assert_eq!(harness.attribute(root, "data-count").as_deref(), Some("6"));
    harness.click(inc);
    assert_eq!(harness.attribute(root, "data-count").as_deref(), Some("10"));
    assert!(harness.diagnostics().is_empty());

    harness.click(inc);
    assert_eq!(harness.attribute(root, "data-count").as_deref(), Some("10"));
    assert_eq!(
        harness.take_diagnostics(),
        vec![Diagnostic::HandlerFailed {
            scope: "counter".into(),
            method: "increment".into(),
            message: "counter would overflow to 14".into(),
        }]
    );

    harness.click(harness.by_id("reset").unwrap());
    assert_eq!(harness.attribute(root, "data-count").as_deref(), Some("0"));
}

#[test]
fn undeclared_methods_are_unknown_actions() {
    let (harness, _log) = counter_harness();
    harness.click(harness.by_id("bogus").unwrap());
    assert_eq!(
        harness.take_diagnostics(),
        vec![Diagnostic::UnknownAction {
            scope: "counter".into(),
            method: "decrement".into(),
        }]
    );
}

#[test]
fn renamed_action_is_not_reachable_by_its_method_name() {
    let (harness, _log) = counter_harness();
    let root = harness.by_id("counter").unwrap();
    harness
        .doc()
        .set_attribute(harness.by_id("reset").unwrap(), "data-action", "click->reset_to_zero");
    harness.click(harness.by_id("reset").unwrap());
    assert_eq!(harness.attribute(root, "data-count").as_deref(), Some("2"));
    assert_eq!(harness.take_diagnostics().len(), 1);
}

#[test]
fn disconnect_hook_runs_on_removal() {
    let (harness, log) = counter_harness();
    let root = harness.by_id("counter").unwrap();
    harness.click(harness.by_id("inc").unwrap());

    harness.doc().remove(root).unwrap();
    harness.tick();
    assert_eq!(*log.borrow(), vec!["stopped at 6".to_string()]);
    assert!(!harness.engine().is_bound(root));
}

#[test]
fn controllers_without_hooks_still_dispatch() {
    let harness = Harness::new();
    harness.engine().define("pinger", |_ctx| Pinger { pings: 0 });
    harness.start();
    let roots = harness
        .mount(r#"<section data-scope="pinger" data-action="click->ping"></section>"#)
        .unwrap();

    harness.click(roots[0]);
    harness.click(roots[0]);
    let pings = harness
        .engine()
        .with_controller(roots[0], |pinger: &mut Pinger| pinger.pings);
    assert_eq!(pings, Some(2));
}
