use std::any::Any;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::accessor::{AttributeMap, Targets};
use crate::collections::map::HashMap;
use crate::config::EngineConfig;
use crate::host::{Event, Host, NodeId};

pub type ActionResult = Result<(), Box<dyn Error + 'static>>;

/// Conversion applied to whatever an action method returns.
pub trait IntoActionResult {
    fn into_action_result(self) -> ActionResult;
}

impl IntoActionResult for () {
    fn into_action_result(self) -> ActionResult {
        Ok(())
    }
}

impl<E> IntoActionResult for Result<(), E>
where
    E: Into<Box<dyn Error + 'static>>,
{
    fn into_action_result(self) -> ActionResult {
        self.map_err(Into::into)
    }
}

/// Behaviour bound to one scope node.
///
/// Every capability is optional. `action` returns `None` when the controller
/// has no method of that name.
pub trait Controller: Any {
    fn connect(&mut self) {}

    fn disconnect(&mut self) {}

    fn action(&mut self, method: &str, ctx: &mut ActionContext<'_>) -> Option<ActionResult> {
        let _ = (method, ctx);
        None
    }
}

impl dyn Controller {
    pub fn as_any(&self) -> &dyn Any {
        self
    }

    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// What a scope factory receives.
#[derive(Clone, Debug)]
pub struct ScopeContext {
    pub root: NodeId,
    pub targets: Targets,
    pub values: AttributeMap,
}

impl ScopeContext {
    pub fn new(host: Rc<dyn Host>, root: NodeId, config: &EngineConfig) -> Self {
        Self {
            root,
            targets: Targets::new(host.clone(), root, config.target_attribute.as_str()),
            values: AttributeMap::new(host, root, config.value_prefix.as_str()),
        }
    }
}

/// What an action method receives.
#[derive(Debug)]
pub struct ActionContext<'a> {
    /// The element carrying the action attribute.
    pub element: NodeId,
    pub event: &'a Event,
    /// Custom attributes of `element`.
    pub params: AttributeMap,
}

pub type ScopeFactory = Rc<dyn Fn(&ScopeContext) -> Box<dyn Controller> + 'static>;

/// Serial number of a created controller instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance {}", self.0)
    }
}

type Hook = Box<dyn FnMut() + 'static>;
type Handler = Box<dyn FnMut(&mut ActionContext<'_>) -> ActionResult + 'static>;

/// Controller assembled from closures.
#[derive(Default)]
pub struct ActionSet {
    on_connect: Option<Hook>,
    on_disconnect: Option<Hook>,
    handlers: HashMap<String, Handler>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_connect = Some(Box::new(hook));
        self
    }

    pub fn on_disconnect(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_disconnect = Some(Box::new(hook));
        self
    }

    /// Registers `handler` under `method`, replacing any earlier one.
    pub fn on<F, R>(mut self, method: impl Into<String>, mut handler: F) -> Self
    where
        F: FnMut(&mut ActionContext<'_>) -> R + 'static,
        R: IntoActionResult,
    {
        self.handlers.insert(
            method.into(),
            Box::new(move |ctx: &mut ActionContext<'_>| handler(ctx).into_action_result()),
        );
        self
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl Controller for ActionSet {
    fn connect(&mut self) {
        if let Some(hook) = self.on_connect.as_mut() {
            hook();
        }
    }

    fn disconnect(&mut self) {
        if let Some(hook) = self.on_disconnect.as_mut() {
            hook();
        }
    }

    fn action(&mut self, method: &str, ctx: &mut ActionContext<'_>) -> Option<ActionResult> {
        self.handlers.get_mut(method).map(|handler| handler(ctx))
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods().collect();
        methods.sort_unstable();
        f.debug_struct("ActionSet")
            .field("methods", &methods)
            .field("connect", &self.on_connect.is_some())
            .field("disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}
