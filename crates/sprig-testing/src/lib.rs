//! Testing utilities and harness for sprig

pub mod harness;
pub mod markup;

pub use harness::Harness;
pub use markup::{parse_fragment, MarkupError};

pub mod prelude {
    pub use crate::harness::Harness;
    pub use crate::markup::{parse_fragment, MarkupError};
    pub use sprig_core::{
        ActionContext, ActionResult, ActionSet, Controller, Diagnostic, EngineConfig, Event,
        Host, NodeId, ScopeContext, Stage,
    };
}
