use crate::collections::map::IndexSet;

/// Event kinds the dispatcher delegates by default.
pub const DEFAULT_EVENTS: &[&str] = &[
    "click",
    "dblclick",
    "input",
    "change",
    "submit",
    "keydown",
    "keyup",
    "focusin",
    "focusout",
    "pointerdown",
    "pointerup",
    "mouseover",
    "mouseout",
];

/// Attribute names and event kinds the engine binds against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Marks a scope root; its value names the registered scope.
    pub scope_attribute: String,
    /// Names a descendant for the targets accessor.
    pub target_attribute: String,
    /// Holds the `event->method` action list.
    pub action_attribute: String,
    /// Prepended to names read and written through values and params.
    pub value_prefix: String,
    /// One capturing listener is installed per entry.
    pub events: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope_attribute: "data-scope".to_string(),
            target_attribute: "data-target".to_string(),
            action_attribute: "data-action".to_string(),
            value_prefix: "data-".to_string(),
            events: DEFAULT_EVENTS.iter().map(|kind| kind.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    pub fn with_scope_attribute(mut self, name: impl Into<String>) -> Self {
        self.scope_attribute = name.into();
        self
    }

    pub fn with_target_attribute(mut self, name: impl Into<String>) -> Self {
        self.target_attribute = name.into();
        self
    }

    pub fn with_action_attribute(mut self, name: impl Into<String>) -> Self {
        self.action_attribute = name.into();
        self
    }

    pub fn with_value_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.value_prefix = prefix.into();
        self
    }

    /// Replaces the delegated event kinds; repeated kinds keep their first
    /// position.
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: IndexSet<String> = events.into_iter().map(Into::into).collect();
        self.events = unique.into_iter().collect();
        self
    }

    pub fn delegates(&self, kind: &str) -> bool {
        self.events.iter().any(|event| event == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config = EngineConfig::default()
            .with_scope_attribute("scope")
            .with_value_prefix("")
            .with_events(["click"]);
        assert_eq!(config.scope_attribute, "scope");
        assert_eq!(config.action_attribute, "data-action");
        assert_eq!(config.value_prefix, "");
        assert!(config.delegates("click"));
        assert!(!config.delegates("keydown"));
    }

    #[test]
    fn repeated_event_kinds_collapse() {
        let config = EngineConfig::default().with_events(["click", "input", "click"]);
        assert_eq!(config.events, vec!["click".to_string(), "input".to_string()]);
    }
}
