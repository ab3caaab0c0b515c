/// One `event->method` binding parsed from an action attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub event: String,
    pub method: String,
}

impl ActionDescriptor {
    pub fn new(event: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            method: method.into(),
        }
    }

    /// Parses a whitespace separated list of `event->method` tokens.
    ///
    /// Whitespace around `->` is tolerated. Tokens that do not form a complete
    /// pair are dropped.
    pub fn parse_list(value: &str) -> Vec<ActionDescriptor> {
        let segments: Vec<&str> = value.split("->").collect();
        let mut descriptors = Vec::new();
        for (index, pair) in segments.windows(2).enumerate() {
            let left: Vec<&str> = pair[0].split_whitespace().collect();
            // A lone word in a middle segment was already used as the previous method.
            if index > 0 && left.len() < 2 {
                continue;
            }
            let (Some(event), Some(method)) = (left.last(), pair[1].split_whitespace().next())
            else {
                log::trace!("ignoring malformed action token in `{value}`");
                continue;
            };
            descriptors.push(ActionDescriptor::new(*event, method));
        }
        descriptors
    }

    /// Descriptors of `value` bound to `kind`, in attribute order.
    pub fn parse_for(value: &str, kind: &str) -> Vec<ActionDescriptor> {
        Self::parse_list(value)
            .into_iter()
            .filter(|descriptor| descriptor.event == kind)
            .collect()
    }
}
