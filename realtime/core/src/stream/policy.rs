//! Tool Result Visibility Policy
//!
//! Some assistant tools are implementation details of the generation flow;
//! their results are consumed server-side and never surfaced to callers.
//! The deny table is explicit and named so embedders can extend or clear it
//! instead of relying on a buried string comparison.

use std::collections::HashSet;

/// Tool names hidden from `on_tool_result` by default
///
/// `save_meal_plan` persists a generated plan as a side effect of the
/// assistant flow; its result carries no information a caller can act on.
pub const DEFAULT_HIDDEN_TOOLS: &[&str] = &["save_meal_plan"];

/// Decides which tool results are surfaced to callers
#[derive(Clone, Debug)]
pub struct ToolResultPolicy {
    hidden: HashSet<String>,
}

impl Default for ToolResultPolicy {
    fn default() -> Self {
        Self {
            hidden: DEFAULT_HIDDEN_TOOLS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl ToolResultPolicy {
    /// Create the default policy (internal tools hidden)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that surfaces every tool result
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            hidden: HashSet::new(),
        }
    }

    /// Hide an additional tool
    #[must_use]
    pub fn hide(mut self, name: impl Into<String>) -> Self {
        self.hidden.insert(name.into());
        self
    }

    /// Whether results for `name` are surfaced to callers
    #[must_use]
    pub fn is_visible(&self, name: &str) -> bool {
        !self.hidden.contains(name)
    }
}
