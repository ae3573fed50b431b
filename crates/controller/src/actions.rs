use std::collections::HashMap;

use shared::domain::ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shutdown,
    DismissPanel,
}

/// Click handlers keyed by element id.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<ElementId, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in chrome actions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ElementId::shutdown(), Action::Shutdown);
        registry.register(ElementId::panel(), Action::DismissPanel);
        registry
    }

    /// Returns the action previously bound to `id`, if any.
    pub fn register(&mut self, id: impl Into<ElementId>, action: Action) -> Option<Action> {
        self.actions.insert(id.into(), action)
    }

    pub fn get(&self, id: &ElementId) -> Option<Action> {
        self.actions.get(id).copied()
    }
}
