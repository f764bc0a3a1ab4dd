//! Console stand-in for the presentation layer.

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::presentation::{ActionRegistry, Trigger};
use tracing::{debug, info};

/// Ordered list of named actions.
///
/// Triggering an action only invokes its trigger; the presenter never looks
/// at what the trigger does or when its diagnostics show up.
#[derive(Default)]
pub struct ConsolePresenter {
    actions: Vec<(String, Trigger)>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels in registration order.
    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Invokes the action registered under `label`.
    pub fn trigger(&self, label: &str) -> Result<()> {
        let (_, trigger) = self
            .actions
            .iter()
            .find(|(registered, _)| registered == label)
            .ok_or_else(|| BridgeError::UnknownAction(label.to_string()))?;

        info!(action = %label, "Triggering action");
        trigger();
        Ok(())
    }

    /// Invokes every action in registration order.
    pub fn trigger_all(&self) {
        for (label, trigger) in &self.actions {
            info!(action = %label, "Triggering action");
            trigger();
        }
    }
}

impl ActionRegistry for ConsolePresenter {
    fn register_action(&mut self, label: &str, trigger: Trigger) {
        debug!(action = %label, "Registered action");
        // A repeated label replaces the earlier action in place.
        match self.actions.iter_mut().find(|(registered, _)| registered == label) {
            Some(slot) => slot.1 = trigger,
            None => self.actions.push((label.to_string(), trigger)),
        }
    }
}
