//! Presentation Layer Contract
//!
//! The presentation layer (buttons, menu entries, a console prompt) is owned
//! by the host. For each named scenario it is handed a zero-argument trigger
//! and is otherwise uninvolved in scheduling: it must not depend on the
//! trigger's return value or on when the resulting diagnostics appear.

use std::sync::Arc;

/// Zero-argument entry point for one named scenario.
pub type Trigger = Arc<dyn Fn() + Send + Sync>;

/// Host-side registry of scenario actions.
///
/// # Example
///
/// ```
/// use bridge_traits::presentation::{ActionRegistry, Trigger};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Buttons(Vec<String>);
///
/// impl ActionRegistry for Buttons {
///     fn register_action(&mut self, label: &str, _trigger: Trigger) {
///         self.0.push(label.to_string());
///     }
/// }
///
/// let mut buttons = Buttons::default();
/// buttons.register_action("unwrap", Arc::new(|| {}));
/// assert_eq!(buttons.0, vec!["unwrap".to_string()]);
/// ```
pub trait ActionRegistry {
    /// Register `trigger` under `label`.
    fn register_action(&mut self, label: &str, trigger: Trigger);
}
