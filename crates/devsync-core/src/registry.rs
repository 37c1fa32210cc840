//! Action registry: every configured action, compiled and indexed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::action::{Action, Direction};
use crate::config::ActionConfig;
use crate::error::{Error, Result};
use crate::state::PropertyState;

/// Property name as used in configuration keys: whitespace removed.
///
/// `compact_name("Rotation Speed") == "RotationSpeed"`
pub fn compact_name(property: &str) -> String {
    property.split_whitespace().collect()
}

/// Configuration key of a property's action, e.g. `setVolume`.
pub fn action_name(property: &str, direction: Direction) -> String {
    format!("{}{}", direction.prefix(), compact_name(property))
}

/// Compiled actions of one accessory, keyed by direction and property.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<(Direction, String), Arc<Action>>,
}

impl ActionRegistry {
    /// Compile every action of the `urls` table.
    ///
    /// Keys that do not start with `get`/`set` are skipped with a warning.
    /// Invalid patterns and expressions fail the whole build.
    pub fn from_config(
        urls: &BTreeMap<String, ActionConfig>,
        state: &PropertyState,
    ) -> Result<Self> {
        let mut actions = HashMap::new();

        for (key, config) in urls {
            let Some((direction, property)) = Direction::split_key(key) else {
                warn!("Ignoring action '{}': key must start with get or set", key);
                continue;
            };

            let action = Action::from_config(config, direction, state).map_err(|e| {
                Error::Configuration(format!("action '{}': {}", key, e))
            })?;
            debug!(
                "Registered {} action for '{}' ({} {}, {} fallbacks)",
                direction,
                property,
                action.method,
                action.url.source(),
                action.chain_len() - 1
            );
            actions.insert((direction, property.to_string()), Arc::new(action));
        }

        Ok(Self { actions })
    }

    /// Action of a property in one direction.
    ///
    /// A set-action without URL counts as no action.
    pub fn resolve(&self, property: &str, direction: Direction) -> Option<Arc<Action>> {
        let action = self.actions.get(&(direction, compact_name(property)))?;
        if direction == Direction::Set && !action.has_url() {
            return None;
        }
        Some(Arc::clone(action))
    }

    /// Properties with at least one action, sorted.
    pub fn properties(&self) -> Vec<String> {
        self.actions
            .keys()
            .map(|(_, property)| property.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
