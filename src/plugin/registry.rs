//! Plugin registry: action-keyed resolution with conflict detection.
//!
//! Read-mostly. Registration is serialized behind a lock and checks the
//! whole claim set up front, so a conflicting plugin is rejected without
//! partially claiming actions. Resolution is lock-free on the hot path.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::info;

use super::{Plugin, PluginError};

/// Process-wide plugin directory, injected into engine instances
#[derive(Default)]
pub struct PluginRegistry {
    /// plugin id -> plugin
    plugins: DashMap<String, Arc<dyn Plugin>>,
    /// action key -> owning plugin id
    actions: DashMap<String, String>,
    /// registration order, for deterministic listings
    order: Mutex<Vec<String>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, claiming every action it supports.
    ///
    /// Fails without side effects when the id is taken or any action is
    /// already claimed by another plugin.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let mut order = self.order.lock();

        let id = plugin.id().to_string();
        if self.plugins.contains_key(&id) {
            return Err(PluginError::DuplicatePlugin { id });
        }
        let actions = plugin.supported_actions();
        for action in &actions {
            if let Some(existing) = self.actions.get(action) {
                return Err(PluginError::ActionConflict {
                    action: action.clone(),
                    existing: existing.clone(),
                    incoming: id,
                });
            }
        }

        for action in &actions {
            self.actions.insert(action.clone(), id.clone());
        }
        self.plugins.insert(id.clone(), plugin);
        // Still holding the lock: order stays consistent with the maps
        order.push(id.clone());

        info!(plugin = %id, actions = actions.len(), "plugin registered");
        Ok(())
    }

    /// Resolve the plugin owning `action`
    pub fn resolve(&self, action: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        let plugin_id = self
            .actions
            .get(action)
            .map(|id| id.clone())
            .ok_or_else(|| PluginError::UnknownAction {
                action: action.to_string(),
            })?;
        self.plugins
            .get(&plugin_id)
            .map(|p| Arc::clone(&p))
            .ok_or(PluginError::UnknownPlugin { id: plugin_id })
    }

    /// Look a plugin up by its id
    pub fn by_id(&self, id: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.plugins
            .get(id)
            .map(|p| Arc::clone(&p))
            .ok_or_else(|| PluginError::UnknownPlugin { id: id.to_string() })
    }

    /// All plugins in registration order
    pub fn all_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|id| self.plugins.get(id).map(|p| Arc::clone(&p)))
            .collect()
    }

    /// Health of one plugin
    pub async fn health_of(&self, id: &str) -> Result<bool, PluginError> {
        let plugin = self.by_id(id)?;
        Ok(plugin.health_check().await)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
