//! Hook registration
//!
//! The registry is the process-wide list of installed interception hooks.
//! Transports built against it consult it on every submission.

use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::intercept::InterceptionHook;

static GLOBAL_REGISTRY: Lazy<Arc<HookRegistry>> = Lazy::new(|| Arc::new(HookRegistry::new()));

/// Installs and removes hooks. Implemented by [`HookRegistry`]; the logger
/// core only talks to this trait.
pub trait HookInstaller: Send + Sync {
    /// Returns `false` when a hook with the same identity is already
    /// installed.
    fn install(&self, hook: Arc<InterceptionHook>) -> bool;
    /// Returns `false` when no hook with that identity is installed.
    fn uninstall(&self, hook_id: Uuid) -> bool;
}

#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<InterceptionHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<HookRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Installed hooks in installation order.
    pub fn installed(&self) -> Vec<Arc<InterceptionHook>> {
        self.hooks
            .read()
            .map(|hooks| hooks.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn is_installed(&self, hook_id: Uuid) -> bool {
        self.installed().iter().any(|hook| hook.id() == hook_id)
    }

    pub fn len(&self) -> usize {
        self.installed().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HookInstaller for HookRegistry {
    fn install(&self, hook: Arc<InterceptionHook>) -> bool {
        let mut hooks = self
            .hooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if hooks.iter().any(|installed| installed.id() == hook.id()) {
            tracing::debug!("Hook {} already installed", hook.id());
            return false;
        }
        tracing::debug!("Installing hook {}", hook.id());
        hooks.push(hook);
        true
    }

    fn uninstall(&self, hook_id: Uuid) -> bool {
        let mut hooks = self
            .hooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = hooks.len();
        hooks.retain(|hook| hook.id() != hook_id);
        let removed = before != hooks.len();
        if removed {
            tracing::debug!("Uninstalled hook {}", hook_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;

    #[test]
    fn install_is_guarded_against_duplicates() {
        let registry = HookRegistry::new();
        let hook = Arc::new(InterceptionHook::new("h", Arc::new(Dispatcher::new("d"))));

        assert!(hook.install(&registry));
        assert!(!hook.install(&registry));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_installed(hook.id()));

        assert!(hook.uninstall(&registry));
        assert!(!hook.uninstall(&registry));
        assert!(registry.is_empty());
    }
}
