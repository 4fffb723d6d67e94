//! Catalog of action handlers contributed by modules.
//!
//! Modules are registered once at startup, initialized once, and the
//! registry is then shared read-only behind an `Arc`. Handlers are keyed by
//! their qualified [`ActionName`]; the first module to claim a name keeps it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use streambot_types::config::BotConfig;
use streambot_types::rules::{Action, ActionName, Params};
use tracing::{debug, info};

use crate::error::{ActionError, RegistryError};
use crate::services::Services;

/// Executes one action.
pub trait ActionHandler: Send + Sync {
    fn call(&self, services: &Services, action: &Action, params: &Params) -> Result<(), ActionError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&Services, &Action, &Params) -> Result<(), ActionError> + Send + Sync,
{
    fn call(&self, services: &Services, action: &Action, params: &Params) -> Result<(), ActionError> {
        self(services, action, params)
    }
}

/// Startup hook receiving the module's slice of `moduleConfig` (`null` when absent).
pub type ModuleInit = Box<dyn FnOnce(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// A named bundle of action handlers plus an optional initializer.
pub struct Module {
    name: String,
    actions: Vec<(String, Arc<dyn ActionHandler>)>,
    init: Option<ModuleInit>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            init: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action<F>(self, verb: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Services, &Action, &Params) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.handler(verb, Arc::new(handler))
    }

    pub fn handler(mut self, verb: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.actions.push((verb.into(), handler));
        self
    }

    pub fn on_init<F>(mut self, init: F) -> Self
    where
        F: FnOnce(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }
}

/// Whether `invoke` found a handler. A missing handler is not an error so
/// configs may reference modules this build does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Handled,
    Unresolved,
}

struct RegisteredModule {
    name: String,
    init: Option<ModuleInit>,
}

#[derive(Default)]
pub struct Registry {
    modules: Vec<RegisteredModule>,
    actions: HashMap<ActionName, Arc<dyn ActionHandler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled modules, in their fixed order.
    pub fn with_builtin_modules() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for module in crate::modules::builtin_modules() {
            registry.register(module)?;
        }
        Ok(registry)
    }

    /// Adds every action of `module`. Rejected as a whole, leaving the
    /// registry untouched, if any qualified name is already taken.
    pub fn register(&mut self, module: Module) -> Result<(), RegistryError> {
        let mut claimed = HashSet::new();
        for (verb, _) in &module.actions {
            let name = ActionName::new(module.name.clone(), verb.clone());
            if self.actions.contains_key(&name) || !claimed.insert(name.clone()) {
                return Err(RegistryError::DuplicateAction(name));
            }
        }

        for (verb, handler) in module.actions {
            debug!(module = %module.name, verb = %verb, "Registering action");
            self.actions
                .insert(ActionName::new(module.name.clone(), verb), handler);
        }
        self.modules.push(RegisteredModule {
            name: module.name,
            init: module.init,
        });
        Ok(())
    }

    /// Runs the initializer of every enabled module once, in registration
    /// order. The first failure aborts.
    pub fn init(&mut self, config: &BotConfig) -> Result<(), RegistryError> {
        for module in &mut self.modules {
            if !config.is_module_enabled(&module.name) {
                continue;
            }
            let Some(init) = module.init.take() else {
                continue;
            };
            let slice = config
                .module_config
                .get(&module.name)
                .unwrap_or(&serde_json::Value::Null);
            init(slice).map_err(|reason| RegistryError::ModuleInit {
                module: module.name.clone(),
                reason,
            })?;
            info!(module = %module.name, "Module initialized");
        }
        Ok(())
    }

    pub fn contains(&self, name: &ActionName) -> bool {
        self.actions.contains_key(name)
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn invoke(
        &self,
        services: &Services,
        action: &Action,
        params: &Params,
    ) -> Result<Invocation, ActionError> {
        match self.actions.get(&action.name) {
            Some(handler) => {
                handler.call(services, action, params)?;
                Ok(Invocation::Handled)
            }
            None => {
                debug!(action = %action.name, "No handler registered, skipping");
                Ok(Invocation::Unresolved)
            }
        }
    }
}
