use super::{Component, ComponentState, SentryOrchestrator};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Lifecycle state per component, listed in startup order
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    states: Mutex<BTreeMap<Component, ComponentState>>,
}

impl ComponentRegistry {
    pub async fn register(&self, component: Component) {
        self.states
            .lock()
            .await
            .insert(component, ComponentState::Stopped);
    }

    /// Record `state` and return the one it replaced
    pub async fn set(&self, component: Component, state: ComponentState) -> Option<ComponentState> {
        let previous = self.states.lock().await.insert(component, state);
        if state == ComponentState::Failed {
            error!("Component '{}' failed (was {:?})", component, previous);
        } else {
            debug!("Component '{}': {:?} -> {:?}", component, previous, state);
        }
        previous
    }

    pub async fn get(&self, component: Component) -> Option<ComponentState> {
        self.states.lock().await.get(&component).copied()
    }

    pub async fn snapshot(&self) -> Vec<(Component, ComponentState)> {
        self.states
            .lock()
            .await
            .iter()
            .map(|(component, state)| (*component, *state))
            .collect()
    }

    pub async fn failed(&self) -> Vec<Component> {
        self.states
            .lock()
            .await
            .iter()
            .filter(|(_, state)| **state == ComponentState::Failed)
            .map(|(component, _)| *component)
            .collect()
    }
}

impl SentryOrchestrator {
    pub async fn set_component_state(&self, component: Component, state: ComponentState) {
        self.components.set(component, state).await;
    }

    pub async fn get_component_state(&self, component: Component) -> Option<ComponentState> {
        self.components.get(component).await
    }

    /// Every registered component with its state, in startup order
    pub async fn get_all_component_states(&self) -> Vec<(Component, ComponentState)> {
        self.components.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_reports_previous_state_and_failures() {
        let registry = ComponentRegistry::default();
        registry.register(Component::Cameras).await;
        registry.register(Component::Display).await;

        assert_eq!(
            registry.set(Component::Display, ComponentState::Failed).await,
            Some(ComponentState::Stopped)
        );
        assert_eq!(registry.failed().await, vec![Component::Display]);

        // Startup order, not registration order
        let order: Vec<Component> = registry.snapshot().await.into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec![Component::Display, Component::Cameras]);
    }
}
