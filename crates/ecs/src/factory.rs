use std::collections::HashMap;

use replica_common::NetId;

use crate::component::Component;
use crate::components::{Appearance, Collidable, Meta, Transform};

/// Errors from the component factory.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("no component registered under {0:?}")]
    UnknownComponent(String),
    #[error("component {0:?} registered twice")]
    DuplicateName(&'static str),
    #[error("net id {net_id} claimed by both {first} and {second}")]
    DuplicateNetId {
        net_id: NetId,
        first: &'static str,
        second: &'static str,
    },
}

/// One entry of the factory table.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub net_id: Option<NetId>,
    pub constructor: fn() -> Box<dyn Component>,
}

impl Registration {
    /// Registration for `T` under the name and net id of its default value.
    pub fn of<T: Component + Default>() -> Self {
        let sample = T::default();
        Self {
            name: sample.name(),
            net_id: sample.net_id(),
            constructor: construct::<T>,
        }
    }
}

fn construct<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

/// The components every factory starts with.
pub fn builtin_registrations() -> [Registration; 4] {
    [
        Registration::of::<Meta>(),
        Registration::of::<Transform>(),
        Registration::of::<Collidable>(),
        Registration::of::<Appearance>(),
    ]
}

/// Name-keyed constructor registry, built once at startup and passed
/// explicitly to whoever needs to instantiate components.
#[derive(Debug, Default, Clone)]
pub struct ComponentFactory {
    by_name: HashMap<&'static str, Registration>,
    by_net: HashMap<NetId, &'static str>,
}

impl ComponentFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory preloaded with the built-in components.
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        for registration in builtin_registrations() {
            if let Err(err) = factory.insert(registration) {
                tracing::error!(component = registration.name, error = %err, "built-in component rejected");
            }
        }
        factory
    }

    /// Register `T` under the name and net id reported by its default value.
    pub fn register<T: Component + Default>(&mut self) -> Result<&mut Self, FactoryError> {
        self.insert(Registration::of::<T>())?;
        Ok(self)
    }

    pub fn insert(&mut self, registration: Registration) -> Result<(), FactoryError> {
        if self.by_name.contains_key(registration.name) {
            return Err(FactoryError::DuplicateName(registration.name));
        }
        if let Some(net_id) = registration.net_id {
            if let Some(&first) = self.by_net.get(&net_id) {
                return Err(FactoryError::DuplicateNetId {
                    net_id,
                    first,
                    second: registration.name,
                });
            }
            self.by_net.insert(net_id, registration.name);
        }
        self.by_name.insert(registration.name, registration);
        tracing::trace!(component = registration.name, "component registered");
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Component>, FactoryError> {
        self.by_name
            .get(name)
            .map(|registration| (registration.constructor)())
            .ok_or_else(|| FactoryError::UnknownComponent(name.to_string()))
    }

    pub fn registration(&self, name: &str) -> Option<&Registration> {
        self.by_name.get(name)
    }

    pub fn name_for_net_id(&self, net_id: NetId) -> Option<&'static str> {
        self.by_net.get(&net_id).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
