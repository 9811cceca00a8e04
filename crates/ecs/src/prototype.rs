use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors from the prototype registry.
#[derive(Debug, thiserror::Error)]
pub enum PrototypeError {
    #[error("unknown prototype {0:?}")]
    Unknown(String),
    #[error("prototype {0:?} defined twice")]
    Duplicate(String),
    #[error("malformed prototype document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One component of a prototype, with its default configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Default component configuration for a kind of entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPrototype {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

impl EntityPrototype {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            components: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_component(mut self, kind: impl Into<String>, data: serde_json::Value) -> Self {
        self.components.push(ComponentEntry {
            kind: kind.into(),
            data,
        });
        self
    }

    pub fn has_component(&self, kind: &str) -> bool {
        self.components.iter().any(|entry| entry.kind == kind)
    }

    /// Display name, falling back to the prototype id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Prototype lookup table, keyed by prototype id.
#[derive(Debug, Default, Clone)]
pub struct PrototypeRegistry {
    prototypes: BTreeMap<String, EntityPrototype>,
}

impl PrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, prototype: EntityPrototype) -> Result<(), PrototypeError> {
        if self.prototypes.contains_key(&prototype.id) {
            return Err(PrototypeError::Duplicate(prototype.id));
        }
        tracing::trace!(prototype = %prototype.id, "prototype registered");
        self.prototypes.insert(prototype.id.clone(), prototype);
        Ok(())
    }

    /// Parse a JSON array of prototypes and register each one.
    /// Returns the number registered.
    pub fn load_json(&mut self, json: &str) -> Result<usize, PrototypeError> {
        let parsed: Vec<EntityPrototype> = serde_json::from_str(json)?;
        let count = parsed.len();
        for prototype in parsed {
            self.register(prototype)?;
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<&EntityPrototype> {
        self.prototypes.get(id)
    }

    pub fn lookup(&self, id: &str) -> Result<&EntityPrototype, PrototypeError> {
        self.get(id).ok_or_else(|| PrototypeError::Unknown(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
