//! Component model for replicated entities.
//!
//! Components are trait objects owned by the [`ComponentTable`], indexed per
//! entity by runtime type, by name, and by network id. New instances come from
//! the [`ComponentFactory`], an explicit name-keyed registry built at startup,
//! and take their defaults from an [`EntityPrototype`].
//!
//! # Invariants
//! - An entity holds at most one component per type and per network id.
//! - Removing a component runs its teardown hook before it is detached.
//! - Replicated state travels as [`ComponentState`] payloads keyed by network id.

mod component;
pub mod components;
mod factory;
mod prototype;
mod state;
mod table;

pub use component::{AsAny, Component, ComponentError, ComponentStage};
pub use factory::{ComponentFactory, FactoryError, Registration, builtin_registrations};
pub use prototype::{ComponentEntry, EntityPrototype, PrototypeError, PrototypeRegistry};
pub use state::{ComponentState, StatePayload};
pub use table::{ComponentRef, ComponentSlot, ComponentTable, TableError};

pub fn crate_info() -> &'static str {
    "replica-ecs v0.1.0"
}
