//! Built-in components every replicated entity may carry.
//!
//! Each replicated component pairs with a `*State` payload type bound to its
//! network id. Prototype data arrives as JSON through `expose_data`.

mod appearance;
mod collidable;
mod meta;
mod transform;

pub use appearance::{Appearance, AppearanceState};
pub use collidable::{Collidable, CollidableState};
pub use meta::{Meta, MetaState};
pub use transform::{Transform, TransformState};

/// Network ids of the built-in components.
pub mod net_ids {
    use replica_common::NetId;

    pub const META: NetId = NetId(4);
    pub const TRANSFORM: NetId = NetId(5);
    pub const COLLIDABLE: NetId = NetId(12);
    pub const APPEARANCE: NetId = NetId(22);
}

use serde::de::DeserializeOwned;

use crate::component::ComponentError;

/// Parse prototype data for `component`. A JSON `null` yields the defaults.
pub(crate) fn parse_data<D: DeserializeOwned + Default>(
    component: &'static str,
    data: &serde_json::Value,
) -> Result<D, ComponentError> {
    if data.is_null() {
        return Ok(D::default());
    }
    serde_json::from_value(data.clone())
        .map_err(|source| ComponentError::InvalidData { component, source })
}
