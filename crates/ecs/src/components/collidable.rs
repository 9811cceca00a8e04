use replica_common::{Box2, NetId};
use serde::{Deserialize, Serialize};

use super::net_ids;
use crate::component::{Component, ComponentError};
use crate::state::{ComponentState, StatePayload};

/// Physical extent of an entity, relative to its transform position.
#[derive(Debug, Clone, PartialEq)]
pub struct Collidable {
    pub bounds: Box2,
    pub hard: bool,
}

impl Default for Collidable {
    fn default() -> Self {
        Self {
            bounds: Box2::centered(0.5),
            hard: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollidableState {
    pub bounds: Box2,
    pub hard: bool,
}

impl StatePayload for CollidableState {
    const NET_ID: NetId = net_ids::COLLIDABLE;
}

/// Prototype form: bounds as `[left, bottom, right, top]`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct CollidableData {
    bounds: Option<[f32; 4]>,
    hard: Option<bool>,
}

impl Collidable {
    pub fn new(bounds: Box2) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }
}

impl Component for Collidable {
    fn name(&self) -> &'static str {
        "Collidable"
    }

    fn net_id(&self) -> Option<NetId> {
        Some(net_ids::COLLIDABLE)
    }

    fn expose_data(&mut self, data: &serde_json::Value) -> Result<(), ComponentError> {
        let data: CollidableData = super::parse_data("Collidable", data)?;
        if let Some([left, bottom, right, top]) = data.bounds {
            self.bounds = Box2::from_edges(left, bottom, right, top);
        }
        if let Some(hard) = data.hard {
            self.hard = hard;
        }
        Ok(())
    }

    fn get_state(&self) -> Result<Option<ComponentState>, ComponentError> {
        ComponentState::encode(&CollidableState {
            bounds: self.bounds,
            hard: self.hard,
        })
        .map(Some)
    }

    fn handle_state(
        &mut self,
        current: Option<&ComponentState>,
        _next: Option<&ComponentState>,
    ) -> Result<(), ComponentError> {
        if let Some(state) = current {
            let state: CollidableState = state.decode()?;
            self.bounds = state.bounds;
            self.hard = state.hard;
        }
        Ok(())
    }

    fn local_bounds(&self) -> Option<Box2> {
        Some(self.bounds)
    }
}
