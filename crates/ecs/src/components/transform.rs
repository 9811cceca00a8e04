use glam::Vec2;
use replica_common::NetId;
use serde::{Deserialize, Serialize};

use super::net_ids;
use crate::component::{Component, ComponentError};
use crate::state::{ComponentState, StatePayload};

/// World position and rotation of an entity.
///
/// When a state for the upcoming tick is known, its position is kept as the
/// lerp destination so presentation can interpolate toward it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub lerp_destination: Option<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    pub position: Vec2,
    pub rotation: f32,
}

impl StatePayload for TransformState {
    const NET_ID: NetId = net_ids::TRANSFORM;
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TransformData {
    position: Option<Vec2>,
    rotation: Option<f32>,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Position interpolated toward the lerp destination by `alpha` in `[0, 1]`.
    pub fn interpolated(&self, alpha: f32) -> Vec2 {
        match self.lerp_destination {
            Some(dest) => self.position.lerp(dest, alpha.clamp(0.0, 1.0)),
            None => self.position,
        }
    }
}

impl Component for Transform {
    fn name(&self) -> &'static str {
        "Transform"
    }

    fn net_id(&self) -> Option<NetId> {
        Some(net_ids::TRANSFORM)
    }

    fn expose_data(&mut self, data: &serde_json::Value) -> Result<(), ComponentError> {
        let data: TransformData = super::parse_data("Transform", data)?;
        if let Some(position) = data.position {
            self.position = position;
        }
        if let Some(rotation) = data.rotation {
            self.rotation = rotation;
        }
        Ok(())
    }

    fn get_state(&self) -> Result<Option<ComponentState>, ComponentError> {
        ComponentState::encode(&TransformState {
            position: self.position,
            rotation: self.rotation,
        })
        .map(Some)
    }

    fn handle_state(
        &mut self,
        current: Option<&ComponentState>,
        next: Option<&ComponentState>,
    ) -> Result<(), ComponentError> {
        if let Some(state) = current {
            let state: TransformState = state.decode()?;
            self.position = state.position;
            self.rotation = state.rotation;
        }
        self.lerp_destination = match next {
            Some(state) => Some(state.decode::<TransformState>()?.position),
            None => None,
        };
        Ok(())
    }
}
