use replica_common::NetId;
use serde::{Deserialize, Serialize};

use super::net_ids;
use crate::component::{Component, ComponentError};
use crate::state::{ComponentState, StatePayload};

/// Identity of an entity: its display name and originating prototype.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub name: String,
    pub prototype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaState {
    pub name: String,
    pub prototype: String,
}

impl StatePayload for MetaState {
    const NET_ID: NetId = net_ids::META;
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MetaData {
    name: Option<String>,
}

impl Meta {
    pub fn new(prototype: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prototype: prototype.into(),
        }
    }
}

impl Component for Meta {
    fn name(&self) -> &'static str {
        "Meta"
    }

    fn net_id(&self) -> Option<NetId> {
        Some(net_ids::META)
    }

    fn expose_data(&mut self, data: &serde_json::Value) -> Result<(), ComponentError> {
        let data: MetaData = super::parse_data("Meta", data)?;
        if let Some(name) = data.name {
            self.name = name;
        }
        Ok(())
    }

    fn get_state(&self) -> Result<Option<ComponentState>, ComponentError> {
        ComponentState::encode(&MetaState {
            name: self.name.clone(),
            prototype: self.prototype.clone(),
        })
        .map(Some)
    }

    fn handle_state(
        &mut self,
        current: Option<&ComponentState>,
        _next: Option<&ComponentState>,
    ) -> Result<(), ComponentError> {
        if let Some(state) = current {
            let state: MetaState = state.decode()?;
            self.name = state.name;
            self.prototype = state.prototype;
        }
        Ok(())
    }
}
